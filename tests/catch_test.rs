//! Integration tests for the selective catch dispatcher.

use std::cell::RefCell;

use exceptiongroup::builtins::*;
use exceptiongroup::util::testing::init_test_setup;
use exceptiongroup::{
    catch, CatchError, Disposition, Exception, ExceptionGroup, ExceptionKind, HandlerMap, Leaf,
    TypeSet,
};
use rstest::rstest;

fn leaf(kind: &ExceptionKind, message: &str) -> Exception {
    Exception::leaf(kind, message).unwrap()
}

fn group(message: &str, members: Vec<Exception>) -> Exception {
    Exception::Group(ExceptionGroup::new(message, members).unwrap())
}

/// The single leaf a handler received, after checking the singleton wrapper.
fn unwrap_single(received: &ExceptionGroup) -> Leaf {
    assert_eq!(received.message(), "");
    assert_eq!(received.exceptions().len(), 1);
    received.exceptions()[0].as_leaf().unwrap().clone()
}

// ============================================================
// Construction
// ============================================================

#[rstest]
#[case(TypeSet::from(base_exception_group()), "BaseExceptionGroup")]
#[case(TypeSet::from(exception_group()), "ExceptionGroup")]
#[case(TypeSet::from([value_error(), exception_group()]), "ExceptionGroup")]
#[case(TypeSet::from([base_exception_group(), type_error()]), "BaseExceptionGroup")]
fn given_group_kind_key_when_building_catch_then_fails(#[case] types: TypeSet, #[case] kind: &str) {
    init_test_setup();
    let err = catch(HandlerMap::new().on(types, |_| Ok(()))).unwrap_err();
    assert_eq!(err, CatchError::GroupKind { kind: kind.into() });
    assert!(err.to_string().starts_with(&format!("catching {kind} with catch()")));
}

#[test]
fn given_supertype_of_group_kind_when_building_catch_then_accepted() {
    assert!(catch(HandlerMap::new().on(exception(), |_| Ok(()))).is_ok());
    assert!(catch(HandlerMap::new().on(base_exception(), |_| Ok(()))).is_ok());
}

#[test]
fn given_no_handlers_when_group_raised_then_it_propagates_as_a_new_group() {
    let raised = group("g", vec![leaf(value_error(), "v")]);
    let mut catcher = catch(HandlerMap::new()).unwrap();
    match catcher.exit(Some(raised.clone())) {
        Disposition::Replace(e) => {
            assert!(!e.ptr_eq(&raised));
            assert_eq!(e.as_group().unwrap().leaf_count(), 1);
        }
        other => panic!("expected replacement, got {other:?}"),
    }
}

// ============================================================
// Ungrouped failures
// ============================================================

#[test]
fn given_matching_leaf_when_raised_then_handler_gets_singleton_group_and_scope_absorbs() {
    init_test_setup();
    let raised = leaf(value_error(), "bad");
    let received = RefCell::new(Vec::new());
    let mut catcher = catch(HandlerMap::new().on(value_error(), |g: &ExceptionGroup| {
        received.borrow_mut().push(g.clone());
        Ok(())
    }))
    .unwrap();

    let disposition = catcher.exit(Some(raised.clone()));
    drop(catcher);

    assert!(disposition.is_suppressed());
    let received = received.into_inner();
    assert_eq!(received.len(), 1);
    assert!(Exception::Leaf(unwrap_single(&received[0])).ptr_eq(&raised));
}

#[test]
fn given_unmatched_leaf_when_raised_then_identical_object_propagates() {
    let raised = leaf(zero_division_error(), "div");
    let mut catcher = catch(HandlerMap::new().on([value_error(), runtime_error()], |_| {
        panic!("handler must not run")
    }))
    .unwrap();

    match catcher.exit(Some(raised.clone())) {
        Disposition::Passthrough(e) => assert!(e.ptr_eq(&raised)),
        other => panic!("expected passthrough, got {other:?}"),
    }
}

#[test]
fn given_body_succeeds_then_value_is_returned_and_no_handler_runs() {
    let mut catcher = catch(HandlerMap::new().on(value_error(), |_| panic!("no failure"))).unwrap();
    let value = catcher.run(|| Ok::<_, Exception>("done")).unwrap();
    assert_eq!(value, Some("done"));
}

// ============================================================
// Groups
// ============================================================

#[test]
fn given_flat_group_when_two_handlers_match_then_each_leaf_is_handled_once_in_order() {
    init_test_setup();
    let raised = group(
        "booboo",
        vec![
            leaf(value_error(), "v"),
            leaf(type_error(), "t"),
            leaf(zero_division_error(), "z"),
        ],
    );
    let first = RefCell::new(Vec::new());
    let second = RefCell::new(Vec::new());

    let result = {
        let mut catcher = catch(
            HandlerMap::new()
                .on([value_error(), type_error()], |g: &ExceptionGroup| {
                    first.borrow_mut().push(unwrap_single(g));
                    Ok(())
                })
                .on(zero_division_error(), |g: &ExceptionGroup| {
                    second.borrow_mut().push(unwrap_single(g));
                    Ok(())
                }),
        )
        .unwrap();
        catcher.run(|| Err::<(), _>(raised.clone()))
    };

    assert_eq!(result.unwrap(), None);
    let first: Vec<String> = first.borrow().iter().map(|l| l.kind().to_string()).collect();
    assert_eq!(first, vec!["ValueError", "TypeError"]);
    assert_eq!(second.borrow().len(), 1);
    assert_eq!(second.borrow()[0].kind(), zero_division_error());
}

#[test]
fn given_flat_group_when_nothing_matches_then_a_new_group_with_the_same_leaves_propagates() {
    let original = leaf(zero_division_error(), "z");
    let raised = group("booboo", vec![original.clone()]);
    let mut catcher = catch(HandlerMap::new().on([value_error(), runtime_error()], |_| {
        panic!("handler must not run")
    }))
    .unwrap();

    let propagated = match catcher.exit(Some(raised.clone())) {
        Disposition::Replace(e) => e,
        other => panic!("expected replacement, got {other:?}"),
    };
    assert!(!propagated.ptr_eq(&raised));
    let propagated = propagated.as_group().unwrap();
    let leaves: Vec<&Leaf> = propagated.leaves().collect();
    assert_eq!(leaves.len(), 1);
    assert!(Exception::Leaf(leaves[0].clone()).ptr_eq(&original));
}

#[test]
fn given_flat_group_when_every_leaf_matches_then_scope_exits_normally() {
    let raised = group("booboo", vec![leaf(value_error(), "v")]);
    let mut catcher = catch(HandlerMap::new().on([value_error(), runtime_error()], |_| Ok(()))).unwrap();
    assert!(catcher.run(|| Err::<(), _>(raised)).unwrap().is_none());
}

#[test]
fn given_nested_group_then_each_handler_sees_its_leaves_in_structural_order() {
    init_test_setup();
    let raised = group(
        "booboo",
        vec![
            leaf(value_error(), "v"),
            group(
                "nested",
                vec![leaf(runtime_error(), "r"), leaf(zero_division_error(), "z")],
            ),
        ],
    );
    let first = RefCell::new(Vec::new());
    let second = RefCell::new(Vec::new());

    let disposition = {
        let mut catcher = catch(
            HandlerMap::new()
                .on([value_error(), runtime_error()], |g: &ExceptionGroup| {
                    first.borrow_mut().push(unwrap_single(g).message().to_string());
                    Ok(())
                })
                .on(zero_division_error(), |g: &ExceptionGroup| {
                    second.borrow_mut().push(unwrap_single(g).message().to_string());
                    Ok(())
                }),
        )
        .unwrap();
        catcher.exit(Some(raised))
    };

    assert!(disposition.is_suppressed());
    assert_eq!(first.into_inner(), vec!["v", "r"]);
    assert_eq!(second.into_inner(), vec!["z"]);
}

#[test]
fn given_handlers_declared_out_of_tree_order_then_they_run_in_declaration_order() {
    init_test_setup();
    let raised = group(
        "booboo",
        vec![leaf(zero_division_error(), "z"), leaf(value_error(), "v")],
    );
    let calls = RefCell::new(Vec::new());

    let disposition = {
        let mut catcher = catch(
            HandlerMap::new()
                .on(value_error(), |g: &ExceptionGroup| {
                    calls.borrow_mut().push(format!("h1({})", unwrap_single(g).kind()));
                    Ok(())
                })
                .on(zero_division_error(), |g: &ExceptionGroup| {
                    calls.borrow_mut().push(format!("h2({})", unwrap_single(g).kind()));
                    Ok(())
                }),
        )
        .unwrap();
        catcher.exit(Some(raised))
    };

    assert!(disposition.is_suppressed());
    assert_eq!(calls.into_inner(), vec!["h1(ValueError)", "h2(ZeroDivisionError)"]);
}

#[test]
fn given_later_type_set_when_earlier_one_took_its_leaves_then_it_sees_only_the_rest() {
    let raised = group(
        "g",
        vec![leaf(key_error(), "k"), leaf(index_error(), "i"), leaf(os_error(), "o")],
    );
    let broad = RefCell::new(Vec::new());
    let disposition = {
        let mut catcher = catch(
            HandlerMap::new()
                .on(key_error(), |_| Ok(()))
                .on(lookup_error(), |g: &ExceptionGroup| {
                    broad.borrow_mut().push(unwrap_single(g).message().to_string());
                    Ok(())
                }),
        )
        .unwrap();
        catcher.exit(Some(raised))
    };

    assert_eq!(broad.into_inner(), vec!["i"]);
    let Disposition::Replace(remainder) = disposition else {
        panic!("expected replacement");
    };
    let remainder = remainder.as_group().unwrap();
    assert_eq!(remainder.message(), "");
    let rest = remainder.exceptions()[0].as_group().unwrap();
    assert_eq!(rest.message(), "g");
    assert_eq!(rest.exceptions()[0].kind(), os_error());
}

#[test]
fn given_supertype_handler_when_subtype_raised_then_absorbed_with_concrete_kind() {
    let raised = group("g", vec![leaf(key_error(), "missing")]);
    let seen = RefCell::new(None);
    let disposition = {
        let mut catcher = catch(HandlerMap::new().on(lookup_error(), |g: &ExceptionGroup| {
            *seen.borrow_mut() = Some(unwrap_single(g).kind().clone());
            Ok(())
        }))
        .unwrap();
        catcher.exit(Some(raised))
    };
    assert!(disposition.is_suppressed());
    assert_eq!(seen.into_inner().as_ref(), Some(key_error()));
}

#[test]
fn given_overlapping_type_sets_then_first_declared_handler_wins() {
    let raised = group("g", vec![leaf(key_error(), "k")]);
    let calls = RefCell::new(Vec::new());
    {
        let mut catcher = catch(
            HandlerMap::new()
                .on(lookup_error(), |_| {
                    calls.borrow_mut().push("lookup");
                    Ok(())
                })
                .on(key_error(), |_| {
                    calls.borrow_mut().push("key");
                    Ok(())
                }),
        )
        .unwrap();
        assert!(catcher.exit(Some(raised)).is_suppressed());
    }
    assert_eq!(calls.into_inner(), vec!["lookup"]);
}

// ============================================================
// Handlers that raise
// ============================================================

#[test]
fn given_handler_raises_then_new_failure_replaces_original_without_cause() {
    init_test_setup();
    let original = leaf(value_error(), "bad");
    let raised = group("booboo", vec![original.clone()]);
    let mut catcher = catch(HandlerMap::new().on(value_error(), |_| {
        Err(leaf(runtime_error(), "new"))
    }))
    .unwrap();

    let replacement = match catcher.exit(Some(raised.clone())) {
        Disposition::Replace(e) => e,
        other => panic!("expected replacement, got {other:?}"),
    };
    assert!(replacement.cause().is_none());
    assert!(replacement.suppress_context());

    let replacement = replacement.as_group().unwrap();
    assert_eq!(replacement.message(), "");
    assert_eq!(replacement.exceptions().len(), 1);
    let child = &replacement.exceptions()[0];
    assert_eq!(child.kind(), runtime_error());
    assert_eq!(child.message(), "new");
    assert!(child.context().unwrap().ptr_eq(&original));
}

#[test]
fn given_handler_reraises_stored_failure_with_context_then_identity_is_kept() {
    let stored = leaf(runtime_error(), "stored").with_context(leaf(type_error(), "earlier"));
    let raised = group("g", vec![leaf(value_error(), "v")]);
    let replacement = {
        let mut catcher = catch(HandlerMap::new().on(value_error(), |_| Err(stored.clone()))).unwrap();
        match catcher.exit(Some(raised)) {
            Disposition::Replace(e) => e,
            other => panic!("expected replacement, got {other:?}"),
        }
    };

    let child = &replacement.as_group().unwrap().exceptions()[0];
    assert!(child.ptr_eq(&stored));
    assert_eq!(child.context().unwrap().message(), "earlier");
}

#[test]
fn given_handler_raises_shared_failure_without_context_then_a_chained_copy_escapes() {
    let stored = leaf(runtime_error(), "stored");
    let raised = leaf(value_error(), "v");
    let replacement = {
        let mut catcher = catch(HandlerMap::new().on(value_error(), |_| Err(stored.clone()))).unwrap();
        match catcher.exit(Some(raised.clone())) {
            Disposition::Replace(e) => e,
            other => panic!("expected replacement, got {other:?}"),
        }
    };

    assert!(!replacement.ptr_eq(&stored));
    assert_eq!(replacement.message(), "stored");
    assert!(replacement.context().unwrap().ptr_eq(&raised));
    assert!(replacement.suppress_context());
    assert!(replacement.cause().is_none());
    // the handler's own handle is untouched
    assert!(stored.context().is_none());
    assert!(!stored.suppress_context());
}

#[test]
fn given_handler_raises_then_sibling_handlers_still_run() {
    let raised = group(
        "g",
        vec![leaf(value_error(), "v"), leaf(type_error(), "t"), leaf(os_error(), "o")],
    );
    let later = RefCell::new(0);
    let disposition = {
        let mut catcher = catch(
            HandlerMap::new()
                .on(value_error(), |_| Err(leaf(runtime_error(), "from handler")))
                .on(type_error(), |_| {
                    *later.borrow_mut() += 1;
                    Ok(())
                }),
        )
        .unwrap();
        catcher.exit(Some(raised))
    };
    assert_eq!(later.into_inner(), 1);

    let Disposition::Replace(remainder) = disposition else {
        panic!("expected replacement");
    };
    // handler-raised failures first, the unmatched remainder last
    let kinds: Vec<&str> = remainder
        .as_group()
        .unwrap()
        .leaves()
        .map(|l| l.kind().name())
        .collect();
    assert_eq!(kinds, vec!["RuntimeError", "OSError"]);
}

// ============================================================
// Nested scopes
// ============================================================

#[test]
fn given_nested_scopes_then_outer_scope_handles_inner_remainder() {
    init_test_setup();
    let raised = group("g", vec![leaf(value_error(), "v"), leaf(key_error(), "k")]);
    let inner_calls = RefCell::new(0);
    let outer_calls = RefCell::new(0);

    let mut outer = catch(HandlerMap::new().on(key_error(), |g: &ExceptionGroup| {
        assert_eq!(unwrap_single(g).message(), "k");
        *outer_calls.borrow_mut() += 1;
        Ok(())
    }))
    .unwrap();
    let result = outer.run(|| {
        let mut inner = catch(HandlerMap::new().on(value_error(), |_| {
            *inner_calls.borrow_mut() += 1;
            Ok(())
        }))
        .unwrap();
        inner.run(|| Err::<(), _>(raised.clone())).map(|_| ())
    });
    drop(outer);

    assert_eq!(result.unwrap(), None);
    assert_eq!(inner_calls.into_inner(), 1);
    assert_eq!(outer_calls.into_inner(), 1);
}
