//! Explicit exception kind hierarchy.
//!
//! Kinds replace runtime class reflection: every kind names its parents, and
//! subtype checks walk that table. Identity is handle identity, so two kinds
//! declared with the same name are still distinct kinds.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use tracing::instrument;

use crate::domain::error::{GroupError, GroupResult};

#[derive(Debug)]
struct KindDef {
    name: String,
    parents: Vec<ExceptionKind>,
}

/// Handle to a node of the kind hierarchy.
#[derive(Clone)]
pub struct ExceptionKind(Arc<KindDef>);

impl ExceptionKind {
    /// Declare a new leaf kind below `parents`.
    ///
    /// Fails when no parent is given or when a parent is a group kind: group
    /// kinds are reserved for [`ExceptionGroup`](crate::domain::ExceptionGroup)
    /// nodes and never appear on leaves.
    pub fn new(name: impl Into<String>, parents: &[&ExceptionKind]) -> GroupResult<Self> {
        let name = name.into();
        if parents.is_empty() {
            return Err(GroupError::MissingParent { name });
        }
        if let Some(group) = parents.iter().find(|p| p.is_group()) {
            return Err(GroupError::GroupKindParent {
                name,
                parent: group.name().to_string(),
            });
        }
        Ok(Self::declare(name, parents.iter().map(|p| (*p).clone()).collect()))
    }

    fn declare(name: impl Into<String>, parents: Vec<ExceptionKind>) -> Self {
        Self(Arc::new(KindDef {
            name: name.into(),
            parents,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Direct parents, in declaration order.
    pub fn parents(&self) -> &[ExceptionKind] {
        &self.0.parents
    }

    /// True when `self` is `other` or `other` is one of its ancestors.
    pub fn is_subtype_of(&self, other: &ExceptionKind) -> bool {
        self == other || self.0.parents.iter().any(|p| p.is_subtype_of(other))
    }

    /// `self` followed by every ancestor, depth-first, without duplicates.
    pub fn ancestors(&self) -> Vec<ExceptionKind> {
        let mut seen = vec![self.clone()];
        let mut stack: Vec<&ExceptionKind> = self.0.parents.iter().rev().collect();
        while let Some(kind) = stack.pop() {
            if seen.contains(kind) {
                continue;
            }
            seen.push(kind.clone());
            stack.extend(kind.0.parents.iter().rev());
        }
        seen
    }

    /// Kinds below `BaseExceptionGroup`.
    pub fn is_group(&self) -> bool {
        self.is_subtype_of(builtins::base_exception_group())
    }

    /// Kinds below `Exception`: failures a program is expected to handle.
    /// Everything else (interrupts, exit requests) is non-recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.is_subtype_of(builtins::exception())
    }
}

impl PartialEq for ExceptionKind {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ExceptionKind {}

impl Hash for ExceptionKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<kind {}>", self.0.name)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Builtin kinds, mirroring the standard exception hierarchy.
pub mod builtins {
    use super::*;

    macro_rules! builtin_kinds {
        ($($fn_name:ident => $name:literal [$($parent:ident),*];)*) => {
            struct Builtins {
                $($fn_name: ExceptionKind,)*
            }

            static BUILTINS: LazyLock<Builtins> = LazyLock::new(|| {
                $(let $fn_name = ExceptionKind::declare($name, vec![$($parent.clone()),*]);)*
                Builtins { $($fn_name,)* }
            });

            $(
                #[doc = concat!("The builtin `", $name, "` kind.")]
                pub fn $fn_name() -> &'static ExceptionKind {
                    &BUILTINS.$fn_name
                }
            )*

            /// Every builtin kind; parents precede their children.
            pub fn all() -> Vec<&'static ExceptionKind> {
                vec![$(&BUILTINS.$fn_name),*]
            }
        };
    }

    builtin_kinds! {
        base_exception => "BaseException" [];
        exception => "Exception" [base_exception];
        base_exception_group => "BaseExceptionGroup" [base_exception];
        exception_group => "ExceptionGroup" [base_exception_group, exception];
        keyboard_interrupt => "KeyboardInterrupt" [base_exception];
        system_exit => "SystemExit" [base_exception];
        generator_exit => "GeneratorExit" [base_exception];
        arithmetic_error => "ArithmeticError" [exception];
        zero_division_error => "ZeroDivisionError" [arithmetic_error];
        overflow_error => "OverflowError" [arithmetic_error];
        lookup_error => "LookupError" [exception];
        key_error => "KeyError" [lookup_error];
        index_error => "IndexError" [lookup_error];
        value_error => "ValueError" [exception];
        unicode_error => "UnicodeError" [value_error];
        type_error => "TypeError" [exception];
        runtime_error => "RuntimeError" [exception];
        not_implemented_error => "NotImplementedError" [runtime_error];
        recursion_error => "RecursionError" [runtime_error];
        os_error => "OSError" [exception];
        file_not_found_error => "FileNotFoundError" [os_error];
        permission_error => "PermissionError" [os_error];
        timeout_error => "TimeoutError" [os_error];
        attribute_error => "AttributeError" [exception];
        name_error => "NameError" [exception];
        assertion_error => "AssertionError" [exception];
        stop_iteration => "StopIteration" [exception];
    }
}

/// Name → kind table, seeded with the builtins.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    kinds: BTreeMap<String, ExceptionKind>,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KindRegistry {
    pub fn new() -> Self {
        let kinds = builtins::all()
            .into_iter()
            .map(|k| (k.name().to_string(), k.clone()))
            .collect();
        Self { kinds }
    }

    pub fn get(&self, name: &str) -> Option<&ExceptionKind> {
        self.kinds.get(name)
    }

    pub fn resolve(&self, name: &str) -> GroupResult<ExceptionKind> {
        self.get(name)
            .cloned()
            .ok_or_else(|| GroupError::UnknownKind(name.to_string()))
    }

    /// Declare `name` below the named parents and register it.
    #[instrument(level = "debug", skip(self, parents))]
    pub fn declare<S: AsRef<str>>(&mut self, name: &str, parents: &[S]) -> GroupResult<ExceptionKind> {
        if self.kinds.contains_key(name) {
            return Err(GroupError::DuplicateKind(name.to_string()));
        }
        let resolved = parents
            .iter()
            .map(|p| self.resolve(p.as_ref()))
            .collect::<GroupResult<Vec<_>>>()?;
        let refs: Vec<&ExceptionKind> = resolved.iter().collect();
        let kind = ExceptionKind::new(name, &refs)?;
        self.kinds.insert(name.to_string(), kind.clone());
        Ok(kind)
    }

    /// Declare a whole table of kinds whose parents may refer to each other
    /// in any order.
    pub fn declare_all<'a, I, P>(&mut self, table: I) -> GroupResult<()>
    where
        I: IntoIterator<Item = (&'a str, P)>,
        P: AsRef<[String]>,
    {
        let mut pending: Vec<(&str, P)> = table.into_iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();
            for (name, parents) in pending {
                if parents.as_ref().iter().all(|p| self.kinds.contains_key(p)) {
                    self.declare(name, parents.as_ref())?;
                } else {
                    blocked.push((name, parents));
                }
            }
            if blocked.len() == before {
                let missing = blocked
                    .iter()
                    .flat_map(|(_, parents)| parents.as_ref().iter())
                    .find(|p| !self.kinds.contains_key(p.as_str()))
                    .cloned()
                    .unwrap_or_default();
                return Err(GroupError::UnknownKind(missing));
            }
            pending = blocked;
        }
        Ok(())
    }

    /// Registered kinds whose direct parents include `kind`.
    pub fn children_of(&self, kind: &ExceptionKind) -> Vec<&ExceptionKind> {
        self.kinds
            .values()
            .filter(|k| k.parents().contains(kind))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExceptionKind> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
