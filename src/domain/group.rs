//! The exception group: an immutable tree of failures raised as one unit.

use std::fmt;
use std::sync::Arc;

use tracing::{instrument, trace};

use crate::domain::error::{GroupError, GroupResult};
use crate::domain::exception::{impl_metadata, Exception, Leaf, Metadata};
use crate::domain::kind::{builtins, ExceptionKind};
use crate::domain::typeset::TypeSet;

#[derive(Debug, Clone)]
struct GroupData {
    kind: ExceptionKind,
    message: String,
    exceptions: Vec<Exception>,
    meta: Metadata,
}

/// An ordered, non-empty collection of failures sharing one message.
///
/// The kind is `ExceptionGroup` when every member is recoverable and
/// `BaseExceptionGroup` otherwise. Operations never mutate a group; they
/// return new trees that reuse the untouched leaves.
#[derive(Clone)]
pub struct ExceptionGroup(Arc<GroupData>);

impl_metadata!(ExceptionGroup);

impl ExceptionGroup {
    /// Build a group, promoting it to the recoverable variant when all
    /// members allow it.
    pub fn new(
        message: impl Into<String>,
        exceptions: impl IntoIterator<Item = Exception>,
    ) -> GroupResult<Self> {
        let message = message.into();
        let exceptions: Vec<Exception> = exceptions.into_iter().collect();
        if exceptions.is_empty() {
            return Err(GroupError::Empty { message });
        }
        Ok(Self::assemble(message, exceptions, Metadata::default()))
    }

    /// Build the recoverable-only variant; every member must be recoverable.
    pub fn new_recoverable(
        message: impl Into<String>,
        exceptions: impl IntoIterator<Item = Exception>,
    ) -> GroupResult<Self> {
        let message = message.into();
        let exceptions: Vec<Exception> = exceptions.into_iter().collect();
        if exceptions.is_empty() {
            return Err(GroupError::Empty { message });
        }
        if let Some(member) = exceptions.iter().find(|e| !e.kind().is_recoverable()) {
            return Err(GroupError::NonRecoverableMember {
                message,
                kind: member.kind().name().to_string(),
            });
        }
        Ok(Self::assemble(message, exceptions, Metadata::default()))
    }

    /// Callers guarantee `exceptions` is non-empty.
    fn assemble(message: String, exceptions: Vec<Exception>, meta: Metadata) -> Self {
        debug_assert!(!exceptions.is_empty());
        let kind = if exceptions.iter().all(|e| e.kind().is_recoverable()) {
            builtins::exception_group()
        } else {
            builtins::base_exception_group()
        };
        Self(Arc::new(GroupData {
            kind: kind.clone(),
            message,
            exceptions,
            meta,
        }))
    }

    /// A group with an empty message around a single failure.
    pub(crate) fn wrap(exception: Exception) -> Self {
        Self::assemble(String::new(), vec![exception], Metadata::default())
    }

    /// A synthetic group with an empty message; `None` when nothing remains.
    pub(crate) fn remainder(exceptions: Vec<Exception>) -> Option<Self> {
        (!exceptions.is_empty())
            .then(|| Self::assemble(String::new(), exceptions, Metadata::default()))
    }

    pub fn kind(&self) -> &ExceptionKind {
        &self.0.kind
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn exceptions(&self) -> &[Exception] {
        &self.0.exceptions
    }

    pub fn ptr_eq(&self, other: &ExceptionGroup) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Same incident, other members: a new group with this group's message,
    /// cause, context, traceback and notes.
    pub fn derive(&self, exceptions: impl IntoIterator<Item = Exception>) -> GroupResult<Self> {
        let exceptions: Vec<Exception> = exceptions.into_iter().collect();
        if exceptions.is_empty() {
            return Err(GroupError::Empty {
                message: self.0.message.clone(),
            });
        }
        Ok(self.derive_nonempty(exceptions))
    }

    fn derive_nonempty(&self, exceptions: Vec<Exception>) -> Self {
        Self::assemble(self.0.message.clone(), exceptions, self.0.meta.clone())
    }

    /// Partition the tree into the members matching `types` and the rest.
    ///
    /// Both halves keep the nesting and messages of the original; a half with
    /// no members is `None`.
    #[instrument(level = "trace", skip(self), fields(group = %self))]
    pub fn split(&self, types: &TypeSet) -> (Option<Self>, Option<Self>) {
        self.split_dyn(&|e: &Exception| types.matches(e.kind()))
    }

    /// [`split`](Self::split) with an arbitrary predicate. The predicate sees
    /// every nested group before its members; a matching group moves whole.
    pub fn split_by<F>(&self, predicate: F) -> (Option<Self>, Option<Self>)
    where
        F: Fn(&Exception) -> bool,
    {
        self.split_dyn(&predicate)
    }

    fn split_dyn(&self, predicate: &dyn Fn(&Exception) -> bool) -> (Option<Self>, Option<Self>) {
        if predicate(&Exception::Group(self.clone())) {
            return (Some(self.clone()), None);
        }

        let mut matched = Vec::new();
        let mut rest = Vec::new();
        for exception in self.exceptions() {
            match exception {
                Exception::Group(group) => {
                    let (m, r) = group.split_dyn(predicate);
                    matched.extend(m.map(Exception::Group));
                    rest.extend(r.map(Exception::Group));
                }
                Exception::Leaf(_) => {
                    if predicate(exception) {
                        matched.push(exception.clone());
                    } else {
                        rest.push(exception.clone());
                    }
                }
            }
        }
        trace!(matched = matched.len(), rest = rest.len(), "split");

        let matched = (!matched.is_empty()).then(|| self.derive_nonempty(matched));
        let rest = (!rest.is_empty()).then(|| self.derive_nonempty(rest));
        (matched, rest)
    }

    /// The members matching `types`.
    ///
    /// Returns `self` (same identity) when nothing had to be removed.
    pub fn subgroup(&self, types: &TypeSet) -> Option<Self> {
        self.subgroup_dyn(&|e: &Exception| types.matches(e.kind()))
    }

    pub fn subgroup_by<F>(&self, predicate: F) -> Option<Self>
    where
        F: Fn(&Exception) -> bool,
    {
        self.subgroup_dyn(&predicate)
    }

    fn subgroup_dyn(&self, predicate: &dyn Fn(&Exception) -> bool) -> Option<Self> {
        if predicate(&Exception::Group(self.clone())) {
            return Some(self.clone());
        }

        let mut modified = false;
        let mut kept = Vec::new();
        for exception in self.exceptions() {
            match exception {
                Exception::Group(group) => match group.subgroup_dyn(predicate) {
                    Some(sub) => {
                        modified |= !sub.ptr_eq(group);
                        kept.push(Exception::Group(sub));
                    }
                    None => modified = true,
                },
                Exception::Leaf(_) => {
                    if predicate(exception) {
                        kept.push(exception.clone());
                    } else {
                        modified = true;
                    }
                }
            }
        }

        if !modified {
            Some(self.clone())
        } else if kept.is_empty() {
            None
        } else {
            Some(self.derive_nonempty(kept))
        }
    }

    /// True when at least one member (at any depth) matches `types`.
    pub fn contains(&self, types: &TypeSet) -> bool {
        self.leaves().any(|leaf| types.matches(leaf.kind()))
    }

    /// Leaves in structural (depth-first, left-to-right) order.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![self.0.exceptions.iter()],
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// Nesting depth; a flat group has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .exceptions()
            .iter()
            .filter_map(Exception::as_group)
            .map(ExceptionGroup::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Depth-first iterator over the leaves of a group.
pub struct Leaves<'a> {
    stack: Vec<std::slice::Iter<'a, Exception>>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Leaf;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(top) = self.stack.last_mut() {
            match top.next() {
                Some(Exception::Leaf(leaf)) => return Some(leaf),
                Some(Exception::Group(group)) => self.stack.push(group.0.exceptions.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

impl fmt::Display for ExceptionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0.exceptions.len();
        let suffix = if n == 1 { "" } else { "s" };
        write!(f, "{} ({} sub-exception{})", self.0.message, n, suffix)
    }
}

impl fmt::Debug for ExceptionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}, {:?})", self.0.kind.name(), self.0.message, self.0.exceptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::kind::builtins::*;

    fn leaf(kind: &ExceptionKind, message: &str) -> Exception {
        Exception::leaf(kind, message).unwrap()
    }

    #[test]
    fn test_kind_follows_members() {
        let recoverable = ExceptionGroup::new("eg", [leaf(value_error(), "v")]).unwrap();
        assert_eq!(recoverable.kind(), exception_group());

        let base = ExceptionGroup::new("beg", [leaf(keyboard_interrupt(), "")]).unwrap();
        assert_eq!(base.kind(), base_exception_group());

        let outer = ExceptionGroup::new("outer", [base.into(), leaf(value_error(), "v")]).unwrap();
        assert_eq!(outer.kind(), base_exception_group());
    }

    #[test]
    fn test_display_counts_direct_members() {
        let single = ExceptionGroup::new("one", [leaf(value_error(), "v")]).unwrap();
        assert_eq!(single.to_string(), "one (1 sub-exception)");

        let nested = ExceptionGroup::new(
            "two",
            [single.into(), leaf(type_error(), "t")],
        )
        .unwrap();
        assert_eq!(nested.to_string(), "two (2 sub-exceptions)");
    }

    #[test]
    fn test_leaves_are_depth_first() {
        let inner = ExceptionGroup::new("inner", [leaf(type_error(), "b"), leaf(key_error(), "c")]).unwrap();
        let outer = ExceptionGroup::new(
            "outer",
            [leaf(value_error(), "a"), inner.into(), leaf(runtime_error(), "d")],
        )
        .unwrap();
        let messages: Vec<&str> = outer.leaves().map(Leaf::message).collect();
        assert_eq!(messages, vec!["a", "b", "c", "d"]);
        assert_eq!(outer.depth(), 2);
    }

    #[test]
    fn test_split_on_own_kind_returns_self() {
        let group = ExceptionGroup::new("g", [leaf(value_error(), "v")]).unwrap();
        let (matched, rest) = group.split(&TypeSet::from(exception_group()));
        assert!(matched.unwrap().ptr_eq(&group));
        assert!(rest.is_none());
    }

    #[test]
    fn test_subgroup_keeps_identity_when_unmodified() {
        let inner = ExceptionGroup::new("inner", [leaf(value_error(), "b")]).unwrap();
        let group = ExceptionGroup::new("g", [leaf(value_error(), "a"), inner.into()]).unwrap();
        let sub = group.subgroup(&TypeSet::from(value_error())).unwrap();
        assert!(sub.ptr_eq(&group));
        assert!(group.subgroup(&TypeSet::from(type_error())).is_none());
    }

    #[test]
    fn test_derive_rejects_empty() {
        let group = ExceptionGroup::new("g", [leaf(value_error(), "a")]).unwrap();
        let err = group.derive(Vec::new()).unwrap_err();
        assert_eq!(err, GroupError::Empty { message: "g".into() });
    }
}
