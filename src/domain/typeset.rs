//! Type-sets: the matching key of `split` and of handler registration.

use std::fmt;

use itertools::Itertools;

use crate::domain::kind::ExceptionKind;

/// An ordered set of kinds, matched by subtype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet(Vec<ExceptionKind>);

impl TypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `kind` unless it is already present.
    pub fn with(mut self, kind: &ExceptionKind) -> Self {
        self.insert(kind);
        self
    }

    fn insert(&mut self, kind: &ExceptionKind) {
        if !self.0.contains(kind) {
            self.0.push(kind.clone());
        }
    }

    pub fn kinds(&self) -> &[ExceptionKind] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `kind` is a subtype of any member.
    pub fn matches(&self, kind: &ExceptionKind) -> bool {
        self.0.iter().any(|t| kind.is_subtype_of(t))
    }

    /// Members of `self` followed by the new members of `other`.
    pub fn union(&self, other: &TypeSet) -> TypeSet {
        let mut merged = self.clone();
        for kind in &other.0 {
            merged.insert(kind);
        }
        merged
    }

    /// First member that is a group kind or a subtype of one.
    pub fn group_kind(&self) -> Option<&ExceptionKind> {
        self.0.iter().find(|k| k.is_group())
    }
}

impl From<&ExceptionKind> for TypeSet {
    fn from(kind: &ExceptionKind) -> Self {
        Self(vec![kind.clone()])
    }
}

impl From<ExceptionKind> for TypeSet {
    fn from(kind: ExceptionKind) -> Self {
        Self(vec![kind])
    }
}

impl<const N: usize> From<[&ExceptionKind; N]> for TypeSet {
    fn from(kinds: [&ExceptionKind; N]) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<Vec<ExceptionKind>> for TypeSet {
    fn from(kinds: Vec<ExceptionKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl FromIterator<ExceptionKind> for TypeSet {
    fn from_iter<I: IntoIterator<Item = ExceptionKind>>(iter: I) -> Self {
        let mut set = TypeSet::new();
        for kind in iter {
            set.insert(&kind);
        }
        set
    }
}

impl<'a> FromIterator<&'a ExceptionKind> for TypeSet {
    fn from_iter<I: IntoIterator<Item = &'a ExceptionKind>>(iter: I) -> Self {
        let mut set = TypeSet::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{}", single),
            kinds => write!(f, "({})", kinds.iter().join(", ")),
        }
    }
}
