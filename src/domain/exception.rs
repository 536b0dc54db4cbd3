//! Exception values: the leaf variant, the tagged union over leaves and
//! groups, and the chaining metadata both carry.

use std::fmt;
use std::sync::Arc;

use crate::domain::error::{GroupError, GroupResult};
use crate::domain::group::ExceptionGroup;
use crate::domain::kind::ExceptionKind;
use crate::domain::typeset::TypeSet;

/// One entry of a traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// Frames recorded where a failure was raised, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traceback {
    frames: Vec<Frame>,
}

impl Traceback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// Provenance attached to a failure after construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct Metadata {
    pub(crate) cause: Option<Exception>,
    pub(crate) context: Option<Exception>,
    pub(crate) suppress_context: bool,
    pub(crate) traceback: Option<Traceback>,
    pub(crate) notes: Vec<String>,
}

/// Read accessors and builder-style setters for the chaining metadata.
///
/// Setters are copy-on-write: a value whose data is shared elsewhere is
/// copied first and therefore gets a new identity.
macro_rules! impl_metadata {
    ($ty:ty) => {
        impl $ty {
            pub(crate) fn meta(&self) -> &$crate::domain::exception::Metadata {
                &self.0.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::domain::exception::Metadata {
                &mut ::std::sync::Arc::make_mut(&mut self.0).meta
            }

            /// Explicit cause ("raised from").
            pub fn cause(&self) -> Option<&Exception> {
                self.0.meta.cause.as_ref()
            }

            /// The failure being handled when this one was raised.
            pub fn context(&self) -> Option<&Exception> {
                self.0.meta.context.as_ref()
            }

            pub fn suppress_context(&self) -> bool {
                self.0.meta.suppress_context
            }

            pub fn traceback(&self) -> Option<&$crate::domain::exception::Traceback> {
                self.0.meta.traceback.as_ref()
            }

            pub fn notes(&self) -> &[String] {
                &self.0.meta.notes
            }

            /// Set the cause; this also suppresses the implicit context.
            pub fn with_cause(mut self, cause: impl Into<Exception>) -> Self {
                let meta = self.meta_mut();
                meta.cause = Some(cause.into());
                meta.suppress_context = true;
                self
            }

            /// Clear the cause and suppress the context ("raise ... from None").
            pub fn without_cause(mut self) -> Self {
                let meta = self.meta_mut();
                meta.cause = None;
                meta.suppress_context = true;
                self
            }

            pub fn with_context(mut self, context: impl Into<Exception>) -> Self {
                self.meta_mut().context = Some(context.into());
                self
            }

            pub fn with_traceback(mut self, traceback: $crate::domain::exception::Traceback) -> Self {
                self.meta_mut().traceback = Some(traceback);
                self
            }

            pub fn with_note(mut self, note: impl Into<String>) -> Self {
                self.meta_mut().notes.push(note.into());
                self
            }
        }
    };
}

pub(crate) use impl_metadata;

#[derive(Debug, Clone)]
struct LeafData {
    kind: ExceptionKind,
    message: String,
    meta: Metadata,
}

/// A single, non-group failure.
#[derive(Clone)]
pub struct Leaf(Arc<LeafData>);

impl_metadata!(Leaf);

impl Leaf {
    /// Fails when `kind` is a group kind: leaves never carry one.
    pub fn new(kind: &ExceptionKind, message: impl Into<String>) -> GroupResult<Self> {
        if kind.is_group() {
            return Err(GroupError::GroupKindLeaf {
                kind: kind.name().to_string(),
            });
        }
        Ok(Self(Arc::new(LeafData {
            kind: kind.clone(),
            message: message.into(),
            meta: Metadata::default(),
        })))
    }

    pub fn kind(&self) -> &ExceptionKind {
        &self.0.kind
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// Same kind, message and metadata under a new identity.
    pub fn duplicate(&self) -> Self {
        Self(Arc::new(LeafData::clone(&self.0)))
    }

    pub fn ptr_eq(&self, other: &Leaf) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.message)
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.0.kind.name(), self.0.message)
    }
}

/// A failure value: either a leaf or a group of failures.
#[derive(Clone)]
pub enum Exception {
    Leaf(Leaf),
    Group(ExceptionGroup),
}

impl Exception {
    /// Shorthand for a leaf wrapped into an `Exception`.
    pub fn leaf(kind: &ExceptionKind, message: impl Into<String>) -> GroupResult<Self> {
        Leaf::new(kind, message).map(Self::Leaf)
    }

    pub fn kind(&self) -> &ExceptionKind {
        match self {
            Exception::Leaf(leaf) => leaf.kind(),
            Exception::Group(group) => group.kind(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Exception::Leaf(leaf) => leaf.message(),
            Exception::Group(group) => group.message(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Exception::Group(_))
    }

    pub fn as_group(&self) -> Option<&ExceptionGroup> {
        match self {
            Exception::Group(group) => Some(group),
            Exception::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Exception::Leaf(leaf) => Some(leaf),
            Exception::Group(_) => None,
        }
    }

    /// Kind-based membership test against a type-set.
    pub fn is_instance(&self, types: &TypeSet) -> bool {
        types.matches(self.kind())
    }

    /// Object identity: both handles point at the same failure.
    pub fn ptr_eq(&self, other: &Exception) -> bool {
        match (self, other) {
            (Exception::Leaf(a), Exception::Leaf(b)) => a.ptr_eq(b),
            (Exception::Group(a), Exception::Group(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub(crate) fn meta(&self) -> &Metadata {
        match self {
            Exception::Leaf(leaf) => leaf.meta(),
            Exception::Group(group) => group.meta(),
        }
    }

    pub fn cause(&self) -> Option<&Exception> {
        self.meta().cause.as_ref()
    }

    pub fn context(&self) -> Option<&Exception> {
        self.meta().context.as_ref()
    }

    pub fn suppress_context(&self) -> bool {
        self.meta().suppress_context
    }

    pub fn traceback(&self) -> Option<&Traceback> {
        self.meta().traceback.as_ref()
    }

    pub fn notes(&self) -> &[String] {
        &self.meta().notes
    }

    pub fn with_cause(self, cause: impl Into<Exception>) -> Self {
        match self {
            Exception::Leaf(leaf) => Exception::Leaf(leaf.with_cause(cause)),
            Exception::Group(group) => Exception::Group(group.with_cause(cause)),
        }
    }

    pub fn without_cause(self) -> Self {
        match self {
            Exception::Leaf(leaf) => Exception::Leaf(leaf.without_cause()),
            Exception::Group(group) => Exception::Group(group.without_cause()),
        }
    }

    pub fn with_context(self, context: impl Into<Exception>) -> Self {
        match self {
            Exception::Leaf(leaf) => Exception::Leaf(leaf.with_context(context)),
            Exception::Group(group) => Exception::Group(group.with_context(context)),
        }
    }

    pub fn with_traceback(self, traceback: Traceback) -> Self {
        match self {
            Exception::Leaf(leaf) => Exception::Leaf(leaf.with_traceback(traceback)),
            Exception::Group(group) => Exception::Group(group.with_traceback(traceback)),
        }
    }

    pub fn with_note(self, note: impl Into<String>) -> Self {
        match self {
            Exception::Leaf(leaf) => Exception::Leaf(leaf.with_note(note)),
            Exception::Group(group) => Exception::Group(group.with_note(note)),
        }
    }
}

impl From<Leaf> for Exception {
    fn from(leaf: Leaf) -> Self {
        Exception::Leaf(leaf)
    }
}

impl From<ExceptionGroup> for Exception {
    fn from(group: ExceptionGroup) -> Self {
        Exception::Group(group)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exception::Leaf(leaf) => fmt::Display::fmt(leaf, f),
            Exception::Group(group) => fmt::Display::fmt(group, f),
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exception::Leaf(leaf) => fmt::Debug::fmt(leaf, f),
            Exception::Group(group) => fmt::Debug::fmt(group, f),
        }
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let meta = self.meta();
        match (&meta.cause, &meta.context) {
            (Some(cause), _) => Some(cause),
            (None, Some(context)) if !meta.suppress_context => Some(context),
            _ => None,
        }
    }
}
