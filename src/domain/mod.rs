//! Domain layer: the exception tree and its matching rules
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod exception;
pub mod group;
pub mod kind;
pub mod typeset;

pub use error::{GroupError, GroupResult};
pub use exception::{Exception, Frame, Leaf, Traceback};
pub use group::{ExceptionGroup, Leaves};
pub use kind::{builtins, ExceptionKind, KindRegistry};
pub use typeset::TypeSet;
