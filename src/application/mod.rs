//! Application layer: the selective-catch dispatcher and scenario runner
//!
//! This layer orchestrates domain logic; it performs I/O only to load documents.

pub mod catch;
pub mod error;
pub mod error_ext;
pub mod scenario;

pub use catch::{catch, Catcher, Disposition, Handler, HandlerMap};
pub use error::{ApplicationError, ApplicationResult, CatchError};
pub use error_ext::IoResultExt;
pub use scenario::{HandlerAction, Invocation, Outcome, Scenario};
