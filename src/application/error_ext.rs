//! Error conversion helpers for reading documents from disk
//!
//! Attaches the offending path to I/O and parse failures.

use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting foreign results to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O or parse error.
    ///
    /// # Example
    /// ```ignore
    /// std::fs::read_to_string(&path)
    ///     .with_path_context("read scenario", &path)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T, E> IoResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }
}
