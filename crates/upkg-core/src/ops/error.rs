//! Domain-specific errors for package operations

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::locator::LocateError;
use crate::repository::RepositoryError;
use crate::resolver::ResolveError;
use crate::tracking::TrackingError;

/// Errors raised by install, update and nuke.
#[derive(Error, Debug)]
pub enum InstallError {
    /// Dependency resolution failed.
    #[error("Failed to resolve dependencies: {0}")]
    Resolution(#[from] ResolveError),

    /// A required package was not found.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// A package could not be materialized.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The tracking ledger could not be updated.
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// Project or user settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A filesystem operation failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path being read, written or removed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl InstallError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
