//! Shared operation context.
//!
//! Groups the project configuration, the tracking ledger and the reporter
//! so every operation takes one explicit argument instead of reaching for
//! process-wide state.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::{ProjectConfig, UserSettings};
use crate::ops::error::InstallError;
use crate::reporter::Reporter;
use crate::tracking::TrackingStore;

/// Everything an install, update or nuke needs.
pub struct Context {
    /// Loaded project configuration.
    pub config: ProjectConfig,
    /// The project's tracking ledger.
    pub tracking: TrackingStore,
    /// Progress sink.
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.config.root())
            .field("tracking", &self.tracking.path())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Build a context for `config`, loading its tracking ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger exists but cannot be read.
    pub fn new(config: ProjectConfig, reporter: Arc<dyn Reporter>) -> Result<Self, InstallError> {
        let tracking = TrackingStore::load(&config.tracking_path())?;
        Ok(Self {
            config,
            tracking,
            reporter,
        })
    }

    /// Open the project at `project_root`, merging the user's settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or user configuration is invalid.
    pub fn open(project_root: &Path, reporter: Arc<dyn Reporter>) -> Result<Self, InstallError> {
        let mut config = ProjectConfig::load(project_root)?;
        config.merge_user_settings(UserSettings::load_default()?);
        Self::new(config, reporter)
    }
}
