//! Command implementations

pub mod install;
pub mod list;
pub mod nuke;
pub mod update;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use upkg_core::ops::Context;

use crate::ui::Output;

/// Open the project with a terminal reporter attached.
pub(crate) fn open_project(root: &Path) -> Result<Context> {
    Context::open(root, Arc::new(Output::new()))
        .with_context(|| format!("Failed to open project at {}", root.display()))
}
