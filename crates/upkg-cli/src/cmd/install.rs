//! Install command
use std::path::Path;

use anyhow::{Context, Result};
use upkg_core::locator::PackageLocator;
use upkg_core::ops;

use super::open_project;

/// Install every dependency declared by the project
pub fn install(root: &Path) -> Result<()> {
    let mut ctx = open_project(root)?;

    if ctx.config.dependencies.is_empty() {
        ctx.reporter.info("No dependencies declared in Upfile.toml.");
        return Ok(());
    }

    let locator = PackageLocator::from_config(&ctx.config);
    let summary =
        ops::install_dependencies(&mut ctx, &locator).context("Failed to install dependencies")?;

    if !summary.unchanged.is_empty() {
        ctx.reporter.info(&format!(
            "{} package(s) already up to date",
            summary.unchanged.len()
        ));
    }
    if !summary.skipped.is_empty() {
        let names: Vec<&str> = summary.skipped.iter().map(|n| n.as_str()).collect();
        ctx.reporter
            .warning(&format!("Skipped: {}", names.join(", ")));
    }

    Ok(())
}
