//! Update command
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use upkg_core::locator::PackageLocator;
use upkg_core::ops;
use upkg_schema::DependencyDeclaration;

use super::open_project;

/// Replace an installed package with the version the project requires
pub fn update(root: &Path, name: &str) -> Result<()> {
    let start = Instant::now();
    let mut ctx = open_project(root)?;

    let declaration = ctx
        .config
        .declaration_for(name)
        .cloned()
        .unwrap_or_else(|| DependencyDeclaration::new(name, "*"));

    let locator = PackageLocator::from_config(&ctx.config);
    let found = locator
        .find_package_and_repository(&declaration)
        .with_context(|| format!("Cannot update '{name}'"))?;

    if let Some(record) = ctx.tracking.get_installed_package(name) {
        if record.version == found.manifest.version {
            ctx.reporter.info(&format!(
                "{name} {} is already installed",
                record.version
            ));
            return Ok(());
        }
    }

    ops::update_package_from_repo(&mut ctx, found)
        .with_context(|| format!("Failed to update '{name}'"))?;
    ctx.reporter
        .summary(1, "updated", start.elapsed().as_secs_f64());
    Ok(())
}
