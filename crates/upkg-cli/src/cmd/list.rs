//! List commands
use std::path::Path;

use anyhow::Result;
use upkg_core::locator::PackageLocator;

use super::open_project;
use crate::ui::list::{print_list_footer, print_list_header, print_list_row};

/// List all installed packages
pub fn list(root: &Path) -> Result<()> {
    let ctx = open_project(root)?;
    let packages = ctx.tracking.installed_packages();

    if packages.is_empty() {
        println!();
        println!("  No packages installed.");
        println!("  Run 'upkg install' to install the dependencies in Upfile.toml.");
        return Ok(());
    }

    print_list_header("files");
    for pkg in packages {
        let detail = format!("{} entries", pkg.entries.len());
        print_list_row(&pkg.name, &pkg.version, &detail);
    }
    print_list_footer(packages.len(), "installed");

    Ok(())
}

/// List every package the configured repositories provide
pub fn packages(root: &Path) -> Result<()> {
    let ctx = open_project(root)?;
    let locator = PackageLocator::from_config(&ctx.config);
    let available: Vec<_> = locator.packages().collect();

    if available.is_empty() {
        println!();
        println!("  No packages found in the configured repositories.");
        return Ok(());
    }

    print_list_header("license");
    for found in &available {
        let manifest = found.manifest;
        let marker = match ctx.tracking.get_installed_package(&manifest.name) {
            Some(record) if record.version == manifest.version => " (installed)",
            _ => "",
        };
        let detail = format!("{}{marker}", manifest.license);
        print_list_row(&manifest.name, &manifest.version, &detail);
    }
    print_list_footer(available.len(), "available");

    Ok(())
}
