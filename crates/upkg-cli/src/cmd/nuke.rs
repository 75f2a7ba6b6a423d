//! Nuke command
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use upkg_core::ops;

use super::open_project;

/// Remove one package, or every installed package with `all`
pub fn nuke(root: &Path, name: Option<&str>, all: bool, yes: bool) -> Result<()> {
    let start = Instant::now();
    let mut ctx = open_project(root)?;

    if all {
        if ctx.tracking.installed_packages().is_empty() {
            ctx.reporter.info("No packages installed.");
            return Ok(());
        }

        if !yes && !confirm("This will remove all installed packages.")? {
            ctx.reporter.warning("Operation cancelled");
            return Ok(());
        }

        let count = ops::nuke_all_packages(&mut ctx).context("Failed to remove packages")?;
        ctx.reporter
            .summary(count, "removed", start.elapsed().as_secs_f64());
        return Ok(());
    }

    let Some(name) = name else {
        anyhow::bail!("Specify a package name or --all");
    };

    let removed =
        ops::nuke_package(&mut ctx, name).with_context(|| format!("Failed to remove '{name}'"))?;
    if removed {
        ctx.reporter
            .summary(1, "removed", start.elapsed().as_secs_f64());
    } else {
        ctx.reporter
            .info(&format!("{name} is not installed, nothing to remove"));
    }
    Ok(())
}

fn confirm(message: &str) -> Result<bool> {
    println!();
    print!(
        "  {} {message} Continue? (y/N) ",
        "WARNING:".bold().red()
    );
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
