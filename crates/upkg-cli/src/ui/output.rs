//! Terminal reporter.
//!
//! Lines are written whole under a lock so output from the core library
//! never interleaves.

use std::io::Write;
use std::sync::Mutex;

use crossterm::style::Stylize;
use upkg_core::Reporter;
use upkg_schema::{PackageName, Version};

use super::theme::{Theme, format_elapsed};

/// Prints progress and status lines to stdout.
#[derive(Debug, Default)]
pub struct Output {
    theme: Theme,
    lock: Mutex<()>,
}

impl Output {
    /// Create a new output handle.
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self, text: &str) {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }

    fn package(&self, icon: String, name: &PackageName, version: &Version, status: String) {
        let layout = &self.theme.layout;
        let name_part = format!("{:<width$}", name.as_str(), width = layout.name_width);
        let version_part = format!("{:<width$}", version.as_str(), width = layout.version_width);
        self.line(&format!(
            "  {icon} {} {} {status}",
            name_part.with(self.theme.colors.package_name),
            version_part.with(self.theme.colors.version),
        ));
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        self.line("");
        self.line(&format!("{}", title.bold()));
    }

    fn installing(&self, name: &PackageName, version: &Version) {
        let colors = &self.theme.colors;
        self.package(
            self.theme.icons.active.with(colors.active).to_string(),
            name,
            version,
            "installing".with(colors.secondary).to_string(),
        );
    }

    fn removing(&self, name: &PackageName, version: &Version) {
        let colors = &self.theme.colors;
        self.package(
            self.theme.icons.active.with(colors.warning).to_string(),
            name,
            version,
            "removing".with(colors.secondary).to_string(),
        );
    }

    fn done(&self, name: &PackageName, version: &Version, detail: &str) {
        let colors = &self.theme.colors;
        self.package(
            self.theme.icons.success.with(colors.success).to_string(),
            name,
            version,
            detail.with(colors.success).to_string(),
        );
    }

    fn failed(&self, name: &PackageName, version: &Version, reason: &str) {
        let colors = &self.theme.colors;
        self.package(
            self.theme.icons.error.with(colors.error).to_string(),
            name,
            version,
            reason.with(colors.error).to_string(),
        );
    }

    fn info(&self, msg: &str) {
        self.line(&format!(
            "  {} {msg}",
            self.theme.icons.info.with(self.theme.colors.secondary)
        ));
    }

    fn warning(&self, msg: &str) {
        self.line(&format!(
            "  {} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        ));
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        let noun = if count == 1 { "package" } else { "packages" };
        self.line("");
        self.line(&format!(
            "  {} {count} {noun} {action} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            format!("in {}", format_elapsed(elapsed_secs)).dark_grey()
        ));
    }
}
