//! Column-aligned rendering for `upkg list` and `upkg packages`.

use super::theme::Theme;
use crossterm::style::Stylize;

/// Print column headers; `detail` names the last column.
pub fn print_list_header(detail: &str) {
    let theme = Theme::default();

    println!();
    let header = format!(
        "  {:<nw$} {:<vw$} {detail}",
        "name",
        "version",
        nw = theme.layout.name_width,
        vw = theme.layout.version_width,
    );
    println!("{}", header.dark_grey());
}

/// Print a single package row
pub fn print_list_row(name: &str, version: &str, detail: &str) {
    let theme = Theme::default();

    let name_part = format!("{:<width$}", name, width = theme.layout.name_width);
    let version_part = format!("{:<width$}", version, width = theme.layout.version_width);

    println!(
        "  {} {} {}",
        name_part.with(theme.colors.package_name),
        version_part.with(theme.colors.version),
        detail.with(theme.colors.secondary)
    );
}

/// Print the closing count line
pub fn print_list_footer(count: usize, status: &str) {
    println!();
    let noun = if count == 1 { "package" } else { "packages" };
    println!("{}", format!("  {count} {noun} {status}").dark_grey());
}
