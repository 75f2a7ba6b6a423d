//! Terminal output
//!
//! `Output` implements the core `Reporter` so install and removal progress
//! reaches the terminal; `list` renders the column-aligned tables.

pub mod list;
pub mod output;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
