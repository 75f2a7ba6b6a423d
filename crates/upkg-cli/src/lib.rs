//! upkg - a package manager for Unity-style asset projects
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves the dependencies declared in a project's `Upfile.toml`, pulls
//! packages from file repositories (exploded directories or `.unitypackage`
//! archives) and installs them into the project, tracking every file so it
//! can be removed again.
//!
//! # Project Layout
//!
//! ```text
//! MyGame/
//! ├── Upfile.toml          # Declared repositories and dependencies
//! ├── UPackages/
//! │   ├── Name~Version/    # Full copy of each installed package
//! │   └── Upbring.toml     # Tracking ledger
//! └── Assets/
//!     └── UPackages/       # Default destination for package content
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "upkg")]
#[command(author, version, about = "upkg - a package manager for Unity-style asset projects")]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, short = 'C', global = true, env = "UPKG_PROJECT")]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve and install every dependency declared in Upfile.toml
    Install,
    /// Replace an installed package with the version the project requires
    Update {
        /// Package name
        name: String,
    },
    /// Remove an installed package and every file it installed
    Nuke {
        /// Package name
        #[arg(required_unless_present = "all")]
        name: Option<String>,
        /// Remove all installed packages
        #[arg(long, short = 'a', conflicts_with = "name")]
        all: bool,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List installed packages
    List,
    /// List packages available in the configured repositories
    Packages,
}

impl Cli {
    /// The project root to operate on.
    pub fn project_root(&self) -> std::io::Result<PathBuf> {
        match &self.project {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir(),
        }
    }
}
