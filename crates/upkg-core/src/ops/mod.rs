//! Orchestration: install, update and nuke against a project.

pub mod context;
pub mod error;
pub mod install;
pub mod remove;

pub use context::Context;
pub use error::InstallError;
pub use install::{
    InstallSummary, install_dependencies, install_dependencies_with, install_package,
    update_package, update_package_from_repo,
};
pub use remove::{nuke_all_packages, nuke_package};
