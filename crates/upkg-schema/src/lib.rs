//! Shared types for upkg: package manifests, dependency declarations and
//! version comparison.

pub mod dependency;
pub mod manifest;
pub mod types;
pub mod version;

// Re-exports
pub use dependency::{DependencyDeclaration, DependencyNode, OverrideDestination};
pub use manifest::{
    InstallSpec, InstallSpecType, MANIFEST_FILE, ManifestError, PackageManifest,
    SIBLING_MANIFEST_SUFFIX, VersionSpec, os_friendly_path,
};
pub use types::{PackageName, Version};
pub use version::{DefaultComparator, VersionComparator};

/// File extension of package archives, without the dot.
pub const ARCHIVE_EXTENSION: &str = "unitypackage";
