//! Dependency declarations and resolver nodes.

use serde::{Deserialize, Serialize};

use crate::manifest::InstallSpecType;
use crate::types::{PackageName, Version};

/// Redirects one install-spec classification to a different location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideDestination {
    /// Classification being redirected.
    #[serde(rename = "type")]
    pub spec_type: InstallSpecType,
    /// Replacement destination root.
    pub location: String,
}

/// A declared requirement on a package, as written in a project file or in
/// a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    /// Required package.
    pub name: PackageName,
    /// Version requirement.
    #[serde(default = "any_version")]
    pub version: Version,
    /// Install-spec classifications not to install.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_install: Vec<InstallSpecType>,
    /// Per-classification destination overrides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub override_destination: Vec<OverrideDestination>,
}

fn any_version() -> Version {
    Version::new("*")
}

impl DependencyDeclaration {
    /// A declaration with no skips and no overrides.
    pub fn new(name: impl Into<PackageName>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            skip_install: Vec::new(),
            override_destination: Vec::new(),
        }
    }

    /// Returns true if specs of this classification must not be installed.
    pub fn skips(&self, spec_type: InstallSpecType) -> bool {
        self.skip_install.contains(&spec_type)
    }

    /// The override location for a classification, if any. First match wins.
    pub fn override_for(&self, spec_type: InstallSpecType) -> Option<&str> {
        self.override_destination
            .iter()
            .find(|o| o.spec_type == spec_type)
            .map(|o| o.location.as_str())
    }
}

/// Resolver-side view of a requirement: the package and the version
/// currently selected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Package name.
    pub name: PackageName,
    /// Currently selected version requirement.
    pub version: Version,
}

impl DependencyNode {
    /// Create a node.
    pub fn new(name: impl Into<PackageName>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl From<&DependencyDeclaration> for DependencyNode {
    fn from(decl: &DependencyDeclaration) -> Self {
        Self {
            name: decl.name.clone(),
            version: decl.version.clone(),
        }
    }
}
