//! Package manifest (`Upset.toml`)
//!
//! Describes a package's identity, license, host-version requirement, how its
//! files are laid out into the project, and which packages it depends on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dependency::DependencyDeclaration;
use crate::types::{PackageName, Version};

/// File name of a manifest inside an exploded package directory.
pub const MANIFEST_FILE: &str = "Upset.toml";

/// Suffix replacing `.unitypackage` for a manifest sitting next to an archive.
pub const SIBLING_MANIFEST_SUFFIX: &str = ".Upset.toml";

/// Separator between name and version in canonical package directories.
pub const PACKAGE_DIR_SEPARATOR: char = '~';

/// Errors that can occur when loading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        /// Manifest location.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The manifest content is not valid TOML for this schema.
    #[error("failed to parse manifest {}: {source}", path.display())]
    Parse {
        /// Manifest location.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Classification of an install spec.
///
/// Routes the spec to a destination and lets a dependency declaration skip
/// or redirect whole categories of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallSpecType {
    /// Full copy of the package kept under the packages root.
    Root,
    /// The package's main content.
    Base,
    /// Documentation.
    Docs,
    /// Example scenes and scripts.
    Examples,
    /// Media assets (textures, audio, models).
    Media,
    /// Runtime plugins.
    Plugin,
    /// Editor-only plugins.
    EditorPlugin,
    /// Gizmo icons.
    Gizmo,
}

impl InstallSpecType {
    /// Every classification, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Root,
        Self::Base,
        Self::Docs,
        Self::Examples,
        Self::Media,
        Self::Plugin,
        Self::EditorPlugin,
        Self::Gizmo,
    ];

    /// The snake_case name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Base => "base",
            Self::Docs => "docs",
            Self::Examples => "examples",
            Self::Media => "media",
            Self::Plugin => "plugin",
            Self::EditorPlugin => "editor_plugin",
            Self::Gizmo => "gizmo",
        }
    }
}

impl std::str::FromStr for InstallSpecType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown install spec type '{s}'"))
    }
}

impl fmt::Display for InstallSpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule describing what to copy out of a package and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Path inside the package. Empty means the whole package.
    #[serde(default)]
    pub path: String,
    /// Classification used to pick the destination.
    #[serde(rename = "type")]
    pub spec_type: InstallSpecType,
    /// Install directly under the destination, without the `Name~Version` folder.
    #[serde(default)]
    pub skip_package_structure: bool,
}

impl InstallSpec {
    /// A spec covering the whole package under the given classification.
    pub fn whole_package(spec_type: InstallSpecType) -> Self {
        Self {
            path: String::new(),
            spec_type,
            skip_package_structure: false,
        }
    }
}

/// Host-version requirement of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSpec {
    /// Any host at or above this version.
    Min(Version),
    /// Exactly this host version.
    Exact(Version),
}

impl Default for VersionSpec {
    fn default() -> Self {
        Self::Min(Version::new("0.0.0"))
    }
}

/// A package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Package name.
    pub name: PackageName,
    /// Package version.
    pub version: Version,
    /// License identifier.
    #[serde(default = "unknown_license")]
    pub license: String,
    /// Minimum (or exact) host version this package supports.
    #[serde(default)]
    pub host_version: VersionSpec,
    /// Install specs. `None` means "install the whole package as `base`",
    /// while an empty list installs nothing beyond the root copy.
    #[serde(default, rename = "install", skip_serializing_if = "Option::is_none")]
    pub install_specs: Option<Vec<InstallSpec>>,
    /// Packages this package depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDeclaration>,
    /// Where the package's files live inside its repository. Set on discovery.
    #[serde(skip)]
    pub source_directory: String,
}

fn unknown_license() -> String {
    "Unknown".to_string()
}

impl PackageManifest {
    /// Build a manifest with no install specs and no dependencies.
    pub fn new(name: impl Into<PackageName>, version: impl Into<Version>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            license: unknown_license(),
            host_version: VersionSpec::default(),
            install_specs: None,
            dependencies: Vec::new(),
            source_directory: String::new(),
        }
    }

    /// Parse a manifest from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the file cannot be read and
    /// [`ManifestError::Parse`] if its content does not match the schema.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a manifest from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `toml::de::Error` if the content does not match the schema.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Canonical directory name: `Name~Version`.
    pub fn package_directory(&self) -> String {
        format!("{}{PACKAGE_DIR_SEPARATOR}{}", self.name, self.version)
    }

    /// The specs to install: the declared ones, or a single whole-package
    /// `base` spec when none are declared.
    pub fn effective_install_specs(&self) -> Vec<InstallSpec> {
        match &self.install_specs {
            Some(specs) => specs.clone(),
            None => vec![InstallSpec::whole_package(InstallSpecType::Base)],
        }
    }

    /// Rewrite every install-spec path to the host separator convention.
    pub fn normalize_install_paths(&mut self) {
        for spec in self.install_specs.iter_mut().flatten() {
            spec.path = os_friendly_path(&spec.path);
        }
    }

    /// Strip a collapsed archive prefix from install-spec paths that start with it.
    pub fn strip_install_prefix(&mut self, prefix: &Path) {
        for spec in self.install_specs.iter_mut().flatten() {
            let stripped = Path::new(&spec.path)
                .strip_prefix(prefix)
                .map(|rest| rest.to_string_lossy().into_owned());
            if let Ok(rest) = stripped {
                spec.path = rest;
            }
        }
    }
}

/// Convert `/` and `\` separated paths to the host convention.
pub fn os_friendly_path(path: &str) -> String {
    path.replace(['/', '\\'], std::path::MAIN_SEPARATOR_STR)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "Tweening"
version = "1.2.0"
license = "MIT"
host_version = { min = "2017.1" }

[[install]]
path = "Assets/Tweening"
type = "base"

[[install]]
path = "Assets/Tweening/Docs"
type = "docs"
skip_package_structure = true

[[dependencies]]
name = "Core"
version = "^1.0"
"#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = PackageManifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.name, "Tweening");
        assert_eq!(manifest.host_version, VersionSpec::Min(Version::new("2017.1")));
        let specs = manifest.install_specs.as_ref().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].spec_type, InstallSpecType::Docs);
        assert!(specs[1].skip_package_structure);
        assert_eq!(manifest.dependencies[0].name, "Core");
    }

    #[test]
    fn test_missing_install_means_whole_package() {
        let manifest = PackageManifest::parse("name = \"A\"\nversion = \"1.0\"\n").unwrap();
        assert!(manifest.install_specs.is_none());
        assert_eq!(manifest.license, "Unknown");
        assert_eq!(
            manifest.effective_install_specs(),
            vec![InstallSpec::whole_package(InstallSpecType::Base)]
        );
    }

    #[test]
    fn test_package_directory() {
        let manifest = PackageManifest::new("Foo", "1.0.0");
        assert_eq!(manifest.package_directory(), "Foo~1.0.0");
    }

    #[test]
    fn test_strip_install_prefix() {
        let mut manifest = PackageManifest::parse(SAMPLE).unwrap();
        manifest.normalize_install_paths();
        manifest.strip_install_prefix(&PathBuf::from("Assets").join("Tweening"));
        let specs = manifest.install_specs.unwrap();
        assert_eq!(specs[0].path, "");
        assert_eq!(specs[1].path, "Docs");
    }

    #[test]
    fn test_strip_install_prefix_is_component_wise() {
        let mut manifest = PackageManifest::new("Foo", "1.0.0");
        manifest.install_specs = Some(vec![InstallSpec {
            path: "Assets2/Foo".into(),
            spec_type: InstallSpecType::Base,
            skip_package_structure: false,
        }]);
        manifest.normalize_install_paths();
        manifest.strip_install_prefix(Path::new("Assets"));
        assert_eq!(
            manifest.install_specs.unwrap()[0].path,
            os_friendly_path("Assets2/Foo")
        );
    }

    #[test]
    fn test_spec_type_from_str() {
        assert_eq!(
            "editor_plugin".parse::<InstallSpecType>(),
            Ok(InstallSpecType::EditorPlugin)
        );
        assert!("nope".parse::<InstallSpecType>().is_err());
    }

    #[test]
    fn test_os_friendly_path() {
        let expected: PathBuf = ["a", "b", "c.txt"].iter().collect();
        assert_eq!(os_friendly_path("a/b\\c.txt"), expected.to_string_lossy());
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let err = PackageManifest::from_file(&path).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));

        fs::write(&path, "name = \"Foo\"\n").unwrap();
        let err = PackageManifest::from_file(&path).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { path: p, .. } if p == path));

        fs::write(&path, "name = \"Foo\"\nversion = \"1.0\"\n").unwrap();
        let manifest = PackageManifest::from_file(&path).unwrap();
        assert_eq!(manifest.package_directory(), "Foo~1.0");
    }
}
