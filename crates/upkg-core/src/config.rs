//! Project configuration (`Upfile.toml`) and user settings.
//!
//! ```toml
//! [project]
//! packages_root = "UPackages"
//! asset_root = "Assets"
//! on_missing = "skip"
//!
//! [[repositories]]
//! path = "../SharedPackages"
//!
//! [destinations.docs]
//! location = "Documentation"
//! skip_package_structure = false
//!
//! [[dependencies]]
//! name = "Tweening"
//! version = "^1.2"
//! skip_install = ["examples"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use upkg_schema::{DependencyDeclaration, InstallSpecType};

use crate::resolver::MissingPackagePolicy;

/// File name of the project configuration.
pub const PROJECT_FILE: &str = "Upfile.toml";

/// Errors raised while loading project or user settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The directory has no `Upfile.toml`.
    #[error("no Upfile.toml found in {}", .0.display())]
    NotAProject(PathBuf),

    /// A settings file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Settings file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A settings file is not valid TOML for its schema.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Settings file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A `[destinations]` key names no install-spec type.
    #[error("unknown destination '{0}' in Upfile.toml")]
    UnknownDestination(String),
}

/// Where files of one install-spec type go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfiguration {
    /// Destination root, relative to the project root unless absolute.
    pub location: String,
    /// Install directly under `location` instead of `location/Name~Version`.
    #[serde(default)]
    pub skip_package_structure: bool,
}

impl PathConfiguration {
    fn new(location: &str, skip_package_structure: bool) -> Self {
        Self {
            location: location.to_string(),
            skip_package_structure,
        }
    }
}

/// Destination lookup consumed by the installer.
pub trait DestinationConfig {
    /// Destination for files of `spec_type`.
    fn destination_for(&self, spec_type: InstallSpecType) -> PathConfiguration;
}

/// Built-in destination for each install-spec type.
pub fn default_destination(spec_type: InstallSpecType) -> PathConfiguration {
    match spec_type {
        InstallSpecType::Root => PathConfiguration::new("UPackages", false),
        InstallSpecType::Base => PathConfiguration::new("Assets/UPackages", false),
        InstallSpecType::Docs => PathConfiguration::new("UDocs", false),
        InstallSpecType::Examples => PathConfiguration::new("Assets/UExamples", false),
        InstallSpecType::Media => PathConfiguration::new("Assets/UMedia", false),
        InstallSpecType::Plugin => PathConfiguration::new("Assets/Plugins", true),
        InstallSpecType::EditorPlugin => PathConfiguration::new("Assets/Plugins/Editor", true),
        InstallSpecType::Gizmo => PathConfiguration::new("Assets/Gizmos", true),
    }
}

/// The `[project]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Where full package copies (`Name~Version`) are kept.
    pub packages_root: PathBuf,
    /// Root of the asset tree; files under it are tracked by identifier.
    pub asset_root: PathBuf,
    /// Tracking ledger location.
    pub tracking_file: PathBuf,
    /// What to do when a dependency is not found in any repository.
    pub on_missing: MissingPackagePolicy,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            packages_root: PathBuf::from("UPackages"),
            asset_root: PathBuf::from("Assets"),
            tracking_file: PathBuf::from("UPackages").join("Upbring.toml"),
            on_missing: MissingPackagePolicy::default(),
        }
    }
}

/// A file repository entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository root, relative to the project root unless absolute.
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectFile {
    #[serde(default)]
    project: ProjectSettings,
    #[serde(default)]
    repositories: Vec<RepositoryConfig>,
    #[serde(default)]
    destinations: BTreeMap<String, PathConfiguration>,
    #[serde(default)]
    dependencies: Vec<DependencyDeclaration>,
}

/// A loaded project.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    root: PathBuf,
    /// `[project]` settings.
    pub project: ProjectSettings,
    /// Repositories, in search order.
    pub repositories: Vec<RepositoryConfig>,
    /// Destination per install-spec type, defaults filled in.
    pub destinations: BTreeMap<InstallSpecType, PathConfiguration>,
    /// Declared top-level dependencies.
    pub dependencies: Vec<DependencyDeclaration>,
}

impl ProjectConfig {
    /// Load `Upfile.toml` from `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAProject`] if the file is missing, and an
    /// I/O or parse error if it cannot be read.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(PROJECT_FILE);
        if !path.is_file() {
            return Err(ConfigError::NotAProject(project_root.to_path_buf()));
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(project_root, &content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path, source },
            other => other,
        })
    }

    /// Parse project configuration text for a project at `project_root`.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or an unknown destination name.
    pub fn parse(project_root: &Path, content: &str) -> Result<Self, ConfigError> {
        let file: ProjectFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: project_root.join(PROJECT_FILE),
            source,
        })?;

        let destinations = file
            .destinations
            .into_iter()
            .map(|(key, dest)| {
                key.parse::<InstallSpecType>()
                    .map(|spec_type| (spec_type, dest))
                    .map_err(|_| ConfigError::UnknownDestination(key))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            root: project_root.to_path_buf(),
            project: file.project,
            repositories: file.repositories,
            destinations,
            dependencies: file.dependencies,
        })
    }

    /// A project with default settings and nothing declared.
    pub fn with_defaults(project_root: &Path) -> Self {
        Self {
            root: project_root.to_path_buf(),
            project: ProjectSettings::default(),
            repositories: Vec::new(),
            destinations: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    /// Append repositories from user settings after the project's own.
    pub fn merge_user_settings(&mut self, settings: UserSettings) {
        self.repositories.extend(settings.repositories);
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Where full package copies are kept.
    pub fn packages_root(&self) -> PathBuf {
        self.resolve(self.destination_for(InstallSpecType::Root).location)
    }

    /// Root of the asset tree scanned for identifiers.
    pub fn asset_root(&self) -> PathBuf {
        self.resolve(&self.project.asset_root)
    }

    /// Location of the tracking ledger.
    pub fn tracking_path(&self) -> PathBuf {
        self.resolve(&self.project.tracking_file)
    }

    /// Repository roots, in search order.
    pub fn repository_paths(&self) -> Vec<PathBuf> {
        self.repositories
            .iter()
            .map(|r| self.resolve(&r.path))
            .collect()
    }

    /// The project's declaration for a package, if it declares one.
    pub fn declaration_for(&self, name: &str) -> Option<&DependencyDeclaration> {
        self.dependencies.iter().find(|d| d.name == *name)
    }

    /// Store a path relative to the project root when it lives inside it.
    pub fn tracked_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

impl DestinationConfig for ProjectConfig {
    fn destination_for(&self, spec_type: InstallSpecType) -> PathConfiguration {
        match self.destinations.get(&spec_type) {
            Some(dest) => dest.clone(),
            None if spec_type == InstallSpecType::Root => PathConfiguration {
                location: self.project.packages_root.to_string_lossy().into_owned(),
                skip_package_structure: false,
            },
            None => default_destination(spec_type),
        }
    }
}

/// Per-user settings (`~/.upkg/settings.toml`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Repositories searched after the project's own.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

impl UserSettings {
    /// Load settings from `path`. Missing files yield defaults; relative
    /// repository paths are resolved against the settings directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for repo in &mut settings.repositories {
                repo.path = base.join(&repo.path);
            }
        }
        Ok(settings)
    }

    /// Load settings from the upkg home directory, if one can be resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but is unreadable.
    pub fn load_default() -> Result<Self, ConfigError> {
        match crate::paths::settings_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[project]
asset_root = "Assets"
on_missing = "fail"

[[repositories]]
path = "Packages"

[destinations.docs]
location = "Documentation"
skip_package_structure = true

[[dependencies]]
name = "Tweening"
version = "1.2.0"
skip_install = ["examples"]
"#;

    #[test]
    fn test_parse_project() {
        let root = Path::new("/project");
        let config = ProjectConfig::parse(root, SAMPLE).unwrap();

        assert_eq!(config.project.on_missing, MissingPackagePolicy::Fail);
        assert_eq!(config.packages_root(), root.join("UPackages"));
        assert_eq!(config.tracking_path(), root.join("UPackages/Upbring.toml"));
        assert_eq!(config.repository_paths(), vec![root.join("Packages")]);
        assert_eq!(
            config.destination_for(InstallSpecType::Docs),
            PathConfiguration::new("Documentation", true)
        );
        assert_eq!(
            config.destination_for(InstallSpecType::Base),
            default_destination(InstallSpecType::Base)
        );
        assert!(config.declaration_for("Tweening").is_some());
        assert!(config.declaration_for("tweening").is_none());
    }

    #[test]
    fn test_unknown_destination_is_rejected() {
        let err = ProjectConfig::parse(
            Path::new("/project"),
            "[destinations.textures]\nlocation = \"x\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDestination(key) if key == "textures"));
    }

    #[test]
    fn test_load_missing_project() {
        let dir = tempdir().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotAProject(_)));
    }

    #[test]
    fn test_user_settings_append_repositories() {
        let dir = tempdir().unwrap();
        let settings_path = dir.path().join("settings.toml");
        fs::write(&settings_path, "[[repositories]]\npath = \"shared\"\n").unwrap();
        fs::write(dir.path().join(PROJECT_FILE), SAMPLE).unwrap();

        let mut config = ProjectConfig::load(dir.path()).unwrap();
        config.merge_user_settings(UserSettings::load(&settings_path).unwrap());

        assert_eq!(
            config.repository_paths(),
            vec![dir.path().join("Packages"), dir.path().join("shared")]
        );
    }

    #[test]
    fn test_tracked_path_is_project_relative() {
        let config = ProjectConfig::with_defaults(Path::new("/project"));
        assert_eq!(
            config.tracked_path(Path::new("/project/Assets/A.cs")),
            "Assets/A.cs"
        );
        assert_eq!(config.tracked_path(Path::new("/elsewhere/A.cs")), "/elsewhere/A.cs");
    }
}
