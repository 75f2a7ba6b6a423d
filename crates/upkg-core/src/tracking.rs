//! Tracking store (`Upbring.toml`)
//!
//! Ledger of installed packages and the concrete footprint each one owns:
//! paths written under the project, and asset identifiers for files that
//! live in the asset tree. Nothing outside this ledger is ever removed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use upkg_schema::{InstallSpecType, PackageName, Version};

/// Errors raised while reading or updating the ledger.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// The ledger file could not be read or written.
    #[error("failed to access tracking file {}: {source}", path.display())]
    Io {
        /// Ledger file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The ledger file is not valid TOML for a ledger.
    #[error("failed to parse tracking file {}: {source}", path.display())]
    Parse {
        /// Ledger file.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// The ledger could not be serialized.
    #[error("failed to serialize tracking file: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An entry was added for a package with no record.
    #[error("package '{0}' is not tracked")]
    NotTracked(PackageName),
}

/// One piece of an installed package's footprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallEntry {
    /// A file or directory, relative to the project root unless absolute.
    Location {
        /// Install spec that produced the entry.
        #[serde(rename = "type")]
        spec_type: InstallSpecType,
        /// Tracked path.
        path: String,
    },
    /// An asset known by its sidecar identifier.
    Guid {
        /// Install spec that produced the entry.
        #[serde(rename = "type")]
        spec_type: InstallSpecType,
        /// Identifier from the asset's sidecar.
        guid: String,
        /// Where the asset was installed. The identifier wins if the asset
        /// has since moved.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// A directory the install created; removed only once empty.
    Directory {
        /// Install spec that produced the entry.
        #[serde(rename = "type")]
        spec_type: InstallSpecType,
        /// Tracked path.
        path: String,
    },
}

impl InstallEntry {
    /// Install spec that produced the entry.
    pub fn spec_type(&self) -> InstallSpecType {
        match self {
            Self::Location { spec_type, .. }
            | Self::Guid { spec_type, .. }
            | Self::Directory { spec_type, .. } => *spec_type,
        }
    }
}

/// An installed package and everything it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Package name.
    pub name: PackageName,
    /// Installed version.
    pub version: Version,
    /// Footprint, in recording order.
    #[serde(default, rename = "install", skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<InstallEntry>,
}

impl InstallRecord {
    /// Location entries, in recording order.
    pub fn locations(&self) -> impl Iterator<Item = (InstallSpecType, &str)> {
        self.entries.iter().filter_map(|e| match e {
            InstallEntry::Location { spec_type, path } => Some((*spec_type, path.as_str())),
            _ => None,
        })
    }

    /// Identifier entries, in recording order.
    pub fn guids(&self) -> impl Iterator<Item = (InstallSpecType, &str)> {
        self.entries.iter().filter_map(|e| match e {
            InstallEntry::Guid {
                spec_type, guid, ..
            } => Some((*spec_type, guid.as_str())),
            _ => None,
        })
    }

    /// Created directories, in recording order.
    pub fn directories(&self) -> impl Iterator<Item = (InstallSpecType, &str)> {
        self.entries.iter().filter_map(|e| match e {
            InstallEntry::Directory { spec_type, path } => Some((*spec_type, path.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    #[serde(default, rename = "package")]
    packages: Vec<InstallRecord>,
}

/// The persistent ledger, bound to its file.
#[derive(Debug)]
pub struct TrackingStore {
    path: PathBuf,
    ledger: Ledger,
}

impl TrackingStore {
    /// Load the ledger at `path`.
    ///
    /// A missing file yields an empty store, so a first install looks the
    /// same as any later one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, TrackingError> {
        if !path.exists() {
            return Ok(Self::empty(path));
        }

        let content = fs::read_to_string(path).map_err(|source| TrackingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ledger = toml::from_str(&content).map_err(|source| TrackingError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            ledger,
        })
    }

    /// An empty store that will be written to `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ledger: Ledger::default(),
        }
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persist the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing, or the rename fails.
    pub fn save(&self) -> Result<(), TrackingError> {
        let content = toml::to_string_pretty(&self.ledger)?;
        let io_err = |source| TrackingError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("toml.tmp");
        fs::write(&temp_path, &content).map_err(io_err)?;
        fs::rename(&temp_path, &self.path).map_err(io_err)?;

        Ok(())
    }

    /// Delete the ledger file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove_file(&mut self) -> Result<(), TrackingError> {
        self.ledger.packages.clear();
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(TrackingError::Io {
                path: self.path.clone(),
                source: e,
            }),
            _ => Ok(()),
        }
    }

    /// Start tracking a package, replacing any record with the same name.
    pub fn add_package(&mut self, name: &PackageName, version: &Version) {
        self.ledger.packages.retain(|p| &p.name != name);
        self.ledger.packages.push(InstallRecord {
            name: name.clone(),
            version: version.clone(),
            entries: Vec::new(),
        });
        self.ledger.packages.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Stop tracking a package, returning its record.
    pub fn remove_package(&mut self, name: &str) -> Option<InstallRecord> {
        let index = self.ledger.packages.iter().position(|p| p.name == *name)?;
        Some(self.ledger.packages.remove(index))
    }

    /// Record a path owned by `package`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotTracked`] if the package has no record.
    pub fn add_location(
        &mut self,
        package: &PackageName,
        spec_type: InstallSpecType,
        path: impl Into<String>,
    ) -> Result<(), TrackingError> {
        self.push_entry(
            package,
            InstallEntry::Location {
                spec_type,
                path: path.into(),
            },
        )
    }

    /// Record an asset identifier owned by `package`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotTracked`] if the package has no record.
    pub fn add_guid(
        &mut self,
        package: &PackageName,
        spec_type: InstallSpecType,
        guid: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<(), TrackingError> {
        self.push_entry(
            package,
            InstallEntry::Guid {
                spec_type,
                guid: guid.into(),
                path: Some(path.into()),
            },
        )
    }

    /// Record a directory created while installing `package`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotTracked`] if the package has no record.
    pub fn add_directory(
        &mut self,
        package: &PackageName,
        spec_type: InstallSpecType,
        path: impl Into<String>,
    ) -> Result<(), TrackingError> {
        self.push_entry(
            package,
            InstallEntry::Directory {
                spec_type,
                path: path.into(),
            },
        )
    }

    fn push_entry(&mut self, package: &PackageName, entry: InstallEntry) -> Result<(), TrackingError> {
        let record = self
            .ledger
            .packages
            .iter_mut()
            .find(|p| &p.name == package)
            .ok_or_else(|| TrackingError::NotTracked(package.clone()))?;
        if !record.entries.contains(&entry) {
            record.entries.push(entry);
        }
        Ok(())
    }

    /// Find an installed package by name.
    pub fn get_installed_package(&self, name: &str) -> Option<&InstallRecord> {
        self.ledger.packages.iter().find(|p| p.name == *name)
    }

    /// All installed packages, sorted by name.
    pub fn installed_packages(&self) -> &[InstallRecord] {
        &self.ledger.packages
    }
}
