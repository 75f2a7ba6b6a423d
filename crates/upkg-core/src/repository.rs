//! Package repositories
//!
//! A [`FileRepository`] is a directory holding packages in two shapes:
//!
//! - exploded directories carrying an `Upset.toml` manifest
//! - `.unitypackage` archives, described by a sibling `<stem>.Upset.toml`
//!   or, failing that, by a `Name-Version` file name
//!
//! Materializing a package yields a fresh [`ScratchDirectory`] holding its
//! files, which the caller owns from then on.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use upkg_schema::{
    ARCHIVE_EXTENSION, MANIFEST_FILE, PackageManifest, PackageName, SIBLING_MANIFEST_SUFFIX,
    Version,
};

use crate::io::fs::copy_dir_all;
use crate::io::unitypackage::{self, ArchiveError};
use crate::scratch::ScratchDirectory;

/// Errors raised while listing or materializing packages.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A repository path could not be read or copied.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A package archive could not be decoded.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The listed package has no directory or archive to materialize.
    #[error("{name} {version} is neither a package directory nor a package archive")]
    UnsupportedPackageFormat {
        /// Package name.
        name: PackageName,
        /// Package version.
        version: Version,
    },
}

/// A package's files, ready to install.
#[derive(Debug)]
pub struct MaterializedPackage {
    /// Manifest with install paths adjusted to the materialized layout.
    pub manifest: PackageManifest,
    /// Owned directory holding the files.
    pub scratch: ScratchDirectory,
}

/// A source of packages.
pub trait PackageRepository: fmt::Debug {
    /// Every package this repository can provide.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    fn list_packages(&self) -> Result<Vec<PackageManifest>, RepositoryError>;

    /// Copy or decode a package's files into a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be copied or decoded, or has
    /// no supported layout.
    fn materialize(&self, manifest: &PackageManifest)
    -> Result<MaterializedPackage, RepositoryError>;
}

/// Packages stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// A repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RepositoryError + '_ {
        move |source| RepositoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn exploded_manifest(dir: &Path) -> Option<PackageManifest> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return None;
        }

        let mut manifest = match PackageManifest::from_file(&manifest_path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping package directory {}: {e}", dir.display());
                return None;
            }
        };
        manifest.normalize_install_paths();
        manifest.source_directory = file_name(dir);
        Some(manifest)
    }

    fn archive_manifest(&self, archive: &Path) -> Option<PackageManifest> {
        let stem = archive.file_stem()?.to_string_lossy().into_owned();
        let sibling = self.root.join(format!("{stem}{SIBLING_MANIFEST_SUFFIX}"));

        let mut manifest = if sibling.is_file() {
            match PackageManifest::from_file(&sibling) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping archive {}: {e}", archive.display());
                    return None;
                }
            }
        } else {
            match infer_manifest(&stem) {
                Some(m) => m,
                None => {
                    warn!(
                        "Skipping archive {}: file name is not 'Name-Version' and no {} exists",
                        archive.display(),
                        sibling.display()
                    );
                    return None;
                }
            }
        };

        manifest.normalize_install_paths();
        manifest.source_directory = file_name(archive);
        Some(manifest)
    }
}

impl PackageRepository for FileRepository {
    fn list_packages(&self) -> Result<Vec<PackageManifest>, RepositoryError> {
        let mut dirs = Vec::new();
        let mut archives = Vec::new();

        for entry in fs::read_dir(&self.root).map_err(Self::io_err(&self.root))? {
            let entry = entry.map_err(Self::io_err(&self.root))?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            } else if is_archive(&path) {
                archives.push(path);
            }
        }
        dirs.sort();
        archives.sort();

        let mut manifests: Vec<PackageManifest> = dirs
            .iter()
            .filter_map(|dir| Self::exploded_manifest(dir))
            .collect();
        manifests.extend(archives.iter().filter_map(|a| self.archive_manifest(a)));

        debug!(
            repository = %self.root.display(),
            count = manifests.len(),
            "Listed packages"
        );
        Ok(manifests)
    }

    fn materialize(
        &self,
        manifest: &PackageManifest,
    ) -> Result<MaterializedPackage, RepositoryError> {
        let source = self.root.join(&manifest.source_directory);
        let mut manifest = manifest.clone();

        if !manifest.source_directory.is_empty() && source.is_dir() {
            let scratch = ScratchDirectory::new().map_err(Self::io_err(&source))?;
            copy_dir_all(&source, scratch.path()).map_err(Self::io_err(&source))?;
            debug!(package = %manifest.name, "Copied package directory");
            return Ok(MaterializedPackage { manifest, scratch });
        }

        if source.is_file() && is_archive(&source) {
            let decoded = unitypackage::decode(&source)?;
            if let Some(prefix) = &decoded.collapsed_prefix {
                manifest.strip_install_prefix(prefix);
            }
            debug!(package = %manifest.name, assets = decoded.assets, "Decoded package archive");
            return Ok(MaterializedPackage {
                manifest,
                scratch: decoded.scratch,
            });
        }

        Err(RepositoryError::UnsupportedPackageFormat {
            name: manifest.name,
            version: manifest.version,
        })
    }
}

/// Returns true if `path` has the package-archive extension, in any case.
pub fn is_archive(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Build a manifest from a `Name-Version` archive stem.
///
/// The stem must contain exactly one hyphen with text on both sides.
pub fn infer_manifest(stem: &str) -> Option<PackageManifest> {
    let parts: Vec<&str> = stem.split('-').collect();
    match parts.as_slice() {
        [name, version] if !name.is_empty() && !version.is_empty() => {
            Some(PackageManifest::new(*name, *version))
        }
        _ => None,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use upkg_schema::{InstallSpecType, VersionSpec};
    use tempfile::tempdir;

    #[test]
    fn test_infer_manifest() {
        let manifest = infer_manifest("Tweening-1.2.0").unwrap();
        assert_eq!(manifest.name, "Tweening");
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(manifest.license, "Unknown");
        assert_eq!(manifest.host_version, VersionSpec::Min(Version::new("0.0.0")));
        assert!(manifest.install_specs.is_none());

        assert!(infer_manifest("Foo").is_none());
        assert!(infer_manifest("Foo-1.0-beta").is_none());
        assert!(infer_manifest("-1.0").is_none());
    }

    #[test]
    fn test_list_packages_directories_then_archives() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::create_dir(root.join("Zeta")).unwrap();
        fs::write(
            root.join("Zeta/Upset.toml"),
            "name = \"Zeta\"\nversion = \"2.0\"\n\n[[install]]\npath = \"Scripts/Core\"\ntype = \"base\"\n",
        )
        .unwrap();
        fs::create_dir(root.join("NoManifest")).unwrap();

        fs::write(root.join("Alpha-1.0.UNITYPACKAGE"), "").unwrap();
        fs::write(root.join("Beta.unitypackage"), "").unwrap();
        fs::write(
            root.join("Beta.Upset.toml"),
            "name = \"Beta\"\nversion = \"3.1\"\nlicense = \"MIT\"\n",
        )
        .unwrap();
        fs::write(root.join("Foo.unitypackage"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let repo = FileRepository::new(root);
        let manifests = repo.list_packages().unwrap();
        let ids: Vec<_> = manifests
            .iter()
            .map(|m| (m.name.as_str(), m.version.as_str(), m.source_directory.as_str()))
            .collect();

        assert_eq!(
            ids,
            vec![
                ("Zeta", "2.0", "Zeta"),
                ("Alpha", "1.0", "Alpha-1.0.UNITYPACKAGE"),
                ("Beta", "3.1", "Beta.unitypackage"),
            ]
        );
        let specs = manifests[0].install_specs.as_ref().unwrap();
        assert_eq!(
            specs[0].path,
            upkg_schema::os_friendly_path("Scripts/Core")
        );
        assert_eq!(specs[0].spec_type, InstallSpecType::Base);
        assert_eq!(manifests[2].license, "MIT");
    }

    #[test]
    fn test_malformed_manifest_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Broken")).unwrap();
        fs::write(dir.path().join("Broken/Upset.toml"), "name = ").unwrap();

        let repo = FileRepository::new(dir.path());
        assert!(repo.list_packages().unwrap().is_empty());
    }

    #[test]
    fn test_materialize_directory() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("Lib");
        fs::create_dir_all(pkg.join("Scripts")).unwrap();
        fs::write(pkg.join("Upset.toml"), "name = \"Lib\"\nversion = \"1.0\"\n").unwrap();
        fs::write(pkg.join("Scripts/Lib.cs"), "class Lib {}").unwrap();
        fs::write(pkg.join("Scripts/Lib.cs.meta"), "guid: 01").unwrap();

        let repo = FileRepository::new(dir.path());
        let manifest = repo.list_packages().unwrap().remove(0);
        let materialized = repo.materialize(&manifest).unwrap();

        let scratch = materialized.scratch.path();
        assert!(scratch.join("Scripts/Lib.cs").is_file());
        assert!(scratch.join("Scripts/Lib.cs.meta").is_file());
        materialized.scratch.close().unwrap();
    }

    #[test]
    fn test_materialize_unknown_source() {
        let dir = tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let mut manifest = PackageManifest::new("Ghost", "1.0");
        manifest.source_directory = "Ghost-1.0.zip".into();

        let err = repo.materialize(&manifest).unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedPackageFormat { .. }));
    }
}
