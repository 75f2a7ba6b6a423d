//! Finding which repository provides a dependency.

use thiserror::Error;
use tracing::{debug, warn};
use upkg_schema::{
    DefaultComparator, DependencyDeclaration, PackageManifest, PackageName, Version,
    VersionComparator,
};

use crate::config::ProjectConfig;
use crate::repository::{FileRepository, MaterializedPackage, PackageRepository, RepositoryError};

/// Errors raised while looking a package up.
#[derive(Error, Debug)]
pub enum LocateError {
    /// No repository has a matching package.
    #[error("package '{name}' matching version '{version}' not found in any repository")]
    PackageNotFound {
        /// Requested package.
        name: PackageName,
        /// Requested version requirement.
        version: Version,
    },
}

/// A manifest paired with the repository that can materialize it.
#[derive(Debug, Clone, Copy)]
pub struct PackageRepo<'a> {
    /// The package's manifest, as listed.
    pub manifest: &'a PackageManifest,
    /// Repository the manifest came from.
    pub repository: &'a dyn PackageRepository,
}

impl PackageRepo<'_> {
    /// Materialize the package's files into a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// Returns the repository's error if the package cannot be copied or
    /// decoded.
    pub fn materialize(&self) -> Result<MaterializedPackage, RepositoryError> {
        self.repository.materialize(self.manifest)
    }
}

/// Searches configured repositories, in order, for packages.
///
/// Each repository is listed once, when the locator is built.
pub struct PackageLocator {
    repositories: Vec<Box<dyn PackageRepository>>,
    listings: Vec<Vec<PackageManifest>>,
    comparator: Box<dyn VersionComparator>,
}

impl std::fmt::Debug for PackageLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageLocator")
            .field("repositories", &self.repositories)
            .finish_non_exhaustive()
    }
}

impl PackageLocator {
    /// Build a locator over `repositories` using the default comparator.
    pub fn new(repositories: Vec<Box<dyn PackageRepository>>) -> Self {
        Self::with_comparator(repositories, Box::new(DefaultComparator))
    }

    /// Build a locator with a custom version comparator.
    ///
    /// A repository that cannot be listed is skipped with a warning.
    pub fn with_comparator(
        repositories: Vec<Box<dyn PackageRepository>>,
        comparator: Box<dyn VersionComparator>,
    ) -> Self {
        let listings = repositories
            .iter()
            .map(|repo| match repo.list_packages() {
                Ok(manifests) => manifests,
                Err(e) => {
                    warn!("Skipping repository {repo:?}: {e}");
                    Vec::new()
                }
            })
            .collect();

        Self {
            repositories,
            listings,
            comparator,
        }
    }

    /// File repositories for every path configured in the project.
    pub fn from_config(config: &ProjectConfig) -> Self {
        let repositories = config
            .repository_paths()
            .into_iter()
            .map(|path| Box::new(FileRepository::new(path)) as Box<dyn PackageRepository>)
            .collect();
        Self::new(repositories)
    }

    /// Every known package with the repository providing it, in search order.
    pub fn packages(&self) -> impl Iterator<Item = PackageRepo<'_>> {
        self.repositories
            .iter()
            .zip(&self.listings)
            .flat_map(|(repo, manifests)| {
                manifests.iter().map(move |manifest| PackageRepo {
                    manifest,
                    repository: repo.as_ref(),
                })
            })
    }

    /// The first package whose name matches and whose version satisfies
    /// the declaration.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::PackageNotFound`] if no repository has one.
    pub fn find_package_and_repository(
        &self,
        declaration: &DependencyDeclaration,
    ) -> Result<PackageRepo<'_>, LocateError> {
        let found = self.packages().find(|candidate| {
            candidate.manifest.name == declaration.name
                && self
                    .comparator
                    .satisfies(&candidate.manifest.version, &declaration.version)
        });

        match found {
            Some(package) => {
                debug!(
                    "Located {} {} for requirement '{}'",
                    package.manifest.name, package.manifest.version, declaration.version
                );
                Ok(package)
            }
            None => Err(LocateError::PackageNotFound {
                name: declaration.name.clone(),
                version: declaration.version.clone(),
            }),
        }
    }

    /// Manifest of the package satisfying `declaration`.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::PackageNotFound`] if no repository has one.
    pub fn find_manifest(
        &self,
        declaration: &DependencyDeclaration,
    ) -> Result<&PackageManifest, LocateError> {
        self.find_package_and_repository(declaration)
            .map(|found| found.manifest)
    }
}
