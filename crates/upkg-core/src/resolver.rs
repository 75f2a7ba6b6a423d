//! Transitive dependency resolution.
//!
//! Declarations are expanded breadth-first. Each package name gets one
//! [`DependencyNode`]; when a name shows up again, the injected
//! [`ConflictPolicy`] decides which version the node keeps. A node's
//! sub-dependencies are read when it is created, and again each time the
//! policy moves it to a version not expanded before.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use upkg_schema::{
    DefaultComparator, DependencyDeclaration, DependencyNode, PackageName, Version,
    VersionComparator,
};

use crate::locator::{LocateError, PackageLocator};

/// Errors raised while resolving dependencies.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The dependency graph has a cycle.
    #[error("circular dependency: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// Packages on the cycle, first one repeated at the end.
        cycle: Vec<PackageName>,
    },

    /// A dependency was missing under [`MissingPackagePolicy::Fail`].
    #[error(transparent)]
    NotFound(#[from] LocateError),

    /// [`RejectDowngrade`] refused a lower requirement.
    #[error("{package} {existing} is already required; refusing downgrade to {requested}")]
    Downgrade {
        /// Package required twice.
        package: PackageName,
        /// Version already chosen.
        existing: Version,
        /// Lower version requested.
        requested: Version,
    },
}

fn format_cycle(cycle: &[PackageName]) -> String {
    cycle
        .iter()
        .map(PackageName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// What to do with a dependency no repository provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPackagePolicy {
    /// Warn and carry on without it.
    #[default]
    Skip,
    /// Abort the whole operation.
    Fail,
}

/// Decides the version a node keeps when a package is required twice.
pub trait ConflictPolicy {
    /// Version to keep, given the node so far and the new requirement.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy refuses the requirement.
    fn resolve(
        &self,
        existing: &DependencyNode,
        compared: &DependencyNode,
    ) -> Result<Version, ResolveError>;
}

impl<F> ConflictPolicy for F
where
    F: Fn(&DependencyNode, &DependencyNode) -> Result<Version, ResolveError>,
{
    fn resolve(
        &self,
        existing: &DependencyNode,
        compared: &DependencyNode,
    ) -> Result<Version, ResolveError> {
        self(existing, compared)
    }
}

/// Take the compared version only when it is strictly greater.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpgradeOnGreater<C = DefaultComparator> {
    comparator: C,
}

impl<C: VersionComparator> UpgradeOnGreater<C> {
    /// A policy comparing versions with `comparator`.
    pub fn new(comparator: C) -> Self {
        Self { comparator }
    }
}

impl<C: VersionComparator> ConflictPolicy for UpgradeOnGreater<C> {
    fn resolve(
        &self,
        existing: &DependencyNode,
        compared: &DependencyNode,
    ) -> Result<Version, ResolveError> {
        if self
            .comparator
            .greater_than(&compared.version, &existing.version)
        {
            info!(
                "Upgrading {} from {} to {}",
                existing.name, existing.version, compared.version
            );
            return Ok(compared.version.clone());
        }

        if compared.version != existing.version {
            info!(
                "Keeping {} {}, ignoring requirement {}",
                existing.name, existing.version, compared.version
            );
        }
        Ok(existing.version.clone())
    }
}

/// Like [`UpgradeOnGreater`], but a lower requirement is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectDowngrade<C = DefaultComparator> {
    comparator: C,
}

impl<C: VersionComparator> RejectDowngrade<C> {
    /// A policy comparing versions with `comparator`.
    pub fn new(comparator: C) -> Self {
        Self { comparator }
    }
}

impl<C: VersionComparator> ConflictPolicy for RejectDowngrade<C> {
    fn resolve(
        &self,
        existing: &DependencyNode,
        compared: &DependencyNode,
    ) -> Result<Version, ResolveError> {
        if self
            .comparator
            .greater_than(&existing.version, &compared.version)
        {
            return Err(ResolveError::Downgrade {
                package: existing.name.clone(),
                existing: existing.version.clone(),
                requested: compared.version.clone(),
            });
        }
        if self
            .comparator
            .greater_than(&compared.version, &existing.version)
        {
            return Ok(compared.version.clone());
        }
        Ok(existing.version.clone())
    }
}

/// Computes the full, version-reconciled set of packages to install.
pub trait DependencySolver {
    /// Expand `declarations` transitively.
    ///
    /// The result holds one declaration per package, in first-seen order,
    /// carrying the version the conflict policy settled on.
    ///
    /// # Errors
    ///
    /// Returns an error on a cycle, a policy rejection, or a missing
    /// package the solver is configured to fail on.
    fn solve_dependencies(
        &self,
        declarations: &[DependencyDeclaration],
    ) -> Result<Vec<DependencyDeclaration>, ResolveError>;
}

/// Worklist solver reading sub-dependencies from located manifests.
pub struct TransitiveDependencySolver<'a> {
    locator: &'a PackageLocator,
    policy: Box<dyn ConflictPolicy + 'a>,
    on_missing: MissingPackagePolicy,
}

impl std::fmt::Debug for TransitiveDependencySolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitiveDependencySolver")
            .field("on_missing", &self.on_missing)
            .finish_non_exhaustive()
    }
}

impl<'a> TransitiveDependencySolver<'a> {
    /// A solver using [`UpgradeOnGreater`] and skipping missing packages.
    pub fn new(locator: &'a PackageLocator) -> Self {
        Self {
            locator,
            policy: Box::new(UpgradeOnGreater::<DefaultComparator>::default()),
            on_missing: MissingPackagePolicy::Skip,
        }
    }

    /// Replace the conflict policy.
    pub fn with_policy(mut self, policy: impl ConflictPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Replace the missing-package policy.
    pub fn on_missing(mut self, on_missing: MissingPackagePolicy) -> Self {
        self.on_missing = on_missing;
        self
    }

    fn sub_dependencies(
        &self,
        declaration: &DependencyDeclaration,
    ) -> Result<Vec<DependencyDeclaration>, ResolveError> {
        match self.locator.find_manifest(declaration) {
            Ok(manifest) => Ok(manifest.dependencies.clone()),
            Err(e) if self.on_missing == MissingPackagePolicy::Skip => {
                warn!("{e}; its dependencies will not be resolved");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl DependencySolver for TransitiveDependencySolver<'_> {
    fn solve_dependencies(
        &self,
        declarations: &[DependencyDeclaration],
    ) -> Result<Vec<DependencyDeclaration>, ResolveError> {
        let mut nodes: HashMap<PackageName, DependencyNode> = HashMap::new();
        let mut order: Vec<DependencyDeclaration> = Vec::new();
        let mut edges: HashMap<PackageName, Vec<PackageName>> = HashMap::new();
        let mut expanded: HashSet<(PackageName, Version)> = HashSet::new();
        let mut queue: VecDeque<DependencyDeclaration> = declarations.iter().cloned().collect();

        while let Some(declaration) = queue.pop_front() {
            let compared = DependencyNode::from(&declaration);

            if let Some(existing) = nodes.get_mut(&declaration.name) {
                let resolved = self.policy.resolve(existing, &compared)?;
                if resolved == existing.version {
                    continue;
                }
                debug!(
                    "Resolved {} to {} (was {})",
                    existing.name, resolved, existing.version
                );
                existing.version = resolved.clone();

                if expanded.insert((declaration.name.clone(), resolved.clone())) {
                    let upgraded = DependencyDeclaration::new(declaration.name.clone(), resolved);
                    let children = self.sub_dependencies(&upgraded)?;
                    edges
                        .entry(declaration.name.clone())
                        .or_default()
                        .extend(children.iter().map(|c| c.name.clone()));
                    queue.extend(children);
                }
                continue;
            }

            expanded.insert((declaration.name.clone(), declaration.version.clone()));
            let children = self.sub_dependencies(&declaration)?;
            edges.insert(
                declaration.name.clone(),
                children.iter().map(|c| c.name.clone()).collect(),
            );
            queue.extend(children);
            nodes.insert(declaration.name.clone(), compared);
            order.push(declaration);
        }

        let roots: Vec<PackageName> = declarations.iter().map(|d| d.name.clone()).collect();
        detect_cycles(&roots, &edges)?;

        Ok(order
            .into_iter()
            .map(|mut declaration| {
                if let Some(node) = nodes.get(&declaration.name) {
                    declaration.version = node.version.clone();
                }
                declaration
            })
            .collect())
    }
}

/// Depth-first walk over the dependency edges, failing on the first cycle.
fn detect_cycles(
    roots: &[PackageName],
    edges: &HashMap<PackageName, Vec<PackageName>>,
) -> Result<(), ResolveError> {
    let mut visited = HashSet::new();
    let mut stack = Vec::new();
    for root in roots {
        visit(root, edges, &mut visited, &mut stack)?;
    }
    Ok(())
}

fn visit(
    name: &PackageName,
    edges: &HashMap<PackageName, Vec<PackageName>>,
    visited: &mut HashSet<PackageName>,
    stack: &mut Vec<PackageName>,
) -> Result<(), ResolveError> {
    if visited.contains(name) {
        return Ok(());
    }

    if let Some(start) = stack.iter().position(|n| n == name) {
        let mut cycle = stack[start..].to_vec();
        cycle.push(name.clone());
        return Err(ResolveError::CyclicDependency { cycle });
    }

    stack.push(name.clone());
    for dep in edges.get(name).into_iter().flatten() {
        visit(dep, edges, visited, stack)?;
    }
    stack.pop();
    visited.insert(name.clone());

    Ok(())
}
