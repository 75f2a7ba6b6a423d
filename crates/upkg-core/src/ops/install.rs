//! Installing and updating packages.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};
use upkg_schema::{
    DependencyDeclaration, InstallSpec, InstallSpecType, PackageManifest, PackageName, Version,
    os_friendly_path,
};

use crate::config::{DestinationConfig, PathConfiguration};
use crate::io::fs::{CopyReport, copy_dir_all, copy_file_with_meta, is_meta, meta_path};
use crate::locator::{PackageLocator, PackageRepo};
use crate::meta::read_guid;
use crate::ops::context::Context;
use crate::ops::error::InstallError;
use crate::ops::remove::nuke_package;
use crate::repository::{MaterializedPackage, RepositoryError};
use crate::resolver::{DependencySolver, MissingPackagePolicy, TransitiveDependencySolver};

/// Outcome of [`install_dependencies`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallSummary {
    /// Packages installed by this run.
    pub installed: Vec<(PackageName, Version)>,
    /// Packages already installed at the resolved version.
    pub unchanged: Vec<(PackageName, Version)>,
    /// Packages that could not be found or materialized.
    pub skipped: Vec<PackageName>,
}

/// Resolve the project's declared dependencies and install each of them.
///
/// # Errors
///
/// Returns an error if resolution fails, a required package is missing under
/// [`MissingPackagePolicy::Fail`], or any install step fails.
pub fn install_dependencies(
    ctx: &mut Context,
    locator: &PackageLocator,
) -> Result<InstallSummary, InstallError> {
    let solver = TransitiveDependencySolver::new(locator).on_missing(ctx.config.project.on_missing);
    install_dependencies_with(ctx, locator, &solver)
}

/// [`install_dependencies`] with a caller-supplied solver.
///
/// # Errors
///
/// See [`install_dependencies`].
pub fn install_dependencies_with(
    ctx: &mut Context,
    locator: &PackageLocator,
    solver: &dyn DependencySolver,
) -> Result<InstallSummary, InstallError> {
    let start = Instant::now();
    let mut summary = InstallSummary::default();

    ctx.reporter.section("Resolving dependencies");
    let declarations = solver.solve_dependencies(&ctx.config.dependencies)?;
    debug!(count = declarations.len(), "Resolved dependencies");

    ctx.reporter.section("Installing");
    for declaration in &declarations {
        let found = match locator.find_package_and_repository(declaration) {
            Ok(found) => found,
            Err(e) if ctx.config.project.on_missing == MissingPackagePolicy::Skip => {
                warn!("{e}");
                ctx.reporter.warning(&e.to_string());
                summary.skipped.push(declaration.name.clone());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let name = &found.manifest.name;
        let version = &found.manifest.version;

        let installed_version = ctx
            .tracking
            .get_installed_package(name)
            .map(|record| record.version.clone());
        if installed_version.as_ref() == Some(version) {
            debug!("{name} {version} is already installed");
            summary.unchanged.push((name.clone(), version.clone()));
            continue;
        }

        let package = match found.materialize() {
            Ok(package) => package,
            Err(e @ RepositoryError::UnsupportedPackageFormat { .. }) => {
                warn!("{e}");
                ctx.reporter.failed(name, version, &e.to_string());
                summary.skipped.push(name.clone());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(installed) = installed_version {
            info!("Replacing {name} {installed} with {version}");
        }
        install_package(ctx, package, declaration)?;
        summary.installed.push((name.clone(), version.clone()));
    }

    ctx.reporter.summary(
        summary.installed.len(),
        "installed",
        start.elapsed().as_secs_f64(),
    );
    Ok(summary)
}

/// Install a materialized package and release its scratch directory.
///
/// Any footprint already tracked under the package's name is removed
/// first, so the ledger never loses track of files on disk. The scratch
/// directory is removed whether or not the install succeeds. A failed
/// install still saves whatever footprint it recorded, so the package can
/// be nuked afterwards.
///
/// # Errors
///
/// Returns an error if removing the previous footprint, copying or
/// tracking fails.
pub fn install_package(
    ctx: &mut Context,
    package: MaterializedPackage,
    declaration: &DependencyDeclaration,
) -> Result<(), InstallError> {
    let MaterializedPackage { manifest, scratch } = package;

    let result = nuke_package(ctx, &manifest.name)
        .and_then(|_| install_from(ctx, &manifest, scratch.path(), declaration));

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(
            "Failed to remove scratch directory {}: {e}",
            scratch_path.display()
        );
    }

    if let Err(e) = &result {
        ctx.reporter
            .failed(&manifest.name, &manifest.version, &e.to_string());
        if let Err(save_err) = ctx.tracking.save() {
            warn!("Failed to save partial install of {}: {save_err}", manifest.name);
        }
    }
    result
}

/// Replace the installed version of a package with `package`.
///
/// The package is already materialized, so a broken new version can never
/// cost the old one. The previous footprint is removed before anything new
/// is copied. The project's declaration for the package is honored;
/// without one, everything is installed.
///
/// # Errors
///
/// Returns an error if removal or installation fails.
pub fn update_package(ctx: &mut Context, package: MaterializedPackage) -> Result<(), InstallError> {
    let name = package.manifest.name.clone();
    let declaration = ctx
        .config
        .declaration_for(&name)
        .cloned()
        .unwrap_or_else(|| DependencyDeclaration::new(name.clone(), package.manifest.version.clone()));

    install_package(ctx, package, &declaration)
}

/// Materialize a located package and update to it.
///
/// Nothing installed is touched until materializing succeeds.
///
/// # Errors
///
/// Returns an error if materializing or updating fails.
pub fn update_package_from_repo(
    ctx: &mut Context,
    found: PackageRepo<'_>,
) -> Result<(), InstallError> {
    let package = found.materialize()?;
    update_package(ctx, package)
}

fn install_from(
    ctx: &mut Context,
    manifest: &PackageManifest,
    source_root: &Path,
    declaration: &DependencyDeclaration,
) -> Result<(), InstallError> {
    let name = &manifest.name;
    ctx.reporter.installing(name, &manifest.version);
    ctx.tracking.add_package(name, &manifest.version);

    let root_dest = ctx.config.packages_root().join(manifest.package_directory());
    let report = copy_dir_all(source_root, &root_dest).map_err(InstallError::io(&root_dest))?;
    for dir in &report.created_dirs {
        if dir != &root_dest && root_dest.starts_with(dir) {
            ctx.tracking
                .add_directory(name, InstallSpecType::Root, ctx.config.tracked_path(dir))?;
        }
    }
    ctx.tracking.add_location(
        name,
        InstallSpecType::Root,
        ctx.config.tracked_path(&root_dest),
    )?;

    let mut files = 0;
    for spec in manifest.effective_install_specs() {
        if spec.spec_type == InstallSpecType::Root {
            debug!("{name}: root copy already made, ignoring explicit root spec");
            continue;
        }
        if declaration.skips(spec.spec_type) {
            info!("{name}: skipping {} files", spec.spec_type);
            continue;
        }

        let report = install_spec(ctx, manifest, source_root, &spec, declaration)?;
        files += report.files.len();
        record_copy(ctx, name, spec.spec_type, &report)?;
    }

    ctx.tracking.save()?;
    ctx.reporter
        .done(name, &manifest.version, &format!("{files} files"));
    info!("Installed {} {}", name, manifest.version);
    Ok(())
}

/// Destination root for a spec, before the spec's own path is applied.
fn spec_destination(
    ctx: &Context,
    manifest: &PackageManifest,
    spec: &InstallSpec,
    declaration: &DependencyDeclaration,
) -> PathBuf {
    let configured = ctx.config.destination_for(spec.spec_type);
    let PathConfiguration {
        location,
        skip_package_structure,
    } = match declaration.override_for(spec.spec_type) {
        Some(location) => PathConfiguration {
            location: location.to_string(),
            ..configured
        },
        None => configured,
    };

    let mut dest = ctx.config.resolve(os_friendly_path(&location));
    if !(skip_package_structure || spec.skip_package_structure) {
        dest.push(manifest.package_directory());
    }
    dest
}

fn install_spec(
    ctx: &Context,
    manifest: &PackageManifest,
    source_root: &Path,
    spec: &InstallSpec,
    declaration: &DependencyDeclaration,
) -> Result<CopyReport, InstallError> {
    let dest = spec_destination(ctx, manifest, spec, declaration);
    let source = if spec.path.is_empty() {
        source_root.to_path_buf()
    } else {
        source_root.join(&spec.path)
    };

    if source.is_file() {
        let target = match source.file_name() {
            Some(file_name) => dest.join(file_name),
            None => dest,
        };
        debug!("Copying {} to {}", source.display(), target.display());
        return copy_file_with_meta(&source, &target).map_err(InstallError::io(target));
    }

    if source.is_dir() {
        debug!("Copying {} to {}", source.display(), dest.display());
        return copy_dir_all(&source, &dest).map_err(InstallError::io(dest));
    }

    warn!(
        "{}: install path '{}' does not exist in the package",
        manifest.name, spec.path
    );
    Ok(CopyReport::default())
}

/// Record a copy's footprint.
///
/// Assets under the asset root that carry an identifier are tracked by it,
/// alongside where they landed. Everything else, sidecars included, is
/// tracked by path.
fn record_copy(
    ctx: &mut Context,
    name: &PackageName,
    spec_type: InstallSpecType,
    report: &CopyReport,
) -> Result<(), InstallError> {
    let asset_root = ctx.config.asset_root();
    let copied: HashSet<&Path> = report.files.iter().map(PathBuf::as_path).collect();

    for dir in &report.created_dirs {
        ctx.tracking
            .add_directory(name, spec_type, ctx.config.tracked_path(dir))?;
    }

    for file in &report.files {
        if is_meta(file) {
            if copied.contains(file.with_extension("").as_path()) {
                continue;
            }
            ctx.tracking
                .add_location(name, spec_type, ctx.config.tracked_path(file))?;
            continue;
        }

        let guid = if file.starts_with(&asset_root) {
            read_guid(file)
        } else {
            None
        };

        match guid {
            Some(guid) => {
                ctx.tracking
                    .add_guid(name, spec_type, guid, ctx.config.tracked_path(file))?;
            }
            None => {
                ctx.tracking
                    .add_location(name, spec_type, ctx.config.tracked_path(file))?;
                let sidecar = meta_path(file);
                if copied.contains(sidecar.as_path()) {
                    ctx.tracking
                        .add_location(name, spec_type, ctx.config.tracked_path(&sidecar))?;
                }
            }
        }
    }

    Ok(())
}
