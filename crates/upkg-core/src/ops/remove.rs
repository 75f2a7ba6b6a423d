//! Removing installed packages ("nuke").

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::io::fs::{meta_path, remove_dir_if_empty};
use crate::meta::{guid_index, read_guid};
use crate::ops::context::Context;
use crate::ops::error::InstallError;
use crate::tracking::InstallEntry;

/// Remove everything a package's tracking record owns, then the record.
///
/// Returns `Ok(false)` when the package is not tracked, so nuking twice is
/// harmless. The dependency graph is never consulted.
///
/// # Errors
///
/// Returns an error if a tracked file cannot be deleted or the ledger
/// cannot be saved.
pub fn nuke_package(ctx: &mut Context, name: &str) -> Result<bool, InstallError> {
    let Some(record) = ctx.tracking.get_installed_package(name).cloned() else {
        debug!("{name} is not installed, nothing to nuke");
        return Ok(false);
    };

    ctx.reporter.removing(&record.name, &record.version);
    let asset_root = ctx.config.asset_root();

    let mut index = None;
    for entry in &record.entries {
        let InstallEntry::Guid { guid, path, .. } = entry else {
            continue;
        };
        let recorded = path
            .as_deref()
            .map(|p| ctx.config.resolve(p))
            .filter(|asset| read_guid(asset).as_deref() == Some(guid.as_str()));
        let asset = match recorded {
            Some(asset) => asset,
            None => {
                let index = index.get_or_insert_with(|| guid_index(&asset_root));
                match locate_moved_asset(index, guid) {
                    Some(asset) => asset,
                    None => continue,
                }
            }
        };
        remove_path(&asset)?;
        remove_path(&meta_path(&asset))?;
    }

    for (_, path) in record.locations() {
        remove_path(&ctx.config.resolve(path))?;
    }

    let mut dirs: Vec<PathBuf> = record
        .directories()
        .map(|(_, path)| ctx.config.resolve(path))
        .collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    dirs.dedup();
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        let removed = remove_dir_if_empty(&dir).map_err(InstallError::io(&dir))?;
        if !removed {
            debug!("Keeping {}: not empty", dir.display());
        }
    }

    ctx.tracking.remove_package(name);
    ctx.tracking.save()?;

    info!("Nuked {} {}", record.name, record.version);
    ctx.reporter.done(&record.name, &record.version, "removed");
    Ok(true)
}

/// Nuke every tracked package, then delete the ledger itself.
///
/// Returns the number of packages removed.
///
/// # Errors
///
/// Returns the first removal error; packages before it stay removed.
pub fn nuke_all_packages(ctx: &mut Context) -> Result<usize, InstallError> {
    let names: Vec<String> = ctx
        .tracking
        .installed_packages()
        .iter()
        .map(|p| p.name.to_string())
        .collect();

    let mut count = 0;
    for name in &names {
        if nuke_package(ctx, name)? {
            count += 1;
        }
    }

    ctx.tracking.remove_file()?;
    Ok(count)
}

/// Find an asset that left its recorded path. Only an unambiguous match
/// is returned; copies sharing the identifier are left alone.
fn locate_moved_asset(index: &HashMap<String, Vec<PathBuf>>, guid: &str) -> Option<PathBuf> {
    match index.get(guid).map(Vec::as_slice) {
        Some([asset]) => {
            debug!("Asset {guid} moved to {}", asset.display());
            Some(asset.clone())
        }
        Some([]) | None => {
            debug!("No asset with guid {guid} left in the project");
            None
        }
        Some(matches) => {
            warn!(
                "{} assets share guid {guid}, leaving them in place",
                matches.len()
            );
            None
        }
    }
}

/// Delete a file or a whole directory tree. Missing paths are fine.
fn remove_path(path: &Path) -> Result<(), InstallError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{} was already removed", path.display());
            return Ok(());
        }
        Err(e) => Err(e),
    };
    result.map_err(InstallError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::reporter::NullReporter;
    use std::sync::Arc;
    use tempfile::tempdir;
    use crate::tracking::TrackingStore;
    use upkg_schema::{InstallSpecType, PackageName, Version};

    fn context(root: &Path) -> Context {
        Context::new(ProjectConfig::with_defaults(root), Arc::new(NullReporter)).unwrap()
    }

    #[test]
    fn test_nuke_untracked_is_noop() {
        let project = tempdir().unwrap();
        let mut ctx = context(project.path());
        assert!(!nuke_package(&mut ctx, "Ghost").unwrap());
    }

    #[test]
    fn test_nuke_removes_only_tracked_paths() {
        let project = tempdir().unwrap();
        let root = project.path();
        let mut ctx = context(root);

        let assets = root.join("Assets/Lib");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("Lib.cs"), "code").unwrap();
        fs::write(assets.join("Lib.cs.meta"), "guid: c0ffee\n").unwrap();
        fs::write(assets.join("Mine.cs"), "user file").unwrap();
        fs::write(root.join("notes.txt"), "n").unwrap();

        let name = PackageName::new("Lib");
        ctx.tracking.add_package(&name, &Version::new("1.0"));
        ctx.tracking
            .add_guid(&name, InstallSpecType::Base, "c0ffee", "Assets/Lib/Lib.cs")
            .unwrap();
        ctx.tracking
            .add_location(&name, InstallSpecType::Docs, "notes.txt")
            .unwrap();
        ctx.tracking
            .add_directory(&name, InstallSpecType::Base, "Assets/Lib")
            .unwrap();

        assert!(nuke_package(&mut ctx, "Lib").unwrap());

        assert!(!assets.join("Lib.cs").exists());
        assert!(!assets.join("Lib.cs.meta").exists());
        assert!(!root.join("notes.txt").exists());
        assert!(assets.join("Mine.cs").is_file());
        assert!(ctx.tracking.get_installed_package("Lib").is_none());

        assert!(!nuke_package(&mut ctx, "Lib").unwrap());
    }

    #[test]
    fn test_nuke_all_removes_ledger() {
        let project = tempdir().unwrap();
        let mut ctx = context(project.path());
        for pkg in ["A", "B"] {
            let name = PackageName::new(pkg);
            ctx.tracking.add_package(&name, &Version::new("1.0"));
        }
        ctx.tracking.save().unwrap();

        assert_eq!(nuke_all_packages(&mut ctx).unwrap(), 2);
        assert!(!ctx.tracking.path().exists());
        assert!(ctx.tracking.installed_packages().is_empty());
    }

    fn tracked_asset(ctx: &mut Context, guid: &str, path: &str) {
        let name = PackageName::new("Lib");
        ctx.tracking.add_package(&name, &Version::new("1.0"));
        ctx.tracking
            .add_guid(&name, InstallSpecType::Base, guid, path)
            .unwrap();
    }

    fn asset(root: &Path, path: &str, guid: &str) -> PathBuf {
        let asset = root.join(path);
        fs::create_dir_all(asset.parent().unwrap()).unwrap();
        fs::write(&asset, "code").unwrap();
        fs::write(meta_path(&asset), format!("guid: {guid}\n")).unwrap();
        asset
    }

    #[test]
    fn test_nuke_leaves_copies_sharing_a_guid() {
        let project = tempdir().unwrap();
        let root = project.path();
        let mut ctx = context(root);

        let installed = asset(root, "Assets/Lib/Lib.cs", "c0ffee");
        let copy = asset(root, "Assets/Other/Lib.cs", "c0ffee");
        tracked_asset(&mut ctx, "c0ffee", "Assets/Lib/Lib.cs");

        assert!(nuke_package(&mut ctx, "Lib").unwrap());
        assert!(!installed.exists());
        assert!(copy.is_file());
        assert!(meta_path(&copy).is_file());
    }

    #[test]
    fn test_nuke_follows_moved_asset() {
        let project = tempdir().unwrap();
        let root = project.path();
        let mut ctx = context(root);

        let moved = asset(root, "Assets/Moved/Lib.cs", "c0ffee");
        tracked_asset(&mut ctx, "c0ffee", "Assets/Lib/Lib.cs");

        assert!(nuke_package(&mut ctx, "Lib").unwrap());
        assert!(!moved.exists());
        assert!(!meta_path(&moved).exists());
    }

    #[test]
    fn test_nuke_skips_ambiguous_guid_without_path() {
        let project = tempdir().unwrap();
        let root = project.path();
        let mut ctx = context(root);

        let first = asset(root, "Assets/A/Lib.cs", "c0ffee");
        let second = asset(root, "Assets/B/Lib.cs", "c0ffee");
        let ledger = ctx.tracking.path().to_path_buf();
        fs::create_dir_all(ledger.parent().unwrap()).unwrap();
        fs::write(
            &ledger,
            "[[package]]\nname = \"Lib\"\nversion = \"1.0\"\n\n\
             [[package.install]]\nkind = \"guid\"\ntype = \"base\"\nguid = \"c0ffee\"\n",
        )
        .unwrap();
        ctx.tracking = TrackingStore::load(&ledger).unwrap();

        assert!(nuke_package(&mut ctx, "Lib").unwrap());
        assert!(first.is_file());
        assert!(second.is_file());
    }
}
