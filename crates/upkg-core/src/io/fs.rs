//! Filesystem helpers shared by repositories and the installer.
//!
//! Copies report what they wrote and which directories they had to create,
//! so callers can record an exact footprint for later removal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extension of sidecar metadata files, without the dot.
pub const META_EXTENSION: &str = "meta";

/// What a copy wrote to disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Files written, as destination paths.
    pub files: Vec<PathBuf>,
    /// Directories that did not exist before the copy, outermost first.
    pub created_dirs: Vec<PathBuf>,
}

/// Sidecar path for `path`: `<path>.meta`.
pub fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(META_EXTENSION);
    PathBuf::from(name)
}

/// Returns true if `path` is a sidecar metadata file.
pub fn is_meta(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == META_EXTENSION)
}

/// Create `dir` and any missing ancestors, returning the ones that were
/// actually created, outermost first.
///
/// # Errors
///
/// Returns an error if a directory cannot be created.
pub fn create_dir_tracked(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }
    fs::create_dir_all(dir)?;
    missing.reverse();
    Ok(missing)
}

/// Copy the tree under `src` into `dst`, sidecars included.
///
/// Existing files at the destination are overwritten.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<CopyReport> {
    let mut report = CopyReport {
        created_dirs: create_dir_tracked(dst)?,
        ..CopyReport::default()
    };

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            report.created_dirs.extend(create_dir_tracked(&target)?);
        } else {
            fs::copy(entry.path(), &target)?;
            report.files.push(target);
        }
    }

    Ok(report)
}

/// Copy a single file to `dst`, plus its `.meta` sidecar when one exists.
///
/// # Errors
///
/// Returns an error if either file cannot be copied.
pub fn copy_file_with_meta(src: &Path, dst: &Path) -> io::Result<CopyReport> {
    let mut report = CopyReport::default();
    if let Some(parent) = dst.parent() {
        report.created_dirs = create_dir_tracked(parent)?;
    }

    fs::copy(src, dst)?;
    report.files.push(dst.to_path_buf());

    let src_meta = meta_path(src);
    if src_meta.is_file() {
        let dst_meta = meta_path(dst);
        fs::copy(&src_meta, &dst_meta)?;
        report.files.push(dst_meta);
    }

    Ok(report)
}

/// Move every entry of `from` directly into `to`.
///
/// # Errors
///
/// Returns an error if `from` cannot be listed or an entry cannot be renamed.
pub fn move_dir_contents(from: &Path, to: &Path) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        fs::rename(entry.path(), to.join(entry.file_name()))?;
    }
    Ok(())
}

/// Remove a directory only if it is empty. Returns whether it was removed.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or removed.
pub fn remove_dir_if_empty(dir: &Path) -> io::Result<bool> {
    if fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir)?;
    Ok(true)
}
