//! Scratch directories
//!
//! A materialized package lives in a [`ScratchDirectory`] until it has been
//! installed. The directory is owned by whoever created it and is deleted
//! when released, on the happy path through [`ScratchDirectory::close`] and
//! on every early return or error through `Drop`.

use std::io;
use std::path::Path;

/// An exclusively owned temporary directory holding one package's files.
#[derive(Debug)]
pub struct ScratchDirectory {
    temp_dir: tempfile::TempDir,
}

impl ScratchDirectory {
    /// Create a fresh scratch directory in the system temp location.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("upkg-").tempdir()?;
        Ok(Self { temp_dir })
    }

    /// Create a fresh scratch directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` cannot be created or written to.
    pub fn new_in(parent: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let temp_dir = tempfile::Builder::new()
            .prefix("upkg-")
            .tempdir_in(parent)?;
        Ok(Self { temp_dir })
    }

    /// Access the root path
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Delete the directory now, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree could not be removed.
    pub fn close(self) -> io::Result<()> {
        self.temp_dir.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_removes_directory() {
        let scratch = ScratchDirectory::new().unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("file.txt"), b"x").unwrap();
        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDirectory::new_in(parent.path()).unwrap();
            std::fs::create_dir(scratch.path().join("nested")).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
