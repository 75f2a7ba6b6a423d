//! Sidecar metadata
//!
//! Every asset in the asset tree has a `<file>.meta` sidecar whose `guid:`
//! line gives it an identifier that survives moves and renames.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::io::fs::{is_meta, meta_path};

/// Extract the `guid:` value from sidecar content.
pub fn parse_guid(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let value = line.trim().strip_prefix("guid:")?.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Read the identifier of `asset` from its sidecar, if it has one.
pub fn read_guid(asset: &Path) -> Option<String> {
    let content = fs::read_to_string(meta_path(asset)).ok()?;
    parse_guid(&content)
}

/// Map every identifier under `root` to the assets carrying it, in one walk.
///
/// Assets are the sidecar paths minus `.meta`. Copied assets can share an
/// identifier, so each one maps to every match, in path order.
pub fn guid_index(root: &Path) -> HashMap<String, Vec<PathBuf>> {
    let mut index: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let sidecars = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_meta(e.path()));

    for entry in sidecars {
        let Some(guid) = fs::read_to_string(entry.path())
            .ok()
            .and_then(|content| parse_guid(&content))
        else {
            continue;
        };
        index
            .entry(guid)
            .or_default()
            .push(entry.path().with_extension(""));
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_guid() {
        let content = "fileFormatVersion: 2\nguid: 5f1c2a9e0d\nTextureImporter:\n";
        assert_eq!(parse_guid(content), Some("5f1c2a9e0d".to_string()));
        assert_eq!(parse_guid("fileFormatVersion: 2\n"), None);
        assert_eq!(parse_guid("guid:   \n"), None);
    }

    #[test]
    fn test_guid_index() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("Plugins/Lib");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Lib.dll"), "bin").unwrap();
        fs::write(nested.join("Lib.dll.meta"), "guid: feedbeef\n").unwrap();
        fs::write(dir.path().join("Copy.dll"), "bin").unwrap();
        fs::write(dir.path().join("Copy.dll.meta"), "guid: feedbeef\n").unwrap();
        fs::write(dir.path().join("Plain.txt.meta"), "fileFormatVersion: 2\n").unwrap();

        assert_eq!(read_guid(&nested.join("Lib.dll")).as_deref(), Some("feedbeef"));

        let index = guid_index(dir.path());
        assert_eq!(index.len(), 1);
        assert_eq!(
            index["feedbeef"],
            vec![dir.path().join("Copy.dll"), nested.join("Lib.dll")]
        );
        assert!(guid_index(&dir.path().join("missing")).is_empty());
    }
}
