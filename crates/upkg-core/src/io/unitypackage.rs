//! `.unitypackage` decoding
//!
//! A package archive is a gzip-compressed tar. Every logical asset sits in
//! its own synthetic directory holding up to three entries:
//!
//! - `<id>/asset`: the file payload
//! - `<id>/asset.meta`: an optional sidecar with the asset's metadata
//! - `<id>/pathname`: the install-relative path, `/`-separated
//!
//! Entries are scanned in stored order by [`DecodeState`], which keeps at
//! most one pending asset group. Archives written with the legacy
//! `metaData` layout are rejected.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, warn};

use crate::io::fs::{is_meta, meta_path, move_dir_contents};
use crate::scratch::ScratchDirectory;

/// Errors raised while decoding an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Reading the archive or writing the decoded tree failed.
    #[error("failed to read archive {}: {source}", path.display())]
    Io {
        /// Archive or output path involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The archive uses the legacy `metaData` layout.
    #[error("unsupported archive layout: legacy entry '{entry}'")]
    UnsupportedFormat {
        /// First legacy entry seen.
        entry: String,
    },

    /// A payload arrived while another was still waiting for its pathname.
    #[error("invalid archive: entry '{entry}' starts a payload while another is pending")]
    InvalidState {
        /// Offending entry.
        entry: String,
    },

    /// A pathname is not valid UTF-8, or escapes the output tree.
    #[error("invalid path in archive: '{pathname}'")]
    InvalidPath {
        /// Pathname as read, lossily decoded.
        pathname: String,
    },
}

/// What an archive entry is, judged by its name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `asset`: a payload.
    Asset,
    /// `asset.meta`: a sidecar.
    Meta,
    /// `metaData`: the unsupported legacy layout.
    LegacyMetaData,
    /// `pathname`: where the pending payload goes.
    Pathname,
    /// Anything else; ignored.
    Other,
}

impl EntryKind {
    /// Classify an entry by the end of its path.
    pub fn classify(entry_path: &str) -> Self {
        if entry_path.ends_with("asset") {
            Self::Asset
        } else if entry_path.ends_with("metaData") {
            Self::LegacyMetaData
        } else if entry_path.ends_with("meta") {
            Self::Meta
        } else if entry_path.ends_with("pathname") {
            Self::Pathname
        } else {
            Self::Other
        }
    }
}

/// An entry the state machine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A payload.
    Asset {
        /// Entry path inside the archive.
        name: String,
        /// File content.
        data: Vec<u8>,
    },
    /// A sidecar's content.
    Meta(Vec<u8>),
    /// The first line of a pathname entry.
    Pathname(String),
}

/// A complete asset group ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    /// Sanitized destination, relative to the output tree.
    pub relative_path: PathBuf,
    /// File content.
    pub payload: Vec<u8>,
    /// Sidecar content, if the group had one.
    pub sidecar: Option<Vec<u8>>,
}

/// Result of feeding one entry to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Keep scanning.
    Continue,
    /// A pathname completed the pending group.
    Flush(Flush),
    /// A pathname arrived with no payload: a directory, discarded.
    Directory(String),
}

/// Pending asset-group state while scanning an archive.
///
/// A sidecar may precede or follow its payload; a second payload before a
/// pathname is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DecodeState {
    /// Nothing pending.
    #[default]
    Idle,
    /// A sidecar waiting for its payload.
    SidecarPending {
        /// Sidecar content.
        sidecar: Vec<u8>,
    },
    /// A payload waiting for its pathname.
    PayloadPending {
        /// Payload content.
        payload: Vec<u8>,
    },
    /// Both halves of a group, waiting for the pathname.
    PayloadAndSidecarPending {
        /// Payload content.
        payload: Vec<u8>,
        /// Sidecar content.
        sidecar: Vec<u8>,
    },
}

impl DecodeState {
    /// Apply one entry and return the next state.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidState`] for a second payload before a
    /// pathname, and [`ArchiveError::InvalidPath`] for a pathname that
    /// cannot be sanitized.
    pub fn advance(self, entry: Entry) -> Result<(Self, Step), ArchiveError> {
        match entry {
            Entry::Asset { name, data } => {
                let next = match self {
                    Self::Idle => Self::PayloadPending { payload: data },
                    Self::SidecarPending { sidecar } => Self::PayloadAndSidecarPending {
                        payload: data,
                        sidecar,
                    },
                    Self::PayloadPending { .. } | Self::PayloadAndSidecarPending { .. } => {
                        return Err(ArchiveError::InvalidState { entry: name });
                    }
                };
                Ok((next, Step::Continue))
            }
            Entry::Meta(sidecar) => {
                let next = match self {
                    Self::Idle | Self::SidecarPending { .. } => Self::SidecarPending { sidecar },
                    Self::PayloadPending { payload }
                    | Self::PayloadAndSidecarPending { payload, .. } => {
                        Self::PayloadAndSidecarPending { payload, sidecar }
                    }
                };
                Ok((next, Step::Continue))
            }
            Entry::Pathname(pathname) => match self {
                Self::Idle | Self::SidecarPending { .. } => {
                    Ok((Self::Idle, Step::Directory(pathname)))
                }
                Self::PayloadPending { payload } => Ok((
                    Self::Idle,
                    Step::Flush(Flush {
                        relative_path: sanitize_pathname(&pathname)?,
                        payload,
                        sidecar: None,
                    }),
                )),
                Self::PayloadAndSidecarPending { payload, sidecar } => Ok((
                    Self::Idle,
                    Step::Flush(Flush {
                        relative_path: sanitize_pathname(&pathname)?,
                        payload,
                        sidecar: Some(sidecar),
                    }),
                )),
            },
        }
    }

    /// Returns true if a payload is waiting for its pathname.
    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            Self::PayloadPending { .. } | Self::PayloadAndSidecarPending { .. }
        )
    }
}

/// First line of a pathname entry, without a trailing `\r`.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidPath`] if the entry is not UTF-8.
pub fn pathname_from_bytes(data: &[u8]) -> Result<String, ArchiveError> {
    let text = std::str::from_utf8(data).map_err(|_| ArchiveError::InvalidPath {
        pathname: String::from_utf8_lossy(data).into_owned(),
    })?;
    let line = text.split('\n').next().unwrap_or_default();
    Ok(line.strip_suffix('\r').unwrap_or(line).to_string())
}

/// Turn an archive pathname into a relative, host-separated path.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidPath`] for empty or absolute paths and
/// for `..` segments.
pub fn sanitize_pathname(pathname: &str) -> Result<PathBuf, ArchiveError> {
    let invalid = || ArchiveError::InvalidPath {
        pathname: pathname.to_string(),
    };

    if pathname.starts_with(['/', '\\']) {
        return Err(invalid());
    }

    let mut relative = PathBuf::new();
    for segment in pathname.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid()),
            _ => relative.push(segment),
        }
    }

    let is_plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if relative.as_os_str().is_empty() || !is_plain {
        return Err(invalid());
    }
    Ok(relative)
}

/// A decoded archive.
#[derive(Debug)]
pub struct DecodedArchive {
    /// Directory holding the decoded tree.
    pub scratch: ScratchDirectory,
    /// Leading directories removed by root collapsing, if any.
    pub collapsed_prefix: Option<PathBuf>,
    /// Number of assets written.
    pub assets: usize,
}

/// Decode an archive into a fresh scratch directory.
///
/// # Errors
///
/// Returns [`ArchiveError::UnsupportedFormat`] for legacy archives,
/// [`ArchiveError::InvalidState`] or [`ArchiveError::InvalidPath`] for
/// malformed ones, and [`ArchiveError::Io`] on read or write failures.
pub fn decode(archive_path: &Path) -> Result<DecodedArchive, ArchiveError> {
    let scratch = ScratchDirectory::new().map_err(|source| ArchiveError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let assets = extract_into(archive_path, scratch.path())?;
    let collapsed_prefix = collapse_root(scratch.path()).map_err(|source| ArchiveError::Io {
        path: scratch.path().to_path_buf(),
        source,
    })?;

    Ok(DecodedArchive {
        scratch,
        collapsed_prefix,
        assets,
    })
}

/// Decode an archive's asset groups into `dest`, without collapsing.
/// Returns the number of assets written.
///
/// # Errors
///
/// See [`decode`].
pub fn extract_into(archive_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let io_err = |source: io::Error| ArchiveError::Io {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::open(archive_path).map_err(io_err)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut state = DecodeState::Idle;
    let mut assets = 0;

    for entry in archive.entries().map_err(io_err)? {
        let mut entry = entry.map_err(io_err)?;

        if entry.header().entry_type().is_dir() {
            continue;
        }

        let entry_name = entry.path().map_err(io_err)?.to_string_lossy().into_owned();
        let kind = EntryKind::classify(&entry_name);
        if kind == EntryKind::Other {
            debug!(entry = %entry_name, "Ignoring archive entry");
            continue;
        }
        if kind == EntryKind::LegacyMetaData {
            return Err(ArchiveError::UnsupportedFormat { entry: entry_name });
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(io_err)?;

        let input = match kind {
            EntryKind::Asset => Entry::Asset {
                name: entry_name,
                data,
            },
            EntryKind::Meta => Entry::Meta(data),
            _ => Entry::Pathname(pathname_from_bytes(&data)?),
        };

        let (next, step) = state.advance(input)?;
        state = next;

        match step {
            Step::Continue => {}
            Step::Directory(pathname) => debug!(%pathname, "Skipping directory entry"),
            Step::Flush(flush) => {
                write_asset(dest, &flush)?;
                assets += 1;
            }
        }
    }

    if state.has_payload() {
        warn!(archive = %archive_path.display(), "Archive ended with a payload but no pathname");
    }

    Ok(assets)
}

fn write_asset(dest: &Path, flush: &Flush) -> Result<(), ArchiveError> {
    let target = dest.join(&flush.relative_path);
    if !target.starts_with(dest) {
        return Err(ArchiveError::InvalidPath {
            pathname: flush.relative_path.display().to_string(),
        });
    }

    let io_err = |source: io::Error| ArchiveError::Io {
        path: target.clone(),
        source,
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(&target, &flush.payload).map_err(io_err)?;
    if let Some(sidecar) = &flush.sidecar {
        fs::write(meta_path(&target), sidecar).map_err(io_err)?;
    }

    debug!(path = %flush.relative_path.display(), "Extracted asset");
    Ok(())
}

/// If `dir` wraps a single subdirectory that itself has subdirectories,
/// return it. A lone stray `.meta` file next to it is tolerated.
fn collapsible_child(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }

    let stray_ok = files.len() <= 1 && files.iter().all(|f| is_meta(f));
    if subdirs.len() != 1 || !stray_ok {
        return Ok(None);
    }

    let child = subdirs.remove(0);
    let has_subdir = fs::read_dir(&child)?
        .filter_map(Result::ok)
        .any(|e| e.file_type().is_ok_and(|t| t.is_dir()));

    Ok(has_subdir.then_some(child))
}

/// Remove redundant single-child wrapper directories from `root`.
///
/// Returns the removed prefix relative to `root`, or `None` when the tree
/// was left untouched. Running it again on a collapsed tree is a no-op.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or rearranged.
pub fn collapse_root(root: &Path) -> io::Result<Option<PathBuf>> {
    let mut current = root.to_path_buf();
    let mut prefix = PathBuf::new();

    while let Some(child) = collapsible_child(&current)? {
        if let Some(name) = child.file_name() {
            prefix.push(name);
        }
        current = child;
    }

    let mut components = prefix.components();
    let Some(first) = components.next() else {
        return Ok(None);
    };
    let rest = components.as_path().to_path_buf();

    let first_dir = root.join(first);
    let stray_meta = meta_path(&first_dir);
    if stray_meta.is_file() {
        fs::remove_file(&stray_meta)?;
    }

    let staging = root.join(format!(".upkg-collapse-{}", std::process::id()));
    fs::rename(&first_dir, &staging)?;
    move_dir_contents(&staging.join(&rest), root)?;
    fs::remove_dir_all(&staging)?;

    debug!(prefix = %prefix.display(), "Collapsed archive root");
    Ok(Some(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    fn asset(data: &str) -> Entry {
        Entry::Asset {
            name: "0001/asset".into(),
            data: data.as_bytes().to_vec(),
        }
    }

    fn build_archive(path: &Path, entries: &[(&str, &str)]) {
        let raw: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(name, content)| (*name, content.as_bytes()))
            .collect();
        build_raw_archive(path, &raw);
    }

    fn build_raw_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_classify() {
        assert_eq!(EntryKind::classify("abc/asset"), EntryKind::Asset);
        assert_eq!(EntryKind::classify("abc/asset.meta"), EntryKind::Meta);
        assert_eq!(EntryKind::classify("abc/metaData"), EntryKind::LegacyMetaData);
        assert_eq!(EntryKind::classify("abc/pathname"), EntryKind::Pathname);
        assert_eq!(EntryKind::classify("abc/preview.png"), EntryKind::Other);
    }

    #[test]
    fn test_payload_then_sidecar_then_pathname_flushes() {
        let (state, step) = DecodeState::Idle.advance(asset("X")).unwrap();
        assert_eq!(step, Step::Continue);
        let (state, _) = state.advance(Entry::Meta(b"guid: 1".to_vec())).unwrap();
        let (state, step) = state.advance(Entry::Pathname("a/b.txt".into())).unwrap();

        assert_eq!(state, DecodeState::Idle);
        assert_eq!(
            step,
            Step::Flush(Flush {
                relative_path: ["a", "b.txt"].iter().collect(),
                payload: b"X".to_vec(),
                sidecar: Some(b"guid: 1".to_vec()),
            })
        );
    }

    #[test]
    fn test_sidecar_before_payload_is_kept() {
        let (state, _) = DecodeState::Idle
            .advance(Entry::Meta(b"m".to_vec()))
            .unwrap();
        let (state, _) = state.advance(asset("X")).unwrap();
        assert!(matches!(
            state,
            DecodeState::PayloadAndSidecarPending { .. }
        ));
    }

    #[test]
    fn test_pathname_without_payload_is_directory() {
        let (state, _) = DecodeState::Idle
            .advance(Entry::Meta(b"folder".to_vec()))
            .unwrap();
        let (state, step) = state.advance(Entry::Pathname("Assets/Dir".into())).unwrap();
        assert_eq!(state, DecodeState::Idle);
        assert_eq!(step, Step::Directory("Assets/Dir".into()));
    }

    #[test]
    fn test_second_payload_is_invalid_state() {
        let (state, _) = DecodeState::Idle.advance(asset("X")).unwrap();
        let err = state.advance(asset("Y")).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidState { .. }));
    }

    #[test]
    fn test_sanitize_pathname() {
        assert!(sanitize_pathname("../evil").is_err());
        assert!(sanitize_pathname("/etc/passwd").is_err());
        assert!(sanitize_pathname("").is_err());
        assert_eq!(
            sanitize_pathname("Assets\\Foo/./bar.cs").unwrap(),
            ["Assets", "Foo", "bar.cs"].iter().collect::<PathBuf>()
        );
    }

    #[test]
    fn test_pathname_first_line_only() {
        assert_eq!(pathname_from_bytes(b"a/b.txt\n00\n").unwrap(), "a/b.txt");
        assert_eq!(pathname_from_bytes(b"a/b.txt\r\n").unwrap(), "a/b.txt");
        assert_eq!(pathname_from_bytes(b"a/b c.txt ").unwrap(), "a/b c.txt ");
    }

    #[test]
    fn test_pathname_rejects_invalid_utf8() {
        let err = pathname_from_bytes(b"a/\xffb.txt\n").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidPath { .. }));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8_pathname() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("Foo-1.0.0.unitypackage");
        build_raw_archive(
            &archive,
            &[("0001/asset", &b"X"[..]), ("0001/pathname", &b"a/\xfe.txt"[..])],
        );

        let err = decode(&archive).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidPath { .. }));
    }

    #[test]
    fn test_decode_single_asset() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("Foo-1.0.0.unitypackage");
        build_archive(
            &archive,
            &[("0001/asset", "X"), ("0001/pathname", "a/b.txt\n")],
        );

        let decoded = decode(&archive).unwrap();
        assert_eq!(decoded.assets, 1);
        assert_eq!(decoded.collapsed_prefix, None);
        let root = decoded.scratch.path();
        assert_eq!(fs::read_to_string(root.join("a/b.txt")).unwrap(), "X");
        assert!(!root.join("a/b.txt.meta").exists());
        assert_eq!(fs::read_dir(root).unwrap().count(), 1);
    }

    #[test]
    fn test_decode_writes_sidecar_and_skips_folder_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.unitypackage");
        build_archive(
            &archive,
            &[
                ("00aa/asset.meta", "guid: folder"),
                ("00aa/pathname", "Assets/Lib"),
                ("00bb/asset", "code"),
                ("00bb/asset.meta", "guid: 0123abcd"),
                ("00bb/pathname", "Assets/Lib/Code.cs"),
                ("00bb/preview.png", "png"),
            ],
        );

        let dest = tempdir().unwrap();
        let assets = extract_into(&archive, dest.path()).unwrap();
        assert_eq!(assets, 1);
        assert_eq!(
            fs::read_to_string(dest.path().join("Assets/Lib/Code.cs.meta")).unwrap(),
            "guid: 0123abcd"
        );
        assert!(!dest.path().join("Assets/Lib.meta").exists());
    }

    #[test]
    fn test_decode_rejects_legacy_layout() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("old.unitypackage");
        build_archive(
            &archive,
            &[("0001/asset", "X"), ("0001/metaData", "old")],
        );

        let err = decode(&archive).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_collapse_root() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("root/only")).unwrap();
        fs::write(root.join("root/only/asset.txt"), "A").unwrap();
        fs::write(root.join("root.meta"), "stray").unwrap();

        let prefix = collapse_root(root).unwrap();
        assert_eq!(prefix, Some(PathBuf::from("root")));
        assert_eq!(
            fs::read_to_string(root.join("only/asset.txt")).unwrap(),
            "A"
        );
        assert!(!root.join("root").exists());
        assert!(!root.join("root.meta").exists());

        assert_eq!(collapse_root(root).unwrap(), None);
        assert!(root.join("only/asset.txt").exists());
    }

    #[test]
    fn test_collapse_root_multiple_levels() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Assets/Vendor/Lib/Scripts")).unwrap();
        fs::write(root.join("Assets/Vendor/Lib/Scripts/A.cs"), "a").unwrap();
        fs::write(root.join("Assets/Vendor/Lib/readme.txt"), "r").unwrap();

        let prefix = collapse_root(root).unwrap();
        assert_eq!(prefix, Some(PathBuf::from("Assets/Vendor/Lib")));
        assert!(root.join("Scripts/A.cs").exists());
        assert!(root.join("readme.txt").exists());
        assert!(!root.join("Assets").exists());
    }

    #[test]
    fn test_collapse_root_keeps_leaf_folder() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b.txt"), "X").unwrap();

        assert_eq!(collapse_root(dir.path()).unwrap(), None);
        assert!(dir.path().join("a/b.txt").exists());
    }
}
