// src/engine/entry.rs

use std::fs::{File, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Result, anyhow};

use crate::tail::LineSplitter;

/// Per-file tailing state.
///
/// One entry exists per watched path for the lifetime of the daemon; an
/// entry is never removed, only terminally marked [`ignore`](Self::ignore)
/// when the path stops being a regular file.
///
/// When `file` is `Some`, the stat snapshot (`dev`/`ino`/`mtime`/
/// `is_regular`) describes the *open descriptor*, not the path: the path
/// may already point at a replacement inode on disk.
#[derive(Debug)]
pub struct FileEntry {
    path: PathBuf,
    dir: PathBuf,
    tag: String,

    /// Currently open descriptor; `None` while the path is unreadable.
    pub file: Option<File>,
    /// Logical read offset, advanced by draining, reset on rotation and
    /// truncation.
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub dev: u64,
    pub ino: u64,
    pub is_regular: bool,

    /// Last open/stat error, kept to suppress duplicate error logging.
    pub last_errno: Option<i32>,
    /// Terminal: the path stopped being a regular file; never re-attempted.
    pub ignore: bool,

    /// Buffered, not-yet-terminated tail of the last read.
    pub splitter: LineSplitter,
}

impl FileEntry {
    /// Create an unopened entry for a path.
    pub fn new(path: &Path) -> Result<Self> {
        let tag = path
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name component", path.display()))?
            .to_string_lossy()
            .into_owned();

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            tag,
            file: None,
            size: 0,
            mtime: None,
            dev: 0,
            ino: 0,
            is_regular: false,
            last_errno: None,
            ignore: false,
            splitter: LineSplitter::new(),
        })
    }

    /// Adopt a freshly opened descriptor at the given offset.
    ///
    /// Takes the stat snapshot from `meta` (which must describe `file`) and
    /// clears the sticky error. The fringe is reset: a new descriptor is a
    /// new stream, nothing carries over from the previous inode.
    pub fn adopt(&mut self, file: File, offset: u64, meta: &Metadata) {
        self.file = Some(file);
        self.size = offset;
        self.mtime = meta.modified().ok();
        self.dev = meta.dev();
        self.ino = meta.ino();
        self.is_regular = meta.is_file();
        self.last_errno = None;
        self.splitter.clear();
    }

    /// Whether `meta` describes the same underlying file as the snapshot.
    pub fn same_inode(&self, meta: &Metadata) -> bool {
        self.dev == meta.dev() && self.ino == meta.ino()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Basename used to tag deliveries from this file.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_derives_dir_and_tag() {
        let e = FileEntry::new(Path::new("/var/log/app.log")).unwrap();
        assert_eq!(e.dir(), Path::new("/var/log"));
        assert_eq!(e.tag(), "app.log");
        assert!(e.file.is_none());
    }

    #[test]
    fn bare_filename_watches_current_dir() {
        let e = FileEntry::new(Path::new("app.log")).unwrap();
        assert_eq!(e.dir(), Path::new("."));
    }

    #[test]
    fn path_without_filename_is_rejected() {
        assert!(FileEntry::new(Path::new("/")).is_err());
    }
}
