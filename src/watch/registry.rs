// src/watch/registry.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Non-owning indices from watched paths to engine file entries.
///
/// Entries themselves live in the engine; the registry only stores their
/// indices. Two indices are kept: one per watched file path, one per watched
/// parent directory with the candidate entries underneath it. The watch
/// subsystem hands back paths as its handle type, so both maps are keyed by
/// path; no custom hashing over raw descriptor integers.
///
/// Directory events are resolved by matching the reported child path against
/// the tracked files in that directory; non-matches are discarded. The scan
/// is linear over the directory's candidates, which is fine for the tens of
/// files this daemon is built for.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    by_file: HashMap<PathBuf, usize>,
    by_dir: HashMap<PathBuf, Vec<usize>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under its file path and parent directory.
    ///
    /// Replaces any previous registration for the same path in the same
    /// step, so an event in flight can never resolve to a stale index.
    pub fn insert(&mut self, path: &Path, dir: &Path, index: usize) {
        self.by_file.insert(path.to_path_buf(), index);
        let candidates = self.by_dir.entry(dir.to_path_buf()).or_default();
        if !candidates.contains(&index) {
            candidates.push(index);
        }
    }

    /// Resolve an event path to the entry for that exact file, if tracked.
    pub fn resolve(&self, path: &Path) -> Option<usize> {
        self.by_file.get(path).copied()
    }

    /// Whether the event path's parent directory carries one of our watches.
    ///
    /// Used to tell "a directory we watch reported an untracked name"
    /// (discard quietly) apart from an event we never asked for.
    pub fn is_watched_dir_member(&self, path: &Path) -> bool {
        path.parent().is_some_and(|dir| self.by_dir.contains_key(dir))
    }

    /// Candidate entry indices under a watched directory.
    pub fn candidates_in_dir(&self, dir: &Path) -> &[usize] {
        self.by_dir.get(dir).map_or(&[], Vec::as_slice)
    }

    /// Number of tracked file paths.
    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}
