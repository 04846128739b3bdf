// src/errors.rs

//! Crate-wide error types.
//!
//! Application-level plumbing uses `anyhow` (re-exported here); the error
//! kinds the engine has to *branch* on are structured enums.

use thiserror::Error;

pub use anyhow::{Error, Result};

/// Failure to arm a filesystem watch.
///
/// Both variants are fatal during startup (a partial watch set is not
/// acceptable); during steady-state operation the engine degrades them to a
/// per-file skip with a log line.
#[derive(Debug, Error)]
pub enum WatchSetupError {
    /// The kernel watch table is exhausted (inotify ENOSPC).
    #[error("watch resources exhausted: {0}")]
    ResourceExhausted(#[source] notify::Error),

    /// The path or its parent directory cannot be watched (missing,
    /// permission denied, ...).
    #[error("cannot watch path: {0}")]
    Unwatchable(#[source] notify::Error),
}

impl WatchSetupError {
    /// Classify an error reported by the watch backend.
    pub fn classify(err: notify::Error) -> Self {
        match &err.kind {
            notify::ErrorKind::MaxFilesWatch => WatchSetupError::ResourceExhausted(err),
            notify::ErrorKind::Io(io) if io.raw_os_error() == Some(28) => {
                // ENOSPC from inotify_add_watch means the watch table is full.
                WatchSetupError::ResourceExhausted(err)
            }
            _ => WatchSetupError::Unwatchable(err),
        }
    }
}

/// Failure to deliver a line to the configured sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The local append target failed. Losing data on the only configured
    /// destination is worse than crashing, so this terminates the daemon.
    #[error("sink write failed: {0}")]
    Fatal(#[from] std::io::Error),

    /// The collector answered with a non-success status.
    #[error("collector rejected delivery with status {status}")]
    Rejected { status: u16 },

    /// The request never produced a status (connect/timeout/body errors).
    #[error("delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SinkError {
    /// True for errors that must terminate the daemon rather than be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SinkError::Fatal(_))
    }
}
