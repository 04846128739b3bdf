// src/sink/file.rs

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::Sink;
use crate::errors::SinkError;

/// Appends raw line bytes to a local file, in delivery order, no framing.
///
/// Any write or flush failure is fatal: this is the only configured
/// destination, and silently losing data is worse than crashing.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open (creating if needed) the target for appending and flush once, so
    /// an unwritable target fails startup before any watch is armed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open target {:?} for writing", path))?;

        let mut sink = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        };
        sink.writer
            .flush()
            .with_context(|| format!("initial flush on target {:?} failed", path))?;

        debug!(target_file = %sink.path.display(), "file sink ready");
        Ok(sink)
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn send(&mut self, _tag: &str, line: &[u8]) -> Result<(), SinkError> {
        self.writer.write_all(line)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
