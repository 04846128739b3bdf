// src/engine/runtime.rs

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use notify::Event;
use notify::event::{EventKind, ModifyKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::entry::FileEntry;
use crate::sink::{Dispatcher, Sink};
use crate::tail::seed;
use crate::watch::{FsWatcher, WatchRegistry, spawn_forwarder};

/// Read chunk size for draining watched files.
const READ_CHUNK: usize = 8192;

/// Events consumed by the engine loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// A raw filesystem notification.
    Fs(Event),
    /// Ctrl-C or equivalent; stop after the current event.
    Shutdown,
}

/// The tailing engine.
///
/// Owns every piece of mutable state (file entries, the watch registry,
/// the watcher handle, the delivery dispatcher) and mutates it from one
/// event loop only. Events are processed strictly one at a time in arrival
/// order, so no locking is needed anywhere in here.
pub struct Engine {
    entries: Vec<FileEntry>,
    registry: WatchRegistry,
    watcher: FsWatcher,
    dispatcher: Dispatcher,
    replay_lines: usize,
    events_rx: mpsc::Receiver<EngineEvent>,
}

impl Engine {
    /// Build the engine and its event channel.
    ///
    /// The returned sender feeds the loop; the watcher's own events are
    /// forwarded into it internally. Must be called within a tokio runtime.
    pub fn new(
        replay_lines: usize,
        sink: Box<dyn Sink>,
    ) -> Result<(Self, mpsc::Sender<EngineEvent>)> {
        let (events_tx, events_rx) = mpsc::channel::<EngineEvent>(256);
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let watcher = FsWatcher::new(raw_tx).context("initializing filesystem watcher")?;
        spawn_forwarder(raw_rx, events_tx.clone());

        let engine = Self {
            entries: Vec::new(),
            registry: WatchRegistry::new(),
            watcher,
            dispatcher: Dispatcher::new(sink),
            replay_lines,
            events_rx,
        };

        Ok((engine, events_tx))
    }

    /// Attach one file: open it, seed the starting offset, and replay the
    /// trailing lines through the reassembler.
    ///
    /// A seekable regular file is seeded by the backward scan and drained
    /// from the resulting offset, so an unterminated last line correctly
    /// ends up buffered as the fringe. A pipe-like source is read forward
    /// once, its tail delivered, and the entry terminally ignored; there
    /// is nothing to watch on a non-regular file.
    ///
    /// Attach failures are fatal: the daemon starts with its full file set
    /// or not at all.
    pub async fn attach(&mut self, path: &Path) -> Result<()> {
        let link_meta = std::fs::symlink_metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if link_meta.file_type().is_symlink() {
            bail!("{} is a symbolic link; refusing to follow", path.display());
        }

        // Watch notifications carry absolute paths; register under the same
        // form so events resolve regardless of how the path was given.
        let path = &path
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        let mut entry = FileEntry::new(path)?;

        let mut file = open_nonblocking(path)
            .with_context(|| format!("cannot open {} for reading", path.display()))?;
        let meta = file
            .metadata()
            .with_context(|| format!("cannot stat {}", path.display()))?;

        if meta.is_file() {
            let offset = seed::seek_start_offset(&mut file, self.replay_lines)
                .with_context(|| format!("seeding tail of {}", path.display()))?;
            file.seek(SeekFrom::Start(offset))?;
            entry.adopt(file, offset, &meta);

            let idx = self.entries.len();
            self.entries.push(entry);
            self.drain(idx).await?;
            Ok(())
        } else {
            // Collect once from the unseekable source, then give up on it.
            let scan = seed::pipe_tail(&mut file, self.replay_lines)
                .with_context(|| format!("seeding tail of {}", path.display()))?;
            warn!(
                file = %path.display(),
                "not a regular file; collected once, will not be watched"
            );

            let lines = entry.splitter.push(&scan.tail);
            let fringe = entry.splitter.take_fringe();
            entry.size = scan.bytes_consumed;
            entry.ignore = true;

            let tag = entry.tag().to_string();
            self.entries.push(entry);
            for line in lines {
                self.dispatcher.dispatch(&tag, &line).await?;
            }
            if let Some(final_part) = fringe {
                self.dispatcher.dispatch(&tag, &final_part).await?;
            }
            self.dispatcher.flush().await?;
            Ok(())
        }
    }

    /// Arm directory + file watches for every attached entry.
    ///
    /// Any failure here is fatal: a partial watch set silently drops data,
    /// which is worse than refusing to start.
    pub fn arm_all(&mut self) -> Result<()> {
        for idx in 0..self.entries.len() {
            if self.entries[idx].ignore {
                continue;
            }
            let path = self.entries[idx].path().to_path_buf();
            let dir = self.entries[idx].dir().to_path_buf();

            self.watcher
                .watch_dir(&dir)
                .with_context(|| format!("watching parent directory of {}", path.display()))?;
            self.watcher
                .watch_file(&path)
                .with_context(|| format!("watching {}", path.display()))?;
            self.registry.insert(&path, &dir, idx);
        }

        if self.registry.is_empty() {
            bail!("no suitable stream to observe");
        }
        Ok(())
    }

    /// Check every entry once more after arming.
    ///
    /// Data appended between the seed and the watches going live would
    /// otherwise only surface on the next unrelated notification.
    pub async fn sweep(&mut self) -> Result<()> {
        for idx in 0..self.entries.len() {
            self.verify(idx).await?;
        }
        Ok(())
    }

    /// Main event loop: block on notifications, drive the state machine.
    pub async fn run(mut self) -> Result<()> {
        info!(files = self.registry.len(), "logspool engine started");

        while let Some(event) = self.events_rx.recv().await {
            match event {
                EngineEvent::Fs(ev) => self.handle_fs_event(ev).await?,
                EngineEvent::Shutdown => {
                    info!("shutdown requested, stopping engine");
                    break;
                }
            }

            if self.entries.iter().all(|e| e.ignore) {
                self.finish().await?;
                bail!("no files remaining");
            }
        }

        self.finish().await
    }

    async fn finish(&mut self) -> Result<()> {
        self.dispatcher.flush().await?;
        info!(
            delivered = self.dispatcher.delivered(),
            failed = self.dispatcher.failed(),
            "engine exiting"
        );
        Ok(())
    }

    /// Resolve one notification to entries and drive their transitions.
    async fn handle_fs_event(&mut self, event: Event) -> Result<()> {
        debug!(?event, "engine received fs event");

        for path in &event.paths {
            let Some(idx) = self.registry.resolve(path) else {
                if self.registry.is_watched_dir_member(path) {
                    debug!(path = %path.display(), "event for untracked name, discarding");
                }
                continue;
            };

            match &event.kind {
                EventKind::Access(_) => {}
                EventKind::Create(_) => {
                    // The path (re)appeared; any previous watch may still
                    // follow the moved-away inode, so replace it first.
                    self.watcher.rearm_file(path);
                    self.recheck(idx).await?;
                }
                EventKind::Remove(_)
                | EventKind::Modify(ModifyKind::Name(_))
                | EventKind::Modify(ModifyKind::Metadata(_)) => {
                    self.recheck(idx).await?;
                }
                _ => {
                    self.verify(idx).await?;
                }
            }
        }
        Ok(())
    }

    /// Growth/truncation check against the *open descriptor*.
    ///
    /// Steps, in order: stat the descriptor (not the path); detect in-place
    /// truncation and rewind; skip unchanged files without reading; drain
    /// anything new.
    pub async fn verify(&mut self, idx: usize) -> Result<()> {
        let meta_res = {
            let entry = &self.entries[idx];
            if entry.ignore {
                return Ok(());
            }
            match entry.file.as_ref() {
                None => return Ok(()),
                Some(file) => file.metadata(),
            }
        };

        let entry = &mut self.entries[idx];
        let meta = match meta_res {
            Ok(m) => m,
            Err(err) => {
                warn!(
                    file = %entry.path().display(),
                    error = %err,
                    "cannot stat open descriptor, closing it"
                );
                entry.last_errno = err.raw_os_error();
                entry.file = None;
                return Ok(());
            }
        };

        let disk_len = meta.len();

        if entry.is_regular && disk_len < entry.size {
            // Shrunk in place (copytruncate-style rotation): same inode,
            // resume from the new end.
            info!(file = %entry.path().display(), "file truncated");
            let seeked = match entry.file.as_mut() {
                Some(file) => file.seek(SeekFrom::Start(disk_len)),
                None => return Ok(()),
            };
            if let Err(err) = seeked {
                warn!(
                    file = %entry.path().display(),
                    error = %err,
                    "cannot seek after truncation, closing descriptor"
                );
                entry.last_errno = err.raw_os_error();
                entry.file = None;
                return Ok(());
            }
            entry.size = disk_len;
            entry.splitter.clear();
        } else if entry.is_regular
            && disk_len == entry.size
            && meta.modified().ok() == entry.mtime
        {
            // Nothing changed; do not even read.
            return Ok(());
        }

        entry.mtime = meta.modified().ok();
        self.drain(idx).await?;
        Ok(())
    }

    /// Re-examine the *path* after a delete/rename/attrib/create event.
    ///
    /// Decides between: still the same file (no-op), replaced by a new
    /// inode (retire the old descriptor, follow the new file from offset
    /// 0), gone (retire and wait for recreation), or terminally not a
    /// regular file anymore.
    pub async fn recheck(&mut self, idx: usize) -> Result<()> {
        if self.entries[idx].ignore {
            return Ok(());
        }
        let path = self.entries[idx].path().to_path_buf();

        if let Ok(meta) = std::fs::symlink_metadata(&path) {
            if meta.file_type().is_symlink() {
                warn!(
                    file = %path.display(),
                    "has been replaced with a symbolic link, giving up on this name"
                );
                self.retire(idx).await?;
                self.entries[idx].ignore = true;
                return Ok(());
            }
        }

        let probe = match open_nonblocking(&path) {
            Ok(f) => f,
            Err(err) => {
                let errno = err.raw_os_error();
                let had_descriptor = self.entries[idx].file.is_some();
                if had_descriptor {
                    self.retire(idx).await?;
                    warn!(file = %path.display(), error = %err, "has become inaccessible");
                } else if self.entries[idx].last_errno != errno {
                    warn!(file = %path.display(), error = %err, "still inaccessible");
                }
                self.entries[idx].last_errno = errno;
                return Ok(());
            }
        };

        let meta = match probe.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "cannot stat");
                self.retire(idx).await?;
                self.entries[idx].last_errno = err.raw_os_error();
                return Ok(());
            }
        };

        if !meta.is_file() {
            warn!(
                file = %path.display(),
                "is not a regular file anymore, giving up on this name"
            );
            self.retire(idx).await?;
            self.entries[idx].ignore = true;
            return Ok(());
        }

        {
            let entry = &self.entries[idx];
            if entry.file.is_some() && entry.same_inode(&meta) {
                // Same underlying file; keep our descriptor, drop the probe.
                self.entries[idx].last_errno = None;
                return Ok(());
            }
        }

        if self.entries[idx].file.is_some() {
            info!(file = %path.display(), "has been replaced; following end of new file");
            self.retire(idx).await?;
        } else {
            info!(file = %path.display(), "has appeared; following new file");
        }

        // New stream: offset 0, fresh fringe, fresh watch, same registry slot.
        let dir = self.entries[idx].dir().to_path_buf();
        self.entries[idx].adopt(probe, 0, &meta);
        self.watcher.rearm_file(&path);
        self.registry.insert(&path, &dir, idx);

        self.verify(idx).await
    }

    /// Drain the old descriptor and close it.
    ///
    /// Unread bytes still reachable through the descriptor are delivered,
    /// and the remaining fringe is flushed as the descriptor's terminal
    /// output rather than dropped.
    async fn retire(&mut self, idx: usize) -> Result<()> {
        if self.entries[idx].file.is_some() {
            self.drain(idx).await?;
        }

        let (tag, fringe) = {
            let entry = &mut self.entries[idx];
            entry.file = None;
            (entry.tag().to_string(), entry.splitter.take_fringe())
        };

        if let Some(final_part) = fringe {
            self.dispatcher.dispatch(&tag, &final_part).await?;
            self.dispatcher.flush().await?;
        }
        Ok(())
    }

    /// Read everything currently available from the entry's offset and
    /// deliver the completed lines. Returns the bytes consumed.
    ///
    /// A read error aborts this cycle only; the offset stays where the last
    /// successful read left it and the next notification retries.
    pub async fn drain(&mut self, idx: usize) -> Result<u64> {
        let mut consumed = 0u64;
        let mut buf = [0u8; READ_CHUNK];
        let tag = self.entries[idx].tag().to_string();

        loop {
            let lines = {
                let entry = &mut self.entries[idx];
                let Some(file) = entry.file.as_mut() else {
                    break;
                };
                match file.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        entry.size += n as u64;
                        consumed += n as u64;
                        entry.splitter.push(&buf[..n])
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!(
                            file = %entry.path().display(),
                            error = %e,
                            "read failed, will retry on next notification"
                        );
                        entry.last_errno = e.raw_os_error();
                        break;
                    }
                }
            };

            for line in lines {
                self.dispatcher.dispatch(&tag, &line).await?;
            }
        }

        self.dispatcher.flush().await?;
        Ok(consumed)
    }

    /// Read-only view of an entry, for inspection in tests and logs.
    pub fn entry(&self, idx: usize) -> &FileEntry {
        &self.entries[idx]
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Delivery counters from the dispatcher.
    pub fn counters(&self) -> (u64, u64) {
        (self.dispatcher.delivered(), self.dispatcher.failed())
    }
}

/// Open read-only without blocking.
///
/// `O_NONBLOCK` keeps an attach from hanging on a FIFO with no writer and
/// turns its empty reads into `WouldBlock`, which the drain loop treats as
/// "no more data ready yet".
fn open_nonblocking(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}
