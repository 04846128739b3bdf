// src/sink/mod.rs

//! Delivery sinks.
//!
//! Every destination sits behind one [`Sink`] contract: `send` one complete
//! line tagged with its source file, `flush` whatever the sink buffers. The
//! [`Dispatcher`] wraps the configured sink with the retry/drop policy and
//! the delivery counters.

pub mod file;
pub mod http;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{Config, Destination};
use crate::errors::SinkError;

pub use file::FileSink;
pub use http::HttpSink;

/// Bounded retry count for non-fatal delivery failures.
const DELIVERY_RETRIES: u32 = 2;

/// A delivery destination.
#[async_trait]
pub trait Sink: Send {
    /// Deliver one complete line (newline included, if the source had one),
    /// tagged with the basename of the file it came from.
    async fn send(&mut self, tag: &str, line: &[u8]) -> Result<(), SinkError>;

    /// Flush buffered output, if the sink buffers at all.
    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Build the sink for the configured destination.
///
/// The file sink is opened (and flushed once) here so that a bad target path
/// fails startup before any watch is armed.
pub fn build(config: &Config) -> anyhow::Result<Box<dyn Sink>> {
    match &config.destination {
        Destination::File(path) => Ok(Box::new(FileSink::open(path)?)),
        Destination::Http(url) => Ok(Box::new(HttpSink::new(url.clone()))),
    }
}

/// Wraps the sink with retry, drop-and-count, and delivery counters.
///
/// A non-fatal failure is retried a small bounded number of times, then the
/// line is dropped and counted: a single bad line must not block the stream
/// or pin memory forever. Fatal sink errors propagate and stop the daemon.
pub struct Dispatcher {
    sink: Box<dyn Sink>,
    delivered: u64,
    failed: u64,
}

impl Dispatcher {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            sink,
            delivered: 0,
            failed: 0,
        }
    }

    /// Deliver one line, applying the bounded-retry policy.
    ///
    /// Returns `Err` only for fatal sink failures.
    pub async fn dispatch(&mut self, tag: &str, line: &[u8]) -> Result<(), SinkError> {
        let mut attempt = 0u32;
        loop {
            match self.sink.send(tag, line).await {
                Ok(()) => {
                    self.delivered += 1;
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if attempt < DELIVERY_RETRIES => {
                    attempt += 1;
                    warn!(
                        tag,
                        attempt,
                        error = %err,
                        "delivery failed, retrying"
                    );
                }
                Err(err) => {
                    self.failed += 1;
                    warn!(
                        tag,
                        error = %err,
                        "delivery failed after {} retries, dropping line",
                        DELIVERY_RETRIES
                    );
                    return Ok(());
                }
            }
        }
    }

    pub async fn flush(&mut self) -> Result<(), SinkError> {
        self.sink.flush().await
    }

    /// Lines successfully delivered.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Lines dropped after exhausting retries.
    pub fn failed(&self) -> u64 {
        self.failed
    }
}
