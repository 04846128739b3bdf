use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use logspool::errors::SinkError;
use logspool::sink::Sink;

/// Sink that records deliveries in memory.
///
/// Clones share the same record list, so a handle kept by the test still
/// observes what the engine-owned copy received.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, Vec<u8>)> {
        self.records.lock().unwrap().clone()
    }

    /// Delivered payloads as strings, in order.
    pub fn lines(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|(_, bytes)| String::from_utf8_lossy(&bytes).into_owned())
            .collect()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&mut self, tag: &str, line: &[u8]) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap()
            .push((tag.to_string(), line.to_vec()));
        Ok(())
    }
}

/// Sink that rejects the first `fail_first` sends, then accepts.
#[derive(Clone)]
pub struct FlakySink {
    fail_first: u32,
    pub attempts: Arc<AtomicU32>,
    pub accepted: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FlakySink {
    pub fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            attempts: Arc::new(AtomicU32::new(0)),
            accepted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Sink for FlakySink {
    async fn send(&mut self, _tag: &str, line: &[u8]) -> Result<(), SinkError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(SinkError::Rejected { status: 503 });
        }
        self.accepted.lock().unwrap().push(line.to_vec());
        Ok(())
    }
}
