// src/sink/http.rs

use async_trait::async_trait;
use gethostname::gethostname;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use tracing::debug;

use super::Sink;
use crate::errors::SinkError;

/// Envelope the collector expects.
#[derive(Debug, Serialize)]
struct Envelope {
    message: String,
}

/// POSTs each line to an HTTP collector as `{"message": "<host>|<tag>|<line>"}`.
///
/// The collector acknowledges with 201 Created; any other status is a
/// rejection the dispatcher may retry. Transport errors (connect, timeout)
/// are likewise retryable, never fatal.
pub struct HttpSink {
    client: Client,
    endpoint: Url,
    host: String,
}

impl HttpSink {
    pub fn new(endpoint: Url) -> Self {
        let host = gethostname()
            .into_string()
            .unwrap_or_else(|_| "localhost".to_string());
        debug!(endpoint = %endpoint, %host, "http sink ready");

        Self {
            client: Client::new(),
            endpoint,
            host,
        }
    }

    /// Collapse a line into the one-line envelope payload.
    ///
    /// The trailing newline is dropped and any interior newline is escaped so
    /// the message stays a single JSON string line on the collector side.
    fn message_for(&self, tag: &str, line: &[u8]) -> String {
        let text = String::from_utf8_lossy(line);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        format!("{}|{}|{}", self.host, tag, text.replace('\n', "\\n"))
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&mut self, tag: &str, line: &[u8]) -> Result<(), SinkError> {
        let envelope = Envelope {
            message: self.message_for(tag, line),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => Err(SinkError::Rejected {
                status: status.as_u16(),
            }),
        }
    }
}
