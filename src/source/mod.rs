// Remote source client: bulk fetch and push stream

mod client;
mod sse;

pub use client::{EventStream, Subscription, ThingsClient, THINGS_PATH};
pub use sse::{EventDecoder, ServerEvent};

use std::fmt;

/// Failures talking to the backend.
///
/// Every variant is a network error from the caller's point of view; none
/// is retried internally.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Connection, TLS, timeout or mid-stream I/O failure
    Transport(String),
    /// Backend answered with a non-success status
    Status(u16),
    /// Response body was not the expected JSON
    Decode(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(e) => write!(f, "network error: {}", e),
            SourceError::Status(code) => {
                write!(f, "network response was not ok: HTTP {}", code)
            }
            SourceError::Decode(e) => write!(f, "invalid response body: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => SourceError::Status(status.as_u16()),
            None if e.is_decode() => SourceError::Decode(e.to_string()),
            None => SourceError::Transport(e.to_string()),
        }
    }
}
