use super::sse::{EventDecoder, ServerEvent};
use super::SourceError;
use crate::config::SourceConfig;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Collection endpoint for things, relative to the base URL
pub const THINGS_PATH: &str = "/api/2/things";

/// Decoded push stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent, SourceError>> + Send>>;

/// HTTP client for the things collection of a Ditto-style backend.
///
/// Carries one static credential on every request. Cheap to clone; clones
/// share the connection pool.
#[derive(Clone)]
pub struct ThingsClient {
    http_client: Client,
    base_url: String,
    authorization: String,
    timeout: Duration,
}

impl ThingsClient {
    /// Create a client from the source configuration.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let http_client = Client::builder()
            .user_agent("thingmap/0.1")
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_http_client(config: &SourceConfig, http_client: Client) -> Self {
        Self {
            http_client,
            base_url: config.base().to_string(),
            authorization: config.authorization(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Full URL of the things collection
    pub fn things_url(&self) -> String {
        format!("{}{}", self.base_url, THINGS_PATH)
    }

    /// Fetch every thing in one request.
    ///
    /// Returns the raw records; normalization is the caller's job.
    pub async fn fetch_all(&self) -> Result<Vec<Value>, SourceError> {
        let result = self.try_fetch_all().await;
        if let Err(e) = &result {
            error!(error = %e, url = %self.things_url(), "Error fetching things");
        }
        result
    }

    async fn try_fetch_all(&self) -> Result<Vec<Value>, SourceError> {
        let response = self
            .http_client
            .get(self.things_url())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, &self.authorization)
            .timeout(self.timeout)
            .send()
            .await?;

        let response = check_response_status(response)?;
        let body = response.bytes().await?;
        let records: Vec<Value> =
            serde_json::from_slice(&body).map_err(|e| SourceError::Decode(e.to_string()))?;

        info!(count = records.len(), "Fetched things");
        Ok(records)
    }

    /// Open the push stream and return its decoded events.
    ///
    /// The stream ends when the server closes the connection; there is no
    /// reconnect.
    pub async fn events(&self) -> Result<EventStream, SourceError> {
        let response = self
            .http_client
            .get(self.things_url())
            .header(ACCEPT, "text/event-stream")
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await?;
        let response = check_response_status(response)?;

        info!(url = %self.things_url(), "Push stream connected");

        let bytes = Box::pin(response.bytes_stream());
        let stream = futures::stream::unfold(
            Some((bytes, EventDecoder::new(), VecDeque::new())),
            |state| async move {
                let (mut bytes, mut decoder, mut pending) = state?;
                loop {
                    if let Some(event) = pending.pop_front() {
                        return Some((Ok(event), Some((bytes, decoder, pending))));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                        Some(Err(e)) => {
                            return Some((Err(SourceError::Transport(e.to_string())), None))
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    /// Open the push stream and call `on_event` once per event, serially and
    /// in arrival order, until the connection ends or the handle is closed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, mut on_event: F) -> Subscription
    where
        F: FnMut(ServerEvent) + Send + 'static,
    {
        let client = self.clone();
        let task = tokio::spawn(async move {
            let mut events = client.events().await.map_err(|e| {
                error!(error = %e, "Failed to open push stream");
                e
            })?;

            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => on_event(event),
                    Err(e) => {
                        error!(error = %e, "Push stream failed");
                        return Err(e);
                    }
                }
            }

            warn!("Push stream ended");
            Ok(())
        });

        Subscription { task: Some(task) }
    }
}

/// Handle to a running push-stream subscription.
///
/// Dropping the handle closes the connection.
pub struct Subscription {
    task: Option<JoinHandle<Result<(), SourceError>>>,
}

impl Subscription {
    /// Close the connection now
    pub fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the stream to end on its own.
    ///
    /// Returns the transport error if the stream failed.
    pub async fn closed(mut self) -> Result<(), SourceError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(SourceError::Transport(e.to_string())),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn check_response_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Status(status.as_u16()))
    }
}
