// Synchronization layer: bulk fetch + push stream → live registry

use crate::source::{SourceError, Subscription, ThingsClient};
use crate::state::{LiveRegistry, SnapshotTicket};
use crate::thing::{normalize, Thing};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};


/// Keeps a [`LiveRegistry`] in step with the backend.
///
/// The only writer of the registry. Snapshots from bulk fetches are
/// generation-tagged, so push events that arrive while a fetch is in flight
/// are replayed on top of the snapshot instead of being lost.
pub struct SyncService {
    client: ThingsClient,
    registry: Arc<LiveRegistry>,

    /// Message of the last failed bulk fetch, cleared on success
    last_error: RwLock<Option<String>>,
}

impl SyncService {
    pub fn new(client: ThingsClient, registry: Arc<LiveRegistry>) -> Self {
        Self {
            client,
            registry,
            last_error: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<LiveRegistry> {
        &self.registry
    }

    /// Error from the most recent bulk fetch, if it failed
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Fetch every thing and replace the registry contents.
    ///
    /// A snapshot overtaken by a newer refresh is discarded and reported as
    /// [`RefreshOutcome::Superseded`]. Errors are recorded and returned;
    /// there is no retry.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SourceError> {
        let pending = PendingSnapshot::begin(&self.registry);
        self.refresh_under(pending).await
    }

    async fn refresh_under(
        &self,
        pending: PendingSnapshot,
    ) -> Result<RefreshOutcome, SourceError> {
        let records = match self.client.fetch_all().await {
            Ok(records) => records,
            Err(e) => {
                drop(pending);
                self.set_last_error(Some(e.to_string()));
                return Err(e);
            }
        };

        let things: Vec<_> = records.iter().map(normalize).collect();
        let count = things.len();
        let generation = pending.generation();
        if !pending.install(things) {
            info!(generation = generation, "Snapshot superseded by a newer refresh");
            return Ok(RefreshOutcome::Superseded);
        }
        self.set_last_error(None);
        Ok(RefreshOutcome::Installed(count))
    }

    /// Apply one push-stream message payload.
    ///
    /// Unparseable or non-object payloads are logged and skipped. Returns
    /// whether the message was applied.
    pub fn apply_message(&self, data: &str) -> bool {
        let raw: Value = match serde_json::from_str(data) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to parse push message, skipping");
                return false;
            }
        };
        if !raw.is_object() {
            warn!(payload = %data, "Push message is not a JSON object, skipping");
            return false;
        }

        self.registry.apply_push(normalize(&raw));
        true
    }

    /// Start the push subscription and the initial bulk fetch independently.
    ///
    /// The snapshot ticket is taken before the stream opens, so every push
    /// event survives the initial snapshot. Must be called from within a
    /// Tokio runtime.
    pub fn start(self: &Arc<Self>) -> SyncHandle {
        let pending = PendingSnapshot::begin(&self.registry);

        let service = Arc::clone(self);
        let subscription = self
            .client
            .subscribe(move |event| {
                service.apply_message(&event.data);
            });

        let service = Arc::clone(self);
        let initial_fetch = tokio::spawn(async move { service.refresh_under(pending).await });

        info!("Synchronization started");
        SyncHandle {
            subscription: Some(subscription),
            initial_fetch: Some(initial_fetch),
        }
    }
}

/// Result of a bulk refresh that reached the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot installed with this many things
    Installed(usize),
    /// A newer refresh was issued meanwhile; this snapshot was dropped
    Superseded,
}

/// Snapshot ticket that closes the registry journal when dropped unless
/// the snapshot was installed, so a cancelled fetch never leaves the
/// journal growing.
struct PendingSnapshot {
    registry: Arc<LiveRegistry>,
    ticket: Option<SnapshotTicket>,
}

impl PendingSnapshot {
    fn begin(registry: &Arc<LiveRegistry>) -> Self {
        Self {
            registry: Arc::clone(registry),
            ticket: Some(registry.begin_snapshot()),
        }
    }

    fn generation(&self) -> u64 {
        self.ticket.map_or(0, |t| t.generation())
    }

    /// Install `things`; false when the ticket was superseded
    fn install(mut self, things: Vec<Thing>) -> bool {
        match self.ticket.take() {
            Some(ticket) => self.registry.install_snapshot(ticket, things),
            None => false,
        }
    }
}

impl Drop for PendingSnapshot {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.registry.abandon_snapshot(ticket);
        }
    }
}

/// Running synchronization; dropping it closes the push stream
pub struct SyncHandle {
    subscription: Option<Subscription>,
    initial_fetch: Option<JoinHandle<Result<RefreshOutcome, SourceError>>>,
}

impl SyncHandle {
    /// Wait for the startup bulk fetch. Yields None once it has been awaited.
    pub async fn initial_fetch(&mut self) -> Option<Result<RefreshOutcome, SourceError>> {
        let task = self.initial_fetch.take()?;
        Some(match task.await {
            Ok(result) => result,
            Err(e) => Err(SourceError::Transport(e.to_string())),
        })
    }

    /// Wait for the push stream to end on its own
    pub async fn closed(mut self) -> Result<(), SourceError> {
        match self.subscription.take() {
            Some(subscription) => subscription.closed().await,
            None => Ok(()),
        }
    }

    /// Stop the push stream and any unfinished initial fetch
    pub fn shutdown(mut self) {
        if let Some(task) = self.initial_fetch.take() {
            task.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
        info!("Synchronization stopped");
    }
}
