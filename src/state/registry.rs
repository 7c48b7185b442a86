use crate::thing::Thing;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Change notification published after every registry mutation
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryChange {
    /// Whole contents replaced from a bulk snapshot
    Replaced {
        count: usize,
        timestamp: DateTime<Utc>,
    },
    Upserted {
        id: String,
        timestamp: DateTime<Utc>,
    },
    Removed {
        id: String,
        timestamp: DateTime<Utc>,
    },
}

impl RegistryChange {
    /// Affected thing id; None for bulk replaces
    pub fn id(&self) -> Option<&str> {
        match self {
            RegistryChange::Replaced { .. } => None,
            RegistryChange::Upserted { id, .. } | RegistryChange::Removed { id, .. } => Some(id),
        }
    }
}

/// One incremental operation derived from a push event
#[derive(Clone, Debug, PartialEq)]
pub enum PushOp {
    Upsert(Thing),
    Remove(String),
}

impl PushOp {
    /// Map a normalized push payload to an operation.
    ///
    /// Empty attributes and features with a non-empty id is a tombstone.
    /// A real thing with no attributes and no features cannot be told apart
    /// from a deletion and is removed as well.
    pub fn from_thing(thing: Thing) -> Self {
        if thing.is_tombstone() {
            PushOp::Remove(thing.id)
        } else {
            PushOp::Upsert(thing)
        }
    }
}

/// Proof that a bulk fetch was issued at a given generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotTicket {
    generation: u64,
}

impl SnapshotTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Inner {
    things: BTreeMap<String, Thing>,
    attribute_keys: BTreeSet<String>,
    feature_keys: BTreeSet<String>,
    /// Bumped each time a bulk fetch is issued
    generation: u64,
    /// Push ops applied since the newest in-flight fetch was issued
    journal: Option<Vec<PushOp>>,
}

impl Inner {
    fn replace(&mut self, things: Vec<Thing>) {
        self.things = things.into_iter().map(|t| (t.id.clone(), t)).collect();
        self.attribute_keys = self
            .things
            .values()
            .flat_map(|t| t.attributes.keys().cloned())
            .collect();
        self.feature_keys = self
            .things
            .values()
            .flat_map(|t| t.features.keys().cloned())
            .collect();
    }

    fn apply(&mut self, op: &PushOp) -> Option<RegistryChange> {
        match op {
            PushOp::Upsert(thing) => {
                self.things.insert(thing.id.clone(), thing.clone());
                Some(RegistryChange::Upserted {
                    id: thing.id.clone(),
                    timestamp: Utc::now(),
                })
            }
            PushOp::Remove(id) => self.things.remove(id).map(|_| RegistryChange::Removed {
                id: id.clone(),
                timestamp: Utc::now(),
            }),
        }
    }
}

/// In-memory map from thing id to its latest known state.
///
/// Written only by the synchronization layer; everything else reads
/// clones and listens on [`LiveRegistry::subscribe`].
pub struct LiveRegistry {
    inner: RwLock<Inner>,

    /// Broadcast channel for registry changes
    change_tx: broadcast::Sender<RegistryChange>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(1000);

        Self {
            inner: RwLock::new(Inner {
                things: BTreeMap::new(),
                attribute_keys: BTreeSet::new(),
                feature_keys: BTreeSet::new(),
                generation: 0,
                journal: None,
            }),
            change_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, change: RegistryChange) {
        // No receivers is fine
        let _ = self.change_tx.send(change);
    }

    /// Subscribe to registry changes
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChange> {
        self.change_tx.subscribe()
    }

    /// Replace the entire contents with a fresh snapshot.
    ///
    /// Readers see either the old or the new contents, never a mix.
    pub fn bulk_replace(&self, things: Vec<Thing>) {
        let count = {
            let mut inner = self.write();
            inner.replace(things);
            inner.things.len()
        };

        info!(entities = count, "Registry replaced from snapshot");
        self.publish(RegistryChange::Replaced {
            count,
            timestamp: Utc::now(),
        });
    }

    /// Insert or replace the entry for `thing.id`
    pub fn upsert(&self, thing: Thing) {
        self.apply(PushOp::Upsert(thing));
    }

    /// Delete the entry for `id`; no-op if absent
    pub fn remove(&self, id: &str) -> Option<Thing> {
        let (removed, change) = {
            let mut inner = self.write();
            let removed = inner.things.get(id).cloned();
            let change = inner.apply(&PushOp::Remove(id.to_string()));
            if let Some(journal) = inner.journal.as_mut() {
                journal.push(PushOp::Remove(id.to_string()));
            }
            (removed, change)
        };

        if let Some(change) = change {
            debug!(thing_id = %id, "Thing removed");
            self.publish(change);
        }
        removed
    }

    /// Apply one push operation, journaling it while a fetch is in flight
    pub fn apply(&self, op: PushOp) {
        let change = {
            let mut inner = self.write();
            let change = inner.apply(&op);
            if let Some(journal) = inner.journal.as_mut() {
                journal.push(op);
            }
            change
        };

        if let Some(change) = change {
            debug!(change = ?change, "Registry updated");
            self.publish(change);
        }
    }

    /// Normalized push payload → upsert or tombstone removal
    pub fn apply_push(&self, thing: Thing) {
        self.apply(PushOp::from_thing(thing));
    }

    /// Mark the start of a bulk fetch.
    ///
    /// Push ops applied from now on are journaled and replayed on top of the
    /// snapshot when it is installed with the returned ticket.
    pub fn begin_snapshot(&self) -> SnapshotTicket {
        let mut inner = self.write();
        inner.generation += 1;
        inner.journal = Some(Vec::new());
        SnapshotTicket {
            generation: inner.generation,
        }
    }

    /// Install a snapshot fetched under `ticket`.
    ///
    /// Returns false (and changes nothing) when a newer fetch has been issued
    /// since the ticket was taken.
    pub fn install_snapshot(&self, ticket: SnapshotTicket, things: Vec<Thing>) -> bool {
        let (count, replayed) = {
            let mut inner = self.write();
            if inner.generation != ticket.generation {
                debug!(
                    ticket = ticket.generation,
                    current = inner.generation,
                    "Discarding stale snapshot"
                );
                return false;
            }

            inner.replace(things);
            let journal = inner.journal.take().unwrap_or_default();
            for op in &journal {
                inner.apply(op);
            }
            (inner.things.len(), journal.len())
        };

        info!(
            entities = count,
            replayed = replayed,
            generation = ticket.generation,
            "Registry replaced from snapshot"
        );
        self.publish(RegistryChange::Replaced {
            count,
            timestamp: Utc::now(),
        });
        true
    }

    /// Give up on an in-flight fetch (e.g. it failed) and stop journaling
    pub fn abandon_snapshot(&self, ticket: SnapshotTicket) {
        let mut inner = self.write();
        if inner.generation == ticket.generation {
            inner.journal = None;
        }
    }

    /// True while push ops are being journaled for an in-flight fetch
    pub fn is_journaling(&self) -> bool {
        self.read().journal.is_some()
    }

    /// Get thing by id
    pub fn get(&self, id: &str) -> Option<Thing> {
        self.read().things.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().things.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().things.is_empty()
    }

    /// All things, ordered by id
    pub fn things(&self) -> Vec<Thing> {
        self.read().things.values().cloned().collect()
    }

    /// Attribute keys seen across all things at the last bulk replace
    pub fn attribute_keys(&self) -> Vec<String> {
        self.read().attribute_keys.iter().cloned().collect()
    }

    /// Feature keys seen across all things at the last bulk replace
    pub fn feature_keys(&self) -> Vec<String> {
        self.read().feature_keys.iter().cloned().collect()
    }
}

impl Default for LiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}
