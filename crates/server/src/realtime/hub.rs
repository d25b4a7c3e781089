//! Real-time notification hub
//!
//! Owns the registry of live client connections and fans like events out
//! to them. Delivery is best-effort: every connection gets a bounded
//! queue, a full or closed queue evicts that connection, and nobody else
//! waits on it.
//!
//! Events for a single artwork are delivered in the order their
//! `publish_like` calls complete. There is no ordering across artworks.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::gallery::store::{ArtworkStore, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("Connection limit reached ({capacity})")]
    ResourceExhausted { capacity: usize },

    #[error("Failed to persist like: {0}")]
    Persistence(String),

    #[error("Artwork {0} not found")]
    ArtworkNotFound(i64),

    #[error("User {user_id} already liked artwork {artwork_id}")]
    AlreadyLiked { artwork_id: i64, user_id: i64 },
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => HubError::ArtworkNotFound(id),
            StoreError::AlreadyLiked {
                artwork_id,
                user_id,
            } => HubError::AlreadyLiked {
                artwork_id,
                user_id,
            },
            other => HubError::Persistence(other.to_string()),
        }
    }
}

pub type Result<T> = core::result::Result<T, HubError>;

/// Wire message pushed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeEvent {
    pub artwork_id: i64,
    pub like_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// `Connecting -> Active -> Disconnected`. Disconnected is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Disconnected,
}

/// Which artwork events a connection wants
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Subscription {
    /// Every artwork in the gallery
    #[default]
    Gallery,
    Artworks(HashSet<i64>),
}

impl Subscription {
    pub fn covers(&self, artwork_id: i64) -> bool {
        match self {
            Subscription::Gallery => true,
            Subscription::Artworks(ids) => ids.contains(&artwork_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub user_id: Option<i64>,
    pub subscription: Subscription,
    /// Free-form label for logs (remote address, user agent)
    pub peer: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Maximum simultaneous connections; `None` for unbounded
    pub capacity: Option<usize>,
    /// Per-connection queue length
    pub send_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            send_buffer: 64,
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

struct ConnectionEntry {
    tx: mpsc::Sender<LikeEvent>,
    ctx: ClientContext,
    state: ConnectionState,
    connected_at: DateTime<Utc>,
}

pub struct NotificationHub {
    config: HubConfig,
    store: Arc<dyn ArtworkStore>,
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionHandle, ConnectionEntry>>,
    artwork_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl NotificationHub {
    pub fn new(config: HubConfig, store: Arc<dyn ArtworkStore>) -> Self {
        info!(
            "[Hub] Initialized (capacity: {:?}, send buffer: {})",
            config.capacity, config.send_buffer
        );
        Self {
            config,
            store,
            next_id: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
            artwork_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection. It starts in `Connecting` and already
    /// receives events; they queue until the socket drains them.
    pub fn connect(
        &self,
        ctx: ClientContext,
    ) -> Result<(ConnectionHandle, mpsc::Receiver<LikeEvent>)> {
        let mut connections = self.connections.lock();

        if let Some(capacity) = self.config.capacity {
            if connections.len() >= capacity {
                warn!(
                    "[Hub] Rejecting connection from {:?}: registry full ({})",
                    ctx.peer, capacity
                );
                return Err(HubError::ResourceExhausted { capacity });
            }
        }

        let handle = ConnectionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.send_buffer.max(1));

        info!(
            "[Hub] {} connected (user: {:?}, peer: {:?}, active: {})",
            handle,
            ctx.user_id,
            ctx.peer,
            connections.len() + 1
        );

        connections.insert(
            handle,
            ConnectionEntry {
                tx,
                ctx,
                state: ConnectionState::Connecting,
                connected_at: Utc::now(),
            },
        );

        Ok((handle, rx))
    }

    /// Mark a registered connection as `Active`. Returns false if it is gone.
    pub fn activate(&self, handle: ConnectionHandle) -> bool {
        match self.connections.lock().get_mut(&handle) {
            Some(entry) => {
                entry.state = ConnectionState::Active;
                true
            }
            None => false,
        }
    }

    /// Remove a connection. Idempotent: returns false if it was already gone.
    pub fn disconnect(&self, handle: ConnectionHandle) -> bool {
        let removed = self.connections.lock().remove(&handle);
        match removed {
            Some(entry) => {
                let lifetime = Utc::now() - entry.connected_at;
                info!(
                    "[Hub] {} disconnected after {}s",
                    handle,
                    lifetime.num_seconds()
                );
                true
            }
            None => false,
        }
    }

    pub fn state(&self, handle: ConnectionHandle) -> ConnectionState {
        self.connections
            .lock()
            .get(&handle)
            .map(|entry| entry.state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Replace the subscription of a live connection.
    pub fn subscribe(&self, handle: ConnectionHandle, subscription: Subscription) -> bool {
        match self.connections.lock().get_mut(&handle) {
            Some(entry) => {
                debug!("[Hub] {} subscription -> {:?}", handle, subscription);
                entry.ctx.subscription = subscription;
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.config.capacity
    }

    /// Queue `event` on every connection whose subscription covers it.
    ///
    /// Never waits. Connections whose queue is closed or full are removed.
    pub fn broadcast(&self, event: &LikeEvent) -> BroadcastReport {
        let mut connections = self.connections.lock();
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        for (handle, entry) in connections.iter() {
            if !entry.ctx.subscription.covers(event.artwork_id) {
                continue;
            }
            match entry.tx.try_send(*event) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("[Hub] Dropping {}: {}", handle, e);
                    failed.push(*handle);
                }
            }
        }

        for handle in failed {
            connections.remove(&handle);
            report.evicted += 1;
        }

        debug!(
            "[Hub] Broadcast artwork {} count {} -> {} delivered, {} evicted",
            event.artwork_id, event.like_count, report.delivered, report.evicted
        );
        report
    }

    /// Persist a like, then broadcast the new count.
    ///
    /// Nothing is broadcast when the store rejects the like.
    pub async fn publish_like(&self, artwork_id: i64, user_id: i64) -> Result<LikeEvent> {
        let lock = self.artwork_lock(artwork_id);
        let result = {
            let _guard = lock.lock().await;
            match self.store.record_like(artwork_id, user_id).await {
                Ok(like_count) => {
                    let event = LikeEvent {
                        artwork_id,
                        like_count,
                    };
                    self.broadcast(&event);
                    Ok(event)
                }
                Err(e) => Err(HubError::from(e)),
            }
        };
        self.release_artwork_lock(artwork_id, lock);

        if let Err(e) = &result {
            warn!(
                "[Hub] Like by user {} on artwork {} not published: {}",
                user_id, artwork_id, e
            );
        }
        result
    }

    fn artwork_lock(&self, artwork_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.artwork_locks
            .lock()
            .entry(artwork_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Forget the per-artwork lock once nobody else holds or waits on it.
    fn release_artwork_lock(&self, artwork_id: i64, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.artwork_locks.lock();
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&artwork_id);
        }
    }
}
