//! The connection registry and broadcast engine.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionId};
use crate::error::UnknownEchoPolicy;
use crate::frame::Frame;
use crate::metrics::{WS_BROADCAST_EVICTIONS_TOTAL, WS_BROADCASTS_TOTAL};

/// Whether a sender receives its own messages back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoPolicy {
    /// Deliver to every member, the sender included.
    #[default]
    IncludeSender,
    /// Deliver to every member except the sender.
    ExcludeSender,
}

impl EchoPolicy {
    /// The member to skip when `sender` originated the message.
    pub fn excluding(self, sender: ConnectionId) -> Option<ConnectionId> {
        match self {
            Self::IncludeSender => None,
            Self::ExcludeSender => Some(sender),
        }
    }

    /// Canonical name, as used in settings files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncludeSender => "include_sender",
            Self::ExcludeSender => "exclude_sender",
        }
    }
}

impl std::fmt::Display for EchoPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EchoPolicy {
    type Err = UnknownEchoPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "include_sender" | "include" | "all" => Ok(Self::IncludeSender),
            "exclude_sender" | "exclude" | "others" => Ok(Self::ExcludeSender),
            _ => Err(UnknownEchoPolicy(s.to_owned())),
        }
    }
}

/// Outcome of one [`Hub::broadcast`] call. Informational only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members the frame was addressed to.
    pub recipients: usize,
    /// Members whose send succeeded.
    pub delivered: usize,
    /// Members removed because their send failed.
    pub evicted: usize,
}

/// Registry of live connections.
///
/// Join and leave take the write lock. Broadcast holds the read lock only
/// while it snapshots the members, so concurrent broadcasts run side by side
/// and never observe a half-applied join or leave.
pub struct Hub {
    members: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// Member count readable without taking the lock.
    active_count: AtomicUsize,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub async fn join(&self, connection: Arc<Connection>) {
        let id = connection.id();
        let mut members = self.members.write().await;
        if members.insert(id, connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        debug!(conn_id = %id, members = members.len(), "joined hub");
    }

    /// Remove a connection if present.
    ///
    /// Absent ids are a no-op, so the receive path and broadcast eviction can
    /// both remove the same member safely. Returns whether an entry was
    /// removed.
    pub async fn leave(&self, id: ConnectionId) -> bool {
        let mut members = self.members.write().await;
        let removed = members.remove(&id).is_some();
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            debug!(conn_id = %id, members = members.len(), "left hub");
        }
        removed
    }

    /// Deliver `frame` to every member except `excluding`.
    ///
    /// Sends run concurrently. Members whose send fails are evicted and
    /// closed once the whole pass is done; their failure never reaches the
    /// caller and never stops delivery to the rest. The call returns after
    /// every send has finished, so a later broadcast cannot overtake this one
    /// at any member.
    pub async fn broadcast(&self, frame: &Frame, excluding: Option<ConnectionId>) -> BroadcastReport {
        let targets: Vec<Arc<Connection>> = {
            let members = self.members.read().await;
            members
                .values()
                .filter(|c| Some(c.id()) != excluding)
                .cloned()
                .collect()
        };

        let outcomes = join_all(targets.iter().map(|conn| {
            let frame = frame.clone();
            async move { conn.send(frame).await.is_ok() }
        }))
        .await;

        let failed: Vec<&Arc<Connection>> = targets
            .iter()
            .zip(&outcomes)
            .filter_map(|(conn, ok)| (!ok).then_some(conn))
            .collect();

        let mut report = BroadcastReport {
            recipients: targets.len(),
            delivered: targets.len() - failed.len(),
            evicted: 0,
        };
        counter!(WS_BROADCASTS_TOTAL, "kind" => frame.kind().to_string()).increment(1);

        if !failed.is_empty() {
            {
                let mut members = self.members.write().await;
                for conn in &failed {
                    if members.remove(&conn.id()).is_some() {
                        let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                        report.evicted += 1;
                    }
                }
            }
            for conn in failed {
                warn!(conn_id = %conn.id(), remote = %conn.remote_addr(), "evicting client after failed send");
                conn.close().await;
            }
            counter!(WS_BROADCAST_EVICTIONS_TOTAL).increment(report.evicted as u64);
        }

        debug!(
            kind = %frame.kind(),
            bytes = frame.len(),
            recipients = report.recipients,
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast"
        );
        report
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Whether the hub has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is currently a member.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    /// Sorted snapshot of member ids.
    pub async fn members(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.members.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
