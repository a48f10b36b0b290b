//! Change feed for the `teams` table.
//!
//! Storage publishes a [`TeamChange`] after every committed team mutation.
//! Subscribers receive events through a bounded broadcast channel; a
//! subscriber that falls more than the channel capacity behind gets
//! [`FeedError::Lagged`] and is expected to re-read a snapshot.

mod standings;
mod view;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::storage::PublicTeam;

pub use standings::{RankedTeam, Standings};
pub use view::{LeaderboardView, ViewUpdate};

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// A committed change to one team row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "UPPERCASE")]
pub enum TeamChange {
    Insert { new: PublicTeam },
    Update { new: PublicTeam },
    /// `revision` is one past the last revision the row had.
    Delete { id: String, revision: i64 },
}

impl TeamChange {
    /// Store id of the affected team.
    pub fn team_id(&self) -> &str {
        match self {
            Self::Insert { new } | Self::Update { new } => &new.id,
            Self::Delete { id, .. } => id,
        }
    }

    pub const fn revision(&self) -> i64 {
        match self {
            Self::Insert { new } | Self::Update { new } => new.revision,
            Self::Delete { revision, .. } => *revision,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "INSERT",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
        }
    }
}

/// Errors observed by a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("subscriber lagged, {0} events skipped")]
    Lagged(u64),

    #[error("change feed closed")]
    Closed,
}

/// Publisher side of the feed. Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<TeamChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a committed change. Having no subscribers is not an error.
    pub fn publish(&self, change: TeamChange) {
        let kind = change.kind();
        let team_id = change.team_id().to_string();
        let revision = change.revision();
        match self.tx.send(change) {
            Ok(receivers) => debug!(kind, team_id, revision, receivers, "Team change published"),
            Err(_) => debug!(kind, team_id, revision, "Team change published with no subscribers"),
        }
    }

    /// Attach a new subscriber. It sees every event published from now on.
    pub fn subscribe(&self) -> Subscription {
        let rx = self.tx.subscribe();
        debug!(subscribers = self.tx.receiver_count(), "Feed subscription acquired");
        Subscription { rx }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A live attachment to the feed. Dropping it detaches from the channel.
pub struct Subscription {
    rx: broadcast::Receiver<TeamChange>,
}

impl Subscription {
    /// Wait for the next change.
    pub async fn recv(&mut self) -> Result<TeamChange, FeedError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(n) => FeedError::Lagged(n),
            broadcast::error::RecvError::Closed => FeedError::Closed,
        })
    }

    /// Next buffered change without waiting, `Ok(None)` if none is buffered.
    pub fn try_recv(&mut self) -> Result<Option<TeamChange>, FeedError> {
        match self.rx.try_recv() {
            Ok(change) => Ok(Some(change)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(FeedError::Lagged(n)),
            Err(broadcast::error::TryRecvError::Closed) => Err(FeedError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!("Feed subscription released");
    }
}
