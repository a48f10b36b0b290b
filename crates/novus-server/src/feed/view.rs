//! Live leaderboard view: a snapshot plus the change feed applied on top.

use tracing::{debug, info, warn};

use super::{FeedError, Standings, Subscription};
use crate::storage::{DatabaseError, NovusDatabase};

/// What [`LeaderboardView::next_update`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    /// A feed event changed the ranking.
    Changed,
    /// The subscription lagged and the standings were rebuilt from a snapshot.
    Resynced,
    /// The feed shut down. No further updates will arrive.
    Closed,
}

/// A mounted leaderboard.
///
/// Holds its feed subscription for as long as it lives; dropping the view
/// (or calling [`unmount`](Self::unmount)) releases it on every exit path.
pub struct LeaderboardView {
    db: NovusDatabase,
    subscription: Subscription,
    standings: Standings,
}

impl LeaderboardView {
    /// Subscribe, then read the initial snapshot.
    ///
    /// Subscribing first means any change committed between the two steps is
    /// buffered on the subscription and replayed over the snapshot; events the
    /// snapshot already reflects are dropped by the revision check.
    pub async fn mount(db: &NovusDatabase) -> Result<Self, DatabaseError> {
        let subscription = db.feed().subscribe();
        let snapshot = db.list_public_teams().await?;
        info!(teams = snapshot.len(), "Leaderboard view mounted");
        Ok(Self {
            db: db.clone(),
            subscription,
            standings: Standings::new(snapshot),
        })
    }

    pub const fn standings(&self) -> &Standings {
        &self.standings
    }

    /// Wait until the ranking changes.
    ///
    /// Events that do not change the ranking (stale revisions) are consumed
    /// silently.
    pub async fn next_update(&mut self) -> Result<ViewUpdate, DatabaseError> {
        loop {
            match self.subscription.recv().await {
                Ok(change) => {
                    if self.standings.apply(&change) {
                        return Ok(ViewUpdate::Changed);
                    }
                    debug!(team_id = change.team_id(), revision = change.revision(), "Stale change skipped");
                }
                Err(FeedError::Lagged(skipped)) => {
                    warn!(skipped, "Leaderboard view lagged, re-reading snapshot");
                    self.resync().await?;
                    return Ok(ViewUpdate::Resynced);
                }
                Err(FeedError::Closed) => return Ok(ViewUpdate::Closed),
            }
        }
    }

    /// Apply every buffered change without waiting. Returns how many changed
    /// the ranking.
    pub async fn apply_pending(&mut self) -> Result<usize, DatabaseError> {
        let mut applied = 0;
        loop {
            match self.subscription.try_recv() {
                Ok(Some(change)) => {
                    if self.standings.apply(&change) {
                        applied += 1;
                    }
                }
                Ok(None) | Err(FeedError::Closed) => return Ok(applied),
                Err(FeedError::Lagged(skipped)) => {
                    warn!(skipped, "Leaderboard view lagged, re-reading snapshot");
                    self.resync().await?;
                    applied += 1;
                }
            }
        }
    }

    async fn resync(&mut self) -> Result<(), DatabaseError> {
        let snapshot = self.db.list_public_teams().await?;
        self.standings.reset(snapshot);
        Ok(())
    }

    /// Release the subscription.
    pub fn unmount(self) {
        info!(teams = self.standings.len(), "Leaderboard view unmounted");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::feed::ChangeFeed;
    use crate::storage::TeamUpdate;
    use crate::storage::test_helpers::{seed_challenge, seed_team};

    async fn assert_converged(view: &LeaderboardView, db: &NovusDatabase) {
        let fresh = db.list_public_teams().await.unwrap();
        assert_eq!(view.standings().teams(), fresh.as_slice());
    }

    #[tokio::test]
    async fn view_converges_after_mixed_changes() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        seed_team(&db, "t1", "Null Pointers").await;
        seed_challenge(&db, "c1", 100, "NOVUS{one}").await;
        seed_challenge(&db, "c2", 250, "NOVUS{two}").await;

        let mut view = LeaderboardView::mount(&db).await.unwrap();
        assert_eq!(view.standings().len(), 1);

        seed_team(&db, "t2", "Segfaults").await;
        seed_team(&db, "t3", "Off By One").await;
        db.record_attempt("s1", "t2", "c1", "NOVUS{one}", true).await.unwrap();
        db.record_attempt("s2", "t3", "c2", "NOVUS{two}", true).await.unwrap();
        db.record_attempt("s3", "t1", "c1", "NOVUS{one}", true).await.unwrap();
        db.update_team(
            "t1",
            &TeamUpdate {
                institution: Some("ETH"),
                ..TeamUpdate::default()
            },
        )
        .await
        .unwrap();
        db.delete_team("t2").await.unwrap();

        view.apply_pending().await.unwrap();
        assert_converged(&view, &db).await;

        let ranked = view.standings().ranked();
        assert_eq!(ranked[0].team.id, "t3");
        assert_eq!(ranked[1].team.id, "t1");
        assert_eq!(ranked[1].team.institution, "ETH");
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn changes_between_subscribe_and_snapshot_are_not_lost() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        seed_team(&db, "t1", "Null Pointers").await;
        seed_challenge(&db, "c1", 100, "NOVUS{one}").await;

        let mut view = LeaderboardView::mount(&db).await.unwrap();
        db.record_attempt("s1", "t1", "c1", "NOVUS{one}", true).await.unwrap();

        assert_eq!(view.next_update().await.unwrap(), ViewUpdate::Changed);
        assert_eq!(view.standings().teams()[0].score, 100);
        assert_converged(&view, &db).await;
    }

    #[tokio::test]
    async fn events_already_in_snapshot_are_skipped() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        let feed_sub = db.feed().subscribe();
        seed_team(&db, "t1", "Null Pointers").await;

        // The insert is both buffered on a subscription taken earlier and
        // present in the snapshot.
        let mut view = LeaderboardView {
            db: db.clone(),
            subscription: feed_sub,
            standings: Standings::new(db.list_public_teams().await.unwrap()),
        };
        assert_eq!(view.apply_pending().await.unwrap(), 0);
        assert_eq!(view.standings().len(), 1);
    }

    #[tokio::test]
    async fn lagged_view_resyncs_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = NovusDatabase::open(&dir.path().join("novus.db"), 2, ChangeFeed::new(2))
        .await
        .unwrap();
        let mut view = LeaderboardView::mount(&db).await.unwrap();

        for i in 0..6 {
            seed_team(&db, &format!("t{i}"), &format!("Team {i}")).await;
        }

        assert_eq!(view.next_update().await.unwrap(), ViewUpdate::Resynced);
        assert_eq!(view.standings().len(), 6);
        view.apply_pending().await.unwrap();
        assert_converged(&view, &db).await;
    }

    #[tokio::test]
    async fn unmount_releases_subscription() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        assert_eq!(db.feed().subscriber_count(), 0);

        let view = LeaderboardView::mount(&db).await.unwrap();
        assert_eq!(db.feed().subscriber_count(), 1);
        view.unmount();
        assert_eq!(db.feed().subscriber_count(), 0);

        for _ in 0..3 {
            let view = LeaderboardView::mount(&db).await.unwrap();
            drop(view);
        }
        assert_eq!(db.feed().subscriber_count(), 0);
    }
}
