//! Submission log queries and the scoring transaction.

use novus_core::db::{DatabaseError, unix_timestamp};
use tracing::debug;

use super::db::NovusDatabase;
use super::models::{PublicTeam, Submission};
use crate::feed::TeamChange;

/// Result of recording one flag attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// An incorrect attempt was logged. Nothing else changed.
    Recorded(Submission),
    /// The team already holds a correct submission for the challenge.
    /// Nothing was written.
    AlreadySolved,
    /// First correct submission: the team was credited `points`.
    Scored {
        submission: Submission,
        team: PublicTeam,
        points: i64,
    },
}

/// Filters for the admin submission listing.
#[derive(Debug, Default, Clone)]
pub struct SubmissionFilter {
    pub team_id: Option<String>,
    pub challenge_id: Option<String>,
    pub limit: Option<i64>,
}

impl NovusDatabase {
    /// The team's correct submission for a challenge, if any.
    pub async fn find_correct_submission(
        &self,
        team_id: &str,
        challenge_id: &str,
    ) -> Result<Option<Submission>, DatabaseError> {
        let row = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions WHERE team_id = ? AND challenge_id = ? AND is_correct = 1",
        )
        .bind(team_id)
        .bind(challenge_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Incorrect attempts by a team on a challenge at or after `since`.
    pub async fn count_recent_wrong(
        &self,
        team_id: &str,
        challenge_id: &str,
        since: i64,
    ) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions \
             WHERE team_id = ? AND challenge_id = ? AND is_correct = 0 AND submitted_at >= ?",
        )
        .bind(team_id)
        .bind(challenge_id)
        .bind(since)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Log an incorrect attempt unless the team already has `limit` incorrect
    /// attempts on the challenge at or after `since`.
    ///
    /// The insert runs first inside the transaction, so it holds the write
    /// lock before counting. Concurrent callers are serialized and at most
    /// `limit` attempts land in the window. Returns `None` when the attempt
    /// was rolled back.
    pub async fn record_wrong_attempt_within_limit(
        &self,
        id: &str,
        team_id: &str,
        challenge_id: &str,
        submitted_flag: &str,
        since: i64,
        limit: u32,
    ) -> Result<Option<Submission>, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let submission = sqlx::query_as::<_, Submission>(
            "INSERT INTO submissions (id, team_id, challenge_id, submitted_flag, is_correct, submitted_at) \
             VALUES (?, ?, ?, ?, 0, ?) RETURNING *",
        )
        .bind(id)
        .bind(team_id)
        .bind(challenge_id)
        .bind(submitted_flag)
        .bind(unix_timestamp())
        .fetch_one(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions \
             WHERE team_id = ? AND challenge_id = ? AND is_correct = 0 AND submitted_at >= ?",
        )
        .bind(team_id)
        .bind(challenge_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;

        if count > i64::from(limit) {
            tx.rollback().await?;
            debug!(team_id, challenge_id, count, "Wrong attempt over limit; rolled back");
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(submission))
    }

    /// Append an attempt to the log, crediting the team on a first solve.
    ///
    /// A correct attempt runs in one transaction: the submission insert goes
    /// first, and the partial unique index on `(team_id, challenge_id)` turns
    /// a concurrent duplicate solve into a constraint failure. That case rolls
    /// back and reports [`AttemptOutcome::AlreadySolved`]. Otherwise the
    /// team's score and the challenge's solve count are bumped before commit,
    /// and the new team row is published on the feed after commit.
    pub async fn record_attempt(
        &self,
        id: &str,
        team_id: &str,
        challenge_id: &str,
        submitted_flag: &str,
        is_correct: bool,
    ) -> Result<AttemptOutcome, DatabaseError> {
        let now = unix_timestamp();
        let insert = "INSERT INTO submissions (id, team_id, challenge_id, submitted_flag, is_correct, submitted_at) \
                      VALUES (?, ?, ?, ?, ?, ?) RETURNING *";

        if !is_correct {
            let submission = sqlx::query_as::<_, Submission>(insert)
                .bind(id)
                .bind(team_id)
                .bind(challenge_id)
                .bind(submitted_flag)
                .bind(false)
                .bind(now)
                .fetch_one(self.pool())
                .await?;
            return Ok(AttemptOutcome::Recorded(submission));
        }

        let mut tx = self.pool().begin().await?;

        let submission = match sqlx::query_as::<_, Submission>(insert)
            .bind(id)
            .bind(team_id)
            .bind(challenge_id)
            .bind(submitted_flag)
            .bind(true)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
        {
            Ok(submission) => submission,
            Err(e) => {
                let err = DatabaseError::from(e);
                if err.is_conflict() {
                    debug!(team_id, challenge_id, "Lost solve race; already solved");
                    return Ok(AttemptOutcome::AlreadySolved);
                }
                return Err(err);
            }
        };

        let points: i64 = sqlx::query_scalar(
            "UPDATE challenges SET solve_count = solve_count + 1 WHERE id = ? RETURNING points",
        )
        .bind(challenge_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Challenge {challenge_id}")))?;

        let team = sqlx::query_as::<_, PublicTeam>(
            "UPDATE teams SET score = score + ?, score_updated_at = ?, revision = revision + 1, updated_at = ? \
             WHERE id = ? \
             RETURNING id, team_id, name, institution, score, leader_name, score_updated_at, revision",
        )
        .bind(points)
        .bind(now)
        .bind(now)
        .bind(team_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Team {team_id}")))?;

        tx.commit().await?;

        self.feed().publish(TeamChange::Update { new: team.clone() });
        Ok(AttemptOutcome::Scored {
            submission,
            team,
            points,
        })
    }

    /// Submission log, newest first.
    pub async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>, DatabaseError> {
        let rows = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions \
             WHERE (?1 IS NULL OR team_id = ?1) AND (?2 IS NULL OR challenge_id = ?2) \
             ORDER BY submitted_at DESC, rowid DESC \
             LIMIT ?3",
        )
        .bind(filter.team_id.as_deref())
        .bind(filter.challenge_id.as_deref())
        .bind(filter.limit.unwrap_or(-1))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
