//! Flag verification service.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use novus_core::db::unix_timestamp;

use crate::storage::{AttemptOutcome, DatabaseError, NovusDatabase};

/// Window for the incorrect-attempt rate limit.
const RATE_WINDOW_SECS: i64 = 60;

/// Body of a verification request. Absent and empty fields are both
/// treated as missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub challenge_id: Option<String>,
    pub team_id: Option<String>,
    pub submitted_flag: Option<String>,
}

impl VerifyRequest {
    fn fields(&self) -> Option<(&str, &str, &str)> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        Some((
            present(&self.challenge_id)?,
            present(&self.team_id)?,
            present(&self.submitted_flag)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_solved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    pub message: String,
}

impl VerifyOutcome {
    fn already_solved() -> Self {
        Self {
            correct: true,
            already_solved: Some(true),
            points: None,
            message: "Challenge already solved".to_string(),
        }
    }

    fn solved(points: i64) -> Self {
        Self {
            correct: true,
            already_solved: None,
            points: Some(points),
            message: "Flag verified successfully!".to_string(),
        }
    }

    fn incorrect() -> Self {
        Self {
            correct: false,
            already_solved: None,
            points: None,
            message: "Incorrect flag. Try again!".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Missing required fields")]
    InvalidRequest,

    #[error("Challenge not found")]
    NotFound,

    #[error("Challenge is not accessible")]
    Forbidden,

    #[error("Too many incorrect submissions, wait a minute and try again")]
    RateLimited,

    #[error("{0}")]
    Unexpected(String),
}

impl From<DatabaseError> for VerifyError {
    fn from(e: DatabaseError) -> Self {
        Self::Unexpected(e.to_string())
    }
}

/// Exact, case-sensitive comparison after trimming the submission.
///
/// The stored flag is used as-is.
pub fn flag_matches(submitted: &str, expected: &str) -> bool {
    submitted.trim().as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Checks submitted flags and credits first solves.
#[derive(Clone)]
pub struct FlagVerifier {
    db: NovusDatabase,
    max_wrong_per_minute: u32,
}

impl FlagVerifier {
    /// `max_wrong_per_minute == 0` disables the rate limit.
    pub const fn new(db: NovusDatabase, max_wrong_per_minute: u32) -> Self {
        Self {
            db,
            max_wrong_per_minute,
        }
    }

    /// Verify one submission.
    ///
    /// The caller is responsible for having authenticated `team_id`.
    #[instrument(skip_all, fields(challenge_id, team_id))]
    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, VerifyError> {
        let (challenge_id, team_id, submitted) = request.fields().ok_or(VerifyError::InvalidRequest)?;
        tracing::Span::current()
            .record("challenge_id", challenge_id)
            .record("team_id", team_id);

        let challenge = match self.db.get_challenge(challenge_id).await {
            Ok(challenge) => challenge,
            Err(DatabaseError::NotFound(_)) => return Err(VerifyError::NotFound),
            Err(e) => return Err(e.into()),
        };

        if !challenge.is_accessible() {
            warn!(
                is_visible = challenge.is_visible,
                is_locked = challenge.is_locked,
                "Submission for inaccessible challenge"
            );
            return Err(VerifyError::Forbidden);
        }

        if self.db.find_correct_submission(team_id, challenge_id).await?.is_some() {
            info!("Challenge already solved");
            return Ok(VerifyOutcome::already_solved());
        }

        // Blocks correct flags too once the window is full. Wrong attempts are
        // re-counted under the write lock below, which keeps the limit exact.
        let since = unix_timestamp() - RATE_WINDOW_SECS;
        if self.max_wrong_per_minute > 0 {
            let recent = self.db.count_recent_wrong(team_id, challenge_id, since).await?;
            if recent >= i64::from(self.max_wrong_per_minute) {
                warn!(recent, limit = self.max_wrong_per_minute, "Submission rate limited");
                return Err(VerifyError::RateLimited);
            }
        }

        let correct = flag_matches(submitted, &challenge.flag);
        let submission_id = uuid::Uuid::new_v4().to_string();

        if !correct && self.max_wrong_per_minute > 0 {
            let recorded = self
                .db
                .record_wrong_attempt_within_limit(
                    &submission_id,
                    team_id,
                    challenge_id,
                    submitted,
                    since,
                    self.max_wrong_per_minute,
                )
                .await?;
            if recorded.is_none() {
                warn!(limit = self.max_wrong_per_minute, "Submission rate limited");
                return Err(VerifyError::RateLimited);
            }
            info!("Incorrect flag");
            return Ok(VerifyOutcome::incorrect());
        }

        let outcome = self
            .db
            .record_attempt(&submission_id, team_id, challenge_id, submitted, correct)
            .await?;

        Ok(match outcome {
            AttemptOutcome::Recorded(_) => {
                info!("Incorrect flag");
                VerifyOutcome::incorrect()
            }
            AttemptOutcome::AlreadySolved => {
                info!("Challenge solved concurrently");
                VerifyOutcome::already_solved()
            }
            AttemptOutcome::Scored { team, points, .. } => {
                info!(points, score = team.score, "Flag verified");
                VerifyOutcome::solved(points)
            }
        })
    }
}
