//! Challenge catalog and challenge file queries.

use novus_core::db::{DatabaseError, unix_timestamp};

use super::db::NovusDatabase;
use super::models::{Challenge, ChallengeFile, Difficulty, PublicChallengeRow};

/// Parameters for creating a challenge.
pub struct NewChallenge<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub difficulty: Difficulty,
    pub description: &'a str,
    pub points: i64,
    pub flag: &'a str,
    pub hint: Option<&'a str>,
    pub is_locked: bool,
    pub is_visible: bool,
}

/// Admin edit of a challenge. `None` leaves a column unchanged.
#[derive(Default)]
pub struct ChallengeUpdate<'a> {
    pub title: Option<&'a str>,
    pub category: Option<&'a str>,
    pub difficulty: Option<Difficulty>,
    pub description: Option<&'a str>,
    pub points: Option<i64>,
    pub flag: Option<&'a str>,
    pub hint: Option<&'a str>,
    pub is_locked: Option<bool>,
    pub is_visible: Option<bool>,
}

/// Metadata for a file attached to a challenge. The bytes live in the blob store.
pub struct NewChallengeFile<'a> {
    pub file_name: &'a str,
    pub file_path: &'a str,
    pub file_size: &'a str,
}

impl NovusDatabase {
    pub async fn create_challenge(
        &self,
        id: &str,
        challenge: &NewChallenge<'_>,
    ) -> Result<Challenge, DatabaseError> {
        let now = unix_timestamp();

        let created = sqlx::query_as::<_, Challenge>(
            "INSERT INTO challenges (id, title, category, difficulty, description, points, flag, hint, \
             is_locked, is_visible, solve_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?) RETURNING *",
        )
        .bind(id)
        .bind(challenge.title)
        .bind(challenge.category)
        .bind(challenge.difficulty)
        .bind(challenge.description)
        .bind(challenge.points)
        .bind(challenge.flag)
        .bind(challenge.hint)
        .bind(challenge.is_locked)
        .bind(challenge.is_visible)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(created)
    }

    /// Full challenge row, flag included.
    pub async fn get_challenge(&self, id: &str) -> Result<Challenge, DatabaseError> {
        sqlx::query_as::<_, Challenge>("SELECT * FROM challenges WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Challenge {id}")))
    }

    /// Every challenge, hidden ones included.
    pub async fn list_challenges(&self) -> Result<Vec<Challenge>, DatabaseError> {
        let challenges = sqlx::query_as::<_, Challenge>(
            "SELECT * FROM challenges ORDER BY category ASC, points ASC, title ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(challenges)
    }

    /// Visible challenges as seen by `team_id`, with a per-team `solved` flag.
    ///
    /// The flag column is never selected.
    pub async fn list_public_challenges(
        &self,
        team_id: &str,
    ) -> Result<Vec<PublicChallengeRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PublicChallengeRow>(
            "SELECT c.id, c.title, c.category, c.difficulty, c.description, c.points, c.hint, \
                    c.is_locked, c.solve_count, \
                    EXISTS (SELECT 1 FROM submissions s \
                            WHERE s.challenge_id = c.id AND s.team_id = ? AND s.is_correct = 1) AS solved \
             FROM challenges c \
             WHERE c.is_visible = 1 \
             ORDER BY c.category ASC, c.points ASC, c.title ASC",
        )
        .bind(team_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Apply an admin edit.
    ///
    /// Changing `points` once any team has solved the challenge is refused
    /// with [`DatabaseError::Conflict`], since stored scores would stop
    /// matching the solve log.
    pub async fn update_challenge(
        &self,
        id: &str,
        update: &ChallengeUpdate<'_>,
    ) -> Result<Challenge, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let current = sqlx::query_as::<_, Challenge>("SELECT * FROM challenges WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Challenge {id}")))?;

        if let Some(points) = update.points
            && points != current.points
            && current.solve_count > 0
        {
            return Err(DatabaseError::Conflict(format!(
                "Challenge {id} has {} solves; points are frozen",
                current.solve_count
            )));
        }

        let updated = sqlx::query_as::<_, Challenge>(
            "UPDATE challenges SET \
                title = COALESCE(?, title), \
                category = COALESCE(?, category), \
                difficulty = COALESCE(?, difficulty), \
                description = COALESCE(?, description), \
                points = COALESCE(?, points), \
                flag = COALESCE(?, flag), \
                hint = COALESCE(?, hint), \
                is_locked = COALESCE(?, is_locked), \
                is_visible = COALESCE(?, is_visible), \
                updated_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(update.title)
        .bind(update.category)
        .bind(update.difficulty)
        .bind(update.description)
        .bind(update.points)
        .bind(update.flag)
        .bind(update.hint)
        .bind(update.is_locked)
        .bind(update.is_visible)
        .bind(unix_timestamp())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Toggle lock and visibility together.
    pub async fn set_challenge_state(
        &self,
        id: &str,
        is_locked: bool,
        is_visible: bool,
    ) -> Result<Challenge, DatabaseError> {
        sqlx::query_as::<_, Challenge>(
            "UPDATE challenges SET is_locked = ?, is_visible = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(is_locked)
        .bind(is_visible)
        .bind(unix_timestamp())
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Challenge {id}")))
    }

    /// Delete a challenge, its files and its incorrect submissions.
    ///
    /// A challenge any team has solved is refused with
    /// [`DatabaseError::Conflict`]; lock or hide it instead.
    pub async fn delete_challenge(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let solves: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM submissions WHERE challenge_id = ? AND is_correct = 1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if solves > 0 {
            return Err(DatabaseError::Conflict(format!(
                "Challenge {id} has been solved by {solves} teams"
            )));
        }

        sqlx::query("DELETE FROM submissions WHERE challenge_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM challenges WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_challenge_file(
        &self,
        id: &str,
        challenge_id: &str,
        file: &NewChallengeFile<'_>,
    ) -> Result<ChallengeFile, DatabaseError> {
        let created = sqlx::query_as::<_, ChallengeFile>(
            "INSERT INTO challenge_files (id, challenge_id, file_name, file_path, file_size, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(id)
        .bind(challenge_id)
        .bind(file.file_name)
        .bind(file.file_path)
        .bind(file.file_size)
        .bind(unix_timestamp())
        .fetch_one(self.pool())
        .await?;
        Ok(created)
    }

    pub async fn list_challenge_files(
        &self,
        challenge_id: &str,
    ) -> Result<Vec<ChallengeFile>, DatabaseError> {
        let files = sqlx::query_as::<_, ChallengeFile>(
            "SELECT * FROM challenge_files WHERE challenge_id = ? ORDER BY file_name ASC",
        )
        .bind(challenge_id)
        .fetch_all(self.pool())
        .await?;
        Ok(files)
    }

    pub async fn delete_challenge_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM challenge_files WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
