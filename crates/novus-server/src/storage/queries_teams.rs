//! Team queries.
//!
//! Every mutation here publishes its change on the database's feed after the
//! transaction commits.

use novus_core::db::unix_timestamp;

use super::db::NovusDatabase;
use super::models::{PublicTeam, Team, TeamMember};
use crate::feed::TeamChange;
use novus_core::db::DatabaseError;

/// Ranking order shared by every leaderboard read. `Standings` sorts the same way.
const RANK_ORDER: &str = "score DESC, score_updated_at ASC, name COLLATE BINARY ASC, id ASC";

/// Parameters for registering a team.
pub struct NewTeam<'a> {
    pub team_id: &'a str,
    pub name: &'a str,
    pub leader_name: &'a str,
    pub leader_email: &'a str,
    pub institution: &'a str,
    pub team_size: i64,
    pub password_hash: &'a str,
}

/// An additional team member.
pub struct NewMember<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
}

/// Admin edit of team metadata. `None` leaves a column unchanged.
#[derive(Default)]
pub struct TeamUpdate<'a> {
    pub name: Option<&'a str>,
    pub leader_name: Option<&'a str>,
    pub leader_email: Option<&'a str>,
    pub institution: Option<&'a str>,
    pub team_size: Option<i64>,
}

impl NovusDatabase {
    /// Register a team and its leader as the first member.
    pub async fn create_team(&self, id: &str, team: &NewTeam<'_>) -> Result<Team, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO teams (id, team_id, name, leader_name, leader_email, institution, team_size, \
             password_hash, score, score_updated_at, revision, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(team.team_id)
        .bind(team.name)
        .bind(team.leader_name)
        .bind(team.leader_email)
        .bind(team.institution)
        .bind(team.team_size)
        .bind(team.password_hash)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO team_members (id, team_id, name, email, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(id)
            .bind(team.leader_name)
            .bind(team.leader_email)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        self.feed().publish(TeamChange::Insert {
            new: created.to_public(),
        });
        Ok(created)
    }

    /// Get a team by its store id.
    pub async fn get_team(&self, id: &str) -> Result<Team, DatabaseError> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Team {id}")))
    }

    /// Get a team by its human-facing code (e.g. `NVS-2026-4F7KQ2`).
    pub async fn get_team_by_code(&self, team_id: &str) -> Result<Team, DatabaseError> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE team_id = ?")
            .bind(team_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Team with code {team_id}")))
    }

    /// All teams with full metadata, oldest registration first.
    pub async fn list_teams(&self) -> Result<Vec<Team>, DatabaseError> {
        let teams = sqlx::query_as::<_, Team>("SELECT * FROM teams ORDER BY created_at ASC, id ASC")
            .fetch_all(self.pool())
            .await?;
        Ok(teams)
    }

    /// Public projection of every team, in ranking order.
    pub async fn list_public_teams(&self) -> Result<Vec<PublicTeam>, DatabaseError> {
        let sql = format!(
            "SELECT id, team_id, name, institution, score, leader_name, score_updated_at, revision \
             FROM teams ORDER BY {RANK_ORDER}"
        );
        let teams = sqlx::query_as::<_, PublicTeam>(&sql)
            .fetch_all(self.pool())
            .await?;
        Ok(teams)
    }

    /// Members of a team, leader first.
    pub async fn list_team_members(&self, team_id: &str) -> Result<Vec<TeamMember>, DatabaseError> {
        let members = sqlx::query_as::<_, TeamMember>(
            "SELECT * FROM team_members WHERE team_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(team_id)
        .fetch_all(self.pool())
        .await?;
        Ok(members)
    }

    /// Add members to a team and set `team_size` to the resulting head count.
    ///
    /// Fails with [`DatabaseError::Conflict`] if the team would exceed four
    /// members; nothing is written in that case.
    pub async fn add_team_members(
        &self,
        team_id: &str,
        members: &[NewMember<'_>],
    ) -> Result<Team, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        for member in members {
            sqlx::query(
                "INSERT INTO team_members (id, team_id, name, email, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(team_id)
            .bind(member.name)
            .bind(member.email)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE team_id = ?")
            .bind(team_id)
            .fetch_one(&mut *tx)
            .await?;
        if count > 4 {
            return Err(DatabaseError::Conflict(format!(
                "Team {team_id} would have {count} members (max 4)"
            )));
        }

        let updated = sqlx::query_as::<_, Team>(
            "UPDATE teams SET team_size = ?, revision = revision + 1, updated_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(count)
        .bind(now)
        .bind(team_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Team {team_id}")))?;

        tx.commit().await?;

        self.feed().publish(TeamChange::Update {
            new: updated.to_public(),
        });
        Ok(updated)
    }

    /// Edit team metadata. Score fields are not editable here.
    pub async fn update_team(&self, id: &str, update: &TeamUpdate<'_>) -> Result<Team, DatabaseError> {
        let now = unix_timestamp();

        let updated = sqlx::query_as::<_, Team>(
            "UPDATE teams SET \
                name = COALESCE(?, name), \
                leader_name = COALESCE(?, leader_name), \
                leader_email = COALESCE(?, leader_email), \
                institution = COALESCE(?, institution), \
                team_size = COALESCE(?, team_size), \
                revision = revision + 1, \
                updated_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(update.name)
        .bind(update.leader_name)
        .bind(update.leader_email)
        .bind(update.institution)
        .bind(update.team_size)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Team {id}")))?;

        self.feed().publish(TeamChange::Update {
            new: updated.to_public(),
        });
        Ok(updated)
    }

    /// Delete a team together with its submissions and members.
    ///
    /// Solve counts of the challenges the team had solved are decremented in
    /// the same transaction so `solve_count` keeps matching the number of
    /// distinct solving teams.
    pub async fn delete_team(&self, id: &str) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "UPDATE challenges SET solve_count = solve_count - 1 WHERE id IN \
             (SELECT challenge_id FROM submissions WHERE team_id = ? AND is_correct = 1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM submissions WHERE team_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let revision: Option<i64> =
            sqlx::query_scalar("DELETE FROM teams WHERE id = ? RETURNING revision")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        let Some(revision) = revision else {
            return Ok(false);
        };
        self.feed().publish(TeamChange::Delete {
            id: id.to_string(),
            revision: revision + 1,
        });
        Ok(true)
    }
}
