//! Data models for Novus storage.
//!
//! Row types mirror the tables in `migrations/`. Types that reach team-facing
//! endpoints (`PublicTeam`, `PublicChallengeRow`) are separate structs so the
//! columns they omit (leader email, password hash, flag) are never selected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Insane,
}

/// Full team row. Only the owning team and admins see this.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub leader_name: String,
    pub leader_email: String,
    pub institution: String,
    pub team_size: i64,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub score: i64,
    pub score_updated_at: i64,
    pub revision: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Privacy-preserving team projection used by the leaderboard and the feed.
///
/// `score_updated_at` and `revision` order rows and events in-process and are
/// not part of the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicTeam {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub institution: String,
    pub score: i64,
    pub leader_name: String,
    #[serde(skip_serializing, default)]
    pub score_updated_at: i64,
    #[serde(skip_serializing, default)]
    pub revision: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: i64,
}

/// Full challenge row including the flag. Admin and scoring use only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub points: i64,
    pub flag: String,
    pub hint: Option<String>,
    pub is_locked: bool,
    pub is_visible: bool,
    pub solve_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Challenge {
    /// Whether teams may currently submit flags for this challenge.
    pub const fn is_accessible(&self) -> bool {
        self.is_visible && !self.is_locked
    }
}

/// Challenge row as seen by a team: no flag, plus the team's solve state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublicChallengeRow {
    pub id: String,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub description: String,
    pub points: i64,
    pub hint: Option<String>,
    pub is_locked: bool,
    pub solve_count: i64,
    pub solved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChallengeFile {
    pub id: String,
    pub challenge_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: String,
    pub created_at: i64,
}

/// One flag attempt. Rows are never updated or deleted while the team and
/// challenge exist.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Submission {
    pub id: String,
    pub team_id: String,
    pub challenge_id: String,
    pub submitted_flag: String,
    pub is_correct: bool,
    pub submitted_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminUser {
    pub id: String,
    pub user_id: String,
    pub created_at: i64,
}

impl Team {
    /// Leaderboard projection of this row.
    pub fn to_public(&self) -> PublicTeam {
        PublicTeam {
            id: self.id.clone(),
            team_id: self.team_id.clone(),
            name: self.name.clone(),
            institution: self.institution.clone(),
            score: self.score,
            leader_name: self.leader_name.clone(),
            score_updated_at: self.score_updated_at,
            revision: self.revision,
        }
    }
}
