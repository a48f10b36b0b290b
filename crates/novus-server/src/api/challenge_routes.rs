//! Team-facing challenge catalog.

use axum::Json;
use axum::extract::State;
use novus_core::config::StorageConfig;
use serde::Serialize;

use super::{ApiError, AppState, TeamSession};
use crate::storage::{ChallengeFile, Difficulty, PublicChallengeRow};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLink {
    pub id: String,
    pub file_name: String,
    pub file_size: String,
    pub download_url: String,
}

impl FileLink {
    pub fn new(file: ChallengeFile, storage: &StorageConfig) -> Self {
        Self {
            download_url: storage.download_url(&file.file_path),
            id: file.id,
            file_name: file.file_name,
            file_size: file.file_size,
        }
    }
}

/// A catalog entry. Locked challenges are stubs: description, hint and
/// files are withheld until the challenge opens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicChallenge {
    pub id: String,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub points: i64,
    pub solve_count: i64,
    pub is_locked: bool,
    pub solved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub files: Vec<FileLink>,
}

impl PublicChallenge {
    fn stub(row: PublicChallengeRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            category: row.category,
            difficulty: row.difficulty,
            points: row.points,
            solve_count: row.solve_count,
            is_locked: true,
            solved: row.solved,
            description: None,
            hint: None,
            files: Vec::new(),
        }
    }

    fn open(row: PublicChallengeRow, files: Vec<FileLink>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            category: row.category,
            difficulty: row.difficulty,
            points: row.points,
            solve_count: row.solve_count,
            is_locked: false,
            solved: row.solved,
            description: Some(row.description),
            hint: row.hint,
            files,
        }
    }
}

/// `GET /api/challenges`
pub async fn list_challenges(
    State(state): State<AppState>,
    session: TeamSession,
) -> Result<Json<Vec<PublicChallenge>>, ApiError> {
    let rows = state.db.list_public_challenges(&session.team.id).await?;

    let mut catalog = Vec::with_capacity(rows.len());
    for row in rows {
        if row.is_locked {
            catalog.push(PublicChallenge::stub(row));
            continue;
        }
        let files = state
            .db
            .list_challenge_files(&row.id)
            .await?
            .into_iter()
            .map(|f| FileLink::new(f, &state.config.storage))
            .collect();
        catalog.push(PublicChallenge::open(row, files));
    }

    Ok(Json(catalog))
}
