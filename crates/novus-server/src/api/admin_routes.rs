//! Admin endpoints. Every handler takes an [`AdminSession`], which re-checks
//! the admin grant on each request.
//!
//! Responses are the full store rows, flags included.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{AdminSession, ApiError, AppState, validation};
use crate::storage::{
    Challenge, ChallengeFile, ChallengeUpdate, Difficulty, NewChallenge, NewChallengeFile,
    Submission, SubmissionFilter, Team, TeamUpdate,
};

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    validation::required(value, field)
}

fn positive_points(points: i64) -> Result<i64, ApiError> {
    if points <= 0 {
        return Err(ApiError::BadRequest("Points must be positive".into()));
    }
    Ok(points)
}

/// `GET /api/admin/challenges`
pub async fn list_challenges(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<Challenge>>, ApiError> {
    Ok(Json(state.db.list_challenges().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeRequest {
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub description: String,
    pub points: i64,
    pub flag: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

const fn default_visible() -> bool {
    true
}

/// `POST /api/admin/challenges`
#[instrument(skip_all, fields(admin = %admin.user_id))]
pub async fn create_challenge(
    State(state): State<AppState>,
    admin: AdminSession,
    payload: Result<Json<CreateChallengeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Challenge>), ApiError> {
    let Json(req) = payload?;
    let new = NewChallenge {
        title: non_empty(&req.title, "Title")?,
        category: non_empty(&req.category, "Category")?,
        difficulty: req.difficulty,
        description: req.description.trim(),
        points: positive_points(req.points)?,
        flag: non_empty(&req.flag, "Flag")?,
        hint: req.hint.as_deref().map(str::trim).filter(|h| !h.is_empty()),
        is_locked: req.is_locked,
        is_visible: req.is_visible,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let challenge = state.db.create_challenge(&id, &new).await?;
    info!(challenge = %challenge.id, title = %challenge.title, "Challenge created");
    Ok((StatusCode::CREATED, Json(challenge)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateChallengeRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub description: Option<String>,
    pub points: Option<i64>,
    pub flag: Option<String>,
    pub hint: Option<String>,
    pub is_locked: Option<bool>,
    pub is_visible: Option<bool>,
}

/// `PUT /api/admin/challenges/{id}`
#[instrument(skip_all, fields(admin = %admin.user_id, challenge = %id))]
pub async fn update_challenge(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<UpdateChallengeRequest>, JsonRejection>,
) -> Result<Json<Challenge>, ApiError> {
    let Json(req) = payload?;
    let update = ChallengeUpdate {
        title: req.title.as_deref().map(|t| non_empty(t, "Title")).transpose()?,
        category: req.category.as_deref().map(|c| non_empty(c, "Category")).transpose()?,
        difficulty: req.difficulty,
        description: req.description.as_deref().map(str::trim),
        points: req.points.map(positive_points).transpose()?,
        flag: req.flag.as_deref().map(|f| non_empty(f, "Flag")).transpose()?,
        hint: req.hint.as_deref().map(str::trim),
        is_locked: req.is_locked,
        is_visible: req.is_visible,
    };

    let challenge = state.db.update_challenge(&id, &update).await?;
    info!("Challenge updated");
    Ok(Json(challenge))
}

/// `DELETE /api/admin/challenges/{id}`
#[instrument(skip_all, fields(admin = %admin.user_id, challenge = %id))]
pub async fn delete_challenge(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_challenge(&id).await? {
        return Err(ApiError::NotFound("Challenge not found".into()));
    }
    info!("Challenge deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeStateRequest {
    pub is_locked: Option<bool>,
    pub is_visible: Option<bool>,
}

/// `PATCH /api/admin/challenges/{id}/state`
///
/// Omitted fields keep their current value.
#[instrument(skip_all, fields(admin = %admin.user_id, challenge = %id))]
pub async fn set_challenge_state(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<ChallengeStateRequest>, JsonRejection>,
) -> Result<Json<Challenge>, ApiError> {
    let Json(req) = payload?;
    let current = state.db.get_challenge(&id).await?;
    let is_locked = req.is_locked.unwrap_or(current.is_locked);
    let is_visible = req.is_visible.unwrap_or(current.is_visible);

    let challenge = state.db.set_challenge_state(&id, is_locked, is_visible).await?;
    info!(is_locked, is_visible, "Challenge state changed");
    Ok(Json(challenge))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFileRequest {
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub file_size: String,
}

/// `POST /api/admin/challenges/{id}/files`
#[instrument(skip_all, fields(admin = %admin.user_id, challenge = %id))]
pub async fn add_challenge_file(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<AddFileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChallengeFile>), ApiError> {
    let Json(req) = payload?;
    state.db.get_challenge(&id).await?;

    let file = NewChallengeFile {
        file_name: non_empty(&req.file_name, "File name")?,
        file_path: non_empty(&req.file_path, "File path")?,
        file_size: req.file_size.trim(),
    };
    let file_id = uuid::Uuid::new_v4().to_string();
    let created = state.db.add_challenge_file(&file_id, &id, &file).await?;
    info!(file = %created.id, "Challenge file attached");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /api/admin/files/{id}`
pub async fn delete_challenge_file(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_challenge_file(&id).await? {
        return Err(ApiError::NotFound("File not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/teams`
pub async fn list_teams(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.db.list_teams().await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub leader_name: Option<String>,
    pub leader_email: Option<String>,
    pub institution: Option<String>,
    pub team_size: Option<i64>,
}

/// `PUT /api/admin/teams/{id}`
#[instrument(skip_all, fields(admin = %admin.user_id, team = %id))]
pub async fn update_team(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTeamRequest>, JsonRejection>,
) -> Result<Json<Team>, ApiError> {
    let Json(req) = payload?;
    let update = TeamUpdate {
        name: req.name.as_deref().map(validation::team_name).transpose()?,
        leader_name: req
            .leader_name
            .as_deref()
            .map(|n| validation::required(n, "Leader name"))
            .transpose()?,
        leader_email: req.leader_email.as_deref().map(validation::email).transpose()?,
        institution: req
            .institution
            .as_deref()
            .map(|i| validation::required(i, "Institution"))
            .transpose()?,
        team_size: req.team_size.map(validation::team_size).transpose()?,
    };

    let team = state.db.update_team(&id, &update).await?;
    info!("Team updated");
    Ok(Json(team))
}

/// `DELETE /api/admin/teams/{id}`
#[instrument(skip_all, fields(admin = %admin.user_id, team = %id))]
pub async fn delete_team(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.db.delete_team(&id).await? {
        return Err(ApiError::NotFound("Team not found".into()));
    }
    info!("Team deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionQuery {
    pub team_id: Option<String>,
    pub challenge_id: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/admin/submissions`
pub async fn list_submissions(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let filter = SubmissionFilter {
        team_id: query.team_id,
        challenge_id: query.challenge_id,
        limit: query.limit.filter(|l| *l > 0),
    };
    Ok(Json(state.db.list_submissions(&filter).await?))
}
