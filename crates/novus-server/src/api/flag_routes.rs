use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::warn;

use super::{ApiError, AppState, TeamSession};
use crate::scoring::{VerifyOutcome, VerifyRequest};

/// `POST /api/verify-flag`
///
/// The body's `teamId` must name the authenticated team.
pub async fn verify_flag(
    State(state): State<AppState>,
    session: TeamSession,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyOutcome>, ApiError> {
    let Json(request) = payload?;

    if let Some(team_id) = request.team_id.as_deref().filter(|t| !t.is_empty())
        && team_id != session.team.id
    {
        warn!(session_team = %session.team.id, claimed = %team_id, "Flag submitted for another team");
        return Err(ApiError::Forbidden("Cannot submit flags for another team".into()));
    }

    let outcome = state.verifier.verify(&request).await?;
    Ok(Json(outcome))
}
