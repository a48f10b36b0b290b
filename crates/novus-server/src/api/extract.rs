//! Bearer-token extractors.
//!
//! Identity is always taken from the verified token, never from the body.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;

use super::{ApiError, AppState};
use crate::auth::Claims;
use crate::storage::{DatabaseError, Team};

fn bearer_claims(parts: &Parts, state: &AppState) -> Result<Claims, ApiError> {
    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;

    state
        .jwt
        .validate(token)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))
}

/// An authenticated team. The row is loaded fresh, so a deleted team's
/// tokens stop working immediately.
pub struct TeamSession {
    pub team: Team,
    pub claims: Claims,
}

impl FromRequestParts<AppState> for TeamSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if !claims.is_team() {
            return Err(ApiError::Forbidden("Team session required".into()));
        }

        let team = match state.db.get_team(&claims.sub).await {
            Ok(team) => team,
            Err(DatabaseError::NotFound(_)) => {
                warn!(team_id = %claims.sub, "Token for a team that no longer exists");
                return Err(ApiError::Unauthorized("Team no longer exists".into()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { team, claims })
    }
}

/// An authenticated admin whose grant still exists.
pub struct AdminSession {
    pub user_id: String,
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_claims(parts, state)?;
        if !claims.is_admin() {
            return Err(ApiError::Forbidden("Admin access required".into()));
        }
        if !state.db.is_admin(&claims.sub).await? {
            warn!(user_id = %claims.sub, "Admin token without an admin grant");
            return Err(ApiError::Forbidden("Admin access required".into()));
        }

        Ok(Self {
            user_id: claims.sub.clone(),
            claims,
        })
    }
}
