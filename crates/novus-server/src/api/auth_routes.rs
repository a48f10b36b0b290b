//! `POST /api/auth` and `POST /api/setup-admin`.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::Datelike;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use super::{ApiError, AppState, validation};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{IssuedToken, Role};
use crate::storage::{DatabaseError, NewTeam, Team};

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_SUFFIX_LEN: usize = 6;
const CODE_ATTEMPTS: usize = 5;

/// One request shape per form mode.
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthRequest {
    Register(RegisterForm),
    Login(LoginForm),
    AdminLogin(AdminLoginForm),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterForm {
    pub team_name: String,
    pub leader_name: String,
    pub leader_email: String,
    pub institution: String,
    pub team_size: i64,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginForm {
    pub team_id: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminLoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub id: String,
    pub team_id: String,
    pub name: String,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            team_id: team.team_id.clone(),
            name: team.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// `POST /api/auth`
pub async fn authenticate(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    let response = match request {
        AuthRequest::Register(form) => register(&state, &form).await?,
        AuthRequest::Login(form) => login(&state, &form).await?,
        AuthRequest::AdminLogin(form) => admin_login(&state, &form).await?,
    };
    Ok(Json(response))
}

/// A display code such as `NVS-2026-4F7KQ2`.
fn generate_team_code(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect();
    format!("{prefix}-{}-{suffix}", chrono::Utc::now().year())
}

#[instrument(skip_all, fields(mode = "register"))]
async fn register(state: &AppState, form: &RegisterForm) -> Result<AuthResponse, ApiError> {
    let name = validation::team_name(&form.team_name)?;
    let leader_name = validation::required(&form.leader_name, "Leader name")?;
    let leader_email = validation::email(&form.leader_email)?;
    let institution = validation::required(&form.institution, "Institution")?;
    let team_size = validation::team_size(form.team_size)?;
    let password = validation::password(&form.password)?;

    let password_hash = hash_password(password)?;
    let prefix = &state.config.competition.team_code_prefix;

    let mut attempts = 0;
    let team = loop {
        attempts += 1;
        let code = generate_team_code(prefix);
        let new_team = NewTeam {
            team_id: &code,
            name,
            leader_name,
            leader_email,
            institution,
            team_size,
            password_hash: &password_hash,
        };
        let id = uuid::Uuid::new_v4().to_string();
        match state.db.create_team(&id, &new_team).await {
            Ok(team) => break team,
            // Code collision: draw another one.
            Err(DatabaseError::Conflict(msg))
                if msg.contains("teams.team_id") && attempts < CODE_ATTEMPTS => {}
            Err(DatabaseError::Conflict(msg)) if msg.contains("teams.name") => {
                return Err(ApiError::Conflict("Team name already taken".into()));
            }
            Err(e) => return Err(e.into()),
        }
    };

    let token = state.jwt.issue(&team.id, &team.name, Role::Team)?;
    info!(team = %team.id, code = %team.team_id, "Team registered");
    Ok(AuthResponse {
        token,
        team: Some(TeamSummary::from(&team)),
        user_id: None,
    })
}

#[instrument(skip_all, fields(mode = "login"))]
async fn login(state: &AppState, form: &LoginForm) -> Result<AuthResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid team ID or password".into());

    let team = match state.db.get_team_by_code(form.team_id.trim()).await {
        Ok(team) => team,
        Err(DatabaseError::NotFound(_)) => {
            warn!(code = %form.team_id, "Login for unknown team code");
            return Err(invalid());
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&form.password, &team.password_hash) {
        warn!(team = %team.id, "Failed team login");
        return Err(invalid());
    }

    let token = state.jwt.issue(&team.id, &team.name, Role::Team)?;
    info!(team = %team.id, "Team logged in");
    Ok(AuthResponse {
        token,
        team: Some(TeamSummary::from(&team)),
        user_id: None,
    })
}

#[instrument(skip_all, fields(mode = "admin_login"))]
async fn admin_login(state: &AppState, form: &AdminLoginForm) -> Result<AuthResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let Some(identity) = state.db.get_identity_by_email(form.email.trim()).await? else {
        warn!("Admin login for unknown email");
        return Err(invalid());
    };
    if !verify_password(&form.password, &identity.password_hash) {
        warn!(user_id = %identity.id, "Failed admin login");
        return Err(invalid());
    }
    if !state.db.is_admin(&identity.id).await? {
        warn!(user_id = %identity.id, "Login by identity without admin grant");
        return Err(ApiError::Forbidden("Admin access required".into()));
    }

    let token = state.jwt.issue(&identity.id, &identity.email, Role::Admin)?;
    info!(user_id = %identity.id, "Admin logged in");
    Ok(AuthResponse {
        token,
        team: None,
        user_id: Some(identity.id),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetupAdminRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/setup-admin`
pub async fn setup_admin(
    State(state): State<AppState>,
    payload: Result<Json<SetupAdminRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let user_id = state.setup.setup_admin(&request.email, &request.password).await?;
    Ok(Json(json!({ "success": true, "userId": user_id })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn team_codes_have_prefix_year_and_base36_suffix() {
        let code = generate_team_code("NVS");
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "NVS");
        assert_eq!(parts[1], chrono::Utc::now().year().to_string());
        assert_eq!(parts[2].len(), CODE_SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn auth_request_is_tagged_by_mode() {
        let req: AuthRequest = serde_json::from_value(json!({
            "mode": "login",
            "teamId": "NVS-2026-ABC123",
            "password": "secret1"
        }))
        .unwrap();
        assert!(matches!(req, AuthRequest::Login(f) if f.team_id == "NVS-2026-ABC123"));

        let req: AuthRequest =
            serde_json::from_value(json!({ "mode": "admin_login", "email": "a@b.co" })).unwrap();
        assert!(matches!(req, AuthRequest::AdminLogin(f) if f.password.is_empty()));

        assert!(serde_json::from_value::<AuthRequest>(json!({ "mode": "sudo" })).is_err());
    }
}
