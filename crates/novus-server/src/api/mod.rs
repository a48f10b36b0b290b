//! HTTP API.
//!
//! JSON over axum. Team routes authenticate with a team bearer token, admin
//! routes with an admin token whose grant is re-checked on every request.

mod admin_routes;
mod auth_routes;
mod challenge_routes;
pub mod error;
mod extract;
mod flag_routes;
mod leaderboard_routes;
mod team_routes;
mod validation;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::{delete, get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use novus_core::Config;

use crate::auth::JwtManager;
use crate::scoring::FlagVerifier;
use crate::setup::{AdminCredential, AdminSetupService};
use crate::storage::NovusDatabase;

pub use error::ApiError;
pub use extract::{AdminSession, TeamSession};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: NovusDatabase,
    pub jwt: Arc<JwtManager>,
    pub verifier: FlagVerifier,
    pub setup: Arc<AdminSetupService<NovusDatabase>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire every service from one database handle and the resolved config.
    pub fn new(db: NovusDatabase, config: Config) -> Self {
        let jwt = JwtManager::new(config.auth.jwt_secret.as_bytes(), config.auth.access_ttl_secs);
        let verifier = FlagVerifier::new(db.clone(), config.competition.max_wrong_per_minute);
        let setup = AdminSetupService::new(
            db.clone(),
            db.clone(),
            AdminCredential::from_config(&config.auth),
        );
        Self {
            db,
            jwt: Arc::new(jwt),
            verifier,
            setup: Arc::new(setup),
            config: Arc::new(config),
        }
    }
}

/// CORS policy: any origin, the headers browser clients send.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/challenges",
            get(admin_routes::list_challenges).post(admin_routes::create_challenge),
        )
        .route(
            "/challenges/{id}",
            put(admin_routes::update_challenge).delete(admin_routes::delete_challenge),
        )
        .route("/challenges/{id}/state", patch(admin_routes::set_challenge_state))
        .route("/challenges/{id}/files", post(admin_routes::add_challenge_file))
        .route("/files/{id}", delete(admin_routes::delete_challenge_file))
        .route("/teams", get(admin_routes::list_teams))
        .route(
            "/teams/{id}",
            put(admin_routes::update_team).delete(admin_routes::delete_team),
        )
        .route("/submissions", get(admin_routes::list_submissions));

    let api = Router::new()
        .route("/auth", post(auth_routes::authenticate))
        .route("/verify-flag", post(flag_routes::verify_flag))
        .route("/setup-admin", post(auth_routes::setup_admin))
        .route("/challenges", get(challenge_routes::list_challenges))
        .route("/team", get(team_routes::own_team))
        .route("/team/members", post(team_routes::add_members))
        .route("/leaderboard", get(leaderboard_routes::leaderboard))
        .route("/leaderboard/stream", get(leaderboard_routes::stream))
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// `GET /health`
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
