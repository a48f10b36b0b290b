//! Configuration resolution for `Novus`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/novus/settings.json)
//! 3. Project config (.novus/settings.json)
//! 4. Environment variables (`NOVUS_*`)
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete `Novus` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub competition: CompetitionConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database_path: Option<PathBuf>,
    pub max_db_connections: u32,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_path: None,
            max_db_connections: 5,
            log_json: false,
        }
    }
}

/// Shortest accepted HS256 signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Token issuance and the admin bootstrap credential.
///
/// There is no built-in `jwt_secret`; the server refuses to start until one
/// is configured.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_secs: i64,
    /// Distinguished admin email accepted by the setup endpoint.
    pub admin_email: Option<String>,
    /// Distinguished admin password accepted by the setup endpoint.
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_ttl_secs: 12 * 60 * 60,
            admin_email: None,
            admin_password: None,
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthConfig {
    /// Reject a missing or short signing secret.
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(Error::Config(
                "auth.jwt_secret is not set (use --jwt-secret or NOVUS_JWT_SECRET)".into(),
            ));
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(Error::Config(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if self.access_ttl_secs <= 0 {
            return Err(Error::Config("auth.access_ttl_secs must be positive".into()));
        }
        Ok(())
    }

    /// Whether the admin bootstrap credential is configured.
    pub fn has_admin_credential(&self) -> bool {
        self.admin_email.as_deref().is_some_and(|e| !e.is_empty())
            && self.admin_password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Competition rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionConfig {
    /// Prefix of the human-facing team code, e.g. `NVS` in `NVS-2026-4F7KQ2`.
    pub team_code_prefix: String,
    /// Incorrect submissions allowed per team and challenge per minute (0 = unlimited).
    pub max_wrong_per_minute: u32,
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            team_code_prefix: "NVS".to_string(),
            max_wrong_per_minute: 10,
        }
    }
}

/// Leaderboard change feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Broadcast buffer per subscriber before it is considered lagged.
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// External blob store used for challenge files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub blob_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_base_url: "/files".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolve a blob key to a download URL.
    pub fn download_url(&self, file_path: &str) -> String {
        format!(
            "{}/{}",
            self.blob_base_url.trim_end_matches('/'),
            file_path.trim_start_matches('/')
        )
    }
}

impl Config {
    /// Check settings the server cannot run without.
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        config = load_config_file(&global_path)?;
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".novus").join("settings.json");
        if project_path.exists() {
            let overlay: serde_json::Value = read_json(&project_path)?;
            config = merge_json(config, overlay)?;
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Default location of the server database.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("novus.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".novus"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/novus"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("novus"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn load_config_file(path: &Path) -> Result<Config> {
    let value = read_json(path)?;
    serde_json::from_value(value).map_err(|e| {
        Error::Config(format!("Invalid config file {}: {}", path.display(), e))
    })
}

/// Overlay only the keys present in `overlay` onto `base`.
fn merge_json(base: Config, overlay: serde_json::Value) -> Result<Config> {
    let mut merged = serde_json::to_value(base)?;
    merge_values(&mut merged, overlay);
    Ok(serde_json::from_value(merged)?)
}

fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(addr) = var("NOVUS_ADDR").and_then(|v| v.parse().ok()) {
        config.server.addr = addr;
    }
    if let Some(path) = var("NOVUS_DATABASE_PATH") {
        config.server.database_path = Some(PathBuf::from(path));
    }
    if let Some(secret) = var("NOVUS_JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(ttl) = var("NOVUS_ACCESS_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.auth.access_ttl_secs = ttl;
    }
    if let Some(email) = var("NOVUS_ADMIN_EMAIL") {
        config.auth.admin_email = Some(email);
    }
    if let Some(password) = var("NOVUS_ADMIN_PASSWORD") {
        config.auth.admin_password = Some(password);
    }
    if let Some(n) = var("NOVUS_MAX_WRONG_PER_MINUTE").and_then(|v| v.parse().ok()) {
        config.competition.max_wrong_per_minute = n;
    }
    if let Some(url) = var("NOVUS_BLOB_BASE_URL") {
        config.storage.blob_base_url = url;
    }
}
