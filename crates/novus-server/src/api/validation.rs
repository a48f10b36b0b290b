//! Input validation for registration and team member forms.

use std::sync::LazyLock;

use regex::Regex;

use super::ApiError;
use crate::auth::password::MIN_PASSWORD_LEN;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex is valid"));

pub const MAX_TEAM_SIZE: i64 = 4;
const MAX_EMAIL_LEN: usize = 255;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Trimmed team name, 3 to 30 characters.
pub fn team_name(raw: &str) -> Result<&str, ApiError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(3..=30).contains(&len) {
        return Err(ApiError::BadRequest(
            "Team name must be between 3 and 30 characters".into(),
        ));
    }
    Ok(name)
}

/// Trimmed, non-empty value.
pub fn required<'a>(raw: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

pub fn email(raw: &str) -> Result<&str, ApiError> {
    let value = raw.trim();
    if !is_valid_email(value) {
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }
    Ok(value)
}

pub fn team_size(size: i64) -> Result<i64, ApiError> {
    if !(2..=MAX_TEAM_SIZE).contains(&size) {
        return Err(ApiError::BadRequest("Team size must be between 2 and 4".into()));
    }
    Ok(size)
}

pub fn password(raw: &str) -> Result<&str, ApiError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(raw)
}

/// Trimmed member name (2 to 100 characters), or `None` for a blank entry.
pub fn member_name(raw: &str) -> Result<Option<&str>, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if !(2..=100).contains(&name.chars().count()) {
        return Err(ApiError::BadRequest(
            "Member name must be between 2 and 100 characters".into(),
        ));
    }
    Ok(Some(name))
}

/// Optional member email: blank means none.
pub fn member_email(raw: Option<&str>) -> Result<Option<&str>, ApiError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.len() > MAX_EMAIL_LEN || !is_valid_email(value) {
        return Err(ApiError::BadRequest("Invalid member email address".into()));
    }
    Ok(Some(value))
}
