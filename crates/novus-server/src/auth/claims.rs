//! JWT claims carried by Novus access tokens.

use serde::{Deserialize, Serialize};

/// Who a token was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Team,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub jti: String,
    /// Team store id for team tokens, identity id for admin tokens.
    pub sub: String,
    /// Team name or admin email, for display.
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_team(&self) -> bool {
        self.role == Role::Team
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
