//! Admin bootstrap.
//!
//! A single distinguished credential pair, supplied through configuration,
//! may elevate its own identity to admin. Repeating the call is harmless: it
//! converges on exactly one identity and one `admin_users` row for that
//! email, even when many calls run at once.

use subtle::ConstantTimeEq;
use tracing::{debug, info, instrument, warn};

use novus_core::config::AuthConfig;

use crate::identity::{IdentityError, IdentityProvider};
use crate::storage::{Identity, NovusDatabase};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid admin credentials")]
    Unauthorized,

    /// Creation raced with another request and the follow-up lookup still
    /// found nothing.
    #[error("identity for {0} could not be created or found")]
    ProvisioningConflict(String),

    #[error("{0}")]
    Provisioning(String),

    #[error("unexpected setup failure: {0}")]
    Unexpected(String),
}

/// The bootstrap credential pair.
#[derive(Clone)]
pub struct AdminCredential {
    email: String,
    password: String,
}

impl AdminCredential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// The configured pair, or `None` when either half is missing or empty.
    pub fn from_config(auth: &AuthConfig) -> Option<Self> {
        if !auth.has_admin_credential() {
            return None;
        }
        Some(Self::new(
            auth.admin_email.clone().unwrap_or_default(),
            auth.admin_password.clone().unwrap_or_default(),
        ))
    }

    /// Exact email match; password compared in constant time.
    fn matches(&self, email: &str, password: &str) -> bool {
        let email_ok = self.email == email;
        let password_ok: bool = self.password.as_bytes().ct_eq(password.as_bytes()).into();
        email_ok & password_ok
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Provisions the bootstrap admin through an [`IdentityProvider`].
pub struct AdminSetupService<P> {
    provider: P,
    db: NovusDatabase,
    credential: Option<AdminCredential>,
}

impl<P: IdentityProvider> AdminSetupService<P> {
    pub const fn new(provider: P, db: NovusDatabase, credential: Option<AdminCredential>) -> Self {
        Self {
            provider,
            db,
            credential,
        }
    }

    /// Check the bootstrap credential, ensure its identity exists and holds
    /// the admin grant. Returns the identity id.
    #[instrument(skip_all, fields(op = "setup_admin"))]
    pub async fn setup_admin(&self, email: &str, password: &str) -> Result<String, SetupError> {
        let Some(credential) = &self.credential else {
            warn!("Admin setup attempted but no bootstrap credential is configured");
            return Err(SetupError::Unauthorized);
        };
        if !credential.matches(email, password) {
            warn!("Admin setup rejected: credential mismatch");
            return Err(SetupError::Unauthorized);
        }

        let identity = self.ensure_identity(email, password).await?;

        let newly_granted = self
            .db
            .grant_admin(&identity.id)
            .await
            .map_err(|e| SetupError::Provisioning(e.to_string()))?;

        info!(user_id = %identity.id, newly_granted, "Admin setup complete");
        Ok(identity.id)
    }

    async fn ensure_identity(&self, email: &str, password: &str) -> Result<Identity, SetupError> {
        if let Some(existing) = self.lookup(email).await? {
            return Ok(existing);
        }

        match self.provider.create_identity(email, password).await {
            Ok(created) => {
                info!(user_id = %created.id, "Admin identity created");
                Ok(created)
            }
            Err(IdentityError::AlreadyExists(_)) => {
                debug!("Admin identity created concurrently, looking it up again");
                self.lookup(email)
                    .await?
                    .ok_or_else(|| SetupError::ProvisioningConflict(email.to_string()))
            }
            Err(IdentityError::Rejected(msg) | IdentityError::Backend(msg)) => {
                warn!(error = %msg, "Admin identity provisioning failed");
                Err(SetupError::Provisioning(msg))
            }
        }
    }

    async fn lookup(&self, email: &str) -> Result<Option<Identity>, SetupError> {
        self.provider
            .find_by_email(email)
            .await
            .map_err(|e| SetupError::Unexpected(e.to_string()))
    }
}
