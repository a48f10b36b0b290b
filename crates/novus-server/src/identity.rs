//! Identity provider used by the admin bootstrap.
//!
//! The store-backed implementation keeps argon2id hashes in `identities`.
//! Admin setup depends only on [`IdentityProvider`], so tests can stand in a
//! provider that races or fails.

use std::future::Future;

use tracing::debug;

use crate::auth::password::hash_password;
use crate::storage::{DatabaseError, Identity, NovusDatabase};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Another identity already uses this email.
    #[error("identity already exists for {0}")]
    AlreadyExists(String),

    /// The provider refused the request (bad input, policy).
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("identity backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for IdentityError {
    fn from(e: DatabaseError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Verify-and-issue capability over user identities.
pub trait IdentityProvider: Send + Sync {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Identity>, IdentityError>> + Send;

    /// Create an identity. Fails with [`IdentityError::AlreadyExists`] when
    /// the email is taken, including when a concurrent call took it first.
    fn create_identity(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, IdentityError>> + Send;
}

impl IdentityProvider for NovusDatabase {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        Ok(self.get_identity_by_email(email).await?)
    }

    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(IdentityError::Rejected("email and password are required".into()));
        }
        let password_hash =
            hash_password(password).map_err(|e| IdentityError::Backend(e.to_string()))?;
        let id = uuid::Uuid::new_v4().to_string();

        match self.insert_identity(&id, email, &password_hash).await {
            Ok(identity) => {
                debug!(identity_id = %identity.id, "Identity created");
                Ok(identity)
            }
            Err(e) if e.is_conflict() => Err(IdentityError::AlreadyExists(email.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;

    #[tokio::test]
    async fn store_provider_creates_and_finds() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        assert!(IdentityProvider::find_by_email(&db, "root@novus.test").await.unwrap().is_none());

        let created = IdentityProvider::create_identity(&db, "root@novus.test", "bootstrap-pw")
            .await
            .unwrap();
        assert!(verify_password("bootstrap-pw", &created.password_hash));

        let found = IdentityProvider::find_by_email(&db, "root@novus.test").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_email_reports_already_exists() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        IdentityProvider::create_identity(&db, "root@novus.test", "pw-one").await.unwrap();

        let err = IdentityProvider::create_identity(&db, "ROOT@novus.test", "pw-two")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn empty_credentials_are_rejected() {
        let db = NovusDatabase::open_in_memory().await.unwrap();
        let err = IdentityProvider::create_identity(&db, "  ", "pw").await.unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }
}
