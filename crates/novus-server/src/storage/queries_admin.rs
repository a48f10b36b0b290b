//! Identity and admin grant queries.

use novus_core::db::{DatabaseError, unix_timestamp};

use super::db::NovusDatabase;
use super::models::{AdminUser, Identity};

impl NovusDatabase {
    /// Create an identity. A duplicate email (case-insensitive) fails with
    /// [`DatabaseError::Conflict`].
    pub async fn insert_identity(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Identity, DatabaseError> {
        let identity = sqlx::query_as::<_, Identity>(
            "INSERT INTO identities (id, email, password_hash, created_at) VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(unix_timestamp())
        .fetch_one(self.pool())
        .await?;
        Ok(identity)
    }

    pub async fn get_identity(&self, id: &str) -> Result<Identity, DatabaseError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Identity {id}")))
    }

    pub async fn get_identity_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(identity)
    }

    pub async fn is_admin(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM admin_users WHERE user_id = ?)")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        Ok(exists)
    }

    /// Record an admin grant. Returns `false` if the identity was already an admin.
    pub async fn grant_admin(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO admin_users (id, user_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_admins(&self) -> Result<Vec<AdminUser>, DatabaseError> {
        let admins = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users ORDER BY created_at ASC")
            .fetch_all(self.pool())
            .await?;
        Ok(admins)
    }
}
