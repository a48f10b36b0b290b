//! SQLite database handle for the Novus server.

use std::path::Path;

use sqlx::{Pool, Sqlite};
use tracing::info;

use novus_core::db::{DatabaseError, open_pool, open_pool_in_memory};

use crate::feed::ChangeFeed;

/// Store handle shared by every request handler.
///
/// Mutations of the `teams` table publish a [`crate::feed::TeamChange`] on
/// the attached feed after their transaction commits.
#[derive(Clone)]
pub struct NovusDatabase {
    pool: Pool<Sqlite>,
    feed: ChangeFeed,
}

impl NovusDatabase {
    /// Open or create a database at the given path.
    pub async fn open(
        path: &Path,
        max_connections: u32,
        feed: ChangeFeed,
    ) -> Result<Self, DatabaseError> {
        let pool = open_pool(path, max_connections).await?;
        let db = Self { pool, feed };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = open_pool_in_memory().await?;
        let db = Self {
            pool,
            feed: ChangeFeed::default(),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Novus database migrations complete");
        Ok(())
    }

    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Change feed for the `teams` table.
    pub const fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}
