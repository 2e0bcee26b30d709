//! Embedded schema migrations.
//!
//! Diesel's migration harness needs a synchronous connection, so the run is
//! moved onto the blocking thread pool.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::domain::ports::LedgerStoreError;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Apply every pending migration and return the applied versions.
///
/// # Errors
///
/// Returns [`LedgerStoreError::Connection`] when the database is unreachable
/// and [`LedgerStoreError::Query`] when a migration fails.
pub async fn run_pending_migrations(database_url: &str) -> Result<Vec<String>, LedgerStoreError> {
    let url = database_url.to_owned();
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&url)
            .map_err(|err| LedgerStoreError::connection(err.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.iter().map(ToString::to_string).collect::<Vec<_>>())
            .map_err(|err| LedgerStoreError::query(format!("migration failed: {err}")))
    })
    .await
    .map_err(|err| LedgerStoreError::query(format!("migration task failed: {err}")))??;
    info!(count = applied.len(), "applied pending migrations");
    Ok(applied)
}
