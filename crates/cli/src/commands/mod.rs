//! CLI command implementations.

pub mod migrate;
pub mod orders;

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by database-backed commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Order store error: {0}")]
    Repository(#[from] partsbin_storefront::db::RepositoryError),
}

/// Timeout applied to each database call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Storefront database URL, `STOREFRONT_DATABASE_URL` then `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// `OUTBOUND_TIMEOUT_SECS`, falling back to ten seconds.
fn outbound_timeout() -> Duration {
    std::env::var("OUTBOUND_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
}
