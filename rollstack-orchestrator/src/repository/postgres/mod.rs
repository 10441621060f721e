//! PostgreSQL store
//!
//! One `PostgresStore` implements every repository trait over a shared
//! pool. The schema is created by [`crate::db::run_migrations`].

mod deployment;
mod integration;
mod log;
mod stack;

use sqlx::PgPool;

use super::RepositoryError;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a unique-index violation to `Conflict`, leaving other errors as is
fn map_unique_violation(err: sqlx::Error, what: impl FnOnce() -> String) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(what()),
        _ => RepositoryError::Database(err),
    }
}
