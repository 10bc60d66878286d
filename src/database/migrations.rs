//! # Database Migration System
//!
//! Applies the embedded schema migrations in order, tracked in a
//! `deskhive_schema_migrations` table. A PostgreSQL advisory lock serializes
//! concurrent runners (parallel test workers, multiple app instances racing
//! at deploy time), so applying is idempotent and race-free.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::Result;

/// Embedded migrations, in application order. Versions follow the
/// `YYYYMMDDHHMMSS_description` convention of the files in `migrations/`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20250101000001_create_bookings",
        include_str!("../../migrations/20250101000001_create_bookings.sql"),
    ),
    (
        "20250101000002_create_external_calendar_sources",
        include_str!("../../migrations/20250101000002_create_external_calendar_sources.sql"),
    ),
    (
        "20250101000003_create_sync_runs",
        include_str!("../../migrations/20250101000003_create_sync_runs.sql"),
    ),
];

/// Advisory lock key for migration runs (hash of "deskhive_schema_init").
const MIGRATION_LOCK_KEY: i64 = 7_216_339_401_558_201;

/// Manages database schema migrations with concurrency safety.
pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply all outstanding migrations.
    pub async fn run_all(pool: &PgPool) -> Result<()> {
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(pool)
            .await?;

        let result = Self::run_outstanding(pool).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(pool)
            .await?;

        result
    }

    async fn run_outstanding(pool: &PgPool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS deskhive_schema_migrations (
                 version TEXT PRIMARY KEY,
                 applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             )",
        )
        .execute(pool)
        .await?;

        let applied: Vec<(String,)> =
            sqlx::query_as("SELECT version FROM deskhive_schema_migrations")
                .fetch_all(pool)
                .await?;
        let applied: std::collections::HashSet<String> =
            applied.into_iter().map(|(v,)| v).collect();

        for (version, sql) in MIGRATIONS {
            if applied.contains(*version) {
                debug!(version, "Migration already applied");
                continue;
            }

            let mut tx = pool.begin().await?;
            sqlx::raw_sql(sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO deskhive_schema_migrations (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(version, "Migration applied");
        }

        Ok(())
    }
}
