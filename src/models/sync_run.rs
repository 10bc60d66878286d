//! # SyncRun Model
//!
//! Per-space, per-cycle record of a reconciliation attempt. The scheduler
//! writes one row per dispatched space per tick; owner dashboards and
//! backoff decisions read them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;

/// How a space's reconciliation cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "sync_run_outcome", rename_all = "snake_case")]
pub enum SyncRunOutcome {
    /// Every enabled source was fetched and diffed
    Success,
    /// At least one source failed (others may still have synced)
    Failed,
    /// The space was already mid-sync and this tick skipped it
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SyncRun {
    pub id: Uuid,
    pub space_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: SyncRunOutcome,
    pub sources_checked: i32,
    pub conflicts_found: i32,
    pub error: Option<String>,
}

/// New sync run for insertion.
#[derive(Debug, Clone)]
pub struct NewSyncRun {
    pub space_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: SyncRunOutcome,
    pub sources_checked: i32,
    pub conflicts_found: i32,
    pub error: Option<String>,
}

const SELECT_COLUMNS: &str =
    "id, space_id, started_at, finished_at, outcome, sources_checked, conflicts_found, error";

impl SyncRun {
    pub async fn create(pool: &PgPool, new_run: &NewSyncRun) -> Result<SyncRun> {
        let sql = format!(
            "INSERT INTO sync_runs \
             (id, space_id, started_at, finished_at, outcome, sources_checked, conflicts_found, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SELECT_COLUMNS}"
        );
        let run = sqlx::query_as::<_, SyncRun>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_run.space_id)
            .bind(new_run.started_at)
            .bind(new_run.finished_at)
            .bind(new_run.outcome)
            .bind(new_run.sources_checked)
            .bind(new_run.conflicts_found)
            .bind(new_run.error.as_deref())
            .fetch_one(pool)
            .await?;
        Ok(run)
    }

    /// Most recent run for a space, if any.
    pub async fn latest_for_space(pool: &PgPool, space_id: Uuid) -> Result<Option<SyncRun>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sync_runs \
             WHERE space_id = $1 ORDER BY started_at DESC LIMIT 1"
        );
        let run = sqlx::query_as::<_, SyncRun>(&sql)
            .bind(space_id)
            .fetch_optional(pool)
            .await?;
        Ok(run)
    }

    /// Recent history for a space's health view, newest first.
    pub async fn recent_for_space(
        pool: &PgPool,
        space_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SyncRun>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sync_runs \
             WHERE space_id = $1 ORDER BY started_at DESC LIMIT $2"
        );
        let runs = sqlx::query_as::<_, SyncRun>(&sql)
            .bind(space_id)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(runs)
    }
}
