//! # ExternalCalendarSource Model
//!
//! One externally hosted calendar feed registered against a space. The
//! reconciliation job is the only writer of the sync bookkeeping columns,
//! and always for its own space, so cross-space contention does not occur.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnection;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;

/// Outcome of the most recent sync attempt for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "sync_status", rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
}

/// A single external feed registered against a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExternalCalendarSource {
    pub id: Uuid,
    pub space_id: Uuid,
    pub feed_url: String,
    pub enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<SyncStatus>,
    pub consecutive_failures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str = "id, space_id, feed_url, enabled, last_synced_at, \
     last_sync_status, consecutive_failures, created_at, updated_at";

impl ExternalCalendarSource {
    pub async fn create(pool: &PgPool, space_id: Uuid, feed_url: &str) -> Result<Self> {
        let sql = format!(
            "INSERT INTO external_calendar_sources \
             (id, space_id, feed_url, enabled, consecutive_failures, created_at, updated_at) \
             VALUES ($1, $2, $3, true, 0, NOW(), NOW()) \
             RETURNING {SELECT_COLUMNS}"
        );
        let source = sqlx::query_as::<_, Self>(&sql)
            .bind(Uuid::new_v4())
            .bind(space_id)
            .bind(feed_url)
            .fetch_one(pool)
            .await?;
        Ok(source)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM external_calendar_sources WHERE id = $1");
        let source = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(source)
    }

    /// Enabled sources for one space, in registration order.
    pub async fn enabled_for_space(pool: &PgPool, space_id: Uuid) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM external_calendar_sources \
             WHERE space_id = $1 AND enabled = true \
             ORDER BY created_at"
        );
        let sources = sqlx::query_as::<_, Self>(&sql)
            .bind(space_id)
            .fetch_all(pool)
            .await?;
        Ok(sources)
    }

    /// Distinct ids of spaces with at least one enabled source: the
    /// scheduler's work list.
    pub async fn spaces_with_enabled_sources(pool: &PgPool) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT space_id FROM external_calendar_sources \
             WHERE enabled = true ORDER BY space_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Record a successful sync: stamp the time, reset the failure streak.
    pub async fn record_success(&self, conn: &mut PgConnection, at: DateTime<Utc>) -> Result<Self> {
        let sql = format!(
            "UPDATE external_calendar_sources SET \
               last_synced_at = $2, last_sync_status = $3, \
               consecutive_failures = 0, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SELECT_COLUMNS}"
        );
        let source = sqlx::query_as::<_, Self>(&sql)
            .bind(self.id)
            .bind(at)
            .bind(SyncStatus::Success)
            .fetch_one(conn)
            .await?;
        Ok(source)
    }

    /// Record a failed sync attempt, bumping the failure streak. When the
    /// streak reaches `disable_after`, the source is switched off in the
    /// same statement so there is no window where it keeps being retried.
    pub async fn record_failure(
        &self,
        conn: &mut PgConnection,
        at: DateTime<Utc>,
        disable_after: i32,
    ) -> Result<Self> {
        let sql = format!(
            "UPDATE external_calendar_sources SET \
               last_synced_at = $2, last_sync_status = $3, \
               consecutive_failures = consecutive_failures + 1, \
               enabled = enabled AND (consecutive_failures + 1) < $4, \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SELECT_COLUMNS}"
        );
        let source = sqlx::query_as::<_, Self>(&sql)
            .bind(self.id)
            .bind(at)
            .bind(SyncStatus::Failed)
            .bind(disable_after)
            .fetch_one(conn)
            .await?;
        Ok(source)
    }

    /// Whether the last recorded attempt disabled this source.
    pub fn was_just_disabled(&self, previous_enabled: bool) -> bool {
        previous_enabled && !self.enabled
    }
}
