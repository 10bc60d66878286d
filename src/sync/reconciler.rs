//! # Calendar Reconciliation Job
//!
//! Per-space sync cycle: fetch every enabled external source, diff the
//! resulting busy periods against the space's active internal bookings, and
//! report conflicts through the notifier. Internal bookings are
//! authoritative; reconciliation never mutates booking state.
//!
//! Failure isolation is per source: one feed failing (fetch, parse, or
//! timeout) still lets the space's other sources sync, and repeated failures
//! auto-disable the source instead of retrying forever.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::notifier::{CalendarConflict, ConflictNotifier};
use crate::calendar::{BusyPeriodFetcher, ExternalBusyPeriod};
use crate::config::SyncConfig;
use crate::constants::events;
use crate::error::Result;
use crate::events::EventPublisher;
use crate::models::{
    Booking, ExternalCalendarSource, NewSyncRun, SyncRun, SyncRunOutcome, TimeRange,
};

/// Runs one space's reconciliation cycle end to end.
#[derive(Clone)]
pub struct SpaceReconciler {
    pool: PgPool,
    config: SyncConfig,
    fetcher: Arc<dyn BusyPeriodFetcher>,
    notifier: Arc<dyn ConflictNotifier>,
    publisher: EventPublisher,
}

impl SpaceReconciler {
    pub fn new(
        pool: PgPool,
        config: SyncConfig,
        fetcher: Arc<dyn BusyPeriodFetcher>,
        notifier: Arc<dyn ConflictNotifier>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            pool,
            config,
            fetcher,
            notifier,
            publisher,
        }
    }

    /// Reconcile one space against all of its enabled sources and persist
    /// the cycle's `SyncRun` record.
    pub async fn reconcile_space(&self, space_id: Uuid) -> Result<SyncRun> {
        let started_at = Utc::now();
        let horizon = TimeRange::new(started_at, started_at + self.config.horizon())?;

        let sources = ExternalCalendarSource::enabled_for_space(&self.pool, space_id).await?;
        let bookings = Booking::active_for_space_since(&self.pool, space_id, started_at).await?;

        let mut conflicts: Vec<CalendarConflict> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        for source in &sources {
            match self.sync_source(source, &horizon, &bookings).await {
                Ok(mut found) => conflicts.append(&mut found),
                Err(err) => {
                    warn!(
                        space_id = %space_id,
                        source_id = %source.id,
                        error = %err,
                        "Calendar source sync failed"
                    );
                    failures.push(format!("{}: {err}", source.id));
                }
            }
        }

        if !conflicts.is_empty() {
            self.notifier
                .notify_booking_conflict(space_id, &conflicts)
                .await;
        }

        let outcome = if failures.is_empty() {
            SyncRunOutcome::Success
        } else {
            SyncRunOutcome::Failed
        };
        let run = SyncRun::create(
            &self.pool,
            &NewSyncRun {
                space_id,
                started_at,
                finished_at: Utc::now(),
                outcome,
                sources_checked: sources.len() as i32,
                conflicts_found: conflicts.len() as i32,
                error: (!failures.is_empty()).then(|| failures.join("; ")),
            },
        )
        .await?;

        info!(
            space_id = %space_id,
            outcome = ?run.outcome,
            sources = run.sources_checked,
            conflicts = run.conflicts_found,
            "Reconciliation cycle finished"
        );
        self.publisher.publish_space(
            match run.outcome {
                SyncRunOutcome::Success => events::CALENDAR_SYNC_COMPLETED,
                _ => events::CALENDAR_SYNC_FAILED,
            },
            space_id,
            serde_json::json!({
                "conflicts_found": run.conflicts_found,
                "sources_checked": run.sources_checked,
            }),
        );

        Ok(run)
    }

    /// Sync one source: fetch, diff, and record the attempt's bookkeeping.
    async fn sync_source(
        &self,
        source: &ExternalCalendarSource,
        horizon: &TimeRange,
        bookings: &[Booking],
    ) -> Result<Vec<CalendarConflict>> {
        let fetched = self
            .fetcher
            .fetch_busy_periods(&source.feed_url, horizon)
            .await;
        let now = Utc::now();
        let mut conn = self.pool.acquire().await?;

        match fetched {
            Ok(periods) => {
                source.record_success(&mut conn, now).await?;
                Ok(diff_busy_periods(source.id, &periods, bookings))
            }
            Err(err) => {
                let updated = source
                    .record_failure(&mut conn, now, self.config.disable_after_failures)
                    .await?;
                if updated.was_just_disabled(source.enabled) {
                    warn!(
                        source_id = %updated.id,
                        feed_url = %updated.feed_url,
                        failures = updated.consecutive_failures,
                        "Calendar source auto-disabled after repeated failures"
                    );
                    self.notifier.notify_source_disabled(&updated).await;
                }
                Err(err)
            }
        }
    }
}

/// Pure diff: every (busy period, internal booking) pair that overlaps is a
/// conflict record.
pub fn diff_busy_periods(
    source_id: Uuid,
    periods: &[ExternalBusyPeriod],
    bookings: &[Booking],
) -> Vec<CalendarConflict> {
    let mut conflicts = Vec::new();
    for period in periods {
        for booking in bookings {
            if booking.time_range().overlaps(&period.range) {
                conflicts.push(CalendarConflict {
                    source_id,
                    external: period.clone(),
                    booking: booking.clone(),
                });
            }
        }
    }
    conflicts
}
