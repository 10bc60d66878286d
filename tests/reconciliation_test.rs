//! Database-backed reconciliation tests with a scripted feed fetcher:
//! conflict detection and notification, per-source failure isolation, and
//! the consecutive-failure auto-disable. Require `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use common::{seed_booking, test_config, test_pool, tomorrow_at};
use deskhive_core::calendar::{BusyPeriodFetcher, ExternalBusyPeriod};
use deskhive_core::error::{BookingError, Result};
use deskhive_core::events::EventPublisher;
use deskhive_core::models::{
    Booking, ExternalCalendarSource, SyncRunOutcome, TimeRange,
};
use deskhive_core::state_machine::BookingState;
use deskhive_core::sync::{CalendarConflict, ConflictNotifier, SpaceReconciler};

/// Scripted fetcher: per-URL canned busy periods or failures.
#[derive(Default)]
struct ScriptedFetcher {
    responses: HashMap<String, Vec<ExternalBusyPeriod>>,
    failing: Vec<String>,
}

impl ScriptedFetcher {
    fn with_busy(mut self, url: &str, periods: Vec<ExternalBusyPeriod>) -> Self {
        self.responses.insert(url.to_string(), periods);
        self
    }

    fn with_failure(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }
}

#[async_trait]
impl BusyPeriodFetcher for ScriptedFetcher {
    async fn fetch_busy_periods(
        &self,
        feed_url: &str,
        _horizon: &TimeRange,
    ) -> Result<Vec<ExternalBusyPeriod>> {
        if self.failing.iter().any(|url| url == feed_url) {
            return Err(BookingError::ExternalFetch(format!(
                "scripted failure for {feed_url}"
            )));
        }
        Ok(self.responses.get(feed_url).cloned().unwrap_or_default())
    }
}

/// Records every notification for assertion.
#[derive(Default)]
struct RecordingNotifier {
    conflict_calls: Mutex<Vec<(Uuid, usize)>>,
    disabled_sources: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl ConflictNotifier for RecordingNotifier {
    async fn notify_booking_conflict(&self, space_id: Uuid, conflicts: &[CalendarConflict]) {
        self.conflict_calls.lock().push((space_id, conflicts.len()));
    }

    async fn notify_source_disabled(&self, source: &ExternalCalendarSource) {
        self.disabled_sources.lock().push(source.id);
    }
}

fn reconciler(
    pool: sqlx::PgPool,
    fetcher: ScriptedFetcher,
    notifier: Arc<RecordingNotifier>,
) -> SpaceReconciler {
    SpaceReconciler::new(
        pool,
        test_config().sync,
        Arc::new(fetcher),
        notifier,
        EventPublisher::default(),
    )
}

fn busy(range: TimeRange) -> ExternalBusyPeriod {
    ExternalBusyPeriod {
        uid: Some("busy@external.example.com".to_string()),
        summary: Some("External hold".to_string()),
        range,
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn conflict_is_recorded_and_notified_once_without_touching_the_booking() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();

    // Internal Confirmed [14:30, 15:30); external busy [14:00, 15:00)
    let booking = seed_booking(
        &pool,
        space,
        Uuid::new_v4(),
        tomorrow_at(14) + Duration::minutes(30),
        tomorrow_at(15) + Duration::minutes(30),
        BookingState::Confirmed,
    )
    .await;
    let source = ExternalCalendarSource::create(&pool, space, "https://feeds.example.com/a.ics")
        .await
        .unwrap();

    let external = busy(TimeRange::new(tomorrow_at(14), tomorrow_at(15)).unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let reconciler = reconciler(
        pool.clone(),
        ScriptedFetcher::default().with_busy(&source.feed_url, vec![external]),
        Arc::clone(&notifier),
    );

    let run = reconciler.reconcile_space(space).await.unwrap();
    assert_eq!(run.outcome, SyncRunOutcome::Success);
    assert_eq!(run.conflicts_found, 1);

    // Notified exactly once, with one conflict
    assert_eq!(notifier.conflict_calls.lock().as_slice(), &[(space, 1)]);

    // The internal booking is authoritative and untouched
    let after = Booking::find_by_id(&pool, booking.id).await.unwrap().unwrap();
    assert_eq!(after.status, BookingState::Confirmed);

    // Source bookkeeping updated
    let source = ExternalCalendarSource::find_by_id(&pool, source.id)
        .await
        .unwrap()
        .unwrap();
    assert!(source.last_synced_at.is_some());
    assert_eq!(source.consecutive_failures, 0);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn one_failing_source_does_not_abort_the_spaces_other_sources() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();

    let good = ExternalCalendarSource::create(&pool, space, "https://feeds.example.com/good.ics")
        .await
        .unwrap();
    let bad = ExternalCalendarSource::create(&pool, space, "https://feeds.example.com/bad.ics")
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let reconciler = reconciler(
        pool.clone(),
        ScriptedFetcher::default()
            .with_busy(&good.feed_url, vec![])
            .with_failure(&bad.feed_url),
        notifier,
    );

    let run = reconciler.reconcile_space(space).await.unwrap();
    assert_eq!(run.outcome, SyncRunOutcome::Failed);
    assert_eq!(run.sources_checked, 2);

    // The good source still recorded its success
    let good = ExternalCalendarSource::find_by_id(&pool, good.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(good.consecutive_failures, 0);
    assert!(good.last_synced_at.is_some());

    // The bad source counted its failure but stays enabled below threshold
    let bad = ExternalCalendarSource::find_by_id(&pool, bad.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bad.consecutive_failures, 1);
    assert!(bad.enabled);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn sibling_spaces_sync_even_when_one_space_fails() {
    let pool = test_pool().await;
    let spaces: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    let mut fetcher = ScriptedFetcher::default();
    for (index, space) in spaces.iter().enumerate() {
        let url = format!("https://feeds.example.com/space-{index}.ics");
        ExternalCalendarSource::create(&pool, *space, &url)
            .await
            .unwrap();
        fetcher = if index == 1 {
            fetcher.with_failure(&url)
        } else {
            fetcher.with_busy(&url, vec![])
        };
    }

    let notifier = Arc::new(RecordingNotifier::default());
    let reconciler = reconciler(pool.clone(), fetcher, notifier);

    let mut outcomes = Vec::new();
    for space in &spaces {
        outcomes.push(reconciler.reconcile_space(*space).await.unwrap().outcome);
    }
    assert_eq!(
        outcomes,
        vec![
            SyncRunOutcome::Success,
            SyncRunOutcome::Failed,
            SyncRunOutcome::Success
        ]
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn source_is_disabled_and_reported_after_consecutive_failures() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let source =
        ExternalCalendarSource::create(&pool, space, "https://feeds.example.com/flaky.ics")
            .await
            .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let reconciler = reconciler(
        pool.clone(),
        ScriptedFetcher::default().with_failure(&source.feed_url),
        Arc::clone(&notifier),
    );

    // Default threshold is 5 consecutive failures
    for _ in 0..5 {
        reconciler.reconcile_space(space).await.unwrap();
    }

    let source = ExternalCalendarSource::find_by_id(&pool, source.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!source.enabled, "source must be auto-disabled");
    assert_eq!(source.consecutive_failures, 5);
    assert_eq!(notifier.disabled_sources.lock().as_slice(), &[source.id]);

    // Disabled sources drop out of the next cycle
    let run = reconciler.reconcile_space(space).await.unwrap();
    assert_eq!(run.sources_checked, 0);
    assert_eq!(run.outcome, SyncRunOutcome::Success);
}
