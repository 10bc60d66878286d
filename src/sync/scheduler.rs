//! # Sync Scheduler/Dispatcher
//!
//! Owns the reconciliation timer, the bounded worker pool, and per-space
//! failure isolation. Every tick lists the spaces with enabled sources and
//! dispatches each as its own task: a panic, error, or timeout in one
//! space's job becomes that space's `SyncRun` outcome and never cancels
//! sibling jobs or the scheduler loop.
//!
//! A space still mid-sync when its id comes up again is skipped, not queued
//! twice: the in-flight set is checked before any work starts.

use chrono::Utc;
use dashmap::DashSet;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::reconciler::SpaceReconciler;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{ExternalCalendarSource, NewSyncRun, SyncRun, SyncRunOutcome};
use crate::services::BookingLifecycleService;

/// Spaces currently mid-sync. Insertion doubles as the claim; the guard
/// removes the id when the job finishes however it finishes.
#[derive(Debug, Default)]
pub(crate) struct InFlightSpaces {
    syncing: DashSet<Uuid>,
}

impl InFlightSpaces {
    fn try_begin(set: &Arc<Self>, space_id: Uuid) -> Option<InFlightGuard> {
        if set.syncing.insert(space_id) {
            Some(InFlightGuard {
                set: Arc::clone(set),
                space_id,
            })
        } else {
            None
        }
    }

    fn contains(&self, space_id: Uuid) -> bool {
        self.syncing.contains(&space_id)
    }
}

pub(crate) struct InFlightGuard {
    set: Arc<InFlightSpaces>,
    space_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.syncing.remove(&self.space_id);
    }
}

/// Fixed-interval dispatcher for the reconciliation job. Cheap to clone:
/// clones share the same in-flight set, worker permits, and shutdown signal.
#[derive(Clone)]
pub struct SyncScheduler {
    pool: PgPool,
    config: SyncConfig,
    reconciler: Arc<SpaceReconciler>,
    lifecycle: Arc<BookingLifecycleService>,
    in_flight: Arc<InFlightSpaces>,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl SyncScheduler {
    pub fn new(
        pool: PgPool,
        config: SyncConfig,
        reconciler: Arc<SpaceReconciler>,
        lifecycle: Arc<BookingLifecycleService>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.worker_concurrency));
        let (shutdown, _) = watch::channel(false);
        Self {
            pool,
            config,
            reconciler,
            lifecycle,
            in_flight: Arc::new(InFlightSpaces::default()),
            permits,
            shutdown,
        }
    }

    /// Start the automatic timer. Returns the loop's join handle; call
    /// [`Self::stop`] for a clean shutdown.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            info!(
                interval_seconds = scheduler.config.interval_seconds,
                concurrency = scheduler.config.worker_concurrency,
                "Sync scheduler started"
            );
            let mut ticker = tokio::time::interval(scheduler.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = scheduler.run_tick().await {
                            error!(error = %err, "Sync tick failed to dispatch");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Sync scheduler stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the timer loop to exit after the current tick.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// One full cycle: reconcile every space with enabled sources, then run
    /// the no-show sweep.
    async fn run_tick(&self) -> Result<()> {
        let runs = self.sync_all_spaces().await?;
        let failed = runs
            .iter()
            .filter(|run| run.outcome == SyncRunOutcome::Failed)
            .count();
        info!(spaces = runs.len(), failed, "Sync tick complete");

        match self.lifecycle.mark_overdue_no_shows().await {
            Ok(marked) if !marked.is_empty() => {
                info!(count = marked.len(), "No-show sweep marked bookings");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "No-show sweep failed"),
        }
        Ok(())
    }

    /// Operational trigger: reconcile all spaces with at least one enabled
    /// source, in parallel under the worker-pool bound, and return their
    /// run records.
    pub async fn sync_all_spaces(&self) -> Result<Vec<SyncRun>> {
        let space_ids = ExternalCalendarSource::spaces_with_enabled_sources(&self.pool).await?;

        let handles: Vec<_> = space_ids
            .into_iter()
            .map(|space_id| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.dispatch_space(space_id).await })
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(Some(run)) => runs.push(run),
                Ok(None) => {}
                // A panicking job is isolated here; its in-flight guard has
                // already been dropped with the task
                Err(join_err) => error!(error = %join_err, "Space sync task panicked"),
            }
        }
        Ok(runs)
    }

    /// Administrative trigger for one space.
    pub async fn sync_space(&self, space_id: Uuid) -> Result<Option<SyncRun>> {
        Ok(self.dispatch_space(space_id).await)
    }

    /// Run one space's job under the concurrency bound with in-flight and
    /// timeout protection. Returns the persisted run record, or `None` when
    /// even failure bookkeeping could not be written.
    async fn dispatch_space(&self, space_id: Uuid) -> Option<SyncRun> {
        let started_at = Utc::now();

        let Some(_guard) = InFlightSpaces::try_begin(&self.in_flight, space_id) else {
            info!(space_id = %space_id, "Space already mid-sync, skipping");
            return self
                .record_outcome(space_id, started_at, SyncRunOutcome::Skipped, None)
                .await;
        };

        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return None, // semaphore closed: shutting down
        };

        let outcome = tokio::time::timeout(
            self.config.space_timeout(),
            self.reconciler.reconcile_space(space_id),
        )
        .await;

        match outcome {
            Ok(Ok(run)) => Some(run),
            Ok(Err(err)) => {
                warn!(space_id = %space_id, error = %err, "Space reconciliation failed");
                self.record_outcome(
                    space_id,
                    started_at,
                    SyncRunOutcome::Failed,
                    Some(err.to_string()),
                )
                .await
            }
            Err(_elapsed) => {
                warn!(
                    space_id = %space_id,
                    timeout_seconds = self.config.space_timeout_seconds,
                    "Space reconciliation timed out"
                );
                self.record_outcome(
                    space_id,
                    started_at,
                    SyncRunOutcome::Failed,
                    Some(format!(
                        "timed out after {}s",
                        self.config.space_timeout_seconds
                    )),
                )
                .await
            }
        }
    }

    async fn record_outcome(
        &self,
        space_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        outcome: SyncRunOutcome,
        error_message: Option<String>,
    ) -> Option<SyncRun> {
        let new_run = NewSyncRun {
            space_id,
            started_at,
            finished_at: Utc::now(),
            outcome,
            sources_checked: 0,
            conflicts_found: 0,
            error: error_message,
        };
        match SyncRun::create(&self.pool, &new_run).await {
            Ok(run) => Some(run),
            Err(err) => {
                error!(space_id = %space_id, error = %err, "Failed to record sync run");
                None
            }
        }
    }
}
