//! # DeskhiveCore Bootstrap
//!
//! Wires the component graph from a loaded configuration: connection pool,
//! event channel, lifecycle service, exporter, reconciler, and scheduler.
//! Host applications construct one of these at startup and hand out the
//! service handles.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::calendar::{CalendarExporter, IcsFeedClient};
use crate::config::ConfigManager;
use crate::error::Result;
use crate::events::EventPublisher;
use crate::services::{Authorizer, BookingLifecycleService};
use crate::sync::{EventConflictNotifier, SpaceReconciler, SyncScheduler};

/// Fully wired booking core.
pub struct DeskhiveCore {
    pub config: Arc<ConfigManager>,
    pub pool: PgPool,
    pub publisher: EventPublisher,
    pub lifecycle: Arc<BookingLifecycleService>,
    pub exporter: CalendarExporter,
    pub scheduler: SyncScheduler,
}

impl DeskhiveCore {
    /// Connect to the database and build the component graph. The scheduler
    /// is constructed but not started; call `scheduler.start()` to begin
    /// automatic syncing.
    pub async fn bootstrap(
        config: Arc<ConfigManager>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self> {
        let db = &config.config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db.pool)
            .acquire_timeout(Duration::from_secs(db.checkout_timeout_seconds))
            .connect(&db.database_url())
            .await?;

        Self::from_pool(config, pool, authorizer)
    }

    /// Build the component graph over an existing pool (tests, hosts that
    /// manage their own connections).
    pub fn from_pool(
        config: Arc<ConfigManager>,
        pool: PgPool,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self> {
        let settings = config.config();
        let publisher = EventPublisher::new(settings.events.channel_capacity);

        let lifecycle = Arc::new(BookingLifecycleService::new(
            pool.clone(),
            settings.policy.clone(),
            authorizer,
            publisher.clone(),
        ));
        let exporter = CalendarExporter::new(pool.clone(), settings.policy.clone());

        let fetcher = Arc::new(IcsFeedClient::new(&settings.sync)?);
        let notifier = Arc::new(EventConflictNotifier::new(publisher.clone()));
        let reconciler = Arc::new(SpaceReconciler::new(
            pool.clone(),
            settings.sync.clone(),
            fetcher,
            notifier,
            publisher.clone(),
        ));
        let scheduler = SyncScheduler::new(
            pool.clone(),
            settings.sync.clone(),
            reconciler,
            Arc::clone(&lifecycle),
        );

        info!(
            environment = config.environment(),
            "DeskhiveCore components wired"
        );
        Ok(Self {
            config,
            pool,
            publisher,
            lifecycle,
            exporter,
            scheduler,
        })
    }
}
