//! Shared helpers for integration tests.
//!
//! Database-backed suites connect via `DATABASE_URL` and are marked
//! `#[ignore]` so the default test run stays hermetic; run them with
//! `cargo test -- --ignored` against a disposable PostgreSQL.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use deskhive_core::config::{ConfigManager, DeskhiveConfig};
use deskhive_core::database::DatabaseMigrations;
use deskhive_core::events::EventPublisher;
use deskhive_core::models::Booking;
use deskhive_core::services::{
    Authorizer, BookingLifecycleService, SpaceRole, StaticAuthorizer,
};
use deskhive_core::state_machine::BookingState;

/// Connect to the test database and ensure the schema is current.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must point at a disposable test database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    DatabaseMigrations::run_all(&pool)
        .await
        .expect("failed to run migrations");
    pool
}

/// Default test configuration with a generous creation grace so fixtures
/// may book near "now".
pub fn test_config() -> DeskhiveConfig {
    let mut config = DeskhiveConfig::default();
    config.policy.creation_grace_minutes = 60;
    config
}

pub fn config_manager() -> Arc<ConfigManager> {
    ConfigManager::from_config(test_config()).expect("test config must validate")
}

/// A lifecycle service where `staff` holds the staff role on `space_id`.
pub fn lifecycle_with_staff(
    pool: PgPool,
    space_id: Uuid,
    staff: Uuid,
) -> BookingLifecycleService {
    let authorizer: Arc<dyn Authorizer> =
        Arc::new(StaticAuthorizer::new().grant(staff, space_id, SpaceRole::Staff));
    BookingLifecycleService::new(
        pool,
        test_config().policy,
        authorizer,
        EventPublisher::default(),
    )
}

/// Tomorrow at the given hour, far enough out to clear validation.
pub fn tomorrow_at(hour: u32) -> DateTime<Utc> {
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&tomorrow.and_hms_opt(hour, 0, 0).unwrap())
}

/// Directly seed a booking row in the given state, bypassing the service,
/// for fixtures that need historical or otherwise unreachable data.
pub async fn seed_booking(
    pool: &PgPool,
    space_id: Uuid,
    requester: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    status: BookingState,
) -> Booking {
    sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings \
         (id, space_id, requester_user_id, start_at, end_at, status, booking_code, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) \
         RETURNING id, space_id, requester_user_id, start_at, end_at, status, booking_code, \
                   cancellation_reason, check_in_at, check_out_at, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(space_id)
    .bind(requester)
    .bind(start_at)
    .bind(end_at)
    .bind(status)
    .bind(deskhive_core::models::booking::generate_booking_code())
    .fetch_one(pool)
    .await
    .expect("failed to seed booking")
}
