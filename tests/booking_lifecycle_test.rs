//! Database-backed lifecycle tests: the no-double-booking invariant under
//! real transactions, role gating, and the §state-machine scenarios end to
//! end. Require `DATABASE_URL`; run with `cargo test -- --ignored`.

mod common;

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use common::{lifecycle_with_staff, seed_booking, test_pool, tomorrow_at};
use deskhive_core::error::BookingError;
use deskhive_core::services::CreateBookingRequest;
use deskhive_core::state_machine::BookingState;

fn request(
    space_id: Uuid,
    requester: Uuid,
    start_hour: u32,
    end_hour: u32,
) -> CreateBookingRequest {
    CreateBookingRequest {
        space_id,
        requester_user_id: requester,
        start_at: tomorrow_at(start_hour),
        end_at: tomorrow_at(end_hour),
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn user_create_lands_pending_and_staff_create_lands_confirmed() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let service = lifecycle_with_staff(pool, space, staff);

    let pending = service
        .create_booking(request(space, guest, 9, 10))
        .await
        .unwrap();
    assert_eq!(pending.status, BookingState::Pending);
    assert!(pending.booking_code.starts_with("BK-"));

    let confirmed = service
        .create_booking(request(space, staff, 11, 12))
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingState::Confirmed);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn overlapping_create_reports_the_blocking_booking() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let service = lifecycle_with_staff(pool, space, staff);

    // Confirmed [10:00, 11:00)
    let existing = service
        .create_booking(request(space, staff, 10, 11))
        .await
        .unwrap();

    // [10:30, 11:30) must be rejected, naming the blocker
    let overlapping = CreateBookingRequest {
        space_id: space,
        requester_user_id: Uuid::new_v4(),
        start_at: tomorrow_at(10) + Duration::minutes(30),
        end_at: tomorrow_at(11) + Duration::minutes(30),
    };
    match service.create_booking(overlapping).await {
        Err(BookingError::Conflict { booking_id, .. }) => {
            assert_eq!(booking_id, existing.id);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }

    // Touching boundary [11:00, 12:00) succeeds
    let touching = service
        .create_booking(request(space, Uuid::new_v4(), 11, 12))
        .await
        .unwrap();
    assert_eq!(touching.status, BookingState::Pending);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn rejected_booking_frees_the_window() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let service = lifecycle_with_staff(pool, space, staff);

    let first = service
        .create_booking(request(space, guest, 14, 15))
        .await
        .unwrap();
    service.reject_booking(first.id, staff).await.unwrap();

    // The identical window is free again
    let second = service
        .create_booking(request(space, Uuid::new_v4(), 14, 15))
        .await
        .unwrap();
    assert_eq!(second.status, BookingState::Pending);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn at_most_one_of_n_concurrent_overlapping_creates_succeeds() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let service = Arc::new(lifecycle_with_staff(pool, space, staff));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .create_booking(CreateBookingRequest {
                    space_id: space,
                    requester_user_id: Uuid::new_v4(),
                    start_at: tomorrow_at(9),
                    end_at: tomorrow_at(10),
                })
                .await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(BookingError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(successes, 1, "exactly one concurrent create may win");
    assert_eq!(conflicts, 7);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn requester_may_cancel_but_not_confirm() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let service = lifecycle_with_staff(pool, space, staff);

    let booking = service
        .create_booking(request(space, guest, 16, 17))
        .await
        .unwrap();

    match service.confirm_booking(booking.id, guest).await {
        Err(BookingError::Authorization(_)) => {}
        other => panic!("expected Authorization error, got {other:?}"),
    }

    let cancelled = service
        .cancel_booking(booking.id, guest, Some("plans changed".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingState::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("plans changed")
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn terminal_booking_accepts_no_further_transitions() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let service = lifecycle_with_staff(pool, space, staff);

    let booking = service
        .create_booking(request(space, guest, 9, 10))
        .await
        .unwrap();
    let cancelled = service
        .cancel_booking(booking.id, guest, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingState::Cancelled);

    match service.cancel_booking(booking.id, guest, None).await {
        Err(BookingError::InvalidTransition { from, .. }) => {
            assert_eq!(from, "cancelled");
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn no_show_sweep_marks_overdue_confirmed_bookings() {
    let pool = test_pool().await;
    let space = Uuid::new_v4();
    let staff = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let service = lifecycle_with_staff(pool.clone(), space, staff);

    // Seed a confirmed booking that ended an hour ago and was never
    // checked in
    let now = chrono::Utc::now();
    let overdue = seed_booking(
        &pool,
        space,
        guest,
        now - Duration::hours(2),
        now - Duration::hours(1),
        BookingState::Confirmed,
    )
    .await;

    let marked = service.mark_overdue_no_shows().await.unwrap();
    assert!(marked.iter().any(|b| b.id == overdue.id));
    assert!(marked
        .iter()
        .all(|b| b.status == BookingState::NoShow));
}
