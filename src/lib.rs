#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # DeskHive Core
//!
//! The booking availability and calendar reconciliation core of the DeskHive
//! coworking-space marketplace. The surrounding application (web handlers,
//! identity, catalog, notifications delivery) consumes this crate through
//! its service interfaces; everything correctness-critical about bookings
//! lives here.
//!
//! ## What it guarantees
//!
//! - **No double booking**: a space never holds two overlapping reservations
//!   in calendar-blocking states. The availability check runs inside the
//!   same transaction as the insert, under a per-space advisory lock, with a
//!   database exclusion constraint as defense in depth.
//! - **A closed lifecycle**: the seven booking states transition only along
//!   the edges of an exhaustively matched table, with role gating and
//!   policy guards; undefined edges fail loudly with a typed error.
//! - **Reconciliation without interference**: external calendar feeds are
//!   periodically fetched, diffed against internal bookings, and conflicts
//!   reported. The internal booking stays authoritative, and one space's
//!   (or source's) failure never disturbs its siblings.
//!
//! ## Module Organization
//!
//! - [`models`] - Booking aggregate, calendar sources, sync runs, TimeRange
//! - [`state_machine`] - Booking lifecycle states, events, guards, table
//! - [`availability`] - Overlap checking against active bookings
//! - [`services`] - Lifecycle orchestration and the authorization seam
//! - [`calendar`] - iCalendar feed import and export adapters
//! - [`sync`] - Reconciliation job, notifier seam, scheduler/dispatcher
//! - [`config`] - Validated configuration (policy, sync, database)
//! - [`database`] - Schema migrations with concurrency control
//! - [`events`] - Broadcast channel for lifecycle and sync events
//! - [`error`] - Structured error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use deskhive_core::config::ConfigManager;
//! use deskhive_core::core::DeskhiveCore;
//! use deskhive_core::services::StaticAuthorizer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let authorizer = Arc::new(StaticAuthorizer::new());
//! let core = DeskhiveCore::bootstrap(config, authorizer).await?;
//!
//! // Request handling goes through the lifecycle service
//! // core.lifecycle.create_booking(...).await?;
//!
//! // Background reconciliation runs on its own worker pool
//! let handle = core.scheduler.start();
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod calendar;
pub mod config;
pub mod constants;
pub mod core;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;
pub mod state_machine;
pub mod sync;
pub mod validation;

pub use availability::AvailabilityChecker;
pub use config::{ConfigManager, DeskhiveConfig, PolicyConfig, SyncConfig};
pub use constants::{status_groups, system, BookingStatus};
pub use crate::core::DeskhiveCore;
pub use error::{BookingError, Result};
pub use models::{Booking, ExternalCalendarSource, SyncRun, TimeRange};
pub use services::{Authorizer, BookingLifecycleService, SpaceRole};
pub use state_machine::{BookingEvent, BookingState, BookingStateMachine};
pub use sync::{SpaceReconciler, SyncScheduler};
