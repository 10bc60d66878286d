//! Database operations: schema migration with concurrency control.

pub mod migrations;

pub use migrations::DatabaseMigrations;
