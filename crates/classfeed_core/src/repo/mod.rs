//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the notification store contract used by engine and coordinator.
//! - Isolate SQLite query details from feed orchestration.
//!
//! # Invariants
//! - Store writes enforce `Notification::validate()` before persistence.
//! - Store APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod notification_repo;
