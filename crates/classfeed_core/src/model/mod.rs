//! Domain model for the notification feed.
//!
//! # Responsibility
//! - Define the notification record and its read-state lifecycle.
//! - Define the filter/role vocabulary shared by engine, service and FFI.
//!
//! # Invariants
//! - Every notification is identified by a stable `NotificationId`.
//! - Records are never physically deleted by core.

pub mod filter;
pub mod notification;
pub mod role;
