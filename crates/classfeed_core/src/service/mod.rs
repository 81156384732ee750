//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, feed engine and coordinator into use-case APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod feed_service;
