//! Flutter-facing boundary crate for the ClassFeed core.

pub mod api;
