//! Feed query entry points.
//!
//! # Responsibility
//! - Turn a `FilterQuery` into a deterministic, side-effect-free page.
//! - Keep filter/search/pagination shaping inside core.

pub mod engine;
