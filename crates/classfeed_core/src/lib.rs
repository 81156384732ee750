//! Core domain logic for the ClassFeed notification feed.
//! This crate is the single source of truth for feed invariants.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod feed;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use config::FeedConfig;
pub use coordinator::{MarkReadOutcome, ReadStateCoordinator, RejectReason};
pub use feed::engine::{next_display_count, project_feed, query_feed, FeedPage};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::filter::{
    parse_status_filter, parse_type_filter, FilterQuery, FilterValidationError, StatusFilter,
    TypeFilter,
};
pub use model::notification::{
    parse_notification_type, supported_notification_type_strings, Notification, NotificationId,
    NotificationType, NotificationValidationError, RecipientId,
};
pub use model::role::{
    authorize_type_filter, filter_options_for_role, parse_feed_role, parse_filter_option,
    FeedRole, FilterOption,
};
pub use repo::notification_repo::{
    NotificationStore, ReadChange, RepoError, RepoResult, SqliteNotificationStore,
};
pub use service::feed_service::{settle_outcome, FeedCaller, FeedError, FeedService};
pub use time::{format_relative_time, now_ms};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
