//! Feed use-case service.
//!
//! # Responsibility
//! - Provide publish/list/mark-read/unread-count entry points for callers.
//! - Enforce feed ownership and role-based type filter access.
//! - Map store and coordinator results onto the caller-facing error taxonomy.
//!
//! # Invariants
//! - A caller only reads or mutates the feed whose recipient id equals its
//!   own user id.
//! - Out-of-role type filters are rejected before the store is touched.
//! - Read transitions always go through the `ReadStateCoordinator`.

use crate::config::FeedConfig;
use crate::coordinator::{MarkReadOutcome, ReadStateCoordinator};
use crate::feed::engine::{next_display_count, query_feed, FeedPage};
use crate::model::filter::FilterQuery;
use crate::model::notification::{Notification, NotificationId, NotificationType};
use crate::model::role::{authorize_type_filter, FeedRole};
use crate::repo::notification_repo::{NotificationStore, RepoError};
use crate::time::now_ms;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Explicit identity of whoever is asking; replaces any ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCaller {
    pub user_id: String,
    pub role: FeedRole,
}

impl FeedCaller {
    pub fn new(user_id: impl Into<String>, role: FeedRole) -> Self {
        Self {
            user_id: user_id.into().trim().to_string(),
            role,
        }
    }

    pub fn student(user_id: impl Into<String>) -> Self {
        Self::new(user_id, FeedRole::Student)
    }

    pub fn instructor(user_id: impl Into<String>) -> Self {
        Self::new(user_id, FeedRole::Instructor)
    }
}

/// Caller-facing error taxonomy.
#[derive(Debug)]
pub enum FeedError {
    /// Unknown notification id. Not retryable.
    NotFound(NotificationId),
    /// Caller may not act on this feed or use this filter. Not retryable.
    Unauthorized(String),
    /// A mark-read for the same id is pending; retry shortly.
    InProgress,
    /// Persistence was busy or locked; nothing was mutated.
    Transient(RepoError),
    /// Malformed input, rejected before touching the store.
    Validation(String),
    /// Any other persistence failure.
    Storage(RepoError),
}

impl FeedError {
    /// Stable machine-readable code for boundary envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InProgress => "in_progress",
            Self::Transient(_) => "transient",
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InProgress | Self::Transient(_))
    }
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::Unauthorized(message) => write!(f, "unauthorized: {message}"),
            Self::InProgress => write!(f, "mark-read already in progress; retry shortly"),
            Self::Transient(err) => write!(f, "temporary storage failure: {err}"),
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transient(err) | Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for FeedError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            other if other.is_transient() => Self::Transient(other),
            other => Self::Storage(other),
        }
    }
}

/// Collapses a coordinator outcome into the read record or a feed error.
pub fn settle_outcome(outcome: MarkReadOutcome) -> Result<Notification, FeedError> {
    match outcome {
        MarkReadOutcome::Transitioned(record) | MarkReadOutcome::AlreadyRead(record) => Ok(record),
        MarkReadOutcome::Rejected(_) => Err(FeedError::InProgress),
        MarkReadOutcome::Failed(err) => Err(err.into()),
    }
}

/// Feed facade over one store and its read-state coordinator.
pub struct FeedService<S: NotificationStore> {
    store: Arc<S>,
    coordinator: ReadStateCoordinator<S>,
    config: FeedConfig,
}

impl<S: NotificationStore> FeedService<S> {
    pub fn new(store: Arc<S>, config: FeedConfig) -> Self {
        let coordinator = ReadStateCoordinator::new(Arc::clone(&store), &config);
        Self {
            store,
            coordinator,
            config,
        }
    }

    pub fn coordinator(&self) -> &ReadStateCoordinator<S> {
        &self.coordinator
    }

    /// Records a new unread notification for one recipient.
    ///
    /// Producer entry point (submission/grading workflows). No caller check.
    pub fn publish(
        &self,
        recipient_id: &str,
        kind: NotificationType,
        title: &str,
        message: &str,
    ) -> Result<Notification, FeedError> {
        let notification = Notification::new(recipient_id, kind, title, message, now_ms());
        self.store.create_notification(&notification)?;
        info!(
            "event=notification_publish module=service status=ok id={} type={}",
            notification.id, notification.kind
        );
        Ok(notification)
    }

    /// Returns one page of the caller's own feed.
    pub fn list_feed(
        &self,
        caller: &FeedCaller,
        query: &FilterQuery,
    ) -> Result<FeedPage, FeedError> {
        authorize_recipient(caller, &query.recipient_id)?;
        authorize_type_filter(caller.role, query).map_err(|err| {
            warn!(
                "event=feed_list module=service status=rejected reason=type_filter role={} type={}",
                caller.role.as_str(),
                err.kind
            );
            FeedError::Unauthorized(err.to_string())
        })?;

        Ok(query_feed(self.store.as_ref(), query)?)
    }

    /// Advances the display cursor by the configured step and re-queries.
    ///
    /// Returns the advanced query so the caller can keep it as its cursor.
    pub fn load_more(
        &self,
        caller: &FeedCaller,
        query: &FilterQuery,
    ) -> Result<(FilterQuery, FeedPage), FeedError> {
        let next = query
            .clone()
            .with_display_count(next_display_count(query.display_count, self.config.page_step));
        let page = self.list_feed(caller, &next)?;
        Ok((next, page))
    }

    /// Requests the read transition for one of the caller's notifications.
    ///
    /// Ownership failures and unknown ids are returned as errors; everything
    /// past the ownership check is reported through the outcome.
    pub fn mark_read(
        &self,
        caller: &FeedCaller,
        id: NotificationId,
    ) -> Result<MarkReadOutcome, FeedError> {
        let record = self
            .store
            .get_notification(id)?
            .ok_or(FeedError::NotFound(id))?;
        authorize_recipient(caller, &record.recipient_id)?;

        Ok(self.coordinator.request_mark_read(id))
    }

    /// Counts unread notifications in the caller's own feed.
    pub fn unread_count(&self, caller: &FeedCaller, recipient_id: &str) -> Result<u64, FeedError> {
        authorize_recipient(caller, recipient_id)?;
        Ok(self.store.count_unread(recipient_id.trim())?)
    }
}

fn authorize_recipient(caller: &FeedCaller, recipient_id: &str) -> Result<(), FeedError> {
    let recipient_id = recipient_id.trim();
    if recipient_id.is_empty() {
        return Err(FeedError::Validation(
            "recipient_id must not be empty".to_string(),
        ));
    }
    if caller.user_id.is_empty() || caller.user_id != recipient_id {
        warn!(
            "event=feed_access module=service status=rejected reason=not_owner role={}",
            caller.role.as_str()
        );
        return Err(FeedError::Unauthorized(
            "caller does not own this feed".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{settle_outcome, FeedError};
    use crate::coordinator::{MarkReadOutcome, RejectReason};
    use crate::model::notification::{Notification, NotificationType};
    use crate::repo::notification_repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = FeedError::from(RepoError::NotFound(id));
        assert!(matches!(err, FeedError::NotFound(found) if found == id));
        assert!(!err.is_retryable());
    }

    #[test]
    fn settle_maps_rejection_to_retryable_in_progress() {
        let err = settle_outcome(MarkReadOutcome::Rejected(RejectReason::InProgress))
            .expect_err("rejection must be an error");
        assert!(matches!(err, FeedError::InProgress));
        assert!(err.is_retryable());
        assert_eq!(err.code(), "in_progress");
    }

    #[test]
    fn settle_returns_record_for_already_read() {
        let mut record = Notification::new("u1", NotificationType::Other, "t", "m", 1);
        record.mark_read(2);
        let settled = settle_outcome(MarkReadOutcome::AlreadyRead(record.clone()))
            .expect("already read settles to the record");
        assert_eq!(settled, record);
    }
}
