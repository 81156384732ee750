//! Feed filter vocabulary.
//!
//! # Responsibility
//! - Define the status/type/search/cursor query shape consumed by the feed
//!   engine.
//! - Parse external filter strings and reject malformed values before any
//!   store access.
//!
//! # Invariants
//! - `display_count` is never negative.
//! - A parsed `FilterQuery` always carries a non-empty recipient id.

use crate::model::notification::{
    parse_notification_type, Notification, NotificationType, RecipientId,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const STATUS_FILTER_ALL: &str = "all";
pub const STATUS_FILTER_UNREAD: &str = "unread";
pub const STATUS_FILTER_READ: &str = "read";
pub const TYPE_FILTER_ALL: &str = "all";

/// Read-state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => STATUS_FILTER_ALL,
            Self::Unread => STATUS_FILTER_UNREAD,
            Self::Read => STATUS_FILTER_READ,
        }
    }

    pub fn matches(self, record: &Notification) -> bool {
        match self {
            Self::All => true,
            Self::Unread => !record.read,
            Self::Read => record.read,
        }
    }
}

/// Notification category filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeFilter {
    #[default]
    All,
    Only(NotificationType),
}

impl TypeFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => TYPE_FILTER_ALL,
            Self::Only(kind) => kind.as_str(),
        }
    }

    pub fn matches(self, record: &Notification) -> bool {
        match self {
            Self::All => true,
            Self::Only(kind) => record.kind == kind,
        }
    }
}

/// Malformed filter input (the `Validation` error class).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValidationError {
    EmptyRecipient,
    UnknownStatusFilter(String),
    UnknownTypeFilter(String),
    NegativeDisplayCount(i64),
}

impl Display for FilterValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRecipient => write!(f, "recipient_id must not be empty"),
            Self::UnknownStatusFilter(value) => write!(
                f,
                "unsupported status filter `{value}`; expected all|unread|read"
            ),
            Self::UnknownTypeFilter(value) => write!(
                f,
                "unsupported type filter `{value}`; expected all|newSubmission|gradePosted|reportReady|other"
            ),
            Self::NegativeDisplayCount(value) => {
                write!(f, "display_count must be >= 0, got {value}")
            }
        }
    }
}

impl Error for FilterValidationError {}

/// Parses an external status filter string.
pub fn parse_status_filter(value: &str) -> Result<StatusFilter, FilterValidationError> {
    match value.trim() {
        STATUS_FILTER_ALL => Ok(StatusFilter::All),
        STATUS_FILTER_UNREAD => Ok(StatusFilter::Unread),
        STATUS_FILTER_READ => Ok(StatusFilter::Read),
        other => Err(FilterValidationError::UnknownStatusFilter(
            other.to_string(),
        )),
    }
}

/// Parses an external type filter string (`all` or one type name).
pub fn parse_type_filter(value: &str) -> Result<TypeFilter, FilterValidationError> {
    let normalized = value.trim();
    if normalized == TYPE_FILTER_ALL {
        return Ok(TypeFilter::All);
    }
    parse_notification_type(normalized)
        .map(TypeFilter::Only)
        .ok_or_else(|| FilterValidationError::UnknownTypeFilter(normalized.to_string()))
}

/// One feed query: recipient, conjunctive predicates and display cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub recipient_id: RecipientId,
    pub status: StatusFilter,
    #[serde(rename = "typeFilter")]
    pub kind: TypeFilter,
    pub search_text: String,
    /// Number of leading filtered records exposed to the caller.
    pub display_count: u32,
}

impl FilterQuery {
    /// Creates an unfiltered query for one recipient.
    pub fn new(recipient_id: impl Into<RecipientId>, display_count: u32) -> Self {
        Self {
            recipient_id: recipient_id.into().trim().to_string(),
            status: StatusFilter::All,
            kind: TypeFilter::All,
            search_text: String::new(),
            display_count,
        }
    }

    /// Builds a query from external string inputs.
    ///
    /// # Errors
    /// - Returns a validation error for an empty recipient, unknown filter
    ///   strings or a negative display count.
    pub fn parse(
        recipient_id: &str,
        status: &str,
        kind: &str,
        search_text: &str,
        display_count: i64,
    ) -> Result<Self, FilterValidationError> {
        let recipient_id = recipient_id.trim();
        if recipient_id.is_empty() {
            return Err(FilterValidationError::EmptyRecipient);
        }
        if display_count < 0 {
            return Err(FilterValidationError::NegativeDisplayCount(display_count));
        }

        Ok(Self {
            recipient_id: recipient_id.to_string(),
            status: parse_status_filter(status)?,
            kind: parse_type_filter(kind)?,
            search_text: search_text.to_string(),
            display_count: u32::try_from(display_count).unwrap_or(u32::MAX),
        })
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_kind(mut self, kind: TypeFilter) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_search(mut self, search_text: impl Into<String>) -> Self {
        self.search_text = search_text.into();
        self
    }

    pub fn with_display_count(mut self, display_count: u32) -> Self {
        self.display_count = display_count;
        self
    }
}
