//! Caller roles and the filter options each role may use.

use crate::model::filter::{FilterQuery, StatusFilter, TypeFilter};
use crate::model::notification::{parse_notification_type, NotificationType};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_INSTRUCTOR: &str = "instructor";

/// Role of the caller looking at a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedRole {
    Student,
    Instructor,
}

impl FeedRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => ROLE_STUDENT,
            Self::Instructor => ROLE_INSTRUCTOR,
        }
    }
}

/// Parses an external role name.
pub fn parse_feed_role(value: &str) -> Option<FeedRole> {
    match value.trim() {
        ROLE_STUDENT => Some(FeedRole::Student),
        ROLE_INSTRUCTOR => Some(FeedRole::Instructor),
        _ => None,
    }
}

/// One entry of the single filter selector shown to a caller.
///
/// Status entries and category entries share one list, so each option maps
/// onto either the status or the type part of a [`FilterQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOption {
    All,
    Unread,
    Read,
    Kind(NotificationType),
}

impl FilterOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Kind(kind) => kind.as_str(),
        }
    }

    /// Applies this selector entry to a query, resetting the other part.
    pub fn apply(self, query: FilterQuery) -> FilterQuery {
        match self {
            Self::All => query
                .with_status(StatusFilter::All)
                .with_kind(TypeFilter::All),
            Self::Unread => query
                .with_status(StatusFilter::Unread)
                .with_kind(TypeFilter::All),
            Self::Read => query
                .with_status(StatusFilter::Read)
                .with_kind(TypeFilter::All),
            Self::Kind(kind) => query
                .with_status(StatusFilter::All)
                .with_kind(TypeFilter::Only(kind)),
        }
    }
}

/// Parses one selector entry from its external string.
pub fn parse_filter_option(value: &str) -> Option<FilterOption> {
    match value.trim() {
        "all" => Some(FilterOption::All),
        "unread" => Some(FilterOption::Unread),
        "read" => Some(FilterOption::Read),
        other => parse_notification_type(other).map(FilterOption::Kind),
    }
}

const STUDENT_OPTIONS: &[FilterOption] = &[
    FilterOption::All,
    FilterOption::Unread,
    FilterOption::Read,
    FilterOption::Kind(NotificationType::GradePosted),
];

const INSTRUCTOR_OPTIONS: &[FilterOption] = &[
    FilterOption::All,
    FilterOption::Unread,
    FilterOption::Read,
    FilterOption::Kind(NotificationType::NewSubmission),
    FilterOption::Kind(NotificationType::ReportReady),
];

/// Returns the selector entries a role may use, in display order.
pub fn filter_options_for_role(role: FeedRole) -> &'static [FilterOption] {
    match role {
        FeedRole::Student => STUDENT_OPTIONS,
        FeedRole::Instructor => INSTRUCTOR_OPTIONS,
    }
}

pub fn is_filter_option_allowed(role: FeedRole, option: FilterOption) -> bool {
    filter_options_for_role(role).contains(&option)
}

/// A query used a type filter outside the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleFilterError {
    pub role: FeedRole,
    pub kind: NotificationType,
}

impl Display for RoleFilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type filter `{}` is not available to role `{}`",
            self.kind,
            self.role.as_str()
        )
    }
}

impl Error for RoleFilterError {}

/// Checks the type part of a query against the role's selector entries.
///
/// Status filters are open to every role.
pub fn authorize_type_filter(role: FeedRole, query: &FilterQuery) -> Result<(), RoleFilterError> {
    match query.kind {
        TypeFilter::All => Ok(()),
        TypeFilter::Only(kind) if is_filter_option_allowed(role, FilterOption::Kind(kind)) => {
            Ok(())
        }
        TypeFilter::Only(kind) => Err(RoleFilterError { role, kind }),
    }
}
