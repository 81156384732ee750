//! Notification domain model.
//!
//! # Responsibility
//! - Define the canonical feed record delivered to one recipient.
//! - Own the read-state lifecycle helpers (`false -> true` only).
//!
//! # Invariants
//! - `id`, `recipient_id`, `kind`, `title`, `message` and `created_at` never
//!   change after creation.
//! - `read` is monotonic; `read_at` is set exactly once, at the transition.
//! - `read_at`, when present, is not earlier than `created_at`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one notification record.
pub type NotificationId = Uuid;

/// Identifier of the user a notification is addressed to.
pub type RecipientId = String;

/// Closed set of feed event categories.
///
/// External names (JSON, FFI option lists) are camelCase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationType {
    /// A student handed in work for an instructor's subject.
    NewSubmission,
    /// An instructor published a grade.
    GradePosted,
    /// A generated report is ready for download.
    ReportReady,
    Other,
}

/// External string for [`NotificationType::NewSubmission`].
pub const NOTIFICATION_TYPE_NEW_SUBMISSION: &str = "newSubmission";
/// External string for [`NotificationType::GradePosted`].
pub const NOTIFICATION_TYPE_GRADE_POSTED: &str = "gradePosted";
/// External string for [`NotificationType::ReportReady`].
pub const NOTIFICATION_TYPE_REPORT_READY: &str = "reportReady";
/// External string for [`NotificationType::Other`].
pub const NOTIFICATION_TYPE_OTHER: &str = "other";

const SUPPORTED_NOTIFICATION_TYPE_STRINGS: &[&str] = &[
    NOTIFICATION_TYPE_NEW_SUBMISSION,
    NOTIFICATION_TYPE_GRADE_POSTED,
    NOTIFICATION_TYPE_REPORT_READY,
    NOTIFICATION_TYPE_OTHER,
];

impl NotificationType {
    /// All variants in declaration order.
    pub const ALL: [NotificationType; 4] = [
        Self::NewSubmission,
        Self::GradePosted,
        Self::ReportReady,
        Self::Other,
    ];

    /// Stable external name used by clients.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewSubmission => NOTIFICATION_TYPE_NEW_SUBMISSION,
            Self::GradePosted => NOTIFICATION_TYPE_GRADE_POSTED,
            Self::ReportReady => NOTIFICATION_TYPE_REPORT_READY,
            Self::Other => NOTIFICATION_TYPE_OTHER,
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the external type enumeration for client option construction.
pub fn supported_notification_type_strings() -> &'static [&'static str] {
    SUPPORTED_NOTIFICATION_TYPE_STRINGS
}

/// Parses one external type name.
///
/// Surrounding whitespace is ignored; the name itself must match exactly,
/// case-sensitively.
pub fn parse_notification_type(value: &str) -> Option<NotificationType> {
    match value.trim() {
        NOTIFICATION_TYPE_NEW_SUBMISSION => Some(NotificationType::NewSubmission),
        NOTIFICATION_TYPE_GRADE_POSTED => Some(NotificationType::GradePosted),
        NOTIFICATION_TYPE_REPORT_READY => Some(NotificationType::ReportReady),
        NOTIFICATION_TYPE_OTHER => Some(NotificationType::Other),
        _ => None,
    }
}

/// Validation failures for notification records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationValidationError {
    EmptyRecipient,
    EmptyTitle,
    /// `read_at` is set while `read` is still `false`.
    ReadAtWithoutRead,
    ReadBeforeCreated {
        created_at: i64,
        read_at: i64,
    },
    /// A new record must start unread.
    CreatedAsRead,
}

impl Display for NotificationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRecipient => write!(f, "recipient_id must not be empty"),
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::ReadAtWithoutRead => write!(f, "read_at must be empty while read=false"),
            Self::ReadBeforeCreated {
                created_at,
                read_at,
            } => write!(
                f,
                "read_at ({read_at}) must not be earlier than created_at ({created_at})"
            ),
            Self::CreatedAsRead => write!(f, "new notifications must be created unread"),
        }
    }
}

impl Error for NotificationValidationError {}

/// One event record in a recipient's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: RecipientId,
    /// Serialized as `type` to match the client contract.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub read: bool,
    /// Unix epoch milliseconds of the `false -> true` transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
}

impl Notification {
    /// Creates an unread notification with a generated id.
    pub fn new(
        recipient_id: impl Into<RecipientId>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), recipient_id, kind, title, message, created_at)
    }

    /// Creates an unread notification with a caller-provided id.
    ///
    /// Used by import paths and tests that need deterministic identity.
    pub fn with_id(
        id: NotificationId,
        recipient_id: impl Into<RecipientId>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            recipient_id: recipient_id.into().trim().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            created_at,
            read: false,
            read_at: None,
        }
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), NotificationValidationError> {
        if self.recipient_id.trim().is_empty() {
            return Err(NotificationValidationError::EmptyRecipient);
        }
        if self.title.trim().is_empty() {
            return Err(NotificationValidationError::EmptyTitle);
        }
        match (self.read, self.read_at) {
            (false, Some(_)) => Err(NotificationValidationError::ReadAtWithoutRead),
            (true, Some(read_at)) if read_at < self.created_at => {
                Err(NotificationValidationError::ReadBeforeCreated {
                    created_at: self.created_at,
                    read_at,
                })
            }
            _ => Ok(()),
        }
    }

    /// Checks a record about to be created: `validate()` plus unread state.
    pub fn validate_new(&self) -> Result<(), NotificationValidationError> {
        self.validate()?;
        if self.read || self.read_at.is_some() {
            return Err(NotificationValidationError::CreatedAsRead);
        }
        Ok(())
    }

    /// Applies the one-way read transition.
    ///
    /// Returns `false` and leaves the record untouched when already read.
    pub fn mark_read(&mut self, at_ms: i64) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(at_ms.max(self.created_at));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{
        parse_notification_type, supported_notification_type_strings, Notification,
        NotificationType, NotificationValidationError,
    };

    #[test]
    fn parses_all_external_type_names() {
        for kind in NotificationType::ALL {
            assert_eq!(parse_notification_type(kind.as_str()), Some(kind));
        }
        assert_eq!(supported_notification_type_strings().len(), 4);
    }

    #[test]
    fn rejects_snake_case_and_unknown_type_names() {
        assert_eq!(parse_notification_type("grade_posted"), None);
        assert_eq!(parse_notification_type("GRADEPOSTED"), None);
        assert_eq!(parse_notification_type(""), None);
        assert_eq!(
            parse_notification_type(" gradePosted "),
            Some(NotificationType::GradePosted)
        );
    }

    #[test]
    fn mark_read_is_one_way() {
        let mut record = Notification::new("u1", NotificationType::GradePosted, "t", "m", 100);
        assert!(record.mark_read(200));
        assert_eq!(record.read_at, Some(200));

        assert!(!record.mark_read(300));
        assert!(record.read);
        assert_eq!(record.read_at, Some(200));
    }

    #[test]
    fn mark_read_never_predates_creation() {
        let mut record = Notification::new("u1", NotificationType::Other, "t", "m", 500);
        record.mark_read(10);
        assert_eq!(record.read_at, Some(500));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_recipient_and_title() {
        let record = Notification::new("  ", NotificationType::Other, "t", "m", 0);
        assert_eq!(
            record.validate(),
            Err(NotificationValidationError::EmptyRecipient)
        );

        let record = Notification::new("u1", NotificationType::Other, " ", "m", 0);
        assert_eq!(record.validate(), Err(NotificationValidationError::EmptyTitle));
    }

    #[test]
    fn validate_rejects_read_at_on_unread_record() {
        let mut record = Notification::new("u1", NotificationType::Other, "t", "m", 0);
        record.read_at = Some(5);
        assert_eq!(
            record.validate(),
            Err(NotificationValidationError::ReadAtWithoutRead)
        );
    }

    #[test]
    fn validate_new_requires_unread_state() {
        let mut record = Notification::new("u1", NotificationType::Other, "t", "m", 0);
        assert!(record.validate_new().is_ok());

        record.mark_read(5);
        assert!(record.validate().is_ok());
        assert_eq!(
            record.validate_new(),
            Err(NotificationValidationError::CreatedAsRead)
        );
    }
}
