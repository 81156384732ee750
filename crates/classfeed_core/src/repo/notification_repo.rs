//! Notification store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist notification records for all recipients.
//! - Own the only write path for the read flag (`set_read`).
//!
//! # Invariants
//! - Write paths call `Notification::validate_new()` before SQL mutations;
//!   records always enter the store unread.
//! - `set_read` is idempotent: an already-read row is returned without a write.
//! - Recipient listings are ordered `created_at DESC`, newer insertions first
//!   on equal timestamps.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::notification::{
    Notification, NotificationId, NotificationType, NotificationValidationError,
};
use crate::time::now_ms;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    uuid,
    recipient_id,
    type,
    title,
    message,
    created_at,
    is_read,
    read_at
FROM notifications";

const REQUIRED_COLUMNS: &[&str] = &[
    "uuid",
    "recipient_id",
    "type",
    "title",
    "message",
    "created_at",
    "is_read",
    "read_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for notification persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NotificationValidationError),
    Db(DbError),
    NotFound(NotificationId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Whether a retry may succeed without any change by the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => err.is_busy(),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted notification data: {message}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is behind required {expected_version}; open it via db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column missing: {table}.{column}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NotificationValidationError> for RepoError {
    fn from(value: NotificationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of one `set_read` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChange {
    /// Record state after the call; always `read=true`.
    pub notification: Notification,
    /// `true` only when this call performed the `false -> true` write.
    pub transitioned: bool,
}

/// Authoritative notification persistence.
///
/// Implementations must be safe to share across threads; `set_read` calls
/// for different ids must not interfere with each other.
pub trait NotificationStore: Send + Sync {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    /// Returns all records of one recipient, most recent first.
    fn list_by_recipient(&self, recipient_id: &str) -> RepoResult<Vec<Notification>>;
    /// Marks one record read; no write when it already is.
    fn set_read(&self, id: NotificationId) -> RepoResult<ReadChange>;
    fn count_unread(&self, recipient_id: &str) -> RepoResult<u64>;
}

impl<S: NotificationStore + ?Sized> NotificationStore for Arc<S> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        (**self).create_notification(notification)
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        (**self).get_notification(id)
    }

    fn list_by_recipient(&self, recipient_id: &str) -> RepoResult<Vec<Notification>> {
        (**self).list_by_recipient(recipient_id)
    }

    fn set_read(&self, id: NotificationId) -> RepoResult<ReadChange> {
        (**self).set_read(id)
    }

    fn count_unread(&self, recipient_id: &str) -> RepoResult<u64> {
        (**self).count_unread(recipient_id)
    }
}

/// SQLite-backed notification store.
///
/// Owns its connection behind a mutex; SQLite transactions keep every call
/// all-or-nothing, so a panicking holder leaves no partial state behind.
pub struct SqliteNotificationStore {
    conn: Mutex<Connection>,
}

impl SqliteNotificationStore {
    /// Wraps a migrated connection after checking schema readiness.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs a closure with exclusive access to the underlying connection.
    ///
    /// Intended for maintenance and diagnostics; feed mutations must go
    /// through [`NotificationStore::set_read`].
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.lock();
        f(&conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationStore for SqliteNotificationStore {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        notification.validate_new()?;

        let conn = self.lock();
        conn.execute(
            "INSERT INTO notifications (
                uuid,
                recipient_id,
                type,
                title,
                message,
                created_at,
                is_read,
                read_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL);",
            params![
                notification.id.to_string(),
                notification.recipient_id.as_str(),
                notification_type_to_db(notification.kind),
                notification.title.as_str(),
                notification.message.as_str(),
                notification.created_at,
            ],
        )?;

        Ok(notification.id)
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let conn = self.lock();
        select_by_id(&conn, id)
    }

    fn list_by_recipient(&self, recipient_id: &str) -> RepoResult<Vec<Notification>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE recipient_id = ?1
             ORDER BY created_at DESC, rowid DESC;"
        ))?;

        let mut rows = stmt.query([recipient_id.trim()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_notification_row(row)?);
        }

        Ok(records)
    }

    fn set_read(&self, id: NotificationId) -> RepoResult<ReadChange> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE notifications
             SET
                is_read = 1,
                read_at = MAX(?2, created_at)
             WHERE uuid = ?1
               AND is_read = 0;",
            params![id.to_string(), now_ms()],
        )?;

        let notification = select_by_id(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;

        debug!(
            "event=notification_set_read module=repo status=ok transitioned={} id={id}",
            changed > 0
        );
        Ok(ReadChange {
            notification,
            transitioned: changed > 0,
        })
    }

    fn count_unread(&self, recipient_id: &str) -> RepoResult<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0;",
            [recipient_id.trim()],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative unread count `{count}`")))
    }
}

fn select_by_id(conn: &Connection, id: NotificationId) -> RepoResult<Option<Notification>> {
    let mut stmt = conn.prepare_cached(&format!("{NOTIFICATION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_notification_row(row)?)),
        None => Ok(None),
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'notifications';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if table.is_none() {
        return Err(RepoError::MissingRequiredTable("notifications"));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(notifications);")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;
    for &column in REQUIRED_COLUMNS {
        if !columns.iter().any(|name| name.as_str() == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: "notifications",
                column,
            });
        }
    }

    Ok(())
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in notifications.uuid"
        ))
    })?;

    let type_text: String = row.get("type")?;
    let kind = parse_notification_type_db(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification type `{type_text}` in notifications.type"
        ))
    })?;

    let read = match row.get::<_, i64>("is_read")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_read value `{other}` in notifications.is_read"
            )));
        }
    };

    let notification = Notification {
        id,
        recipient_id: row.get("recipient_id")?,
        kind,
        title: row.get("title")?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
        read,
        read_at: row.get("read_at")?,
    };
    notification.validate()?;
    Ok(notification)
}

fn notification_type_to_db(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::NewSubmission => "new_submission",
        NotificationType::GradePosted => "grade_posted",
        NotificationType::ReportReady => "report_ready",
        NotificationType::Other => "other",
    }
}

fn parse_notification_type_db(value: &str) -> Option<NotificationType> {
    match value {
        "new_submission" => Some(NotificationType::NewSubmission),
        "grade_posted" => Some(NotificationType::GradePosted),
        "report_ready" => Some(NotificationType::ReportReady),
        "other" => Some(NotificationType::Other),
        _ => None,
    }
}
