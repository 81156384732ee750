//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level feed functions to Dart via FRB.
//! - Convert core errors into `{success, data, error}` envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One process-wide `FeedService` backs every call, so all mark-read
//!   requests share a single pending arena.
//! - The caller identity is always passed explicitly.

use classfeed_core::db::open_db_with;
use classfeed_core::{
    core_version as core_version_inner, filter_options_for_role, format_relative_time,
    init_logging as init_logging_inner, parse_feed_role, parse_notification_type,
    ping as ping_inner, settle_outcome, supported_notification_type_strings, FeedCaller,
    FeedConfig, FeedError, FeedRole, FeedService, FilterQuery, Notification,
    SqliteNotificationStore,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

const FEED_DB_FILE_NAME: &str = "classfeed_feed.sqlite3";
static FEED_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static FEED_SERVICE: OnceLock<FeedService<SqliteNotificationStore>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One feed row as rendered by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub recipient_id: String,
    /// External type name (`newSubmission|gradePosted|reportReady|other`).
    pub kind: String,
    pub title: String,
    pub message: String,
    pub created_at_ms: i64,
    pub read: bool,
}

/// Envelope for one feed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedListResponse {
    pub success: bool,
    pub data: Vec<FeedItem>,
    pub has_more: bool,
    pub total_matched: u32,
    pub error: Option<String>,
}

impl FeedListResponse {
    fn failure(err: &FeedError) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            has_more: false,
            total_matched: 0,
            error: Some(err.to_string()),
        }
    }
}

/// Read state confirmed by a mark-read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkReadData {
    pub id: String,
    pub read: bool,
}

/// Envelope for a mark-read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkReadResponse {
    pub success: bool,
    pub data: Option<MarkReadData>,
    pub error: Option<String>,
    /// Stable error code (`not_found|unauthorized|in_progress|...`).
    pub error_code: Option<String>,
    /// `true` when retrying the same call later may succeed.
    pub retryable: bool,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedActionResponse {
    pub success: bool,
    /// Created notification id, when the action produced one.
    pub id: Option<String>,
    pub error: Option<String>,
}

/// Envelope for unread badge counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadCountResponse {
    pub success: bool,
    pub count: u32,
    pub error: Option<String>,
}

/// Lists one page of the caller's feed.
///
/// Input semantics:
/// - `status`: `all|unread|read`.
/// - `kind`: `all` or one external type name allowed for `role`.
/// - `display_count`: cursor; pass the previous value plus the page step to
///   load more.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_list(
    caller_id: String,
    role: String,
    status: String,
    kind: String,
    search_text: String,
    display_count: i64,
) -> FeedListResponse {
    let result = parse_caller(&caller_id, &role).and_then(|caller| {
        let query = FilterQuery::parse(&caller_id, &status, &kind, &search_text, display_count)
            .map_err(|err| FeedError::Validation(err.to_string()))?;
        feed_service()?.list_feed(&caller, &query)
    });

    match result {
        Ok(page) => FeedListResponse {
            success: true,
            data: page.items.iter().map(to_feed_item).collect(),
            has_more: page.has_more,
            total_matched: u32::try_from(page.total_matched).unwrap_or(u32::MAX),
            error: None,
        },
        Err(err) => {
            log_failure("feed_list", &err);
            FeedListResponse::failure(&err)
        }
    }
}

/// Marks one of the caller's notifications as read.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Repeating the call for an already read item succeeds.
/// - A concurrent call for the same id fails with `in_progress` and
///   `retryable=true`.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_mark_read(
    caller_id: String,
    role: String,
    notification_id: String,
) -> MarkReadResponse {
    let result = parse_caller(&caller_id, &role).and_then(|caller| {
        let id = parse_notification_id(&notification_id)?;
        settle_outcome(feed_service()?.mark_read(&caller, id)?)
    });

    match result {
        Ok(record) => MarkReadResponse {
            success: true,
            data: Some(MarkReadData {
                id: record.id.to_string(),
                read: record.read,
            }),
            error: None,
            error_code: None,
            retryable: false,
        },
        Err(err) => {
            log_failure("feed_mark_read", &err);
            MarkReadResponse {
                success: false,
                data: None,
                error: Some(err.to_string()),
                error_code: Some(err.code().to_string()),
                retryable: err.is_retryable(),
            }
        }
    }
}

/// Records a new unread notification for `recipient_id`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Returns the created id on success.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_publish(
    recipient_id: String,
    kind: String,
    title: String,
    message: String,
) -> FeedActionResponse {
    let result = parse_notification_type(&kind)
        .ok_or_else(|| FeedError::Validation(format!("unsupported notification type `{kind}`")))
        .and_then(|kind| {
            feed_service()?.publish(&recipient_id, kind, title.trim(), &message)
        });

    match result {
        Ok(record) => FeedActionResponse {
            success: true,
            id: Some(record.id.to_string()),
            error: None,
        },
        Err(err) => {
            log_failure("feed_publish", &err);
            FeedActionResponse {
                success: false,
                id: None,
                error: Some(err.to_string()),
            }
        }
    }
}

/// Counts unread notifications in the caller's own feed.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_unread_count(
    caller_id: String,
    role: String,
    recipient_id: String,
) -> UnreadCountResponse {
    let result = parse_caller(&caller_id, &role)
        .and_then(|caller| feed_service()?.unread_count(&caller, &recipient_id));

    match result {
        Ok(count) => UnreadCountResponse {
            success: true,
            count: u32::try_from(count).unwrap_or(u32::MAX),
            error: None,
        },
        Err(err) => {
            log_failure("feed_unread_count", &err);
            UnreadCountResponse {
                success: false,
                count: 0,
                error: Some(err.to_string()),
            }
        }
    }
}

/// Returns every supported external notification type name.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_type_options() -> Vec<String> {
    supported_notification_type_strings()
        .iter()
        .map(|value| (*value).to_string())
        .collect()
}

/// Returns the filter selector entries for `role`, in display order.
///
/// Unknown roles get an empty list.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_filter_options(role: String) -> Vec<String> {
    parse_feed_role(&role)
        .map(|role| {
            filter_options_for_role(role)
                .iter()
                .map(|option| option.as_str().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Formats `created_at_ms` relative to `now_ms` for list rows.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_relative_time(created_at_ms: i64, now_ms: i64) -> String {
    format_relative_time(created_at_ms, now_ms)
}

fn parse_caller(caller_id: &str, role: &str) -> Result<FeedCaller, FeedError> {
    let role: FeedRole = parse_feed_role(role)
        .ok_or_else(|| FeedError::Validation(format!("unsupported role `{}`", role.trim())))?;
    Ok(FeedCaller::new(caller_id, role))
}

fn parse_notification_id(raw: &str) -> Result<Uuid, FeedError> {
    Uuid::parse_str(raw.trim())
        .map_err(|err| FeedError::Validation(format!("invalid notification id: {err}")))
}

fn to_feed_item(record: &Notification) -> FeedItem {
    FeedItem {
        id: record.id.to_string(),
        recipient_id: record.recipient_id.clone(),
        kind: record.kind.as_str().to_string(),
        title: record.title.clone(),
        message: record.message.clone(),
        created_at_ms: record.created_at,
        read: record.read,
    }
}

fn log_failure(call: &str, err: &FeedError) {
    warn!(
        "event=ffi_call module=ffi status=error call={call} code={} retryable={}",
        err.code(),
        err.is_retryable()
    );
}

fn resolve_feed_db_path() -> PathBuf {
    FEED_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("CLASSFEED_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(FEED_DB_FILE_NAME)
        })
        .clone()
}

fn feed_service() -> Result<&'static FeedService<SqliteNotificationStore>, FeedError> {
    if let Some(service) = FEED_SERVICE.get() {
        return Ok(service);
    }

    let config = FeedConfig::from_env();
    let conn = open_db_with(resolve_feed_db_path(), &config)
        .map_err(|err| FeedError::Storage(err.into()))?;
    let store = SqliteNotificationStore::try_new(conn)?;
    Ok(FEED_SERVICE.get_or_init(|| FeedService::new(Arc::new(store), config)))
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, feed_filter_options, feed_list, feed_mark_read, feed_publish,
        feed_relative_time, feed_type_options, feed_unread_count, init_logging, ping,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn publish_list_and_mark_read_roundtrip() {
        let student = unique_token("student");
        let published = feed_publish(
            student.clone(),
            "gradePosted".to_string(),
            "Grade posted".to_string(),
            "Essay 2: A-".to_string(),
        );
        assert!(published.success, "{:?}", published.error);
        let id = published.id.expect("publish should return id");

        let unread = feed_list(
            student.clone(),
            "student".to_string(),
            "unread".to_string(),
            "all".to_string(),
            String::new(),
            10,
        );
        assert!(unread.success, "{:?}", unread.error);
        assert_eq!(unread.total_matched, 1);
        assert_eq!(unread.data[0].id, id);
        assert_eq!(unread.data[0].kind, "gradePosted");

        let first = feed_mark_read(student.clone(), "student".to_string(), id.clone());
        assert!(first.success, "{:?}", first.error);
        assert_eq!(first.data.as_ref().map(|data| data.read), Some(true));

        let again = feed_mark_read(student.clone(), "student".to_string(), id);
        assert!(again.success, "repeat mark-read is idempotent");

        let count = feed_unread_count(student.clone(), "student".to_string(), student);
        assert!(count.success);
        assert_eq!(count.count, 0);
    }

    #[test]
    fn feed_list_rejects_out_of_role_type_filter() {
        let student = unique_token("student");
        let response = feed_list(
            student,
            "student".to_string(),
            "all".to_string(),
            "newSubmission".to_string(),
            String::new(),
            10,
        );
        assert!(!response.success);
        assert!(response.data.is_empty());
        assert!(response.error.is_some());
    }

    #[test]
    fn feed_list_rejects_unknown_status() {
        let response = feed_list(
            unique_token("student"),
            "student".to_string(),
            "archived".to_string(),
            "all".to_string(),
            String::new(),
            10,
        );
        assert!(!response.success);
    }

    #[test]
    fn feed_mark_read_reports_not_found_as_non_retryable() {
        let response = feed_mark_read(
            unique_token("student"),
            "student".to_string(),
            "00000000-0000-4000-8000-00000000dead".to_string(),
        );
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("not_found"));
        assert!(!response.retryable);
    }

    #[test]
    fn feed_mark_read_rejects_malformed_id() {
        let response = feed_mark_read(
            unique_token("student"),
            "student".to_string(),
            "not-a-uuid".to_string(),
        );
        assert_eq!(response.error_code.as_deref(), Some("validation"));
    }

    #[test]
    fn feed_publish_rejects_unknown_type() {
        let response = feed_publish(
            unique_token("student"),
            "grade_posted".to_string(),
            "t".to_string(),
            String::new(),
        );
        assert!(!response.success);
        assert!(response.id.is_none());
    }

    #[test]
    fn filter_options_follow_role() {
        assert_eq!(
            feed_filter_options("student".to_string()),
            vec!["all", "unread", "read", "gradePosted"]
        );
        assert_eq!(
            feed_filter_options("instructor".to_string()),
            vec!["all", "unread", "read", "newSubmission", "reportReady"]
        );
        assert!(feed_filter_options("admin".to_string()).is_empty());
        assert_eq!(feed_type_options().len(), 4);
    }

    #[test]
    fn relative_time_passthrough() {
        let now = 1_710_504_000_000;
        assert_eq!(feed_relative_time(now - 5 * 60_000, now), "5 minutes ago");
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
