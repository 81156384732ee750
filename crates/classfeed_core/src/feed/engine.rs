//! Feed projection: status, type and search filters plus display cursor.
//!
//! # Responsibility
//! - Project one recipient's ordered records into a visible feed page.
//!
//! # Invariants
//! - Filters are conjunctive; only an empty search text filters nothing.
//!   Any other text, whitespace included, is matched literally.
//! - Projection never reorders records and never touches the store.
//! - `items.len() == min(display_count, total_matched)`.
//! - `has_more == (display_count < total_matched)`.

use crate::model::filter::FilterQuery;
use crate::model::notification::Notification;
use crate::repo::notification_repo::{NotificationStore, RepoResult};
use log::debug;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// One visible slice of a filtered feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    /// Leading filtered records, most recent first.
    pub items: Vec<Notification>,
    /// Number of records matching all filters before truncation.
    pub total_matched: usize,
    /// Cursor the page was produced for.
    pub display_count: u32,
    pub has_more: bool,
}

/// Loads the recipient's records and projects them through `query`.
pub fn query_feed<S>(store: &S, query: &FilterQuery) -> RepoResult<FeedPage>
where
    S: NotificationStore + ?Sized,
{
    let records = store.list_by_recipient(&query.recipient_id)?;
    let page = project_feed(records, query);
    debug!(
        "event=feed_query module=feed status=ok status_filter={} type_filter={} search_len={} display_count={} matched={} has_more={}",
        query.status.as_str(),
        query.kind.as_str(),
        query.search_text.chars().count(),
        query.display_count,
        page.total_matched,
        page.has_more
    );
    Ok(page)
}

/// Applies status, type and search filters, then truncates to the cursor.
///
/// `records` must already be in feed order.
pub fn project_feed(records: Vec<Notification>, query: &FilterQuery) -> FeedPage {
    let matcher = SearchMatcher::new(&query.search_text);
    let mut items = records
        .into_iter()
        .filter(|record| query.status.matches(record))
        .filter(|record| query.kind.matches(record))
        .filter(|record| matcher.matches(record))
        .collect::<Vec<_>>();

    let total_matched = items.len();
    let visible = usize::try_from(query.display_count).unwrap_or(usize::MAX);
    items.truncate(visible);

    FeedPage {
        items,
        total_matched,
        display_count: query.display_count,
        has_more: visible < total_matched,
    }
}

/// Advances the "load more" cursor by one page step.
pub fn next_display_count(current: u32, step: u32) -> u32 {
    current.saturating_add(step)
}

enum SearchMatcher {
    Everything,
    Pattern(Regex),
    Lowercase(String),
}

impl SearchMatcher {
    fn new(search_text: &str) -> Self {
        if search_text.is_empty() {
            return Self::Everything;
        }

        match RegexBuilder::new(&regex::escape(search_text))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => Self::Pattern(pattern),
            // Escaped input only fails on the compiled size limit.
            Err(_) => Self::Lowercase(search_text.to_lowercase()),
        }
    }

    fn matches(&self, record: &Notification) -> bool {
        match self {
            Self::Everything => true,
            Self::Pattern(pattern) => {
                pattern.is_match(&record.title) || pattern.is_match(&record.message)
            }
            Self::Lowercase(needle) => {
                record.title.to_lowercase().contains(needle.as_str())
                    || record.message.to_lowercase().contains(needle.as_str())
            }
        }
    }
}
