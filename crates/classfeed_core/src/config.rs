//! Runtime tuning for the feed core.
//!
//! # Responsibility
//! - Hold the page step, pending-marker lifetime and store time budget.
//! - Read optional overrides from process environment.
//!
//! # Invariants
//! - Every field has a usable default; bad overrides never abort startup.

use log::warn;
use std::time::Duration;

pub const ENV_PAGE_STEP: &str = "CLASSFEED_PAGE_STEP";
pub const ENV_PENDING_TTL_MS: &str = "CLASSFEED_PENDING_TTL_MS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CLASSFEED_BUSY_TIMEOUT_MS";

const DEFAULT_PAGE_STEP: u32 = 10;
const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(30);
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PENDING_SHARDS: usize = 16;

/// Feed core configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// Increment applied by "load more" to the display cursor.
    pub page_step: u32,
    /// Upper bound on how long a pending mark-read marker blocks retries.
    pub pending_ttl: Duration,
    /// SQLite busy timeout; bounds every blocking store call.
    pub busy_timeout: Duration,
    /// Number of independently locked partitions of the pending arena.
    pub pending_shards: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_step: DEFAULT_PAGE_STEP,
            pending_ttl: DEFAULT_PENDING_TTL,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            pending_shards: DEFAULT_PENDING_SHARDS,
        }
    }
}

impl FeedConfig {
    /// Defaults overlaid with `CLASSFEED_*` environment values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`FeedConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(step) = read_positive(&lookup, ENV_PAGE_STEP) {
            config.page_step = u32::try_from(step).unwrap_or(u32::MAX);
        }
        if let Some(ms) = read_positive(&lookup, ENV_PENDING_TTL_MS) {
            config.pending_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = read_positive(&lookup, ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout = Duration::from_millis(ms);
        }

        config
    }
}

fn read_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!("event=config_override module=config status=ignored key={key} value={trimmed}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FeedConfig, ENV_BUSY_TIMEOUT_MS, ENV_PAGE_STEP, ENV_PENDING_TTL_MS};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let config = FeedConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.page_step, 10);
    }

    #[test]
    fn valid_overrides_are_applied() {
        let config = FeedConfig::from_lookup(lookup_from(&[
            (ENV_PAGE_STEP, "25"),
            (ENV_PENDING_TTL_MS, "1500"),
            (ENV_BUSY_TIMEOUT_MS, " 200 "),
        ]));
        assert_eq!(config.page_step, 25);
        assert_eq!(config.pending_ttl, Duration::from_millis(1500));
        assert_eq!(config.busy_timeout, Duration::from_millis(200));
    }

    #[test]
    fn invalid_overrides_fall_back_to_defaults() {
        let config = FeedConfig::from_lookup(lookup_from(&[
            (ENV_PAGE_STEP, "0"),
            (ENV_PENDING_TTL_MS, "soon"),
            (ENV_BUSY_TIMEOUT_MS, "-4"),
        ]));
        assert_eq!(config, FeedConfig::default());
    }
}
