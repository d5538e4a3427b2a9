//! Process settings read from the environment

use crate::chat::DEFAULT_LATENCY_MS;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Runtime settings, independent of the user's saved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Where the user configuration is persisted
    pub config_path: PathBuf,
    /// Upper bound for one HTTP exchange
    pub request_timeout: Duration,
    /// Artificial latency of the simulator, in milliseconds
    pub mock_latency_ms: Range<u64>,
}

impl Settings {
    /// Reads `QUERY_CHAT_CONFIG_PATH`, `QUERY_CHAT_REQUEST_TIMEOUT_SECS` and
    /// `QUERY_CHAT_MOCK_LATENCY_MS` (`min..max` or a single value).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_path = lookup("QUERY_CHAT_CONFIG_PATH")
            .map_or_else(|| default_config_path(lookup("HOME")), PathBuf::from);

        let request_timeout = lookup("QUERY_CHAT_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);

        let mock_latency_ms = lookup("QUERY_CHAT_MOCK_LATENCY_MS")
            .and_then(|v| parse_latency(&v))
            .unwrap_or(DEFAULT_LATENCY_MS);

        Self {
            config_path,
            request_timeout,
            mock_latency_ms,
        }
    }
}

fn default_config_path(home: Option<String>) -> PathBuf {
    let home = home.unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home).join(".query-chat").join("config.json")
}

/// `"500..1500"` or `"0"`
fn parse_latency(value: &str) -> Option<Range<u64>> {
    let value = value.trim();
    match value.split_once("..") {
        Some((min, max)) => {
            let min = min.trim().parse().ok()?;
            let max = max.trim().parse().ok()?;
            (min <= max).then_some(min..max)
        }
        None => {
            let fixed: u64 = value.parse().ok()?;
            Some(fixed..fixed.saturating_add(1))
        }
    }
}
