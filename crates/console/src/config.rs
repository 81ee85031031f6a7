#![forbid(unsafe_code)]

use std::time::Duration;

use kanvas_ops::DEFAULT_NOTIFICATION_TTL;
use kanvas_search::SearchConfig;
use kanvas_store::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub search: SearchConfig,
    pub notification_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            search: SearchConfig::default(),
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `KANVAS_*` environment variables.
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    /// Same as [`SessionConfig::from_env`] with an arbitrary source; values
    /// that fail to parse (or are zero where a zero makes no sense) are ignored.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let num = |k: &str| get(k).and_then(|s| s.trim().parse::<u64>().ok()).filter(|v| *v > 0);
        let mut cfg = Self::default();
        if let Some(url) = get("KANVAS_API_URL").map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            cfg.api_url = url;
        }
        if let Some(secs) = num("KANVAS_POLL_SECS") {
            cfg.poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = num("KANVAS_SEARCH_DEBOUNCE_MS") {
            cfg.search.debounce = Duration::from_millis(ms);
        }
        if let Some(n) = num("KANVAS_SEARCH_MIN_CHARS") {
            cfg.search.min_chars = n as usize;
        }
        if let Some(ms) = num("KANVAS_NOTIFY_TTL_MS") {
            cfg.notification_ttl = Duration::from_millis(ms);
        }
        cfg
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_console_behaviour() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.api_url, "http://localhost:5000");
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.search.debounce, Duration::from_millis(500));
        assert_eq!(cfg.search.min_chars, 2);
        assert_eq!(cfg.notification_ttl, Duration::from_secs(6));
    }

    #[test]
    fn env_overrides_and_bad_values_fall_back() {
        let cfg = SessionConfig::from_lookup(lookup(&[
            ("KANVAS_API_URL", " http://docker.lan:8080 "),
            ("KANVAS_POLL_SECS", "30"),
            ("KANVAS_SEARCH_DEBOUNCE_MS", "fast"),
            ("KANVAS_SEARCH_MIN_CHARS", "0"),
            ("KANVAS_NOTIFY_TTL_MS", "1500"),
        ]));
        assert_eq!(cfg.api_url, "http://docker.lan:8080");
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.search.debounce, Duration::from_millis(500));
        assert_eq!(cfg.search.min_chars, 2);
        assert_eq!(cfg.notification_ttl, Duration::from_millis(1500));
    }
}
