//! Transport knobs applied to outgoing requests.
//!
//! [`DispatchOptions`] is an immutable value. Callers pass a
//! [`RequestOptions`] per call and it is merged over the client's defaults
//! for that call only.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of connections opened against the API per second.
pub const CONNECTION_LIMIT: usize = 75;

/// Requests kept in flight by a batch unless overridden.
pub const DEFAULT_CONCURRENCY: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    pub verify_tls: bool,
    /// Log every request and response at info level
    pub debug: bool,
    /// Wait before each request (single sends) or between dispatch starts (batches)
    pub delay_ms: Option<u64>,
    pub concurrency: usize,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            debug: false,
            delay_ms: None,
            concurrency: DEFAULT_CONCURRENCY,
            headers: BTreeMap::new(),
        }
    }
}

impl DispatchOptions {
    /// Shallow override: every field set in `overrides` replaces ours wholesale
    pub fn merged(&self, overrides: &RequestOptions) -> Self {
        Self {
            verify_tls: overrides.verify_tls.unwrap_or(self.verify_tls),
            debug: overrides.debug.unwrap_or(self.debug),
            delay_ms: overrides.delay_ms.or(self.delay_ms),
            concurrency: overrides.concurrency.unwrap_or(self.concurrency),
            headers: overrides
                .headers
                .clone()
                .unwrap_or_else(|| self.headers.clone()),
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    /// Concurrency clamped to what the API tolerates
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, CONNECTION_LIMIT)
    }
}

/// Per-call overrides; unset fields keep the client default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub verify_tls: Option<bool>,
    pub debug: Option<bool>,
    pub delay_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub headers: Option<BTreeMap<String, String>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_verify_tls_without_debug() {
        let options = DispatchOptions::default();
        assert!(options.verify_tls);
        assert!(!options.debug);
        assert_eq!(options.delay(), None);
        assert_eq!(options.effective_concurrency(), DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_merge_overrides_only_set_fields() {
        let defaults = DispatchOptions::default();
        let merged = defaults.merged(&RequestOptions::new().debug(true).delay_ms(20));

        assert!(merged.debug);
        assert!(merged.verify_tls);
        assert_eq!(merged.delay(), Some(Duration::from_millis(20)));
        assert_eq!(merged.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_merge_does_not_touch_defaults() {
        let defaults = DispatchOptions::default();
        let _ = defaults.merged(&RequestOptions::new().verify_tls(false));
        assert_eq!(defaults, DispatchOptions::default());
    }

    #[test]
    fn test_header_override_is_shallow() {
        let mut defaults = DispatchOptions::default();
        defaults.headers.insert("X-Client".to_string(), "sdk".to_string());

        let merged = defaults.merged(&RequestOptions::new().header("X-Trace", "1"));
        assert_eq!(merged.headers.len(), 1);
        assert_eq!(merged.headers.get("X-Trace").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let options = DispatchOptions::default().merged(&RequestOptions::new().concurrency(500));
        assert_eq!(options.effective_concurrency(), CONNECTION_LIMIT);

        let options = DispatchOptions::default().merged(&RequestOptions::new().concurrency(0));
        assert_eq!(options.effective_concurrency(), 1);
    }
}
