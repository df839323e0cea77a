//! Per-target redirect cooldown.

use std::collections::HashMap;

use crate::config::InterceptorConfig;
use crate::types::TargetId;

/// Tracks when each navigation target was last redirected.
///
/// Timestamps are wall-clock milliseconds supplied by the caller.
#[derive(Debug, Clone)]
pub struct RedirectDebouncer {
    window_ms: u64,
    stale_after_ms: u64,
    last_redirect: HashMap<TargetId, u64>,
}

impl RedirectDebouncer {
    pub fn new(config: &InterceptorConfig) -> Self {
        Self {
            window_ms: config.debounce_window_ms,
            stale_after_ms: config.stale_after_ms,
            last_redirect: HashMap::new(),
        }
    }

    /// True if `target` was redirected less than the window ago.
    pub fn should_suppress(&self, target: TargetId, now: u64) -> bool {
        self.last_redirect
            .get(&target)
            .is_some_and(|&at| now.saturating_sub(at) < self.window_ms)
    }

    pub fn record(&mut self, target: TargetId, now: u64) {
        self.last_redirect.insert(target, now);
    }

    /// Evict entries older than the stale threshold. Returns how many were removed.
    pub fn sweep(&mut self, now: u64) -> usize {
        let before = self.last_redirect.len();
        let stale_after = self.stale_after_ms;
        self.last_redirect
            .retain(|_, &mut at| now.saturating_sub(at) <= stale_after);
        before - self.last_redirect.len()
    }

    pub fn len(&self) -> usize {
        self.last_redirect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_redirect.is_empty()
    }
}

impl Default for RedirectDebouncer {
    fn default() -> Self {
        Self::new(&InterceptorConfig::default())
    }
}
