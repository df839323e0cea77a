//! Navigation interceptor
//!
//! This is the hot path - every top-level navigation goes through here.
//! The decision never blocks and never fails: a rule that cannot be
//! evaluated simply does not match.

use crate::cache::MatcherCache;
use crate::config::InterceptorConfig;
use crate::debounce::RedirectDebouncer;
use crate::store::SettingsSnapshot;
use crate::types::{Decision, NavigationEvent, Redirect, Settings, TargetId};

/// Receiver of redirect commands (the browser's tab update call).
pub trait NavigationSink {
    fn replace_location(&mut self, target: TargetId, url: &str);
}

impl<F: FnMut(TargetId, &str)> NavigationSink for F {
    fn replace_location(&mut self, target: TargetId, url: &str) {
        self(target, url)
    }
}

/// Walk the rules in stored order and return the first redirect that applies.
///
/// Disabled rules are skipped, as is any rule whose prefix the URL already
/// starts with. Within a rule, entries are tried in stored order; entries
/// missing from the cache never match.
pub fn decide(settings: &Settings, matchers: &MatcherCache, url: &str) -> Option<Redirect> {
    for rule in &settings.rules {
        if !rule.enabled {
            continue;
        }

        // Already redirected through this prefix.
        if url.starts_with(&rule.prefix_url) {
            continue;
        }

        for entry in &rule.match_urls {
            let matched = matchers.get(&entry.id).is_some_and(|m| m.test(url));
            if matched {
                let mut target = String::with_capacity(rule.prefix_url.len() + url.len());
                target.push_str(&rule.prefix_url);
                target.push_str(url);
                return Some(Redirect {
                    rule_id: rule.id.clone(),
                    match_id: entry.id.clone(),
                    url: target,
                });
            }
        }
    }
    None
}

/// Per-event control loop: gating, debounce and rule traversal.
#[derive(Debug, Clone, Default)]
pub struct Interceptor {
    config: InterceptorConfig,
    debouncer: RedirectDebouncer,
}

impl Interceptor {
    pub fn new(config: InterceptorConfig) -> Self {
        Self {
            debouncer: RedirectDebouncer::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn debouncer(&self) -> &RedirectDebouncer {
        &self.debouncer
    }

    /// Process one navigation event against a settings snapshot.
    ///
    /// Issues at most one `replace_location` and records at most one
    /// debounce timestamp.
    pub fn on_navigation<S: NavigationSink + ?Sized>(
        &mut self,
        snapshot: &SettingsSnapshot,
        event: &NavigationEvent,
        now: u64,
        sink: &mut S,
    ) -> Decision {
        if !event.is_top_level {
            return Decision::SubFrame;
        }
        if !snapshot.settings.global_enabled {
            return Decision::Disabled;
        }
        if self.debouncer.should_suppress(event.target_id, now) {
            log::debug!("target {} redirected recently, skipping", event.target_id);
            return Decision::Debounced;
        }

        match decide(&snapshot.settings, &snapshot.matchers, &event.url) {
            Some(redirect) => {
                log::debug!(
                    "redirecting target {} via rule {}: {} -> {}",
                    event.target_id,
                    redirect.rule_id,
                    event.url,
                    redirect.url
                );
                self.debouncer.record(event.target_id, now);
                sink.replace_location(event.target_id, &redirect.url);
                Decision::Redirect(redirect)
            }
            None => Decision::NoMatch,
        }
    }

    /// Drop stale debounce entries. Hosts call this every `sweep_interval_ms`.
    pub fn sweep(&mut self, now: u64) -> usize {
        self.debouncer.sweep(now)
    }
}
