//! Matcher cache keyed by match entry id.

use std::collections::HashMap;

use crate::pattern::{compile, Matcher};
use crate::types::Settings;

/// Compiled matchers for every match entry of a settings value.
///
/// Always rebuilt from scratch; a cache is a pure function of the settings
/// it was built from.
#[derive(Debug, Clone, Default)]
pub struct MatcherCache {
    matchers: HashMap<String, Matcher>,
    failed: usize,
}

impl MatcherCache {
    /// Compile every entry of every rule, enabled or not. Entries whose
    /// pattern fails to compile are left out.
    pub fn rebuild(settings: &Settings) -> Self {
        let mut cache = Self::default();
        for rule in &settings.rules {
            for entry in &rule.match_urls {
                match compile(&entry.pattern) {
                    Ok(matcher) => {
                        cache.matchers.insert(entry.id.clone(), matcher);
                    }
                    Err(e) => {
                        log::warn!("skipping match entry {} in rule {}: {}", entry.id, rule.id, e);
                        cache.failed += 1;
                    }
                }
            }
        }
        log::debug!(
            "matcher cache rebuilt: {} compiled, {} skipped",
            cache.matchers.len(),
            cache.failed
        );
        cache
    }

    #[inline]
    pub fn get(&self, match_id: &str) -> Option<&Matcher> {
        self.matchers.get(match_id)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Number of entries dropped because their pattern failed to compile.
    pub fn failed(&self) -> usize {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rule;

    #[test]
    fn test_includes_disabled_rules() {
        let mut disabled = Rule::new("https://d/", &["x*"]);
        disabled.enabled = false;
        let settings = Settings {
            global_enabled: true,
            rules: vec![Rule::new("https://p/", &["a", "b"]), disabled],
        };

        let cache = MatcherCache::rebuild(&settings);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.failed(), 0);
        for rule in &settings.rules {
            for entry in &rule.match_urls {
                assert!(cache.get(&entry.id).is_some());
            }
        }
    }

    #[test]
    fn test_pathological_pattern_is_skipped() {
        // Exceeds the regex size limit once compiled.
        let huge = "a*".repeat(300_000);
        let rule = Rule::new("https://p/", &[huge.as_str(), "https://ok/"]);
        let ok_id = rule.match_urls[1].id.clone();
        let bad_id = rule.match_urls[0].id.clone();
        let settings = Settings {
            global_enabled: true,
            rules: vec![rule],
        };

        let cache = MatcherCache::rebuild(&settings);
        assert!(cache.get(&bad_id).is_none());
        assert!(cache.get(&ok_id).unwrap().test("https://ok/page"));
        assert_eq!(cache.failed(), 1);
    }

    #[test]
    fn test_empty_settings() {
        let cache = MatcherCache::rebuild(&Settings::default());
        assert!(cache.is_empty());
    }
}
