//! Built-in bootstrap settings used when nothing is stored yet.

use crate::types::{Rule, Settings};

/// Redirect prefix of the built-in rule.
pub const DEFAULT_PREFIX_URL: &str = "https://freedium-mirror.cfd/";

/// Publishing sites covered by the built-in rule, in priority order.
pub const DEFAULT_MATCH_PATTERNS: &[&str] = &[
    "*.medium.*",
    "https://blog.stackademic.com/",
    "https://towardsdatascience.com/",
    "https://hackernoon.com/",
    "https://levelup.gitconnected.com/",
    "https://betterprogramming.pub/",
    "https://betterhumans.pub/",
    "https://bettermarketing.pub/",
    "https://writingcooperative.com/",
    "https://itnext.io/",
    "https://codeburst.io/",
    "https://infosecwriteups.com/",
    "https://blog.devgenius.io/",
    "https://blog.bitsrc.io/",
    "https://blog.usejournal.com/",
    "https://blog.prototypr.io/",
    "https://uxdesign.cc/",
    "https://uxplanet.org/",
    "https://proandroiddev.com/",
    "https://javascript.plainenglish.io/",
    "https://python.plainenglish.io/",
    "https://aws.plainenglish.io/",
    "https://plainenglish.io/",
    "https://entrepreneurshandbook.co/",
    "https://thebolditalic.com/",
    "https://chatbotslife.com/",
    "https://code.likeagirl.io/",
    "https://byrslf.co/",
    "https://thebelladonnacomedy.com/",
];

/// One enabled rule grouping every default pattern, with fresh ids.
pub fn default_settings() -> Settings {
    Settings {
        global_enabled: true,
        rules: vec![Rule::new(DEFAULT_PREFIX_URL, DEFAULT_MATCH_PATTERNS)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_shape() {
        let settings = default_settings();
        assert!(settings.global_enabled);
        assert_eq!(settings.rules.len(), 1);

        let rule = &settings.rules[0];
        assert!(rule.enabled);
        assert_eq!(rule.prefix_url, DEFAULT_PREFIX_URL);
        assert_eq!(rule.match_urls.len(), DEFAULT_MATCH_PATTERNS.len());
        assert_eq!(rule.match_urls[0].pattern, "*.medium.*");
    }

    #[test]
    fn test_fresh_ids_per_call() {
        let a = default_settings();
        let b = default_settings();
        assert_ne!(a.rules[0].id, b.rules[0].id);
    }
}
