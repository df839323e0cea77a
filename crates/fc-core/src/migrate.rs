//! Persisted-layout migration
//!
//! Older records stored one pattern per rule. Those are grouped by redirect
//! prefix into the current layout, where each rule owns an ordered list of
//! match entries.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{default_true, MatchEntry, Rule, Settings};

/// Error for records that are neither current nor legacy layout.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Settings record is not an object")]
    NotAnObject,
    #[error("Settings field `rules` is not a sequence")]
    RulesNotSequence,
    #[error("Malformed settings record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A single-pattern rule from the old layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub match_url: Option<String>,
    #[serde(default)]
    pub prefix_url: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySettings {
    #[serde(default = "default_true")]
    pub global_enabled: bool,
    #[serde(default)]
    pub rules: Vec<LegacyRule>,
}

/// A stored record, classified by layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSettings {
    Current(Settings),
    Legacy(LegacySettings),
}

impl RawSettings {
    /// Classify a stored value. The record is current layout when `rules` is
    /// absent or empty, or when its first element carries a `matchUrls` array.
    pub fn from_value(mut value: Value) -> Result<Self, MigrationError> {
        let object = value.as_object_mut().ok_or(MigrationError::NotAnObject)?;
        if object.get("rules").is_some_and(Value::is_null) {
            object.remove("rules");
        }
        let is_current = match object.get("rules") {
            None => true,
            Some(Value::Array(rules)) => rules
                .first()
                .map_or(true, |first| first.get("matchUrls").is_some_and(Value::is_array)),
            Some(_) => return Err(MigrationError::RulesNotSequence),
        };

        if is_current {
            Ok(Self::Current(serde_json::from_value(value)?))
        } else {
            Ok(Self::Legacy(serde_json::from_value(value)?))
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Convert to the current layout.
    pub fn into_settings(self) -> Settings {
        match self {
            Self::Current(settings) => settings,
            Self::Legacy(legacy) => group_legacy(legacy),
        }
    }
}

/// Result of migrating a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migrated {
    pub settings: Settings,
    /// The stored layout differed from the current one and should be written back.
    pub changed: bool,
}

/// Migrate a stored value to the current layout.
///
/// Idempotent: migrating the serialized output of a migration is a no-op.
///
/// Rules and match entries stored without an id get a fresh one, which also
/// counts as a change.
pub fn migrate(value: Value) -> Result<Migrated, MigrationError> {
    let raw = RawSettings::from_value(value)?;
    let legacy = raw.is_legacy();
    if legacy {
        log::debug!("migrating legacy settings layout");
    }
    let mut settings = raw.into_settings();
    let repaired = settings.assign_missing_ids();
    if repaired {
        log::debug!("assigned ids to settings entries stored without one");
    }
    Ok(Migrated {
        settings,
        changed: legacy || repaired,
    })
}

/// Group legacy rules by prefix. Groups keep first-seen order, patterns keep
/// scan order, and a group is enabled if any of its members was.
fn group_legacy(legacy: LegacySettings) -> Settings {
    let mut rules: Vec<Rule> = Vec::new();

    for old in legacy.rules {
        let prefix = old.prefix_url.unwrap_or_default();
        let entry = MatchEntry::new(old.match_url.unwrap_or_default());
        let enabled = old.enabled.unwrap_or(false);

        match rules.iter_mut().find(|r| r.prefix_url == prefix) {
            Some(rule) => {
                rule.match_urls.push(entry);
                rule.enabled |= enabled;
            }
            None => rules.push(Rule {
                id: crate::types::new_id(),
                prefix_url: prefix,
                match_urls: vec![entry],
                enabled,
            }),
        }
    }

    Settings {
        global_enabled: legacy.global_enabled,
        rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn patterns(rule: &Rule) -> Vec<&str> {
        rule.match_urls.iter().map(|m| m.pattern.as_str()).collect()
    }

    #[test]
    fn test_groups_by_prefix_with_or_enabled() {
        let raw = json!({
            "globalEnabled": true,
            "rules": [
                { "id": "1", "matchUrl": "a*", "prefixUrl": "P", "enabled": true },
                { "id": "2", "matchUrl": "b*", "prefixUrl": "P", "enabled": false },
            ]
        });

        let migrated = migrate(raw).unwrap();
        assert!(migrated.changed);
        assert_eq!(migrated.settings.rules.len(), 1);
        let rule = &migrated.settings.rules[0];
        assert_eq!(rule.prefix_url, "P");
        assert_eq!(patterns(rule), ["a*", "b*"]);
        assert!(rule.enabled);
        assert_ne!(rule.match_urls[0].id, rule.match_urls[1].id);
    }

    #[test]
    fn test_group_order_is_first_seen() {
        let raw = json!({
            "rules": [
                { "matchUrl": "x", "prefixUrl": "B", "enabled": false },
                { "matchUrl": "y", "prefixUrl": "A", "enabled": false },
                { "matchUrl": "z", "prefixUrl": "B", "enabled": false },
                { "matchUrl": "w" },
            ]
        });

        let settings = migrate(raw).unwrap().settings;
        assert!(settings.global_enabled);
        let prefixes: Vec<_> = settings.rules.iter().map(|r| r.prefix_url.as_str()).collect();
        assert_eq!(prefixes, ["B", "A", ""]);
        assert_eq!(patterns(&settings.rules[0]), ["x", "z"]);
        assert!(settings.rules.iter().all(|r| !r.enabled));
    }

    #[test]
    fn test_legacy_global_flag_preserved() {
        let raw = json!({
            "globalEnabled": false,
            "rules": [{ "matchUrl": "a", "prefixUrl": "P", "enabled": true }]
        });
        assert!(!migrate(raw).unwrap().settings.global_enabled);
    }

    #[test]
    fn test_current_layout_untouched() {
        let raw = json!({
            "globalEnabled": false,
            "rules": [{
                "id": "r1",
                "prefixUrl": "https://p/",
                "enabled": true,
                "matchUrls": [{ "id": "m1", "pattern": "https://a/" }]
            }]
        });

        let migrated = migrate(raw).unwrap();
        assert!(!migrated.changed);
        assert!(!migrated.settings.global_enabled);
        assert_eq!(migrated.settings.rules[0].id, "r1");
        assert_eq!(migrated.settings.rules[0].match_urls[0].id, "m1");
    }

    #[test]
    fn test_empty_rules_is_current() {
        let migrated = migrate(json!({ "globalEnabled": true, "rules": [] })).unwrap();
        assert!(!migrated.changed);
        assert!(migrated.settings.rules.is_empty());

        let migrated = migrate(json!({})).unwrap();
        assert!(!migrated.changed);
        assert!(migrated.settings.global_enabled);
    }

    #[test]
    fn test_idempotent() {
        let raw = json!({
            "rules": [
                { "matchUrl": "a*", "prefixUrl": "P", "enabled": true },
                { "matchUrl": "b*", "prefixUrl": "Q", "enabled": false },
            ]
        });

        let once = migrate(raw).unwrap().settings;
        let twice = migrate(serde_json::to_value(&once).unwrap()).unwrap();
        assert!(!twice.changed);
        assert_eq!(twice.settings, once);
    }

    #[test]
    fn test_missing_ids_are_assigned() {
        let raw = json!({
            "rules": [{
                "prefixUrl": "https://p/",
                "enabled": true,
                "matchUrls": [{ "pattern": "https://a/" }, { "pattern": "https://b/" }]
            }]
        });

        let migrated = migrate(raw).unwrap();
        assert!(migrated.changed);
        let rule = &migrated.settings.rules[0];
        assert!(!rule.id.is_empty());
        assert!(rule.match_urls.iter().all(|m| !m.id.is_empty()));
        assert_ne!(rule.match_urls[0].id, rule.match_urls[1].id);

        let cache = crate::cache::MatcherCache::rebuild(&migrated.settings);
        assert_eq!(cache.len(), 2);

        let again = migrate(serde_json::to_value(&migrated.settings).unwrap()).unwrap();
        assert!(!again.changed);
        assert_eq!(again.settings, migrated.settings);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(migrate(json!([1, 2])), Err(MigrationError::NotAnObject)));
        assert!(matches!(
            migrate(json!({ "rules": "nope" })),
            Err(MigrationError::RulesNotSequence)
        ));
        assert!(matches!(
            migrate(json!({ "rules": [{ "matchUrls": [], "enabled": "yes" }] })),
            Err(MigrationError::Malformed(_))
        ));
    }

    fn legacy_rule() -> impl Strategy<Value = (String, String, bool)> {
        ("[PQR]", "[a-z*.]{0,6}", any::<bool>())
    }

    proptest! {
        #[test]
        fn legacy_migration_groups_and_is_idempotent(
            global in any::<bool>(),
            old in proptest::collection::vec(legacy_rule(), 0..12),
        ) {
            let raw = json!({
                "globalEnabled": global,
                "rules": old.iter().map(|(prefix, pattern, enabled)| json!({
                    "matchUrl": pattern, "prefixUrl": prefix, "enabled": enabled
                })).collect::<Vec<_>>(),
            });

            let once = migrate(raw).unwrap().settings;
            prop_assert_eq!(once.global_enabled, global);

            let mut first_seen: Vec<&str> = Vec::new();
            for (prefix, _, _) in &old {
                if !first_seen.contains(&prefix.as_str()) {
                    first_seen.push(prefix);
                }
            }
            let prefixes: Vec<&str> = once.rules.iter().map(|r| r.prefix_url.as_str()).collect();
            prop_assert_eq!(prefixes, first_seen);

            for rule in &once.rules {
                let members: Vec<_> = old.iter().filter(|(p, _, _)| *p == rule.prefix_url).collect();
                let expected: Vec<&str> = members.iter().map(|(_, m, _)| m.as_str()).collect();
                prop_assert_eq!(patterns(rule), expected);
                prop_assert_eq!(rule.enabled, members.iter().any(|(_, _, e)| *e));
            }

            let twice = migrate(serde_json::to_value(&once).unwrap()).unwrap();
            prop_assert!(!twice.changed);
            prop_assert_eq!(twice.settings, once);
        }
    }
}
