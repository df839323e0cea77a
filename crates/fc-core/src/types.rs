//! Core type definitions for FreeCfd
//!
//! These types map directly to the persisted settings record and are used
//! throughout the redirect engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Generate a fresh opaque identifier (UUID v4 string).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Settings
// =============================================================================

/// One wildcard pattern inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pattern: String,
}

impl MatchEntry {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            pattern: pattern.into(),
        }
    }
}

/// A group of match patterns sharing one redirect prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub prefix_url: String,
    /// Priority order: first matching entry wins.
    #[serde(default)]
    pub match_urls: Vec<MatchEntry>,
    #[serde(default)]
    pub enabled: bool,
}

impl Rule {
    pub fn new(prefix_url: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            id: new_id(),
            prefix_url: prefix_url.into(),
            match_urls: patterns.iter().map(|p| MatchEntry::new(*p)).collect(),
            enabled: true,
        }
    }

    fn entry_index(&self, match_id: &str) -> Result<usize, EditError> {
        self.match_urls
            .iter()
            .position(|m| m.id == match_id)
            .ok_or_else(|| EditError::UnknownMatch(match_id.to_string()))
    }
}

/// The full user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub global_enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

pub(crate) fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_enabled: true,
            rules: Vec::new(),
        }
    }
}

// =============================================================================
// Editing operations
// =============================================================================

/// Error for edits that reference ids not present in the settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("No rule with id {0}")]
    UnknownRule(String),
    #[error("No match entry with id {0}")]
    UnknownMatch(String),
}

impl Settings {
    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    fn rule_mut(&mut self, rule_id: &str) -> Result<&mut Rule, EditError> {
        self.rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| EditError::UnknownRule(rule_id.to_string()))
    }

    /// Give every rule and match entry with an empty id a fresh one.
    /// Returns whether anything changed.
    pub fn assign_missing_ids(&mut self) -> bool {
        let mut changed = false;
        for rule in &mut self.rules {
            if rule.id.is_empty() {
                rule.id = new_id();
                changed = true;
            }
            for entry in rule.match_urls.iter_mut().filter(|m| m.id.is_empty()) {
                entry.id = new_id();
                changed = true;
            }
        }
        changed
    }

    pub fn set_global_enabled(&mut self, enabled: bool) {
        self.global_enabled = enabled;
    }

    /// Append an enabled rule with an empty prefix and one empty match entry.
    /// Returns the new rule's id.
    pub fn add_rule(&mut self) -> String {
        let rule = Rule::new("", &[""]);
        let id = rule.id.clone();
        self.rules.push(rule);
        id
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> Result<Rule, EditError> {
        let idx = self
            .rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or_else(|| EditError::UnknownRule(rule_id.to_string()))?;
        Ok(self.rules.remove(idx))
    }

    pub fn set_rule_enabled(&mut self, rule_id: &str, enabled: bool) -> Result<(), EditError> {
        self.rule_mut(rule_id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_prefix(&mut self, rule_id: &str, prefix_url: &str) -> Result<(), EditError> {
        self.rule_mut(rule_id)?.prefix_url = prefix_url.to_string();
        Ok(())
    }

    /// Append a match entry to a rule. Returns the new entry's id.
    pub fn add_match(&mut self, rule_id: &str, pattern: &str) -> Result<String, EditError> {
        let entry = MatchEntry::new(pattern);
        let id = entry.id.clone();
        self.rule_mut(rule_id)?.match_urls.push(entry);
        Ok(id)
    }

    pub fn set_pattern(
        &mut self,
        rule_id: &str,
        match_id: &str,
        pattern: &str,
    ) -> Result<(), EditError> {
        let rule = self.rule_mut(rule_id)?;
        let idx = rule.entry_index(match_id)?;
        rule.match_urls[idx].pattern = pattern.to_string();
        Ok(())
    }

    pub fn remove_match(&mut self, rule_id: &str, match_id: &str) -> Result<MatchEntry, EditError> {
        let rule = self.rule_mut(rule_id)?;
        let idx = rule.entry_index(match_id)?;
        Ok(rule.match_urls.remove(idx))
    }

    /// Drag-reorder: take `dragged_id` out and reinsert it at the index
    /// `target_id` occupied before the move.
    pub fn move_match(
        &mut self,
        rule_id: &str,
        dragged_id: &str,
        target_id: &str,
    ) -> Result<(), EditError> {
        let rule = self.rule_mut(rule_id)?;
        let from = rule.entry_index(dragged_id)?;
        let to = rule.entry_index(target_id)?;
        if from == to {
            return Ok(());
        }
        let moved = rule.match_urls.remove(from);
        rule.match_urls.insert(to, moved);
        Ok(())
    }
}

/// One settings edit, as sent by the settings editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EditOp {
    SetGlobalEnabled {
        enabled: bool,
    },
    AddRule,
    #[serde(rename_all = "camelCase")]
    RemoveRule { rule_id: String },
    #[serde(rename_all = "camelCase")]
    SetRuleEnabled { rule_id: String, enabled: bool },
    #[serde(rename_all = "camelCase")]
    SetPrefix { rule_id: String, prefix_url: String },
    #[serde(rename_all = "camelCase")]
    AddMatch { rule_id: String, pattern: String },
    #[serde(rename_all = "camelCase")]
    SetPattern {
        rule_id: String,
        match_id: String,
        pattern: String,
    },
    #[serde(rename_all = "camelCase")]
    RemoveMatch { rule_id: String, match_id: String },
    #[serde(rename_all = "camelCase")]
    MoveMatch {
        rule_id: String,
        dragged_id: String,
        target_id: String,
    },
}

impl Settings {
    /// Apply one edit. Returns the id of a created rule or match entry.
    pub fn apply(&mut self, op: &EditOp) -> Result<Option<String>, EditError> {
        match op {
            EditOp::SetGlobalEnabled { enabled } => self.set_global_enabled(*enabled),
            EditOp::AddRule => return Ok(Some(self.add_rule())),
            EditOp::RemoveRule { rule_id } => {
                self.remove_rule(rule_id)?;
            }
            EditOp::SetRuleEnabled { rule_id, enabled } => self.set_rule_enabled(rule_id, *enabled)?,
            EditOp::SetPrefix { rule_id, prefix_url } => self.set_prefix(rule_id, prefix_url)?,
            EditOp::AddMatch { rule_id, pattern } => return self.add_match(rule_id, pattern).map(Some),
            EditOp::SetPattern {
                rule_id,
                match_id,
                pattern,
            } => self.set_pattern(rule_id, match_id, pattern)?,
            EditOp::RemoveMatch { rule_id, match_id } => {
                self.remove_match(rule_id, match_id)?;
            }
            EditOp::MoveMatch {
                rule_id,
                dragged_id,
                target_id,
            } => self.move_match(rule_id, dragged_id, target_id)?,
        }
        Ok(None)
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Host-specific navigation target (tab id in a browser).
pub type TargetId = i64;

/// A navigation about to happen, as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub url: String,
    pub target_id: TargetId,
    /// Main document frame (not an iframe).
    pub is_top_level: bool,
}

/// A redirect chosen by the rule traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub rule_id: String,
    pub match_id: String,
    pub url: String,
}

/// Outcome of processing one navigation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sub-frame navigations are never redirected.
    SubFrame,
    /// Global switch is off.
    Disabled,
    /// Target was redirected within the debounce window.
    Debounced,
    NoMatch,
    Redirect(Redirect),
}

impl Decision {
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Decision::Redirect(r) => Some(&r.url),
            _ => None,
        }
    }
}
