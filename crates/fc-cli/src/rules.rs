use clap::{Subcommand, ValueEnum};

use fc_core::{EditError, EditOp, LoadSource, Settings, SettingsStore};

use crate::storage::FileBackend;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// Print all rules
    List,

    /// Append a rule group
    AddRule {
        /// Redirect prefix
        #[arg(long, default_value = "")]
        prefix: String,

        /// Match pattern (repeatable)
        #[arg(long = "match")]
        patterns: Vec<String>,
    },

    /// Delete a rule group
    RemoveRule { rule_id: String },

    /// Enable or disable a rule group
    Toggle { rule_id: String, state: Switch },

    /// Change a rule's redirect prefix
    SetPrefix { rule_id: String, prefix: String },

    /// Append a match pattern to a rule
    AddMatch { rule_id: String, pattern: String },

    /// Change one match pattern
    SetPattern {
        rule_id: String,
        match_id: String,
        pattern: String,
    },

    /// Delete one match pattern
    RemoveMatch { rule_id: String, match_id: String },

    /// Move a match pattern to another pattern's position
    MoveMatch {
        rule_id: String,
        dragged_id: String,
        target_id: String,
    },

    /// Turn all redirects on or off
    Global { state: Switch },
}

impl RulesAction {
    fn into_op(self) -> Option<EditOp> {
        let op = match self {
            RulesAction::List | RulesAction::AddRule { .. } => return None,
            RulesAction::RemoveRule { rule_id } => EditOp::RemoveRule { rule_id },
            RulesAction::Toggle { rule_id, state } => EditOp::SetRuleEnabled {
                rule_id,
                enabled: matches!(state, Switch::On),
            },
            RulesAction::SetPrefix { rule_id, prefix } => EditOp::SetPrefix {
                rule_id,
                prefix_url: prefix,
            },
            RulesAction::AddMatch { rule_id, pattern } => EditOp::AddMatch { rule_id, pattern },
            RulesAction::SetPattern {
                rule_id,
                match_id,
                pattern,
            } => EditOp::SetPattern {
                rule_id,
                match_id,
                pattern,
            },
            RulesAction::RemoveMatch { rule_id, match_id } => {
                EditOp::RemoveMatch { rule_id, match_id }
            }
            RulesAction::MoveMatch {
                rule_id,
                dragged_id,
                target_id,
            } => EditOp::MoveMatch {
                rule_id,
                dragged_id,
                target_id,
            },
            RulesAction::Global { state } => EditOp::SetGlobalEnabled {
                enabled: matches!(state, Switch::On),
            },
        };
        Some(op)
    }
}

pub async fn cmd_rules(settings_path: &str, action: RulesAction) -> Result<(), String> {
    let backend = FileBackend::new(settings_path);
    let mut store = SettingsStore::new();
    let outcome = store.load(&backend).await;

    if let RulesAction::List = action {
        print!("{}", format_settings(store.settings()));
        return Ok(());
    }
    if outcome.source == LoadSource::Unreadable {
        return Err(format!(
            "Stored settings in '{}' are unreadable; refusing to overwrite them",
            settings_path
        ));
    }

    let created = match action {
        RulesAction::AddRule { prefix, patterns } => store
            .edit(|settings| add_rule_group(settings, &prefix, &patterns))
            .map(Some),
        other => {
            let op = other.into_op().ok_or("Unsupported rules action")?;
            store.edit(|settings| settings.apply(&op))
        }
    }
    .map_err(|e| e.to_string())?;

    store
        .persist(&backend)
        .await
        .map_err(|e| e.to_string())?;

    if let Some(id) = created {
        println!("{}", id);
    }
    Ok(())
}

/// Add a rule the way the editor does, then fill in its prefix and patterns.
fn add_rule_group(settings: &mut Settings, prefix: &str, patterns: &[String]) -> Result<String, EditError> {
    let rule_id = settings.add_rule();
    settings.set_prefix(&rule_id, prefix)?;
    if let Some((first, rest)) = patterns.split_first() {
        let first_id = settings.rule(&rule_id).map(|r| r.match_urls[0].id.clone());
        if let Some(first_id) = first_id {
            settings.set_pattern(&rule_id, &first_id, first)?;
        }
        for pattern in rest {
            settings.add_match(&rule_id, pattern)?;
        }
    }
    Ok(rule_id)
}

pub fn format_settings(settings: &Settings) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Global:  {}\n",
        if settings.global_enabled { "enabled" } else { "disabled" }
    ));
    if settings.rules.is_empty() {
        out.push_str("No rules\n");
    }
    for (idx, rule) in settings.rules.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!(
            "Rule {} [{}]  {}\n",
            idx + 1,
            if rule.enabled { "on" } else { "off" },
            rule.id
        ));
        out.push_str(&format!("  Prefix:  {}\n", rule.prefix_url));
        for (n, entry) in rule.match_urls.iter().enumerate() {
            let pattern = if entry.pattern.is_empty() { "(empty)" } else { &entry.pattern };
            out.push_str(&format!("  {:>3}. {}  {}\n", n + 1, pattern, entry.id));
        }
    }
    out
}
