//! FreeCfd CLI
//!
//! CLI tool for inspecting, migrating and editing redirect settings, and for
//! driving the interceptor outside the browser.

mod replay;
mod rules;
mod run;
mod storage;

use std::fs;

use clap::{Parser, Subcommand};

use fc_core::{
    decide, default_settings, migrate, PersistenceBackend, SettingsSnapshot, SettingsStore,
};

use crate::rules::RulesAction;
use crate::storage::FileBackend;

#[derive(Parser)]
#[command(name = "fc-cli")]
#[command(about = "FreeCfd redirect settings and interceptor tools")]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the built-in default settings record
    Defaults {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Migrate a stored settings record to the current layout
    Migrate {
        /// File holding the raw record
        #[arg(short, long)]
        input: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show where URLs would be redirected
    Check {
        /// Settings file
        #[arg(short, long)]
        settings: String,

        /// URL to test (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
    },

    /// Replay a JSONL navigation trace through the interceptor
    Replay {
        /// Settings file
        #[arg(short, long)]
        settings: String,

        /// Trace file (one {"url","tabId","frameId","timestamp"} per line)
        #[arg(short, long)]
        events: String,
    },

    /// Edit rules in a settings file
    Rules {
        /// Settings file
        #[arg(short, long)]
        settings: String,

        #[command(subcommand)]
        action: RulesAction,
    },

    /// Run the interceptor on navigation events read from stdin
    Run {
        /// Settings file
        #[arg(short, long)]
        settings: String,

        /// Settings file poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))
        .and_then(|runtime| runtime.block_on(dispatch(cli.command)));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> Result<(), String> {
    match command {
        Commands::Defaults { output } => cmd_defaults(output.as_deref()),
        Commands::Migrate { input, output } => cmd_migrate(&input, output.as_deref()),
        Commands::Check { settings, urls } => cmd_check(&settings, &urls).await,
        Commands::Replay { settings, events } => cmd_replay(&settings, &events).await,
        Commands::Rules { settings, action } => rules::cmd_rules(&settings, action).await,
        Commands::Run { settings, poll_ms } => {
            run::run_service(run::RunOptions {
                settings_path: settings,
                poll_ms,
            })
            .await
        }
    }
}

fn write_output(output: Option<&str>, text: &str) -> Result<(), String> {
    match output {
        Some(path) => fs::write(path, format!("{}\n", text))
            .map_err(|e| format!("Failed to write '{}': {}", path, e)),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn cmd_defaults(output: Option<&str>) -> Result<(), String> {
    let text = serde_json::to_string_pretty(&default_settings()).map_err(|e| e.to_string())?;
    write_output(output, &text)
}

fn cmd_migrate(input: &str, output: Option<&str>) -> Result<(), String> {
    let text = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input, e))?;
    let raw: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid JSON in '{}': {}", input, e))?;

    let migrated = migrate(raw).map_err(|e| e.to_string())?;
    eprintln!(
        "{}: {} rule(s), {}",
        input,
        migrated.settings.rules.len(),
        if migrated.changed { "migrated from legacy layout" } else { "already current" }
    );

    let text = serde_json::to_string_pretty(&migrated.settings).map_err(|e| e.to_string())?;
    write_output(output, &text)
}

/// Read-only load: never writes defaults or migrations back.
async fn load_read_only(settings_path: &str) -> Result<SettingsStore, String> {
    let backend = FileBackend::new(settings_path);
    let mut store = SettingsStore::new();
    let raw = backend.get(store.key()).await.map_err(|e| e.to_string())?;
    let outcome = store.ingest(raw);
    log::debug!("settings source: {:?}", outcome.source);
    Ok(store)
}

async fn cmd_check(settings_path: &str, urls: &[String]) -> Result<(), String> {
    let store = load_read_only(settings_path).await?;
    print!("{}", format_check(&store.current(), urls));
    Ok(())
}

fn format_check(snapshot: &SettingsSnapshot, urls: &[String]) -> String {
    let mut out = String::new();
    if !snapshot.settings.global_enabled {
        out.push_str("Redirects are globally disabled\n");
    }
    for url in urls {
        out.push_str(url);
        out.push('\n');
        if !snapshot.settings.global_enabled {
            out.push_str("  (no redirect: disabled)\n");
            continue;
        }
        match decide(&snapshot.settings, &snapshot.matchers, url) {
            Some(redirect) => out.push_str(&format!("  -> {}\n", redirect.url)),
            None => out.push_str("  (no redirect)\n"),
        }
    }
    out
}

async fn cmd_replay(settings_path: &str, events_path: &str) -> Result<(), String> {
    let store = load_read_only(settings_path).await?;
    let text = fs::read_to_string(events_path)
        .map_err(|e| format!("Failed to read trace '{}': {}", events_path, e))?;
    let trace = replay::parse_trace(&text);
    if trace.is_empty() {
        return Err(format!("Trace loaded 0 events from {}", events_path));
    }

    let stats = replay::replay(&store.current(), &trace, |item, decision| {
        println!(
            "[{:>8}] tab {:<4} {} {}",
            item.timestamp,
            item.event.target_id,
            item.event.url,
            replay::describe(decision)
        );
    });

    println!();
    println!("Events:     {}", stats.events);
    println!("Redirects:  {}", stats.redirects);
    println!("Debounced:  {}", stats.debounced);
    println!("Ignored:    {}", stats.ignored);
    println!("Swept:      {}", stats.swept);
    Ok(())
}
