//! Long-lived interceptor fed from stdin.
//!
//! Each stdin line is a navigation event (`{"url", "tabId", "frameId"}`);
//! each redirect is written to stdout as `{"tabId", "url"}`. The settings
//! file is polled for changes made by other writers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use fc_core::{Interceptor, InterceptorConfig, PersistenceBackend, SettingsStore};

use crate::replay::parse_trace;
use crate::storage::FileBackend;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RedirectCommand<'a> {
    tab_id: i64,
    url: &'a str,
}

pub struct RunOptions {
    pub settings_path: String,
    pub poll_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub async fn run_service(opts: RunOptions) -> Result<(), String> {
    let backend = FileBackend::new(&opts.settings_path);
    let mut store = SettingsStore::new();
    store.subscribe(|snapshot| {
        log::info!(
            "settings v{}: {} rule(s), {} matcher(s)",
            snapshot.version,
            snapshot.settings.rules.len(),
            snapshot.matchers.len()
        );
    });

    let outcome = store.load(&backend).await;
    log::info!("loaded settings from {} ({:?})", backend.path().display(), outcome.source);

    let config = InterceptorConfig::default();
    let mut interceptor = Interceptor::new(config);
    let mut sweep = tokio::time::interval(Duration::from_millis(config.sweep_interval_ms));
    let mut poll = tokio::time::interval(Duration::from_millis(opts.poll_ms.max(1)));
    let mut last_modified = backend.modified().await;
    let key = store.key().to_string();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => return Err(format!("Failed to read stdin: {}", e)),
                };

                let snapshot = store.current();
                let mut commands: Vec<(i64, String)> = Vec::new();
                for item in parse_trace(&line) {
                    let mut sink = |tab_id: i64, url: &str| commands.push((tab_id, url.to_string()));
                    interceptor.on_navigation(&snapshot, &item.event, now_ms(), &mut sink);
                }

                for (tab_id, url) in &commands {
                    let mut out = serde_json::to_string(&RedirectCommand { tab_id: *tab_id, url })
                        .map_err(|e| e.to_string())?;
                    out.push('\n');
                    stdout
                        .write_all(out.as_bytes())
                        .await
                        .map_err(|e| format!("Failed to write stdout: {}", e))?;
                }
                stdout.flush().await.map_err(|e| format!("Failed to write stdout: {}", e))?;
            }
            _ = sweep.tick() => {
                let removed = interceptor.sweep(now_ms());
                if removed > 0 {
                    log::debug!("swept {} debounce entries", removed);
                }
            }
            _ = poll.tick() => {
                let modified = backend.modified().await;
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;
                match backend.get(&key).await {
                    Ok(Some(raw)) => {
                        if let Err(e) = store.on_external_change(raw) {
                            log::warn!("ignoring settings change: {}", e);
                        }
                    }
                    Ok(None) => log::warn!("settings record removed; keeping current settings"),
                    Err(e) => log::warn!("{}", e),
                }
            }
        }
    }

    Ok(())
}
