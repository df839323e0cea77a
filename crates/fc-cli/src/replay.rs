use fc_core::{Decision, Interceptor, InterceptorConfig, NavigationEvent, SettingsSnapshot};

pub struct TraceEvent {
    pub event: NavigationEvent,
    pub timestamp: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub redirects: usize,
    pub debounced: usize,
    pub ignored: usize,
    pub swept: usize,
}

/// Parse a JSONL navigation trace. Lines that are blank, not JSON, or
/// without a URL are skipped.
pub fn parse_trace(text: &str) -> Vec<TraceEvent> {
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(val) => val,
            Err(_) => continue,
        };
        let url = value.get("url").and_then(|v| v.as_str()).unwrap_or("");
        if url.is_empty() {
            continue;
        }
        let tab_id = value.get("tabId").and_then(|v| v.as_i64()).unwrap_or(1);
        let frame_id = value.get("frameId").and_then(|v| v.as_i64()).unwrap_or(0);
        let timestamp = value.get("timestamp").and_then(|v| v.as_u64()).unwrap_or(0);

        out.push(TraceEvent {
            event: NavigationEvent {
                url: url.to_string(),
                target_id: tab_id,
                is_top_level: frame_id == 0,
            },
            timestamp,
        });
    }
    out
}

/// Feed a trace through a fresh interceptor, sweeping on trace time.
/// `report` sees every event with its decision.
pub fn replay(
    snapshot: &SettingsSnapshot,
    trace: &[TraceEvent],
    mut report: impl FnMut(&TraceEvent, &Decision),
) -> ReplayStats {
    let config = InterceptorConfig::default();
    let mut interceptor = Interceptor::new(config);
    let mut stats = ReplayStats::default();
    let mut last_sweep = trace.first().map_or(0, |e| e.timestamp);
    let mut discard = |_: i64, _: &str| {};

    for item in trace {
        if item.timestamp.saturating_sub(last_sweep) >= config.sweep_interval_ms {
            stats.swept += interceptor.sweep(item.timestamp);
            last_sweep = item.timestamp;
        }

        let decision = interceptor.on_navigation(snapshot, &item.event, item.timestamp, &mut discard);
        stats.events += 1;
        match decision {
            Decision::Redirect(_) => stats.redirects += 1,
            Decision::Debounced => stats.debounced += 1,
            _ => stats.ignored += 1,
        }
        report(item, &decision);
    }
    stats
}

pub fn describe(decision: &Decision) -> String {
    match decision {
        Decision::SubFrame => "ignored (sub-frame)".to_string(),
        Decision::Disabled => "ignored (disabled)".to_string(),
        Decision::Debounced => "debounced".to_string(),
        Decision::NoMatch => "no match".to_string(),
        Decision::Redirect(r) => format!("-> {}", r.url),
    }
}
