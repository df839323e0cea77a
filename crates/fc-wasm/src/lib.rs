//! WebAssembly bindings for FreeCfd
//!
//! The extension's background script owns `chrome.storage` and the
//! navigation listener; it hands raw JSON records and navigation details to
//! these functions and acts on what they return.

use std::cell::RefCell;

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use fc_core::{
    default_settings, decide, EditOp, Interceptor, InterceptorConfig, LoadSource, NavigationEvent,
    Settings, SettingsStore,
};

mod console;

struct EngineState {
    store: SettingsStore,
    interceptor: Interceptor,
}

impl EngineState {
    fn new() -> Self {
        Self {
            store: SettingsStore::new(),
            interceptor: Interceptor::new(InterceptorConfig::default()),
        }
    }
}

thread_local! {
    static STATE: RefCell<EngineState> = RefCell::new(EngineState::new());
}

#[derive(Serialize)]
struct LoadResponse<'a> {
    settings: &'a Settings,
    source: &'static str,
    persist: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditResponse<'a> {
    settings: &'a Settings,
    created_id: Option<String>,
}

#[wasm_bindgen(start)]
pub fn start() {
    console::init(log::LevelFilter::Info);
}

/// Change console log verbosity ("error", "warn", "info", "debug", "trace").
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter: log::LevelFilter = level
        .parse()
        .map_err(|_| JsValue::from_str(&format!("Unknown log level: {}", level)))?;
    log::set_max_level(filter);
    Ok(())
}

/// Install the stored record (or `undefined` if nothing is stored).
///
/// Returns `{ settings, source, persist }`; when `persist` is true the host
/// should write `settings` back under the storage key.
#[wasm_bindgen]
pub fn load_settings(raw_json: Option<String>) -> Result<String, JsValue> {
    load_settings_inner(raw_json.as_deref()).map_err(|e| JsValue::from_str(&e))
}

/// Storage change notification for the settings key.
#[wasm_bindgen]
pub fn on_settings_changed(raw_json: &str) -> Result<(), JsValue> {
    settings_changed_inner(raw_json).map_err(|e| JsValue::from_str(&e))
}

/// Decide a navigation. Returns the URL the host must navigate the tab to,
/// or `undefined` to let it proceed. Frame 0 is the top-level document.
#[wasm_bindgen]
pub fn on_before_navigate(url: &str, tab_id: i32, frame_id: i32) -> Option<String> {
    let now = js_sys::Date::now() as u64;
    navigate_inner(url, tab_id, frame_id, now)
}

/// Debounce garbage collection; call from `setInterval`.
#[wasm_bindgen]
pub fn sweep_redirects() -> u32 {
    let now = js_sys::Date::now() as u64;
    STATE.with(|state| state.borrow_mut().interceptor.sweep(now) as u32)
}

/// Interval at which the host should call `sweep_redirects`, in milliseconds.
#[wasm_bindgen]
pub fn sweep_interval_ms() -> u32 {
    InterceptorConfig::default().sweep_interval_ms as u32
}

/// Apply one settings edit (`{ "op": "...", ... }`) and return
/// `{ settings, createdId }` for the host to persist.
#[wasm_bindgen]
pub fn apply_edit(op_json: &str) -> Result<String, JsValue> {
    apply_edit_inner(op_json).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn current_settings() -> String {
    STATE.with(|state| to_json(state.borrow().store.settings()))
}

#[wasm_bindgen(js_name = default_settings)]
pub fn default_settings_json() -> String {
    to_json(&default_settings())
}

/// Redirect target for `url` under the current settings, ignoring debounce.
#[wasm_bindgen]
pub fn preview_redirect(url: &str) -> Option<String> {
    STATE.with(|state| {
        let snapshot = state.borrow().store.current();
        decide(&snapshot.settings, &snapshot.matchers, url).map(|r| r.url)
    })
}

#[wasm_bindgen]
pub fn storage_key() -> String {
    fc_core::STORAGE_KEY.to_string()
}

// =============================================================================
// Host-independent implementations
// =============================================================================

fn load_settings_inner(raw_json: Option<&str>) -> Result<String, String> {
    let raw = raw_json.map(parse_json).transpose()?;
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let outcome = state.store.ingest(raw);
        let response = LoadResponse {
            settings: &outcome.snapshot.settings,
            source: match outcome.source {
                LoadSource::Defaults => "defaults",
                LoadSource::Stored => "stored",
                LoadSource::Migrated => "migrated",
                LoadSource::Unreadable => "unreadable",
            },
            persist: outcome.needs_persist(),
        };
        Ok(to_json(&response))
    })
}

fn settings_changed_inner(raw_json: &str) -> Result<(), String> {
    let raw = parse_json(raw_json)?;
    STATE.with(|state| {
        state
            .borrow_mut()
            .store
            .on_external_change(raw)
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
}

fn navigate_inner(url: &str, tab_id: i32, frame_id: i32, now: u64) -> Option<String> {
    let event = NavigationEvent {
        url: url.to_string(),
        target_id: i64::from(tab_id),
        is_top_level: frame_id == 0,
    };
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let snapshot = state.store.current();
        let mut target = None;
        let mut sink = |_: i64, redirect: &str| target = Some(redirect.to_string());
        state
            .interceptor
            .on_navigation(&snapshot, &event, now, &mut sink);
        target
    })
}

fn apply_edit_inner(op_json: &str) -> Result<String, String> {
    let op: EditOp = serde_json::from_str(op_json).map_err(|e| format!("Invalid edit: {}", e))?;
    STATE.with(|state| {
        let mut state = state.borrow_mut();
        let created_id = state
            .store
            .edit(|settings| settings.apply(&op))
            .map_err(|e| e.to_string())?;
        let snapshot = state.store.current();
        Ok(to_json(&EditResponse {
            settings: &snapshot.settings,
            created_id,
        }))
    })
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| format!("Invalid JSON: {}", e))
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}
