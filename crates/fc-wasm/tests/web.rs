//! Browser tests; run with `wasm-pack test --headless --firefox crates/fc-wasm`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use fc_wasm::{load_settings, on_before_navigate, on_settings_changed, sweep_redirects};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn redirects_top_level_navigation_once() {
    load_settings(None).unwrap();

    let target = on_before_navigate("https://foo.medium.com/article", 7, 0);
    assert_eq!(
        target.as_deref(),
        Some("https://freedium-mirror.cfd/https://foo.medium.com/article")
    );
    assert_eq!(on_before_navigate("https://foo.medium.com/article", 7, 0), None);
    assert_eq!(on_before_navigate("https://foo.medium.com/other", 8, 3), None);
    assert_eq!(sweep_redirects(), 0);
}

#[wasm_bindgen_test]
fn global_switch_stops_redirects() {
    load_settings(None).unwrap();
    on_settings_changed(r#"{"globalEnabled":false,"rules":[]}"#).unwrap();
    assert_eq!(on_before_navigate("https://foo.medium.com/article", 9, 0), None);
}
