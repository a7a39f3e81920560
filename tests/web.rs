// Browser-side smoke tests for the DOM adapter.
// Run with `wasm-pack test --headless --chrome`.
#![cfg(target_arch = "wasm32")]

use danmaku_quiz::WordBank;
use danmaku_quiz::web::{self, Mounts};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn launch_creates_missing_field_and_shuts_down() {
    let doc = web_sys::window().unwrap().document().unwrap();
    assert!(doc.get_element_by_id("danmaku").is_none());

    web::launch(WordBank::fallback(), &Mounts::default()).unwrap();
    assert!(doc.get_element_by_id("danmaku").is_some());

    web::shutdown();
    // A second launch after shutdown reuses the field.
    web::launch(WordBank::fallback(), &Mounts::default()).unwrap();
    web::shutdown();
}

#[wasm_bindgen_test]
fn custom_mount_ids_are_honoured() {
    let doc = web_sys::window().unwrap().document().unwrap();
    let mounts = Mounts {
        field: "customField",
        ..Mounts::default()
    };
    web::launch(WordBank::fallback(), &mounts).unwrap();
    assert!(doc.get_element_by_id("customField").is_some());
    web::shutdown();
}
