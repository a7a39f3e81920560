//! Danmaku Quiz core crate.
//!
//! Chinese slang drifts across the screen as clickable bullets. Training mode
//! shows meanings on demand; the battlefield is gated by a context quiz and
//! ends in a two-sided ink barrage.
//!
//! All game logic (lanes, bullets, quiz, battle pacing, ink field) is plain
//! Rust driven by `game::Game` and is testable off the browser. The `web`
//! module owns the DOM, speech and the animation-frame loop.

use wasm_bindgen::prelude::*;

pub mod battle;
pub mod bullets;
pub mod game;
pub mod ink;
pub mod lanes;
pub mod quiz;
pub mod rng;
pub mod timers;
pub mod web;
pub mod words;

pub use game::{Effect, Event, Game, Mode};
pub use rng::Rng;
pub use words::{WordBank, WordEntry};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    // A second init (hot reload) fails harmlessly.
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Load the dataset and mount the game on the page's default mount points.
#[wasm_bindgen]
pub fn start_game() -> Result<(), JsValue> {
    wasm_bindgen_futures::spawn_local(async {
        let words = web::load_words().await;
        if let Err(err) = web::launch(words, &web::Mounts::default()) {
            log::error!("failed to start: {err:?}");
        }
    });
    Ok(())
}

/// Stop the frame loop and drop all game state.
#[wasm_bindgen]
pub fn stop_game() {
    web::shutdown();
}
