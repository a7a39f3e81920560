//! Battle timeline: paired bullets from both edges, then fade to black.
//!
//! Everything is measured from the entry time `t0`:
//! - `[t0, t0 + 2.6s)`: every frame spawns a left/right pair (plus an extra
//!   bullet on every second frame) while under the live cap
//! - `t0 + 2s`: darkening overlay starts fading in
//! - `t0 + 5s`: terminal message fades in

use crate::bullets::{BATTLE_MAX_BULLETS, Side};
use crate::rng::Rng;

pub const SPAWN_WINDOW_MS: f64 = 2600.0;
pub const OVERLAY_AT_MS: f64 = 2000.0;
pub const MESSAGE_AT_MS: f64 = 5000.0;
/// Independent vertical jitter for the two bullets of a pair.
pub const PAIR_JITTER: f64 = 8.0;
/// Fraction of the height excluded at both top and bottom.
pub const VERTICAL_MARGIN: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnOrder {
    pub side: Side,
    pub y: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BattleFrame {
    pub spawns: Vec<SpawnOrder>,
    pub reveal_overlay: bool,
    pub reveal_message: bool,
}

/// Vertical position inside the middle band of the field.
pub fn sample_y(height: f64, rng: &mut Rng) -> f64 {
    let margin = height * VERTICAL_MARGIN;
    let y = margin + rng.next_f64() * (height - margin * 2.0);
    y.min(height - 10.0).max(0.0)
}

#[derive(Debug)]
pub struct BattleSequencer {
    t0: f64,
    frame_tick: u64,
    next_extra: Side,
    overlay_shown: bool,
    message_shown: bool,
}

impl BattleSequencer {
    pub fn new(t0: f64) -> Self {
        Self {
            t0,
            frame_tick: 0,
            next_extra: Side::Left,
            overlay_shown: false,
            message_shown: false,
        }
    }

    pub fn started_at(&self) -> f64 {
        self.t0
    }

    pub fn is_spawning(&self, now: f64) -> bool {
        now - self.t0 < SPAWN_WINDOW_MS
    }

    pub fn is_finished(&self) -> bool {
        self.message_shown
    }

    /// One animation frame of the timeline. `live` is the current number of
    /// battle bullets; spawn orders are still subject to the cap individually.
    pub fn tick(&mut self, now: f64, live: usize, height: f64, rng: &mut Rng) -> BattleFrame {
        let mut frame = BattleFrame::default();
        let elapsed = now - self.t0;

        if self.is_spawning(now) && live < BATTLE_MAX_BULLETS {
            let y = sample_y(height, rng);
            frame.spawns.push(SpawnOrder {
                side: Side::Left,
                y: y + rng.range_f64(-PAIR_JITTER, PAIR_JITTER),
            });
            frame.spawns.push(SpawnOrder {
                side: Side::Right,
                y: y + rng.range_f64(-PAIR_JITTER, PAIR_JITTER),
            });

            self.frame_tick += 1;
            if self.frame_tick % 2 == 0 {
                let side = self.next_extra;
                self.next_extra = side.flip();
                frame.spawns.push(SpawnOrder {
                    side,
                    y: sample_y(height, rng),
                });
            }
        }

        if !self.overlay_shown && elapsed >= OVERLAY_AT_MS {
            self.overlay_shown = true;
            frame.reveal_overlay = true;
        }
        if !self.message_shown && elapsed >= MESSAGE_AT_MS {
            self.message_shown = true;
            frame.reveal_message = true;
        }
        frame
    }
}
