//! Ink bleed where left and right battle bullets cross.
//!
//! Each frame the simulator pairs (subsampled) left-origin and right-origin
//! bullet centers. Close pairs pump energy into a coarse grid cell; cells
//! that stop receiving pairs decay and disappear. Rendering is a list of
//! translucent discs for the canvas adapter.

use std::collections::HashMap;

use crate::bullets::{Bullet, DEFAULT_FONT_PX};

pub const CELL_SIZE: f64 = 28.0;
pub const GROW_PER_FRAME: f64 = 0.10;
pub const DECAY_PER_FRAME: f64 = 0.025;
pub const MAX_ENERGY: f64 = 1.0;
pub const GROW_MULTIPLIER: f64 = 2.2;
pub const CELLS_DRAW_LIMIT: usize = 120;
/// Per-side cap on bullets considered for pairing.
pub const SAMPLE_CAP: usize = 28;
pub const Y_NEAR: f64 = 18.0;
pub const X_NEAR: f64 = 90.0;
/// A cell older than this stops growing and starts to decay.
pub const STALE_MS: f64 = 40.0;
/// Weight of the newest pair when smoothing a cell's center and radius.
pub const BLEND: f64 = 0.3;
pub const RADIUS_PER_FONT_PX: f64 = 0.24;
pub const OUTER_RING_SCALE: f64 = 1.22;

/// Screen-space center of one bullet, read at render time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InkSample {
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

impl InkSample {
    pub fn from_bullet(b: &Bullet, container_width: f64) -> Self {
        let (x, y) = b.center(container_width);
        Self {
            x,
            y,
            font_size: b.font_size,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InkCell {
    pub grid_x: i32,
    pub grid_y: i32,
    pub energy: f64,
    pub x: f64,
    pub y: f64,
    pub base_radius: f64,
    pub last_seen: f64,
}

impl InkCell {
    pub fn radius(&self) -> f64 {
        self.base_radius * (1.0 + self.energy * GROW_MULTIPLIER)
    }
}

/// One filled circle, drawn with a multiply blend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InkDisc {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub alpha: f64,
}

fn subsample(samples: &[InkSample]) -> impl Iterator<Item = &InkSample> {
    let stride = samples.len().div_ceil(SAMPLE_CAP).max(1);
    samples.iter().step_by(stride)
}

/// Cells kept in insertion order; `index` maps a grid key to its slot.
#[derive(Debug, Default)]
pub struct InkField {
    cells: Vec<InkCell>,
    index: HashMap<(i32, i32), usize>,
}

impl InkField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, grid_x: i32, grid_y: i32) -> Option<&InkCell> {
        self.index.get(&(grid_x, grid_y)).map(|&i| &self.cells[i])
    }

    /// Oldest cell first.
    pub fn cells(&self) -> impl Iterator<Item = &InkCell> {
        self.cells.iter()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.index.clear();
    }

    /// Pump energy into cells under every close left/right pair.
    pub fn accumulate(&mut self, lefts: &[InkSample], rights: &[InkSample], now: f64) {
        if lefts.is_empty() || rights.is_empty() {
            return;
        }
        for l in subsample(lefts) {
            for r in subsample(rights) {
                if (l.y - r.y).abs() >= Y_NEAR || (l.x - r.x).abs() >= X_NEAR {
                    continue;
                }
                let cx = (l.x + r.x) / 2.0;
                let cy = (l.y + r.y) / 2.0;
                let mut fs = (l.font_size + r.font_size) / 2.0;
                if fs.is_nan() || fs <= 0.0 {
                    fs = DEFAULT_FONT_PX;
                }
                let base_radius = fs * RADIUS_PER_FONT_PX;
                let key = (
                    (cx / CELL_SIZE).floor() as i32,
                    (cy / CELL_SIZE).floor() as i32,
                );
                let slot = *self.index.entry(key).or_insert_with(|| {
                    self.cells.push(InkCell {
                        grid_x: key.0,
                        grid_y: key.1,
                        energy: 0.0,
                        x: cx,
                        y: cy,
                        base_radius,
                        last_seen: now,
                    });
                    self.cells.len() - 1
                });
                let cell = &mut self.cells[slot];
                cell.energy = (cell.energy + GROW_PER_FRAME).min(MAX_ENERGY);
                cell.x = cell.x * (1.0 - BLEND) + cx * BLEND;
                cell.y = cell.y * (1.0 - BLEND) + cy * BLEND;
                cell.base_radius = cell.base_radius * (1.0 - BLEND) + base_radius * BLEND;
                cell.last_seen = now;
            }
        }
    }

    /// Decay stale cells, drop dead ones, and emit discs for at most
    /// `CELLS_DRAW_LIMIT` cells, oldest first. Cells past the limit still
    /// decay.
    pub fn decay_and_draw(&mut self, now: f64) -> Vec<InkDisc> {
        let mut discs = Vec::new();
        let mut drawn = 0usize;
        self.cells.retain_mut(|cell| {
            if now - cell.last_seen > STALE_MS {
                cell.energy = (cell.energy - DECAY_PER_FRAME).max(0.0);
            }
            if cell.energy <= 0.0 {
                return false;
            }
            if drawn < CELLS_DRAW_LIMIT {
                let r = cell.radius();
                discs.push(InkDisc {
                    x: cell.x,
                    y: cell.y,
                    radius: r,
                    alpha: 0.05 + cell.energy * 0.12,
                });
                discs.push(InkDisc {
                    x: cell.x,
                    y: cell.y,
                    radius: r * OUTER_RING_SCALE,
                    alpha: 0.03 + cell.energy * 0.08,
                });
                drawn += 1;
            }
            true
        });
        self.index = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.grid_x, c.grid_y), i))
            .collect();
        discs
    }

    /// Full frame: pair, then decay and draw.
    pub fn step(&mut self, lefts: &[InkSample], rights: &[InkSample], now: f64) -> Vec<InkDisc> {
        self.accumulate(lefts, rights, now);
        self.decay_and_draw(now)
    }
}
