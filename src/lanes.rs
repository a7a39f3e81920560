//! Lane table for training bullets.
//!
//! The field is cut into fixed-height rows. A lane accepts a new bullet when
//! it is empty or when its last bullet has already pulled `MIN_GAP` clear of
//! the spawn edge. No lane means the spawn tick is skipped.

use crate::bullets::{BulletField, BulletId};

pub const LANE_HEIGHT: f64 = 42.0;
pub const MIN_GAP: f64 = 24.0;

pub fn compute_lane_count(container_height: f64) -> usize {
    let rows = (container_height / LANE_HEIGHT).floor();
    if rows.is_finite() && rows >= 1.0 {
        rows as usize
    } else {
        1
    }
}

pub fn lane_top(index: usize) -> f64 {
    index as f64 * LANE_HEIGHT
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lane {
    pub index: usize,
    /// Most recently spawned bullet in this lane.
    pub occupant: Option<BulletId>,
}

#[derive(Debug)]
pub struct LaneScheduler {
    lanes: Vec<Lane>,
}

impl LaneScheduler {
    pub fn new(container_height: f64) -> Self {
        let count = compute_lane_count(container_height);
        Self {
            lanes: (0..count).map(|index| Lane { index, occupant: None }).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// First lane (in index order) with enough clearance behind its occupant.
    pub fn find_available_lane(&self, bullets: &BulletField) -> Option<usize> {
        let width = bullets.width;
        self.lanes.iter().position(|lane| match lane.occupant {
            None => true,
            // Occupant already gone: treat as empty.
            Some(id) => bullets
                .get(id)
                .map(|b| b.trailing_edge(width) < width - MIN_GAP)
                .unwrap_or(true),
        })
    }

    pub fn occupy(&mut self, index: usize, id: BulletId) {
        if let Some(lane) = self.lanes.get_mut(index) {
            lane.occupant = Some(id);
        }
    }

    /// Clear the lane only if `id` is still its tracked occupant.
    pub fn release(&mut self, index: usize, id: BulletId) {
        if let Some(lane) = self.lanes.get_mut(index) {
            if lane.occupant == Some(id) {
                lane.occupant = None;
            }
        }
    }

    pub fn clear(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.occupant = None;
        }
    }

    /// Rebuild lanes for a new height and snap every live bullet, battle ones
    /// included, to the nearest valid lane. The first bullet snapped into a
    /// lane becomes its occupant.
    pub fn relayout(&mut self, container_height: f64, bullets: &mut BulletField) {
        *self = Self::new(container_height);
        let last = self.lanes.len() - 1;
        for b in bullets.iter_mut() {
            let idx = ((b.top / LANE_HEIGHT).round().max(0.0) as usize).min(last);
            b.top = lane_top(idx);
            b.lane = Some(idx);
            let lane = &mut self.lanes[idx];
            if lane.occupant.is_none() {
                lane.occupant = Some(b.id);
            }
        }
    }
}
