//! Word bullets: logical state for every scrolling word on the danmaku field.
//!
//! A bullet's on-screen position is derived from its traversal progress, so
//! the model can be advanced and queried without a rendering surface. The
//! web adapter only mirrors `left()`/`top` onto DOM elements.

/// Fallback glyph size (px) until the adapter measures the real element.
pub const DEFAULT_FONT_PX: f64 = 24.0;

/// Training traversal duration range, seconds.
pub const TRAINING_DURATION_S: (f64, f64) = (12.0, 24.0);
/// Battle traversal duration range, seconds.
pub const BATTLE_DURATION_S: (f64, f64) = (6.0, 10.0);
/// Upper bound of concurrently live battle bullets.
pub const BATTLE_MAX_BULLETS: usize = 80;

pub type BulletId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulletKind {
    Training,
    Battle,
}

#[derive(Clone, Debug)]
pub struct Bullet {
    pub id: BulletId,
    pub word: String,
    pub kind: BulletKind,
    pub lane: Option<usize>,
    /// Battle bullets only; `Left` travels left-to-right.
    pub origin: Option<Side>,
    /// Pinned by the meaning card; never advances or retires while set.
    pub locked: bool,
    /// Animation play state (the global pause flag lands here).
    pub playing: bool,
    pub duration_s: f64,
    pub elapsed_s: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
}

impl Bullet {
    fn new(id: BulletId, word: &str, kind: BulletKind, top: f64, duration_s: f64) -> Self {
        let font_size = DEFAULT_FONT_PX;
        Self {
            id,
            word: word.to_string(),
            kind,
            lane: None,
            origin: None,
            locked: false,
            playing: true,
            duration_s,
            elapsed_s: 0.0,
            top,
            width: word.chars().count() as f64 * font_size + 16.0,
            height: font_size * 1.5,
            font_size,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (self.elapsed_s / self.duration_s).clamp(0.0, 1.0)
    }

    fn moves_left_to_right(&self) -> bool {
        self.origin == Some(Side::Left)
    }

    /// Left edge relative to the container. Starts fully off-screen on the
    /// origin side and ends fully off-screen on the far side.
    pub fn left(&self, container_width: f64) -> f64 {
        let travel = container_width + self.width;
        let p = self.progress();
        if self.moves_left_to_right() {
            -self.width + p * travel
        } else {
            container_width - p * travel
        }
    }

    /// Edge closest to the spawn origin (right edge for right-to-left).
    pub fn trailing_edge(&self, container_width: f64) -> f64 {
        let left = self.left(container_width);
        if self.moves_left_to_right() {
            left
        } else {
            left + self.width
        }
    }

    pub fn center(&self, container_width: f64) -> (f64, f64) {
        (
            self.left(container_width) + self.width / 2.0,
            self.top + self.height / 2.0,
        )
    }

    /// Advance the traversal clock. Returns true once the traversal is done.
    fn advance(&mut self, dt_s: f64) -> bool {
        if self.playing && !self.locked {
            self.elapsed_s += dt_s;
        }
        !self.locked && self.elapsed_s >= self.duration_s
    }
}

/// All live bullets, in spawn order.
#[derive(Debug, Default)]
pub struct BulletField {
    bullets: Vec<Bullet>,
    next_id: BulletId,
    selected: Option<BulletId>,
    pub width: f64,
    pub height: f64,
}

impl BulletField {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    fn alloc_id(&mut self) -> BulletId {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub fn spawn_training(
        &mut self,
        word: &str,
        lane: usize,
        top: f64,
        duration_s: f64,
        running: bool,
    ) -> BulletId {
        let id = self.alloc_id();
        let mut b = Bullet::new(id, word, BulletKind::Training, top, duration_s);
        b.lane = Some(lane);
        b.playing = running;
        self.bullets.push(b);
        id
    }

    /// Spawn one battle bullet; `None` once the live cap is reached.
    pub fn spawn_battle(
        &mut self,
        word: &str,
        side: Side,
        y: f64,
        duration_s: f64,
    ) -> Option<BulletId> {
        if self.live_battle_count() >= BATTLE_MAX_BULLETS {
            return None;
        }
        let top = y.floor().min(self.height - 10.0).max(0.0);
        let id = self.alloc_id();
        let mut b = Bullet::new(id, word, BulletKind::Battle, top, duration_s);
        b.origin = Some(side);
        self.bullets.push(b);
        Some(id)
    }

    pub fn get(&self, id: BulletId) -> Option<&Bullet> {
        self.bullets.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: BulletId) -> Option<&mut Bullet> {
        self.bullets.iter_mut().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bullet> {
        self.bullets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    pub fn live_battle_count(&self) -> usize {
        self.bullets
            .iter()
            .filter(|b| b.kind == BulletKind::Battle)
            .count()
    }

    pub fn battle_side(&self, side: Side) -> impl Iterator<Item = &Bullet> {
        self.bullets
            .iter()
            .filter(move |b| b.kind == BulletKind::Battle && b.origin == Some(side))
    }

    /// Record the measured element extent.
    pub fn set_extent(&mut self, id: BulletId, width: f64, height: f64, font_size: f64) {
        if let Some(b) = self.get_mut(id) {
            b.width = width;
            b.height = height;
            if font_size > 0.0 {
                b.font_size = font_size;
            }
        }
    }

    /// Advance every bullet and retire the finished ones.
    pub fn advance(&mut self, dt_s: f64) -> Vec<Bullet> {
        let mut retired = Vec::new();
        let mut i = 0;
        while i < self.bullets.len() {
            if self.bullets[i].advance(dt_s) {
                retired.push(self.bullets.remove(i));
            } else {
                i += 1;
            }
        }
        retired
    }

    /// Apply the global running flag. Locked bullets stay paused.
    pub fn set_running(&mut self, running: bool) {
        for b in self.bullets.iter_mut() {
            if running {
                if !b.locked {
                    b.playing = true;
                }
            } else {
                b.playing = false;
            }
        }
    }

    pub fn selected(&self) -> Option<BulletId> {
        self.selected
    }

    /// Pin `id` for the meaning card. Any previously pinned bullet is
    /// released back to the global play state.
    pub fn select(&mut self, id: BulletId, running: bool) -> Option<&Bullet> {
        self.get(id)?;
        if let Some(prev) = self.selected.filter(|p| *p != id) {
            if let Some(b) = self.get_mut(prev) {
                b.locked = false;
                b.playing = running;
            }
        }
        self.selected = Some(id);
        let b = self.get_mut(id)?;
        b.locked = true;
        b.playing = false;
        Some(b)
    }

    /// Release the pinned bullet, if any. Returns its id.
    pub fn unselect(&mut self, running: bool) -> Option<BulletId> {
        let id = self.selected.take()?;
        if let Some(b) = self.get_mut(id) {
            b.locked = false;
            b.playing = running;
        }
        Some(id)
    }

    /// Drop every bullet (mode transition).
    pub fn clear(&mut self) -> Vec<BulletId> {
        self.selected = None;
        self.bullets.drain(..).map(|b| b.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_to_left_traversal_spans_container() {
        let mut field = BulletField::new(800.0, 420.0);
        let id = field.spawn_training("内卷", 0, 0.0, 10.0, true);
        let w = field.get(id).unwrap().width;
        assert!((field.get(id).unwrap().left(800.0) - 800.0).abs() < 1e-9);
        field.advance(5.0);
        let mid = field.get(id).unwrap().left(800.0);
        assert!((mid - (800.0 - 0.5 * (800.0 + w))).abs() < 1e-9);
        let retired = field.advance(5.0);
        assert_eq!(retired.len(), 1);
        assert!(field.is_empty());
    }

    #[test]
    fn left_origin_moves_rightward() {
        let mut field = BulletField::new(600.0, 400.0);
        let id = field.spawn_battle("摆烂", Side::Left, 200.0, 8.0).unwrap();
        let start = field.get(id).unwrap().left(600.0);
        field.advance(1.0);
        assert!(field.get(id).unwrap().left(600.0) > start);
    }

    #[test]
    fn locked_bullet_does_not_advance_or_retire() {
        let mut field = BulletField::new(800.0, 420.0);
        let id = field.spawn_training("躺平", 1, 42.0, 1.0, true);
        field.select(id, true);
        assert!(field.advance(5.0).is_empty());
        assert_eq!(field.get(id).unwrap().elapsed_s, 0.0);
        field.unselect(true);
        assert_eq!(field.advance(1.0).len(), 1);
    }

    #[test]
    fn selecting_another_releases_previous() {
        let mut field = BulletField::new(800.0, 420.0);
        let a = field.spawn_training("a", 0, 0.0, 12.0, true);
        let b = field.spawn_training("b", 1, 42.0, 12.0, true);
        field.select(a, true);
        field.select(b, false);
        let ba = field.get(a).unwrap();
        assert!(!ba.locked);
        assert!(!ba.playing, "released bullet follows the global flag");
        assert!(field.get(b).unwrap().locked);
        assert_eq!(field.selected(), Some(b));
    }

    #[test]
    fn resume_skips_locked() {
        let mut field = BulletField::new(800.0, 420.0);
        let a = field.spawn_training("a", 0, 0.0, 12.0, false);
        let b = field.spawn_training("b", 1, 42.0, 12.0, false);
        field.select(a, false);
        field.set_running(true);
        assert!(!field.get(a).unwrap().playing);
        assert!(field.get(b).unwrap().playing);
    }

    #[test]
    fn battle_cap_is_enforced() {
        let mut field = BulletField::new(800.0, 420.0);
        for i in 0..(BATTLE_MAX_BULLETS + 10) {
            let side = if i % 2 == 0 { Side::Left } else { Side::Right };
            field.spawn_battle("x", side, 100.0, 8.0);
        }
        assert_eq!(field.live_battle_count(), BATTLE_MAX_BULLETS);
    }

    #[test]
    fn battle_top_is_clamped() {
        let mut field = BulletField::new(800.0, 200.0);
        let id = field.spawn_battle("x", Side::Right, 500.0, 8.0).unwrap();
        assert_eq!(field.get(id).unwrap().top, 190.0);
        let id = field.spawn_battle("x", Side::Right, -20.0, 8.0).unwrap();
        assert_eq!(field.get(id).unwrap().top, 0.0);
    }
}
