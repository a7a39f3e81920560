//! Cancellable one-shot and repeating timers driven by the frame clock.
//!
//! The browser only gives us animation frames; everything that the page
//! would do with `setTimeout`/`setInterval` is scheduled here instead so a
//! mode switch can cancel it by handle, and tests can drive time directly.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Training spawn interval.
    SpawnTick,
    /// Quiz hint dwell before advancing or retrying.
    QuizDwell,
    /// Debounced viewport resize.
    ResizeSettle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Timer {
    handle: TimerHandle,
    kind: TimerKind,
    due: f64,
    interval: Option<f64>,
}

#[derive(Debug, Default)]
pub struct Timers {
    next: u64,
    pending: Vec<Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: TimerKind, due: f64, interval: Option<f64>) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.pending.push(Timer {
            handle,
            kind,
            due,
            interval,
        });
        handle
    }

    pub fn once(&mut self, kind: TimerKind, due: f64) -> TimerHandle {
        self.push(kind, due, None)
    }

    pub fn repeat(&mut self, kind: TimerKind, first_due: f64, interval: f64) -> TimerHandle {
        self.push(kind, first_due, Some(interval.max(1.0)))
    }

    /// Returns false if the handle already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.handle != handle);
        self.pending.len() != before
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|t| t.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pop everything due at `now`, earliest first. A repeating timer fires
    /// at most once per call and skips missed periods like `setInterval`.
    pub fn fire_due(&mut self, now: f64) -> Vec<(TimerHandle, TimerKind)> {
        let mut fired: Vec<(f64, TimerHandle, TimerKind)> = Vec::new();
        self.pending.retain_mut(|t| {
            if t.due > now {
                return true;
            }
            fired.push((t.due, t.handle, t.kind));
            match t.interval {
                Some(step) => {
                    while t.due <= now {
                        t.due += step;
                    }
                    true
                }
                None => false,
            }
        });
        fired.sort_by(|a, b| a.0.total_cmp(&b.0));
        fired.into_iter().map(|(_, h, k)| (h, k)).collect()
    }
}
