//! Game controller: the single owner of mode, timers and every subsystem.
//!
//! The browser adapter feeds `Event`s in (user actions and one `Frame` per
//! animation frame) and applies the `Effect`s that come back. Nothing in
//! here touches the DOM, so whole sessions can be replayed in tests with a
//! simulated clock.

use crate::battle::BattleSequencer;
use crate::bullets::{
    BATTLE_DURATION_S, BulletField, BulletId, BulletKind, Side, TRAINING_DURATION_S,
};
use crate::ink::{InkDisc, InkField, InkSample};
use crate::lanes::{LaneScheduler, lane_top};
use crate::quiz::{
    HINT_CORRECT, HINT_NOT_ENOUGH, HINT_WRONG, QUIZ_DWELL_MS, QuizEngine, QuizError, QuizQuestion,
    QuizState,
};
use crate::rng::Rng;
use crate::timers::{TimerHandle, TimerKind, Timers};
use crate::words::WordBank;

/// Training spawn cadence while running.
pub const SPAWN_INTERVAL_MS: f64 = 500.0;
/// Bullets spawned immediately when training starts.
pub const INITIAL_BURST: usize = 4;
pub const RESIZE_DEBOUNCE_MS: f64 = 150.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Training,
    Quiz,
    Battle,
}

impl Mode {
    pub fn allows(self, next: Mode) -> bool {
        matches!(
            (self, next),
            (Mode::Idle, Mode::Training)
                | (Mode::Idle, Mode::Quiz)
                | (Mode::Training, Mode::Quiz)
                | (Mode::Quiz, Mode::Battle)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// "Training Ground" on the mode choice.
    ChooseTraining,
    /// "Battlefield" on the mode choice; the quiz gates the battle.
    ChooseBattlefield,
    /// Start / Pause.
    ToggleRunning,
    /// "Go to Battlefield" from training.
    GoToBattlefield,
    BulletClicked(BulletId),
    CloseCard,
    AnswerSelected(usize),
    /// Click / Enter / Space on the quiz prompt.
    QuizPromptActivated,
    Resized { width: f64, height: f64 },
    Frame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintKind {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Speak(String),
    RemoveChoiceGroup,
    ShowTrainingControls,
    /// Start/Pause label and `aria-pressed`.
    SetRunning(bool),
    HideTopControls,
    ShowCard { word: String, meaning: String },
    HideCard,
    BulletSpawned(BulletId),
    BulletRemoved(BulletId),
    FieldCleared,
    ShowQuiz,
    RenderQuestion(QuizQuestion),
    /// No question could be built; options are cleared.
    QuizUnavailable,
    QuizHint { text: &'static str, kind: HintKind },
    ClearQuizHint,
    HideQuiz,
    /// Battle entered: set up the ink canvas.
    EnterBattle,
    InkFrame(Vec<InkDisc>),
    RevealOverlay,
    RevealMessage,
    /// Viewport settled after a resize.
    Relayout { width: f64, height: f64 },
}

fn quiz_unavailable(err: QuizError, fx: &mut Vec<Effect>) {
    log::warn!("quiz unavailable: {err}");
    fx.push(Effect::QuizUnavailable);
    fx.push(Effect::QuizHint {
        text: HINT_NOT_ENOUGH,
        kind: HintKind::Error,
    });
}

pub struct Game {
    mode: Mode,
    words: WordBank,
    rng: Rng,
    field: BulletField,
    lanes: LaneScheduler,
    quiz: QuizEngine,
    battle: Option<BattleSequencer>,
    ink: Option<InkField>,
    timers: Timers,
    running: bool,
    spawn_timer: Option<TimerHandle>,
    dwell_timer: Option<TimerHandle>,
    resize_timer: Option<TimerHandle>,
    pending_viewport: Option<(f64, f64)>,
    last_frame: Option<f64>,
}

impl Game {
    pub fn new(words: WordBank, rng: Rng, width: f64, height: f64) -> Self {
        Self {
            mode: Mode::Idle,
            words,
            rng,
            field: BulletField::new(width, height),
            lanes: LaneScheduler::new(height),
            quiz: QuizEngine::new(),
            battle: None,
            ink: None,
            timers: Timers::new(),
            running: false,
            spawn_timer: None,
            dwell_timer: None,
            resize_timer: None,
            pending_viewport: None,
            last_frame: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn words(&self) -> &WordBank {
        &self.words
    }

    pub fn field(&self) -> &BulletField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut BulletField {
        &mut self.field
    }

    pub fn lanes(&self) -> &LaneScheduler {
        &self.lanes
    }

    pub fn quiz(&self) -> &QuizEngine {
        &self.quiz
    }

    pub fn ink(&self) -> Option<&InkField> {
        self.ink.as_ref()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Dispatch one event at time `now` (ms, monotonic).
    pub fn handle(&mut self, now: f64, event: Event) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Event::ChooseTraining => self.choose_training(&mut fx),
            Event::ChooseBattlefield => {
                if self.mode == Mode::Idle {
                    self.enter_quiz(&mut fx);
                }
            }
            Event::ToggleRunning => self.toggle_running(now, &mut fx),
            Event::GoToBattlefield => self.leave_training(&mut fx),
            Event::BulletClicked(id) => self.bullet_clicked(id, &mut fx),
            Event::CloseCard => {
                fx.push(Effect::HideCard);
                self.field.unselect(self.running);
            }
            Event::AnswerSelected(index) => self.answer(now, index, &mut fx),
            Event::QuizPromptActivated => {
                if self.mode == Mode::Quiz {
                    if let Some(q) = self.quiz.question() {
                        fx.push(Effect::Speak(q.word.clone()));
                    }
                }
            }
            Event::Resized { width, height } => {
                self.pending_viewport = Some((width, height));
                if let Some(h) = self.resize_timer.take() {
                    self.timers.cancel(h);
                }
                self.resize_timer = Some(
                    self.timers
                        .once(TimerKind::ResizeSettle, now + RESIZE_DEBOUNCE_MS),
                );
            }
            Event::Frame => self.frame(now, &mut fx),
        }
        fx
    }

    fn transition(&mut self, next: Mode) -> Mode {
        if self.mode.allows(next) {
            log::info!("mode {:?} -> {:?}", self.mode, next);
            self.mode = next;
        }
        self.mode
    }

    fn choose_training(&mut self, fx: &mut Vec<Effect>) {
        if self.mode != Mode::Idle {
            return;
        }
        self.transition(Mode::Training);
        fx.push(Effect::RemoveChoiceGroup);
        fx.push(Effect::ShowTrainingControls);
        fx.push(Effect::SetRunning(false));
    }

    fn toggle_running(&mut self, now: f64, fx: &mut Vec<Effect>) {
        if self.mode != Mode::Training {
            return;
        }
        self.running = !self.running;
        fx.push(Effect::SetRunning(self.running));
        self.field.set_running(self.running);
        if self.running {
            self.start_spawning(now, fx);
        } else {
            self.stop_spawning();
        }
    }

    fn start_spawning(&mut self, now: f64, fx: &mut Vec<Effect>) {
        if self.spawn_timer.is_some() {
            return;
        }
        for _ in 0..INITIAL_BURST {
            self.spawn_training(fx);
        }
        self.spawn_timer = Some(self.timers.repeat(
            TimerKind::SpawnTick,
            now + SPAWN_INTERVAL_MS,
            SPAWN_INTERVAL_MS,
        ));
    }

    fn stop_spawning(&mut self) {
        if let Some(h) = self.spawn_timer.take() {
            self.timers.cancel(h);
        }
    }

    fn spawn_training(&mut self, fx: &mut Vec<Effect>) {
        if self.mode != Mode::Training || !self.running || self.words.is_empty() {
            return;
        }
        let Some(lane) = self.lanes.find_available_lane(&self.field) else {
            return;
        };
        let Some(entry) = self.words.random_entry(&mut self.rng) else {
            return;
        };
        let word = entry.word.clone();
        let (lo, hi) = TRAINING_DURATION_S;
        let duration = self.rng.range_f64(lo, hi);
        let id = self
            .field
            .spawn_training(&word, lane, lane_top(lane), duration, self.running);
        self.lanes.occupy(lane, id);
        fx.push(Effect::BulletSpawned(id));
    }

    fn bullet_clicked(&mut self, id: BulletId, fx: &mut Vec<Effect>) {
        let Some(bullet) = self.field.get(id) else {
            return;
        };
        let word = bullet.word.clone();
        let kind = bullet.kind;
        fx.push(Effect::Speak(word.clone()));
        if self.mode != Mode::Training || kind != BulletKind::Training {
            return;
        }
        self.field.select(id, self.running);
        let meaning = self
            .words
            .lookup(&word)
            .map(|e| e.meaning.clone())
            .unwrap_or_default();
        fx.push(Effect::ShowCard { word, meaning });
    }

    fn clear_field(&mut self, fx: &mut Vec<Effect>) {
        self.field.clear();
        self.lanes.clear();
        fx.push(Effect::FieldCleared);
    }

    fn leave_training(&mut self, fx: &mut Vec<Effect>) {
        if self.mode != Mode::Training {
            return;
        }
        self.running = false;
        self.stop_spawning();
        self.field.set_running(false);
        fx.push(Effect::SetRunning(false));
        fx.push(Effect::HideCard);
        self.field.unselect(false);
        self.enter_quiz(fx);
    }

    fn enter_quiz(&mut self, fx: &mut Vec<Effect>) {
        if self.transition(Mode::Quiz) != Mode::Quiz {
            return;
        }
        self.clear_field(fx);
        fx.push(Effect::ShowQuiz);
        self.present_question(fx);
    }

    fn present_question(&mut self, fx: &mut Vec<Effect>) {
        if let Some(h) = self.dwell_timer.take() {
            self.timers.cancel(h);
        }
        fx.push(Effect::ClearQuizHint);
        let built = self.quiz.present(&self.words, &mut self.rng).cloned();
        match built {
            Ok(q) => fx.push(Effect::RenderQuestion(q)),
            Err(err) => quiz_unavailable(err, fx),
        }
    }

    fn answer(&mut self, now: f64, index: usize, fx: &mut Vec<Effect>) {
        if self.mode != Mode::Quiz {
            return;
        }
        match self.quiz.answer(index) {
            Some(QuizState::Correct) => {
                fx.push(Effect::QuizHint {
                    text: HINT_CORRECT,
                    kind: HintKind::Success,
                });
                fx.push(Effect::HideTopControls);
            }
            Some(QuizState::Incorrect) => fx.push(Effect::QuizHint {
                text: HINT_WRONG,
                kind: HintKind::Error,
            }),
            _ => return,
        }
        if let Some(h) = self.dwell_timer.take() {
            self.timers.cancel(h);
        }
        self.dwell_timer = Some(self.timers.once(TimerKind::QuizDwell, now + QUIZ_DWELL_MS));
    }

    fn dwell_over(&mut self, handle: TimerHandle, now: f64, fx: &mut Vec<Effect>) {
        if self.dwell_timer != Some(handle) || self.mode != Mode::Quiz {
            return;
        }
        self.dwell_timer = None;
        match self.quiz.finish_dwell(&self.words, &mut self.rng) {
            Ok(QuizState::Advanced) => {
                fx.push(Effect::HideQuiz);
                fx.push(Effect::RemoveChoiceGroup);
                self.enter_battle(now, fx);
            }
            Ok(_) => {
                fx.push(Effect::ClearQuizHint);
                if let Some(q) = self.quiz.question() {
                    fx.push(Effect::RenderQuestion(q.clone()));
                }
            }
            Err(err) => {
                fx.push(Effect::ClearQuizHint);
                quiz_unavailable(err, fx);
            }
        }
    }

    fn enter_battle(&mut self, now: f64, fx: &mut Vec<Effect>) {
        if self.transition(Mode::Battle) != Mode::Battle {
            return;
        }
        fx.push(Effect::HideTopControls);
        self.stop_spawning();
        self.running = false;
        self.field.set_running(false);
        self.battle = Some(BattleSequencer::new(now));
        self.ink = Some(InkField::new());
        fx.push(Effect::EnterBattle);
    }

    fn resize_settled(&mut self, handle: TimerHandle, fx: &mut Vec<Effect>) {
        if self.resize_timer != Some(handle) {
            return;
        }
        self.resize_timer = None;
        let Some((width, height)) = self.pending_viewport.take() else {
            return;
        };
        self.field.width = width;
        self.field.height = height;
        self.lanes.relayout(height, &mut self.field);
        fx.push(Effect::Relayout { width, height });
    }

    fn frame(&mut self, now: f64, fx: &mut Vec<Effect>) {
        let dt_s = match self.last_frame {
            Some(prev) => ((now - prev) / 1000.0).max(0.0),
            None => 0.0,
        };
        self.last_frame = Some(now);

        for b in self.field.advance(dt_s) {
            if let Some(lane) = b.lane {
                self.lanes.release(lane, b.id);
            }
            fx.push(Effect::BulletRemoved(b.id));
        }

        for (handle, kind) in self.timers.fire_due(now) {
            match kind {
                TimerKind::SpawnTick => {
                    if self.spawn_timer == Some(handle) {
                        self.spawn_training(fx);
                    }
                }
                TimerKind::QuizDwell => self.dwell_over(handle, now, fx),
                TimerKind::ResizeSettle => self.resize_settled(handle, fx),
            }
        }

        if self.mode != Mode::Battle {
            return;
        }
        self.battle_frame(now, fx);
    }

    fn battle_frame(&mut self, now: f64, fx: &mut Vec<Effect>) {
        if let Some(seq) = self.battle.as_mut() {
            let live = self.field.live_battle_count();
            let step = seq.tick(now, live, self.field.height, &mut self.rng);
            for order in step.spawns {
                let Some(entry) = self.words.random_entry(&mut self.rng) else {
                    break;
                };
                let word = entry.word.clone();
                let (lo, hi) = BATTLE_DURATION_S;
                let duration = self.rng.range_f64(lo, hi);
                if let Some(id) = self.field.spawn_battle(&word, order.side, order.y, duration) {
                    fx.push(Effect::BulletSpawned(id));
                }
            }
            if step.reveal_overlay {
                log::info!("battle: darkening overlay");
                fx.push(Effect::RevealOverlay);
            }
            if step.reveal_message {
                log::info!("battle: final message");
                fx.push(Effect::RevealMessage);
            }
        }

        // Positions are read after this frame's spawns.
        if let Some(ink) = self.ink.as_mut() {
            let width = self.field.width;
            let lefts: Vec<InkSample> = self
                .field
                .battle_side(Side::Left)
                .map(|b| InkSample::from_bullet(b, width))
                .collect();
            let rights: Vec<InkSample> = self
                .field
                .battle_side(Side::Right)
                .map(|b| InkSample::from_bullet(b, width))
                .collect();
            fx.push(Effect::InkFrame(ink.step(&lefts, &rights, now)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::words::WordEntry;

    fn game() -> Game {
        Game::new(WordBank::fallback(), Rng::new(21), 800.0, 420.0)
    }

    #[test]
    fn mode_transitions_are_guarded() {
        assert!(Mode::Idle.allows(Mode::Training));
        assert!(Mode::Quiz.allows(Mode::Battle));
        assert!(!Mode::Idle.allows(Mode::Battle));
        assert!(!Mode::Battle.allows(Mode::Quiz));
        assert!(!Mode::Training.allows(Mode::Idle));
    }

    #[test]
    fn training_choice_only_from_idle() {
        let mut g = game();
        g.handle(0.0, Event::ChooseBattlefield);
        assert_eq!(g.mode(), Mode::Quiz);
        assert!(g.handle(0.0, Event::ChooseTraining).is_empty());
        assert_eq!(g.mode(), Mode::Quiz);
    }

    #[test]
    fn start_spawns_initial_burst_then_interval() {
        let mut g = game();
        g.handle(0.0, Event::ChooseTraining);
        let fx = g.handle(0.0, Event::ToggleRunning);
        let spawned = fx.iter().filter(|e| matches!(e, Effect::BulletSpawned(_))).count();
        assert_eq!(spawned, INITIAL_BURST);
        g.handle(16.0, Event::Frame);
        let fx = g.handle(SPAWN_INTERVAL_MS, Event::Frame);
        assert_eq!(fx.iter().filter(|e| matches!(e, Effect::BulletSpawned(_))).count(), 1);
    }

    #[test]
    fn pause_cancels_spawn_interval_and_freezes_bullets() {
        let mut g = game();
        g.handle(0.0, Event::ChooseTraining);
        g.handle(0.0, Event::ToggleRunning);
        g.handle(0.0, Event::ToggleRunning);
        assert!(!g.is_running());
        assert_eq!(g.pending_timers(), 0);
        assert!(g.field().iter().all(|b| !b.playing));
        let fx = g.handle(5_000.0, Event::Frame);
        assert!(fx.is_empty());
    }

    #[test]
    fn no_spawn_when_every_lane_is_fresh() {
        // One lane: the burst can only place a single bullet.
        let mut g = Game::new(WordBank::fallback(), Rng::new(1), 800.0, 42.0);
        g.handle(0.0, Event::ChooseTraining);
        let fx = g.handle(0.0, Event::ToggleRunning);
        assert_eq!(fx.iter().filter(|e| matches!(e, Effect::BulletSpawned(_))).count(), 1);
    }

    #[test]
    fn clicking_bullet_speaks_and_locks() {
        let mut g = game();
        g.handle(0.0, Event::ChooseTraining);
        g.handle(0.0, Event::ToggleRunning);
        let id = g.field().iter().next().unwrap().id;
        let word = g.field().get(id).unwrap().word.clone();
        let fx = g.handle(10.0, Event::BulletClicked(id));
        assert_eq!(fx[0], Effect::Speak(word.clone()));
        assert!(matches!(&fx[1], Effect::ShowCard { word: w, .. } if *w == word));
        assert!(g.field().get(id).unwrap().locked);
        g.handle(20.0, Event::CloseCard);
        let b = g.field().get(id).unwrap();
        assert!(!b.locked);
        assert!(b.playing);
    }

    #[test]
    fn clicking_battle_bullet_only_speaks() {
        let mut g = game();
        g.handle(0.0, Event::ChooseBattlefield);
        let correct = g.quiz().question().unwrap().correct_index().unwrap();
        g.handle(0.0, Event::AnswerSelected(correct));
        g.handle(QUIZ_DWELL_MS, Event::Frame);
        assert_eq!(g.mode(), Mode::Battle);
        let b = g.field().iter().next().unwrap();
        assert_eq!(b.kind, BulletKind::Battle);
        let (id, word) = (b.id, b.word.clone());

        let fx = g.handle(QUIZ_DWELL_MS + 16.0, Event::BulletClicked(id));
        assert_eq!(fx, vec![Effect::Speak(word)]);
        assert!(!g.field().get(id).unwrap().locked);
        assert!(g.field().selected().is_none());
    }

    #[test]
    fn finished_bullet_releases_lane() {
        let mut g = game();
        g.handle(0.0, Event::ChooseTraining);
        g.handle(0.0, Event::ToggleRunning);
        g.handle(0.0, Event::Frame);
        let first: Vec<_> = g.field().iter().map(|b| b.id).collect();
        let fx = g.handle(30_000.0, Event::Frame);
        for id in first {
            assert!(fx.contains(&Effect::BulletRemoved(id)));
        }
        assert!(g.lanes().lanes().iter().all(|l| l.occupant.is_none()
            || g.field().get(l.occupant.unwrap()).is_some()));
    }

    #[test]
    fn go_to_battlefield_tears_down_training() {
        let mut g = game();
        g.handle(0.0, Event::ChooseTraining);
        g.handle(0.0, Event::ToggleRunning);
        let id = g.field().iter().next().unwrap().id;
        g.handle(0.0, Event::BulletClicked(id));
        let fx = g.handle(10.0, Event::GoToBattlefield);
        assert_eq!(g.mode(), Mode::Quiz);
        assert!(g.field().is_empty());
        assert!(g.field().selected().is_none());
        assert!(fx.contains(&Effect::FieldCleared));
        assert!(fx.iter().any(|e| matches!(e, Effect::RenderQuestion(_))));
        assert_eq!(g.pending_timers(), 0);
    }

    #[test]
    fn insufficient_pool_shows_hint() {
        let words = WordBank::new(vec![WordEntry::new("a", "A", &[]), WordEntry::new("b", "B", &[])]);
        let mut g = Game::new(words, Rng::new(1), 800.0, 420.0);
        let fx = g.handle(0.0, Event::ChooseBattlefield);
        assert_eq!(g.mode(), Mode::Quiz);
        assert!(fx.contains(&Effect::QuizUnavailable));
        assert!(fx.contains(&Effect::QuizHint { text: HINT_NOT_ENOUGH, kind: HintKind::Error }));
        assert!(g.handle(10.0, Event::AnswerSelected(0)).is_empty());
    }

    #[test]
    fn resize_is_debounced() {
        let mut g = game();
        g.handle(0.0, Event::Resized { width: 800.0, height: 300.0 });
        g.handle(100.0, Event::Resized { width: 800.0, height: 200.0 });
        assert!(g.handle(200.0, Event::Frame).is_empty());
        let fx = g.handle(250.0, Event::Frame);
        assert_eq!(fx, vec![Effect::Relayout { width: 800.0, height: 200.0 }]);
        assert_eq!(g.lanes().len(), 4);
    }

    #[test]
    fn prompt_activation_speaks_word() {
        let mut g = game();
        g.handle(0.0, Event::ChooseBattlefield);
        let word = g.quiz().question().unwrap().word.clone();
        assert_eq!(g.handle(1.0, Event::QuizPromptActivated), vec![Effect::Speak(word)]);
    }
}
