//! Browser adapter: DOM mount points, bullet elements, ink canvas, speech
//! and the animation-frame loop.
//!
//! Every DOM callback is turned into a `game::Event` and routed through
//! `dispatch`; the returned effects are applied here. Bullet elements are
//! positioned from the logical model once per frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Document, Element, EventTarget, HtmlElement, KeyboardEvent, MouseEvent, Response, window,
};

use crate::bullets::{BulletId, BulletKind, Side};
use crate::game::{Effect, Event, Game, HintKind};
use crate::quiz::QuizQuestion;
use crate::rng::Rng;
use crate::words::{DATA_URL, WordBank};

mod ink_canvas;
pub mod speech;

use ink_canvas::InkCanvas;
use speech::Speech;

/// Element ids the adapter binds to.
#[derive(Clone, Debug)]
pub struct Mounts {
    pub field: &'static str,
    pub card: &'static str,
    pub close_card: &'static str,
    pub word_text: &'static str,
    pub meaning_text: &'static str,
    pub choice_group: &'static str,
    pub choose_battle: &'static str,
    pub choose_training: &'static str,
    pub subtitle: &'static str,
    pub start_mount: &'static str,
    pub overlay: &'static str,
    pub message: &'static str,
    pub quiz: &'static str,
    pub quiz_word: &'static str,
    pub quiz_options: &'static str,
    pub quiz_hint: &'static str,
}

impl Default for Mounts {
    fn default() -> Self {
        Self {
            field: "danmaku",
            card: "meaningCard",
            close_card: "closeCard",
            word_text: "wordText",
            meaning_text: "meanText",
            choice_group: "choiceGroup",
            choose_battle: "btnNo",
            choose_training: "btnYes",
            subtitle: "subtitle",
            start_mount: "startMount",
            overlay: "noOverlay",
            message: "noMessage",
            quiz: "quiz",
            quiz_word: "quizWord",
            quiz_options: "quizOptions",
            quiz_hint: "quizHint",
        }
    }
}

/// Resolved mount points. Everything but the field is optional.
struct Surface {
    doc: Document,
    field: HtmlElement,
    card: Option<HtmlElement>,
    close_card: Option<HtmlElement>,
    word_text: Option<HtmlElement>,
    meaning_text: Option<HtmlElement>,
    choice_group: Option<HtmlElement>,
    choose_battle: Option<HtmlElement>,
    choose_training: Option<HtmlElement>,
    subtitle: Option<HtmlElement>,
    start_mount: Option<HtmlElement>,
    overlay: Option<HtmlElement>,
    message: Option<HtmlElement>,
    quiz: Option<HtmlElement>,
    quiz_word: Option<HtmlElement>,
    quiz_options: Option<HtmlElement>,
    quiz_hint: Option<HtmlElement>,
    spawn_button: Option<HtmlElement>,
}

fn find(doc: &Document, id: &str) -> Option<HtmlElement> {
    let el = doc
        .get_element_by_id(id)
        .and_then(|e| e.dyn_into::<HtmlElement>().ok());
    if el.is_none() {
        log::warn!("mount point #{id} not found");
    }
    el
}

impl Surface {
    fn resolve(doc: Document, m: &Mounts) -> Result<Self, JsValue> {
        // Create / reuse the field so the game can always run.
        let field = match doc.get_element_by_id(m.field) {
            Some(el) => el.dyn_into::<HtmlElement>()?,
            None => {
                log::warn!("mount point #{} not found; creating it", m.field);
                let el: HtmlElement = doc.create_element("div")?.dyn_into()?;
                el.set_id(m.field);
                el.set_attribute(
                    "style",
                    "position:relative; width:100%; height:70vh; overflow:hidden;",
                )?;
                doc.body()
                    .ok_or_else(|| JsValue::from_str("no body"))?
                    .append_child(&el)?;
                el
            }
        };
        Ok(Self {
            card: find(&doc, m.card),
            close_card: find(&doc, m.close_card),
            word_text: find(&doc, m.word_text),
            meaning_text: find(&doc, m.meaning_text),
            choice_group: find(&doc, m.choice_group),
            choose_battle: find(&doc, m.choose_battle),
            choose_training: find(&doc, m.choose_training),
            subtitle: find(&doc, m.subtitle),
            start_mount: find(&doc, m.start_mount),
            overlay: find(&doc, m.overlay),
            message: find(&doc, m.message),
            quiz: find(&doc, m.quiz),
            quiz_word: find(&doc, m.quiz_word),
            quiz_options: find(&doc, m.quiz_options),
            quiz_hint: find(&doc, m.quiz_hint),
            spawn_button: None,
            field,
            doc,
        })
    }

    fn field_size(&self) -> (f64, f64) {
        (
            self.field.client_width() as f64,
            self.field.client_height() as f64,
        )
    }
}

fn set_text(el: Option<&HtmlElement>, text: &str) {
    if let Some(el) = el {
        el.set_text_content(Some(text));
    }
}

fn set_attr(el: Option<&HtmlElement>, name: &str, value: &str) {
    if let Some(el) = el {
        let _ = el.set_attribute(name, value);
    }
}

/// Un-hide and fade in. Reading `offsetHeight` flushes layout so the
/// opacity transition runs instead of snapping.
fn fade_in(el: Option<&HtmlElement>) {
    if let Some(el) = el {
        el.set_hidden(false);
        let _ = el.offset_height();
        let _ = el.style().set_property("opacity", "1");
    }
}

fn conceal(el: Option<&HtmlElement>) {
    if let Some(el) = el {
        let style = el.style();
        let _ = style.set_property("pointer-events", "none");
        let _ = style.set_property("opacity", "0");
        el.set_hidden(true);
    }
}

fn now_ms() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

struct App {
    game: Game,
    surface: Surface,
    views: HashMap<BulletId, HtmlElement>,
    ink: Option<InkCanvas>,
    speech: Speech,
    listeners: Vec<Listener>,
    /// Training Start/Pause and "Go to Battlefield" buttons.
    control_listeners: Vec<Listener>,
}

thread_local! {
    static APP: RefCell<Option<App>> = const { RefCell::new(None) };
    static FRAME_LOOP: RefCell<Option<FrameLoop>> = const { RefCell::new(None) };
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Self-rescheduling `requestAnimationFrame` task with an explicit cancel.
struct FrameLoop {
    callback: FrameCallback,
    handle: Rc<RefCell<Option<i32>>>,
}

impl FrameLoop {
    fn start(mut on_frame: impl FnMut(f64) + 'static) -> Result<Self, JsValue> {
        let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
        let callback: FrameCallback = Rc::new(RefCell::new(None));
        let handle: Rc<RefCell<Option<i32>>> = Rc::new(RefCell::new(None));
        let cb = callback.clone();
        let h = handle.clone();
        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            // Cancelled between scheduling and firing.
            if h.borrow().is_none() {
                return;
            }
            on_frame(ts);
            let next = window().and_then(|w| {
                cb.borrow()
                    .as_ref()
                    .and_then(|c| w.request_animation_frame(c.as_ref().unchecked_ref()).ok())
            });
            *h.borrow_mut() = next;
        }) as Box<dyn FnMut(f64)>));
        let first = callback
            .borrow()
            .as_ref()
            .map(|c| win.request_animation_frame(c.as_ref().unchecked_ref()))
            .transpose()?;
        *handle.borrow_mut() = first;
        Ok(Self { callback, handle })
    }

    fn cancel(&self) {
        if let Some(id) = self.handle.borrow_mut().take() {
            if let Some(w) = window() {
                let _ = w.cancel_animation_frame(id);
            }
        }
        // Break the closure's self-reference.
        self.callback.borrow_mut().take();
    }
}

/// Route one event through the controller and apply its effects. Re-entrant
/// calls (an effect synchronously triggering another event) are dropped.
fn dispatch(event: Event) {
    APP.with(|cell| {
        let Ok(mut guard) = cell.try_borrow_mut() else {
            return;
        };
        if let Some(app) = guard.as_mut() {
            let effects = app.game.handle(now_ms(), event);
            for effect in effects {
                if let Err(err) = app.apply(effect) {
                    log::warn!("effect failed: {err:?}");
                }
            }
        }
    });
}

fn on_frame() {
    dispatch(Event::Frame);
    APP.with(|cell| {
        if let Ok(guard) = cell.try_borrow() {
            if let Some(app) = guard.as_ref() {
                app.sync_views();
            }
        }
    });
}

/// An attached DOM listener. Dropping it detaches the callback and frees
/// the closure.
struct Listener(Option<Box<dyn FnOnce()>>);

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(detach) = self.0.take() {
            detach();
        }
    }
}

fn listen<E: FromWasmAbi + 'static>(
    target: &EventTarget,
    kind: &'static str,
    handler: impl FnMut(E) + 'static,
) -> Result<Listener, JsValue> {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(E)>);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    let target = target.clone();
    Ok(Listener(Some(Box::new(move || {
        let _ = target.remove_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
    }))))
}

fn on_click(target: Option<&HtmlElement>, event: Event) -> Result<Option<Listener>, JsValue> {
    target
        .map(|el| listen(el, "click", move |_: MouseEvent| dispatch(event.clone())))
        .transpose()
}

/// `data-*` value on the nearest ancestor matching `selector`.
fn delegated_data(evt: &MouseEvent, selector: &str, attr: &str) -> Option<String> {
    let target: Element = evt.target()?.dyn_into().ok()?;
    target.closest(selector).ok()??.get_attribute(attr)
}

impl App {
    fn bind(&mut self) -> Result<(), JsValue> {
        let s = &self.surface;
        let mut bound = Vec::new();
        bound.extend(on_click(s.choose_battle.as_ref(), Event::ChooseBattlefield)?);
        bound.extend(on_click(s.choose_training.as_ref(), Event::ChooseTraining)?);
        bound.extend(on_click(s.close_card.as_ref(), Event::CloseCard)?);

        // One delegated listener per container instead of one per element.
        bound.push(listen(&s.field, "click", |evt: MouseEvent| {
            if let Some(id) = delegated_data(&evt, ".bullet", "data-id").and_then(|v| v.parse().ok()) {
                dispatch(Event::BulletClicked(id));
            }
        })?);
        if let Some(opts) = s.quiz_options.as_ref() {
            bound.push(listen(opts, "click", |evt: MouseEvent| {
                if let Some(i) = delegated_data(&evt, ".quiz-btn", "data-index").and_then(|v| v.parse().ok()) {
                    dispatch(Event::AnswerSelected(i));
                }
            })?);
        }

        if let Some(prompt) = s.quiz_word.as_ref() {
            prompt.set_attribute("tabindex", "0")?;
            prompt.set_attribute("role", "button")?;
            prompt.set_attribute("aria-label", "Play Chinese pronunciation")?;
            bound.push(listen(prompt, "click", |_: MouseEvent| dispatch(Event::QuizPromptActivated))?);
            bound.push(listen(prompt, "keydown", |evt: KeyboardEvent| {
                let key = evt.key();
                if key == "Enter" || key == " " {
                    evt.prevent_default();
                    dispatch(Event::QuizPromptActivated);
                }
            })?);
        }

        let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
        let field = s.field.clone();
        bound.push(listen(&win, "resize", move |_: web_sys::Event| {
            dispatch(Event::Resized {
                width: field.client_width() as f64,
                height: field.client_height() as f64,
            });
        })?);
        self.listeners = bound;

        self.speech.watch_voices(|| {
            APP.with(|cell| {
                if let Ok(mut guard) = cell.try_borrow_mut() {
                    if let Some(app) = guard.as_mut() {
                        app.speech.load_voices();
                    }
                }
            });
        });
        Ok(())
    }

    fn apply(&mut self, effect: Effect) -> Result<(), JsValue> {
        match effect {
            Effect::Speak(word) => self.speech.speak(&word),
            Effect::RemoveChoiceGroup => {
                if let Some(group) = self.surface.choice_group.take() {
                    group.remove();
                }
            }
            Effect::ShowTrainingControls => self.mount_training_controls()?,
            Effect::SetRunning(running) => {
                let btn = self.surface.spawn_button.as_ref();
                set_text(btn, if running { "Pause" } else { "Start" });
                set_attr(btn, "aria-pressed", if running { "true" } else { "false" });
            }
            Effect::HideTopControls => {
                if let Some(m) = self.surface.start_mount.as_ref() {
                    m.set_inner_html("");
                }
                self.surface.spawn_button = None;
                self.control_listeners.clear();
                if let Some(sub) = self.surface.subtitle.as_ref() {
                    sub.set_hidden(true);
                }
            }
            Effect::ShowCard { word, meaning } => {
                set_text(self.surface.word_text.as_ref(), &word);
                set_text(self.surface.meaning_text.as_ref(), &meaning);
                set_attr(self.surface.card.as_ref(), "aria-hidden", "false");
            }
            Effect::HideCard => set_attr(self.surface.card.as_ref(), "aria-hidden", "true"),
            Effect::BulletSpawned(id) => self.create_view(id)?,
            Effect::BulletRemoved(id) => {
                if let Some(el) = self.views.remove(&id) {
                    el.remove();
                }
            }
            Effect::FieldCleared => {
                for (_, el) in self.views.drain() {
                    el.remove();
                }
            }
            Effect::ShowQuiz => set_attr(self.surface.quiz.as_ref(), "aria-hidden", "false"),
            Effect::HideQuiz => set_attr(self.surface.quiz.as_ref(), "aria-hidden", "true"),
            Effect::RenderQuestion(q) => self.render_question(&q)?,
            Effect::QuizUnavailable => {
                if let Some(opts) = self.surface.quiz_options.as_ref() {
                    opts.set_inner_html("");
                }
            }
            Effect::QuizHint { text, kind } => {
                if let Some(hint) = self.surface.quiz_hint.as_ref() {
                    hint.set_text_content(Some(text));
                    let classes = hint.class_list();
                    classes.toggle_with_force("success", kind == HintKind::Success)?;
                    classes.toggle_with_force("error", kind == HintKind::Error)?;
                }
            }
            Effect::ClearQuizHint => {
                if let Some(hint) = self.surface.quiz_hint.as_ref() {
                    hint.set_text_content(Some(""));
                    hint.class_list().remove_2("success", "error")?;
                }
            }
            Effect::EnterBattle => {
                self.ink = Some(InkCanvas::attach(&self.surface.doc, &self.surface.field)?);
            }
            Effect::InkFrame(discs) => {
                if let Some(ink) = self.ink.as_ref() {
                    ink.draw(&discs)?;
                }
            }
            Effect::RevealOverlay => fade_in(self.surface.overlay.as_ref()),
            Effect::RevealMessage => fade_in(self.surface.message.as_ref()),
            Effect::Relayout { .. } => {
                if let Some(ink) = self.ink.as_ref() {
                    ink.resize(&self.surface.field)?;
                }
            }
        }
        Ok(())
    }

    fn mount_training_controls(&mut self) -> Result<(), JsValue> {
        let doc = &self.surface.doc;
        if let Some(sub) = self.surface.subtitle.as_ref() {
            sub.set_hidden(false);
        }
        let Some(mount) = self.surface.start_mount.as_ref() else {
            return Ok(());
        };
        let group: HtmlElement = doc.create_element("div")?.dyn_into()?;
        group.set_class_name("btn-group");

        let spawn: HtmlElement = doc.create_element("button")?.dyn_into()?;
        spawn.set_id("spawnBtn");
        spawn.set_class_name("btn");
        spawn.set_attribute("type", "button")?;
        spawn.set_attribute("aria-pressed", "false")?;
        spawn.set_text_content(Some("Start"));
        group.append_child(&spawn)?;

        let battle: HtmlElement = doc.create_element("button")?.dyn_into()?;
        battle.set_id("btnGotoBattle");
        battle.set_class_name("btn");
        battle.set_attribute("type", "button")?;
        battle.set_text_content(Some("Go to Battlefield"));
        group.append_child(&battle)?;

        mount.set_inner_html("");
        mount.append_child(&group)?;

        self.control_listeners = [
            on_click(Some(&spawn), Event::ToggleRunning)?,
            on_click(Some(&battle), Event::GoToBattlefield)?,
        ]
        .into_iter()
        .flatten()
        .collect();
        self.surface.spawn_button = Some(spawn);
        Ok(())
    }

    fn create_view(&mut self, id: BulletId) -> Result<(), JsValue> {
        let Some(b) = self.game.field().get(id) else {
            return Ok(());
        };
        let el: HtmlElement = self.surface.doc.create_element("span")?.dyn_into()?;
        el.set_class_name(match (b.kind, b.origin) {
            (BulletKind::Battle, Some(Side::Left)) => "bullet inky from-left",
            (BulletKind::Battle, _) => "bullet inky from-right",
            (BulletKind::Training, _) => "bullet",
        });
        el.set_text_content(Some(&b.word));
        el.set_attribute("data-id", &id.to_string())?;
        if let Some(lane) = b.lane {
            el.set_attribute("data-lane", &lane.to_string())?;
        }
        let style = el.style();
        style.set_property("position", "absolute")?;
        style.set_property("left", "0px")?;
        style.set_property("white-space", "nowrap")?;
        style.set_property("top", &format!("{}px", b.top))?;
        style.set_property(
            "transform",
            &format!("translateX({}px)", b.left(self.game.field().width)),
        )?;
        self.surface.field.append_child(&el)?;

        // Measure once attached; the model keeps its estimate otherwise.
        let font_size = window()
            .and_then(|w| w.get_computed_style(&el).ok().flatten())
            .and_then(|cs| cs.get_property_value("font-size").ok())
            .and_then(|v| v.trim_end_matches("px").parse::<f64>().ok())
            .unwrap_or(0.0);
        let (w, h) = (el.offset_width() as f64, el.offset_height() as f64);
        if w > 0.0 && h > 0.0 {
            self.game.field_mut().set_extent(id, w, h, font_size);
        }
        self.views.insert(id, el);
        Ok(())
    }

    /// Mirror logical bullet state onto the elements.
    fn sync_views(&self) {
        let field = self.game.field();
        for b in field.iter() {
            let Some(el) = self.views.get(&b.id) else {
                continue;
            };
            let style = el.style();
            let _ = style.set_property("top", &format!("{}px", b.top));
            let _ = style.set_property("transform", &format!("translateX({:.1}px)", b.left(field.width)));
            let _ = el.class_list().toggle_with_force("is-selected", b.locked);
        }
    }

    fn render_question(&self, q: &QuizQuestion) -> Result<(), JsValue> {
        let doc = &self.surface.doc;
        if let Some(prompt) = self.surface.quiz_word.as_ref() {
            prompt.set_inner_html("");
            match q.segments() {
                Some((before, word, after)) => {
                    prompt.append_child(&doc.create_text_node(before))?;
                    let mark = doc.create_element("span")?;
                    mark.set_class_name("zh");
                    mark.set_text_content(Some(word));
                    prompt.append_child(&mark)?;
                    prompt.append_child(&doc.create_text_node(after))?;
                }
                None => {
                    prompt.append_child(&doc.create_text_node(&q.sentence))?;
                }
            }
        }
        if let Some(opts) = self.surface.quiz_options.as_ref() {
            opts.set_inner_html("");
            for (i, opt) in q.options.iter().enumerate() {
                let btn = doc.create_element("button")?;
                btn.set_class_name("quiz-btn");
                btn.set_attribute("type", "button")?;
                btn.set_attribute("data-index", &i.to_string())?;
                btn.set_text_content(Some(&opt.text));
                opts.append_child(&btn)?;
            }
        }
        Ok(())
    }
}

async fn fetch_words() -> Result<String, JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let resp: Response = JsFuture::from(win.fetch_with_str(DATA_URL)).await?.dyn_into()?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("{DATA_URL}: HTTP {}", resp.status())));
    }
    JsFuture::from(resp.text()?)
        .await?
        .as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}

/// Fetch the dataset, falling back to the built-in words on any failure.
pub async fn load_words() -> WordBank {
    match fetch_words().await {
        Ok(text) => WordBank::from_json_or_fallback(&text),
        Err(err) => {
            log::warn!("failed to load {DATA_URL} ({err:?}); using built-in fallback words");
            WordBank::fallback()
        }
    }
}

/// Build the app around `words` and start the frame loop.
pub fn launch(words: WordBank, mounts: &Mounts) -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let surface = Surface::resolve(doc, mounts)?;
    if let Some(sub) = surface.subtitle.as_ref() {
        sub.set_hidden(true);
    }
    if let Some(m) = surface.start_mount.as_ref() {
        m.set_inner_html("");
    }
    conceal(surface.overlay.as_ref());
    conceal(surface.message.as_ref());

    let (width, height) = surface.field_size();
    log::info!("loaded {} words; field {width}x{height}", words.len());
    let game = Game::new(words, Rng::from_entropy(now_ms()), width, height);
    let mut app = App {
        game,
        surface,
        views: HashMap::new(),
        ink: None,
        speech: Speech::new(),
        listeners: Vec::new(),
        control_listeners: Vec::new(),
    };
    app.bind()?;
    APP.with(|cell| *cell.borrow_mut() = Some(app));

    let frames = FrameLoop::start(|_ts| on_frame())?;
    FRAME_LOOP.with(|cell| {
        if let Some(old) = cell.replace(Some(frames)) {
            old.cancel();
        }
    });
    Ok(())
}

/// Cancel the frame loop and drop all game state, detaching every listener
/// the app bound. A later `launch` binds afresh.
pub fn shutdown() {
    FRAME_LOOP.with(|cell| {
        if let Some(frames) = cell.borrow_mut().take() {
            frames.cancel();
        }
    });
    APP.with(|cell| {
        if let Ok(mut guard) = cell.try_borrow_mut() {
            guard.take();
        }
    });
}
