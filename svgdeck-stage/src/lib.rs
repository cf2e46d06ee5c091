use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use tracing::debug;

use svgdeck_core::{AnimationData, Cursor, Presenter, Slide, SlideSwap, StageBackend};

/// Uniform scale fitting the fixed design canvas into the actual window,
/// rounded to two decimals the way the presentation root applies it.
pub fn compute_scale(canvas: (f32, f32), window: (f32, f32)) -> f32 {
    let ratio = fit_ratio(canvas, window);
    if ratio <= 0.0 {
        return 1.0;
    }
    ((1.0 / ratio) * 100.0).round() / 100.0
}

/// Unrounded limiting ratio. The embedded plot widget is not aware of the
/// root transform, so its container gets this factor applied directly.
pub fn plot_fit_ratio(canvas: (f32, f32), window: (f32, f32)) -> f32 {
    let ratio = fit_ratio(canvas, window);
    if ratio <= 0.0 {
        1.0
    } else {
        ratio
    }
}

fn fit_ratio(canvas: (f32, f32), window: (f32, f32)) -> f32 {
    let (canvas_w, canvas_h) = canvas;
    let (window_w, window_h) = window;
    let finite = canvas_w.is_finite()
        && canvas_h.is_finite()
        && window_w.is_finite()
        && window_h.is_finite();
    if !finite || canvas_w <= 0.0 || canvas_h <= 0.0 || window_w <= 0.0 || window_h <= 0.0 {
        return 0.0;
    }
    (canvas_w / window_w).max(canvas_h / window_h)
}

/// Reconciles the design resolution with the window and choreographs content
/// swaps against the hosting surface.
pub struct ViewportAdapter {
    backend: Arc<dyn StageBackend>,
    plot_slide: Mutex<Option<i32>>,
}

impl ViewportAdapter {
    pub fn new(backend: Arc<dyn StageBackend>) -> Self {
        Self {
            backend,
            plot_slide: Mutex::new(None),
        }
    }

    /// Re-applies the root scale; runs on startup, on every resize and after
    /// every content swap.
    pub fn refresh(&self) -> Result<()> {
        let window = self.backend.window_size()?;
        let canvas = self.backend.canvas_size()?;
        let scale = compute_scale(canvas, window);
        self.backend.set_root_scale(scale)?;
        self.rescale_embedded_plot()
    }

    pub fn rescale_embedded_plot(&self) -> Result<()> {
        let Some(slide) = *self.plot_slide.lock() else {
            return Ok(());
        };
        let window = self.backend.window_size()?;
        let canvas = self.backend.canvas_size()?;
        let ratio = plot_fit_ratio(canvas, window);
        self.backend.set_embedded_plot_scale(slide, ratio)
    }

    pub fn toggle_media(&self, cursor: Cursor) -> Result<()> {
        if cursor.is_valid() {
            self.backend.toggle_media(cursor)
        } else {
            Ok(())
        }
    }

    pub fn request_fullscreen(&self) -> Result<()> {
        self.backend.request_fullscreen()
    }
}

impl Presenter for ViewportAdapter {
    fn apply(&self, swap: &SlideSwap) -> Result<()> {
        if swap.previous.is_valid() {
            self.backend.pause_media(swap.previous)?;
            self.backend.set_layer_visible(swap.previous, false)?;
        }
        self.backend.apply_markup(&swap.markup)?;
        self.backend.set_layer_visible(swap.cursor, true)?;
        self.backend.start_autoplay_media(swap.cursor)?;
        if swap.has_embedded_plot {
            // the widget repopulates the container itself; clear first so a
            // stale plot never survives the swap
            self.backend.clear_embedded_plot(swap.cursor.slide)?;
            self.backend.load_embedded_plot(swap.cursor.slide)?;
            *self.plot_slide.lock() = Some(swap.cursor.slide);
        } else {
            *self.plot_slide.lock() = None;
        }
        self.refresh()
    }
}

struct ActiveAnimation {
    cursor: Cursor,
    id: String,
    frames: Vec<String>,
    next_frame: usize,
    interval: Duration,
    due: Instant,
}

/// The one recurring task in the runtime: fixed-interval frame substitution
/// for inline animations, owned by the active layer and cancelled explicitly
/// on navigation away.
pub struct AnimationScheduler {
    backend: Arc<dyn StageBackend>,
    active: Vec<ActiveAnimation>,
}

impl AnimationScheduler {
    pub fn new(backend: Arc<dyn StageBackend>) -> Self {
        Self {
            backend,
            active: Vec::new(),
        }
    }

    /// Cancels everything stale, then schedules the autoplay animations of
    /// the newly applied layer.
    pub fn activate(&mut self, cursor: Cursor, slide: &Slide, now: Instant) {
        self.cancel_except(cursor);
        for (id, animation) in slide.animations() {
            if animation.autoplay {
                self.schedule(cursor, id, animation, now);
            }
        }
    }

    /// Starts the layer's remaining animations on an explicit trigger;
    /// animations already in flight keep their position.
    pub fn trigger(&mut self, cursor: Cursor, slide: &Slide, now: Instant) {
        for (id, animation) in slide.animations() {
            let running = self
                .active
                .iter()
                .any(|active| active.cursor == cursor && active.id == *id);
            if !running {
                self.schedule(cursor, id, animation, now);
            }
        }
    }

    fn schedule(&mut self, cursor: Cursor, id: &str, animation: &AnimationData, now: Instant) {
        if animation.frames.len() < 2 {
            // frame 0 is already part of the slide markup
            return;
        }
        let fps = animation.fps.clamp(0.1, 120.0);
        let interval = Duration::from_secs_f32(1.0 / fps);
        self.active.push(ActiveAnimation {
            cursor,
            id: id.to_string(),
            frames: animation.frames.clone(),
            next_frame: 1,
            interval,
            due: now + interval,
        });
    }

    /// Stale timers from a navigated-away layer must never keep mutating
    /// content; they are dropped here, not left to run out hidden.
    pub fn cancel_except(&mut self, cursor: Cursor) {
        let before = self.active.len();
        self.active.retain(|animation| animation.cursor == cursor);
        let dropped = before - self.active.len();
        if dropped > 0 {
            debug!(dropped, "cancelled stale animations");
        }
    }

    pub fn cancel_all(&mut self) {
        self.active.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Substitutes every due frame and drops animations that reached their
    /// terminal frame count.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        for animation in &mut self.active {
            while animation.due <= now && animation.next_frame < animation.frames.len() {
                backend.substitute_animation_frame(
                    animation.cursor,
                    &animation.id,
                    &animation.frames[animation.next_frame],
                )?;
                animation.next_frame += 1;
                animation.due += animation.interval;
            }
        }
        self.active
            .retain(|animation| animation.next_frame < animation.frames.len());
        Ok(())
    }
}
