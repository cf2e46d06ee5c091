use std::io::Write;

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use parking_lot::Mutex;
use tracing::debug;

use svgdeck_core::{Cursor, StageBackend};

pub const DEFAULT_SWIPE_THRESHOLD: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    Forward,
    Back,
    GoStart,
    GoEnd,
    ToggleFullscreen,
    ToggleActiveMedia,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Intent(NavIntent),
    /// A raw address the host loop writes to the location directly, taking
    /// the same path as a pasted link.
    AddressJump(String),
    TriggerAnimations,
    Resized,
    Quit,
    None,
}

/// Sign-normalizes a raw wheel delta into a single navigation step: one step
/// per event regardless of the magnitude the source reports.
pub fn wheel_intent(delta: f32) -> Option<NavIntent> {
    if delta > 0.0 {
        Some(NavIntent::Back)
    } else if delta < 0.0 {
        Some(NavIntent::Forward)
    } else {
        None
    }
}

/// Horizontal gesture tracking: one intent per gesture once the displacement
/// from the press origin crosses the threshold, then nothing until the next
/// press begins.
#[derive(Debug)]
pub struct SwipeTracker {
    threshold: f32,
    origin: Option<f32>,
}

impl SwipeTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.max(1.0),
            origin: None,
        }
    }

    pub fn begin(&mut self, x: f32) {
        self.origin = Some(x);
    }

    pub fn displace(&mut self, x: f32) -> Option<NavIntent> {
        let origin = self.origin?;
        let delta = origin - x;
        if delta > self.threshold {
            self.origin = None;
            Some(NavIntent::Forward)
        } else if delta < -self.threshold {
            self.origin = None;
            Some(NavIntent::Back)
        } else {
            None
        }
    }
}

/// Maps raw terminal events to navigation intents.
pub struct EventRouter {
    swipe: SwipeTracker,
    wheel_enabled: bool,
    plot_active: bool,
    pending_digits: String,
}

impl EventRouter {
    pub fn new(swipe_threshold: f32) -> Self {
        Self {
            swipe: SwipeTracker::new(swipe_threshold),
            wheel_enabled: true,
            plot_active: false,
            pending_digits: String::new(),
        }
    }

    pub fn set_wheel_enabled(&mut self, enabled: bool) {
        self.wheel_enabled = enabled;
    }

    /// The embedded plot owns the pointer while visible; wheel navigation is
    /// suppressed entirely to stay out of its scroll handling.
    pub fn set_embedded_plot_active(&mut self, active: bool) {
        self.plot_active = active;
    }

    /// Digits collected towards a slide jump, for the status line.
    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }

    pub fn route(&mut self, event: &Event) -> UiEvent {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.route_key(key),
            Event::Mouse(mouse) => self.route_mouse(mouse),
            Event::Resize(..) => UiEvent::Resized,
            _ => UiEvent::None,
        }
    }

    fn route_key(&mut self, key: &KeyEvent) -> UiEvent {
        // modified combinations are reserved for the host environment
        if !key.modifiers.is_empty() {
            self.pending_digits.clear();
            return UiEvent::None;
        }
        match key.code {
            KeyCode::Left | KeyCode::Up | KeyCode::PageUp => self.intent(NavIntent::Back),
            KeyCode::Right | KeyCode::Down | KeyCode::PageDown => self.intent(NavIntent::Forward),
            KeyCode::Home => self.intent(NavIntent::GoStart),
            KeyCode::End => self.intent(NavIntent::GoEnd),
            KeyCode::Char(' ') => self.intent(NavIntent::ToggleActiveMedia),
            KeyCode::Char('f') => self.intent(NavIntent::ToggleFullscreen),
            KeyCode::Char('a') => {
                self.pending_digits.clear();
                UiEvent::TriggerAnimations
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.pending_digits.push(c);
                UiEvent::None
            }
            KeyCode::Enter if !self.pending_digits.is_empty() => {
                let slide = std::mem::take(&mut self.pending_digits);
                UiEvent::AddressJump(format!("#{}-0", slide))
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                self.pending_digits.clear();
                UiEvent::Quit
            }
            _ => {
                self.pending_digits.clear();
                UiEvent::None
            }
        }
    }

    fn route_mouse(&mut self, mouse: &MouseEvent) -> UiEvent {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.wheel(1.0),
            MouseEventKind::ScrollDown => self.wheel(-1.0),
            MouseEventKind::Down(MouseButton::Left) => {
                self.swipe.begin(f32::from(mouse.column));
                UiEvent::None
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                match self.swipe.displace(f32::from(mouse.column)) {
                    Some(intent) => UiEvent::Intent(intent),
                    None => UiEvent::None,
                }
            }
            _ => UiEvent::None,
        }
    }

    fn wheel(&mut self, delta: f32) -> UiEvent {
        if !self.wheel_enabled {
            return UiEvent::None;
        }
        if self.plot_active {
            debug!("wheel suppressed while the embedded plot is active");
            return UiEvent::None;
        }
        match wheel_intent(delta) {
            Some(intent) => UiEvent::Intent(intent),
            None => UiEvent::None,
        }
    }

    fn intent(&mut self, intent: NavIntent) -> UiEvent {
        self.pending_digits.clear();
        UiEvent::Intent(intent)
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(DEFAULT_SWIPE_THRESHOLD)
    }
}

/// Observable stage state, for the status line and for tests.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    pub visible: Option<Cursor>,
    pub scale: f32,
    pub markup_bytes: usize,
    pub media_playing: bool,
    pub plot_loaded: Option<i32>,
    pub frames_applied: usize,
}

struct StageState<W> {
    writer: W,
    design: (f32, f32),
    scale: f32,
    visible: Option<Cursor>,
    markup_bytes: usize,
    media_playing: bool,
    plot_loaded: Option<i32>,
    frames_applied: usize,
}

/// Terminal implementation of the hosting surface: content is opaque markup,
/// so the stage tracks what is on display and draws a compact status header
/// instead of rasterizing anything.
pub struct TerminalStage<W: Write> {
    inner: Mutex<StageState<W>>,
}

impl<W: Write> TerminalStage<W> {
    pub fn new(writer: W, design: (f32, f32)) -> Self {
        Self {
            inner: Mutex::new(StageState {
                writer,
                design,
                scale: 1.0,
                visible: None,
                markup_bytes: 0,
                media_playing: false,
                plot_loaded: None,
                frames_applied: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> StageSnapshot {
        let state = self.inner.lock();
        StageSnapshot {
            visible: state.visible,
            scale: state.scale,
            markup_bytes: state.markup_bytes,
            media_playing: state.media_playing,
            plot_loaded: state.plot_loaded,
            frames_applied: state.frames_applied,
        }
    }

    /// Writes a transient note below the status header.
    pub fn note(&self, note: &str) -> Result<()> {
        let state = &mut *self.inner.lock();
        crossterm::queue!(
            state.writer,
            MoveTo(0, 1),
            Clear(ClearType::CurrentLine),
            Print(note)
        )?;
        state.writer.flush()?;
        Ok(())
    }
}

fn redraw<W: Write>(state: &mut StageState<W>) -> Result<()> {
    let line = match state.visible {
        Some(cursor) => format!(
            "svgdeck | slide {} layer {} | scale {:.2} | {} bytes{}{}{}",
            cursor.slide,
            cursor.layer,
            state.scale,
            state.markup_bytes,
            if state.media_playing { " | media" } else { "" },
            if state.plot_loaded.is_some() {
                " | plot"
            } else {
                ""
            },
            if state.frames_applied > 0 {
                format!(" | {} frames", state.frames_applied)
            } else {
                String::new()
            },
        ),
        None => "svgdeck | no layer selected".to_string(),
    };
    crossterm::queue!(
        state.writer,
        MoveTo(0, 0),
        Clear(ClearType::CurrentLine),
        Print(line)
    )?;
    state.writer.flush()?;
    Ok(())
}

impl<W: Write + Send> StageBackend for TerminalStage<W> {
    fn window_size(&self) -> Result<(f32, f32)> {
        if let Ok(size) = terminal::window_size() {
            if size.width > 0 && size.height > 0 {
                return Ok((f32::from(size.width), f32::from(size.height)));
            }
        }
        // no pixel report from the terminal: estimate from the cell grid
        if let Ok((columns, rows)) = terminal::size() {
            if columns > 0 && rows > 0 {
                return Ok((f32::from(columns) * 8.0, f32::from(rows) * 16.0));
            }
        }
        Ok(self.inner.lock().design)
    }

    fn canvas_size(&self) -> Result<(f32, f32)> {
        Ok(self.inner.lock().design)
    }

    fn apply_markup(&self, markup: &str) -> Result<()> {
        let state = &mut *self.inner.lock();
        state.markup_bytes = markup.len();
        state.frames_applied = 0;
        redraw(state)
    }

    fn set_layer_visible(&self, cursor: Cursor, visible: bool) -> Result<()> {
        let state = &mut *self.inner.lock();
        if visible {
            state.visible = Some(cursor);
        } else if state.visible == Some(cursor) {
            state.visible = None;
        }
        redraw(state)
    }

    fn pause_media(&self, cursor: Cursor) -> Result<()> {
        debug!(?cursor, "media paused and rewound");
        self.inner.lock().media_playing = false;
        Ok(())
    }

    fn start_autoplay_media(&self, cursor: Cursor) -> Result<()> {
        debug!(?cursor, "autoplay media restarted");
        let state = &mut *self.inner.lock();
        state.media_playing = true;
        redraw(state)
    }

    fn toggle_media(&self, cursor: Cursor) -> Result<()> {
        debug!(?cursor, "media toggled");
        let state = &mut *self.inner.lock();
        state.media_playing = !state.media_playing;
        redraw(state)
    }

    fn set_root_scale(&self, scale: f32) -> Result<()> {
        let state = &mut *self.inner.lock();
        state.scale = scale;
        redraw(state)
    }

    fn clear_embedded_plot(&self, slide: i32) -> Result<()> {
        debug!(slide, "embedded plot container cleared");
        self.inner.lock().plot_loaded = None;
        Ok(())
    }

    fn load_embedded_plot(&self, slide: i32) -> Result<()> {
        debug!(slide, "embedded plot reloaded");
        let state = &mut *self.inner.lock();
        state.plot_loaded = Some(slide);
        redraw(state)
    }

    fn set_embedded_plot_scale(&self, slide: i32, scale: f32) -> Result<()> {
        debug!(slide, scale, "embedded plot rescaled");
        Ok(())
    }

    fn substitute_animation_frame(
        &self,
        cursor: Cursor,
        animation: &str,
        markup: &str,
    ) -> Result<()> {
        debug!(?cursor, animation, "animation frame substituted");
        let state = &mut *self.inner.lock();
        state.frames_applied += 1;
        state.markup_bytes = markup.len();
        redraw(state)
    }

    fn request_fullscreen(&self) -> Result<()> {
        // no fullscreen capability on a terminal host
        debug!("fullscreen request ignored");
        Ok(())
    }
}
