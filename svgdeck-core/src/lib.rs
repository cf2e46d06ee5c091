use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// The (slide, layer) pair identifying the currently visible content.
///
/// `-1` in either field is the sentinel for "no valid slide/layer selected";
/// it is reachable only through an invalid external address and cleared by the
/// next valid navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub slide: i32,
    pub layer: i32,
}

impl Cursor {
    pub const START: Cursor = Cursor { slide: 0, layer: 0 };
    pub const NONE: Cursor = Cursor {
        slide: -1,
        layer: -1,
    };

    pub fn new(slide: i32, layer: i32) -> Self {
        Self { slide, layer }
    }

    pub fn is_valid(&self) -> bool {
        self.slide >= 0 && self.layer >= 0
    }
}

/// Encodes a cursor as the shareable `#<slide>-<layer>` address.
///
/// No validation: sentinel values are mirrored verbatim.
pub fn encode_address(cursor: Cursor) -> String {
    format!("#{}-{}", cursor.slide, cursor.layer)
}

/// Decodes an address back into a cursor.
///
/// Lenient by design: a missing, malformed or negative segment coerces to 0,
/// so an edited or truncated shared link degrades to the deck start instead
/// of failing.
pub fn decode_address(address: &str) -> Cursor {
    let payload = address.strip_prefix('#').unwrap_or(address);
    let mut segments = payload.splitn(2, '-');
    let slide = parse_segment(segments.next());
    let layer = parse_segment(segments.next());
    Cursor { slide, layer }
}

fn parse_segment(segment: Option<&str>) -> i32 {
    segment
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(0)
}

/// Fragment classes the external plot widget injects into slide markup.
/// Their presence marks the slide as exposing that widget even when the
/// compiler did not declare the capability explicitly.
const PLOT_MARKERS: [&str; 2] = ["plotdiv", "bk-root"];

fn default_fps() -> f32 {
    25.0
}

/// One inline animation: frame 0 is already part of the slide markup, the
/// remaining frames substitute in at a fixed rate.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationData {
    pub frames: Vec<String>,
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub autoplay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    EmbeddedPlot,
}

/// Raw per-slide record as emitted by the offline compiler.
#[derive(Debug, Clone, Deserialize)]
pub struct SlideData {
    pub svg: Vec<String>,
    #[serde(default)]
    pub svg_header: String,
    #[serde(default)]
    pub svg_footer: String,
    #[serde(default)]
    pub svg_animates: BTreeMap<String, AnimationData>,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone)]
pub struct Slide {
    layers: Vec<String>,
    header: String,
    footer: String,
    animations: BTreeMap<String, AnimationData>,
    capabilities: BTreeSet<Capability>,
}

impl Slide {
    fn from_data(data: SlideData) -> Self {
        let mut capabilities = data.capabilities;
        let has_marker = data
            .svg
            .iter()
            .any(|fragment| PLOT_MARKERS.iter().any(|marker| fragment.contains(marker)));
        if has_marker {
            capabilities.insert(Capability::EmbeddedPlot);
        }
        Self {
            layers: data.svg,
            header: data.svg_header,
            footer: data.svg_footer,
            animations: data.svg_animates,
            capabilities,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn max_layer(&self) -> usize {
        self.layers.len() - 1
    }

    /// Full markup for one reveal step: header + layer fragment + footer.
    pub fn compose(&self, layer: usize) -> Option<String> {
        let fragment = self.layers.get(layer)?;
        Some(format!("{}{}{}", self.header, fragment, self.footer))
    }

    pub fn has_embedded_plot(&self) -> bool {
        self.capabilities.contains(&Capability::EmbeddedPlot)
    }

    pub fn animations(&self) -> &BTreeMap<String, AnimationData> {
        &self.animations
    }
}

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("slide {index} out of range (deck has {count} slides)")]
    OutOfRange { index: usize, count: usize },
    #[error("{key:?} is not a valid slide key")]
    BadSlideKey { key: String },
    #[error("slide {key:?} has no layers")]
    EmptySlide { key: String },
    #[error("deck contains no slides")]
    Empty,
    #[error("deck data is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The read-only slide store for one presentation session.
///
/// Built once from the compiler's JSON export, never mutated afterwards.
#[derive(Debug)]
pub struct Deck {
    slides: Vec<Slide>,
}

impl Deck {
    /// Parses the compiler export: a map of `slide_<N>` entries, presented in
    /// ascending `N` order regardless of key order in the document.
    pub fn from_json(raw: &str) -> Result<Self, DeckError> {
        let entries: BTreeMap<String, SlideData> = serde_json::from_str(raw)?;
        let mut ordered = Vec::with_capacity(entries.len());
        for (key, data) in entries {
            let index = key
                .strip_prefix("slide_")
                .and_then(|suffix| suffix.parse::<usize>().ok())
                .ok_or_else(|| DeckError::BadSlideKey { key: key.clone() })?;
            if data.svg.is_empty() {
                return Err(DeckError::EmptySlide { key });
            }
            ordered.push((index, Slide::from_data(data)));
        }
        if ordered.is_empty() {
            return Err(DeckError::Empty);
        }
        ordered.sort_by_key(|(index, _)| *index);
        Ok(Self {
            slides: ordered.into_iter().map(|(_, slide)| slide).collect(),
        })
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slide(&self, index: usize) -> Result<&Slide, DeckError> {
        self.slides.get(index).ok_or(DeckError::OutOfRange {
            index,
            count: self.slides.len(),
        })
    }

    pub fn max_layer(&self, index: usize) -> Result<usize, DeckError> {
        Ok(self.slide(index)?.max_layer())
    }
}

/// Owner of the shareable location the running presentation is addressed by.
///
/// Publishing is the single external side effect of a navigation call;
/// content application happens only once the change is observed back.
pub trait LocationHost: Send + Sync {
    fn current(&self) -> String;
    fn publish(&self, address: &str) -> Result<()>;
}

/// In-process location with change observation. Publishing an address equal
/// to the current one raises no change, matching host hashchange semantics.
#[derive(Default)]
pub struct MemoryLocation {
    inner: Mutex<LocationState>,
}

#[derive(Default)]
struct LocationState {
    address: String,
    dirty: bool,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the latest unobserved address change, if any.
    pub fn take_change(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        if inner.dirty {
            inner.dirty = false;
            Some(inner.address.clone())
        } else {
            None
        }
    }
}

impl LocationHost for MemoryLocation {
    fn current(&self) -> String {
        self.inner.lock().address.clone()
    }

    fn publish(&self, address: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.address != address {
            inner.address = address.to_string();
            inner.dirty = true;
        }
        Ok(())
    }
}

/// A single content swap computed by the navigator.
#[derive(Debug, Clone)]
pub struct SlideSwap {
    pub previous: Cursor,
    pub cursor: Cursor,
    pub markup: String,
    pub has_embedded_plot: bool,
}

/// Applies a computed swap to the visible presentation.
pub trait Presenter: Send + Sync {
    fn apply(&self, swap: &SlideSwap) -> Result<()>;
}

/// Low-level operations the hosting surface exposes to the runtime.
///
/// A host lacking one of these capabilities implements it as a no-op; a
/// missing feature never fails the event loop.
pub trait StageBackend: Send + Sync {
    fn window_size(&self) -> Result<(f32, f32)>;
    /// Size of the fixed design canvas the deck was authored at.
    fn canvas_size(&self) -> Result<(f32, f32)>;
    fn apply_markup(&self, markup: &str) -> Result<()>;
    fn set_layer_visible(&self, cursor: Cursor, visible: bool) -> Result<()>;
    /// Pause the layer's media and rewind it to time zero.
    fn pause_media(&self, cursor: Cursor) -> Result<()>;
    /// Restart the layer's autoplay media from time zero.
    fn start_autoplay_media(&self, cursor: Cursor) -> Result<()>;
    fn toggle_media(&self, cursor: Cursor) -> Result<()>;
    fn set_root_scale(&self, scale: f32) -> Result<()>;
    fn clear_embedded_plot(&self, slide: i32) -> Result<()>;
    fn load_embedded_plot(&self, slide: i32) -> Result<()>;
    /// The widget manages its own coordinate system; this applies the inverse
    /// factor to its container instead of the root transform.
    fn set_embedded_plot_scale(&self, slide: i32, scale: f32) -> Result<()>;
    fn substitute_animation_frame(
        &self,
        cursor: Cursor,
        animation: &str,
        markup: &str,
    ) -> Result<()>;
    fn request_fullscreen(&self) -> Result<()>;
}

#[async_trait::async_trait]
pub trait DeckProvider: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Deck>;
}

/// Loads a deck from the compiler's JSON export on disk.
pub struct FileDeckProvider;

#[async_trait::async_trait]
impl DeckProvider for FileDeckProvider {
    async fn load(&self, path: &Path) -> Result<Deck> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read deck data from {:?}", path))?;
        let deck = Deck::from_json(&raw)
            .with_context(|| format!("failed to decode deck data from {:?}", path))?;
        Ok(deck)
    }
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    AddressPublished(String),
    ContentApplied { cursor: Cursor },
    SlideMissing { slide: i32 },
    LayerMissing { slide: i32, layer: i32 },
}

/// The navigation engine: exclusive owner of the cursor.
///
/// Transitions publish an address; the visual swap happens only when the
/// published change is observed back through `sync_from_address`, so the
/// publish-before-apply ordering holds for every navigation call.
pub struct Navigator {
    deck: Arc<Deck>,
    location: Arc<dyn LocationHost>,
    presenter: Arc<dyn Presenter>,
    cursor: Cursor,
    max_layer: usize,
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl Navigator {
    pub fn new(
        deck: Arc<Deck>,
        location: Arc<dyn LocationHost>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            deck,
            location,
            presenter,
            cursor: Cursor::NONE,
            max_layer: 0,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<EngineEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        if !self.cursor.is_valid() {
            return None;
        }
        self.deck.slide(self.cursor.slide as usize).ok()
    }

    /// Adopts whatever address the host location already carries; an empty or
    /// malformed one lands on the first slide.
    pub fn init(&mut self) -> Result<()> {
        let address = self.location.current();
        self.sync_from_address(&address)
    }

    pub fn forward(&self) -> Result<()> {
        let Cursor { slide, layer } = self.cursor;
        if slide < 0 {
            return self.publish(Cursor::START);
        }
        if layer < 0 {
            return self.publish(Cursor::new(slide, 0));
        }
        if layer < self.max_layer as i32 {
            return self.publish(Cursor::new(slide, layer + 1));
        }
        if slide as usize + 1 >= self.deck.slide_count() {
            // saturate at the deck end
            return Ok(());
        }
        self.publish(Cursor::new(slide + 1, 0))
    }

    pub fn back(&self) -> Result<()> {
        let Cursor { slide, layer } = self.cursor;
        if slide < 0 {
            return self.publish(Cursor::START);
        }
        if layer < 0 {
            return self.publish(Cursor::new(slide, 0));
        }
        if layer > 0 {
            return self.publish(Cursor::new(slide, layer - 1));
        }
        if slide == 0 {
            return Ok(());
        }
        let previous = (slide - 1) as usize;
        let max_layer = self.deck.max_layer(previous)? as i32;
        self.publish(Cursor::new(slide - 1, max_layer))
    }

    pub fn go_start(&self) -> Result<()> {
        self.publish(Cursor::START)
    }

    pub fn go_end(&self) -> Result<()> {
        let last = self.deck.slide_count() - 1;
        let max_layer = self.deck.max_layer(last)? as i32;
        self.publish(Cursor::new(last as i32, max_layer))
    }

    fn publish(&self, cursor: Cursor) -> Result<()> {
        let address = encode_address(cursor);
        self.location.publish(&address)?;
        self.events
            .lock()
            .push(EngineEvent::AddressPublished(address));
        Ok(())
    }

    /// Reacts to an observed address change (own publish or an external
    /// edit); a no-op when the address already matches the cursor.
    pub fn sync_from_address(&mut self, address: &str) -> Result<()> {
        let target = decode_address(address);
        if target == self.cursor {
            return Ok(());
        }
        self.set_cursor(target.slide, target.layer)
    }

    /// Adopts a cursor and applies its content. Out-of-range targets move to
    /// the matching sentinel and leave the previous content visible.
    #[instrument(skip(self))]
    pub fn set_cursor(&mut self, slide: i32, layer: i32) -> Result<()> {
        let count = self.deck.slide_count() as i32;
        if slide < 0 || slide >= count {
            warn!(slide, count, "slide not found, keeping current content");
            self.cursor = Cursor::NONE;
            self.max_layer = 0;
            self.events.lock().push(EngineEvent::SlideMissing { slide });
            return Ok(());
        }

        let target = self.deck.slide(slide as usize)?;
        let max_layer = target.max_layer() as i32;
        if layer < 0 || layer > max_layer {
            warn!(
                slide,
                layer, max_layer, "layer not found, keeping current content"
            );
            self.cursor = Cursor::new(slide, -1);
            self.max_layer = 0;
            self.events
                .lock()
                .push(EngineEvent::LayerMissing { slide, layer });
            return Ok(());
        }

        let markup = target
            .compose(layer as usize)
            .ok_or(DeckError::OutOfRange {
                index: layer as usize,
                count: target.layer_count(),
            })?;
        let swap = SlideSwap {
            previous: self.cursor,
            cursor: Cursor::new(slide, layer),
            markup,
            has_embedded_plot: target.has_embedded_plot(),
        };
        self.presenter.apply(&swap)?;
        self.cursor = swap.cursor;
        self.max_layer = max_layer as usize;
        debug!(slide, layer, "content applied");
        self.events
            .lock()
            .push(EngineEvent::ContentApplied { cursor: self.cursor });
        Ok(())
    }
}

/// Runtime knobs for the viewer host, loaded from an optional TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Fixed design resolution the deck was authored at.
    pub design_width: f32,
    pub design_height: f32,
    /// Horizontal displacement that completes a swipe gesture.
    pub swipe_threshold: f32,
    pub poll_interval_ms: u64,
    pub wheel_navigation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            design_width: 800.0,
            design_height: 600.0,
            swipe_threshold: 100.0,
            poll_interval_ms: 50,
            wheel_navigation: true,
        }
    }
}

impl ViewerConfig {
    /// Missing file means defaults; a present but broken file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {:?}", path))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config from {:?}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakePresenter {
        swaps: Mutex<Vec<SlideSwap>>,
    }

    impl FakePresenter {
        fn applied(&self) -> Vec<SlideSwap> {
            self.swaps.lock().clone()
        }
    }

    impl Presenter for FakePresenter {
        fn apply(&self, swap: &SlideSwap) -> Result<()> {
            self.swaps.lock().push(swap.clone());
            Ok(())
        }
    }

    fn deck_json(counts: &[usize]) -> String {
        let entries: Vec<String> = counts
            .iter()
            .enumerate()
            .map(|(slide, count)| {
                let layers: Vec<String> = (0..*count)
                    .map(|layer| format!("\"<g>s{} l{}</g>\"", slide, layer))
                    .collect();
                format!("\"slide_{}\": {{ \"svg\": [{}] }}", slide, layers.join(","))
            })
            .collect();
        format!("{{{}}}", entries.join(","))
    }

    fn deck_with_layers(counts: &[usize]) -> Arc<Deck> {
        Arc::new(Deck::from_json(&deck_json(counts)).unwrap())
    }

    fn engine(counts: &[usize]) -> (Navigator, Arc<MemoryLocation>, Arc<FakePresenter>) {
        let location = Arc::new(MemoryLocation::new());
        let presenter = Arc::new(FakePresenter::default());
        let mut navigator = Navigator::new(
            deck_with_layers(counts),
            location.clone(),
            presenter.clone(),
        );
        navigator.init().unwrap();
        (navigator, location, presenter)
    }

    /// Drives the publish -> observe -> apply cycle to quiescence, the way
    /// the host loop does.
    fn pump(navigator: &mut Navigator, location: &MemoryLocation) {
        while let Some(address) = location.take_change() {
            navigator.sync_from_address(&address).unwrap();
        }
    }

    #[test]
    fn forward_walks_layers_then_slides() {
        let (mut navigator, location, _) = engine(&[1, 3, 1]);
        assert_eq!(navigator.cursor(), Cursor::START);

        let expected = [
            Cursor::new(1, 0),
            Cursor::new(1, 1),
            Cursor::new(1, 2),
            Cursor::new(2, 0),
        ];
        for cursor in expected {
            navigator.forward().unwrap();
            pump(&mut navigator, &location);
            assert_eq!(navigator.cursor(), cursor);
        }

        // saturates at the deck end
        navigator.forward().unwrap();
        pump(&mut navigator, &location);
        assert_eq!(navigator.cursor(), Cursor::new(2, 0));
    }

    #[test]
    fn back_walks_to_start_and_saturates() {
        let (mut navigator, location, _) = engine(&[1, 3, 1]);
        navigator.go_end().unwrap();
        pump(&mut navigator, &location);
        assert_eq!(navigator.cursor(), Cursor::new(2, 0));

        let expected = [
            Cursor::new(1, 2),
            Cursor::new(1, 1),
            Cursor::new(1, 0),
            Cursor::new(0, 0),
        ];
        for cursor in expected {
            navigator.back().unwrap();
            pump(&mut navigator, &location);
            assert_eq!(navigator.cursor(), cursor);
        }

        navigator.back().unwrap();
        pump(&mut navigator, &location);
        assert_eq!(navigator.cursor(), Cursor::START);
    }

    #[test]
    fn go_end_targets_last_layer_of_last_slide() {
        let (mut navigator, location, _) = engine(&[2, 4]);
        navigator.go_end().unwrap();
        pump(&mut navigator, &location);
        assert_eq!(navigator.cursor(), Cursor::new(1, 3));
    }

    #[test]
    fn publish_precedes_application() {
        let (mut navigator, location, _) = engine(&[2]);
        let events = navigator.events();
        events.lock().clear();

        navigator.forward().unwrap();
        pump(&mut navigator, &location);

        let drained = events.lock().clone();
        assert!(matches!(drained[0], EngineEvent::AddressPublished(_)));
        assert!(matches!(
            drained[1],
            EngineEvent::ContentApplied {
                cursor: Cursor { slide: 0, layer: 1 }
            }
        ));
    }

    #[test]
    fn address_round_trips_for_well_formed_input() {
        for address in ["#0-0", "#3-2", "#12-5"] {
            assert_eq!(encode_address(decode_address(address)), address);
        }
    }

    #[test]
    fn decode_never_fails_on_junk() {
        assert_eq!(decode_address(""), Cursor::START);
        assert_eq!(decode_address("#"), Cursor::START);
        assert_eq!(decode_address("garbage"), Cursor::START);
        assert_eq!(decode_address("#x-y"), Cursor::START);
        assert_eq!(decode_address("#-3--9"), Cursor::START);
        assert_eq!(decode_address("#4"), Cursor::new(4, 0));
        assert_eq!(decode_address("#1-2-3"), Cursor::new(1, 0));
    }

    #[test]
    fn missing_slide_moves_to_sentinel_and_keeps_content() {
        let (mut navigator, location, presenter) = engine(&[1, 3, 1]);
        let applied_before = presenter.applied().len();

        location.publish("#7-0").unwrap();
        pump(&mut navigator, &location);

        assert_eq!(navigator.cursor(), Cursor::NONE);
        assert_eq!(presenter.applied().len(), applied_before);
    }

    #[test]
    fn missing_layer_moves_to_layer_sentinel_and_keeps_content() {
        let (mut navigator, location, presenter) = engine(&[1, 3, 1]);
        let applied_before = presenter.applied().len();

        location.publish("#1-5").unwrap();
        pump(&mut navigator, &location);

        assert_eq!(navigator.cursor(), Cursor::new(1, -1));
        assert_eq!(presenter.applied().len(), applied_before);
    }

    #[test]
    fn forward_recovers_from_layer_sentinel() {
        let (mut navigator, location, _) = engine(&[1, 3, 1]);
        location.publish("#1-5").unwrap();
        pump(&mut navigator, &location);
        assert_eq!(navigator.cursor(), Cursor::new(1, -1));

        navigator.forward().unwrap();
        pump(&mut navigator, &location);
        assert_eq!(navigator.cursor(), Cursor::new(1, 0));
    }

    #[test]
    fn init_adopts_preset_address() {
        let location = Arc::new(MemoryLocation::new());
        location.publish("#1-1").unwrap();
        location.take_change();
        let presenter = Arc::new(FakePresenter::default());
        let mut navigator = Navigator::new(
            deck_with_layers(&[1, 3, 1]),
            location.clone(),
            presenter.clone(),
        );
        navigator.init().unwrap();

        assert_eq!(navigator.cursor(), Cursor::new(1, 1));
        let swap = presenter.applied().pop().unwrap();
        assert!(swap.markup.contains("s1 l1"));
        assert_eq!(swap.previous, Cursor::NONE);
    }

    #[test]
    fn swap_markup_wraps_layer_in_header_and_footer() {
        let raw = r#"{
            "slide_0": {
                "svg": ["<g>body</g>"],
                "svg_header": "<svg>",
                "svg_footer": "</svg>"
            }
        }"#;
        let deck = Deck::from_json(raw).unwrap();
        assert_eq!(
            deck.slide(0).unwrap().compose(0).unwrap(),
            "<svg><g>body</g></svg>"
        );
    }

    #[test]
    fn deck_orders_slides_by_numeric_suffix() {
        let raw = r#"{
            "slide_10": { "svg": ["<g>ten</g>"] },
            "slide_2": { "svg": ["<g>two</g>"] },
            "slide_0": { "svg": ["<g>zero</g>"] }
        }"#;
        let deck = Deck::from_json(raw).unwrap();
        assert_eq!(deck.slide_count(), 3);
        assert!(deck.slide(0).unwrap().compose(0).unwrap().contains("zero"));
        assert!(deck.slide(1).unwrap().compose(0).unwrap().contains("two"));
        assert!(deck.slide(2).unwrap().compose(0).unwrap().contains("ten"));
    }

    #[test]
    fn deck_rejects_bad_input() {
        assert!(matches!(Deck::from_json("{}"), Err(DeckError::Empty)));
        assert!(matches!(
            Deck::from_json(r#"{ "intro": { "svg": ["<g/>"] } }"#),
            Err(DeckError::BadSlideKey { .. })
        ));
        assert!(matches!(
            Deck::from_json(r#"{ "slide_0": { "svg": [] } }"#),
            Err(DeckError::EmptySlide { .. })
        ));
        assert!(matches!(
            Deck::from_json("not json"),
            Err(DeckError::Parse(_))
        ));
    }

    #[test]
    fn store_queries_fail_out_of_range() {
        let deck = deck_with_layers(&[1, 2]);
        assert!(matches!(
            deck.slide(2),
            Err(DeckError::OutOfRange { index: 2, count: 2 })
        ));
        assert_eq!(deck.max_layer(1).unwrap(), 1);
    }

    #[test]
    fn plot_capability_inferred_from_markup() {
        let raw = r#"{
            "slide_0": { "svg": ["<div class=\"bk-root\"></div>"] },
            "slide_1": { "svg": ["<g>plain</g>"] },
            "slide_2": { "svg": ["<g/>"], "capabilities": ["embedded-plot"] }
        }"#;
        let deck = Deck::from_json(raw).unwrap();
        assert!(deck.slide(0).unwrap().has_embedded_plot());
        assert!(!deck.slide(1).unwrap().has_embedded_plot());
        assert!(deck.slide(2).unwrap().has_embedded_plot());
    }

    #[test]
    fn animation_defaults_apply() {
        let raw = r#"{
            "slide_0": {
                "svg": ["<g/>"],
                "svg_animates": {
                    "anim_0": { "frames": ["<g>f0</g>", "<g>f1</g>"] }
                }
            }
        }"#;
        let deck = Deck::from_json(raw).unwrap();
        let animation = &deck.slide(0).unwrap().animations()["anim_0"];
        assert_eq!(animation.frames.len(), 2);
        assert_eq!(animation.fps, 25.0);
        assert!(!animation.autoplay);
    }

    #[test]
    fn config_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.design_width, 800.0);
        assert_eq!(config.swipe_threshold, 100.0);
        assert!(config.wheel_navigation);
    }

    #[test]
    fn config_reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "design_width = 1000.0\nwheel_navigation = false\n").unwrap();
        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.design_width, 1000.0);
        assert!(!config.wheel_navigation);
        assert_eq!(config.design_height, 600.0);
    }

    #[tokio::test]
    async fn file_provider_loads_deck() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        std::fs::write(&path, deck_json(&[1, 2])).unwrap();

        let deck = FileDeckProvider.load(&path).await.unwrap();
        assert_eq!(deck.slide_count(), 2);
        assert_eq!(deck.max_layer(1).unwrap(), 1);
    }
}
