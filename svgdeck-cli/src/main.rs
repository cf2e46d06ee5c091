use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use svgdeck_core::{
    encode_address, Cursor, Deck, DeckProvider, EngineEvent, FileDeckProvider, LocationHost,
    MemoryLocation, Navigator, ViewerConfig,
};
use svgdeck_stage::{AnimationScheduler, ViewportAdapter};
use svgdeck_tty::{EventRouter, NavIntent, TerminalStage, UiEvent};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "svgdeck",
    version,
    about = "terminal navigator for compiled SVG slide decks"
)]
struct Args {
    /// Slide to open on (0-based)
    #[arg(short = 's', long = "slide")]
    slide: Option<usize>,

    /// Address to open at, e.g. "#2-1" (wins over --slide)
    #[arg(long)]
    address: Option<String>,

    /// Path to the deck JSON produced by the slide compiler
    deck: PathBuf,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, DisableMouseCapture, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "svgdeck", "svgdeck")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config = ViewerConfig::load(&project_dirs.config_dir().join("config.toml"))?;

    let deck = FileDeckProvider
        .load(&args.deck)
        .await
        .with_context(|| format!("failed to open {:?}", args.deck))?;
    let deck = Arc::new(deck);
    info!(deck = ?args.deck, slides = deck.slide_count(), "deck loaded");

    let location = Arc::new(MemoryLocation::new());
    if let Some(address) = args.address.as_deref() {
        location.publish(address)?;
    } else if let Some(slide) = args.slide {
        location.publish(&encode_address(Cursor::new(slide as i32, 0)))?;
    }

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide, EnableMouseCapture, Clear(ClearType::All))?;

    let stage = Arc::new(TerminalStage::new(
        stdout,
        (config.design_width, config.design_height),
    ));
    let adapter = Arc::new(ViewportAdapter::new(stage.clone()));
    let mut scheduler = AnimationScheduler::new(stage.clone());
    let mut navigator = Navigator::new(deck.clone(), location.clone(), adapter.clone());
    let events = navigator.events();
    let mut router = EventRouter::new(config.swipe_threshold);
    router.set_wheel_enabled(config.wheel_navigation);

    adapter.refresh()?;
    navigator.init()?;

    let poll_interval = Duration::from_millis(config.poll_interval_ms.max(10));
    loop {
        // a changed location is the one signal that content must follow
        if let Some(address) = location.take_change() {
            navigator.sync_from_address(&address)?;
        }

        let drained: Vec<EngineEvent> = events.lock().drain(..).collect();
        if !drained.is_empty() {
            apply_engine_events(drained, &deck, &stage, &mut scheduler, &mut router)?;
        }

        scheduler.tick(Instant::now())?;

        if event::poll(poll_interval)? {
            let raw_event = event::read()?;
            match router.route(&raw_event) {
                UiEvent::Intent(NavIntent::Forward) => navigator.forward()?,
                UiEvent::Intent(NavIntent::Back) => navigator.back()?,
                UiEvent::Intent(NavIntent::GoStart) => navigator.go_start()?,
                UiEvent::Intent(NavIntent::GoEnd) => navigator.go_end()?,
                UiEvent::Intent(NavIntent::ToggleFullscreen) => adapter.request_fullscreen()?,
                UiEvent::Intent(NavIntent::ToggleActiveMedia) => {
                    adapter.toggle_media(navigator.cursor())?
                }
                UiEvent::AddressJump(address) => {
                    // same path as a pasted link: the location changes first,
                    // the engine follows on the next turn
                    location.publish(&address)?;
                }
                UiEvent::TriggerAnimations => {
                    if let Some(slide) = navigator.current_slide() {
                        scheduler.trigger(navigator.cursor(), slide, Instant::now());
                    }
                }
                UiEvent::Resized => adapter.refresh()?,
                UiEvent::Quit => break,
                UiEvent::None => {}
            }
            if let Some(pending) = router.pending_input() {
                stage.note(&format!("goto slide {}", pending))?;
            }
        }
    }

    crossterm::execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    drop(_raw);

    let address = location.current();
    if !address.is_empty() {
        println!("svgdeck stopped at {}", address);
    }
    Ok(())
}

fn apply_engine_events(
    drained: Vec<EngineEvent>,
    deck: &Deck,
    stage: &TerminalStage<io::Stdout>,
    scheduler: &mut AnimationScheduler,
    router: &mut EventRouter,
) -> Result<()> {
    for event in drained {
        match event {
            EngineEvent::AddressPublished(_) => {}
            EngineEvent::ContentApplied { cursor } => {
                if let Ok(slide) = deck.slide(cursor.slide as usize) {
                    router.set_embedded_plot_active(slide.has_embedded_plot());
                    scheduler.activate(cursor, slide, Instant::now());
                }
                stage.note("")?;
            }
            EngineEvent::SlideMissing { slide } => {
                scheduler.cancel_all();
                stage.note(&format!("slide {} does not exist", slide))?;
            }
            EngineEvent::LayerMissing { slide, layer } => {
                scheduler.cancel_all();
                stage.note(&format!("layer {} does not exist on slide {}", layer, slide))?;
            }
        }
    }
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "svgdeck.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the raw-mode stage, so logs go to the file only
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
