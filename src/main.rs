//! Bazaar Lens
//!
//! Console front end. `run` watches the trigger keys and logs what the
//! overlay would show, `calibrate` records the card anchors, and `test-ocr`
//! runs recognition on a saved screenshot.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bazaar_lens::capture::{ScreenGrabber, StillImageGrabber};
use bazaar_lens::config::{AppConfig, default_config_path, load_config};
use bazaar_lens::geometry::Rect;
use bazaar_lens::matching::{EntityDatabase, MatchResult, Matcher};
use bazaar_lens::ocr::{CaptureReader, TesseractBackend, clean, ensure_tesseract};
use bazaar_lens::{logging, paths};

#[derive(Parser)]
#[command(name = "bazaar-lens", version, about = "Recognizes The Bazaar cards under the cursor")]
struct Cli {
    /// Config file (defaults to config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the trigger keys and recognize what is under the cursor (default)
    Run,
    /// Record the monster and item anchor corners
    Calibrate,
    /// Recognize the text in a saved screenshot
    TestOcr {
        image: PathBuf,
        /// Match against items instead of monsters and events
        #[arg(long)]
        item: bool,
        /// Only read this part of the image: LEFT,TOP,RIGHT,BOTTOM
        #[arg(long, value_parser = parse_rect)]
        region: Option<Rect>,
    },
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid region {s:?}: {e}"))?;
    match parts[..] {
        [left, top, right, bottom] => Ok(Rect::new(left, top, right, bottom)),
        _ => Err(format!("region needs four values, got {}", parts.len())),
    }
}

fn main() -> Result<()> {
    logging::install_panic_hook();
    paths::ensure_directories()?;
    logging::init_logging()?;

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config),
        Command::Calibrate => calibrate(&config),
        Command::TestOcr {
            image,
            item,
            region,
        } => test_ocr(&config, &image, item, region),
    }
}

fn load_matcher(config: &AppConfig) -> Result<Arc<Matcher>> {
    let database = EntityDatabase::load(&config.data_dir())?;
    if database.is_empty() {
        tracing::warn!(
            "Entity database in {} is empty, nothing can be recognized",
            config.data_dir().display()
        );
    }
    Ok(Arc::new(Matcher::new(
        database,
        config.thresholds.clone(),
        config.match_cache_size,
    )))
}

fn build_reader(config: &AppConfig, grabber: Box<dyn ScreenGrabber>) -> Result<CaptureReader> {
    let tesseract = ensure_tesseract(&config.ocr).context("Tesseract is not available")?;
    let reader = CaptureReader::new(
        grabber,
        Box::new(TesseractBackend::new(tesseract)),
        &config.ocr,
        config.ocr_cache_size,
    );
    Ok(if config.save_debug_captures {
        let dir = paths::get_debug_dir();
        tracing::info!("Saving debug captures to {}", dir.display());
        reader.with_debug_dir(dir)
    } else {
        reader
    })
}

fn describe(matcher: &Matcher, result: &MatchResult) -> String {
    let database = matcher.database();
    let mut line = match database.get(result.kind, &result.entity_id) {
        Some(record) if !record.canonical_name.is_empty() => format!(
            "{} {} / {} (score {:.2})",
            result.kind, record.localized_name, record.canonical_name, result.score
        ),
        Some(record) => format!(
            "{} {} (score {:.2})",
            result.kind, record.localized_name, result.score
        ),
        None => format!("{} {} (score {:.2})", result.kind, result.entity_id, result.score),
    };
    for choice in database.event_choices(&result.entity_id) {
        line.push_str(&format!("\n    - {}: {}", choice.name, choice.description));
    }
    line
}

fn test_ocr(config: &AppConfig, image_path: &Path, item: bool, region: Option<Rect>) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("Failed to open {}", image_path.display()))?
        .to_rgba8();
    tracing::info!(
        "Testing OCR on {} ({}x{})",
        image_path.display(),
        image.width(),
        image.height()
    );

    let grabber = StillImageGrabber::new(image);
    let region = region.unwrap_or_else(|| grabber.bounds());
    let image = grabber.grab(region)?;
    let reader = build_reader(config, Box::new(grabber))?;
    let matcher = load_matcher(config)?;

    let result = if item {
        let Some(mut ranked) = reader.read_image_ranked(&image) else {
            tracing::info!("OCR produced no text");
            return Ok(());
        };
        tracing::info!("Primary text: {:?}", ranked.primary);
        tracing::info!("Full text: {:?}", ranked.corpus);
        ranked.primary = clean(&ranked.primary);
        matcher.find_item(&ranked)
    } else {
        let Some(text) = reader.read_image(&image) else {
            tracing::info!("OCR produced no text");
            return Ok(());
        };
        let cleaned = clean(&text);
        tracing::info!("OCR text: {:?}", text);
        tracing::info!("Cleaned: {:?}", cleaned);
        matcher.find_best_match(&cleaned)
    };

    match result {
        Some(result) => tracing::info!("Match: {}", describe(&matcher, &result)),
        None => tracing::info!("No match"),
    }
    Ok(())
}

/// Logs what an overlay would do for each drained event.
#[cfg(windows)]
fn display_event(matcher: &Matcher, event: &bazaar_lens::orchestrator::DisplayEvent) {
    use bazaar_lens::orchestrator::DisplayEvent;

    match event {
        DisplayEvent::Show { result, position } => {
            tracing::info!(
                "[overlay] show at ({}, {}): {}",
                position.x,
                position.y,
                describe(matcher, result)
            );
        }
        DisplayEvent::Hide { kind } => tracing::debug!("[overlay] hide ({kind} key released)"),
        DisplayEvent::Move { position } => {
            tracing::trace!("[overlay] move to ({}, {})", position.x, position.y)
        }
    }
}

#[cfg(windows)]
fn run(config: &AppConfig) -> Result<()> {
    use bazaar_lens::calibration::CalibrationFile;
    use bazaar_lens::capture::{GdiGrabber, RegionLocator, Win32WindowFinder};
    use bazaar_lens::input::Win32Input;
    use bazaar_lens::orchestrator::{
        Orchestrator, RecognitionPipeline, RecognitionWorker, update_queue,
    };

    let matcher = load_matcher(config)?;
    let reader = build_reader(config, Box::new(GdiGrabber))?;

    let calibration = CalibrationFile::load(&config.calibration_file())?;
    match &calibration {
        Some(file) => tracing::info!(
            "Calibration loaded ({}), region source: {:?}",
            file.timestamp,
            config.regions.source
        ),
        None => tracing::info!("No calibration file, using fixed capture offsets"),
    }

    let locator = Arc::new(RegionLocator::new(
        Box::new(Win32WindowFinder::new(config.window.clone())),
        config.regions.clone(),
        calibration,
        config.timing.window_cache_ttl(),
    ));
    match locator.locate_window() {
        Some(window) => tracing::info!("Game window found at {}", window.rect),
        None => tracing::info!("Game window not found yet, will keep looking"),
    }

    let pipeline = RecognitionPipeline::new(locator.clone(), reader, matcher.clone());
    let worker = RecognitionWorker::spawn(Arc::new(pipeline));
    let (updates, display) = update_queue();
    let orchestrator = Orchestrator::new(
        Box::new(Win32Input),
        locator,
        worker,
        updates,
        config.timing.clone(),
        &config.keys,
    );
    let handle = orchestrator.spawn()?;

    tracing::info!("Bazaar Lens started");
    tracing::info!(
        "Hold VK 0x{:02X} over a monster or event, VK 0x{:02X} over an item",
        config.keys.monster_key,
        config.keys.item_key
    );

    let tick = config.timing.display_tick();
    while handle.is_running() {
        for event in display.drain() {
            display_event(&matcher, &event);
        }
        std::thread::sleep(tick);
    }
    Ok(())
}

#[cfg(windows)]
fn calibrate(config: &AppConfig) -> Result<()> {
    use bazaar_lens::calibration::run_calibration;
    use bazaar_lens::input::Win32Input;

    let path = config.calibration_file();
    if run_calibration(&Win32Input, &config.keys, &path, config.timing.poll_interval())? {
        tracing::info!("Calibration saved to {}", path.display());
    } else {
        tracing::info!("Calibration aborted, {} unchanged", path.display());
    }
    Ok(())
}

#[cfg(not(windows))]
fn run(_config: &AppConfig) -> Result<()> {
    Err(anyhow::anyhow!("`run` needs Windows; use `test-ocr` on this platform"))
}

#[cfg(not(windows))]
fn calibrate(_config: &AppConfig) -> Result<()> {
    Err(anyhow::anyhow!("`calibrate` needs Windows"))
}
