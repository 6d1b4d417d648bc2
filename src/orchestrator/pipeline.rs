//! One recognition cycle: locate → region → capture → normalize → match.

use std::sync::Arc;

use crate::capture::{GameWindow, RegionLocator};
use crate::config::RegionSource;
use crate::error::RecognitionError;
use crate::geometry::{Point, Rect};
use crate::kind::LookupKind;
use crate::matching::{MatchResult, Matcher, RankedText};
use crate::ocr::{CaptureReader, clean};

/// Runs a recognition for the entity under the cursor.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, kind: LookupKind, cursor: Point) -> Result<MatchResult, RecognitionError>;
}

pub struct RecognitionPipeline {
    locator: Arc<RegionLocator>,
    reader: CaptureReader,
    matcher: Arc<Matcher>,
}

impl RecognitionPipeline {
    pub fn new(locator: Arc<RegionLocator>, reader: CaptureReader, matcher: Arc<Matcher>) -> Self {
        Self {
            locator,
            reader,
            matcher,
        }
    }

    /// Picks the capture rectangle for a lookup.
    ///
    /// With a calibration for `kind`, the cursor must be over the calibrated
    /// icon area; the rectangle is then the derived name region when the
    /// region source is `calibrated`, else the fixed-offset box.
    fn capture_region(
        &self,
        kind: LookupKind,
        cursor: Point,
        window: &GameWindow,
    ) -> Result<Rect, RecognitionError> {
        let locator = &self.locator;
        let source = locator.regions().source;

        let rect = if locator.has_calibration(kind) {
            let area = locator
                .is_cursor_in_calibrated_area(cursor, kind, window)
                .ok_or_else(|| {
                    RecognitionError::RegionInvalid(format!("cursor outside calibrated {kind} area"))
                })?;
            match source {
                RegionSource::Calibrated => locator.derive_name_region(&area, kind).ok_or_else(|| {
                    RecognitionError::RegionInvalid(format!("no {kind} name region"))
                })?,
                RegionSource::Fixed => locator.compute_capture_region(cursor, kind)?,
            }
        } else {
            if source == RegionSource::Calibrated {
                tracing::debug!("No {kind} calibration, using fixed offsets");
            }
            locator.compute_capture_region(cursor, kind)?
        };

        rect.intersect(&window.rect).ok_or_else(|| {
            RecognitionError::RegionInvalid(format!("{rect} lies outside the game window"))
        })
    }

    /// The window can vanish while the capture is in progress.
    fn ensure_window(&self, window: &GameWindow) -> Result<(), RecognitionError> {
        if self.locator.is_window_valid(window) {
            Ok(())
        } else {
            Err(RecognitionError::WindowNotFound)
        }
    }
}

impl Recognizer for RecognitionPipeline {
    fn recognize(&self, kind: LookupKind, cursor: Point) -> Result<MatchResult, RecognitionError> {
        let window = self
            .locator
            .locate_window()
            .ok_or(RecognitionError::WindowNotFound)?;

        let rect = self.capture_region(kind, cursor, &window)?;
        tracing::debug!("Capturing {kind} region {rect}");
        self.ensure_window(&window)?;

        let result = match kind {
            LookupKind::Monster => {
                let text = self
                    .reader
                    .capture_and_read(rect, kind)
                    .ok_or(RecognitionError::OcrEmpty)?;
                self.ensure_window(&window)?;

                let cleaned = clean(&text);
                tracing::debug!("OCR text: {:?} -> {:?}", text, cleaned);
                if cleaned.is_empty() {
                    return Err(RecognitionError::OcrEmpty);
                }
                self.matcher.find_best_match(&cleaned)
            }
            LookupKind::Item => {
                let ranked = self
                    .reader
                    .capture_and_read_ranked(rect)
                    .ok_or(RecognitionError::OcrEmpty)?;
                self.ensure_window(&window)?;

                let primary = clean(&ranked.primary);
                tracing::debug!("OCR item text: primary {:?}, corpus {:?}", primary, ranked.corpus);
                if primary.is_empty() {
                    return Err(RecognitionError::OcrEmpty);
                }
                self.matcher.find_item(&RankedText {
                    primary,
                    corpus: ranked.corpus,
                })
            }
        };

        let result = result.ok_or(RecognitionError::NoMatch)?;
        tracing::debug!(
            "Matched {} {} (score {:.2})",
            result.kind,
            result.entity_id,
            result.score
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationFile;
    use crate::capture::ScreenGrabber;
    use crate::capture::locator::tests::{FakeFinder, monster_calibration};
    use crate::config::{OcrConfig, RegionConfig};
    use crate::kind::EntityKind;
    use crate::matching::{EntityDatabase, EntityRecord, ThresholdTable};
    use crate::ocr::reader::tests::{FakeBackend, FakeGrabber, line};
    use anyhow::Result;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn record(kind: EntityKind, id: &str, zh: &str) -> EntityRecord {
        EntityRecord {
            id: id.to_string(),
            canonical_name: String::new(),
            localized_name: zh.to_string(),
            kind,
        }
    }

    fn matcher() -> Arc<Matcher> {
        let db = EntityDatabase::from_records([
            record(EntityKind::Monster, "狼", "狼"),
            record(EntityKind::Event, "狼人杀", "狼人杀"),
            record(EntityKind::Item, "i-1", "治疗药水"),
        ]);
        Arc::new(Matcher::new(db, ThresholdTable::default(), 100))
    }

    fn pipeline_with(
        finder: FakeFinder,
        calibration: Option<CalibrationFile>,
        regions: RegionConfig,
        grabber: Box<dyn ScreenGrabber>,
        backend: FakeBackend,
    ) -> RecognitionPipeline {
        let locator = Arc::new(RegionLocator::new(
            Box::new(finder),
            regions,
            calibration,
            Duration::from_secs(60),
        ));
        let reader = CaptureReader::new(grabber, Box::new(backend), &OcrConfig::default(), 20);
        RecognitionPipeline::new(locator, reader, matcher())
    }

    fn pipeline(backend: FakeBackend) -> RecognitionPipeline {
        pipeline_with(
            FakeFinder::with_window(Rect::new(0, 0, 1920, 1080)),
            None,
            RegionConfig::default(),
            Box::new(FakeGrabber),
            backend,
        )
    }

    #[test]
    fn test_reward_suffix_scenario_matches_event() {
        let pipeline = pipeline(FakeBackend::reading("狼人杀 奖励 x2"));
        let result = pipeline
            .recognize(LookupKind::Monster, Point::new(500, 500))
            .unwrap();
        assert_eq!(result.kind, EntityKind::Event);
        assert_eq!(result.entity_id, "狼人杀");
    }

    #[test]
    fn test_item_lookup() {
        let backend = FakeBackend::empty();
        *backend.raw.lock().unwrap() = Ok(vec![
            line(&[("治疗药水", 30)]),
            line(&[("恢复", 12), ("生命", 12)]),
        ]);
        let pipeline = pipeline(backend);
        let result = pipeline
            .recognize(LookupKind::Item, Point::new(1000, 800))
            .unwrap();
        assert_eq!(result.kind, EntityKind::Item);
        assert_eq!(result.entity_id, "i-1");
    }

    #[test]
    fn test_empty_ocr() {
        let pipeline = pipeline(FakeBackend::empty());
        assert_eq!(
            pipeline.recognize(LookupKind::Monster, Point::new(500, 500)),
            Err(RecognitionError::OcrEmpty)
        );
    }

    #[test]
    fn test_only_noise_is_empty_after_cleaning() {
        let pipeline = pipeline(FakeBackend::reading("[12]"));
        assert_eq!(
            pipeline.recognize(LookupKind::Monster, Point::new(500, 500)),
            Err(RecognitionError::OcrEmpty)
        );
    }

    #[test]
    fn test_no_match() {
        let pipeline = pipeline(FakeBackend::reading("完全无关的文字"));
        assert_eq!(
            pipeline.recognize(LookupKind::Monster, Point::new(500, 500)),
            Err(RecognitionError::NoMatch)
        );
    }

    #[test]
    fn test_no_window() {
        let pipeline = pipeline_with(
            FakeFinder::without_window(),
            None,
            RegionConfig::default(),
            Box::new(FakeGrabber),
            FakeBackend::reading("狼人杀"),
        );
        assert_eq!(
            pipeline.recognize(LookupKind::Monster, Point::new(500, 500)),
            Err(RecognitionError::WindowNotFound)
        );
    }

    #[test]
    fn test_region_outside_window() {
        let pipeline = pipeline_with(
            FakeFinder::with_window(Rect::new(0, 0, 800, 600)),
            None,
            RegionConfig::default(),
            Box::new(FakeGrabber),
            FakeBackend::reading("狼人杀"),
        );
        // Monster box starts 50px right of the cursor
        assert!(matches!(
            pipeline.recognize(LookupKind::Monster, Point::new(790, 300)),
            Err(RecognitionError::RegionInvalid(_))
        ));
    }

    /// Grabber that closes the game window while capturing.
    struct ClosingGrabber(Arc<AtomicBool>);

    impl ScreenGrabber for ClosingGrabber {
        fn grab(&self, rect: Rect) -> Result<RgbaImage> {
            self.0.store(false, Ordering::SeqCst);
            FakeGrabber.grab(rect)
        }
    }

    #[test]
    fn test_window_closed_during_capture() {
        let finder = FakeFinder::with_window(Rect::new(0, 0, 1920, 1080));
        let valid = finder.valid.clone();
        let pipeline = pipeline_with(
            finder,
            None,
            RegionConfig::default(),
            Box::new(ClosingGrabber(valid)),
            FakeBackend::reading("狼人杀"),
        );
        assert_eq!(
            pipeline.recognize(LookupKind::Monster, Point::new(500, 500)),
            Err(RecognitionError::WindowNotFound)
        );
        assert!(pipeline.locator.locate_window().is_none());
    }

    #[test]
    fn test_calibration_gates_lookup() {
        let pipeline = pipeline_with(
            FakeFinder::with_window(Rect::new(0, 0, 1920, 1080)),
            Some(monster_calibration()),
            RegionConfig::default(),
            Box::new(FakeGrabber),
            FakeBackend::reading("狼人杀"),
        );
        // Icon is (100,100)-(200,200)
        assert!(pipeline.recognize(LookupKind::Monster, Point::new(150, 150)).is_ok());
        assert!(matches!(
            pipeline.recognize(LookupKind::Monster, Point::new(900, 900)),
            Err(RecognitionError::RegionInvalid(_))
        ));
        // No item calibration: no gate
        assert_eq!(
            pipeline.recognize(LookupKind::Item, Point::new(1000, 800)),
            Err(RecognitionError::NoMatch)
        );
    }

    #[test]
    fn test_calibrated_region_source() {
        let regions = RegionConfig {
            source: RegionSource::Calibrated,
            ..RegionConfig::default()
        };
        let pipeline = pipeline_with(
            FakeFinder::with_window(Rect::new(0, 0, 1920, 1080)),
            Some(monster_calibration()),
            regions,
            Box::new(FakeGrabber),
            FakeBackend::reading("狼人杀"),
        );
        let window = pipeline.locator.locate_window().unwrap();
        let rect = pipeline
            .capture_region(LookupKind::Monster, Point::new(150, 150), &window)
            .unwrap();
        // Tight area (80,80)-(220,220) shifted by the name offsets, then padded
        assert_eq!(rect, Rect::new(152, 64, 488, 176));
    }
}
