//! Works out where on screen to read from: the game window, the capture box
//! around the cursor, and the calibrated icon and name regions.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::window::{GameWindow, WindowFinder};
use crate::calibration::CalibrationFile;
use crate::config::RegionConfig;
use crate::error::RecognitionError;
use crate::geometry::{Area, Point, Rect};
use crate::kind::LookupKind;

/// Tolerance around the recorded icon box, as a fraction of its size.
const TIGHT_TOLERANCE: f64 = 0.2;
/// Fallback tolerance, only honoured when the cursor is also inside the game window.
const RELAXED_TOLERANCE: f64 = 1.0;
/// Padding added on every side of a derived name region, as a fraction of its size.
const NAME_PADDING: f64 = 0.2;

struct CachedWindow {
    window: GameWindow,
    found_at: Instant,
}

pub struct RegionLocator {
    finder: Box<dyn WindowFinder>,
    regions: RegionConfig,
    calibration: Option<CalibrationFile>,
    cache_ttl: Duration,
    cached: Mutex<Option<CachedWindow>>,
}

impl RegionLocator {
    pub fn new(
        finder: Box<dyn WindowFinder>,
        regions: RegionConfig,
        calibration: Option<CalibrationFile>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            finder,
            regions,
            calibration,
            cache_ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn regions(&self) -> &RegionConfig {
        &self.regions
    }

    pub fn has_calibration(&self, kind: LookupKind) -> bool {
        self.calibration
            .as_ref()
            .is_some_and(|c| c.anchor(kind).is_some())
    }

    /// Returns the game window, reusing the last one for up to the cache TTL.
    ///
    /// A cached window is re-validated on every call and dropped as soon as it
    /// is gone, hidden, or minimized; its rectangle is refreshed since the
    /// window may have moved.
    pub fn locate_window(&self) -> Option<GameWindow> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = cached.as_mut() {
            if entry.found_at.elapsed() < self.cache_ttl
                && self.finder.is_window_valid(entry.window.handle)
            {
                if let Some(rect) = self.finder.window_rect(entry.window.handle) {
                    entry.window.rect = rect;
                    return Some(entry.window);
                }
            }
            *cached = None;
        }

        let window = self.finder.find_window()?;
        tracing::debug!("Game window located at {}", window.rect);
        *cached = Some(CachedWindow {
            window,
            found_at: Instant::now(),
        });
        Some(window)
    }

    /// Re-checks a window located earlier; drops it from the cache if it is gone.
    pub fn is_window_valid(&self, window: &GameWindow) -> bool {
        if self.finder.is_window_valid(window.handle) {
            return true;
        }
        self.invalidate();
        false
    }

    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// True if the top-level window under the cursor is the game.
    pub fn is_cursor_over_game(&self, cursor: Point) -> bool {
        let Some(window) = self.locate_window() else {
            return false;
        };
        self.finder.root_window_at(cursor) == Some(window.handle)
    }

    /// The fixed-offset capture box around the cursor for `kind`.
    pub fn compute_capture_region(
        &self,
        cursor: Point,
        kind: LookupKind,
    ) -> Result<Rect, RecognitionError> {
        let offsets = self.regions.offsets(kind);
        let (x1, x2) = (cursor.x + offsets.left, cursor.x + offsets.right);
        let (y1, y2) = (cursor.y + offsets.top, cursor.y + offsets.bottom);
        let rect = Rect::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2));
        if rect.is_degenerate() {
            return Err(RecognitionError::RegionInvalid(format!(
                "{kind} offsets give an empty box {rect}"
            )));
        }
        Ok(rect)
    }

    /// Checks the cursor against the calibrated icon box for `kind`.
    ///
    /// First with a tight tolerance; then with a relaxed one, which also
    /// requires the cursor to be inside the game window. Returns the matched
    /// (expanded) area, or `None` if the cursor is outside or `kind` has no
    /// calibration.
    pub fn is_cursor_in_calibrated_area(
        &self,
        cursor: Point,
        kind: LookupKind,
        window: &GameWindow,
    ) -> Option<Area> {
        let anchor = self.calibration.as_ref()?.anchor(kind)?;
        let icon = anchor.icon.bounds();

        let tight = icon.expanded(TIGHT_TOLERANCE);
        if tight.contains(cursor) {
            tracing::trace!("Cursor inside calibrated {kind} icon area");
            return Some(tight);
        }

        let relaxed = icon.expanded(RELAXED_TOLERANCE);
        let rect = window.rect;
        let in_window = cursor.x >= rect.left
            && cursor.x <= rect.right
            && cursor.y >= rect.top
            && cursor.y <= rect.bottom;
        if relaxed.contains(cursor) && in_window {
            tracing::debug!(
                "Cursor inside relaxed {kind} icon area ({:.1}x{:.1} tolerance)",
                icon.width() * RELAXED_TOLERANCE,
                icon.height() * RELAXED_TOLERANCE
            );
            return Some(relaxed);
        }

        None
    }

    /// Projects the calibrated icon→name offsets onto a detected icon area and
    /// pads the result.
    pub fn derive_name_region(&self, icon_area: &Area, kind: LookupKind) -> Option<Rect> {
        let offsets = self.calibration.as_ref()?.anchor(kind)?.name_offsets();

        let left = icon_area.min_x + offsets.top_left.0 as f64;
        let top = icon_area.min_y + offsets.top_left.1 as f64;
        let right = icon_area.max_x + offsets.bottom_right.0 as f64;
        let bottom = icon_area.max_y + offsets.bottom_right.1 as f64;

        let pad_x = (right - left) * NAME_PADDING;
        let pad_y = (bottom - top) * NAME_PADDING;
        let rect = Rect::new(
            (left - pad_x) as i32,
            (top - pad_y) as i32,
            (right + pad_x) as i32,
            (bottom + pad_y) as i32,
        );
        if rect.is_degenerate() {
            tracing::debug!("Derived {kind} name region is empty: {rect}");
            return None;
        }
        Some(rect)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::calibration::{Anchor, Quad};
    use crate::capture::window::WindowHandle;
    use crate::config::CaptureOffsets;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scriptable window finder shared with other test modules.
    #[derive(Clone)]
    pub(crate) struct FakeFinder {
        pub window: Option<GameWindow>,
        pub valid: Arc<AtomicBool>,
        pub cursor_on_game: Arc<AtomicBool>,
        pub find_calls: Arc<AtomicUsize>,
    }

    impl FakeFinder {
        pub fn with_window(rect: Rect) -> Self {
            Self {
                window: Some(GameWindow {
                    handle: WindowHandle(42),
                    rect,
                }),
                valid: Arc::new(AtomicBool::new(true)),
                cursor_on_game: Arc::new(AtomicBool::new(true)),
                find_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn without_window() -> Self {
            Self {
                window: None,
                ..Self::with_window(Rect::default())
            }
        }
    }

    impl WindowFinder for FakeFinder {
        fn find_window(&self) -> Option<GameWindow> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if self.valid.load(Ordering::SeqCst) {
                self.window
            } else {
                None
            }
        }

        fn is_window_valid(&self, handle: WindowHandle) -> bool {
            self.valid.load(Ordering::SeqCst) && self.window.is_some_and(|w| w.handle == handle)
        }

        fn window_rect(&self, _handle: WindowHandle) -> Option<Rect> {
            self.window.map(|w| w.rect)
        }

        fn root_window_at(&self, _point: Point) -> Option<WindowHandle> {
            if self.cursor_on_game.load(Ordering::SeqCst) {
                self.window.map(|w| w.handle)
            } else {
                Some(WindowHandle(7))
            }
        }
    }

    fn quad(l: i32, t: i32, r: i32, b: i32) -> Quad {
        Quad {
            top_left: Point::new(l, t),
            top_right: Point::new(r, t),
            bottom_left: Point::new(l, b),
            bottom_right: Point::new(r, b),
        }
    }

    pub(crate) fn monster_calibration() -> CalibrationFile {
        let mut file = CalibrationFile::default();
        file.set_anchor(
            LookupKind::Monster,
            Anchor {
                icon: quad(100, 100, 200, 200),
                name: quad(220, 100, 420, 140),
            },
        );
        file
    }

    fn locator(finder: FakeFinder, calibration: Option<CalibrationFile>) -> RegionLocator {
        RegionLocator::new(
            Box::new(finder),
            RegionConfig::default(),
            calibration,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_locate_window_is_cached() {
        let finder = FakeFinder::with_window(Rect::new(0, 0, 1920, 1080));
        let calls = finder.find_calls.clone();
        let locator = locator(finder, None);

        assert!(locator.locate_window().is_some());
        assert!(locator.locate_window().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_cached_window_is_dropped() {
        let finder = FakeFinder::with_window(Rect::new(0, 0, 1920, 1080));
        let valid = finder.valid.clone();
        let calls = finder.find_calls.clone();
        let locator = locator(finder, None);

        let window = locator.locate_window().unwrap();
        valid.store(false, Ordering::SeqCst);
        assert!(!locator.is_window_valid(&window));
        assert!(locator.locate_window().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_expires() {
        let finder = FakeFinder::with_window(Rect::new(0, 0, 1920, 1080));
        let calls = finder.find_calls.clone();
        let locator = RegionLocator::new(Box::new(finder), RegionConfig::default(), None, Duration::ZERO);

        locator.locate_window();
        locator.locate_window();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_window() {
        let locator = locator(FakeFinder::without_window(), None);
        assert!(locator.locate_window().is_none());
        assert!(!locator.is_cursor_over_game(Point::new(5, 5)));
    }

    #[test]
    fn test_cursor_over_game() {
        let finder = FakeFinder::with_window(Rect::new(0, 0, 1920, 1080));
        let on_game = finder.cursor_on_game.clone();
        let locator = locator(finder, None);

        assert!(locator.is_cursor_over_game(Point::new(10, 10)));
        on_game.store(false, Ordering::SeqCst);
        assert!(!locator.is_cursor_over_game(Point::new(10, 10)));
    }

    #[test]
    fn test_capture_region_uses_kind_offsets() {
        let locator = locator(FakeFinder::without_window(), None);
        let rect = locator
            .compute_capture_region(Point::new(1000, 800), LookupKind::Monster)
            .unwrap();
        assert_eq!(rect, Rect::new(1050, 550, 1600, 820));

        let rect = locator
            .compute_capture_region(Point::new(1000, 800), LookupKind::Item)
            .unwrap();
        assert_eq!(rect, Rect::new(100, 100, 1600, 950));
    }

    #[test]
    fn test_capture_region_never_degenerate() {
        let locator = locator(FakeFinder::without_window(), None);
        for x in [-5000, -1, 0, 1, 37, 1919, 5000] {
            for y in [-5000, -1, 0, 1, 41, 1079, 5000] {
                for kind in LookupKind::ALL {
                    let rect = locator.compute_capture_region(Point::new(x, y), kind).unwrap();
                    assert!(rect.left < rect.right && rect.top < rect.bottom);
                }
            }
        }
    }

    #[test]
    fn test_capture_region_normalizes_swapped_offsets() {
        let regions = RegionConfig {
            monster: CaptureOffsets {
                left: 100,
                right: -100,
                top: 50,
                bottom: -50,
            },
            ..RegionConfig::default()
        };
        let locator = RegionLocator::new(
            Box::new(FakeFinder::without_window()),
            regions,
            None,
            Duration::from_secs(1),
        );
        let rect = locator
            .compute_capture_region(Point::new(0, 0), LookupKind::Monster)
            .unwrap();
        assert_eq!(rect, Rect::new(-100, -50, 100, 50));
    }

    #[test]
    fn test_zero_width_offsets_are_invalid() {
        let regions = RegionConfig {
            item: CaptureOffsets {
                left: 10,
                right: 10,
                top: 0,
                bottom: 100,
            },
            ..RegionConfig::default()
        };
        let locator = RegionLocator::new(
            Box::new(FakeFinder::without_window()),
            regions,
            None,
            Duration::from_secs(1),
        );
        assert!(matches!(
            locator.compute_capture_region(Point::new(0, 0), LookupKind::Item),
            Err(RecognitionError::RegionInvalid(_))
        ));
    }

    #[test]
    fn test_calibrated_area_tight_and_relaxed() {
        let window = GameWindow {
            handle: WindowHandle(42),
            rect: Rect::new(0, 0, 1920, 1080),
        };
        let locator = locator(FakeFinder::with_window(window.rect), Some(monster_calibration()));

        // Within 20% of the 100x100 icon
        let tight = locator
            .is_cursor_in_calibrated_area(Point::new(215, 150), LookupKind::Monster, &window)
            .unwrap();
        assert_eq!((tight.min_x, tight.max_x), (80.0, 220.0));

        // Beyond 20% but within 100%
        let relaxed = locator
            .is_cursor_in_calibrated_area(Point::new(280, 150), LookupKind::Monster, &window)
            .unwrap();
        assert_eq!((relaxed.min_x, relaxed.max_x), (0.0, 300.0));

        assert!(
            locator
                .is_cursor_in_calibrated_area(Point::new(400, 150), LookupKind::Monster, &window)
                .is_none()
        );
        assert!(
            locator
                .is_cursor_in_calibrated_area(Point::new(150, 150), LookupKind::Item, &window)
                .is_none()
        );
    }

    #[test]
    fn test_relaxed_area_requires_cursor_in_window() {
        let window = GameWindow {
            handle: WindowHandle(42),
            rect: Rect::new(250, 0, 1920, 1080),
        };
        let locator = locator(FakeFinder::with_window(window.rect), Some(monster_calibration()));
        assert!(
            locator
                .is_cursor_in_calibrated_area(Point::new(240, 150), LookupKind::Monster, &window)
                .is_none()
        );
    }

    #[test]
    fn test_derive_name_region() {
        let locator = locator(FakeFinder::without_window(), Some(monster_calibration()));
        let icon = Area {
            min_x: 500.0,
            min_y: 300.0,
            max_x: 600.0,
            max_y: 400.0,
        };
        // Name is icon.tl + (120, 0) .. icon.br + (220, -60): (620,300)-(820,340), padded 20%
        let rect = locator.derive_name_region(&icon, LookupKind::Monster).unwrap();
        assert_eq!(rect, Rect::new(580, 292, 860, 348));

        assert!(locator.derive_name_region(&icon, LookupKind::Item).is_none());
    }
}
