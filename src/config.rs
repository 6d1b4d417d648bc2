//! Application configuration.
//!
//! Loads settings from config.json at startup. Every field has a default, so
//! a partial (or missing) file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::kind::LookupKind;
use crate::matching::ThresholdTable;
use crate::ocr::ModeProfile;

/// Offsets from the cursor to the edges of the capture box, in pixels.
///
/// The box is `(cursor.x + left, cursor.y + top) - (cursor.x + right, cursor.y + bottom)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOffsets {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl CaptureOffsets {
    /// Monster and event cards open to the right of the cursor.
    pub const MONSTER: CaptureOffsets = CaptureOffsets {
        left: 50,
        right: 600,
        top: -250,
        bottom: 20,
    };

    /// Item tooltips can open on either side and mostly above the cursor.
    pub const ITEM: CaptureOffsets = CaptureOffsets {
        left: -900,
        right: 600,
        top: -700,
        bottom: 150,
    };
}

/// Where the capture rectangle comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionSource {
    /// Fixed offsets around the cursor. A calibration file, if present, only
    /// gates whether the cursor is over a card.
    #[default]
    Fixed,
    /// The name region derived from the calibration anchors.
    Calibrated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub monster: CaptureOffsets,
    pub item: CaptureOffsets,
    pub source: RegionSource,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            monster: CaptureOffsets::MONSTER,
            item: CaptureOffsets::ITEM,
            source: RegionSource::Fixed,
        }
    }
}

impl RegionConfig {
    pub fn offsets(&self, kind: LookupKind) -> CaptureOffsets {
        match kind {
            LookupKind::Monster => self.monster,
            LookupKind::Item => self.item,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit path to the tesseract executable. Searched for when unset.
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory. Searched for when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    pub raw_profile: ModeProfile,
    pub enhanced_profile: ModeProfile,
    /// Fetch the traineddata file for `language` if it is not installed.
    pub download_missing_tessdata: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: "chi_sim".to_string(),
            raw_profile: ModeProfile::raw(),
            enhanced_profile: ModeProfile::enhanced(),
            download_missing_tessdata: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Executable names of the game, compared case-insensitively.
    pub process_names: Vec<String>,
    /// Exact window titles the game is known to use.
    pub window_titles: Vec<String>,
    /// Lowercase substring searched for in window titles as a last resort.
    pub title_keyword: String,
    /// Titles containing any of these (lowercase) are never the game.
    pub exclude_keywords: Vec<String>,
    pub min_width: i32,
    pub min_height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            process_names: vec!["The Bazaar.exe".to_string(), "TheBazaar.exe".to_string()],
            window_titles: vec![
                "The Bazaar".to_string(),
                "The Bazaar - DirectX 11".to_string(),
                "The Bazaar - DirectX 12".to_string(),
                "The Bazaar - Vulkan".to_string(),
                "The Bazaar - OpenGL".to_string(),
            ],
            title_keyword: "the bazaar".to_string(),
            exclude_keywords: vec![
                "visual studio".to_string(),
                "code".to_string(),
                "cursor".to_string(),
                "notepad".to_string(),
                "explorer".to_string(),
                "chrome".to_string(),
                "edge".to_string(),
                "firefox".to_string(),
                "bazaar-lens".to_string(),
                "helper".to_string(),
            ],
            min_width: 800,
            min_height: 600,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Trigger key polling interval (milliseconds).
    pub poll_interval_ms: u64,
    /// Minimum time between recognitions (milliseconds).
    pub debounce_ms: u64,
    /// A recognition not finished after this long is abandoned (milliseconds).
    pub recognition_timeout_ms: u64,
    /// Minimum interval between cursor move updates while a key is held (milliseconds).
    pub move_interval_ms: u64,
    /// Display drain interval (milliseconds).
    pub display_tick_ms: u64,
    /// How long a located window is trusted without re-enumerating (milliseconds).
    pub window_cache_ttl_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            debounce_ms: 200,
            recognition_timeout_ms: 1500,
            move_interval_ms: 50,
            display_tick_ms: 50,
            window_cache_ttl_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms)
    }

    pub fn move_interval(&self) -> Duration {
        Duration::from_millis(self.move_interval_ms)
    }

    pub fn display_tick(&self) -> Duration {
        Duration::from_millis(self.display_tick_ms)
    }

    pub fn window_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.window_cache_ttl_ms)
    }
}

/// Virtual-key codes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Held to look up the monster or event under the cursor (VK_CONTROL).
    pub monster_key: u16,
    /// Held to look up the item under the cursor (VK_SHIFT).
    pub item_key: u16,
    /// Records the next calibration corner (VK_F8).
    pub calibration_key: u16,
    /// Aborts calibration (VK_ESCAPE).
    pub calibration_abort_key: u16,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            monster_key: 0x11,
            item_key: 0x10,
            calibration_key: 0x77,
            calibration_abort_key: 0x1B,
        }
    }
}

impl KeyConfig {
    pub fn trigger_key(&self, kind: LookupKind) -> u16 {
        match kind {
            LookupKind::Monster => self.monster_key,
            LookupKind::Item => self.item_key,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ocr: OcrConfig,
    /// Directory holding the entity database JSON files. Defaults to `<exe_dir>/data`.
    pub data_dir: Option<PathBuf>,
    /// Calibration file. Defaults to `<data_dir>/position.json`.
    pub calibration_file: Option<PathBuf>,
    pub window: WindowConfig,
    pub regions: RegionConfig,
    pub timing: TimingConfig,
    /// Capacity of the image hash → text cache.
    pub ocr_cache_size: usize,
    /// Capacity of the text → match cache.
    pub match_cache_size: usize,
    pub keys: KeyConfig,
    pub thresholds: ThresholdTable,
    /// Save every captured region as a PNG under `<exe_dir>/debug/`.
    pub save_debug_captures: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            data_dir: None,
            calibration_file: None,
            window: WindowConfig::default(),
            regions: RegionConfig::default(),
            timing: TimingConfig::default(),
            ocr_cache_size: 20,
            match_cache_size: 100,
            keys: KeyConfig::default(),
            thresholds: ThresholdTable::default(),
            save_debug_captures: false,
        }
    }
}

impl AppConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::paths::get_data_dir)
    }

    pub fn calibration_file(&self) -> PathBuf {
        self.calibration_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join(crate::calibration::CALIBRATION_FILE))
    }
}

/// Returns the default config path: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path`, or returns defaults if it is missing or unreadable.
pub fn load_config(path: &Path) -> AppConfig {
    tracing::info!("Looking for config at: {}", path.display());

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            }
        }
    } else {
        tracing::info!("{} not found. Using default config.", path.display());
    }

    AppConfig::default()
}
