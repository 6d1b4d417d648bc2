//! Capture → OCR with a content-hash cache.

use image::{DynamicImage, RgbaImage};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use super::engine::{ModeProfile, OcrBackend, OcrLine, OcrWord, lines_to_text};
use super::preprocess::preprocess_for_ocr;
use crate::cache::BoundedCache;
use crate::capture::ScreenGrabber;
use crate::config::OcrConfig;
use crate::geometry::Rect;
use crate::kind::LookupKind;
use crate::matching::RankedText;
use crate::matching::text::cjk_only;

/// Tokens kept in the primary text of a ranked read.
const PRIMARY_TOKENS: usize = 5;

// Digest domain tags, so plain and ranked reads of one image are cached apart.
const PLAIN_READ: u8 = b'P';
const RANKED_READ: u8 = b'R';

#[derive(Clone, Debug)]
enum CachedRead {
    Text(String),
    Ranked(Option<RankedText>),
}

/// Grabs screen regions and turns them into text.
pub struct CaptureReader {
    grabber: Box<dyn ScreenGrabber>,
    backend: Box<dyn OcrBackend>,
    language: String,
    raw_profile: ModeProfile,
    enhanced_profile: ModeProfile,
    cache: BoundedCache<[u8; 32], CachedRead>,
    debug_dir: Option<PathBuf>,
}

impl CaptureReader {
    pub fn new(
        grabber: Box<dyn ScreenGrabber>,
        backend: Box<dyn OcrBackend>,
        config: &OcrConfig,
        cache_size: usize,
    ) -> Self {
        Self {
            grabber,
            backend,
            language: config.language.clone(),
            raw_profile: config.raw_profile.clone(),
            enhanced_profile: config.enhanced_profile.clone(),
            cache: BoundedCache::new(cache_size),
            debug_dir: None,
        }
    }

    /// Saves every grabbed region as a PNG under `dir`.
    pub fn with_debug_dir(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Grabs `rect` and reads it. `None` if the grab failed or nothing was read.
    pub fn capture_and_read(&self, rect: Rect, kind: LookupKind) -> Option<String> {
        let img = self.grab(rect, kind)?;
        self.read_image(&img)
    }

    /// Grabs `rect` and reads it token by token, ranking tokens by glyph height.
    pub fn capture_and_read_ranked(&self, rect: Rect) -> Option<RankedText> {
        let img = self.grab(rect, LookupKind::Item)?;
        self.read_image_ranked(&img)
    }

    fn grab(&self, rect: Rect, kind: LookupKind) -> Option<RgbaImage> {
        let img = match self.grabber.grab(rect) {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!("Screen grab of {} failed: {}", rect, e);
                return None;
            }
        };
        if let Some(dir) = &self.debug_dir {
            save_debug_capture(dir, &img, kind);
        }
        Some(img)
    }

    /// Reads an image: the raw profile first, the enhanced (preprocessed)
    /// profile only if raw produced nothing.
    pub fn read_image(&self, img: &RgbaImage) -> Option<String> {
        let key = image_digest(img, PLAIN_READ);
        if let Some(CachedRead::Text(text)) = self.cache.get(&key) {
            tracing::trace!("OCR cache hit");
            return non_empty(text);
        }

        let raw = self.recognize(img, &self.raw_profile);
        let (text, failed) = self.plain_text(img, raw);

        // A failed backend call may succeed next time; only cache clean reads.
        if !failed || !text.is_empty() {
            self.cache.put(key, CachedRead::Text(text.clone()));
        }
        non_empty(text)
    }

    /// Reads an image token by token.
    ///
    /// The primary text is the tallest CJK tokens (titles are drawn larger
    /// than descriptions); the corpus is every CJK token in reading order.
    /// Falls back to the plain text of the same read when no CJK token was
    /// recognized.
    pub fn read_image_ranked(&self, img: &RgbaImage) -> Option<RankedText> {
        let key = image_digest(img, RANKED_READ);
        if let Some(CachedRead::Ranked(ranked)) = self.cache.get(&key) {
            tracing::trace!("OCR cache hit (ranked)");
            return ranked;
        }

        let raw = self.recognize(img, &self.raw_profile);
        if let Some(ranked) = raw.as_deref().and_then(rank_tokens) {
            self.cache.put(key, CachedRead::Ranked(Some(ranked.clone())));
            return Some(ranked);
        }

        tracing::debug!("No CJK tokens in ranked read, falling back to plain text");
        let (text, failed) = self.plain_text(img, raw);
        let ranked = non_empty(text).map(|t| RankedText::from_plain(&t));
        if !failed || ranked.is_some() {
            self.cache.put(key, CachedRead::Ranked(ranked.clone()));
        }
        ranked
    }

    /// Plain text of a raw-profile result, running the enhanced profile only
    /// if raw produced nothing. The flag is set if any backend call failed.
    fn plain_text(&self, img: &RgbaImage, raw: Option<Vec<OcrLine>>) -> (String, bool) {
        let failed = raw.is_none();
        let text = raw
            .map(|lines| lines_to_text(&lines).trim().to_string())
            .unwrap_or_default();
        if !text.is_empty() {
            return (text, failed);
        }

        tracing::trace!("Raw profile read nothing, trying enhanced profile");
        match self.recognize(img, &self.enhanced_profile) {
            Some(lines) => (lines_to_text(&lines).trim().to_string(), failed),
            None => (String::new(), true),
        }
    }

    /// Runs the backend, treating failures as "nothing read".
    fn recognize(&self, img: &RgbaImage, profile: &ModeProfile) -> Option<Vec<OcrLine>> {
        let input = if profile.preprocess {
            DynamicImage::ImageLuma8(preprocess_for_ocr(img))
        } else {
            DynamicImage::ImageRgba8(img.clone())
        };
        match self.backend.recognize(&input, &self.language, profile) {
            Ok(lines) => {
                tracing::trace!("OCR ({}) returned {} lines", profile.name, lines.len());
                Some(lines)
            }
            Err(e) => {
                tracing::warn!("OCR backend failed ({} profile): {}", profile.name, e);
                None
            }
        }
    }
}

/// Builds primary and corpus text from the CJK tokens of a read.
fn rank_tokens(lines: &[OcrLine]) -> Option<RankedText> {
    let tokens: Vec<(&OcrWord, String)> = lines
        .iter()
        .flat_map(|line| line.words.iter())
        .filter(|w| w.confidence > 0.0)
        .filter_map(|w| {
            let cjk = cjk_only(&w.text);
            (!cjk.is_empty()).then_some((w, cjk))
        })
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let corpus = tokens
        .iter()
        .map(|(_, t)| t.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut by_height: Vec<&(&OcrWord, String)> = tokens.iter().collect();
    // Stable sort keeps reading order among equal heights
    by_height.sort_by(|a, b| b.0.height.cmp(&a.0.height));
    let primary: String = by_height
        .iter()
        .take(PRIMARY_TOKENS)
        .map(|(_, t)| t.as_str())
        .collect();

    Some(RankedText { primary, corpus })
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}

/// SHA-256 over the dimensions and pixels of an image.
fn image_digest(img: &RgbaImage, tag: u8) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([tag]);
    hasher.update(img.width().to_le_bytes());
    hasher.update(img.height().to_le_bytes());
    hasher.update(img.as_raw());
    hasher.finalize().into()
}

fn save_debug_capture(dir: &std::path::Path, img: &RgbaImage, kind: LookupKind) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!("Failed to create debug dir {}: {}", dir.display(), e);
        return;
    }
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    let path = dir.join(format!("{}_{}.png", kind, timestamp));
    match img.save(&path) {
        Ok(()) => tracing::debug!("Saved debug capture to {}", path.display()),
        Err(e) => tracing::warn!("Failed to save debug capture {}: {}", path.display(), e),
    }
}
