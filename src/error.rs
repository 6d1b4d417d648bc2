//! Recoverable failures of a single recognition cycle.
//!
//! None of these are fatal: the orchestrator logs them at debug level and the
//! cycle simply produces no overlay update.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The game window is absent, minimized, hidden, or vanished mid-pipeline.
    #[error("game window not found")]
    WindowNotFound,

    /// No usable capture rectangle could be derived for the cursor.
    #[error("capture region invalid: {0}")]
    RegionInvalid(String),

    /// The OCR backend returned nothing under every mode profile.
    #[error("OCR produced no text")]
    OcrEmpty,

    /// The text was read but nothing in the entity database scored high enough.
    #[error("no entity matched")]
    NoMatch,

    /// The worker did not finish within the recognition timeout.
    #[error("recognition timed out")]
    Timeout,
}
