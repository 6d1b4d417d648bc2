//! Text recognition: Tesseract setup, image preprocessing, the backend
//! abstraction, the cached capture reader, and text cleanup.

pub mod engine;
pub mod normalize;
pub mod preprocess;
pub mod reader;
pub mod setup;

pub use engine::{ModeProfile, OcrBackend, OcrLine, OcrWord, TesseractBackend};
pub use normalize::clean;
pub use reader::CaptureReader;
pub use setup::{TesseractPaths, ensure_tesseract};
