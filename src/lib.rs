//! Bazaar Lens
//!
//! Reads the name of the monster, event, or item under the cursor in The
//! Bazaar and resolves it against a local entity database, so an overlay can
//! show what it is.

pub mod cache;
pub mod calibration;
pub mod capture;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod kind;
pub mod logging;
pub mod matching;
pub mod ocr;
pub mod orchestrator;
pub mod paths;
