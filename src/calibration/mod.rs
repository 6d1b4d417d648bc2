//! Calibration: recorded icon and name regions of a reference card.
//!
//! The file is produced by the `calibrate` mode and consumed by the region
//! locator to gate lookups and derive name regions.

pub mod anchors;
pub mod recorder;

pub use anchors::{Anchor, CalibrationFile, NameOffsets, Quad};
pub use recorder::run_calibration;

/// File name of the calibration file inside the data directory.
pub const CALIBRATION_FILE: &str = "position.json";
