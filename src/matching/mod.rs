//! Entity matching: the name database and the fuzzy matcher that scores OCR text against it.

pub mod database;
pub mod matcher;
pub mod policy;
pub mod text;

pub use database::{EntityDatabase, EntityRecord, EventChoice};
pub use matcher::{MatchResult, Matcher, RankedText};
pub use policy::ThresholdTable;
