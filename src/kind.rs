use serde::{Deserialize, Serialize};

/// What a database record (and therefore a match) describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Monster,
    Event,
    Item,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Monster => write!(f, "monster"),
            EntityKind::Event => write!(f, "event"),
            EntityKind::Item => write!(f, "item"),
        }
    }
}

/// Which trigger started a lookup.
///
/// Selects the capture offsets, the calibration anchors, and the matching
/// strategy. Monster lookups also match events, which share the same
/// on-screen card layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    Monster,
    Item,
}

impl LookupKind {
    pub const ALL: [LookupKind; 2] = [LookupKind::Monster, LookupKind::Item];
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKind::Monster => write!(f, "monster"),
            LookupKind::Item => write!(f, "item"),
        }
    }
}
