//! Match acceptance thresholds.
//!
//! Every numeric cut-off the matcher uses lives here, keyed by entity kind and
//! by the length (in characters) of the candidate name. Short names need
//! looser ratios because a single misread glyph moves the score a lot.

use serde::{Deserialize, Serialize};

use crate::kind::EntityKind;

/// Name-length buckets. Breakpoints are 2, 3, 4, 5+ characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthBucket {
    UpTo2,
    Three,
    Four,
    FivePlus,
}

impl LengthBucket {
    pub fn of(len: usize) -> Self {
        match len {
            0..=2 => LengthBucket::UpTo2,
            3 => LengthBucket::Three,
            4 => LengthBucket::Four,
            _ => LengthBucket::FivePlus,
        }
    }
}

/// Thresholds for one length bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketThresholds {
    /// Minimum fraction of the name's characters that must appear in the line.
    pub overlap_ratio: f64,
    /// Minimum absolute number of matched characters.
    pub overlap_min_chars: usize,
    /// Minimum matched characters as a fraction of the name length (rounded up).
    #[serde(default)]
    pub overlap_min_fraction: f64,
    /// Similarity ratio strictly above which a candidate is accepted immediately.
    pub immediate: f64,
    /// Similarity ratio strictly above which a candidate is kept for the final pick.
    pub consider: f64,
    /// Minimum similarity ratio for the final pick.
    pub final_accept: f64,
}

impl BucketThresholds {
    fn new(
        overlap_ratio: f64,
        overlap_min_chars: usize,
        overlap_min_fraction: f64,
        immediate: f64,
        consider: f64,
    ) -> Self {
        Self {
            overlap_ratio,
            overlap_min_chars,
            overlap_min_fraction,
            immediate,
            consider,
            final_accept: immediate,
        }
    }

    /// Number of name characters that must be found in the line for a name of `len` chars.
    pub fn required_matches(&self, len: usize) -> usize {
        let fractional = (self.overlap_min_fraction * len as f64 - 1e-9).ceil().max(0.0) as usize;
        self.overlap_min_chars.max(fractional)
    }
}

/// One row of thresholds per length bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketSet {
    pub up_to_2: BucketThresholds,
    pub three: BucketThresholds,
    pub four: BucketThresholds,
    pub five_plus: BucketThresholds,
}

impl BucketSet {
    pub fn get(&self, bucket: LengthBucket) -> &BucketThresholds {
        match bucket {
            LengthBucket::UpTo2 => &self.up_to_2,
            LengthBucket::Three => &self.three,
            LengthBucket::Four => &self.four,
            LengthBucket::FivePlus => &self.five_plus,
        }
    }
}

impl Default for BucketSet {
    fn default() -> Self {
        Self {
            up_to_2: BucketThresholds::new(0.5, 1, 0.0, 0.35, 0.20),
            three: BucketThresholds::new(0.6, 2, 0.0, 0.5, 0.35),
            four: BucketThresholds::new(0.5, 2, 0.0, 0.40, 0.30),
            five_plus: BucketThresholds::new(0.4, 0, 0.4, 0.40, 0.30),
        }
    }
}

/// Item lookups use a flatter scheme: the OCR text is the tallest glyphs on
/// the tooltip, so containment is trusted more and length matters less.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemThresholds {
    /// OCR text contained in the item name with at least this length ratio is accepted.
    pub accept_contained: f64,
    /// Item name contained in the OCR text with at least this length ratio becomes a candidate.
    pub candidate_containing: f64,
    /// Similarity ratio at which an item becomes a candidate.
    pub candidate_similarity: f64,
    /// Minimum score of the best candidate.
    pub final_accept: f64,
}

impl Default for ItemThresholds {
    fn default() -> Self {
        Self {
            accept_contained: 0.5,
            candidate_containing: 0.3,
            candidate_similarity: 0.5,
            final_accept: 0.4,
        }
    }
}

/// The full threshold table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    pub monster: BucketSet,
    pub event: BucketSet,
    pub item: ItemThresholds,
    /// Length-ratio guard for containment matches (shorter / longer).
    pub containment_ratio: f64,
    /// Similarity an overlap match must still exceed.
    pub overlap_similarity_floor: f64,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            monster: BucketSet::default(),
            event: BucketSet::default(),
            item: ItemThresholds::default(),
            containment_ratio: 0.5,
            overlap_similarity_floor: 0.3,
        }
    }
}

impl ThresholdTable {
    /// Thresholds for a name of `name_len` characters of the given kind.
    ///
    /// Items have no bucketed table of their own and share the monster rows
    /// for character-overlap fallback.
    pub fn for_name(&self, kind: EntityKind, name_len: usize) -> &BucketThresholds {
        let set = match kind {
            EntityKind::Event => &self.event,
            EntityKind::Monster | EntityKind::Item => &self.monster,
        };
        set.get(LengthBucket::of(name_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_buckets() {
        assert_eq!(LengthBucket::of(1), LengthBucket::UpTo2);
        assert_eq!(LengthBucket::of(2), LengthBucket::UpTo2);
        assert_eq!(LengthBucket::of(3), LengthBucket::Three);
        assert_eq!(LengthBucket::of(4), LengthBucket::Four);
        assert_eq!(LengthBucket::of(5), LengthBucket::FivePlus);
        assert_eq!(LengthBucket::of(12), LengthBucket::FivePlus);
    }

    #[test]
    fn test_required_matches() {
        let table = ThresholdTable::default();
        assert_eq!(table.for_name(EntityKind::Monster, 2).required_matches(2), 1);
        assert_eq!(table.for_name(EntityKind::Monster, 3).required_matches(3), 2);
        assert_eq!(table.for_name(EntityKind::Monster, 4).required_matches(4), 2);
        assert_eq!(table.for_name(EntityKind::Monster, 5).required_matches(5), 2);
        assert_eq!(table.for_name(EntityKind::Monster, 8).required_matches(8), 4);
        assert_eq!(table.for_name(EntityKind::Monster, 10).required_matches(10), 4);
    }

    #[test]
    fn test_short_names_need_fewer_overlapping_chars() {
        let table = ThresholdTable::default();
        for kind in [EntityKind::Monster, EntityKind::Event] {
            let two = table.for_name(kind, 2);
            for len in 5..=20 {
                let long = table.for_name(kind, len);
                // Equal overlap ratio: the long name still needs more matched characters.
                assert!(two.required_matches(2) < long.required_matches(len));
            }
        }
    }

    #[test]
    fn test_immediate_thresholds_preserved() {
        let set = BucketSet::default();
        assert_eq!(set.get(LengthBucket::UpTo2).immediate, 0.35);
        assert_eq!(set.get(LengthBucket::Three).immediate, 0.5);
        assert_eq!(set.get(LengthBucket::Four).immediate, 0.40);
        assert_eq!(set.get(LengthBucket::FivePlus).immediate, 0.40);
        assert_eq!(set.get(LengthBucket::UpTo2).consider, 0.20);
        assert_eq!(set.get(LengthBucket::Three).consider, 0.35);
        assert_eq!(set.get(LengthBucket::Four).consider, 0.30);
        assert_eq!(set.get(LengthBucket::FivePlus).consider, 0.30);
    }

    #[test]
    fn test_partial_table_deserializes_with_defaults() {
        let json = r#"{ "containment_ratio": 0.6 }"#;
        let table: ThresholdTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.containment_ratio, 0.6);
        assert_eq!(table.monster, BucketSet::default());
        assert_eq!(table.item.final_accept, 0.4);
    }
}
