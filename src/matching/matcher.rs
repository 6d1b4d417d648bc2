//! Fuzzy entity matcher.
//!
//! OCR of stylized game fonts is noisy: glyphs get dropped, swapped for
//! look-alikes, or merged with neighbouring UI text. The matcher therefore
//! tries a ladder of increasingly loose comparisons for every candidate line,
//! and accepts at the first rung that clears its threshold:
//!
//! 1. exact match of a whole line's CJK-only (or Latin-only) view
//! 2. containment in either direction, guarded by a length ratio
//! 3. character overlap, for names whose glyphs survived out of order
//! 4. edit-distance similarity above the immediate threshold
//!
//! Anything that only clears the "consider" threshold is remembered, and the
//! best of those is returned at the end if it clears the final threshold for
//! its own name length. Events are always tried before monsters.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::cache::BoundedCache;
use crate::kind::{EntityKind, LookupKind};
use crate::matching::database::{EntityDatabase, EntityRecord};
use crate::matching::policy::ThresholdTable;
use crate::matching::text::{
    char_len, char_overlap, cjk_only, latin_view, name_candidates, similarity,
};

/// Cache keys use at most this many leading characters of the text.
const CACHE_KEY_CHARS: usize = 100;

/// Minimum characters for a CJK line or name to be compared at all.
const MIN_CJK_CHARS: usize = 2;
/// Minimum characters for a Latin line to be compared at all.
const MIN_LATIN_CHARS: usize = 3;

/// A successful match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub kind: EntityKind,
    pub entity_id: String,
    pub score: f64,
}

impl MatchResult {
    fn from_record(record: &EntityRecord, score: f64) -> Self {
        Self {
            kind: record.kind,
            entity_id: record.id.clone(),
            score,
        }
    }
}

/// Item tooltip text split by glyph size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RankedText {
    /// The tallest tokens, which is where the item name is printed.
    pub primary: String,
    /// Every recognized token, for overlap scoring when the primary text is garbled.
    pub corpus: String,
}

impl RankedText {
    /// Wraps plain OCR text when no per-token heights are available.
    pub fn from_plain(text: &str) -> Self {
        Self {
            primary: text.to_string(),
            corpus: text.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MatchKey {
    lookup: LookupKind,
    text: String,
}

impl MatchKey {
    fn new(lookup: LookupKind, text: &str) -> Self {
        Self {
            lookup,
            text: text.chars().take(CACHE_KEY_CHARS).collect(),
        }
    }
}

/// The lines of one OCR read, in both script views.
#[derive(Debug, Default)]
struct CandidateLines {
    /// Whole CJK lines, the only views an exact match may short-circuit on.
    whole_cjk: Vec<String>,
    /// Whole CJK lines followed by their likely name substrings.
    cjk: Vec<String>,
    latin: Vec<String>,
}

impl CandidateLines {
    fn from_text(text: &str) -> Self {
        let mut lines = CandidateLines::default();
        for raw in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let latin = latin_view(raw);
            if char_len(&latin) >= MIN_LATIN_CHARS && !lines.latin.contains(&latin) {
                lines.latin.push(latin);
            }

            let cjk = cjk_only(raw);
            if char_len(&cjk) >= MIN_CJK_CHARS {
                if !lines.whole_cjk.contains(&cjk) {
                    lines.whole_cjk.push(cjk.clone());
                }
                for candidate in std::iter::once(cjk.clone()).chain(name_candidates(&cjk)) {
                    if !lines.cjk.contains(&candidate) {
                        lines.cjk.push(candidate);
                    }
                }
            }
        }
        lines
    }

    fn is_empty(&self) -> bool {
        self.cjk.is_empty() && self.latin.is_empty()
    }
}

/// Best below-immediate candidate seen so far.
struct Considered<'a> {
    record: &'a EntityRecord,
    score: f64,
    name_len: usize,
}

pub struct Matcher {
    database: RwLock<Arc<EntityDatabase>>,
    thresholds: ThresholdTable,
    cache: BoundedCache<MatchKey, Option<MatchResult>>,
}

impl Matcher {
    pub fn new(database: EntityDatabase, thresholds: ThresholdTable, cache_size: usize) -> Self {
        Self {
            database: RwLock::new(Arc::new(database)),
            thresholds,
            cache: BoundedCache::new(cache_size),
        }
    }

    /// Current database snapshot.
    pub fn database(&self) -> Arc<EntityDatabase> {
        self.database
            .read()
            .map(|db| Arc::clone(&db))
            .unwrap_or_else(|e| Arc::clone(&e.into_inner()))
    }

    /// Replaces the database and drops every cached result.
    pub fn reload(&self, database: EntityDatabase) {
        let mut guard = self.database.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(database);
        drop(guard);
        self.cache.clear();
        tracing::info!("Entity database reloaded, match cache cleared");
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Finds the monster or event named in `text`.
    pub fn find_best_match(&self, text: &str) -> Option<MatchResult> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let key = MatchKey::new(LookupKind::Monster, text);
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!("Match cache hit");
            return hit;
        }

        let lines = CandidateLines::from_text(text);
        if lines.is_empty() {
            tracing::debug!("No usable characters in {:?}", text);
            return None;
        }
        tracing::debug!(
            "Matching lines: cjk={:?} latin={:?}",
            lines.cjk.iter().take(10).collect::<Vec<_>>(),
            lines.latin.iter().take(5).collect::<Vec<_>>()
        );

        let db = self.database();
        let result = self.score_lines(&db, &lines);
        self.cache.put(key, result.clone());
        result
    }

    fn score_lines(&self, db: &EntityDatabase, lines: &CandidateLines) -> Option<MatchResult> {
        const ORDER: [EntityKind; 2] = [EntityKind::Event, EntityKind::Monster];

        // A whole line equal to a name wins regardless of kind order below.
        // Substrings of a line only compete through the per-record ladder.
        for kind in ORDER {
            for record in db.records(kind) {
                let zh = cjk_only(&record.localized_name);
                if char_len(&zh) >= MIN_CJK_CHARS && lines.whole_cjk.contains(&zh) {
                    tracing::debug!("Exact {} match: {}", kind, record.id);
                    return Some(MatchResult::from_record(record, 1.0));
                }
                let en = latin_view(&record.canonical_name);
                if char_len(&en) >= MIN_LATIN_CHARS && lines.latin.contains(&en) {
                    tracing::debug!("Exact {} match (latin): {}", kind, record.id);
                    return Some(MatchResult::from_record(record, 1.0));
                }
            }
        }

        let mut best: Option<Considered> = None;
        for kind in ORDER {
            for record in db.records(kind) {
                if let Some(score) = self.score_record(record, lines, &mut best) {
                    tracing::debug!("{} match: {} (score {:.2})", kind, record.id, score);
                    return Some(MatchResult::from_record(record, score));
                }
            }
        }

        let best = best?;
        let final_accept = self
            .thresholds
            .for_name(best.record.kind, best.name_len)
            .final_accept;
        if best.score >= final_accept {
            tracing::debug!(
                "Best candidate {} {} (score {:.2})",
                best.record.kind,
                best.record.id,
                best.score
            );
            Some(MatchResult::from_record(best.record, best.score))
        } else {
            tracing::debug!(
                "Best candidate {} rejected (score {:.2} < {:.2})",
                best.record.id,
                best.score,
                final_accept
            );
            None
        }
    }

    /// Runs tiers 2-4 for one record. Returns a score on immediate accept and
    /// otherwise updates `best`.
    fn score_record<'a>(
        &self,
        record: &'a EntityRecord,
        lines: &CandidateLines,
        best: &mut Option<Considered<'a>>,
    ) -> Option<f64> {
        let table = &self.thresholds;

        let zh = cjk_only(&record.localized_name);
        let zh_len = char_len(&zh);
        if zh_len >= 1 {
            let t = table.for_name(record.kind, zh_len);
            for line in &lines.cjk {
                let line_len = char_len(line);

                if zh_len >= MIN_CJK_CHARS && (line.contains(&zh) || zh.contains(line.as_str())) {
                    let guard = zh_len.min(line_len) as f64 / zh_len.max(line_len) as f64;
                    if guard >= table.containment_ratio {
                        return Some(guard);
                    }
                }

                let ratio = similarity(line, &zh);

                if zh_len >= MIN_CJK_CHARS {
                    let (overlap, matched) = char_overlap(&zh, line);
                    if overlap >= t.overlap_ratio
                        && matched >= t.required_matches(zh_len)
                        && ratio > table.overlap_similarity_floor
                    {
                        return Some(ratio);
                    }
                }

                if ratio > t.immediate {
                    return Some(ratio);
                }
                if ratio > t.consider {
                    consider(best, record, ratio, zh_len);
                }
            }
        }

        let en = latin_view(&record.canonical_name);
        let en_len = char_len(&en);
        if en_len >= MIN_LATIN_CHARS {
            let t = table.for_name(record.kind, en_len);
            for line in &lines.latin {
                let line_len = char_len(line);
                if line.contains(&en) || en.contains(line.as_str()) {
                    let guard = en_len.min(line_len) as f64 / en_len.max(line_len) as f64;
                    if guard >= table.containment_ratio {
                        return Some(guard);
                    }
                }

                // Letters are too common for character overlap; require a shared word.
                let shares_word = line
                    .split(' ')
                    .any(|word| en.split(' ').any(|name_word| name_word == word));
                if !shares_word {
                    continue;
                }
                let ratio = similarity(line, &en);
                if ratio > t.immediate {
                    return Some(ratio);
                }
                if ratio > t.consider {
                    consider(best, record, ratio, en_len);
                }
            }
        }

        None
    }

    /// Finds the item named on a tooltip.
    pub fn find_item(&self, ranked: &RankedText) -> Option<MatchResult> {
        let primary = cjk_only(&ranked.primary);
        if char_len(&primary) < MIN_CJK_CHARS {
            return None;
        }

        let key = MatchKey::new(LookupKind::Item, &format!("{}|{}", primary, ranked.corpus.trim()));
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!("Match cache hit (item)");
            return hit;
        }

        let db = self.database();
        let result = self.score_items(&db, &primary, &cjk_only(&ranked.corpus));
        self.cache.put(key, result.clone());
        result
    }

    fn score_items(&self, db: &EntityDatabase, primary: &str, corpus: &str) -> Option<MatchResult> {
        let t = &self.thresholds.item;
        let primary_len = char_len(primary);
        let mut best: Option<(f64, &EntityRecord)> = None;

        let items = db.records(EntityKind::Item);
        let names: Vec<String> = items.iter().map(|r| cjk_only(&r.localized_name)).collect();

        for (record, name) in items.iter().zip(&names) {
            let name_len = char_len(name);
            if name_len < MIN_CJK_CHARS {
                continue;
            }
            if name == primary {
                tracing::debug!("Exact item match: {}", name);
                return Some(MatchResult::from_record(record, 1.0));
            }
            if name.contains(primary) {
                let ratio = primary_len as f64 / name_len as f64;
                if ratio >= t.accept_contained {
                    tracing::debug!("Item match (text in name): {} ({:.2})", name, ratio);
                    return Some(MatchResult::from_record(record, ratio));
                }
            }
            if primary.contains(name.as_str()) {
                let ratio = name_len as f64 / primary_len as f64;
                if ratio >= t.candidate_containing {
                    keep_best(&mut best, ratio, record);
                }
            }
            let ratio = similarity(primary, name);
            if ratio >= t.candidate_similarity {
                keep_best(&mut best, ratio, record);
            }
        }

        // Garbled name line: fall back to glyph overlap against the whole tooltip,
        // scored together with whatever the name line still shares with the item.
        if best.is_none() && char_len(corpus) >= MIN_CJK_CHARS {
            for (record, name) in items.iter().zip(&names) {
                let name_len = char_len(name);
                if name_len < MIN_CJK_CHARS {
                    continue;
                }
                let bucket = self.thresholds.for_name(EntityKind::Item, name_len);
                let (overlap, matched) = char_overlap(name, corpus);
                let (_, shared_with_primary) = char_overlap(name, primary);
                if overlap >= bucket.overlap_ratio
                    && matched >= bucket.required_matches(name_len)
                    && shared_with_primary > 0
                {
                    let score = (overlap + similarity(primary, name)) / 2.0;
                    keep_best(&mut best, score, record);
                }
            }
        }

        match best {
            Some((score, record)) if score >= t.final_accept => {
                tracing::debug!("Item match: {} (score {:.2})", record.id, score);
                Some(MatchResult::from_record(record, score))
            }
            Some((score, record)) => {
                tracing::debug!("Best item {} rejected (score {:.2})", record.id, score);
                None
            }
            None => None,
        }
    }
}

fn keep_best<'a>(best: &mut Option<(f64, &'a EntityRecord)>, score: f64, record: &'a EntityRecord) {
    if best.is_none_or(|(s, _)| score > s) {
        *best = Some((score, record));
    }
}

fn consider<'a>(
    best: &mut Option<Considered<'a>>,
    record: &'a EntityRecord,
    score: f64,
    name_len: usize,
) {
    if best.as_ref().is_none_or(|b| score > b.score) {
        *best = Some(Considered {
            record,
            score,
            name_len,
        });
    }
}
