//! Cleans raw OCR text before matching.

use regex::Regex;
use std::sync::LazyLock;

/// Punctuation and bracket glyphs OCR hallucinates around UI borders.
static NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[{}\[\]()<>`~!@#$%^&*_+=;:"',.?\\|]"#).unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Lines longer than this are cut; anything longer is description text, not a name.
pub const MAX_LINE_CHARS: usize = 40;

/// Pure-digit lines shorter than this are stat numbers and are dropped.
const MIN_NUMERIC_LINE_CHARS: usize = 4;

/// Card footer marker. It and everything after it on a line is reward text.
const REWARD_MARKER: &str = "奖励";

/// Normalizes OCR output line by line.
///
/// Strips noise punctuation, collapses whitespace runs, removes reward
/// footers, drops short numeric fragments, and truncates long lines. Blank
/// lines are removed. Never fails; the result may be empty.
pub fn clean(text: &str) -> String {
    let stripped = NOISE.replace_all(text, "");

    let mut lines: Vec<String> = Vec::new();
    for line in stripped.lines() {
        let mut line = SPACES.replace_all(line, " ").trim().to_string();

        if let Some(idx) = line.find(REWARD_MARKER) {
            line = line[..idx].trim_end().to_string();
        }

        if line.is_empty() {
            continue;
        }

        if line.chars().count() < MIN_NUMERIC_LINE_CHARS && line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        if line.chars().count() > MAX_LINE_CHARS {
            line = line.chars().take(MAX_LINE_CHARS).collect();
        }

        lines.push(line);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_noise_characters() {
        assert_eq!(clean("[狼人杀]!"), "狼人杀");
        assert_eq!(clean("a|b\\c"), "abc");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(clean("  幽灵    船长  "), "幽灵 船长");
    }

    #[test]
    fn test_drops_short_numeric_lines() {
        assert_eq!(clean("12\n狼\n7\n1234"), "狼\n1234");
    }

    #[test]
    fn test_truncates_long_lines() {
        let long = "字".repeat(60);
        let cleaned = clean(&long);
        assert_eq!(cleaned.chars().count(), MAX_LINE_CHARS);
    }

    #[test]
    fn test_reward_suffix_removed() {
        assert_eq!(clean("狼人杀 奖励 x2"), "狼人杀");
        assert_eq!(clean("奖励 金币\n巨魔"), "巨魔");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean(" \n\n ,. "), "");
    }

    #[test]
    fn test_idempotent() {
        let once = clean("[幽灵 船长]  12\n奖励: 3 金币\n99");
        assert_eq!(clean(&once), once);
    }
}
