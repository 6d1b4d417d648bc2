//! Script views of OCR lines and name-candidate extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static NON_LATIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Glyphs that on their own are UI chrome, never part of a name.
const NOISE_CHARS: &[char] = &[
    '人', '全', '合', '使', '倒', '含', '和', '由', '国', '蕊', '本', '上', '站', '机', '作', '区',
];

/// Substrings that frequently sit inside long event names.
const NAME_KEYWORDS: &[&str] = &["的", "咖啡", "店", "朱尔斯", "失落", "宝箱", "事件", "物品"];

const MAX_CANDIDATES: usize = 15;
const MAX_PREFIX_LEN: usize = 8;
const MAX_KEYWORD_WINDOW: usize = 10;

/// True for characters in the CJK Unified Ideographs block.
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Keeps only CJK ideographs.
pub fn cjk_only(s: &str) -> String {
    s.chars().filter(|c| is_cjk(*c)).collect()
}

/// Lowercased Latin letters with single spaces between words.
pub fn latin_view(s: &str) -> String {
    let letters = NON_LATIN.replace_all(s, " ");
    WHITESPACE
        .replace_all(letters.trim(), " ")
        .to_lowercase()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Normalized edit-distance similarity in `[0, 1]`, measured in characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = char_len(a).max(char_len(b));
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein::levenshtein(a, b) as f64 / longest as f64
}

/// Fraction of `name`'s characters (with repetition) that occur anywhere in `line`,
/// and the absolute count.
pub fn char_overlap(name: &str, line: &str) -> (f64, usize) {
    let len = char_len(name);
    if len == 0 {
        return (0.0, 0);
    }
    let matched = name.chars().filter(|c| line.contains(*c)).count();
    (matched as f64 / len as f64, matched)
}

fn is_noise(candidate: &[char]) -> bool {
    candidate.iter().all(|c| NOISE_CHARS.contains(c))
}

/// Expands a CJK line into the substrings most likely to be a name.
///
/// Leading prefixes come first (names usually open the line), then windows
/// around common name keywords, then any other substrings until the list is
/// full. Candidates made only of noise glyphs are skipped. The result is
/// sorted longest first.
pub fn name_candidates(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().filter(|c| is_cjk(*c)).collect();
    let n = chars.len();
    if n < 2 {
        return Vec::new();
    }

    let mut ordered: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |slice: &[char], ordered: &mut Vec<String>| {
        if is_noise(slice) {
            return;
        }
        let s: String = slice.iter().collect();
        if seen.insert(s.clone()) {
            ordered.push(s);
        }
    };

    for len in (2..=MAX_PREFIX_LEN.min(n)).rev() {
        push(&chars[..len], &mut ordered);
    }

    let text: String = chars.iter().collect();
    for keyword in NAME_KEYWORDS {
        let Some(byte_idx) = text.find(keyword) else {
            continue;
        };
        let idx = text[..byte_idx].chars().count();
        let kw_len = char_len(keyword);
        for start in idx.saturating_sub(6)..=idx {
            let max_len = MAX_KEYWORD_WINDOW.min(n - start);
            for len in ((kw_len + 1)..=max_len).rev() {
                let window = &chars[start..start + len];
                let window_str: String = window.iter().collect();
                if len >= 3 && window_str.contains(keyword) {
                    push(window, &mut ordered);
                }
            }
        }
    }

    'outer: for start in 1..n {
        for len in (2..=MAX_PREFIX_LEN.min(n - start)).rev() {
            if ordered.len() >= MAX_CANDIDATES {
                break 'outer;
            }
            push(&chars[start..start + len], &mut ordered);
        }
    }

    ordered.sort_by(|a, b| char_len(b).cmp(&char_len(a)).then_with(|| a.cmp(b)));
    ordered.truncate(MAX_CANDIDATES);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cjk_only() {
        assert_eq!(cjk_only("狼人杀 x2!"), "狼人杀");
        assert_eq!(cjk_only("abc 123"), "");
    }

    #[test]
    fn test_latin_view() {
        assert_eq!(latin_view("  Dire-Wolf 12 "), "dire wolf");
        assert_eq!(latin_view("狼人杀"), "");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("狼人杀", "狼人杀"), 1.0);
        assert!((similarity("狼人杀", "狼人") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_char_overlap_counts_repeats() {
        let (ratio, matched) = char_overlap("咖啡咖啡", "咖");
        assert_eq!(matched, 2);
        assert_eq!(ratio, 0.5);
    }

    #[test]
    fn test_name_candidates_prefixes_first_and_longest_first() {
        let candidates = name_candidates("狼人杀");
        assert_eq!(candidates[0], "狼人杀");
        assert!(candidates.contains(&"狼人".to_string()));
        assert!(candidates.contains(&"人杀".to_string()));
        for pair in candidates.windows(2) {
            assert!(char_len(&pair[0]) >= char_len(&pair[1]));
        }
    }

    #[test]
    fn test_name_candidates_skip_noise() {
        let candidates = name_candidates("人全合");
        assert!(!candidates.contains(&"人全".to_string()));
        assert!(!candidates.contains(&"全合".to_string()));
        assert!(name_candidates("人").is_empty());
    }

    #[test]
    fn test_name_candidates_capped() {
        let candidates = name_candidates("一二三四五六七八九十甲乙丙丁戊己庚辛");
        assert!(candidates.len() <= MAX_CANDIDATES);
        assert_eq!(candidates[0], "一二三四五六七八");
    }

    #[test]
    fn test_name_candidates_keyword_window() {
        let candidates = name_candidates("神秘的咖啡店老板出现了");
        assert!(candidates.iter().any(|c| c.contains("咖啡")));
    }
}
