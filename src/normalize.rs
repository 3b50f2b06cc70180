//! Title normalization shared by the filename matcher and the linker.
//!
//! The fluff list is explicit configuration: build a [`FluffList`] (defaults or
//! a word-list file), hand it to a [`Normalizer`], and pass that around.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::Path;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Parenthesized or bracketed groups: "(Live at Seoul)", "[4K]"
pub static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());

/// Everything except word characters, whitespace, hyphen and apostrophe
pub static DISALLOWED_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s'\-]").unwrap());

/// Any run of whitespace
pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// FLUFF TERMS
// ============================================================================

/// Phrases that carry no information about which song or artist is meant.
pub const DEFAULT_FLUFF_TERMS: &[&str] = &[
    // Video type
    "official music video",
    "official mv",
    "official m/v",
    "official video",
    "official audio",
    "official teaser",
    "music video",
    "lyric video",
    "performance video",
    "dance practice",
    "choreography video",
    "m/v",
    "(mv)",
    "[mv]",
    // Stages and live
    "(live)",
    "[live]",
    "live stage",
    "comeback stage",
    "special stage",
    "fancam",
    // Versions and language tags
    "english ver.",
    "japanese ver.",
    "korean ver.",
    "chinese ver.",
    "eng ver.",
    "jpn ver.",
    "kor ver.",
    "(eng sub)",
    "[eng sub]",
    "eng sub",
    "(color coded lyrics)",
    // Quality tags. Bare short tags are left out: removal is by substring,
    // so "4k" would cut "24K Magic".
    "(4k)",
    "[4k]",
    "1080p",
    "60fps",
];

/// Fluff phrases, lowercased, de-duplicated and ordered longest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FluffList {
    terms: Vec<String>,
}

impl FluffList {
    /// Build a fluff list from arbitrary phrases.
    /// Blank phrases are dropped; the sort is stable so equal-length phrases
    /// keep their given order.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = FxHashSet::default();
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        Self { terms }
    }

    pub fn empty() -> Self {
        Self { terms: Vec::new() }
    }

    /// Parse a word list: one phrase per line, `#` starts a comment line.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Load a word list file (see [`FluffList::parse`]).
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fluff list {}", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for FluffList {
    fn default() -> Self {
        Self::new(DEFAULT_FLUFF_TERMS.iter().copied())
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Canonicalizes titles and filenames for comparison.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    fluff: FluffList,
}

impl Normalizer {
    pub fn new(fluff: FluffList) -> Self {
        Self { fluff }
    }

    pub fn fluff(&self) -> &FluffList {
        &self.fluff
    }

    /// Normalize a title for matching.
    ///
    /// Lowercases, removes fluff phrases (longest first, each replaced by a
    /// space), strips bracketed groups and punctuation, then collapses
    /// whitespace. Passes repeat until the output is stable, so punctuation
    /// or whitespace removal can never leave a fluff phrase behind and
    /// `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, text: &str) -> String {
        let mut current = self.normalize_pass(text);
        loop {
            let next = self.normalize_pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn normalize_pass(&self, text: &str) -> String {
        let mut result = text.to_lowercase();

        for term in self.fluff.terms() {
            if result.contains(term.as_str()) {
                result = result.replace(term.as_str(), " ");
            }
        }

        // Brackets only after fluff removal: fluff phrases may contain them
        result = BRACKETED.replace_all(&result, " ").into_owned();
        result = DISALLOWED_CHARS.replace_all(&result, "").into_owned();

        WHITESPACE_RUN.replace_all(&result, " ").trim().to_string()
    }
}

/// Split a multi-song title into mention segments.
/// Comma-separated; a title without commas is a single segment.
pub fn split_mentions(title: &str) -> Vec<&str> {
    title
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(terms: &[&str]) -> Normalizer {
        Normalizer::new(FluffList::new(terms.iter().copied()))
    }

    #[test]
    fn test_normalize_basic() {
        let n = normalizer(&[]);
        assert_eq!(n.normalize("Don't Wanna Cry!"), "don't wanna cry");
        assert_eq!(n.normalize("  Love-Dive?  "), "love-dive");
        assert_eq!(n.normalize("Next Level (Dance Practice)"), "next level");
        assert_eq!(n.normalize("Psycho [4K]   Stage"), "psycho stage");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn test_normalize_keeps_unicode_words() {
        let n = normalizer(&[]);
        assert_eq!(n.normalize("사랑해 (Love You)"), "사랑해");
        assert_eq!(n.normalize("Café Ñandú"), "café ñandú");
    }

    #[test]
    fn test_fluff_longest_first() {
        // "mv" applied first would leave "official" behind
        let n = normalizer(&["mv", "official mv"]);
        assert_eq!(n.fluff().terms()[0], "official mv");
        assert_eq!(n.normalize("Hype Boy Official MV"), "hype boy");
    }

    #[test]
    fn test_fluff_replaced_with_space() {
        let n = normalizer(&["ver."]);
        assert_eq!(n.normalize("Butterver.fly"), "butter fly");
    }

    #[test]
    fn test_fluff_with_brackets_before_bracket_strip() {
        let n = normalizer(&["(live) ver"]);
        assert_eq!(n.normalize("Tomboy (Live) Ver (2022)"), "tomboy");
    }

    #[test]
    fn test_default_fluff() {
        let n = Normalizer::default();
        assert_eq!(n.normalize("ANTIFRAGILE Official MV"), "antifragile");
        assert_eq!(n.normalize("Kitsch (Live) - Japanese Ver."), "kitsch -");
        assert_eq!(n.normalize("Official MV"), "");
    }

    #[test]
    fn test_default_fluff_leaves_title_words_intact() {
        let n = Normalizer::default();
        assert_eq!(n.normalize("Forever."), "forever");
        assert_eq!(n.normalize("24K Magic"), "24k magic");
        assert_eq!(n.normalize("Kitsch (4K)"), "kitsch");
        assert_eq!(n.normalize("Love Dive Japanese ver."), "love dive");
    }

    #[test]
    fn test_normalize_idempotent() {
        let n = normalizer(&["official mv", "ver.", "(live)"]);
        let inputs = [
            "Official. MV",
            "official  mv",
            "Song (Live) ver.",
            "((nested)) tail",
            "a [b (c] d) e",
            "Mixed-Case 'Quotes' & Ampersands!!",
            "   ",
            "İstanbul",
        ];
        for input in inputs {
            let once = n.normalize(input);
            assert_eq!(n.normalize(&once), once, "input: {:?}", input);
        }
        assert_eq!(n.normalize("Official. MV"), "");
    }

    #[test]
    fn test_normalize_case_insensitive() {
        let n = Normalizer::default();
        assert_eq!(n.normalize("SUPER SHY"), n.normalize("super shy"));
    }

    #[test]
    fn test_fluff_list_parse() {
        let list = FluffList::parse("# comment\nofficial mv\n\n  MV  \nofficial MV\n");
        assert_eq!(list.terms(), &["official mv".to_string(), "mv".to_string()]);
        assert!(!list.is_empty());
        assert_eq!(FluffList::empty().len(), 0);
    }

    #[test]
    fn test_split_mentions() {
        assert_eq!(
            split_mentions("Song A, Song B ,  , Song C"),
            vec!["Song A", "Song B", "Song C"]
        );
        assert_eq!(split_mentions("Solo"), vec!["Solo"]);
        assert!(split_mentions("  ").is_empty());
    }
}
