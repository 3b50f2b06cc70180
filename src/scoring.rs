//! Scoring functions for filename matching.
//!
//! This module contains:
//! - The four substring strategies used to score a catalog name against a filename
//! - Ranking of a whole catalog for one filename
//! - Auto-fill resolution against a confidence floor

use std::path::Path;

use crate::models::{CatalogEntry, MatchCandidate, MatchStrategy};

// ============================================================================
// Score Configuration
// ============================================================================

/// Score constants for the four strategies. Defaults are heuristics, not tuned values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringConfig {
    /// Strategy 1: verbatim substring
    pub exact_score: i32,
    /// Strategy 2: substring after `_ - .` became spaces
    pub delimiter_score: i32,
    /// Strategy 3: substring with whitespace removed, plus half the name length
    pub no_space_base: i32,
    pub no_space_length_cap: i32,
    /// Strategy 4: every meaningful word present
    pub multi_word_base: i32,
    pub multi_word_per_word: i32,
    pub multi_word_cap: i32,
    pub proximity_bonus: i32,
    /// Words cluster when their span is at most this many times their combined length
    pub proximity_factor: usize,
    /// Names this short (in chars) only match as isolated tokens
    pub short_name_max_len: usize,
    /// Minimum score to auto-accept a match
    pub confidence_floor: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exact_score: 100,
            delimiter_score: 80,
            no_space_base: 60,
            no_space_length_cap: 20,
            multi_word_base: 40,
            multi_word_per_word: 10,
            multi_word_cap: 30,
            proximity_bonus: 10,
            proximity_factor: 3,
            short_name_max_len: 3,
            confidence_floor: 60,
        }
    }
}

/// Words ignored by the multi-word strategy
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "of", "to", "in", "on", "for", "by", "with", "feat", "ft", "vs", "x",
];

// ============================================================================
// String Helpers
// ============================================================================

/// Treat `_`, `-` and `.` as word separators.
pub fn replace_delimiters(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '_' | '-' | '.') { ' ' } else { c })
        .collect()
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// File name component of a path; the whole string when there is none.
pub fn file_component(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
}

/// Byte offset of the first occurrence of `needle` in `haystack` with no
/// alphanumeric character directly before or after it. Overlapping
/// occurrences are all considered.
pub fn find_isolated(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.char_indices().map(|(start, _)| start).find(|&start| {
        if !haystack[start..].starts_with(needle) {
            return false;
        }
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        before.map_or(true, |c| !c.is_alphanumeric()) && after.map_or(true, |c| !c.is_alphanumeric())
    })
}

/// True if `needle` occurs in `haystack` as an isolated token.
pub fn contains_isolated(haystack: &str, needle: &str) -> bool {
    find_isolated(haystack, needle).is_some()
}

// ============================================================================
// Strategy Scoring
// ============================================================================

/// Score one catalog name against a filename (or any free text).
/// Returns the first strategy that matches; strategies are never summed.
pub fn score_name(
    filename: &str,
    name: &str,
    config: &ScoringConfig,
) -> Option<(i32, MatchStrategy)> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let file_lower = filename.to_lowercase();
    let name_lower = name.to_lowercase();
    let name_len = name_lower.chars().count();
    let short = name_len <= config.short_name_max_len;

    let found = |haystack: &str, needle: &str| {
        if short {
            contains_isolated(haystack, needle)
        } else {
            haystack.contains(needle)
        }
    };

    // Strategy 1: exact substring ("IVE" must not match inside "AnnIVErsary")
    if found(&file_lower, &name_lower) {
        return Some((config.exact_score, MatchStrategy::ExactSubstring));
    }

    // Strategy 2: delimiter-normalized substring
    let file_delim = replace_delimiters(&file_lower);
    let name_delim = replace_delimiters(&name_lower);
    let name_delim = name_delim.trim();
    if !name_delim.is_empty() && found(&file_delim, name_delim) {
        return Some((config.delimiter_score, MatchStrategy::DelimiterNormalized));
    }

    // Strategy 3: whitespace-free substring; isolation is meaningless here
    if !short {
        let name_compact = strip_whitespace(&name_lower);
        if !name_compact.is_empty() && strip_whitespace(&file_lower).contains(&name_compact) {
            let bonus = ((name_len / 2) as i32).min(config.no_space_length_cap);
            return Some((config.no_space_base + bonus, MatchStrategy::NoSpace));
        }
    }

    // Strategy 4: all meaningful words present
    multi_word_score(&file_delim, name_delim, config)
        .map(|score| (score, MatchStrategy::MultiWord))
}

/// Strategy 4. Both inputs are lowercase and delimiter-normalized.
fn multi_word_score(file_delim: &str, name_delim: &str, config: &ScoringConfig) -> Option<i32> {
    let words: Vec<&str> = name_delim.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }

    let mut meaningful: Vec<&str> = Vec::with_capacity(words.len());
    for word in words {
        if word.chars().count() >= 2 && !STOPWORDS.contains(&word) && !meaningful.contains(&word) {
            meaningful.push(word);
        }
    }
    if meaningful.is_empty() {
        return None;
    }

    // Short words ("oh", "my") only count as whole tokens
    let mut positions = Vec::with_capacity(meaningful.len());
    for word in &meaningful {
        let pos = if word.chars().count() <= config.short_name_max_len {
            find_isolated(file_delim, word)?
        } else {
            file_delim.find(word)?
        };
        positions.push((pos, word.len()));
    }

    let count = meaningful.len() as i32;
    let mut score = config.multi_word_base + (config.multi_word_per_word * count).min(config.multi_word_cap);

    let start = positions.iter().map(|&(pos, _)| pos).min()?;
    let end = positions.iter().map(|&(pos, len)| pos + len).max()?;
    let combined: usize = positions.iter().map(|&(_, len)| len).sum();
    if end - start <= config.proximity_factor * combined {
        score += config.proximity_bonus;
    }

    Some(score)
}

// ============================================================================
// Ranking
// ============================================================================

/// Score every catalog entry against a filename.
/// Entries with no matching strategy are dropped; the sort is stable so
/// equal scores keep catalog order.
pub fn rank_candidates(
    filename: &str,
    entries: &[CatalogEntry],
    config: &ScoringConfig,
) -> Vec<MatchCandidate> {
    let query = file_component(filename);

    let mut ranked: Vec<MatchCandidate> = entries
        .iter()
        .filter_map(|entry| {
            score_name(query, &entry.name, config).map(|(score, strategy)| MatchCandidate {
                entry_id: entry.id,
                score,
                strategy,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Best candidate at or above the confidence floor.
pub fn best_candidate(
    filename: &str,
    entries: &[CatalogEntry],
    config: &ScoringConfig,
) -> Option<MatchCandidate> {
    rank_candidates(filename, entries, config)
        .into_iter()
        .next()
        .filter(|c| c.score >= config.confidence_floor)
}

/// Outcome for the auto-fill caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A single top candidate at or above the confidence floor
    Accepted(MatchCandidate),
    /// Candidates exist but need a manual choice (below floor or tied at the top)
    Ambiguous(Vec<MatchCandidate>),
    NoMatch,
}

/// Resolve a filename for auto-fill.
pub fn resolve(filename: &str, entries: &[CatalogEntry], config: &ScoringConfig) -> Resolution {
    let ranked = rank_candidates(filename, entries, config);
    let Some(top) = ranked.first().copied() else {
        return Resolution::NoMatch;
    };

    let tied = ranked.get(1).is_some_and(|next| next.score == top.score);
    if top.score >= config.confidence_floor && !tied {
        Resolution::Accepted(top)
    } else {
        Resolution::Ambiguous(ranked)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> Vec<CatalogEntry> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| CatalogEntry::new(i as i64 + 1, *name))
            .collect()
    }

    fn score(filename: &str, name: &str) -> Option<(i32, MatchStrategy)> {
        score_name(filename, name, &ScoringConfig::default())
    }

    #[test]
    fn test_short_name_isolation() {
        assert_eq!(
            score("231225_IVE.mp4", "IVE"),
            Some((100, MatchStrategy::ExactSubstring))
        );
        assert_eq!(score("240101_AnnIVErsary.mp4", "IVE"), None);
        assert_eq!(score("IVE", "ive"), Some((100, MatchStrategy::ExactSubstring)));
        // Second occurrence is isolated even though the first is not
        assert_eq!(
            score("anniversary by ive", "IVE"),
            Some((100, MatchStrategy::ExactSubstring))
        );
    }

    #[test]
    fn test_short_name_not_matched_by_catalog_ranking() {
        let entries = catalog(&["IVE", "Girls Generation"]);
        let ranked = rank_candidates("240101_AnnIVErsary.mp4", &entries, &ScoringConfig::default());
        assert!(ranked.iter().all(|c| c.entry_id != 1));
    }

    #[test]
    fn test_exact_substring_position_independent() {
        assert_eq!(
            score("230101 Anniversary Special - Girls Generation.mp4", "Girls Generation"),
            Some((100, MatchStrategy::ExactSubstring))
        );
    }

    #[test]
    fn test_delimiter_normalized() {
        assert_eq!(
            score("220908_Girls_Generation_Anniversary.mp4", "Girls Generation"),
            Some((80, MatchStrategy::DelimiterNormalized))
        );
        assert_eq!(
            score("230101_Red-Velvet.mp4", "Red Velvet"),
            Some((80, MatchStrategy::DelimiterNormalized))
        );
    }

    #[test]
    fn test_no_space_strategy() {
        // "Girls Generation" is 16 chars: 60 + 8
        assert_eq!(
            score("220908_GirlsGeneration_Anniversary.mp4", "Girls Generation"),
            Some((68, MatchStrategy::NoSpace))
        );
        // "Red Velvet" is 10 chars: 60 + 5
        assert_eq!(
            score("231112_redvelvet_feel_my_rhythm.mp4", "Red Velvet"),
            Some((65, MatchStrategy::NoSpace))
        );
    }

    #[test]
    fn test_no_space_length_capped() {
        let name = "The Extraordinarily Long Named Orchestra Band";
        let file = "clip_theextraordinarilylongnamedorchestraband.mp4";
        assert_eq!(score(file, name), Some((80, MatchStrategy::NoSpace)));
    }

    #[test]
    fn test_multi_word_strategy() {
        // Words present, out of order, clustered: 40 + 20 + 10
        assert_eq!(
            score("230101_Generation_of_Girls_live.mp4", "Girls Generation"),
            Some((70, MatchStrategy::MultiWord))
        );
        // Stopwords and one-letter words are not required
        assert_eq!(
            score("stage_wonder_girls_2008.mp4", "The Wonder Girls"),
            Some((70, MatchStrategy::MultiWord))
        );
        assert_eq!(
            score("girls_2008_the_wonder.mp4", "The Wonder Girls"),
            Some((70, MatchStrategy::MultiWord))
        );
    }

    #[test]
    fn test_multi_word_short_words_must_be_isolated() {
        // "oh" hides in "john", "my" in "army"
        assert_eq!(score("john_army_girls.mp4", "Oh My Girl"), None);
        let entries = catalog(&["Oh My Girl"]);
        assert_eq!(
            resolve("john_army_girls.mp4", &entries, &ScoringConfig::default()),
            Resolution::NoMatch
        );
        assert_eq!(
            score("230501_oh_my_girl_dun_dun_dance.mp4", "Oh My Girl"),
            Some((80, MatchStrategy::DelimiterNormalized))
        );
        // Isolated and clustered: 40 + 30 + 10
        assert_eq!(
            score("230501_girl_oh_my_stage.mp4", "Oh My Girl"),
            Some((80, MatchStrategy::MultiWord))
        );
    }

    #[test]
    fn test_multi_word_without_proximity() {
        let file = "girls_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa_generation.mp4";
        assert_eq!(score(file, "Girls Generation"), Some((60, MatchStrategy::MultiWord)));
    }

    #[test]
    fn test_multi_word_requires_all_words() {
        assert_eq!(score("girls_day_2015.mp4", "Girls Generation"), None);
        assert_eq!(score("generation.mp4", "Girls Generation"), None);
    }

    #[test]
    fn test_empty_name_never_matches() {
        assert_eq!(score("anything.mp4", ""), None);
        assert_eq!(score("anything.mp4", "   "), None);
        assert_eq!(score("a-b.mp4", "-"), None);
    }

    #[test]
    fn test_rank_candidates_sorted_and_stable() {
        let entries = catalog(&["Red Velvet", "Girls Generation", "aespa", "Velvet"]);
        let ranked = rank_candidates(
            "/videos/231112_redvelvet_Velvet_aespa.mp4",
            &entries,
            &ScoringConfig::default(),
        );
        let ids: Vec<i64> = ranked.iter().map(|c| c.entry_id).collect();
        assert_eq!(ids, vec![3, 4, 1]);
        assert_eq!(ranked[2].strategy, MatchStrategy::NoSpace);
    }

    #[test]
    fn test_rank_ignores_directories() {
        let entries = catalog(&["Red Velvet"]);
        let ranked = rank_candidates(
            "/Red Velvet/231112_psycho.mp4",
            &entries,
            &ScoringConfig::default(),
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_best_candidate_respects_floor() {
        let entries = catalog(&["Girls Generation"]);
        let config = ScoringConfig::default();
        assert_eq!(
            best_candidate("230101_Generation_of_Girls.mp4", &entries, &config).map(|c| c.score),
            Some(70)
        );
        let strict = ScoringConfig {
            confidence_floor: 75,
            ..ScoringConfig::default()
        };
        assert_eq!(best_candidate("230101_Generation_of_Girls.mp4", &entries, &strict), None);
    }

    #[test]
    fn test_resolve() {
        let config = ScoringConfig::default();
        let entries = catalog(&["IVE", "Red Velvet", "aespa"]);

        match resolve("231225_IVE.mp4", &entries, &config) {
            Resolution::Accepted(c) => assert_eq!(c.entry_id, 1),
            other => panic!("unexpected {:?}", other),
        }

        match resolve("231225_IVE_aespa.mp4", &entries, &config) {
            Resolution::Ambiguous(ranked) => assert_eq!(ranked.len(), 2),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(resolve("231225_nobody.mp4", &entries, &config), Resolution::NoMatch);
    }

    #[test]
    fn test_contains_isolated() {
        assert!(contains_isolated("(ive)", "ive"));
        assert!(!contains_isolated("ive2", "ive"));
        assert!(!contains_isolated("abc", ""));
        assert!(contains_isolated("은비 ive", "ive"));
        assert_eq!(find_isolated("anniversary by ive", "ive"), Some(15));
    }
}
