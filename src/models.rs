//! Core data models for entity matching and linking.
//!
//! This module contains the struct definitions, type aliases, and enums
//! shared by the matcher, the linker and the SQLite adapter.

use serde::Serialize;

// ============================================================================
// Type Aliases
// ============================================================================

/// Catalog entry id (artist or song rowid).
pub type EntryId = i64;

/// Primary artist id used to scope candidate pools.
pub type OwnerId = i64;

/// Performance or music video rowid.
pub type RecordId = i64;

// ============================================================================
// Catalog Models
// ============================================================================

/// An artist or song known to the catalog. Read-only to this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: EntryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Catalog entry with its normalized name precomputed, as held in an owner pool.
#[derive(Clone, Debug)]
pub struct PoolEntry {
    pub id: EntryId,
    pub name: String,
    pub name_norm: String,
}

// ============================================================================
// Matching Models
// ============================================================================

/// Strategy that produced a filename match, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Name appears verbatim (case-insensitive)
    ExactSubstring,
    /// Name appears once `_`, `-`, `.` are treated as spaces
    DelimiterNormalized,
    /// Name appears once all whitespace is removed
    NoSpace,
    /// Every meaningful word of a multi-word name appears
    MultiWord,
}

impl MatchStrategy {
    pub fn label(self) -> &'static str {
        match self {
            MatchStrategy::ExactSubstring => "exact",
            MatchStrategy::DelimiterNormalized => "delimiter",
            MatchStrategy::NoSpace => "no-space",
            MatchStrategy::MultiWord => "multi-word",
        }
    }
}

/// Scored catalog entry for one query. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate {
    pub entry_id: EntryId,
    pub score: i32,
    pub strategy: MatchStrategy,
}

// ============================================================================
// Record Models
// ============================================================================

/// Which kind of record a linking run works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Performance,
    MusicVideo,
}

impl RecordKind {
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Performance => "performance",
            RecordKind::MusicVideo => "music video",
        }
    }
}

/// A performance or music video awaiting song links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    /// Primary artist; `None` when the owner could not be resolved
    pub owner_id: Option<OwnerId>,
    /// Song ids already linked to this record
    pub links: Vec<EntryId>,
    /// RFC 3339 timestamp of the last song check
    pub checked_at: Option<String>,
}

/// Batch selection mode for a linking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Only records never checked before
    Unchecked,
    /// Every record, offering to replace existing links
    All,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run linking statistics.
#[derive(Default, Debug, Clone, Serialize)]
pub struct LinkStats {
    // Records
    pub records_seen: usize,
    pub records_linked: usize,
    pub records_without_links: usize,
    pub records_skipped_placeholder: usize,
    pub records_skipped_no_owner: usize,
    pub records_skipped_empty_pool: usize,
    pub records_kept_existing: usize,
    pub records_failed: usize,

    // Segments
    pub segments_seen: usize,
    pub segments_empty: usize,
    pub cache_hits: usize,
    pub perfect_matches: usize,
    pub prompts: usize,
    pub prompt_skips: usize,

    // Output
    pub links_committed: usize,
    pub owners_loaded: usize,
    pub aborted: bool,

    // Timing
    pub elapsed_seconds: f64,
}

impl LinkStats {
    /// Records that were resolved and marked checked in this run
    pub fn records_checked(&self) -> usize {
        self.records_linked
            + self.records_without_links
            + self.records_skipped_placeholder
            + self.records_skipped_no_owner
            + self.records_skipped_empty_pool
            + self.records_kept_existing
    }

    /// Share of prompted-or-cached segments served without asking the operator
    pub fn prompt_avoidance_rate(&self) -> f64 {
        let resolved = self.cache_hits + self.perfect_matches + self.prompts;
        if resolved == 0 {
            0.0
        } else {
            100.0 * (self.cache_hits + self.perfect_matches) as f64 / resolved as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
