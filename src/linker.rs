//! Interactive batch linking of songs to performances and music videos.
//!
//! A [`LinkSession`] walks batches of records, splits each title into mention
//! segments, and resolves every segment against the songs of the record's
//! primary artist:
//!
//! 1. a cached decision for `(normalized mention, owner)` is reused silently
//! 2. otherwise songs whose normalized title equals the mention are linked
//!    automatically
//! 3. otherwise the operator picks from the owner's songs, grouped by title
//!
//! Links for a record are committed in one step and the record is marked
//! checked only after that commit succeeded. A failure stays local to its
//! record; an operator abort stops the run with the current record untouched.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use std::time::Instant;

use crate::models::{
    CatalogEntry, EntryId, LinkMode, LinkStats, OwnerId, PoolEntry, Record, RecordId,
};
use crate::normalize::{split_mentions, Normalizer};
use crate::progress::{create_progress_bar, log_line, log_progress, suspended};
use crate::scoring::{score_name, ScoringConfig};

/// Titles that stand for "several songs" and cannot be resolved by matching.
pub const DEFAULT_PLACEHOLDER_TITLES: &[&str] = &["multiple songs", "various songs", "medley"];

const DEFAULT_BATCH_SIZE: usize = 200;

// ============================================================================
// Collaborators
// ============================================================================

/// Source of the songs owned by an artist.
pub trait CatalogProvider {
    /// Ordered, de-duplicated entries for one owner. Must be stable within a run.
    fn entries_for_owner(&self, owner: OwnerId) -> Result<Vec<CatalogEntry>>;
}

/// Persistence for records and their links.
///
/// Both record queries return records with `id > after`, ordered by id,
/// at most `limit` of them.
pub trait LinkStore {
    fn unchecked_records(&self, after: Option<RecordId>, limit: usize) -> Result<Vec<Record>>;
    fn all_records(&self, after: Option<RecordId>, limit: usize) -> Result<Vec<Record>>;

    /// Must ignore duplicates.
    fn insert_link(&self, record: RecordId, entry: EntryId) -> Result<()>;
    fn delete_links(&self, record: RecordId) -> Result<()>;
    fn mark_checked(&self, record: RecordId, at: DateTime<Utc>) -> Result<()>;

    /// Write the resolved links of one record, replacing old ones if asked.
    /// Stores with transactions should override this to make it atomic.
    fn commit_links(&self, record: RecordId, entries: &[EntryId], replace: bool) -> Result<()> {
        if replace {
            self.delete_links(record)?;
        }
        for &entry in entries {
            self.insert_link(record, entry)?;
        }
        Ok(())
    }
}

// ============================================================================
// Operator Decisions
// ============================================================================

/// One row offered to the operator: a song title and every id carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOption {
    pub label: String,
    pub entry_ids: Vec<EntryId>,
    /// Filename-matcher score of the title against the mention, if any
    pub score: Option<i32>,
    pub similarity: f64,
}

/// Everything a decision provider needs to ask about one mention.
#[derive(Debug)]
pub struct Prompt<'a> {
    pub record: &'a Record,
    pub mention: &'a str,
    pub mention_norm: &'a str,
    pub options: &'a [PromptOption],
}

/// Answer to a song prompt. Indices are 0-based into `Prompt::options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Indices(Vec<usize>),
    All,
    Skip,
    Abort,
}

/// Answer to "replace existing links?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Yes,
    No,
    Abort,
}

/// Operator I/O. Console in the binary, scripted in tests.
pub trait DecisionProvider {
    fn choose(&mut self, prompt: &Prompt<'_>) -> Result<Selection>;
    fn confirm_replace(&mut self, record: &Record) -> Result<Confirm>;
}

// ============================================================================
// Decision Cache
// ============================================================================

/// Operator and auto-link decisions keyed by `(normalized mention, owner)`.
/// An empty id list records an explicit skip.
#[derive(Debug, Default, Clone)]
pub struct DecisionCache {
    decisions: FxHashMap<(String, OwnerId), Vec<EntryId>>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mention_norm: &str, owner: OwnerId) -> Option<&[EntryId]> {
        self.decisions
            .get(&(mention_norm.to_string(), owner))
            .map(Vec::as_slice)
    }

    pub fn insert(&mut self, mention_norm: String, owner: OwnerId, entries: Vec<EntryId>) {
        self.decisions.insert((mention_norm, owner), entries);
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Placeholder titles that mark a record checked without matching
    pub skip_titles: Vec<String>,
    pub batch_size: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            skip_titles: DEFAULT_PLACEHOLDER_TITLES.iter().map(|s| s.to_string()).collect(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// How one record ended.
#[derive(Debug)]
enum RecordOutcome {
    Linked(usize),
    NoLinks,
    SkippedPlaceholder,
    SkippedNoOwner,
    SkippedEmptyPool,
    KeptExisting,
    Failed(anyhow::Error),
    Aborted,
}

type Pools = FxHashMap<OwnerId, Rc<[PoolEntry]>>;

/// Linking session: configuration plus the decision cache shared by all runs.
pub struct LinkSession {
    normalizer: Normalizer,
    scoring: ScoringConfig,
    batch_size: usize,
    placeholders: Vec<String>,
    cache: DecisionCache,
}

impl LinkSession {
    pub fn new(normalizer: Normalizer, scoring: ScoringConfig, options: LinkOptions) -> Result<Self> {
        if options.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        let placeholders = options
            .skip_titles
            .iter()
            .map(|t| normalizer.normalize(t))
            .filter(|t| !t.is_empty())
            .collect();
        Ok(Self {
            normalizer,
            scoring,
            batch_size: options.batch_size,
            placeholders,
            cache: DecisionCache::new(),
        })
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Run one linking pass.
    ///
    /// Batches are fetched with a cursor on record id, so a record whose
    /// commit failed is not fetched again until the next run. Errors from
    /// fetching a batch or from the decision provider end the run; errors
    /// inside a record are counted in `records_failed`.
    pub fn run<S, C, D>(
        &mut self,
        mode: LinkMode,
        store: &S,
        catalog: &C,
        decider: &mut D,
    ) -> Result<LinkStats>
    where
        S: LinkStore + ?Sized,
        C: CatalogProvider + ?Sized,
        D: DecisionProvider + ?Sized,
    {
        let start = Instant::now();
        let mut stats = LinkStats::default();
        let mut pools = Pools::default();
        let mut cursor: Option<RecordId> = None;

        'batches: loop {
            let batch = match mode {
                LinkMode::Unchecked => store.unchecked_records(cursor, self.batch_size),
                LinkMode::All => store.all_records(cursor, self.batch_size),
            }
            .context("Failed to fetch record batch")?;

            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some(last.id);

            let total = batch.len() as u64;
            let pb = create_progress_bar(total, "Linking records");

            for (i, record) in batch.iter().enumerate() {
                stats.records_seen += 1;
                let outcome = self.process_record(
                    mode,
                    record,
                    store,
                    catalog,
                    decider,
                    &mut pools,
                    &mut stats,
                    &pb,
                )?;

                match outcome {
                    RecordOutcome::Linked(n) => {
                        stats.records_linked += 1;
                        stats.links_committed += n;
                    }
                    RecordOutcome::NoLinks => stats.records_without_links += 1,
                    RecordOutcome::SkippedPlaceholder => stats.records_skipped_placeholder += 1,
                    RecordOutcome::SkippedNoOwner => stats.records_skipped_no_owner += 1,
                    RecordOutcome::SkippedEmptyPool => stats.records_skipped_empty_pool += 1,
                    RecordOutcome::KeptExisting => stats.records_kept_existing += 1,
                    RecordOutcome::Failed(err) => {
                        stats.records_failed += 1;
                        log_line(
                            &pb,
                            "LINK",
                            &format!("record {} '{}' left unchecked: {:#}", record.id, record.title, err),
                        );
                    }
                    RecordOutcome::Aborted => {
                        stats.aborted = true;
                        log_line(
                            &pb,
                            "LINK",
                            &format!("aborted at record {} '{}'", record.id, record.title),
                        );
                        pb.abandon();
                        break 'batches;
                    }
                }

                pb.inc(1);
                log_progress("link", i as u64 + 1, total, 50);
            }

            pb.finish_and_clear();
        }

        stats.owners_loaded = pools.len();
        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_record<S, C, D>(
        &mut self,
        mode: LinkMode,
        record: &Record,
        store: &S,
        catalog: &C,
        decider: &mut D,
        pools: &mut Pools,
        stats: &mut LinkStats,
        pb: &ProgressBar,
    ) -> Result<RecordOutcome>
    where
        S: LinkStore + ?Sized,
        C: CatalogProvider + ?Sized,
        D: DecisionProvider + ?Sized,
    {
        let title_norm = self.normalizer.normalize(&record.title);
        if self.placeholders.contains(&title_norm) {
            return Ok(mark(store, record, RecordOutcome::SkippedPlaceholder));
        }

        let Some(owner) = record.owner_id else {
            return Ok(mark(store, record, RecordOutcome::SkippedNoOwner));
        };

        let pool = match self.pool_for(owner, catalog, pools) {
            Ok(pool) => pool,
            Err(err) => return Ok(RecordOutcome::Failed(err)),
        };
        if pool.is_empty() {
            log_line(
                pb,
                "LINK",
                &format!("no songs for owner {} of '{}', marking checked", owner, record.title),
            );
            return Ok(mark(store, record, RecordOutcome::SkippedEmptyPool));
        }

        let mut replace = false;
        if mode == LinkMode::All && !record.links.is_empty() {
            match suspended(pb, || decider.confirm_replace(record))? {
                Confirm::Yes => replace = true,
                Confirm::No => return Ok(mark(store, record, RecordOutcome::KeptExisting)),
                Confirm::Abort => return Ok(RecordOutcome::Aborted),
            }
        }

        let mut linked: Vec<EntryId> = Vec::new();
        for segment in split_mentions(&record.title) {
            stats.segments_seen += 1;
            let mention_norm = self.normalizer.normalize(segment);
            if mention_norm.is_empty() {
                stats.segments_empty += 1;
                continue;
            }

            let cached = self.cache.get(&mention_norm, owner).map(<[EntryId]>::to_vec);
            let entries = match cached {
                Some(entries) => {
                    stats.cache_hits += 1;
                    entries
                }
                None => {
                    let perfect: Vec<EntryId> = pool
                        .iter()
                        .filter(|e| e.name_norm == mention_norm)
                        .map(|e| e.id)
                        .collect();

                    let entries = if !perfect.is_empty() {
                        stats.perfect_matches += 1;
                        perfect
                    } else {
                        let options = group_options(&pool, &mention_norm, &self.scoring);
                        let prompt = Prompt {
                            record,
                            mention: segment,
                            mention_norm: &mention_norm,
                            options: &options,
                        };
                        stats.prompts += 1;
                        match suspended(pb, || decider.choose(&prompt))? {
                            Selection::Abort => return Ok(RecordOutcome::Aborted),
                            Selection::Skip => {
                                stats.prompt_skips += 1;
                                Vec::new()
                            }
                            Selection::All => collect_ids(options.iter()),
                            Selection::Indices(indices) => {
                                let (valid, invalid): (Vec<usize>, Vec<usize>) =
                                    indices.into_iter().partition(|&i| i < options.len());
                                if !invalid.is_empty() {
                                    log_line(
                                        pb,
                                        "LINK",
                                        &format!("ignoring out-of-range choices {:?}", invalid),
                                    );
                                }
                                collect_ids(valid.iter().map(|&i| &options[i]))
                            }
                        }
                    };

                    self.cache.insert(mention_norm, owner, entries.clone());
                    entries
                }
            };

            for id in entries {
                if !linked.contains(&id) {
                    linked.push(id);
                }
            }
        }

        if let Err(err) = store.commit_links(record.id, &linked, replace) {
            return Ok(RecordOutcome::Failed(err.context("commit failed")));
        }

        let outcome = if linked.is_empty() {
            RecordOutcome::NoLinks
        } else {
            RecordOutcome::Linked(linked.len())
        };
        Ok(mark(store, record, outcome))
    }

    /// Owner pool, fetched and normalized once per run. Fetch errors are not cached.
    fn pool_for<C>(&self, owner: OwnerId, catalog: &C, pools: &mut Pools) -> Result<Rc<[PoolEntry]>>
    where
        C: CatalogProvider + ?Sized,
    {
        if let Some(pool) = pools.get(&owner) {
            return Ok(Rc::clone(pool));
        }

        let entries = catalog
            .entries_for_owner(owner)
            .with_context(|| format!("Failed to load songs for owner {}", owner))?;
        let pool: Rc<[PoolEntry]> = entries
            .into_iter()
            .map(|entry| PoolEntry {
                name_norm: self.normalizer.normalize(&entry.name),
                id: entry.id,
                name: entry.name,
            })
            .collect();
        pools.insert(owner, Rc::clone(&pool));
        Ok(pool)
    }
}

/// Mark a record checked; a failing mark turns the outcome into a failure.
fn mark<S>(store: &S, record: &Record, outcome: RecordOutcome) -> RecordOutcome
where
    S: LinkStore + ?Sized,
{
    match store.mark_checked(record.id, Utc::now()) {
        Ok(()) => outcome,
        Err(err) => RecordOutcome::Failed(err.context("mark checked failed")),
    }
}

fn collect_ids<'a>(options: impl Iterator<Item = &'a PromptOption>) -> Vec<EntryId> {
    let mut ids = Vec::new();
    for option in options {
        for &id in &option.entry_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Group a pool by display title and order the groups for the operator.
///
/// Order: filename-matcher score of the title within the mention, then edit
/// similarity of the normalized forms, then first appearance in the pool.
pub fn group_options(pool: &[PoolEntry], mention_norm: &str, scoring: &ScoringConfig) -> Vec<PromptOption> {
    let mut options: Vec<PromptOption> = Vec::new();
    let mut by_title: FxHashMap<&str, usize> = FxHashMap::default();

    for entry in pool {
        match by_title.get(entry.name.as_str()) {
            Some(&i) => options[i].entry_ids.push(entry.id),
            None => {
                by_title.insert(entry.name.as_str(), options.len());
                options.push(PromptOption {
                    label: entry.name.clone(),
                    entry_ids: vec![entry.id],
                    score: score_name(mention_norm, &entry.name_norm, scoring).map(|(s, _)| s),
                    similarity: strsim::normalized_levenshtein(mention_norm, &entry.name_norm),
                });
            }
        }
    }

    options.sort_by(|a, b| {
        b.score
            .unwrap_or(0)
            .cmp(&a.score.unwrap_or(0))
            .then_with(|| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal))
    });
    options
}

// ============================================================================
// TESTS
// ============================================================================
