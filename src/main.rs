use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;

use mvlink::linker::{LinkOptions, LinkSession, DEFAULT_PLACEHOLDER_TITLES};
use mvlink::models::{LinkMode, RecordKind};
use mvlink::normalize::{FluffList, Normalizer};
use mvlink::progress::{format_duration, set_log_only};
use mvlink::prompt::ConsoleDecisionProvider;
use mvlink::scoring::ScoringConfig;
use mvlink::store::SqliteStore;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Performances,
    MusicVideos,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Performances => RecordKind::Performance,
            KindArg::MusicVideos => RecordKind::MusicVideo,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    /// Only records whose songs were never checked
    Unchecked,
    /// Every record, asking before replacing existing links
    All,
}

impl From<ModeArg> for LinkMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Unchecked => LinkMode::Unchecked,
            ModeArg::All => LinkMode::All,
        }
    }
}

#[derive(Parser)]
#[command(name = "mvlink")]
#[command(about = "Interactively link songs to performances or music videos")]
struct Args {
    /// SQLite database with artists, songs and records
    database: PathBuf,

    #[arg(long, value_enum, default_value = "performances")]
    kind: KindArg,

    #[arg(long, value_enum, default_value = "unchecked")]
    mode: ModeArg,

    /// Fluff word list (one phrase per line); built-in list when omitted
    #[arg(long)]
    fluff_file: Option<PathBuf>,

    /// Placeholder title meaning "several songs" (repeatable); replaces the defaults
    #[arg(long = "skip-title")]
    skip_titles: Vec<String>,

    #[arg(long, default_value = "200")]
    batch_size: usize,

    /// Create missing tables before linking
    #[arg(long)]
    init_schema: bool,

    /// Hide progress bars, print plain progress lines
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    let start = Instant::now();
    let kind = RecordKind::from(args.kind);

    println!("Opening database: {:?}", args.database);
    let store = SqliteStore::open(&args.database, kind)?;
    if args.init_schema {
        store.init_schema()?;
    }

    let fluff = match &args.fluff_file {
        Some(path) => FluffList::from_file(path)?,
        None => FluffList::default(),
    };
    println!("Loaded {} fluff phrases", fluff.len());

    let skip_titles = if args.skip_titles.is_empty() {
        DEFAULT_PLACEHOLDER_TITLES.iter().map(|s| s.to_string()).collect()
    } else {
        args.skip_titles
    };
    let options = LinkOptions {
        skip_titles,
        batch_size: args.batch_size,
    };

    let mut session = LinkSession::new(Normalizer::new(fluff), ScoringConfig::default(), options)?;
    let mut console = ConsoleDecisionProvider::stdio();

    println!("Linking songs to {} records ({:?} mode)", kind.label(), args.mode);
    let stats = session
        .run(LinkMode::from(args.mode), &store, &store, &mut console)
        .context("Linking run failed")?;

    stats.log_phase("link");
    if let Some(path) = &args.stats_json {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }

    println!("\n{:=<60}", "");
    println!("{}", if stats.aborted { "Linking aborted" } else { "Linking complete!" });
    println!("  Records seen: {}", stats.records_seen);
    println!("  Records checked: {}", stats.records_checked());
    println!("  Records failed: {}", stats.records_failed);
    println!("  Links committed: {}", stats.links_committed);
    println!(
        "  Prompts: {} ({:.1}% of mentions resolved without asking)",
        stats.prompts,
        stats.prompt_avoidance_rate()
    );
    println!("  Cached decisions: {}", session.cache().len());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
