//! Suggest artist and date for media files from their names.
//!
//! Usage: mvlink-autofill <file>... (--database <db> | --artists "IVE,Red Velvet")

use anyhow::{bail, Result};
use clap::Parser;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

use mvlink::date::extract_date;
use mvlink::models::{CatalogEntry, MatchCandidate, RecordKind};
use mvlink::scoring::{resolve, Resolution, ScoringConfig};
use mvlink::store::SqliteStore;

#[derive(Parser)]
#[command(name = "mvlink-autofill")]
#[command(about = "Match media filenames against the artist catalog")]
struct Args {
    /// Filenames or paths to match
    #[arg(required = true)]
    files: Vec<String>,

    /// SQLite database to read the artist catalog from
    #[arg(long)]
    database: Option<PathBuf>,

    /// Artist names instead of a database (comma-separated)
    #[arg(long)]
    artists: Option<String>,

    /// Minimum score to accept a match without asking
    #[arg(long, default_value = "60")]
    min_score: i32,

    /// Ranked candidates to show for ambiguous files
    #[arg(long, default_value = "5")]
    limit: usize,
}

fn load_catalog(args: &Args) -> Result<Vec<CatalogEntry>> {
    match (&args.database, &args.artists) {
        (Some(path), None) => SqliteStore::open(path, RecordKind::MusicVideo)?.artists(),
        (None, Some(list)) => Ok(list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .enumerate()
            .map(|(i, name)| CatalogEntry::new(i as i64 + 1, name))
            .collect()),
        _ => bail!("pass exactly one of --database or --artists"),
    }
}

fn describe(candidate: &MatchCandidate, names: &FxHashMap<i64, &str>) -> String {
    format!(
        "{} (id {}, score {}, {})",
        names.get(&candidate.entry_id).copied().unwrap_or("?"),
        candidate.entry_id,
        candidate.score,
        candidate.strategy.label()
    )
}

fn main() -> Result<()> {
    let args = Args::parse();
    let catalog = load_catalog(&args)?;
    eprintln!("Loaded {} artists", catalog.len());

    let names: FxHashMap<i64, &str> = catalog.iter().map(|e| (e.id, e.name.as_str())).collect();
    let config = ScoringConfig {
        confidence_floor: args.min_score,
        ..ScoringConfig::default()
    };

    for file in &args.files {
        println!("{}", file);
        match extract_date(file) {
            Some(date) => println!("  date:   {}", date),
            None => println!("  date:   -"),
        }

        match resolve(file, &catalog, &config) {
            Resolution::Accepted(best) => println!("  artist: {}", describe(&best, &names)),
            Resolution::Ambiguous(ranked) => {
                println!("  artist: needs a choice");
                for candidate in ranked.iter().take(args.limit) {
                    println!("    - {}", describe(candidate, &names));
                }
            }
            Resolution::NoMatch => println!("  artist: no match"),
        }
    }

    Ok(())
}
