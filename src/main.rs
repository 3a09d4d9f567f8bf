use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cratedigger::classify::{heuristic::FilenameClassifier, CancelToken};
use cratedigger::db::models::{Instrument, Mood, Sample};
use cratedigger::query::FilterQuery;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cratedigger", version, about = "Audio sample library organizer")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan directories for audio files and add them to the library
    Scan {
        /// Directories to scan (defaults to config file sample_dirs)
        paths: Vec<String>,
    },

    /// Classify samples (derive bpm, key, instrument, mood, quality)
    Classify {
        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Re-classify samples that already have results (or failed before)
        #[arg(long)]
        force: bool,

        /// Only classify samples whose path matches this pattern
        #[arg(long)]
        filter: Option<String>,
    },

    /// Recompute duplicate groups across the whole library
    Dedupe,

    /// Recompute similarity links across classified samples
    Similarity,

    /// Search the library by text and metadata filters
    Search {
        /// Free-text terms; every term must match
        terms: Vec<String>,

        /// Filter by instrument (kick, snare, bass, ...)
        #[arg(short, long)]
        instrument: Option<String>,

        /// Filter by mood (dark, bright, chill, ...)
        #[arg(short, long)]
        mood: Option<String>,

        #[arg(long)]
        min_bpm: Option<i32>,

        #[arg(long)]
        max_bpm: Option<i32>,

        /// Minimum energy (1-10)
        #[arg(long)]
        min_energy: Option<i32>,

        /// Maximum energy (1-10)
        #[arg(long)]
        max_energy: Option<i32>,

        /// Number of results
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Show library statistics
    Stats,

    /// Remove a sample from the library by id
    Remove {
        id: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = cratedigger::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(cratedigger::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = cratedigger::db::Database::open(&db_path)
        .context("Failed to open database")?;

    match cli.command {
        Commands::Scan { paths } => {
            // Resolve scan paths: CLI args > config sample_dirs
            let scan_paths = if !paths.is_empty() {
                paths
            } else if !config.sample_dirs.is_empty() {
                config.sample_dirs.iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            } else {
                anyhow::bail!(
                    "No directories to scan. Pass paths as arguments or set sample_dirs in config."
                );
            };

            let result = cratedigger::scanner::scan(&db, &scan_paths)
                .context("Scan failed")?;
            println!(
                "Scan complete: {} scanned, {} new, {} skipped, {} errors",
                result.scanned, result.new, result.skipped, result.errors
            );
        }

        Commands::Classify { jobs, force, filter } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
            );
            pb.set_message("Classifying...");

            let result = cratedigger::classify::classify_batch(
                &db,
                &FilenameClassifier,
                workers,
                force,
                filter.as_deref(),
                &CancelToken::new(),
                &|done, total| {
                    pb.set_length(total);
                    pb.set_position(done);
                },
            )
            .context("Classification failed")?;
            pb.finish_and_clear();

            println!(
                "Classification complete: {} classified, {} failed",
                result.classified,
                result.failed.len()
            );
            for (path, err) in &result.failed {
                println!("  failed: {} ({})", path, err);
            }

            // Fresh analysis changes both groupings, so refresh them now.
            let dupes = cratedigger::dedupe::recompute_duplicates(&db)
                .context("Duplicate detection failed")?;
            println!(
                "Duplicates: {} groups covering {} samples",
                dupes.groups, dupes.samples_linked
            );

            let sim = cratedigger::similarity::recompute_similarity(&db)
                .context("Similarity computation failed")?;
            println!(
                "Similarity: {} samples scored, {} pairs linked",
                sim.samples_scored, sim.pairs_linked
            );
        }

        Commands::Dedupe => {
            let result = cratedigger::dedupe::recompute_duplicates(&db)
                .context("Duplicate detection failed")?;
            println!(
                "Dedupe complete: {} groups covering {} samples",
                result.groups, result.samples_linked
            );
        }

        Commands::Similarity => {
            let result = cratedigger::similarity::recompute_similarity(&db)
                .context("Similarity computation failed")?;
            println!(
                "Similarity complete: {} samples scored, {} pairs linked",
                result.samples_scored, result.pairs_linked
            );
        }

        Commands::Search {
            terms, instrument, mood, min_bpm, max_bpm, min_energy, max_energy, limit,
        } => {
            let instrument = instrument
                .map(|s| {
                    Instrument::parse(&s)
                        .ok_or_else(|| anyhow::anyhow!("Unknown instrument: {s}"))
                })
                .transpose()?;
            let mood = mood
                .map(|s| Mood::parse(&s).ok_or_else(|| anyhow::anyhow!("Unknown mood: {s}")))
                .transpose()?;

            let query = FilterQuery {
                text: (!terms.is_empty()).then(|| terms.join(" ")),
                instrument,
                mood,
                bpm: range(min_bpm, max_bpm, 0, 999),
                energy: range(min_energy, max_energy, 1, 10),
            };

            let samples = db.get_all_samples().context("Query failed")?;
            let hits = query.apply(&samples);

            if hits.is_empty() {
                println!("No samples match.");
                return Ok(());
            }

            println!("{} of {} samples match:", hits.len(), samples.len());
            println!();
            print_sample_table(&hits[..hits.len().min(limit)]);
            if hits.len() > limit {
                println!();
                println!("({} more — raise -n to see them)", hits.len() - limit);
            }
        }

        Commands::Stats => {
            let samples = db.get_all_samples().context("Query failed")?;
            let stats = cratedigger::analytics::compute(&samples);

            println!("Library Statistics");
            println!("==================");
            println!("Total samples:    {}", stats.total_samples);
            println!("Analyzed:         {}", stats.analyzed_samples);
            println!("Duplicates:       {}", stats.duplicate_count);
            println!("Quality issues:   {}", stats.quality_issues);
            println!(
                "Total size:       {:.1} MB",
                stats.total_file_size as f64 / (1024.0 * 1024.0)
            );
            println!();

            println!("Instruments:");
            for (instrument, count) in &stats.instrument_counts {
                println!("  {:<12} {}", instrument.as_str(), count);
            }
            println!();

            println!("BPM distribution:");
            for (bucket, count) in &stats.bpm_distribution {
                println!("  {:<8} {}", bucket, count);
            }
        }

        Commands::Remove { id } => {
            let removed = db.remove_sample(id).context("Remove failed")?;
            if removed {
                println!("Removed sample {}", id);
            } else {
                println!("No sample with id {}", id);
            }
        }
    }

    Ok(())
}

fn range(
    min: Option<i32>,
    max: Option<i32>,
    default_min: i32,
    default_max: i32,
) -> Option<std::ops::RangeInclusive<i32>> {
    if min.is_none() && max.is_none() {
        return None;
    }
    Some(min.unwrap_or(default_min)..=max.unwrap_or(default_max))
}

/// Print a table of samples with their derived metadata.
fn print_sample_table(samples: &[&Sample]) {
    println!(
        "{:>5}  {:<40} {:<10} {:<10} {:>4} {:>9} {:>4}",
        "Id", "Name", "Instr", "Mood", "BPM", "Key", "Enrg"
    );
    println!("{}", "-".repeat(92));

    for s in samples {
        let name = s.display_name();
        let name_display: String = if name.len() > 40 {
            format!("{}...", &name[..37])
        } else {
            name.to_string()
        };

        match &s.analysis {
            Some(a) => println!(
                "{:>5}  {:<40} {:<10} {:<10} {:>4} {:>9} {:>4}",
                s.id,
                name_display,
                a.instrument.as_str(),
                a.mood.as_str(),
                a.bpm.map(|b| b.to_string()).unwrap_or_else(|| "-".into()),
                a.key.as_deref().unwrap_or("-"),
                a.energy,
            ),
            None => println!(
                "{:>5}  {:<40} {:<10} {:<10} {:>4} {:>9} {:>4}",
                s.id, name_display, "-", "-", "-", "-", "-"
            ),
        }
    }
}
