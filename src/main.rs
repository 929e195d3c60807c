mod config;
mod db;
mod decode;
mod enrich;
mod error;
mod parser;
mod report;
mod scan;
mod summarizer;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::db::{OpenMode, Store};
use crate::report::TemplateSink;
use crate::summarizer::HttpSummarizer;

#[derive(Parser)]
#[command(
    name = "broadcast_points",
    about = "Extract timed broadcast points from documents and build per-tag reports"
)]
struct Cli {
    /// Path to the YAML config
    #[arg(short, long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recreate the database and scan the configured folder
    Scan {
        /// Keep the existing database instead of starting from scratch
        #[arg(long)]
        keep: bool,
    },
    /// Summarize points that have no short text yet
    Enrich,
    /// Render one report per folder and tag
    Report,
    /// Scan + summary + enrich + report in one go
    Run,
    /// Point counts per folder and tag
    Summary,
    /// List stored points
    Points {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Points whose tag contains TAG (case-insensitive)
    Search { tag: String },
    /// Database statistics
    Info,
    /// Delete the database file
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = config::load(&cli.config);

    let result = match cli.command {
        Commands::Scan { keep } => {
            let mode = if keep { OpenMode::Open } else { OpenMode::Reset };
            let store = Store::open(&cfg.database_path, mode)?;
            run_scan(&store, &cfg)?;
            Ok(())
        }
        Commands::Enrich => {
            let store = Store::open(&cfg.database_path, OpenMode::Open)?;
            let summarizer = HttpSummarizer::from_config(&cfg.gpt)?;
            run_enrich(&store, &summarizer, &cfg).await?;
            Ok(())
        }
        Commands::Report => {
            let store = Store::open(&cfg.database_path, OpenMode::Open)?;
            run_report(&store, &cfg)?;
            Ok(())
        }
        Commands::Run => {
            let store = Store::open(&cfg.database_path, OpenMode::Reset)?;
            let scanned = run_scan(&store, &cfg)?;
            if scanned == 0 {
                println!("Nothing extracted, no reports to build.");
                return Ok(());
            }

            print_summary(&store, &cfg)?;
            println!("{}", "=".repeat(40));
            let pending = store.stats()?.unsummarized;
            if pending == 0 {
                println!("All points already have a short text.");
            } else {
                match HttpSummarizer::from_config(&cfg.gpt) {
                    Ok(summarizer) => run_enrich(&store, &summarizer, &cfg).await?,
                    Err(e) => warn!("Skipping summaries for {} points: {}", pending, e),
                }
            }
            println!("{}", "=".repeat(40));
            run_report(&store, &cfg)?;
            Ok(())
        }
        Commands::Summary => {
            let store = Store::open(&cfg.database_path, OpenMode::Open)?;
            print_summary(&store, &cfg)
        }
        Commands::Points { limit } => {
            let store = Store::open(&cfg.database_path, OpenMode::Open)?;
            let points = store.get_all_points()?;
            print_points(&points, limit);
            Ok(())
        }
        Commands::Search { tag } => {
            let store = Store::open(&cfg.database_path, OpenMode::Open)?;
            let points = store.search_by_tag(&tag)?;
            if points.is_empty() {
                println!("No points with tag matching {:?}.", tag);
                return Ok(());
            }
            print_points(&points, points.len());
            Ok(())
        }
        Commands::Info => {
            let store = Store::open(&cfg.database_path, OpenMode::Open)?;
            let s = store.stats()?;
            println!("Database:     {}", cfg.database_path.display());
            println!("Files:        {}", s.files);
            println!("Points:       {}", s.points);
            println!("Unsummarized: {}", s.unsummarized);
            if let Some(bytes) = s.size_bytes {
                println!("Size:         {:.1} KB", bytes as f64 / 1024.0);
            }
            Ok(())
        }
        Commands::Reset => {
            if db::remove_database(&cfg.database_path)? {
                println!("Removed {}", cfg.database_path.display());
            } else {
                println!("No database at {}", cfg.database_path.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Returns the number of points extracted.
fn run_scan(store: &Store, cfg: &AppConfig) -> anyhow::Result<usize> {
    println!("Scanning {}...", cfg.folder_path.display());
    let report = scan::scan_folder(store, &cfg.folder_path);
    println!(
        "Scanned {} files ({} without points, {} skipped), {} points.",
        report.files, report.empty, report.skipped, report.points
    );
    if let Some(stored) = scan::reconcile(store, &report)? {
        println!(
            "Mismatch: {} points extracted, {} stored.",
            report.points, stored
        );
    }
    Ok(report.points)
}

async fn run_enrich(
    store: &Store,
    summarizer: &HttpSummarizer,
    cfg: &AppConfig,
) -> anyhow::Result<()> {
    let stats = enrich::enrich(store, summarizer, cfg.gpt.request_delay()).await?;
    if stats.total == 0 {
        println!("All points already have a short text.");
    } else {
        println!(
            "Summarized {}/{} points ({} failed, retried on the next run).",
            stats.processed, stats.total, stats.failed
        );
    }
    Ok(())
}

fn run_report(store: &Store, cfg: &AppConfig) -> anyhow::Result<()> {
    let points = store.get_all_points()?;
    if points.is_empty() {
        println!("No points in the database, nothing to report.");
        return Ok(());
    }
    let buckets = report::build_buckets(&points, &cfg.reports);
    let sink = TemplateSink::new(&cfg.reports);
    let (written, skipped) = report::render_all(&sink, &buckets);
    for path in &written {
        println!("  {}", path.display());
    }
    println!(
        "Wrote {} reports to {} ({} skipped).",
        written.len(),
        cfg.reports.path.display(),
        skipped
    );
    Ok(())
}

fn print_summary(store: &Store, cfg: &AppConfig) -> anyhow::Result<()> {
    let s = store.stats()?;
    let summary = report::summarize_folders(&store.get_all_points()?, &cfg.reports);

    println!("Files:  {}", s.files);
    println!("Points: {}", s.points);
    for (folder, tags) in &summary.tags {
        println!("  {}:", folder);
        for (tag, count) in tags {
            println!("    {:<20} {:>4}", tag, count);
        }
    }

    if !summary.short.is_empty() {
        println!(
            "\n'{}' points under {}s (left out of reports):",
            cfg.reports.distinguished_tag, cfg.reports.min_duration_seconds
        );
        for (folder, tags) in &summary.short {
            for (tag, count) in tags {
                println!("  {}/{}: {}", folder, tag, count);
            }
        }
    }
    Ok(())
}

fn print_points(points: &[db::StoredPoint], limit: usize) {
    println!(
        "{:>5} | {:<24} | {:>3} | {:<12} | {:>4} | {}",
        "id", "File", "#", "Tag", "Sec", "Text"
    );
    println!("{}", "-".repeat(100));
    for p in points.iter().take(limit) {
        let text = report::display_text(p).replace('\n', " ");
        println!(
            "{:>5} | {:<24} | {:>3} | {:<12} | {:>4} | {}",
            p.id,
            truncate(&p.file_name, 24),
            p.ordinal,
            truncate(&p.tag, 12),
            p.seconds,
            truncate(&text, report::DISPLAY_CHARS)
        );
    }
    println!("\n{} of {} points", points.len().min(limit), points.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
