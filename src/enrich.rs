//! Fill in short summaries for every point that lacks one.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::db::{self, Store};
use crate::summarizer::{self, Summarizer};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Sequential pass over unsummarized points, pausing `delay` between
/// requests. A failed point is logged and left for the next pass.
pub async fn enrich<S: Summarizer>(
    store: &Store,
    summarizer: &S,
    delay: Duration,
) -> db::Result<EnrichStats> {
    let pending = store.fetch_unsummarized()?;
    let mut stats = EnrichStats {
        total: pending.len(),
        ..Default::default()
    };
    if pending.is_empty() {
        return Ok(stats);
    }
    info!(points = pending.len(), "Summarizing");

    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ok:{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for (i, point) in pending.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = summarizer
            .summarize(&point.content)
            .await
            .and_then(|raw| summarizer::accept(&raw));

        match result {
            Ok(summary) => match store.update_point_summary(point.id, &summary) {
                Ok(true) => stats.processed += 1,
                Ok(false) => {
                    warn!("Point #{} disappeared before its summary was saved", point.id);
                    stats.failed += 1;
                }
                Err(e) => {
                    warn!("Point #{} summary not saved: {}", point.id, e);
                    stats.failed += 1;
                }
            },
            Err(e) => {
                warn!("Point #{} ({}) not summarized: {}", point.id, point.tag, e);
                stats.failed += 1;
            }
        }
        pb.set_message(stats.processed.to_string());
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        processed = stats.processed,
        failed = stats.failed,
        total = stats.total,
        "Summaries done"
    );
    Ok(stats)
}
