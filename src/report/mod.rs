//! Report Builder: stored points → per-(folder, tag) buckets of rows.

pub mod dates;
pub mod render;

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ReportsConfig;
use crate::db::StoredPoint;

pub use dates::BroadcastStamp;
pub use render::{render_all, TemplateSink};

/// Body characters shown when a point has no summary yet.
pub const DISPLAY_CHARS: usize = 100;

/// One data row as handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// 1-based position in the bucket after sorting.
    pub ordinal: usize,
    pub date_display: String,
    pub tag: String,
    pub seconds: u32,
    pub display_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub count: usize,
    pub seconds: u64,
}

impl Totals {
    /// `M мин SS сек`.
    pub fn duration_display(&self) -> String {
        format!("{} мин {:02} сек", self.seconds / 60, self.seconds % 60)
    }
}

#[derive(Debug, Clone)]
pub struct BucketReport {
    pub folder: String,
    /// Lowercased tag; also the bucket's output name.
    pub tag: String,
    pub rows: Vec<ReportRow>,
    pub totals: Totals,
}

/// Second-to-last segment of a stored path (`ИЮЛЬ/КП/a.doc` → `КП`).
/// Paths with fewer than two segments have no folder.
pub fn folder_name(file_path: &str) -> Option<String> {
    let parts: Vec<_> = Path::new(file_path).iter().collect();
    if parts.len() < 2 {
        return None;
    }
    Some(parts[parts.len() - 2].to_string_lossy().into_owned())
}

/// Summary when present, else the body cut to [`DISPLAY_CHARS`] with `...`.
pub fn display_text(point: &StoredPoint) -> String {
    if let Some(summary) = point.short_content.as_deref().filter(|_| point.has_summary()) {
        return summary.trim().to_string();
    }
    if point.content.chars().count() > DISPLAY_CHARS {
        let cut: String = point.content.chars().take(DISPLAY_CHARS).collect();
        format!("{}...", cut)
    } else {
        point.content.clone()
    }
}

/// The distinguished tag loses its short points; every other tag keeps all.
pub fn excluded(point: &StoredPoint, cfg: &ReportsConfig) -> bool {
    point.tag.to_lowercase() == cfg.distinguished_tag.to_lowercase()
        && point.seconds < cfg.min_duration_seconds
}

/// Group `points` into buckets ordered by (folder, tag). A bucket exists for
/// every (folder, tag) that has stored points, even if the duration filter
/// leaves it without rows.
pub fn build_buckets(points: &[StoredPoint], cfg: &ReportsConfig) -> Vec<BucketReport> {
    let mut groups: BTreeMap<(String, String), Vec<&StoredPoint>> = BTreeMap::new();
    for point in points {
        let Some(folder) = folder_name(&point.file_path) else {
            continue;
        };
        let rows = groups
            .entry((folder, point.tag.to_lowercase()))
            .or_default();
        if !excluded(point, cfg) {
            rows.push(point);
        }
    }

    groups
        .into_iter()
        .map(|((folder, tag), members)| {
            let mut dated: Vec<(BroadcastStamp, &StoredPoint)> = members
                .into_iter()
                .map(|p| (BroadcastStamp::from_file_name(&p.file_name, cfg.year), p))
                .collect();
            dated.sort_by(|a, b| a.0.sort_key.cmp(&b.0.sort_key));

            let rows: Vec<ReportRow> = dated
                .into_iter()
                .enumerate()
                .map(|(i, (stamp, p))| ReportRow {
                    ordinal: i + 1,
                    date_display: stamp.display,
                    tag: p.tag.clone(),
                    seconds: p.seconds,
                    display_text: display_text(p),
                })
                .collect();
            let totals = Totals {
                count: rows.len(),
                seconds: rows.iter().map(|r| r.seconds as u64).sum(),
            };
            BucketReport {
                folder,
                tag,
                rows,
                totals,
            }
        })
        .collect()
}

/// Point counts for the console summary.
#[derive(Debug, Default)]
pub struct FolderSummary {
    /// folder → tag → stored points.
    pub tags: BTreeMap<String, BTreeMap<String, usize>>,
    /// folder → tag → points the duration filter removes from reports.
    pub short: BTreeMap<String, BTreeMap<String, usize>>,
}

pub fn summarize_folders(points: &[StoredPoint], cfg: &ReportsConfig) -> FolderSummary {
    let mut summary = FolderSummary::default();
    for point in points {
        let Some(folder) = folder_name(&point.file_path) else {
            continue;
        };
        *summary
            .tags
            .entry(folder.clone())
            .or_default()
            .entry(point.tag.to_lowercase())
            .or_default() += 1;
        if excluded(point, cfg) {
            *summary
                .short
                .entry(folder)
                .or_default()
                .entry(point.tag.to_lowercase())
                .or_default() += 1;
        }
    }
    summary
}
