//! Folder scan: every file under the configured root is decoded, its points
//! extracted and stored. One file at a time; a failure on one file never
//! aborts the others.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::db::{self, Store};
use crate::decode;
use crate::parser;

/// Per-subfolder tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderOutcome {
    pub name: String,
    pub files: usize,
    pub points: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub folders: Vec<FolderOutcome>,
    /// Files that were decoded and stored (with or without points).
    pub files: usize,
    /// Files dropped because the store failed on them.
    pub skipped: usize,
    /// Files stored with zero points.
    pub empty: usize,
    /// Points extracted and handed to the store.
    pub points: usize,
}

enum FileOutcome {
    Stored { points: usize },
    Skipped,
}

/// Scan `root`: each subdirectory's direct files, then files lying in the
/// root itself. Entries are visited in name order.
pub fn scan_folder(store: &Store, root: &Path) -> ScanReport {
    let mut report = ScanReport::default();

    if !root.is_dir() {
        error!("Folder {:?} does not exist or is not a directory", root);
        return report;
    }

    let (dirs, root_files) = match list_entries(root) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to list {:?}: {}", root, e);
            return report;
        }
    };

    let mut batches: Vec<(String, Vec<PathBuf>)> = Vec::new();
    for dir in &dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match list_entries(dir) {
            Ok((_, files)) => batches.push((name, files)),
            Err(e) => warn!("Skipping folder {:?}: {}", dir, e),
        }
    }

    let total: usize = batches.iter().map(|(_, f)| f.len()).sum::<usize>() + root_files.len();
    info!(root = ?root, folders = batches.len(), files = total, "Scanning");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for (name, files) in batches {
        if files.is_empty() {
            pb.println(format!("📂 {}: empty", name));
        }
        let mut outcome = FolderOutcome {
            name,
            ..Default::default()
        };
        for path in &files {
            pb.set_message(outcome.name.clone());
            tally(&mut report, Some(&mut outcome), process_file(store, path));
            pb.inc(1);
        }
        pb.println(format!(
            "📁 {}: {} files, {} points{}",
            outcome.name,
            outcome.files,
            outcome.points,
            if outcome.skipped > 0 {
                format!(", {} skipped", outcome.skipped)
            } else {
                String::new()
            }
        ));
        report.folders.push(outcome);
    }

    for path in &root_files {
        tally(&mut report, None, process_file(store, path));
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        files = report.files,
        skipped = report.skipped,
        empty = report.empty,
        points = report.points,
        "Scan finished"
    );
    report
}

fn tally(report: &mut ScanReport, folder: Option<&mut FolderOutcome>, outcome: FileOutcome) {
    match outcome {
        FileOutcome::Stored { points } => {
            report.files += 1;
            report.points += points;
            if points == 0 {
                report.empty += 1;
            }
            if let Some(f) = folder {
                f.files += 1;
                f.points += points;
            }
        }
        FileOutcome::Skipped => {
            report.skipped += 1;
            if let Some(f) = folder {
                f.skipped += 1;
            }
        }
    }
}

fn process_file(store: &Store, path: &Path) -> FileOutcome {
    match store_file(store, path) {
        Ok(points) => FileOutcome::Stored { points },
        Err(e) => {
            warn!("Skipping {:?}: {}", path, e);
            FileOutcome::Skipped
        }
    }
}

fn store_file(store: &Store, path: &Path) -> db::Result<usize> {
    let decoded = decode::decode(path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_id = store.save_file(
        &name,
        &path.to_string_lossy(),
        &decode::file_type(path),
        &decoded.format_tag,
    )?;

    let points = parser::parse_points(&decoded.text);
    if points.is_empty() {
        debug!(path = ?path, "no points");
        return Ok(0);
    }
    store.save_points(file_id, &points)
}

/// Direct children of `dir`, split into (subdirectories, files), each sorted
/// by name.
fn list_entries(dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

/// Compare what the scan extracted with what the store now holds.
/// Returns the stored count when the two disagree.
pub fn reconcile(store: &Store, report: &ScanReport) -> db::Result<Option<usize>> {
    let stored = store.count_points()?;
    if stored == report.points {
        Ok(None)
    } else {
        warn!(extracted = report.points, stored, "Point count mismatch");
        Ok(Some(stored))
    }
}
