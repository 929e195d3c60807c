//! Render sink: binds a bucket's rows into a plain-text template.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{BucketReport, ReportRow, Totals};
use crate::config::{FolderDoc, ReportsConfig};
use crate::error::ReportError;

/// Data rows start on this line of the template (1-based).
pub const FIRST_ROW_LINE: usize = 15;
/// Header placeholders are only substituted in the first lines.
const HEADER_LINES: usize = 20;

pub trait RenderSink {
    /// Write one bucket; returns the path of the produced document.
    fn render(&self, bucket: &BucketReport) -> Result<PathBuf, ReportError>;
}

pub struct TemplateSink {
    cfg: ReportsConfig,
    /// Run timestamp appended to each folder directory, `%Y%m%d_%H%M%S`.
    stamp: String,
}

impl TemplateSink {
    pub fn new(cfg: &ReportsConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            stamp: chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    fn bucket_path(&self, bucket: &BucketReport) -> PathBuf {
        self.cfg
            .path
            .join(format!("{}_{}", bucket.folder, self.stamp))
            .join(format!("{}.txt", file_stem(&bucket.tag)))
    }

    fn fill_header(&self, line: &str, doc: &FolderDoc, logo: &str) -> String {
        line.replace("YXXX", &self.cfg.year.to_string())
            .replace("MXXX", &doc.month)
            .replace("GXXX", &doc.full_name)
            .replace("CFXXX", &doc.company_full)
            .replace("CXXX", &doc.company_short)
            .replace("LXXX", logo)
    }
}

impl RenderSink for TemplateSink {
    fn render(&self, bucket: &BucketReport) -> Result<PathBuf, ReportError> {
        let template_path = &self.cfg.template_path;
        let template = fs::read_to_string(template_path)
            .map_err(|_| ReportError::TemplateMissing(template_path.display().to_string()))?;

        let doc = self.cfg.doc_for(&bucket.folder);
        let logo = logo_text(&doc.logo_path);

        let mut lines: Vec<String> = template
            .lines()
            .enumerate()
            .map(|(i, l)| {
                if i < HEADER_LINES {
                    self.fill_header(l, &doc, &logo)
                } else {
                    l.to_string()
                }
            })
            .collect();

        let body = body_lines(&bucket.rows, &bucket.totals);
        let first = FIRST_ROW_LINE - 1;
        if lines.len() < first {
            lines.resize(first, String::new());
        }
        for (k, text) in body.into_iter().enumerate() {
            match lines.get_mut(first + k) {
                Some(slot) => *slot = text,
                None => lines.push(text),
            }
        }

        let path = self.bucket_path(bucket);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut out = lines.join("\n");
        out.push('\n');
        fs::write(&path, out)?;
        Ok(path)
    }
}

fn logo_text(logo_path: &str) -> String {
    if logo_path.is_empty() {
        return String::new();
    }
    if Path::new(logo_path).exists() {
        logo_path.to_string()
    } else {
        warn!("Logo {:?} not found", logo_path);
        String::new()
    }
}

/// Data rows then the totals row; nothing at all for an empty bucket.
fn body_lines(rows: &[ReportRow], totals: &Totals) -> Vec<String> {
    if rows.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{} | {} | {} | {}",
                r.ordinal,
                r.date_display,
                r.display_text.replace('\n', " "),
                r.seconds
            )
        })
        .collect();
    lines.push(format!(
        "Итого: | {} информационных материала | {}",
        totals.count,
        totals.duration_display()
    ));
    lines
}

fn file_stem(tag: &str) -> String {
    tag.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

/// Render every bucket; a failing bucket is logged and skipped.
pub fn render_all<R: RenderSink>(sink: &R, buckets: &[BucketReport]) -> (Vec<PathBuf>, usize) {
    let mut written = Vec::new();
    let mut skipped = 0;
    for bucket in buckets {
        match sink.render(bucket) {
            Ok(path) => {
                info!(folder = %bucket.folder, tag = %bucket.tag, rows = bucket.rows.len(), "Report written");
                written.push(path);
            }
            Err(e) => {
                warn!("Report {}/{} skipped: {}", bucket.folder, bucket.tag, e);
                skipped += 1;
            }
        }
    }
    (written, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn bucket(rows: Vec<ReportRow>) -> BucketReport {
        let totals = Totals {
            count: rows.len(),
            seconds: rows.iter().map(|r| r.seconds as u64).sum(),
        };
        BucketReport {
            folder: "КП".into(),
            tag: "губер".into(),
            rows,
            totals,
        }
    }

    fn row(ordinal: usize, seconds: u32, text: &str) -> ReportRow {
        ReportRow {
            ordinal,
            date_display: "15.08.2025 09:30".into(),
            tag: "губер".into(),
            seconds,
            display_text: text.into(),
        }
    }

    fn setup(template: Option<&str>) -> (TempDir, TemplateSink) {
        let dir = TempDir::new().unwrap();
        let template_path = dir.path().join("template.txt");
        if let Some(t) = template {
            fs::write(&template_path, t).unwrap();
        }
        let mut docs = HashMap::new();
        docs.insert(
            "КП".to_string(),
            FolderDoc {
                month: "август".into(),
                full_name: "Иванов И.И.".into(),
                company_short: "ООО КП".into(),
                company_full: "Общество Комсомольская правда".into(),
                logo_path: dir.path().join("нет.png").display().to_string(),
            },
        );
        let cfg = ReportsConfig {
            path: dir.path().join("reports"),
            year: 2025,
            template_path,
            docs,
            ..ReportsConfig::default()
        };
        let sink = TemplateSink::new(&cfg);
        (dir, sink)
    }

    #[test]
    fn header_and_rows_land_in_place() {
        let template = "Отчёт за MXXX YXXX\nCFXXX (CXXX)\nОтветственный: GXXX\nЛоготип: [LXXX]\n";
        let (_dir, sink) = setup(Some(template));
        let path = sink
            .render(&bucket(vec![row(1, 65, "Первый\nсюжет"), row(2, 64, "Второй сюжет")]))
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "губер.txt");
        let folder_dir = path.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned();
        assert!(folder_dir.starts_with("КП_"));

        let out = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Отчёт за август 2025");
        assert_eq!(lines[1], "Общество Комсомольская правда (ООО КП)");
        assert_eq!(lines[2], "Ответственный: Иванов И.И.");
        assert_eq!(lines[3], "Логотип: []");
        assert_eq!(lines[14], "1 | 15.08.2025 09:30 | Первый сюжет | 65");
        assert_eq!(lines[15], "2 | 15.08.2025 09:30 | Второй сюжет | 64");
        assert_eq!(lines[16], "Итого: | 2 информационных материала | 2 мин 09 сек");
        assert_eq!(lines.len(), 17);
    }

    #[test]
    fn rows_overwrite_template_lines_from_row_offset() {
        let template: String = (1..=16).map(|i| format!("строка {i}\n")).collect();
        let (_dir, sink) = setup(Some(&template));
        let path = sink.render(&bucket(vec![row(1, 30, "сюжет")])).unwrap();
        let out = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[13], "строка 14");
        assert!(lines[14].starts_with("1 | "));
        assert!(lines[15].starts_with("Итого:"));
        assert_eq!(lines.len(), 16);
    }

    #[test]
    fn empty_bucket_keeps_only_header() {
        let (_dir, sink) = setup(Some("Шапка YXXX\n"));
        let path = sink.render(&bucket(Vec::new())).unwrap();
        let out = fs::read_to_string(path).unwrap();
        assert!(out.starts_with("Шапка 2025\n"));
        assert!(!out.contains("Итого"));
    }

    #[test]
    fn missing_template_skips_bucket_only() {
        let (_dir, sink) = setup(None);
        assert!(matches!(
            sink.render(&bucket(Vec::new())),
            Err(ReportError::TemplateMissing(_))
        ));

        let (written, skipped) = render_all(&sink, &[bucket(Vec::new()), bucket(Vec::new())]);
        assert!(written.is_empty());
        assert_eq!(skipped, 2);
    }

    #[test]
    fn tag_is_safe_as_file_name() {
        assert_eq!(file_stem("губер/админ"), "губер_админ");
    }
}
