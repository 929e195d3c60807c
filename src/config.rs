use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const ENV_PREFIX: &str = "POINTS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub folder_path: PathBuf,
    pub database_path: PathBuf,
    pub gpt: GptConfig,
    pub reports: ReportsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            folder_path: PathBuf::from("ИЮЛЬ"),
            database_path: PathBuf::from("points_database.db"),
            gpt: GptConfig::default(),
            reports: ReportsConfig::default(),
        }
    }
}

/// Summarizer endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GptConfig {
    pub api_key: String,
    pub proxy_url: String,
    pub max_chars: usize,
    /// Request timeout, seconds.
    pub timeout: u64,
    /// Pause between two summarizer requests, milliseconds.
    pub request_delay_ms: u64,
}

impl Default for GptConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            proxy_url: String::new(),
            max_chars: 200,
            timeout: 30,
            request_delay_ms: 1000,
        }
    }
}

impl GptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub path: PathBuf,
    pub year: i32,
    /// Points of `distinguished_tag` shorter than this are left out of reports.
    pub min_duration_seconds: u32,
    pub distinguished_tag: String,
    pub template_path: PathBuf,
    pub docs: HashMap<String, FolderDoc>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reports"),
            year: chrono::Local::now().year(),
            min_duration_seconds: 30,
            distinguished_tag: "губер".to_string(),
            template_path: PathBuf::from("static/template.txt"),
            docs: HashMap::new(),
        }
    }
}

impl ReportsConfig {
    /// Header metadata for a folder. Folder names are matched
    /// case-insensitively; unknown folders get the placeholder defaults.
    pub fn doc_for(&self, folder: &str) -> FolderDoc {
        let wanted = folder.to_lowercase();
        self.docs
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, doc)| doc.clone())
            .unwrap_or_default()
    }
}

/// Per-folder report header.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FolderDoc {
    pub month: String,
    pub full_name: String,
    pub company_short: String,
    pub company_full: String,
    pub logo_path: String,
}

impl Default for FolderDoc {
    fn default() -> Self {
        Self {
            month: "месяц".to_string(),
            full_name: "Ф.И.О.".to_string(),
            company_short: "CXXX".to_string(),
            company_full: "CFXXX".to_string(),
            logo_path: String::new(),
        }
    }
}

/// Load `path` layered with `POINTS_*` environment overrides.
///
/// Never fails: a missing or malformed file degrades to defaults.
pub fn load(path: &Path) -> AppConfig {
    if !path.exists() {
        warn!("Config file {:?} not found, using defaults", path);
    }

    let built = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|c| c.try_deserialize::<AppConfig>());

    match built {
        Ok(cfg) => {
            info!(config = ?path, folder = ?cfg.folder_path, "Configuration loaded");
            cfg
        }
        Err(e) => {
            warn!("Failed to read config {:?}: {}. Using defaults", path, e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = load(&dir.path().join("absent.yaml"));
        assert_eq!(cfg.folder_path, PathBuf::from("ИЮЛЬ"));
        assert_eq!(cfg.reports.min_duration_seconds, 30);
        assert_eq!(cfg.reports.distinguished_tag, "губер");
        assert_eq!(cfg.gpt.max_chars, 200);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let (_dir, path) = write_config(
            "folder_path: АВГУСТ\nreports:\n  year: 2025\n  min_duration_seconds: 45\n",
        );
        let cfg = load(&path);
        assert_eq!(cfg.folder_path, PathBuf::from("АВГУСТ"));
        assert_eq!(cfg.reports.year, 2025);
        assert_eq!(cfg.reports.min_duration_seconds, 45);
        assert_eq!(cfg.reports.path, PathBuf::from("reports"));
        assert_eq!(cfg.gpt.timeout, 30);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let (_dir, path) = write_config("reports: [unclosed\n");
        let cfg = load(&path);
        assert_eq!(cfg.reports.min_duration_seconds, 30);
    }

    #[test]
    fn folder_doc_lookup() {
        let (_dir, path) = write_config(
            "reports:\n  docs:\n    КП:\n      month: июль\n      full_name: Иванов И.И.\n",
        );
        let cfg = load(&path);
        let doc = cfg.reports.doc_for("КП");
        assert_eq!(doc.month, "июль");
        assert_eq!(doc.full_name, "Иванов И.И.");
        assert_eq!(doc.company_short, "CXXX");

        let unknown = cfg.reports.doc_for("МК");
        assert_eq!(unknown.month, "месяц");
    }
}
