//! Broadcast date/time recovered from the source file name:
//! `15.08 на 9-30 эфир.doc` → `15.08.2025 09:30`, `15.08 эфир.doc` → `15.08.2025`.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

pub const DATE_NOT_FOUND: &str = "Дата не найдена";

static DATE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\.(\d{2})\s+на\s+(\d{1,2})-(\d{2})").unwrap());
static DATE_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2})\.(\d{2})").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastStamp {
    pub display: String,
    /// `None` when nothing was found or the numbers are not a real date;
    /// such rows sort before every dated row.
    pub sort_key: Option<NaiveDateTime>,
}

impl BroadcastStamp {
    pub fn from_file_name(name: &str, year: i32) -> Self {
        if let Some(c) = DATE_TIME.captures(name) {
            let (day, month, hour, minute) = (&c[1], &c[2], &c[3], &c[4]);
            let sort_key = date(year, month, day).and_then(|d| {
                d.and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
            });
            return Self {
                display: format!("{:0>2}.{}.{} {:0>2}:{}", day, month, year, hour, minute),
                sort_key,
            };
        }

        if let Some(c) = DATE_ONLY.captures(name) {
            let (day, month) = (&c[1], &c[2]);
            return Self {
                display: format!("{:0>2}.{}.{}", day, month, year),
                sort_key: date(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0)),
            };
        }

        Self {
            display: DATE_NOT_FOUND.to_string(),
            sort_key: None,
        }
    }
}

fn date(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}
