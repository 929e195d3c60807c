use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::parser::points::PointCandidate;

pub type Result<T> = std::result::Result<T, StoreError>;

/// How to treat an existing database file when opening the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Delete the file (and WAL sidecars) first, start from an empty schema.
    Reset,
    /// Keep whatever is already stored.
    Open,
}

/// Sole writer of `files` / `points`. Every public operation runs in its own
/// transaction, so a failure while saving one file never rolls back another.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: i64,
    pub file_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub ordinal: u32,
    pub tag: String,
    pub seconds: u32,
    pub content: String,
    pub short_content: Option<String>,
    pub created_at: String,
}

impl StoredPoint {
    pub fn has_summary(&self) -> bool {
        self.short_content
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// A point still waiting for a short summary.
#[derive(Debug, Clone)]
pub struct PendingPoint {
    pub id: i64,
    pub ordinal: u32,
    pub tag: String,
    pub content: String,
}

pub struct Stats {
    pub files: usize,
    pub points: usize,
    pub unsummarized: usize,
    pub size_bytes: Option<u64>,
}

impl Store {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        if mode == OpenMode::Reset {
            remove_database(path)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Store {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        debug!(path = ?path, ?mode, "Store opened");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Store { conn, path: None };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS files (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                filename   TEXT NOT NULL,
                file_path  TEXT UNIQUE NOT NULL,
                file_type  TEXT,
                encoding   TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS points (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id       INTEGER NOT NULL REFERENCES files(id),
                point_number  INTEGER NOT NULL,
                tag           TEXT NOT NULL,
                seconds       INTEGER NOT NULL,
                content       TEXT NOT NULL,
                short_content TEXT,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_points_file ON points(file_id);
            ",
        )?;
        Ok(())
    }

    // ── Files ──

    /// Upsert by `file_path`; returns the id of the (new or existing) row.
    pub fn save_file(
        &self,
        filename: &str,
        file_path: &str,
        file_type: &str,
        encoding: &str,
    ) -> Result<i64> {
        self.upsert_file(filename, file_path, file_type, encoding)
            .inspect_err(|e| error!("Failed to save file {}: {}", file_path, e))
    }

    fn upsert_file(
        &self,
        filename: &str,
        file_path: &str,
        file_type: &str,
        encoding: &str,
    ) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM files WHERE file_path = ?1",
                params![file_path],
                |r| r.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE files
                     SET filename = ?1, file_type = ?2, encoding = ?3, created_at = datetime('now')
                     WHERE id = ?4",
                    params![filename, file_type, encoding, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO files (filename, file_path, file_type, encoding)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![filename, file_path, file_type, encoding],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;
        Ok(id)
    }

    // ── Points ──

    /// Replace every point of `file_id` with `points`, numbered 1..N in the
    /// given order. An empty slice is a no-op: previously stored points stay.
    pub fn save_points(&self, file_id: i64, points: &[PointCandidate]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        self.replace_points(file_id, points)
            .inspect_err(|e| error!("Failed to save points for file #{}: {}", file_id, e))
    }

    fn replace_points(&self, file_id: i64, points: &[PointCandidate]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM points WHERE file_id = ?1", params![file_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO points (file_id, point_number, tag, seconds, content, short_content)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            )?;
            for (i, p) in points.iter().enumerate() {
                stmt.execute(params![file_id, (i + 1) as u32, p.tag, p.seconds, p.body])?;
            }
        }
        tx.commit()?;
        Ok(points.len())
    }

    /// Returns `false` when no point has that id.
    pub fn update_point_summary(&self, point_id: i64, summary: &str) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "UPDATE points SET short_content = ?1 WHERE id = ?2",
                params![summary, point_id],
            )
            .inspect_err(|e| error!("Failed to update summary of point #{}: {}", point_id, e))?;
        Ok(n > 0)
    }

    /// All points, ordered by (file name, ordinal).
    pub fn get_all_points(&self) -> Result<Vec<StoredPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.file_id, f.filename, f.file_path, p.point_number, p.tag,
                    p.seconds, p.content, p.short_content, p.created_at
             FROM points p
             JOIN files f ON p.file_id = f.id
             ORDER BY f.filename, f.id, p.point_number",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredPoint {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    file_name: row.get(2)?,
                    file_path: row.get(3)?,
                    ordinal: row.get(4)?,
                    tag: row.get(5)?,
                    seconds: row.get(6)?,
                    content: row.get(7)?,
                    short_content: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Points whose summary is NULL, empty or whitespace-only, by id.
    pub fn fetch_unsummarized(&self) -> Result<Vec<PendingPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, point_number, tag, content
             FROM points
             WHERE short_content IS NULL OR LENGTH(TRIM(short_content, ' ' || char(9, 10, 13))) = 0
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PendingPoint {
                    id: row.get(0)?,
                    ordinal: row.get(1)?,
                    tag: row.get(2)?,
                    content: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring match on the tag. SQLite's `LOWER` only
    /// folds ASCII, so the match runs on the Rust side.
    pub fn search_by_tag(&self, fragment: &str) -> Result<Vec<StoredPoint>> {
        let needle = fragment.to_lowercase();
        Ok(self
            .get_all_points()?
            .into_iter()
            .filter(|p| p.tag.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn count_points(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM points", [], |r| r.get(0))?)
    }

    pub fn stats(&self) -> Result<Stats> {
        let files: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        let points = self.count_points()?;
        let unsummarized: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM points
             WHERE short_content IS NULL OR LENGTH(TRIM(short_content, ' ' || char(9, 10, 13))) = 0",
            [],
            |r| r.get(0),
        )?;
        let size_bytes = match &self.path {
            Some(p) => Some(std::fs::metadata(p)?.len()),
            None => None,
        };
        Ok(Stats {
            files,
            points,
            unsummarized,
            size_bytes,
        })
    }
}

/// Delete the database file and its WAL sidecars. Missing files are fine.
pub fn remove_database(path: &Path) -> Result<bool> {
    let mut removed = false;
    for suffix in ["", "-wal", "-shm"] {
        let mut p = path.as_os_str().to_owned();
        p.push(suffix);
        let p = PathBuf::from(p);
        if p.exists() {
            std::fs::remove_file(&p)?;
            removed = true;
        }
    }
    if removed {
        info!("Removed database {:?}", path);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn candidate(ordinal: u64, tag: &str, seconds: u32, body: &str) -> PointCandidate {
        PointCandidate {
            ordinal,
            tag: tag.to_string(),
            seconds,
            body: body.to_string(),
        }
    }

    fn setup() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("points.db"), OpenMode::Reset).unwrap();
        (store, dir)
    }

    #[test]
    fn save_file_upserts_by_path() {
        let (store, _dir) = setup();
        let a = store.save_file("a.txt", "ИЮЛЬ/КП/a.txt", ".txt", "utf-8").unwrap();
        let b = store.save_file("b.txt", "ИЮЛЬ/КП/b.txt", ".txt", "utf-8").unwrap();
        let again = store.save_file("a.txt", "ИЮЛЬ/КП/a.txt", ".txt", "cp1251").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, again);
        assert_eq!(store.stats().unwrap().files, 2);
    }

    #[test]
    fn save_points_numbers_from_one() {
        let (store, _dir) = setup();
        let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
        let saved = store
            .save_points(
                id,
                &[
                    candidate(3, "губер", 57, "первый текст пункта"),
                    candidate(7, "админ", 49, "второй текст пункта"),
                    candidate(7, "админ", 12, "третий текст пункта"),
                ],
            )
            .unwrap();
        assert_eq!(saved, 3);

        let points = store.get_all_points().unwrap();
        let ordinals: Vec<u32> = points.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(points[0].tag, "губер");
        assert_eq!(points[2].seconds, 12);
        assert!(points.iter().all(|p| p.short_content.is_none()));
    }

    #[test]
    fn empty_save_keeps_previous_points() {
        let (store, _dir) = setup();
        let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
        store
            .save_points(id, &[candidate(1, "губер", 40, "достаточно длинный текст")])
            .unwrap();
        assert_eq!(store.save_points(id, &[]).unwrap(), 0);
        assert_eq!(store.count_points().unwrap(), 1);
    }

    #[test]
    fn resave_replaces_whole_set() {
        let (store, _dir) = setup();
        let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
        store
            .save_points(
                id,
                &[
                    candidate(1, "губер", 40, "старый текст один"),
                    candidate(2, "губер", 40, "старый текст два"),
                ],
            )
            .unwrap();
        store
            .save_points(id, &[candidate(1, "админ", 15, "новый единственный текст")])
            .unwrap();

        let points = store.get_all_points().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].ordinal, 1);
        assert_eq!(points[0].tag, "админ");
    }

    #[test]
    fn save_points_is_all_or_nothing() {
        let (store, _dir) = setup();
        let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
        store
            .save_points(id, &[candidate(1, "губер", 40, "старый текст один")])
            .unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_second BEFORE INSERT ON points
                 WHEN NEW.point_number = 2
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let result = store.save_points(
            id,
            &[
                candidate(1, "админ", 15, "новый текст один"),
                candidate(2, "админ", 15, "новый текст два"),
            ],
        );
        assert!(result.is_err());

        let contents: Vec<String> = store
            .get_all_points()
            .unwrap()
            .into_iter()
            .map(|p| p.content)
            .collect();
        assert_eq!(contents, vec!["старый текст один".to_string()]);
    }

    #[test]
    fn points_of_other_files_untouched() {
        let (store, _dir) = setup();
        let a = store.save_file("a.txt", "X/a.txt", ".txt", "utf-8").unwrap();
        let b = store.save_file("b.txt", "X/b.txt", ".txt", "utf-8").unwrap();
        store.save_points(a, &[candidate(1, "t", 1, "текст файла а")]).unwrap();
        store.save_points(b, &[candidate(1, "t", 1, "текст файла б")]).unwrap();
        store.save_points(a, &[candidate(1, "t", 2, "новый текст а")]).unwrap();

        let points = store.get_all_points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].file_name, "a.txt");
        assert_eq!(points[0].seconds, 2);
        assert_eq!(points[1].file_name, "b.txt");
    }

    #[test]
    fn all_points_ordered_by_file_name_then_ordinal() {
        let (store, _dir) = setup();
        let z = store.save_file("z.txt", "X/z.txt", ".txt", "utf-8").unwrap();
        let a = store.save_file("a.txt", "X/a.txt", ".txt", "utf-8").unwrap();
        store
            .save_points(z, &[candidate(1, "t", 1, "z один"), candidate(2, "t", 1, "z два")])
            .unwrap();
        store.save_points(a, &[candidate(1, "t", 1, "a один")]).unwrap();

        let names: Vec<(String, u32)> = store
            .get_all_points()
            .unwrap()
            .into_iter()
            .map(|p| (p.file_name, p.ordinal))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a.txt".to_string(), 1),
                ("z.txt".to_string(), 1),
                ("z.txt".to_string(), 2)
            ]
        );
    }

    #[test]
    fn summary_lifecycle() {
        let (store, _dir) = setup();
        let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
        store
            .save_points(
                id,
                &[candidate(1, "t", 1, "первый текст"), candidate(2, "t", 1, "второй текст")],
            )
            .unwrap();

        let pending = store.fetch_unsummarized().unwrap();
        assert_eq!(pending.len(), 2);

        assert!(store.update_point_summary(pending[0].id, "кратко").unwrap());
        assert!(store.update_point_summary(pending[1].id, "   ").unwrap());
        assert!(!store.update_point_summary(9999, "нет такого").unwrap());

        // whitespace-only summaries still count as missing
        let pending = store.fetch_unsummarized().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].ordinal, 2);
        assert_eq!(store.stats().unwrap().unsummarized, 1);

        let points = store.get_all_points().unwrap();
        assert!(points[0].has_summary());
        assert!(!points[1].has_summary());
    }

    #[test]
    fn search_by_tag_ignores_case() {
        let (store, _dir) = setup();
        let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
        store
            .save_points(
                id,
                &[candidate(1, "Губер", 40, "текст один"), candidate(2, "админ", 40, "текст два")],
            )
            .unwrap();
        let found = store.search_by_tag("ГУБ").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "Губер");
    }

    #[test]
    fn reset_mode_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.db");
        {
            let store = Store::open(&path, OpenMode::Reset).unwrap();
            let id = store.save_file("f.txt", "X/f.txt", ".txt", "utf-8").unwrap();
            store.save_points(id, &[candidate(1, "t", 1, "какой-то текст")]).unwrap();
        }
        {
            let store = Store::open(&path, OpenMode::Open).unwrap();
            assert_eq!(store.count_points().unwrap(), 1);
        }
        let store = Store::open(&path, OpenMode::Reset).unwrap();
        assert_eq!(store.count_points().unwrap(), 0);
        assert!(store.stats().unwrap().size_bytes.is_some());
    }
}
