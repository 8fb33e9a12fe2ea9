// SQLite-backed history and session store
//
// The connection is serialized behind a mutex; callers on the async
// runtime go through spawn_blocking. Every query is scoped by session id:
// one anonymous visitor never sees another's history.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::core::errors::{StorageError, StorageResult};

pub struct Database {
    conn: Mutex<Connection>,
}

/// Payload for one finished pipeline run
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub session_id: String,
    pub original_filename: String,
    pub image_size: usize,
    pub image_dimensions: Option<String>,
    pub original_texts: Vec<String>,
    pub translated_texts: Vec<String>,
    pub detected_language: Option<String>,
    pub confidence_scores: Vec<f32>,
    pub processing_time: f64,
}

/// One persisted translation, as returned to the history endpoints
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub session_id: String,
    pub original_filename: String,
    pub image_size: i64,
    pub image_dimensions: Option<String>,
    pub original_texts: Vec<String>,
    pub translated_texts: Vec<String>,
    pub detected_language: Option<String>,
    pub confidence_scores: Vec<f32>,
    pub processing_time: Option<f64>,
    pub created_at: String,
}

/// Pagination envelope for the history listing
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub translations: Vec<HistoryRecord>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Aggregates over one session's history
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_translations: u64,
    pub total_processing_time: f64,
    pub average_processing_time: f64,
    pub total_texts_translated: u64,
    pub languages_detected: Vec<String>,
    pub first_translation: Option<String>,
    pub latest_translation: Option<String>,
}

impl Database {
    /// Open or create the database at `path` and initialize the schema
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        info!("history store ready at {}", path.display());
        Ok(db)
    }

    /// In-memory database, for tests
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS user_sessions (
                id            INTEGER PRIMARY KEY,
                session_id    TEXT NOT NULL UNIQUE,
                ip_address    TEXT,
                user_agent    TEXT,
                created_at    TEXT NOT NULL,
                last_activity TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS translations (
                id                 INTEGER PRIMARY KEY,
                session_id         TEXT NOT NULL,
                original_filename  TEXT NOT NULL,
                image_size         INTEGER NOT NULL,
                image_dimensions   TEXT,
                original_texts     TEXT NOT NULL,
                translated_texts   TEXT NOT NULL,
                detected_language  TEXT,
                confidence_scores  TEXT,
                processing_time    REAL,
                created_at         TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_translations_session
                ON translations(session_id, id);",
        )?;
        Ok(())
    }

    /// Return the caller's session id, creating a fresh one when the
    /// presented id is absent or unknown. Unknown ids are not adopted.
    pub fn get_or_create_session(
        &self,
        presented: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> StorageResult<String> {
        let conn = self.conn.lock();

        if let Some(sid) = presented {
            let known: Option<String> = conn
                .query_row(
                    "SELECT session_id FROM user_sessions WHERE session_id = ?1",
                    params![sid],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(sid) = known {
                return Ok(sid);
            }
        }

        let sid = Uuid::new_v4().to_string();
        let now = timestamp();
        conn.execute(
            "INSERT INTO user_sessions (session_id, ip_address, user_agent, created_at, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![sid, ip_address, user_agent, now],
        )?;
        Ok(sid)
    }

    /// Refresh the session's last-activity timestamp
    pub fn touch_session(&self, session_id: &str) -> StorageResult<()> {
        self.conn.lock().execute(
            "UPDATE user_sessions SET last_activity = ?1 WHERE session_id = ?2",
            params![timestamp(), session_id],
        )?;
        Ok(())
    }

    /// Persist one pipeline run; returns the new record id
    pub fn insert_record(&self, record: &NewRecord) -> StorageResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO translations (
                session_id, original_filename, image_size, image_dimensions,
                original_texts, translated_texts, detected_language,
                confidence_scores, processing_time, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.session_id,
                record.original_filename,
                record.image_size as i64,
                record.image_dimensions,
                serde_json::to_string(&record.original_texts)?,
                serde_json::to_string(&record.translated_texts)?,
                record.detected_language,
                serde_json::to_string(&record.confidence_scores)?,
                record.processing_time,
                timestamp(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest-first page of one session's history
    pub fn list(&self, session_id: &str, page: u64, per_page: u64) -> StorageResult<HistoryPage> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let conn = self.conn.lock();
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM translations WHERE session_id = ?1",
            params![session_id],
            |row| row.get::<_, i64>(0),
        )? as u64;
        let pages = total.div_ceil(per_page);

        let mut stmt = conn.prepare(
            "SELECT id, session_id, original_filename, image_size, image_dimensions,
                    original_texts, translated_texts, detected_language,
                    confidence_scores, processing_time, created_at
             FROM translations
             WHERE session_id = ?1
             ORDER BY id DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            params![session_id, per_page as i64, ((page - 1) * per_page) as i64],
            row_to_record,
        )?;

        let mut translations = Vec::new();
        for row in rows {
            translations.push(row??);
        }

        Ok(HistoryPage {
            translations,
            total,
            pages,
            current_page: page,
            has_next: page < pages,
            has_prev: page > 1 && total > 0,
        })
    }

    /// Fetch one record, scoped to the session
    pub fn get(&self, session_id: &str, id: i64) -> StorageResult<Option<HistoryRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, session_id, original_filename, image_size, image_dimensions,
                        original_texts, translated_texts, detected_language,
                        confidence_scores, processing_time, created_at
                 FROM translations WHERE id = ?1 AND session_id = ?2",
                params![id, session_id],
                row_to_record,
            )
            .optional()?;
        row.transpose()
    }

    /// Delete one record, scoped to the session; true when a row went away
    pub fn delete(&self, session_id: &str, id: i64) -> StorageResult<bool> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM translations WHERE id = ?1 AND session_id = ?2",
            params![id, session_id],
        )?;
        Ok(deleted > 0)
    }

    /// Remove every record of the session; returns the removed count
    pub fn clear_session(&self, session_id: &str) -> StorageResult<usize> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM translations WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted)
    }

    /// Aggregate statistics over one session's history
    pub fn session_stats(&self, session_id: &str) -> StorageResult<SessionStats> {
        let conn = self.conn.lock();

        let (total, time_sum): (u64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(processing_time), 0.0)
             FROM translations WHERE session_id = ?1",
            params![session_id],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, f64>(1)?)),
        )?;

        if total == 0 {
            return Ok(SessionStats {
                total_translations: 0,
                total_processing_time: 0.0,
                average_processing_time: 0.0,
                total_texts_translated: 0,
                languages_detected: Vec::new(),
                first_translation: None,
                latest_translation: None,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT original_texts, detected_language FROM translations WHERE session_id = ?1",
        )?;
        let mut total_texts = 0u64;
        let mut languages = BTreeSet::new();
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        })?;
        for row in rows {
            let (texts_json, language) = row?;
            let texts: Vec<String> = serde_json::from_str(&texts_json)?;
            total_texts += texts.len() as u64;
            if let Some(language) = language {
                languages.insert(language);
            }
        }

        let first_translation: Option<String> = conn
            .query_row(
                "SELECT created_at FROM translations WHERE session_id = ?1 ORDER BY id ASC LIMIT 1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        let latest_translation: Option<String> = conn
            .query_row(
                "SELECT created_at FROM translations WHERE session_id = ?1 ORDER BY id DESC LIMIT 1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(SessionStats {
            total_translations: total,
            total_processing_time: round2(time_sum),
            average_processing_time: round2(time_sum / total as f64),
            total_texts_translated: total_texts,
            languages_detected: languages.into_iter().collect(),
            first_translation,
            latest_translation,
        })
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Map a full translations row; JSON column errors surface as StorageError
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StorageResult<HistoryRecord>> {
    let original_texts: String = row.get(5)?;
    let translated_texts: String = row.get(6)?;
    let confidence_scores: Option<String> = row.get(8)?;

    let record = HistoryRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        original_filename: row.get(2)?,
        image_size: row.get(3)?,
        image_dimensions: row.get(4)?,
        original_texts: Vec::new(),
        translated_texts: Vec::new(),
        detected_language: row.get(7)?,
        confidence_scores: Vec::new(),
        processing_time: row.get(9)?,
        created_at: row.get(10)?,
    };

    Ok(decode_payloads(
        record,
        &original_texts,
        &translated_texts,
        confidence_scores.as_deref(),
    ))
}

fn decode_payloads(
    mut record: HistoryRecord,
    original_texts: &str,
    translated_texts: &str,
    confidence_scores: Option<&str>,
) -> StorageResult<HistoryRecord> {
    record.original_texts = serde_json::from_str(original_texts)?;
    record.translated_texts = serde_json::from_str(translated_texts)?;
    record.confidence_scores = match confidence_scores {
        Some(json) => serde_json::from_str(json)?,
        None => Vec::new(),
    };
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session_id: &str, filename: &str) -> NewRecord {
        NewRecord {
            session_id: session_id.to_string(),
            original_filename: filename.to_string(),
            image_size: 2048,
            image_dimensions: Some("640x480".to_string()),
            original_texts: vec!["STOP".to_string(), "EXIT".to_string()],
            translated_texts: vec!["ARRÊT".to_string(), "SORTIE".to_string()],
            detected_language: Some("en".to_string()),
            confidence_scores: vec![85.0, 72.5],
            processing_time: 1.25,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_record(&record("s1", "sign.png")).unwrap();

        let fetched = db.get("s1", id).unwrap().unwrap();
        assert_eq!(fetched.original_filename, "sign.png");
        assert_eq!(fetched.original_texts, vec!["STOP", "EXIT"]);
        assert_eq!(fetched.translated_texts, vec!["ARRÊT", "SORTIE"]);
        assert_eq!(fetched.confidence_scores, vec![85.0, 72.5]);
        assert_eq!(fetched.processing_time, Some(1.25));
    }

    #[test]
    fn get_is_session_scoped() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_record(&record("s1", "sign.png")).unwrap();

        assert!(db.get("someone-else", id).unwrap().is_none());
        assert!(db.get("s1", id).unwrap().is_some());
    }

    #[test]
    fn delete_is_session_scoped() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_record(&record("s1", "sign.png")).unwrap();

        assert!(!db.delete("someone-else", id).unwrap());
        assert!(db.delete("s1", id).unwrap());
        assert!(db.get("s1", id).unwrap().is_none());
    }

    #[test]
    fn list_paginates_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_record(&record("s1", &format!("sign{i}.png")))
                .unwrap();
        }
        db.insert_record(&record("other", "foreign.png")).unwrap();

        let page1 = db.list("s1", 1, 2).unwrap();
        assert_eq!(page1.total, 5);
        assert_eq!(page1.pages, 3);
        assert!(page1.has_next);
        assert!(!page1.has_prev);
        assert_eq!(page1.translations[0].original_filename, "sign4.png");
        assert_eq!(page1.translations[1].original_filename, "sign3.png");

        let page3 = db.list("s1", 3, 2).unwrap();
        assert_eq!(page3.translations.len(), 1);
        assert!(!page3.has_next);
        assert!(page3.has_prev);
        assert_eq!(page3.translations[0].original_filename, "sign0.png");
    }

    #[test]
    fn clear_removes_only_this_session() {
        let db = Database::open_in_memory().unwrap();
        db.insert_record(&record("s1", "a.png")).unwrap();
        db.insert_record(&record("s1", "b.png")).unwrap();
        db.insert_record(&record("s2", "c.png")).unwrap();

        assert_eq!(db.clear_session("s1").unwrap(), 2);
        assert_eq!(db.list("s1", 1, 10).unwrap().total, 0);
        assert_eq!(db.list("s2", 1, 10).unwrap().total, 1);
    }

    #[test]
    fn stats_aggregate_the_session() {
        let db = Database::open_in_memory().unwrap();
        let mut second = record("s1", "b.png");
        second.detected_language = Some("ja".to_string());
        second.original_texts = vec!["出口".to_string()];
        second.processing_time = 0.75;

        db.insert_record(&record("s1", "a.png")).unwrap();
        db.insert_record(&second).unwrap();

        let stats = db.session_stats("s1").unwrap();
        assert_eq!(stats.total_translations, 2);
        assert_eq!(stats.total_processing_time, 2.0);
        assert_eq!(stats.average_processing_time, 1.0);
        assert_eq!(stats.total_texts_translated, 3);
        assert_eq!(stats.languages_detected, vec!["en", "ja"]);
        assert!(stats.first_translation.is_some());
        assert!(stats.latest_translation.is_some());
    }

    #[test]
    fn stats_for_empty_session() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.session_stats("nobody").unwrap();
        assert_eq!(stats.total_translations, 0);
        assert_eq!(stats.average_processing_time, 0.0);
        assert!(stats.languages_detected.is_empty());
        assert!(stats.first_translation.is_none());
    }

    #[test]
    fn unknown_presented_session_is_not_adopted() {
        let db = Database::open_in_memory().unwrap();
        let sid = db
            .get_or_create_session(Some("forged-id"), None, Some("test-agent"))
            .unwrap();
        assert_ne!(sid, "forged-id");

        // A known session id is returned as-is
        let again = db
            .get_or_create_session(Some(&sid), None, None)
            .unwrap();
        assert_eq!(again, sid);
    }

    #[test]
    fn touch_session_updates_activity() {
        let db = Database::open_in_memory().unwrap();
        let sid = db.get_or_create_session(None, None, None).unwrap();
        db.touch_session(&sid).unwrap();
    }
}
