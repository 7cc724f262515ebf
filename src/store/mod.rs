//! SQLite-backed index store.
//!
//! One physical connection guarded by a mutex; every operation locks,
//! runs its statement(s), and commits before unlocking, so callers never
//! observe interleaved partial writes. Each mutation is a single
//! statement; a crash mid-batch loses at most one record's write.

mod record;
mod schema;

pub use record::{ImageRecord, NewRecord, OcrStatus};

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;
use schema::{MIGRATIONS, SCHEMA};

/// A text-search hit; `updated_at` carries the recency ordering used by
/// the substring and comprehensive strategies.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub id: i64,
    pub file_path: String,
    pub external_ref: String,
    pub updated_at: String,
}

pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl IndexStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory store, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(SCHEMA)?;
        for migration in MIGRATIONS {
            // Already-applied migrations fail; that is fine.
            let _ = conn.execute(migration, []);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    // ========================================================================
    // Record CRUD
    // ========================================================================

    /// Upsert by `file_path`. On conflict the row is updated in place,
    /// so the id stays stable and the update trigger rewrites the FTS
    /// row; OCR state resets to pending either way. Returns the record
    /// id.
    pub fn insert_or_replace(&self, record: &NewRecord<'_>) -> Result<i64> {
        let conn = self.lock();
        let id = conn.query_row(
            r#"
            INSERT INTO images
                (file_path, content_hash, perceptual_hash, ocr_text,
                 external_ref, updated_at, ocr_status, ocr_fail_count)
            VALUES (?, ?, ?, '', ?, ?, 'pending', 0)
            ON CONFLICT(file_path) DO UPDATE SET
                content_hash = excluded.content_hash,
                perceptual_hash = excluded.perceptual_hash,
                ocr_text = '',
                external_ref = excluded.external_ref,
                updated_at = excluded.updated_at,
                ocr_status = 'pending',
                ocr_fail_count = 0
            RETURNING id
            "#,
            params![
                record.file_path,
                record.content_hash,
                record.perceptual_hash,
                record.external_ref,
                Self::now(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_content_hash(&self, hash: &str) -> Result<Option<ImageRecord>> {
        self.find_one("content_hash = ?", hash)
    }

    pub fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<ImageRecord>> {
        self.find_one("external_ref = ?", external_ref)
    }

    pub fn find_by_path(&self, path: &str) -> Result<Option<ImageRecord>> {
        self.find_one("file_path = ?", path)
    }

    pub fn get(&self, id: i64) -> Result<Option<ImageRecord>> {
        let conn = self.lock();
        let result = conn.query_row(
            &format!("{} WHERE id = ?", SELECT_RECORD),
            [id],
            row_to_record,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn find_one(&self, predicate: &str, value: &str) -> Result<Option<ImageRecord>> {
        let conn = self.lock();
        let result = conn.query_row(
            &format!("{} WHERE {}", SELECT_RECORD, predicate),
            [value],
            row_to_record,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Full scan of records carrying a perceptual hash. The corpus is
    /// bounded by the archiving threshold, so a scan stays cheap.
    pub fn scan_fingerprints(&self) -> Result<Vec<ImageRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE perceptual_hash IS NOT NULL AND perceptual_hash != ''",
            SELECT_RECORD
        ))?;
        let records = stmt
            .query_map([], row_to_record)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    pub fn record_count(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Bulk path remap after files were physically relocated. Ids,
    /// fingerprints and OCR state are untouched. Returns how many rows
    /// actually changed.
    pub fn rewrite_paths(&self, mappings: &[(String, String)]) -> Result<usize> {
        let conn = self.lock();
        let mut changed = 0;
        for (old_path, new_path) in mappings {
            changed += conn.execute(
                "UPDATE images SET file_path = ?, updated_at = ? WHERE file_path = ?",
                params![new_path, Self::now(), old_path],
            )?;
        }
        Ok(changed)
    }

    // ========================================================================
    // OCR job queue
    // ========================================================================

    /// Select records eligible for OCR: pending, or failed with fewer
    /// than `max_retries` attempts. Does not mark anything as claimed;
    /// the single batch driver contract makes that unnecessary.
    pub fn claim_pending_ocr(&self, limit: usize, max_retries: u32) -> Result<Vec<(i64, String)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_path FROM images
            WHERE ocr_status = 'pending'
               OR (ocr_status = 'failed' AND ocr_fail_count < ?)
            LIMIT ?
            "#,
        )?;
        let rows = stmt
            .query_map(params![max_retries, limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn pending_count(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM images WHERE ocr_status = 'pending'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn update_ocr_result(
        &self,
        id: i64,
        text: &str,
        status: OcrStatus,
        fail_count: u32,
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            UPDATE images
            SET ocr_text = ?, ocr_status = ?, ocr_fail_count = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![text, status.as_str(), fail_count, Self::now(), id],
        )?;
        Ok(())
    }

    /// `pending|failed → failed`, incrementing the attempt counter.
    pub fn increment_fail_count(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            UPDATE images
            SET ocr_status = 'failed', ocr_fail_count = ocr_fail_count + 1, updated_at = ?
            WHERE id = ?
            "#,
            params![Self::now(), id],
        )?;
        Ok(())
    }

    /// Terminal park state for missing or zero-length files.
    pub fn mark_skipped(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE images SET ocr_status = 'skipped', updated_at = ? WHERE id = ?",
            params![Self::now(), id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Manual overrides
    // ========================================================================

    /// Operator-supplied text: `any → completed`, fail count reset.
    pub fn set_ocr_text(&self, id: i64, text: &str) -> Result<()> {
        self.update_ocr_result(id, text, OcrStatus::Completed, 0)
    }

    /// Operator cleared result: `any → pending`, text emptied.
    pub fn clear_ocr(&self, id: i64) -> Result<()> {
        self.update_ocr_result(id, "", OcrStatus::Pending, 0)
    }

    pub fn set_external_ref(&self, id: i64, external_ref: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE images SET external_ref = ?, updated_at = ? WHERE id = ?",
            params![external_ref, Self::now(), id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Text query surfaces
    // ========================================================================

    /// Ranked full-text lookup. `match_expr` is an FTS5 MATCH expression;
    /// rows come back best match first.
    pub fn ranked_search(&self, match_expr: &str, limit: usize) -> Result<Vec<TextHit>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT i.id, i.file_path, i.external_ref, i.updated_at
            FROM images_fts
            JOIN images i ON images_fts.rowid = i.id
            WHERE images_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )?;
        let hits = stmt
            .query_map(params![match_expr, limit as i64], row_to_hit)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(hits)
    }

    /// Substring lookup: any of `needles` contained in `ocr_text`, most
    /// recently updated first. Needles are matched literally; LIKE
    /// wildcards carry no special meaning.
    pub fn substring_search(&self, needles: &[String], limit: usize) -> Result<Vec<TextHit>> {
        if needles.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock();

        let clauses = vec![r"ocr_text LIKE ? ESCAPE '\'"; needles.len()].join(" OR ");
        let sql = format!(
            r#"
            SELECT id, file_path, external_ref, updated_at
            FROM images
            WHERE {}
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
            clauses
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = needles
            .iter()
            .map(|n| {
                let literal = n
                    .replace('\\', r"\\")
                    .replace('%', r"\%")
                    .replace('_', r"\_");
                Box::new(format!("%{}%", literal)) as Box<dyn rusqlite::ToSql>
            })
            .collect();
        params.push(Box::new(limit as i64));

        let hits = stmt
            .query_map(rusqlite::params_from_iter(params), row_to_hit)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(hits)
    }
}

const SELECT_RECORD: &str = r#"
    SELECT id, file_path, content_hash, perceptual_hash, ocr_text,
           external_ref, updated_at, ocr_status, ocr_fail_count
    FROM images
"#;

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    let status: String = row.get(7)?;
    Ok(ImageRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        content_hash: row.get(2)?,
        perceptual_hash: row.get(3)?,
        ocr_text: row.get(4)?,
        external_ref: row.get(5)?,
        updated_at: row.get(6)?,
        ocr_status: status.parse().unwrap_or(OcrStatus::Pending),
        ocr_fail_count: row.get(8)?,
    })
}

fn row_to_hit(row: &Row<'_>) -> rusqlite::Result<TextHit> {
    Ok(TextHit {
        id: row.get(0)?,
        file_path: row.get(1)?,
        external_ref: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(path: &str, content: &str, phash: &str) -> NewRecord<'static> {
        // Leak is fine in tests; keeps the borrow story simple.
        NewRecord {
            file_path: Box::leak(path.to_string().into_boxed_str()),
            content_hash: Box::leak(content.to_string().into_boxed_str()),
            perceptual_hash: Box::leak(phash.to_string().into_boxed_str()),
            external_ref: "",
        }
    }

    #[test]
    fn insert_and_lookup_by_hash() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "p1p1p1p1p1p1p1p1"))
            .unwrap();
        assert!(id > 0);

        let rec = store.find_by_content_hash("h1").unwrap().unwrap();
        assert_eq!(rec.file_path, "/a.png");
        assert_eq!(rec.ocr_status, OcrStatus::Pending);
        assert_eq!(rec.ocr_fail_count, 0);
        assert!(store.find_by_content_hash("h2").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_by_path() {
        let store = IndexStore::open_in_memory().unwrap();
        let first = store
            .insert_or_replace(&sample("/a.png", "h1", "p1p1p1p1p1p1p1p1"))
            .unwrap();
        let second = store
            .insert_or_replace(&sample("/a.png", "h2", "p2p2p2p2p2p2p2p2"))
            .unwrap();

        assert_eq!(store.record_count().unwrap(), 1);
        // Same path keeps the same id.
        assert_eq!(first, second);
        let rec = store.find_by_path("/a.png").unwrap().unwrap();
        assert_eq!(rec.id, first);
        assert_eq!(rec.content_hash.as_deref(), Some("h2"));
    }

    #[test]
    fn upsert_purges_stale_fts_rows() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "p1p1p1p1p1p1p1p1"))
            .unwrap();
        store
            .update_ocr_result(id, "sunset beach", OcrStatus::Completed, 0)
            .unwrap();

        // Re-index the same path: OCR text resets, and the old text must
        // be gone from the FTS table itself, not just hidden by the join.
        store
            .insert_or_replace(&sample("/a.png", "h2", "p2p2p2p2p2p2p2p2"))
            .unwrap();

        let stale: i64 = store
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM images_fts WHERE images_fts MATCH '\"sunset\"'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stale, 0);
        assert!(store.ranked_search("\"sunset\"", 10).unwrap().is_empty());
        assert_eq!(store.find_by_path("/a.png").unwrap().unwrap().ocr_text, "");
    }

    #[test]
    fn claim_respects_limit_and_retry_bound() {
        let store = IndexStore::open_in_memory().unwrap();
        for i in 0..4 {
            store
                .insert_or_replace(&sample(
                    &format!("/img{}.png", i),
                    &format!("h{}", i),
                    "aaaaaaaaaaaaaaaa",
                ))
                .unwrap();
        }

        assert_eq!(store.claim_pending_ocr(2, 3).unwrap().len(), 2);
        assert_eq!(store.claim_pending_ocr(10, 3).unwrap().len(), 4);

        // Exhaust one record's retries.
        let (id, _) = store.claim_pending_ocr(1, 3).unwrap()[0].clone();
        for _ in 0..3 {
            store.increment_fail_count(id).unwrap();
        }
        let claimed = store.claim_pending_ocr(10, 3).unwrap();
        assert_eq!(claimed.len(), 3);
        assert!(claimed.iter().all(|(cid, _)| *cid != id));

        // Still retrievable by direct lookup.
        let rec = store.get(id).unwrap().unwrap();
        assert_eq!(rec.ocr_status, OcrStatus::Failed);
        assert_eq!(rec.ocr_fail_count, 3);
    }

    #[test]
    fn failed_record_is_reclaimed_below_bound() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store.increment_fail_count(id).unwrap();

        let claimed = store.claim_pending_ocr(10, 3).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].0, id);
    }

    #[test]
    fn skipped_is_terminal_for_claiming() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store.mark_skipped(id).unwrap();
        assert!(store.claim_pending_ocr(10, 3).unwrap().is_empty());
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn manual_overrides_reset_state() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store.increment_fail_count(id).unwrap();
        store.increment_fail_count(id).unwrap();

        store.set_ocr_text(id, "corrected text").unwrap();
        let rec = store.get(id).unwrap().unwrap();
        assert_eq!(rec.ocr_status, OcrStatus::Completed);
        assert_eq!(rec.ocr_fail_count, 0);
        assert_eq!(rec.ocr_text, "corrected text");

        store.clear_ocr(id).unwrap();
        let rec = store.get(id).unwrap().unwrap();
        assert_eq!(rec.ocr_status, OcrStatus::Pending);
        assert_eq!(rec.ocr_text, "");
    }

    #[test]
    fn rewrite_paths_keeps_identity_and_state() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/old/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store
            .update_ocr_result(id, "some text", OcrStatus::Completed, 0)
            .unwrap();

        let changed = store
            .rewrite_paths(&[
                ("/old/a.png".to_string(), "/new/a.png".to_string()),
                ("/old/missing.png".to_string(), "/new/missing.png".to_string()),
            ])
            .unwrap();
        assert_eq!(changed, 1);

        let rec = store.find_by_path("/new/a.png").unwrap().unwrap();
        assert_eq!(rec.id, id);
        assert_eq!(rec.content_hash.as_deref(), Some("h1"));
        assert_eq!(rec.ocr_status, OcrStatus::Completed);
        assert_eq!(rec.ocr_text, "some text");
        assert!(store.find_by_path("/old/a.png").unwrap().is_none());
    }

    #[test]
    fn fts_stays_synchronized_with_updates() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();

        assert!(store.ranked_search("\"sunset\"", 10).unwrap().is_empty());

        store
            .update_ocr_result(id, "sunset beach", OcrStatus::Completed, 0)
            .unwrap();
        let hits = store.ranked_search("\"sunset\"", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_path, "/a.png");

        store.update_ocr_result(id, "city night", OcrStatus::Completed, 0).unwrap();
        assert!(store.ranked_search("\"sunset\"", 10).unwrap().is_empty());
        assert_eq!(store.ranked_search("\"city\"", 10).unwrap().len(), 1);
    }

    #[test]
    fn substring_search_matches_cjk() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store
            .update_ocr_result(id, "妳好世界", OcrStatus::Completed, 0)
            .unwrap();

        let hits = store
            .substring_search(&["妳好".to_string()], 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store
            .substring_search(&["不存在".to_string()], 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn substring_search_treats_wildcards_literally() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store
            .update_ocr_result(id, "sale 50% off", OcrStatus::Completed, 0)
            .unwrap();
        let other = store
            .insert_or_replace(&sample("/b.png", "h2", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        store
            .update_ocr_result(other, "sale 500 off", OcrStatus::Completed, 0)
            .unwrap();

        let hits = store.substring_search(&["50%".to_string()], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_path, "/a.png");

        // "_" must not act as a single-character wildcard.
        assert!(store
            .substring_search(&["5_%".to_string()], 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn external_ref_lookup_and_bind() {
        let store = IndexStore::open_in_memory().unwrap();
        let id = store
            .insert_or_replace(&sample("/a.png", "h1", "aaaaaaaaaaaaaaaa"))
            .unwrap();
        assert!(store.find_by_external_ref("msg:42").unwrap().is_none());

        store.set_external_ref(id, "msg:42").unwrap();
        let rec = store.find_by_external_ref("msg:42").unwrap().unwrap();
        assert_eq!(rec.id, id);
    }
}
