//! Facade the transport layer talks to.
//!
//! Owns the store and the OCR gateway; every public operation is safe to
//! call from multiple threads. OCR batches are single-driver by
//! contract: callers must not run two batches concurrently.

use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Result;
use crate::hashing;
use crate::ocr::batch::{self, BatchStats};
use crate::ocr::OcrGateway;
use crate::search::{self, SearchMode, SimilarMatch};
use crate::store::{ImageRecord, IndexStore, NewRecord, TextHit};
use crate::text;

/// How a manual-override call identifies its target record.
#[derive(Debug, Clone)]
pub enum RecordSelector {
    ExternalRef(String),
    ContentHash(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderStats {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ImageIndex {
    store: IndexStore,
    gateway: OcrGateway,
    config: Config,
}

impl ImageIndex {
    pub fn open(config: Config) -> Result<Self> {
        let store = IndexStore::open(&config.db_path)?;
        let gateway = OcrGateway::from_config(&config.ocr);
        Ok(Self {
            store,
            gateway,
            config,
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory(config: Config, gateway: OcrGateway) -> Result<Self> {
        Ok(Self {
            store: IndexStore::open_in_memory()?,
            gateway,
            config,
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    /// Index one new image: compute fingerprints and insert the record
    /// with OCR pending. Upserts by path. Returns the record id.
    pub fn add_image(&self, path: &Path, external_ref: &str) -> Result<i64> {
        let fingerprints = hashing::extract_fingerprints(path)?;
        let id = self.store.insert_or_replace(&NewRecord {
            file_path: &path.to_string_lossy(),
            content_hash: &fingerprints.content_hash,
            perceptual_hash: &fingerprints.perceptual_hash,
            external_ref,
        })?;
        tracing::info!(path = %path.display(), id, external_ref, "indexed image, OCR pending");
        Ok(id)
    }

    /// Walk a folder and index every image file not yet known by path.
    /// One bad file never aborts the walk.
    pub fn index_folder(&self, dir: &Path) -> Result<FolderStats> {
        let mut stats = FolderStats::default();

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !self.is_image_file(entry.path()) {
                continue;
            }
            let path_str = entry.path().to_string_lossy().into_owned();
            if self.store.find_by_path(&path_str)?.is_some() {
                stats.skipped += 1;
                continue;
            }
            match self.add_image(entry.path(), "") {
                Ok(_) => stats.indexed += 1,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unindexable file");
                    stats.failed += 1;
                }
            }
        }

        tracing::info!(?stats, dir = %dir.display(), "folder indexing finished");
        Ok(stats)
    }

    fn is_image_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.config.image_extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }

    // ========================================================================
    // OCR pipeline
    // ========================================================================

    pub fn run_ocr_batch(&self, batch_size: usize, max_retries: u32) -> Result<BatchStats> {
        batch::run_batch(&self.store, &self.gateway, batch_size, max_retries)
    }

    pub fn run_ocr_until_drained(&self, batch_size: usize, max_retries: u32) -> Result<BatchStats> {
        batch::run_until_drained(&self.store, &self.gateway, batch_size, max_retries)
    }

    pub fn pending_ocr_count(&self) -> Result<i64> {
        self.store.pending_count()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn find_similar(
        &self,
        query_path: &Path,
        threshold: u32,
        max_results: usize,
    ) -> Result<Vec<SimilarMatch>> {
        search::find_similar(&self.store, query_path, threshold, max_results)
    }

    pub fn search_by_text(
        &self,
        keywords: &str,
        max_results: usize,
        mode: SearchMode,
    ) -> Result<Vec<TextHit>> {
        search::search_by_text(&self.store, keywords, max_results, mode)
    }

    // ========================================================================
    // Manual overrides and maintenance
    // ========================================================================

    fn resolve(&self, selector: &RecordSelector) -> Result<Option<ImageRecord>> {
        match selector {
            RecordSelector::ExternalRef(r) => self.store.find_by_external_ref(r),
            RecordSelector::ContentHash(h) => self.store.find_by_content_hash(h),
        }
    }

    /// Operator-supplied OCR text: cleans it, marks the record completed
    /// and resets its fail count. Returns false when no record matches.
    pub fn set_ocr_text(&self, selector: &RecordSelector, raw_text: &str) -> Result<bool> {
        match self.resolve(selector)? {
            Some(record) => {
                self.store.set_ocr_text(record.id, &text::clean(raw_text))?;
                tracing::info!(id = record.id, "manual OCR text set");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Operator cleared the OCR result: record goes back to pending.
    pub fn clear_ocr(&self, selector: &RecordSelector) -> Result<bool> {
        match self.resolve(selector)? {
            Some(record) => {
                self.store.clear_ocr(record.id)?;
                tracing::info!(id = record.id, "OCR result cleared, record re-queued");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bind an external reference to a record after the fact.
    pub fn bind_external_ref(&self, content_hash: &str, external_ref: &str) -> Result<bool> {
        match self.store.find_by_content_hash(content_hash)? {
            Some(record) => {
                self.store.set_external_ref(record.id, external_ref)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bulk path remap after the transport layer relocated files.
    pub fn rewrite_paths(&self, mappings: &[(String, String)]) -> Result<usize> {
        self.store.rewrite_paths(mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::FakeRecognizer;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn test_index() -> ImageIndex {
        let gateway = OcrGateway::new(Box::new(FakeRecognizer::with_outputs(vec![])));
        ImageIndex::open_in_memory(Config::default(), gateway).unwrap()
    }

    fn write_png(dir: &TempDir, name: &str, seed: u8) -> std::path::PathBuf {
        let mut img = RgbImage::new(24, 24);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([x as u8 ^ seed, y as u8, seed]);
        }
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn add_image_creates_pending_record() {
        let dir = TempDir::new().unwrap();
        let index = test_index();
        let path = write_png(&dir, "a.png", 1);

        let id = index.add_image(&path, "msg:7").unwrap();
        let rec = index.store().get(id).unwrap().unwrap();
        assert_eq!(rec.external_ref, "msg:7");
        assert_eq!(rec.ocr_text, "");
        assert_eq!(index.pending_ocr_count().unwrap(), 1);
    }

    #[test]
    fn add_image_rejects_unreadable_files() {
        let index = test_index();
        assert!(index.add_image(Path::new("/no/such.png"), "").is_err());
        assert_eq!(index.store().record_count().unwrap(), 0);
    }

    #[test]
    fn index_folder_filters_and_survives_bad_files() {
        let dir = TempDir::new().unwrap();
        let index = test_index();
        write_png(&dir, "a.png", 1);
        write_png(&dir, "b.jpg", 2);
        std::fs::write(dir.path().join("corrupt.png"), b"not an image").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let stats = index.index_folder(dir.path()).unwrap();
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(index.store().record_count().unwrap(), 2);

        // Second walk skips the already-indexed files.
        let stats = index.index_folder(dir.path()).unwrap();
        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn manual_override_round_trip() {
        let dir = TempDir::new().unwrap();
        let index = test_index();
        let path = write_png(&dir, "a.png", 3);
        let id = index.add_image(&path, "msg:1").unwrap();

        let selector = RecordSelector::ExternalRef("msg:1".to_string());
        assert!(index.set_ocr_text(&selector, "  手写，修正！ text  ").unwrap());
        let rec = index.store().get(id).unwrap().unwrap();
        assert_eq!(rec.ocr_text, "手写 修正 text");
        assert_eq!(rec.ocr_status, crate::store::OcrStatus::Completed);

        assert!(index.clear_ocr(&selector).unwrap());
        let rec = index.store().get(id).unwrap().unwrap();
        assert_eq!(rec.ocr_status, crate::store::OcrStatus::Pending);

        let missing = RecordSelector::ContentHash("nope".to_string());
        assert!(!index.set_ocr_text(&missing, "x").unwrap());
    }

    #[test]
    fn bind_external_ref_by_content_hash() {
        let dir = TempDir::new().unwrap();
        let index = test_index();
        let path = write_png(&dir, "a.png", 4);
        let id = index.add_image(&path, "").unwrap();
        let hash = index
            .store()
            .get(id)
            .unwrap()
            .unwrap()
            .content_hash
            .unwrap();

        assert!(index.bind_external_ref(&hash, "msg:99").unwrap());
        assert_eq!(
            index
                .store()
                .find_by_external_ref("msg:99")
                .unwrap()
                .unwrap()
                .id,
            id
        );
        assert!(!index.bind_external_ref("unknown", "msg:1").unwrap());
    }
}
