//! In-core OCR job scheduler.
//!
//! Drives pending and retryable records through the OCR gateway in
//! bounded batches. The store lock is released before recognition runs;
//! the single batch driver contract keeps re-processing races out.

use std::path::Path;

use super::OcrGateway;
use crate::error::Result;
use crate::store::{IndexStore, OcrStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchStats {
    fn absorb(&mut self, other: BatchStats) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    fn is_idle(&self) -> bool {
        self.processed == 0 && self.skipped == 0
    }
}

/// Run one bounded OCR batch. Returns without acquiring the engine when
/// the queue is empty; releases the engine before returning otherwise.
/// Only engine acquisition failure is fatal; a bad record never aborts
/// the batch.
pub fn run_batch(
    store: &IndexStore,
    gateway: &OcrGateway,
    batch_size: usize,
    max_retries: u32,
) -> Result<BatchStats> {
    let stats = run_batch_inner(store, gateway, batch_size, max_retries);
    gateway.release();
    stats
}

/// Loop batches until a claim round comes back empty, releasing the
/// engine once at the end so each round reuses the loaded models.
pub fn run_until_drained(
    store: &IndexStore,
    gateway: &OcrGateway,
    batch_size: usize,
    max_retries: u32,
) -> Result<BatchStats> {
    let mut total = BatchStats::default();
    loop {
        let round = match run_batch_inner(store, gateway, batch_size, max_retries) {
            Ok(stats) => stats,
            Err(e) => {
                gateway.release();
                return Err(e);
            }
        };
        let idle = round.is_idle();
        total.absorb(round);
        if idle {
            break;
        }
    }
    gateway.release();
    Ok(total)
}

fn run_batch_inner(
    store: &IndexStore,
    gateway: &OcrGateway,
    batch_size: usize,
    max_retries: u32,
) -> Result<BatchStats> {
    let mut stats = BatchStats::default();

    let claimed = store.claim_pending_ocr(batch_size, max_retries)?;
    if claimed.is_empty() {
        tracing::debug!("no records pending OCR");
        return Ok(stats);
    }

    gateway.acquire()?;
    tracing::info!(count = claimed.len(), "processing OCR batch");

    for (id, file_path) in claimed {
        let path = Path::new(&file_path);

        if !path.exists() {
            tracing::warn!(path = %file_path, "file missing, marking record skipped");
            if let Err(e) = store.mark_skipped(id) {
                tracing::error!(id, error = %e, "failed to mark record skipped");
            }
            stats.skipped += 1;
            continue;
        }

        stats.processed += 1;

        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if file_size == 0 {
            tracing::warn!(path = %file_path, "file is empty, marking record skipped");
            if let Err(e) = store.mark_skipped(id) {
                tracing::error!(id, error = %e, "failed to mark record skipped");
            }
            stats.skipped += 1;
            continue;
        }

        match gateway.recognize(path) {
            Ok(text) => {
                if let Err(e) = store.update_ocr_result(id, &text, OcrStatus::Completed, 0) {
                    tracing::error!(id, error = %e, "failed to store OCR result");
                    stats.failed += 1;
                } else {
                    tracing::info!(path = %file_path, chars = text.chars().count(), "OCR completed");
                    stats.succeeded += 1;
                }
            }
            Err(e) => {
                tracing::error!(path = %file_path, error = %e, "recognition failed");
                if let Err(e) = store.increment_fail_count(id) {
                    tracing::error!(id, error = %e, "failed to record OCR failure");
                }
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
