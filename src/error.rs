//! Error taxonomy for the index core.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The file is missing, unreadable, or not decodable as an image.
    /// Propagated to the caller; no record is created.
    #[error("feature extraction failed for {path}: {reason}")]
    FeatureExtraction { path: PathBuf, reason: String },

    /// Recognition failed inside the OCR gateway. The batch driver turns
    /// this into a `failed` status transition; it never crosses the facade.
    #[error("recognition failed: {0}")]
    Recognition(String),

    /// Constraint violation on insert (duplicate path). The insert was
    /// rejected; prior state is unchanged.
    #[error("integrity violation: {0}")]
    Integrity(#[source] rusqlite::Error),

    /// Any other persistence failure. The operation was aborted; single
    /// statement commits leave prior state unchanged.
    #[error("store error: {0}")]
    Store(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for IndexError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                IndexError::Integrity(e)
            }
            _ => IndexError::Store(e),
        }
    }
}
