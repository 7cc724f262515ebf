//! Record types owned by the index store.

use std::fmt;
use std::str::FromStr;

/// Per-record OCR processing state.
///
/// `completed` and `skipped` are terminal under automatic processing;
/// only manual overrides move a record out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrStatus::Pending => "pending",
            OcrStatus::Completed => "completed",
            OcrStatus::Failed => "failed",
            OcrStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OcrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OcrStatus::Pending),
            "completed" => Ok(OcrStatus::Completed),
            "failed" => Ok(OcrStatus::Failed),
            "skipped" => Ok(OcrStatus::Skipped),
            other => Err(format!("unknown ocr status: {other}")),
        }
    }
}

/// One row of the images table.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: i64,
    pub file_path: String,
    pub content_hash: Option<String>,
    pub perceptual_hash: Option<String>,
    pub ocr_text: String,
    pub external_ref: String,
    pub updated_at: String,
    pub ocr_status: OcrStatus,
    pub ocr_fail_count: u32,
}

/// New record data for insert-or-replace; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub file_path: &'a str,
    pub content_hash: &'a str,
    pub perceptual_hash: &'a str,
    pub external_ref: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OcrStatus::Pending,
            OcrStatus::Completed,
            OcrStatus::Failed,
            OcrStatus::Skipped,
        ] {
            assert_eq!(status.as_str().parse::<OcrStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("bogus".parse::<OcrStatus>().is_err());
    }
}
