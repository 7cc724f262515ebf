pub mod config;
pub mod error;
pub mod hashing;
pub mod index;
pub mod logging;
pub mod ocr;
pub mod search;
pub mod store;
pub mod text;

pub use config::Config;
pub use error::{IndexError, Result};
pub use index::{ImageIndex, RecordSelector};
pub use search::{SearchMode, SimilarMatch};
pub use store::{ImageRecord, OcrStatus, TextHit};
