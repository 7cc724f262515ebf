//! OCR gateway: pluggable text recognition behind one contract.
//!
//! The engine is expensive to initialize, so it is acquired lazily and
//! released explicitly after a batch; release drops the underlying
//! model sessions so reacquisition reloads from scratch.

pub mod batch;
#[cfg(feature = "paddle")]
mod paddle;
#[cfg(target_os = "macos")]
mod shortcuts;

#[cfg(feature = "paddle")]
pub use paddle::PaddleRecognizer;
#[cfg(target_os = "macos")]
pub use shortcuts::ShortcutsRecognizer;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::config::{OcrBackend, OcrConfig};
use crate::error::{IndexError, Result};
use crate::text;

/// Fragments below this confidence are treated as recognition noise.
pub const CONFIDENCE_THRESHOLD: f32 = 0.6;

/// A text recognition strategy. Fragments come back with per-fragment
/// confidence; filtering and cleanup happen in the gateway.
pub trait Recognizer: Send {
    /// Bring the engine up. Idempotent; a second call on a live engine
    /// is a no-op. Failure here is fatal to the batch.
    fn acquire(&mut self) -> Result<()>;

    /// Recognize text fragments in one image.
    fn recognize(&mut self, path: &Path) -> Result<Vec<(String, f32)>>;

    /// Tear the engine down, dropping its sub-components. Safe to call
    /// repeatedly or without a prior acquire.
    fn release(&mut self);
}

/// Stand-in for a backend that was not compiled into this build or is
/// unavailable on this platform. Acquisition always fails.
struct UnavailableRecognizer {
    reason: String,
}

impl Recognizer for UnavailableRecognizer {
    fn acquire(&mut self) -> Result<()> {
        Err(IndexError::Recognition(self.reason.clone()))
    }

    fn recognize(&mut self, _path: &Path) -> Result<Vec<(String, f32)>> {
        Err(IndexError::Recognition(self.reason.clone()))
    }

    fn release(&mut self) {}
}

pub struct OcrGateway {
    recognizer: Mutex<Box<dyn Recognizer>>,
}

impl OcrGateway {
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            recognizer: Mutex::new(recognizer),
        }
    }

    /// Build the gateway for the configured backend. Backends that are
    /// compiled out or platform-gated still construct; their
    /// unavailability surfaces as an acquisition failure at batch time.
    pub fn from_config(config: &OcrConfig) -> Self {
        match config.backend {
            OcrBackend::Paddle => {
                #[cfg(feature = "paddle")]
                {
                    Self::new(Box::new(PaddleRecognizer::new(config.model_dir.clone())))
                }
                #[cfg(not(feature = "paddle"))]
                {
                    Self::new(Box::new(UnavailableRecognizer {
                        reason: "paddle backend not compiled in (enable the `paddle` feature)"
                            .to_string(),
                    }))
                }
            }
            OcrBackend::Shortcuts => {
                #[cfg(target_os = "macos")]
                {
                    Self::new(Box::new(ShortcutsRecognizer::new(
                        config.shortcut_name.clone(),
                        std::time::Duration::from_secs(config.clipboard_timeout_secs),
                    )))
                }
                #[cfg(not(target_os = "macos"))]
                {
                    Self::new(Box::new(UnavailableRecognizer {
                        reason: "shortcuts backend is only available on macOS".to_string(),
                    }))
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Recognizer>> {
        match self.recognizer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn acquire(&self) -> Result<()> {
        self.lock().acquire()
    }

    pub fn release(&self) {
        self.lock().release()
    }

    /// Recognize and normalize the text of one image: low-confidence
    /// fragments are discarded, survivors joined with single spaces and
    /// cleaned. An empty result is a valid outcome, not an error.
    pub fn recognize(&self, path: &Path) -> Result<String> {
        let fragments = self.lock().recognize(path)?;

        let joined = fragments
            .into_iter()
            .filter(|(t, score)| !t.trim().is_empty() && *score >= CONFIDENCE_THRESHOLD)
            .map(|(t, _)| t.trim().to_string())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(text::clean(&joined))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted recognizer for exercising the gateway and batch driver.
    pub(crate) struct FakeRecognizer {
        pub outputs: Vec<Result<Vec<(String, f32)>>>,
        pub acquires: usize,
        pub releases: usize,
        pub fail_acquire: bool,
    }

    impl FakeRecognizer {
        pub fn with_outputs(outputs: Vec<Result<Vec<(String, f32)>>>) -> Self {
            Self {
                outputs,
                acquires: 0,
                releases: 0,
                fail_acquire: false,
            }
        }
    }

    impl Recognizer for FakeRecognizer {
        fn acquire(&mut self) -> Result<()> {
            if self.fail_acquire {
                return Err(IndexError::Recognition("engine unavailable".to_string()));
            }
            self.acquires += 1;
            Ok(())
        }

        fn recognize(&mut self, _path: &Path) -> Result<Vec<(String, f32)>> {
            if self.outputs.is_empty() {
                return Ok(Vec::new());
            }
            self.outputs.remove(0)
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeRecognizer;
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn gateway_filters_low_confidence_and_cleans() {
        let fake = FakeRecognizer::with_outputs(vec![Ok(vec![
            ("你好，世界！".to_string(), 0.95),
            ("noise".to_string(), 0.2),
            ("  second\tline ".to_string(), 0.8),
        ])]);
        let gateway = OcrGateway::new(Box::new(fake));

        let text = gateway.recognize(&PathBuf::from("/any.png")).unwrap();
        assert_eq!(text, "你好 世界 second line");
    }

    #[test]
    fn gateway_passes_empty_results_through() {
        let fake = FakeRecognizer::with_outputs(vec![Ok(vec![])]);
        let gateway = OcrGateway::new(Box::new(fake));
        assert_eq!(gateway.recognize(&PathBuf::from("/any.png")).unwrap(), "");
    }

    #[test]
    fn unavailable_backend_fails_acquisition() {
        let gateway = OcrGateway::new(Box::new(UnavailableRecognizer {
            reason: "not here".to_string(),
        }));
        assert!(gateway.acquire().is_err());
    }
}
