//! macOS Shortcuts recognition strategy.
//!
//! Runs a user-installed Shortcut that performs system text recognition
//! on the given image and copies the result to the clipboard. Completion
//! is observed as a clipboard change within a bounded timeout; a timeout
//! is an empty result, not an error.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use super::Recognizer;
use crate::error::{IndexError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ShortcutsRecognizer {
    shortcut_name: String,
    timeout: Duration,
}

impl ShortcutsRecognizer {
    pub fn new(shortcut_name: String, timeout: Duration) -> Self {
        Self {
            shortcut_name,
            timeout,
        }
    }

    fn read_clipboard() -> Result<String> {
        let output = Command::new("pbpaste")
            .output()
            .map_err(|e| IndexError::Recognition(format!("pbpaste failed: {e}")))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Recognizer for ShortcutsRecognizer {
    fn acquire(&mut self) -> Result<()> {
        // Nothing stays resident; just verify the automation capability
        // and the configured shortcut exist.
        let output = Command::new("shortcuts")
            .arg("list")
            .output()
            .map_err(|e| IndexError::Recognition(format!("shortcuts unavailable: {e}")))?;
        if !output.status.success() {
            return Err(IndexError::Recognition(
                "shortcuts list exited with an error".to_string(),
            ));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        if !listing.lines().any(|l| l.trim() == self.shortcut_name) {
            return Err(IndexError::Recognition(format!(
                "shortcut {:?} is not installed",
                self.shortcut_name
            )));
        }
        Ok(())
    }

    fn recognize(&mut self, path: &Path) -> Result<Vec<(String, f32)>> {
        let before = Self::read_clipboard()?;

        let status = Command::new("shortcuts")
            .arg("run")
            .arg(&self.shortcut_name)
            .arg("-i")
            .arg(path)
            .status()
            .map_err(|e| IndexError::Recognition(format!("shortcut run failed: {e}")))?;
        if !status.success() {
            return Err(IndexError::Recognition(format!(
                "shortcut {:?} exited with {status}",
                self.shortcut_name
            )));
        }

        let deadline = Instant::now() + self.timeout;
        while Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);
            let current = Self::read_clipboard()?;
            if current != before {
                // Shortcut output carries no per-fragment confidence;
                // treat the whole result as one confident fragment.
                return Ok(vec![(current, 1.0)]);
            }
        }

        tracing::warn!(
            path = %path.display(),
            timeout_secs = self.timeout.as_secs(),
            "clipboard did not change; treating as empty recognition result"
        );
        Ok(Vec::new())
    }

    fn release(&mut self) {}
}
