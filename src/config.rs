use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Folder the transport layer downloads new images into.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    /// PaddleOCR models through the bundled inference engine.
    #[default]
    Paddle,
    /// macOS Shortcuts automation observed through the clipboard.
    Shortcuts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub backend: OcrBackend,

    /// Directory holding the det/cls/rec ONNX models for the paddle backend.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Name of the macOS Shortcut invoked by the shortcuts backend.
    #[serde(default = "default_shortcut_name")]
    pub shortcut_name: String,

    /// How long the shortcuts backend waits for the clipboard to change.
    #[serde(default = "default_clipboard_timeout_secs")]
    pub clipboard_timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_shortcut_name() -> String {
    "Extract Text".to_string()
}

fn default_clipboard_timeout_secs() -> u64 {
    10
}

fn default_batch_size() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::default(),
            model_dir: None,
            shortcut_name: default_shortcut_name(),
            clipboard_timeout_secs: default_clipboard_timeout_secs(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum hamming distance (in bits) for two phashes to count as similar.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: u32,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_similarity_threshold() -> u32 {
    5
}

fn default_max_results() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_results: default_max_results(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imgdex")
        .join("imgdex.db")
}

fn default_download_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imgdex")
        .join("downloads")
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "bmp".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            download_dir: default_download_dir(),
            ocr: OcrConfig::default(),
            search: SearchConfig::default(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(config_path)
        } else {
            // First run: write the defaults so the user has a file to edit.
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load from an explicit path. A missing file yields the defaults
    /// without writing anything.
    pub fn load_from(config_path: PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("imgdex")
            .join("config.toml")
    }
}
