//! PaddleOCR recognition through the bundled ONNX inference engine.

use paddle_ocr_rs::ocr_lite::OcrLite;
use std::path::{Path, PathBuf};

use super::Recognizer;
use crate::error::{IndexError, Result};

const PADDING: u32 = 50;
const BOX_SCORE_THRESH: f32 = 0.5;
const BOX_THRESH: f32 = 0.3;
const UNCLIP_RATIO: f32 = 1.6;

/// Model file names expected under the configured model directory.
const DET_MODEL: &str = "det.onnx";
const CLS_MODEL: &str = "cls.onnx";
const REC_MODEL: &str = "rec.onnx";

pub struct PaddleRecognizer {
    model_dir: PathBuf,
    engine: Option<OcrLite>,
}

impl PaddleRecognizer {
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        let model_dir = model_dir.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("imgdex")
                .join("models")
        });
        Self {
            model_dir,
            engine: None,
        }
    }
}

impl Recognizer for PaddleRecognizer {
    fn acquire(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }

        let det = self.model_dir.join(DET_MODEL);
        let cls = self.model_dir.join(CLS_MODEL);
        let rec = self.model_dir.join(REC_MODEL);
        for model in [&det, &cls, &rec] {
            if !model.exists() {
                return Err(IndexError::Recognition(format!(
                    "missing OCR model file: {}",
                    model.display()
                )));
            }
        }

        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .clamp(1, 4);

        let mut engine = OcrLite::new();
        engine
            .init_models(
                &det.to_string_lossy(),
                &cls.to_string_lossy(),
                &rec.to_string_lossy(),
                threads,
            )
            .map_err(|e| IndexError::Recognition(format!("paddle init failed: {e}")))?;

        tracing::info!(model_dir = %self.model_dir.display(), "OCR engine acquired");
        self.engine = Some(engine);
        Ok(())
    }

    fn recognize(&mut self, path: &Path) -> Result<Vec<(String, f32)>> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| IndexError::Recognition("engine not acquired".to_string()))?;

        let img = image::open(path)
            .map_err(|e| IndexError::Recognition(format!("decode failed: {e}")))?
            .to_rgb8();

        let max_side_len = img.width().max(img.height()).clamp(1024, 3072);
        let result = engine
            .detect(
                &img,
                PADDING,
                max_side_len,
                BOX_SCORE_THRESH,
                BOX_THRESH,
                UNCLIP_RATIO,
                true,
                false,
            )
            .map_err(|e| IndexError::Recognition(format!("paddle detect failed: {e}")))?;

        Ok(result
            .text_blocks
            .into_iter()
            .map(|block| {
                let confidence = if block.char_scores.is_empty() {
                    0.0
                } else {
                    block.char_scores.iter().sum::<f32>() / block.char_scores.len() as f32
                };
                (block.text, confidence)
            })
            .collect())
    }

    fn release(&mut self) {
        // Dropping the engine frees the detector, classifier and
        // recognizer sessions; the next acquire reloads from disk.
        if self.engine.take().is_some() {
            tracing::info!("OCR engine released");
        }
    }
}
