use std::io::Cursor;

use leptess::LepTess;

use super::engine::{EngineFactory, RecognitionEngine};
use super::{BoundingBox, TextRegion};
use crate::error::ProcessError;

/// Tesseract-backed engine recognizing text line by line.
pub struct TesseractEngine {
    lt: LepTess,
    languages: String,
}

impl TesseractEngine {
    pub fn new(languages: &str) -> Result<Self, ProcessError> {
        let lt = LepTess::new(None, languages).map_err(|e| {
            ProcessError::OcrFailed(format!(
                "Failed to initialize Tesseract with '{}': {}",
                languages, e
            ))
        })?;

        Ok(Self {
            lt,
            languages: languages.to_string(),
        })
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl RecognitionEngine for TesseractEngine {
    fn recognize(&mut self, image: &[u8]) -> Result<Vec<TextRegion>, ProcessError> {
        let _span = tracing::info_span!("recognition.tesseract", languages = %self.languages)
            .entered();

        let png = normalize_to_png(image)?;

        self.lt
            .set_image_from_mem(&png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        // None means the page has no text at all.
        let boxes = match self
            .lt
            .get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_TEXTLINE, true)
        {
            Some(boxes) => boxes,
            None => return Ok(Vec::new()),
        };

        let mut regions = Vec::new();
        for bbox in &boxes {
            let geom = bbox.get_geometry();
            self.lt.set_rectangle(geom.x, geom.y, geom.w, geom.h);

            let text = self
                .lt
                .get_utf8_text()
                .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let confidence = f64::from(self.lt.mean_text_conf().max(0)) / 100.0;
            regions.push(TextRegion {
                text: text.to_string(),
                confidence,
                bbox: BoundingBox {
                    x: geom.x,
                    y: geom.y,
                    width: geom.w,
                    height: geom.h,
                },
            });
        }

        tracing::debug!(regions = regions.len(), "Recognized text regions");
        Ok(regions)
    }
}

/// Creates one [`TesseractEngine`] per language key.
#[derive(Debug, Default, Clone, Copy)]
pub struct TesseractFactory;

impl EngineFactory for TesseractFactory {
    fn create(&self, languages: &str) -> Result<Box<dyn RecognitionEngine>, ProcessError> {
        Ok(Box::new(TesseractEngine::new(languages)?))
    }
}

/// Decodes any supported raster format and re-encodes it as PNG for leptonica.
fn normalize_to_png(image: &[u8]) -> Result<Vec<u8>, ProcessError> {
    let img = image::load_from_memory(image)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to convert image: {}", e)))?;

    Ok(png.into_inner())
}
