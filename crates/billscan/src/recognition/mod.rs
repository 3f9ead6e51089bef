//! Text recognition: native PDF text layer first, image OCR as fallback.

pub mod engine;
pub mod pdf;
pub mod tesseract;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};

use crate::config::OcrConfig;
use crate::error::ProcessError;
use crate::sanitize::redact_path;

pub use engine::{language_key, EngineCache, EngineFactory, RecognitionEngine};
pub use pdf::{LopdfTextLayer, PageRasterizer, PopplerRasterizer, TextLayerReader};
pub use tesseract::{TesseractEngine, TesseractFactory};

/// How a document's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    /// Embedded PDF text layer.
    Native,
    /// PDF pages rendered to images and recognized.
    PdfRaster,
    /// Image file recognized directly.
    Image,
}

impl RecognitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionMethod::Native => "native",
            RecognitionMethod::PdfRaster => "pdf_raster",
            RecognitionMethod::Image => "image",
        }
    }
}

impl fmt::Display for RecognitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for RecognitionMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RecognitionMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "native" => Ok(RecognitionMethod::Native),
            "pdf_raster" => Ok(RecognitionMethod::PdfRaster),
            "image" => Ok(RecognitionMethod::Image),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Pixel rectangle of a recognized region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    /// Engine confidence in `0.0..=1.0`.
    pub confidence: f64,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    pub text: String,
    /// Confidence in `0.0..=100.0`, one decimal.
    pub confidence: f64,
    pub method: RecognitionMethod,
    pub regions: Vec<TextRegion>,
    pub page_count: u32,
    pub word_count: usize,
}

impl RecognitionResult {
    fn native(pages: &[String]) -> Self {
        let text = pages.join("\n");
        Self {
            word_count: text.split_whitespace().count(),
            text,
            confidence: 100.0,
            method: RecognitionMethod::Native,
            regions: Vec::new(),
            page_count: pages.len() as u32,
        }
    }

    fn from_regions(regions: Vec<TextRegion>, method: RecognitionMethod, page_count: u32) -> Self {
        let text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            word_count: text.split_whitespace().count(),
            text,
            confidence: mean_confidence(&regions),
            method,
            regions,
            page_count,
        }
    }
}

/// Mean region confidence scaled to a percentage, rounded to one decimal.
/// No regions means zero.
pub fn mean_confidence(regions: &[TextRegion]) -> f64 {
    if regions.is_empty() {
        return 0.0;
    }
    let mean = regions.iter().map(|r| r.confidence).sum::<f64>() / regions.len() as f64;
    (mean * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" | "jpg" | "jpeg" | "bmp" | "tiff" | "tif" | "webp" => Some(DocumentKind::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecognitionOptions {
    pub dpi: u32,
    /// Native text with at most this many characters counts as scanned.
    pub native_text_min_chars: usize,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            dpi: 300,
            native_text_min_chars: 50,
        }
    }
}

/// Turns one document into text, deciding between the native text layer
/// and the recognition engine.
///
/// Owns its engine cache, so each worker thread builds its own stage.
pub struct RecognitionStage {
    cache: EngineCache,
    text_layer: Box<dyn TextLayerReader>,
    rasterizer: Box<dyn PageRasterizer>,
    options: RecognitionOptions,
}

impl RecognitionStage {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        text_layer: Box<dyn TextLayerReader>,
        rasterizer: Box<dyn PageRasterizer>,
        options: RecognitionOptions,
    ) -> Self {
        Self {
            cache: EngineCache::new(factory),
            text_layer,
            rasterizer,
            options,
        }
    }

    /// Tesseract, lopdf and poppler with settings from the OCR config.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            Arc::new(TesseractFactory),
            Box::new(LopdfTextLayer),
            Box::new(PopplerRasterizer),
            RecognitionOptions {
                dpi: config.dpi,
                native_text_min_chars: config.native_text_min_chars,
            },
        )
    }

    pub fn cached_engines(&self) -> usize {
        self.cache.len()
    }

    pub fn recognize(
        &mut self,
        path: &Path,
        languages: &[String],
    ) -> Result<RecognitionResult, ProcessError> {
        let _span = info_span!("recognition.recognize", file = %redact_path(path)).entered();

        if !path.is_file() {
            return Err(ProcessError::FileNotFound(path.to_path_buf()));
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let kind = DocumentKind::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let result = match kind {
            DocumentKind::Pdf => self.recognize_pdf(&bytes, languages)?,
            DocumentKind::Image => {
                let engine = self.cache.engine_for(languages)?;
                let regions = engine.recognize(&bytes)?;
                RecognitionResult::from_regions(regions, RecognitionMethod::Image, 1)
            }
        };

        debug!(
            method = %result.method,
            confidence = result.confidence,
            pages = result.page_count,
            words = result.word_count,
            "Recognition finished"
        );
        Ok(result)
    }

    fn recognize_pdf(
        &mut self,
        pdf: &[u8],
        languages: &[String],
    ) -> Result<RecognitionResult, ProcessError> {
        let known_pages = match self.text_layer.read_pages(pdf) {
            Ok(pages) => {
                let chars = pages.iter().map(|p| p.trim().chars().count()).sum::<usize>();
                if chars > self.options.native_text_min_chars {
                    return Ok(RecognitionResult::native(&pages));
                }
                debug!(chars, "Text layer too sparse, rasterizing");
                Some(pages.len())
            }
            Err(e) => {
                warn!("Text layer unreadable: {}. Rasterizing pages.", e);
                None
            }
        };

        let page_count = match known_pages {
            Some(n) if n > 0 => n,
            _ => self.rasterizer.page_count(pdf)?,
        };

        let _span = info_span!("recognition.rasterize", pages = page_count).entered();
        let engine = self.cache.engine_for(languages)?;
        let mut regions = Vec::new();
        for page in 1..=page_count as u32 {
            let image = self.rasterizer.render_page(pdf, page, self.options.dpi)?;
            regions.extend(engine.recognize(&image)?);
        }

        Ok(RecognitionResult::from_regions(
            regions,
            RecognitionMethod::PdfRaster,
            page_count as u32,
        ))
    }
}
