//! Shared fixtures for billscan integration tests.
//!
//! Recognition runs against scripted engines and rasterizers so tests do
//! not need Tesseract or poppler installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use billscan::error::{ExtractionError, ProcessError};
use billscan::extraction::language_model::ModelValues;
use billscan::extraction::{FieldDefinition, LanguageModelExtractor};
use billscan::jobs::{self, Submission, Upload};
use billscan::recognition::{
    BoundingBox, EngineFactory, LopdfTextLayer, PageRasterizer, RecognitionEngine,
    RecognitionOptions, RecognitionStage, TextRegion,
};
use billscan::worker::{StageBuilder, WorkUnit};
use billscan::Database;

/// Echoes image bytes back as one region; bytes starting with `FAIL` error.
pub struct EchoEngine;

impl RecognitionEngine for EchoEngine {
    fn recognize(&mut self, image: &[u8]) -> Result<Vec<TextRegion>, ProcessError> {
        if image.starts_with(b"FAIL") {
            return Err(ProcessError::OcrFailed("unreadable scan".to_string()));
        }
        Ok(vec![TextRegion {
            text: String::from_utf8_lossy(image).into_owned(),
            confidence: 0.85,
            bbox: BoundingBox {
                x: 0,
                y: 0,
                width: 100,
                height: 20,
            },
        }])
    }
}

pub struct EchoFactory;

impl EngineFactory for EchoFactory {
    fn create(&self, _languages: &str) -> Result<Box<dyn RecognitionEngine>, ProcessError> {
        Ok(Box::new(EchoEngine))
    }
}

/// Renders page `n` as the bytes `scanned page n`.
pub struct ScriptedRasterizer {
    pub pages: usize,
}

impl PageRasterizer for ScriptedRasterizer {
    fn page_count(&self, _pdf: &[u8]) -> Result<usize, ProcessError> {
        Ok(self.pages)
    }

    fn render_page(&self, _pdf: &[u8], page: u32, _dpi: u32) -> Result<Vec<u8>, ProcessError> {
        Ok(format!("Total: $1{}.00 scanned page {}", page, page).into_bytes())
    }
}

pub fn echo_stage() -> RecognitionStage {
    RecognitionStage::new(
        Arc::new(EchoFactory),
        Box::new(LopdfTextLayer),
        Box::new(ScriptedRasterizer { pages: 1 }),
        RecognitionOptions::default(),
    )
}

pub fn echo_stage_builder() -> StageBuilder {
    Arc::new(echo_stage)
}

/// Language model double that returns fixed values or a fixed error.
pub struct FakeModel {
    pub values: Option<ModelValues>,
    pub calls: AtomicUsize,
}

impl FakeModel {
    pub fn answering(pairs: &[(&str, Option<&str>)]) -> Arc<Self> {
        Arc::new(Self {
            values: Some(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            values: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModelExtractor for FakeModel {
    async fn extract_fields(
        &self,
        _text: &str,
        _fields: &[&'static FieldDefinition],
    ) -> Result<ModelValues, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.values
            .clone()
            .ok_or_else(|| ExtractionError::Request("connection refused".to_string()))
    }
}

/// Isolated database and upload directory.
pub struct TestEnv {
    _temp_dir: TempDir,
    pub db: Database,
    pub upload_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let export_dir = temp_dir.path().join("exports");
        let db = Database::open(&temp_dir.path().join("billscan.db"))
            .expect("Failed to open database");
        Self {
            _temp_dir: temp_dir,
            db,
            upload_dir,
            export_dir,
        }
    }

    pub fn submit(&self, uploads: &[Upload]) -> Submission {
        jobs::submit(&self.db, &self.upload_dir, uploads).expect("Failed to submit uploads")
    }

    /// Submits one image per entry; the echo engine reads back its content.
    pub fn submit_images(&self, contents: &[&str]) -> Submission {
        let uploads: Vec<Upload> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| Upload::new(format!("scan-{}.png", i + 1), c.as_bytes().to_vec()))
            .collect();
        self.submit(&uploads)
    }
}

pub fn unit_for(submission: &Submission) -> WorkUnit {
    WorkUnit::new(
        submission.job_id.clone(),
        submission.document_ids.clone(),
        vec!["eng".to_string()],
    )
}

/// Builds a PDF with one Courier text page per entry of `pages`.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text)
        };
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}
