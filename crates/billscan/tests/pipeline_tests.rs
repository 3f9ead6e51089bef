//! End-to-end tests: intake, background recognition, extraction and export.

mod common;

use std::sync::Arc;
use std::time::Duration;

use billscan::db::{document_repo, job_repo};
use billscan::extraction::PatternRegistry;
use billscan::jobs::{self, lifecycle, JsonExporter, Upload};
use billscan::recognition::{
    LopdfTextLayer, RecognitionMethod, RecognitionOptions, RecognitionStage,
};
use billscan::worker::StageBuilder;
use billscan::{
    BatchProcessor, ExtractionMethod, FieldExtractor, JobEvent, JobEventChannel, JobStatus,
    TaskQueue, WorkerPool,
};

use common::{echo_stage, echo_stage_builder, pdf_with_pages, unit_for, EchoFactory, ScriptedRasterizer, TestEnv};

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

fn drain(rx: &mut tokio::sync::broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_three_documents_report_progress_then_complete() {
    let env = TestEnv::new();
    let events = JobEventChannel::new(16);
    let mut rx = events.subscribe();
    let pool = WorkerPool::new(env.db.clone(), events.clone(), echo_stage_builder(), 2).unwrap();

    let submission = env.submit_images(&[
        "INVOICE # INV-2024-001",
        "Invoice Date: 15/01/2024",
        "Total: $123.45",
    ]);
    let handle = pool.enqueue(unit_for(&submission)).unwrap();
    assert_eq!(handle.document_count, 3);

    let report = pool.recv_report_timeout(REPORT_TIMEOUT).unwrap();
    assert_eq!(report.job_id, submission.job_id);
    let outcome = report.outcome.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.documents_processed, 3);

    let job_id = submission.job_id.as_str();
    assert_eq!(
        drain(&mut rx),
        vec![
            JobEvent::progress(job_id, 1, 3),
            JobEvent::progress(job_id, 2, 3),
            JobEvent::progress(job_id, 3, 3),
            JobEvent::completed(job_id),
        ]
    );

    let job = job_repo::find_by_id(&env.db, job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_documents, 3);
    assert_eq!(job.total_pages, 3);
    assert!(job.error.is_none());

    pool.shutdown();
    pool.wait();
}

#[test]
fn test_failed_document_fails_job_and_stops() {
    let env = TestEnv::new();
    let events = JobEventChannel::new(16);
    let mut rx = events.subscribe();
    let mut processor = BatchProcessor::new(env.db.clone(), events.clone(), echo_stage());

    let submission = env.submit_images(&["Total: 10.00", "FAIL", "Total: 30.00"]);
    let outcome = processor.process(&unit_for(&submission)).unwrap();
    assert_eq!(outcome.status, JobStatus::Failed);

    let job_id = submission.job_id.as_str();
    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&JobEvent::progress(job_id, 1, 3)));
    assert_eq!(
        events.last(),
        Some(&JobEvent::failed(job_id, "OCR failed: unreadable scan"))
    );
    assert!(events.iter().all(|e| *e != JobEvent::completed(job_id)));

    let job = job_repo::find_by_id(&env.db, job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("OCR failed: unreadable scan"));

    let last = document_repo::find_by_id(&env.db, &submission.document_ids[2])
        .unwrap()
        .unwrap();
    assert!(last.ocr_text.is_none());
}

#[test]
fn test_pdf_with_text_layer_uses_native_text() {
    let env = TestEnv::new();
    let mut processor = BatchProcessor::new(env.db.clone(), JobEventChannel::default(), echo_stage());

    let pdf = pdf_with_pages(&[
        "INVOICE # INV-2024-001 issued to Acme Corporation for consulting",
        "Grand Total: 1,620.00 payable within thirty days",
    ]);
    let submission = env.submit(&[Upload::new("invoice.pdf", pdf)]);
    let outcome = processor.process(&unit_for(&submission)).unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.total_pages, 2);

    let doc = document_repo::find_by_id(&env.db, &submission.document_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(doc.ocr_method, Some(RecognitionMethod::Native));
    assert_eq!(doc.ocr_confidence, Some(100.0));
    assert_eq!(doc.page_count, 2);
    let text = doc.ocr_text.unwrap();
    assert!(text.contains("INV-2024-001"));
    assert!(text.contains("1,620.00"));
    assert_eq!(processor.stage().cached_engines(), 0);
}

#[test]
fn test_sparse_pdf_is_rasterized() {
    let env = TestEnv::new();
    let stage = RecognitionStage::new(
        Arc::new(EchoFactory),
        Box::new(LopdfTextLayer),
        Box::new(ScriptedRasterizer { pages: 2 }),
        RecognitionOptions::default(),
    );
    let mut processor = BatchProcessor::new(env.db.clone(), JobEventChannel::default(), stage);

    let submission = env.submit(&[Upload::new("scan.pdf", pdf_with_pages(&["", "p2"]))]);
    let outcome = processor.process(&unit_for(&submission)).unwrap();
    assert!(outcome.succeeded());

    let doc = document_repo::find_by_id(&env.db, &submission.document_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(doc.ocr_method, Some(RecognitionMethod::PdfRaster));
    assert_eq!(doc.page_count, 2);
    assert_eq!(doc.ocr_confidence, Some(85.0));
    assert_eq!(
        doc.ocr_text.as_deref(),
        Some("Total: $11.00 scanned page 1\nTotal: $12.00 scanned page 2")
    );
    assert_eq!(processor.stage().cached_engines(), 1);
}

#[test]
fn test_retry_reprocesses_from_scratch() {
    let env = TestEnv::new();
    let events = JobEventChannel::new(16);
    let builder: StageBuilder = echo_stage_builder();
    let pool = WorkerPool::new(env.db.clone(), events.clone(), builder, 1).unwrap();

    let submission = env.submit_images(&["Total: 10.00", "FAIL"]);
    pool.enqueue(unit_for(&submission)).unwrap();
    let first = pool.recv_report_timeout(REPORT_TIMEOUT).unwrap().outcome.unwrap();
    assert_eq!(first.status, JobStatus::Failed);

    // Replace the failing upload so the retry can succeed.
    let failing = document_repo::find_by_id(&env.db, &submission.document_ids[1])
        .unwrap()
        .unwrap();
    std::fs::write(&failing.stored_path, b"Total: 20.00").unwrap();

    let document_ids = lifecycle::retry(&env.db, &submission.job_id).unwrap();
    assert_eq!(document_ids, submission.document_ids);
    let job = job_repo::find_by_id(&env.db, &submission.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.error.is_none());

    // A second retry of a pending job is rejected.
    assert!(lifecycle::retry(&env.db, &submission.job_id).is_err());

    let mut rx = events.subscribe();
    pool.enqueue(unit_for(&submission)).unwrap();
    let second = pool.recv_report_timeout(REPORT_TIMEOUT).unwrap().outcome.unwrap();
    assert!(second.succeeded());
    assert_eq!(
        drain(&mut rx).last(),
        Some(&JobEvent::completed(&submission.job_id))
    );

    pool.shutdown();
    pool.wait();
}

#[tokio::test]
async fn test_extract_and_export_after_processing() {
    let env = TestEnv::new();
    let mut processor = BatchProcessor::new(env.db.clone(), JobEventChannel::default(), echo_stage());
    let submission = env.submit_images(&["INVOICE # INV-2024-001\nTotal: $123.45", "blank"]);
    assert!(processor.process(&unit_for(&submission)).unwrap().succeeded());

    let extractor = FieldExtractor::new(Arc::new(PatternRegistry::builtin().unwrap()));
    let results = jobs::run_extraction(
        &env.db,
        &extractor,
        &submission.job_id,
        &["total_amount", "invoice_number"],
    )
    .await
    .unwrap();
    assert_eq!(results.len(), 2);

    let first = &results[0].fields;
    assert_eq!(first[0].key, "total_amount");
    assert_eq!(first[0].value.as_deref(), Some("123.45"));
    assert_eq!(first[0].confidence, 95);
    assert_eq!(first[0].method, ExtractionMethod::Regex);
    assert_eq!(first[1].value.as_deref(), Some("INV-2024-001"));

    let second = &results[1].fields;
    assert!(second.iter().all(|f| f.value.is_none() && f.confidence == 0));

    let outcome =
        jobs::export_job(&env.db, &JsonExporter, &env.export_dir, &submission.job_id).unwrap();
    assert_eq!(outcome.document_count, 2);
    assert_eq!(outcome.field_count, 4);
    assert!(outcome.path.starts_with(&env.export_dir));

    let exported: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&outcome.path).unwrap()).unwrap();
    assert_eq!(exported["job_id"], submission.job_id.as_str());
    assert_eq!(exported["documents"][0]["filename"], "scan-1.png");
    assert_eq!(
        exported["documents"][0]["extracted_fields"][0]["value"],
        "123.45"
    );

    let detail = jobs::job_detail(&env.db, extractor.registry(), &submission.job_id).unwrap();
    assert_eq!(detail.exports.len(), 1);
    assert_eq!(detail.documents[0].extractions.len(), 2);
    let detected = &detail.documents[0].detected_fields;
    assert!(detected.contains(&"invoice_number"));
    assert!(detected.contains(&"total_amount"));
    assert!(!detail.documents[1].detected_fields.contains(&"total_amount"));
}

#[tokio::test]
async fn test_extraction_requires_recognized_documents() {
    let env = TestEnv::new();
    let submission = env.submit_images(&["Total: 10.00"]);
    let extractor = FieldExtractor::new(Arc::new(PatternRegistry::builtin().unwrap()));

    let err = jobs::run_extraction(&env.db, &extractor, &submission.job_id, &["total_amount"])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Document 'scan-1.png' not OCR processed yet");
}

#[test]
fn test_delete_removes_uploads_and_rows() {
    let env = TestEnv::new();
    let mut processor = BatchProcessor::new(env.db.clone(), JobEventChannel::default(), echo_stage());
    let submission = env.submit_images(&["Total: 10.00"]);
    processor.process(&unit_for(&submission)).unwrap();

    let stored = document_repo::find_by_id(&env.db, &submission.document_ids[0])
        .unwrap()
        .unwrap()
        .stored_path;
    assert!(std::path::Path::new(&stored).exists());

    lifecycle::delete(&env.db, &submission.job_id).unwrap();
    assert!(!std::path::Path::new(&stored).exists());
    assert!(job_repo::find_by_id(&env.db, &submission.job_id).unwrap().is_none());
    assert!(document_repo::list_for_job(&env.db, &submission.job_id)
        .unwrap()
        .is_empty());
}
