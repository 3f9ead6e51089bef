use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::ProcessError;

/// Reads the embedded text layer of a PDF, one entry per page.
pub trait TextLayerReader: Send + Sync {
    fn read_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ProcessError>;
}

/// Renders PDF pages into encoded raster images.
pub trait PageRasterizer: Send + Sync {
    /// Number of pages, for PDFs whose structure the text reader rejected.
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ProcessError>;

    /// Renders the 1-based `page` at `dpi` and returns PNG bytes.
    fn render_page(&self, pdf: &[u8], page: u32, dpi: u32) -> Result<Vec<u8>, ProcessError>;
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text layer reader backed by lopdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextLayer;

impl TextLayerReader for LopdfTextLayer {
    fn read_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ProcessError> {
        let doc = lopdf::Document::load_mem(pdf)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let pages = doc
            .get_pages()
            .into_keys()
            .map(|page_num| match doc.extract_text(&[page_num]) {
                Ok(text) => text.replace(IDENTITY_H_PATTERN, ""),
                Err(e) => {
                    debug!("No text layer on page {}: {}", page_num, e);
                    String::new()
                }
            })
            .collect();

        Ok(pages)
    }
}

/// Rasterizer shelling out to poppler-utils (`pdfinfo`, `pdftoppm`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PopplerRasterizer;

impl PageRasterizer for PopplerRasterizer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize, ProcessError> {
        let scratch = ScratchPdf::write(pdf, "pagecount")?;

        let output = Command::new("pdfinfo")
            .arg(scratch.path())
            .output()
            .map_err(|e| {
                ProcessError::PdfProcessing(format!(
                    "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ProcessError::PdfProcessing(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)))
    }

    fn render_page(&self, pdf: &[u8], page: u32, dpi: u32) -> Result<Vec<u8>, ProcessError> {
        let scratch = ScratchPdf::write(pdf, "render")?;
        let output_prefix =
            std::env::temp_dir().join(format!("billscan_page_{}", uuid::Uuid::new_v4()));

        let output = Command::new("pdftoppm")
            .arg("-png")
            .args(["-r", &dpi.to_string()])
            .args(["-f", &page.to_string(), "-l", &page.to_string()])
            .arg(scratch.path())
            .arg(&output_prefix)
            .output()
            .map_err(|e| {
                ProcessError::PdfProcessing(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ProcessError::PdfProcessing(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // pdftoppm zero-pads the page suffix depending on the page count.
        let prefix = output_prefix.display();
        let image_path = [
            format!("{}-{}.png", prefix, page),
            format!("{}-{:02}.png", prefix, page),
            format!("{}-{:03}.png", prefix, page),
        ]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            ProcessError::PdfProcessing(format!("Failed to find rendered image for page {}", page))
        })?;

        let image = std::fs::read(&image_path).map_err(|e| {
            ProcessError::PdfProcessing(format!("Failed to read rendered image: {}", e))
        });
        let _ = std::fs::remove_file(&image_path);
        image
    }
}

/// Extracts `Pages:` from pdfinfo output, defaulting to one page.
fn parse_page_count(pdfinfo_output: &str) -> usize {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
        .unwrap_or(1)
}

/// A PDF copied to the temp dir for external tools; removed on drop.
struct ScratchPdf {
    path: PathBuf,
}

impl ScratchPdf {
    fn write(pdf: &[u8], purpose: &str) -> Result<Self, ProcessError> {
        let path = std::env::temp_dir().join(format!(
            "billscan_{}_{}.pdf",
            purpose,
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, pdf)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchPdf {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupted_pdf_error() {
        match LopdfTextLayer.read_pages(b"not a valid pdf content") {
            Err(ProcessError::PdfProcessing(msg)) => assert!(msg.contains("Failed to load PDF")),
            other => panic!("Expected PdfProcessing error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_page_count() {
        let output = "Producer: test\nPages:          7\nEncrypted: no\n";
        assert_eq!(parse_page_count(output), 7);
        assert_eq!(parse_page_count("Producer: test\n"), 1);
        assert_eq!(parse_page_count("Pages: many\n"), 1);
    }

    #[test]
    fn test_scratch_pdf_is_removed_on_drop() {
        let path = {
            let scratch = ScratchPdf::write(b"%PDF-1.5", "test").unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
