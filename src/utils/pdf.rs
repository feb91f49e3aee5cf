// Minimal PDF utilities used by document ingestion.
// Always keep this module small and dependency-light.

use anyhow::Context;

/// Text of a PDF split by page, as returned by `pdf-extract`.
#[derive(Debug, Clone)]
pub struct PdfText {
    pub pages: Vec<String>,
}

impl PdfText {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Joins the pages, terminating every page with a newline.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(page);
            out.push('\n');
        }
        out
    }
}

/// Extracts per-page text from a PDF stored fully in memory.
/// This is a thin wrapper over the `pdf-extract` crate API.
pub fn extract_pages_from_pdf_mem(bytes: &[u8]) -> anyhow::Result<PdfText> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .context("failed to extract text from PDF bytes using pdf-extract")?;
    Ok(PdfText { pages })
}

/// Returns true if the file name or head indicates a PDF file.
/// - Extension: .pdf (case-insensitive)
/// - Magic bytes: %PDF-
pub fn is_pdf(file_name: &str, head: &[u8]) -> bool {
    file_name.to_ascii_lowercase().ends_with(".pdf") || head.starts_with(b"%PDF-")
}
