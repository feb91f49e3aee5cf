use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use super::document::{Document, DocumentKind};
use crate::utils::content_guard::{detect_binary, BinaryDetection};
use crate::utils::pdf::{extract_pages_from_pdf_mem, is_pdf};
use crate::utils::text_decode::decode_to_utf8;

/// Largest file accepted for ingestion (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const HEAD_BYTES: usize = 512;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Cannot read \"{name}\": {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("File \"{0}\" exceeds 10MB limit")]
    TooLarge(String),

    #[error("File \"{0}\" already exists")]
    Duplicate(String),

    #[error("Unsupported file type: {0}. Only PDF and TXT files are supported.")]
    Unsupported(String),

    #[error("Error decoding text file \"{name}\": {reason}")]
    Decode { name: String, reason: String },

    #[error("Error processing PDF \"{0}\": encrypted PDFs are not supported")]
    PdfEncrypted(String),

    #[error("Error processing PDF \"{name}\": {reason}")]
    Pdf { name: String, reason: String },
}

impl IngestError {
    /// Stable machine-readable code, used in tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Io { .. } => "ERR_INGEST_IO",
            IngestError::TooLarge(_) => "ERR_INGEST_TOO_LARGE",
            IngestError::Duplicate(_) => "ERR_INGEST_DUPLICATE",
            IngestError::Unsupported(_) => "ERR_INGEST_UNSUPPORTED",
            IngestError::Decode { .. } => "ERR_INGEST_DECODE",
            IngestError::PdfEncrypted(_) => "ERR_INGEST_PDF_ENCRYPTED",
            IngestError::Pdf { .. } => "ERR_INGEST_PDF_PARSE",
        }
    }
}

/// Display name for a path: its final component, or the whole path as a fallback.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads a file from disk and turns it into a [`Document`].
pub fn ingest_file(path: &Path) -> Result<Document, IngestError> {
    let name = file_name(path);
    let io_err = |source| IngestError::Io {
        name: name.clone(),
        source,
    };

    let size = fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_FILE_SIZE {
        warn!(target: "ingest", name = %name, size = size, limit = MAX_FILE_SIZE, "File too large; refusing");
        return Err(IngestError::TooLarge(name));
    }

    let bytes = fs::read(path).map_err(io_err)?;
    ingest_bytes(name, &bytes)
}

/// Turns raw file contents into a [`Document`], choosing the extractor from name and magic bytes.
pub fn ingest_bytes(name: String, bytes: &[u8]) -> Result<Document, IngestError> {
    let size = bytes.len() as u64;
    if size > MAX_FILE_SIZE {
        return Err(IngestError::TooLarge(name));
    }

    let head = &bytes[..bytes.len().min(HEAD_BYTES)];
    if is_pdf(&name, head) {
        return ingest_pdf(name, bytes);
    }

    let is_txt = name.to_ascii_lowercase().ends_with(".txt");
    match detect_binary(head) {
        BinaryDetection::Binary { format } => {
            info!(target: "ingest", name = %name, format = format.unwrap_or("unknown"), "Binary content detected; refusing");
            Err(IngestError::Unsupported(name))
        }
        BinaryDetection::Text if is_txt => ingest_text(name, bytes),
        BinaryDetection::Text => Err(IngestError::Unsupported(name)),
    }
}

fn ingest_text(name: String, bytes: &[u8]) -> Result<Document, IngestError> {
    let content = decode_to_utf8(bytes).map_err(|e| IngestError::Decode {
        name: name.clone(),
        reason: e.to_string(),
    })?;
    info!(target: "ingest", name = %name, size = bytes.len(), "Text file ingested");
    Ok(Document::new(
        name,
        DocumentKind::Txt,
        content,
        bytes.len() as u64,
        1,
    ))
}

fn ingest_pdf(name: String, bytes: &[u8]) -> Result<Document, IngestError> {
    info!(target: "ingest", name = %name, size = bytes.len(), "Starting PDF text extraction");
    let started = std::time::Instant::now();

    match extract_pages_from_pdf_mem(bytes) {
        Ok(text) => {
            info!(
                target: "ingest",
                name = %name,
                pages = text.page_count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "PDF extraction succeeded"
            );
            Ok(Document::new(
                name,
                DocumentKind::Pdf,
                text.full_text(),
                bytes.len() as u64,
                text.page_count(),
            ))
        }
        Err(err) => {
            let reason = format!("{:#}", err);
            let lowered = reason.to_ascii_lowercase();
            warn!(target: "ingest", name = %name, "PDF extraction failed: {}", reason);
            if lowered.contains("encrypt") || lowered.contains("password") {
                Err(IngestError::PdfEncrypted(name))
            } else {
                Err(IngestError::Pdf { name, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_file_becomes_single_page_document() {
        let doc = ingest_bytes("notes.txt".to_string(), b"Hello there.").unwrap();
        assert_eq!(doc.kind, DocumentKind::Txt);
        assert_eq!(doc.content, "Hello there.");
        assert_eq!(doc.size, 12);
        assert_eq!(doc.pages, 1);
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(ingest_bytes("NOTES.TXT".to_string(), b"abc").is_ok());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = ingest_bytes("image.docx".to_string(), b"plain").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported file type: image.docx. Only PDF and TXT files are supported."
        );
    }

    #[test]
    fn binary_behind_txt_name_is_unsupported() {
        let err = ingest_bytes("fake.txt".to_string(), &[0x50, 0x4B, 0x03, 0x04, 1, 2]).unwrap_err();
        assert!(matches!(err, IngestError::Unsupported(_)));
    }

    #[test]
    fn oversized_content_is_rejected() {
        let bytes = vec![b'a'; MAX_FILE_SIZE as usize + 1];
        let err = ingest_bytes("big.txt".to_string(), &bytes).unwrap_err();
        assert_eq!(err.to_string(), "File \"big.txt\" exceeds 10MB limit");
        assert_eq!(err.code(), "ERR_INGEST_TOO_LARGE");
    }

    #[test]
    fn broken_pdf_reports_parse_error() {
        let err = ingest_bytes("broken.pdf".to_string(), b"%PDF-1.4\ngarbage").unwrap_err();
        assert!(matches!(
            err,
            IngestError::Pdf { .. } | IngestError::PdfEncrypted(_)
        ));
    }

    #[test]
    fn reads_from_disk_using_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("guide.txt");
        std::fs::write(&path, "A short guide. It has sentences.").unwrap();
        let doc = ingest_file(&path).unwrap();
        assert_eq!(doc.name, "guide.txt");
        assert_eq!(doc.size, 32);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ingest_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
