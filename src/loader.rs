//! Turns uploaded bytes into a [`Document`].
//!
//! `.pdf` files go through `pdf-extract`; everything else must be UTF-8
//! text. The upload name becomes the document identifier unchanged.

use rag_harness_core::error::IngestionError;
use rag_harness_core::models::Document;

fn is_pdf(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

pub fn load_document(name: &str, bytes: &[u8]) -> Result<Document, IngestionError> {
    let load_err = |reason: String| IngestionError::Load {
        name: name.to_string(),
        reason,
    };

    let text = if is_pdf(name) {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| load_err(format!("PDF extraction failed: {}", e)))?
    } else {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| load_err(format!("not valid UTF-8: {}", e)))?
    };

    Ok(Document::new(name, text))
}
