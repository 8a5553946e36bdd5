//! Text extraction by file kind.
//!
//! Only plain text and PDF are in scope. Anything else returns an explicit
//! unsupported-type error so batch ingestion can report it per file and
//! keep going.

use crate::error::PipelineError;

/// Extract plain UTF-8 text from document bytes, dispatching on the file
/// extension of `name`.
pub fn extract_text(name: &str, bytes: &[u8]) -> Result<String, PipelineError> {
    match extension(name).as_deref() {
        Some("txt") => String::from_utf8(bytes.to_vec()).map_err(|e| PipelineError::Extraction {
            name: name.to_string(),
            reason: format!("not valid UTF-8: {e}"),
        }),
        Some("pdf") => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| PipelineError::Extraction {
                name: name.to_string(),
                reason: e.to_string(),
            })
        }
        _ => Err(PipelineError::UnsupportedDocumentType(name.to_string())),
    }
}

fn extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
