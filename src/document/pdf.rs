/// Per-page text extraction from PDF contracts via `lopdf`.
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{AuditError, Result};

/// Extract raw text for every page, in page order.
///
/// A page whose text cannot be decoded yields an empty string rather than
/// failing the whole document, so page numbering stays aligned.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| AuditError::Input(format!("unreadable PDF {}: {e}", path.display())))?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(AuditError::Input(format!(
            "PDF has no pages: {}",
            path.display()
        )));
    }

    let mut texts = Vec::with_capacity(pages.len());
    for &page_num in pages.keys() {
        match doc.extract_text(&[page_num]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!("Failed to extract text from page {page_num}: {e}");
                texts.push(String::new());
            }
        }
    }

    debug!("Extracted {} pages from {}", texts.len(), path.display());
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_not_a_pdf() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        write!(file, "plain text pretending to be a PDF").unwrap();
        let err = extract_pages(file.path()).unwrap_err();
        assert!(matches!(err, AuditError::Input(_)));
    }
}
