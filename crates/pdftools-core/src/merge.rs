//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use tracing::info;

use crate::cancel::CancelToken;
use crate::document::{PdfHandle, SaveOptions};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

/// Merge PDF byte streams into one document
///
/// The algorithm:
/// 1. If empty, return error
/// 2. Load every input before building anything; one bad input fails the
///    whole merge and no partial output is produced
/// 3. Create an empty destination document
/// 4. Structurally copy every page of every input, in input order
/// 5. Compress and return the merged result
pub fn merge_documents(
    documents: &[Vec<u8>],
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    if documents.is_empty() {
        return Err(PdfToolsError::Validation("No documents to merge".into()));
    }

    let mut loaded = Vec::with_capacity(documents.len());
    for (i, bytes) in documents.iter().enumerate() {
        cancel.checkpoint()?;
        let handle = PdfHandle::load(bytes).map_err(|e| match e {
            PdfToolsError::ParseError(msg) => {
                PdfToolsError::ParseError(format!("Failed to load document {}: {}", i + 1, msg))
            }
            PdfToolsError::Unsupported(msg) => {
                PdfToolsError::Unsupported(format!("Document {}: {}", i + 1, msg))
            }
            other => other,
        })?;
        loaded.push(handle);
    }

    merge_handles(&loaded, cancel)
}

/// Append every page of `sources`, in order, to a fresh document
pub fn merge_handles(
    sources: &[PdfHandle],
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    if sources.is_empty() {
        return Err(PdfToolsError::Validation("No documents to merge".into()));
    }

    let mut dest = PdfHandle::new_empty();
    for source in sources {
        let pages: Vec<u32> = (1..=source.page_count()).collect();
        dest.import_pages(source, &pages, cancel)?;
    }

    info!(
        "Merged {} documents into {} pages",
        sources.len(),
        dest.page_count()
    );
    dest.finish(SaveOptions::default())
}
