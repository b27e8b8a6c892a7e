//! PDF Split algorithm
//!
//! Every requested range becomes its own document, built from structural
//! copies of the source pages. Ranges are processed in the order given and
//! fail independently.

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::document::{PdfHandle, SaveOptions};
use crate::error::PdfToolsError;
use crate::ranges::PageSpec;
use crate::result::PdfOutput;

/// One output of a split, labelled with the range text that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPart {
    pub label: String,
    pub result: Result<PdfOutput, PdfToolsError>,
}

/// Build a new document holding copies of `pages` (1-indexed, in order)
pub fn extract_pages(
    source: &PdfHandle,
    pages: &[u32],
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    if pages.is_empty() {
        return Err(PdfToolsError::InvalidRange("No pages specified".into()));
    }
    let mut dest = PdfHandle::new_empty();
    dest.import_pages(source, pages, cancel)?;
    dest.finish(SaveOptions::default())
}

/// Split `source` into one document per range in `spec`.
///
/// Invalid ranges yield an error entry at their position; the others still
/// produce output. If no range is valid nothing is built and the whole call
/// fails.
pub fn split_document(
    source: &PdfHandle,
    spec: &PageSpec,
    cancel: &CancelToken,
) -> Result<Vec<SplitPart>, PdfToolsError> {
    let page_count = source.page_count();
    let tokens = spec.resolve(page_count);

    if !tokens.iter().any(|t| t.range.is_ok()) {
        let reasons: Vec<String> = tokens
            .iter()
            .filter_map(|t| t.range.as_ref().err().map(ToString::to_string))
            .collect();
        return Err(PdfToolsError::InvalidRange(if reasons.is_empty() {
            "No valid split ranges were provided".to_string()
        } else {
            format!("No valid split ranges were provided ({})", reasons.join("; "))
        }));
    }

    let mut parts = Vec::with_capacity(tokens.len());
    for token in tokens {
        let result = match token.range {
            Ok(range) => {
                let pages: Vec<u32> = range.pages().collect();
                match extract_pages(source, &pages, cancel) {
                    Err(PdfToolsError::Cancelled) => return Err(PdfToolsError::Cancelled),
                    other => other,
                }
            }
            Err(e) => {
                warn!("Skipping split range {:?}: {}", token.text, e);
                Err(e)
            }
        };
        parts.push(SplitPart {
            label: token.text,
            result,
        });
    }

    info!(
        "Split {} pages into {} parts",
        page_count,
        parts.iter().filter(|p| p.result.is_ok()).count()
    );
    Ok(parts)
}

/// Split into single-page documents, one per page
pub fn split_every_page(
    source: &PdfHandle,
    cancel: &CancelToken,
) -> Result<Vec<SplitPart>, PdfToolsError> {
    let page_count = source.page_count();
    if page_count == 0 {
        return Err(PdfToolsError::InvalidRange(
            "Document has no pages to split".into(),
        ));
    }
    let pages: Vec<u32> = (1..=page_count).collect();
    split_document(source, &PageSpec::from_pages(&pages), cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{all_page_texts, build_numbered_pdf};

    fn load(pages: u32) -> PdfHandle {
        PdfHandle::load(&build_numbered_pdf(pages)).unwrap()
    }

    #[test]
    fn test_extract_empty_pages_fails() {
        let source = load(5);
        let result = extract_pages(&source, &[], &CancelToken::new());
        assert!(matches!(result, Err(PdfToolsError::InvalidRange(_))));
    }

    #[test]
    fn test_split_single_range() {
        let source = load(5);
        let parts = split_document(&source, &PageSpec::parse("2-4"), &CancelToken::new()).unwrap();
        assert_eq!(parts.len(), 1);
        let output = parts[0].result.as_ref().unwrap();
        assert_eq!(output.page_count, 3);
        let texts = all_page_texts(&output.bytes);
        assert!(texts[0].contains("Page 2"));
        assert!(texts[2].contains("Page 4"));
    }

    #[test]
    fn test_split_keeps_range_order() {
        let source = load(10);
        let parts =
            split_document(&source, &PageSpec::parse("8-10, 1-3"), &CancelToken::new()).unwrap();
        assert_eq!(parts[0].label, "8-10");
        assert_eq!(parts[1].label, "1-3");
        let first = all_page_texts(&parts[0].result.as_ref().unwrap().bytes);
        assert!(first[0].contains("Page 8"));
    }

    #[test]
    fn test_split_invalid_range_reported_in_place() {
        let source = load(10);
        let parts = split_document(
            &source,
            &PageSpec::parse("1-3, 20-25, 8-10"),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].result.is_ok());
        assert!(matches!(parts[1].result, Err(PdfToolsError::InvalidRange(_))));
        assert!(parts[2].result.is_ok());
    }

    #[test]
    fn test_split_no_valid_ranges_fails() {
        let source = load(3);
        let result = split_document(&source, &PageSpec::parse("5-9, x"), &CancelToken::new());
        match result {
            Err(PdfToolsError::InvalidRange(msg)) => assert!(msg.contains("No valid split ranges")),
            other => panic!("expected range error, got {:?}", other),
        }
    }

    #[test]
    fn test_split_empty_spec_fails() {
        let source = load(3);
        let result = split_document(&source, &PageSpec::parse(""), &CancelToken::new());
        assert!(matches!(result, Err(PdfToolsError::InvalidRange(_))));
    }

    #[test]
    fn test_split_every_page() {
        let source = load(4);
        let parts = split_every_page(&source, &CancelToken::new()).unwrap();
        assert_eq!(parts.len(), 4);
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.label, (i + 1).to_string());
            assert_eq!(part.result.as_ref().unwrap().page_count, 1);
        }
    }

    #[test]
    fn test_split_cancellation_aborts_everything() {
        let source = load(4);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = split_document(&source, &PageSpec::parse("1-2, 3-4"), &cancel);
        assert_eq!(result, Err(PdfToolsError::Cancelled));
    }
}
