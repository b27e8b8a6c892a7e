//! PDF page-transform engine
//!
//! Loads documents with lopdf and applies page-level transforms: merge,
//! split, compress, rotate, watermark, page numbering, organize, annotate,
//! plus analyze/repair/info inspection. Every transform is a function over a
//! [`PdfHandle`] and a typed options struct; [`command::execute`] dispatches
//! the closed [`PdfCommand`] set.

pub mod annotate;
pub mod cancel;
pub mod command;
pub mod compress;
pub mod document;
pub mod draw;
pub mod error;
pub mod inspect;
pub mod merge;
pub mod organize;
pub mod page_numbers;
pub mod ranges;
pub mod result;
pub mod rotate;
pub mod split;
pub mod watermark;

#[cfg(test)]
mod testing;

pub use annotate::{annotate_pages, Annotation, AnnotationKind, PageAnnotations};
pub use cancel::CancelToken;
pub use command::{execute, CommandOutput, PdfCommand};
pub use compress::{compress_document, CompressionLevel};
pub use document::{PageBox, PdfHandle, SaveOptions};
pub use draw::{to_document_space, Color};
pub use error::PdfToolsError;
pub use inspect::{analyze, pdf_info, repair, AnalysisReport, PdfInfo};
pub use merge::merge_documents;
pub use organize::{organize_pages, OrganizeAction, OrganizeOperation};
pub use page_numbers::{add_page_numbers, PageNumberOptions, Position};
pub use ranges::{parse_ranges, PageRange, PageSpec, ParsedRanges};
pub use result::{PdfOutput, ProcessMetrics, ProcessResult};
pub use rotate::{rotate_pages, RotateOptions};
pub use split::{extract_pages, split_document, split_every_page, SplitPart};
pub use watermark::{add_watermark, WatermarkOptions};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfToolsError> {
    Ok(PdfHandle::load(bytes)?.page_count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_page_count() {
        let pdf = testing::build_numbered_pdf(3);
        assert_eq!(get_page_count(&pdf).unwrap(), 3);
    }

    #[test]
    fn test_get_page_count_rejects_garbage() {
        assert!(matches!(
            get_page_count(b"nope"),
            Err(PdfToolsError::ParseError(_))
        ));
    }
}
