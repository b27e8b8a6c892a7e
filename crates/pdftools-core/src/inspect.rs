//! Analyze, repair and metadata inspection

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::Serialize;
use tracing::{info, warn};

use crate::document::{PdfHandle, SaveOptions};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

/// Page count above which processing is expected to be slow
pub const LARGE_PAGE_COUNT: u32 = 1000;
/// File size above which a document is flagged as large
pub const LARGE_FILE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// True when no blocking issue was found
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    pub issues: Vec<String>,
    pub fixed_issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Load the document and report heuristic findings.
///
/// Never fails: a document that does not decode is itself a finding.
pub fn analyze(bytes: &[u8]) -> AnalysisReport {
    let mut report = AnalysisReport::default();

    let handle = match PdfHandle::load(bytes) {
        Ok(handle) => handle,
        Err(PdfToolsError::Unsupported(_)) => {
            report
                .issues
                .push("PDF is encrypted and cannot be inspected".into());
            return report;
        }
        Err(e) => {
            warn!("Analyze could not load document: {}", e);
            report
                .issues
                .push("PDF appears to be corrupted or unreadable".into());
            return report;
        }
    };

    let page_count = handle.page_count();
    report.page_count = Some(page_count);
    if page_count == 0 {
        report.issues.push("PDF contains no pages".into());
    }
    report.warnings = scale_warnings(page_count, bytes.len());

    report.success = report.issues.is_empty();
    info!(
        "Analyzed {} pages: {} issues, {} warnings",
        page_count,
        report.issues.len(),
        report.warnings.len()
    );
    report
}

/// Warnings for documents big enough to be slow; both limits are exclusive
fn scale_warnings(page_count: u32, byte_len: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    if page_count > LARGE_PAGE_COUNT {
        warnings.push("Large PDF with many pages may process slowly".to_string());
    }
    if byte_len > LARGE_FILE_BYTES {
        warnings.push("Large file size detected".to_string());
    }
    warnings
}

/// Load and re-save the document, dropping unreachable objects.
///
/// Success is binary: either the loader accepts the bytes and a normalized
/// document comes back, or the call fails. Nothing is salvaged from bytes the
/// loader rejects.
pub fn repair(bytes: &[u8]) -> Result<PdfOutput, PdfToolsError> {
    let handle = PdfHandle::load(bytes)?;
    handle.finish(SaveOptions {
        compress_streams: true,
        prune: true,
        strip_metadata: false,
        renumber: true,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfo {
    pub page_count: u32,
    pub file_size: usize,
    pub version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
}

pub fn pdf_info(bytes: &[u8]) -> Result<PdfInfo, PdfToolsError> {
    let handle = PdfHandle::load(bytes)?;
    let meta = handle.info();
    Ok(PdfInfo {
        page_count: handle.page_count(),
        file_size: bytes.len(),
        version: handle.version().to_string(),
        title: meta.title,
        author: meta.author,
        subject: meta.subject,
        keywords: meta.keywords,
        creator: meta.creator,
        producer: meta.producer,
        creation_date: meta.creation_date.as_deref().and_then(parse_pdf_date),
        modification_date: meta.modification_date.as_deref().and_then(parse_pdf_date),
    })
}

/// Parse a PDF date string such as `D:20240315093000+01'00'`.
///
/// Everything after the year is optional; a missing offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, zone) = s.split_at(digits_end);
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[..4].parse().ok()?;
    let month = field(4, 1)?;
    let day = field(6, 1)?;
    let hour = field(8, 0)?;
    let minute = field(10, 0)?;
    let second = field(12, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = parse_offset(zone)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let mut chars = zone.chars();
    let sign = match chars.next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };
    let rest: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = rest.get(0..2)?.parse().ok()?;
    let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_numbered_pdf, build_pdf_with_info};
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_analyze_healthy_document() {
        let report = analyze(&build_numbered_pdf(2));
        assert!(report.success);
        assert_eq!(report.page_count, Some(2));
        assert!(report.issues.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_analyze_corrupted_document() {
        let report = analyze(b"definitely not a pdf");
        assert!(!report.success);
        assert_eq!(
            report.issues,
            vec!["PDF appears to be corrupted or unreadable".to_string()]
        );
    }

    #[test]
    fn test_analyze_zero_pages() {
        let empty = PdfHandle::new_empty().save(SaveOptions::default()).unwrap();
        let report = analyze(&empty);
        assert!(!report.success);
        assert_eq!(report.issues, vec!["PDF contains no pages".to_string()]);
    }

    #[test]
    fn test_analyze_warns_above_page_threshold() {
        let report = analyze(&build_numbered_pdf(LARGE_PAGE_COUNT + 1));
        assert!(report.success);
        assert_eq!(report.page_count, Some(1001));
        assert_eq!(
            report.warnings,
            vec!["Large PDF with many pages may process slowly".to_string()]
        );
    }

    #[test]
    fn test_analyze_at_page_threshold_is_quiet() {
        let report = analyze(&build_numbered_pdf(LARGE_PAGE_COUNT));
        assert!(report.success);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_scale_warnings_file_size_boundary() {
        assert!(scale_warnings(1, LARGE_FILE_BYTES).is_empty());
        assert_eq!(
            scale_warnings(1, LARGE_FILE_BYTES + 1),
            vec!["Large file size detected".to_string()]
        );
        assert_eq!(scale_warnings(LARGE_PAGE_COUNT + 1, LARGE_FILE_BYTES + 1).len(), 2);
    }

    #[test]
    fn test_repair_round_trips() {
        let output = repair(&build_numbered_pdf(3)).unwrap();
        assert_eq!(output.page_count, 3);
        assert!(PdfHandle::load(&output.bytes).is_ok());
    }

    #[test]
    fn test_repair_fails_on_garbage() {
        assert!(matches!(repair(b"junk"), Err(PdfToolsError::ParseError(_))));
    }

    #[test]
    fn test_pdf_info_fields() {
        let bytes = build_pdf_with_info("Annual Report", "Zoë");
        let info = pdf_info(&bytes).unwrap();
        assert_eq!(info.page_count, 1);
        assert_eq!(info.file_size, bytes.len());
        assert_eq!(info.title.as_deref(), Some("Annual Report"));
        assert_eq!(info.author.as_deref(), Some("Zoë"));
        let created = info.creation_date.unwrap();
        assert_eq!(created.year(), 2024);
        assert_eq!(created.hour(), 9);
        assert_eq!(created.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_parse_pdf_date_variants() {
        let full = parse_pdf_date("D:20231231235959-05'30'").unwrap();
        assert_eq!(full.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(full.second(), 59);

        let year_only = parse_pdf_date("D:2020").unwrap();
        assert_eq!((year_only.month(), year_only.day()), (1, 1));

        let utc = parse_pdf_date("20200102030405Z").unwrap();
        assert_eq!(utc.offset().local_minus_utc(), 0);

        assert!(parse_pdf_date("D:20").is_none());
        assert!(parse_pdf_date("D:20231345").is_none());
        assert!(parse_pdf_date("yesterday").is_none());
    }
}
