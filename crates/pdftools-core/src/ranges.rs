//! Page range parsing for split, rotate and other page selections
//!
//! Ranges are 1-indexed and inclusive, written like "1-3, 5, 8-10".
//!
//! Tokens are handled the same way at every call site:
//! - empty tokens ("1,,3", trailing commas) are skipped
//! - malformed tokens ("abc", "3-", "1-2-3") are reported per token and never
//!   abort their siblings
//! - bounds are checked against the page count of the document being
//!   processed; whether an out-of-bounds token is an error or silently
//!   dropped is decided by the operation ([`PageSpec::resolve`] vs
//!   [`PageSpec::select`])
//!
//! Ranges are never sorted or de-duplicated: order is preserved because it
//! decides the order of split outputs.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::PdfToolsError;

/// An inclusive, 1-based page range checked against a page count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    /// Validate `1 <= start <= end <= page_count`
    pub fn new(start: u32, end: u32, page_count: u32) -> Result<Self, PdfToolsError> {
        if start < 1 {
            return Err(PdfToolsError::InvalidRange(format!(
                "{}-{}: page numbers start at 1",
                start, end
            )));
        }
        if start > end {
            return Err(PdfToolsError::InvalidRange(format!(
                "{}-{}: start {} > end {}",
                start, end, start, end
            )));
        }
        if end > page_count {
            return Err(PdfToolsError::InvalidRange(format!(
                "{}-{}: page {} does not exist (document has {} pages)",
                start, end, end, page_count
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of pages covered; never zero
    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }

    /// The 1-based page numbers covered by this range
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One comma-separated token after bounds checking
#[derive(Debug, Clone, PartialEq)]
pub struct RangeToken {
    pub text: String,
    pub range: Result<PageRange, PdfToolsError>,
}

/// Result of [`parse_ranges`]: valid ranges in input order plus one message
/// per rejected token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRanges {
    pub ranges: Vec<PageRange>,
    pub errors: Vec<String>,
}

/// Pages picked by [`PageSpec::select`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSelection {
    pub pages: Vec<u32>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SpecToken {
    Range { text: String, start: u32, end: u32 },
    Malformed(String),
}

/// A syntactically parsed page specification, not yet bound to a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSpec {
    tokens: Vec<SpecToken>,
}

impl PageSpec {
    pub fn parse(input: &str) -> Self {
        let tokens = input
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_token)
            .collect();
        Self { tokens }
    }

    /// Build a spec listing individual pages
    pub fn from_pages(pages: &[u32]) -> Self {
        let tokens = pages
            .iter()
            .map(|&page| SpecToken::Range {
                text: page.to_string(),
                start: page,
                end: page,
            })
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Bounds-check every token; out-of-bounds ranges become errors
    pub fn resolve(&self, page_count: u32) -> Vec<RangeToken> {
        self.tokens
            .iter()
            .map(|token| match token {
                SpecToken::Range { text, start, end } => RangeToken {
                    text: text.clone(),
                    range: PageRange::new(*start, *end, page_count),
                },
                SpecToken::Malformed(text) => RangeToken {
                    text: text.clone(),
                    range: Err(PdfToolsError::InvalidRange(format!(
                        "Invalid page number: {}",
                        text
                    ))),
                },
            })
            .collect()
    }

    /// Expand into individual page numbers, silently dropping any outside
    /// `1..=page_count`. Malformed tokens are still reported.
    pub fn select(&self, page_count: u32) -> PageSelection {
        let mut selection = PageSelection::default();
        for token in &self.tokens {
            match token {
                SpecToken::Range { start, end, .. } => {
                    let first = (*start).max(1);
                    let last = (*end).min(page_count);
                    selection.pages.extend(first..=last);
                }
                SpecToken::Malformed(text) => selection
                    .errors
                    .push(format!("Invalid page number: {}", text)),
            }
        }
        selection
    }
}

impl FromStr for PageSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<'de> Deserialize<'de> for PageSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Pages(Vec<u32>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => PageSpec::parse(&text),
            Raw::Pages(pages) => PageSpec::from_pages(&pages),
        })
    }
}

fn parse_token(part: &str) -> SpecToken {
    let malformed = || SpecToken::Malformed(part.to_string());

    if let Some((start, end)) = part.split_once('-') {
        match (start.trim().parse::<u32>(), end.trim().parse::<u32>()) {
            (Ok(start), Ok(end)) => SpecToken::Range {
                text: part.to_string(),
                start,
                end,
            },
            _ => malformed(),
        }
    } else {
        match part.parse::<u32>() {
            Ok(page) => SpecToken::Range {
                text: part.to_string(),
                start: page,
                end: page,
            },
            Err(_) => malformed(),
        }
    }
}

/// Parse a range string like "1,3,5-7" against a document's page count
pub fn parse_ranges(input: &str, page_count: u32) -> ParsedRanges {
    let mut parsed = ParsedRanges::default();
    for token in PageSpec::parse(input).resolve(page_count) {
        match token.range {
            Ok(range) => parsed.ranges.push(range),
            Err(e) => parsed.errors.push(e.to_string()),
        }
    }
    parsed
}
