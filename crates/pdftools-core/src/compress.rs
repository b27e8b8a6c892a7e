//! Lossless structural compression
//!
//! No image is ever re-encoded; the levels only differ in how much structure
//! is rewritten on save.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{PdfHandle, SaveOptions};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Flate-compress uncompressed streams
    Low,
    /// Also drop unreachable objects and empty streams
    #[default]
    Medium,
    /// Also strip document metadata and renumber objects
    High,
}

impl CompressionLevel {
    pub fn save_options(self) -> SaveOptions {
        match self {
            CompressionLevel::Low => SaveOptions {
                compress_streams: true,
                prune: false,
                strip_metadata: false,
                renumber: false,
            },
            CompressionLevel::Medium => SaveOptions {
                compress_streams: true,
                prune: true,
                strip_metadata: false,
                renumber: false,
            },
            CompressionLevel::High => SaveOptions {
                compress_streams: true,
                prune: true,
                strip_metadata: true,
                renumber: true,
            },
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "" | "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(PdfToolsError::Validation(format!(
                "Unknown compression level: {} (expected low, medium or high)",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// Re-save `handle` with the space-saving options of `level`.
///
/// The output can come out larger than `input_size` for documents that were
/// already compact; that is reported as a warning, not an error.
pub fn compress_document(
    handle: PdfHandle,
    level: CompressionLevel,
    input_size: usize,
) -> Result<PdfOutput, PdfToolsError> {
    let output = handle.finish(level.save_options())?;
    let output_size = output.bytes.len();

    info!(
        "Compressed ({}) {} -> {} bytes",
        level, input_size, output_size
    );

    if output_size > input_size {
        warn!("Compression grew the document by {} bytes", output_size - input_size);
        let note = format!(
            "Compressed output ({} bytes) is larger than the input ({} bytes); the document was already compact",
            output_size, input_size
        );
        return Ok(output.with_warnings([note]));
    }
    Ok(output)
}
