//! Result envelope returned for every transform

use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Serialize, Serializer};

use crate::error::PdfToolsError;

/// A serialized output document
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    pub page_count: u32,
    /// Non-fatal notes for the caller (skipped tokens, size growth, ...)
    pub warnings: Vec<String>,
}

impl PdfOutput {
    pub fn new(bytes: Vec<u8>, page_count: u32) -> Self {
        Self {
            bytes,
            page_count,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub success: bool,
    /// PDF bytes, base64-encoded on the wire
    #[serde(serialize_with = "serialize_base64", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ProcessMetrics>,
    /// Range text a split output was built from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

impl ProcessResult {
    pub fn ok(output: PdfOutput) -> Self {
        Self {
            success: true,
            page_count: Some(output.page_count),
            file_size: Some(output.bytes.len()),
            warnings: output.warnings,
            data: Some(output.bytes),
            error: None,
            metrics: None,
            range: None,
        }
    }

    pub fn err(error: PdfToolsError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            page_count: None,
            file_size: None,
            warnings: Vec::new(),
            metrics: None,
            range: None,
        }
    }

    /// Build the envelope once from an operation outcome, stamping metrics
    /// for successful outputs
    pub fn from_outcome(
        outcome: Result<PdfOutput, PdfToolsError>,
        input_size_bytes: usize,
        started: Instant,
    ) -> Self {
        match outcome {
            Ok(output) => {
                let metrics = ProcessMetrics {
                    input_size_bytes,
                    output_size_bytes: output.bytes.len(),
                    page_count: output.page_count,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                };
                Self {
                    metrics: Some(metrics),
                    ..Self::ok(output)
                }
            }
            Err(e) => Self::err(e),
        }
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

fn serialize_base64<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match data {
        Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        None => serializer.serialize_none(),
    }
}
