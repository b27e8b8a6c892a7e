//! Multipart form decoding and form-to-command mapping
//!
//! Uploads are checked (type, magic bytes, size) while the form is read, so a
//! rejected file never reaches the engine and no file is buffered past the
//! per-file limit. Field names follow the route handler: `operation`,
//! `files`/`file`, `splitOption` with `pageNumbers`/`ranges`, `rotation`,
//! `watermarkText`, `opacity`, `fontSize`, `color`, `position`, `operations`,
//! `annotations`, `level` and `password`. The tool pages' own names are
//! accepted too: `rotationAngle`, `pageRange` with `specificPages`, and
//! `compressionLevel`.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::multipart::{Field, Multipart};
use pdftools_core::{
    Color, CompressionLevel, OrganizeOperation, PageAnnotations, PageNumberOptions, PageSpec,
    PdfCommand, Position, RotateOptions, WatermarkOptions,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ServerError;
use crate::state::UploadLimits;

/// How far into a file the `%PDF-` header may start
const HEADER_SEARCH_WINDOW: usize = 1024;

/// A decoded form: text fields plus uploaded files in submission order
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<Vec<u8>>,
}

impl UploadForm {
    pub async fn from_multipart(
        mut multipart: Multipart,
        limits: &UploadLimits,
    ) -> Result<Self, ServerError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::InvalidRequest(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "files" || name == "file" {
                if form.files.len() >= limits.max_files {
                    return Err(ServerError::InvalidRequest(format!(
                        "Too many files. Maximum {} per request.",
                        limits.max_files
                    )));
                }

                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                check_declared_type(&file_name, content_type.as_deref())?;

                let bytes = read_limited(field, limits.max_file_bytes).await?;
                check_upload(&file_name, content_type.as_deref(), &bytes, limits)?;
                debug!("Accepted upload {} ({} bytes)", file_name, bytes.len());
                form.files.push(bytes);
            } else {
                let value = field.text().await.map_err(|e| {
                    ServerError::InvalidRequest(format!("Failed to read field {}: {}", name, e))
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Use `operation` when the form itself names none
    pub fn with_fallback_operation(mut self, operation: Option<&str>) -> Self {
        if self.text("operation").is_none() {
            if let Some(operation) = operation.map(str::trim).filter(|o| !o.is_empty()) {
                self.fields
                    .insert("operation".to_string(), operation.to_string());
            }
        }
        self
    }

    /// Non-empty, trimmed text field
    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First non-empty field among `names`, with the name it came from
    fn first_text<'a>(&'a self, names: &[&'a str]) -> Option<(&'a str, &'a str)> {
        names
            .iter()
            .find_map(|name| self.text(name).map(|value| (*name, value)))
    }

    /// Parse the first present field among `names`, or fall back to `default`
    fn parse_or<T: FromStr>(&self, names: &[&str], default: T) -> Result<T, ServerError> {
        match self.first_text(names) {
            Some((name, raw)) => raw
                .parse()
                .map_err(|_| ServerError::InvalidRequest(format!("Invalid {}: {}", name, raw))),
            None => Ok(default),
        }
    }

    fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T, ServerError> {
        let raw = self
            .text(name)
            .ok_or_else(|| ServerError::InvalidRequest(format!("{} is required", name)))?;
        serde_json::from_str(raw)
            .map_err(|e| ServerError::InvalidRequest(format!("Invalid {}: {}", name, e)))
    }

    fn page_spec(&self) -> Option<PageSpec> {
        self.first_text(&["ranges", "pageNumbers", "pages"])
            .map(|(_, raw)| PageSpec::parse(raw))
    }

    /// Ranges for a split: `splitOption` picks the field, `all` means every page
    fn split_ranges(&self) -> Result<Option<PageSpec>, ServerError> {
        let field = match self.text("splitOption") {
            Some("all") => return Ok(None),
            Some("pages") => "pageNumbers",
            Some("ranges") => "ranges",
            Some(other) => {
                return Err(ServerError::InvalidRequest(format!(
                    "Invalid splitOption: {}",
                    other
                )))
            }
            None => return Ok(self.page_spec()),
        };
        self.text(field)
            .map(|raw| Some(PageSpec::parse(raw)))
            .ok_or_else(|| ServerError::InvalidRequest("No valid split ranges provided".into()))
    }

    /// Pages to rotate: `pageRange=all|specific` with `specificPages`, or a
    /// plain page list
    fn rotate_pages(&self) -> Result<Option<PageSpec>, ServerError> {
        match self.text("pageRange") {
            Some("all") => Ok(None),
            Some("specific") => self
                .text("specificPages")
                .map(|raw| Some(PageSpec::parse(raw)))
                .ok_or_else(|| {
                    ServerError::InvalidRequest("Please specify which pages to rotate".into())
                }),
            Some(other) => Err(ServerError::InvalidRequest(format!(
                "Invalid pageRange: {}",
                other
            ))),
            None => Ok(self
                .page_spec()
                .or_else(|| self.text("specificPages").map(PageSpec::parse))),
        }
    }

    /// Take the one input document of a single-file operation
    fn single_file(&mut self, operation: &str) -> Result<Vec<u8>, ServerError> {
        match self.files.len() {
            0 => Err(ServerError::InvalidRequest("File is required".into())),
            1 => Ok(self.files.remove(0)),
            n => Err(ServerError::InvalidRequest(format!(
                "{} takes exactly one file, got {}",
                operation, n
            ))),
        }
    }

    /// Map the form onto a typed command.
    ///
    /// Only presence and parse errors are reported here; value ranges are
    /// checked by the engine when the command runs.
    pub fn into_command(mut self) -> Result<PdfCommand, ServerError> {
        let operation = self
            .text("operation")
            .ok_or_else(|| ServerError::InvalidRequest("No operation specified".into()))?
            .to_string();

        let command = match operation.as_str() {
            "merge" => PdfCommand::Merge {
                files: std::mem::take(&mut self.files),
            },
            "split" => {
                let ranges = self.split_ranges()?;
                PdfCommand::Split {
                    file: self.single_file(&operation)?,
                    ranges,
                }
            }
            "compress" => PdfCommand::Compress {
                level: self.parse_or(&["level", "compressionLevel"], CompressionLevel::default())?,
                file: self.single_file(&operation)?,
            },
            "rotate" => {
                let angle = self.parse_or(
                    &["rotation", "rotationAngle"],
                    pdftools_core::rotate::DEFAULT_ROTATION,
                )?;
                PdfCommand::Rotate {
                    options: RotateOptions {
                        angle,
                        pages: self.rotate_pages()?,
                    },
                    file: self.single_file(&operation)?,
                }
            }
            "watermark" => {
                let mut options = WatermarkOptions::new(self.text("watermarkText").unwrap_or(""));
                options.opacity = self.parse_or(&["opacity"], options.opacity)?;
                options.font_size = self.parse_or(&["fontSize"], options.font_size)?;
                if let Some(hex) = self.text("color") {
                    options.color = Color::from_hex(hex)?;
                }
                PdfCommand::Watermark {
                    options,
                    file: self.single_file(&operation)?,
                }
            }
            "pageNumbers" | "page-numbers" => {
                let defaults = PageNumberOptions::default();
                let options = PageNumberOptions {
                    position: self.parse_or(&["position"], Position::default())?,
                    font_size: self.parse_or(&["fontSize"], defaults.font_size)?,
                };
                PdfCommand::PageNumbers {
                    options,
                    file: self.single_file(&operation)?,
                }
            }
            "organize" => {
                let operations: Vec<OrganizeOperation> = self.json("operations")?;
                PdfCommand::Organize {
                    operations,
                    file: self.single_file(&operation)?,
                }
            }
            "annotate" => {
                let annotations: PageAnnotations = self.json("annotations")?;
                PdfCommand::Annotate {
                    annotations,
                    file: self.single_file(&operation)?,
                }
            }
            "analyze" => PdfCommand::Analyze {
                file: self.single_file(&operation)?,
            },
            "repair" => PdfCommand::Repair {
                file: self.single_file(&operation)?,
            },
            "info" => PdfCommand::Info {
                file: self.single_file(&operation)?,
            },
            "protect" | "security" => PdfCommand::Protect {
                password: self.text("password").unwrap_or_default().to_string(),
                file: self.single_file(&operation)?,
            },
            "unlock" => PdfCommand::Unlock {
                password: self.text("password").unwrap_or_default().to_string(),
                file: self.single_file(&operation)?,
            },
            other => {
                return Err(ServerError::InvalidRequest(format!(
                    "Invalid operation: {}",
                    other
                )))
            }
        };

        Ok(command)
    }
}

/// Read one file field chunk by chunk, failing as soon as it passes `limit`
async fn read_limited(mut field: Field<'_>, limit: usize) -> Result<Vec<u8>, ServerError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("Failed to read upload: {}", e)))?
    {
        if bytes.len() + chunk.len() > limit {
            return Err(ServerError::FileTooLarge(limit / (1024 * 1024)));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Reject parts that do not claim to be a PDF, before reading their body
fn check_declared_type(file_name: &str, content_type: Option<&str>) -> Result<(), ServerError> {
    let declared_pdf = content_type == Some("application/pdf")
        || file_name.to_ascii_lowercase().ends_with(".pdf");
    if declared_pdf {
        Ok(())
    } else {
        Err(ServerError::InvalidRequest(
            "Invalid file type. Please upload a PDF file.".into(),
        ))
    }
}

/// Reject anything that is not plausibly a PDF or is over the size limit
pub fn check_upload(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    limits: &UploadLimits,
) -> Result<(), ServerError> {
    check_declared_type(file_name, content_type)?;

    if bytes.len() > limits.max_file_bytes {
        return Err(ServerError::FileTooLarge(limits.max_file_bytes / (1024 * 1024)));
    }

    if !has_pdf_header(bytes) {
        return Err(ServerError::InvalidRequest(format!(
            "{} is not a PDF document",
            file_name
        )));
    }

    Ok(())
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

#[cfg(test)]
impl UploadForm {
    fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    fn with_file(mut self, bytes: Vec<u8>) -> Self {
        self.files.push(bytes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdftools_core::PdfToolsError;

    const PDF: &[u8] = b"%PDF-1.7\n%%EOF";

    #[test]
    fn test_check_upload_accepts_pdf_by_extension_or_type() {
        let limits = UploadLimits::default();
        assert!(check_upload("a.PDF", None, PDF, &limits).is_ok());
        assert!(check_upload("blob", Some("application/pdf"), PDF, &limits).is_ok());
    }

    #[test]
    fn test_check_upload_rejects_wrong_type() {
        let limits = UploadLimits::default();
        let err = check_upload("notes.txt", Some("text/plain"), PDF, &limits).unwrap_err();
        assert!(err.to_string().contains("Invalid file type"));
    }

    #[test]
    fn test_check_upload_rejects_missing_header() {
        let limits = UploadLimits::default();
        assert!(check_upload("fake.pdf", None, b"hello world", &limits).is_err());
    }

    #[test]
    fn test_check_upload_allows_leading_junk_before_header() {
        let limits = UploadLimits::default();
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(PDF);
        assert!(check_upload("a.pdf", None, &bytes, &limits).is_ok());
    }

    #[test]
    fn test_check_upload_enforces_size() {
        let limits = UploadLimits {
            max_file_bytes: 8,
            max_files: 2,
        };
        assert!(matches!(
            check_upload("a.pdf", None, PDF, &limits),
            Err(ServerError::FileTooLarge(_))
        ));
    }

    #[test]
    fn test_missing_operation() {
        let err = UploadForm::default().into_command().unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: No operation specified");
    }

    #[test]
    fn test_unknown_operation() {
        let err = UploadForm::default()
            .with_field("operation", "explode")
            .into_command()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid operation: explode"));
    }

    #[test]
    fn test_single_file_operation_requires_file() {
        let err = UploadForm::default()
            .with_field("operation", "compress")
            .into_command()
            .unwrap_err();
        assert!(err.to_string().contains("File is required"));
    }

    #[test]
    fn test_rotate_defaults_and_pages() {
        let command = UploadForm::default()
            .with_field("operation", "rotate")
            .with_field("pageNumbers", "1, 3")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        match command {
            PdfCommand::Rotate { options, .. } => {
                assert_eq!(options.angle, 90);
                assert_eq!(options.pages.unwrap().len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rotation_must_be_numeric() {
        let err = UploadForm::default()
            .with_field("operation", "rotate")
            .with_field("rotation", "sideways")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[test]
    fn test_split_all_ignores_ranges() {
        let command = UploadForm::default()
            .with_field("operation", "split")
            .with_field("splitOption", "all")
            .with_field("pageNumbers", "1-2")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        assert!(matches!(command, PdfCommand::Split { ranges: None, .. }));
    }

    fn token_texts(spec: &PageSpec) -> Vec<String> {
        spec.resolve(10).into_iter().map(|t| t.text).collect()
    }

    fn split_form(option: &str) -> UploadForm {
        UploadForm::default()
            .with_field("operation", "split")
            .with_field("splitOption", option)
            .with_field("pageNumbers", "1")
            .with_field("ranges", "2-3")
            .with_file(PDF.to_vec())
    }

    #[test]
    fn test_split_option_picks_the_matching_field() {
        match split_form("pages").into_command().unwrap() {
            PdfCommand::Split { ranges, .. } => {
                assert_eq!(token_texts(&ranges.unwrap()), vec!["1".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match split_form("ranges").into_command().unwrap() {
            PdfCommand::Split { ranges, .. } => {
                assert_eq!(token_texts(&ranges.unwrap()), vec!["2-3".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_split_option_with_empty_field_is_rejected() {
        let err = UploadForm::default()
            .with_field("operation", "split")
            .with_field("splitOption", "pages")
            .with_field("pageNumbers", "  ")
            .with_field("ranges", "1-2")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap_err();
        assert!(err.to_string().contains("No valid split ranges provided"));
    }

    #[test]
    fn test_rotate_accepts_tool_page_field_names() {
        let command = UploadForm::default()
            .with_field("operation", "rotate")
            .with_field("rotationAngle", "180")
            .with_field("pageRange", "specific")
            .with_field("specificPages", "2")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        match command {
            PdfCommand::Rotate { options, .. } => {
                assert_eq!(options.angle, 180);
                assert_eq!(token_texts(&options.pages.unwrap()), vec!["2".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rotate_page_range_all_ignores_specific_pages() {
        let command = UploadForm::default()
            .with_field("operation", "rotate")
            .with_field("rotationAngle", "270")
            .with_field("pageRange", "all")
            .with_field("specificPages", "2")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        assert!(matches!(
            command,
            PdfCommand::Rotate { options: RotateOptions { angle: 270, pages: None }, .. }
        ));
    }

    #[test]
    fn test_rotate_specific_without_pages_is_rejected() {
        let err = UploadForm::default()
            .with_field("operation", "rotate")
            .with_field("pageRange", "specific")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap_err();
        assert!(err.to_string().contains("Please specify which pages to rotate"));
    }

    #[test]
    fn test_compress_accepts_compression_level_field() {
        let command = UploadForm::default()
            .with_field("operation", "compress")
            .with_field("compressionLevel", "high")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        assert!(matches!(
            command,
            PdfCommand::Compress { level: CompressionLevel::High, .. }
        ));
    }

    #[test]
    fn test_fallback_operation_only_fills_a_missing_field() {
        let command = UploadForm::default()
            .with_file(PDF.to_vec())
            .with_fallback_operation(Some("analyze"))
            .into_command()
            .unwrap();
        assert!(matches!(command, PdfCommand::Analyze { .. }));

        let command = UploadForm::default()
            .with_field("operation", "info")
            .with_file(PDF.to_vec())
            .with_fallback_operation(Some("analyze"))
            .into_command()
            .unwrap();
        assert!(matches!(command, PdfCommand::Info { .. }));
    }

    #[test]
    fn test_watermark_fields() {
        let command = UploadForm::default()
            .with_field("operation", "watermark")
            .with_field("watermarkText", "CONFIDENTIAL")
            .with_field("opacity", "0.5")
            .with_field("color", "#ff0000")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        match command {
            PdfCommand::Watermark { options, .. } => {
                assert_eq!(options.text, "CONFIDENTIAL");
                assert_eq!(options.opacity, 0.5);
                assert_eq!(options.font_size, 48.0);
                assert_eq!(options.color.r, 1.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_watermark_bad_color_is_validation_error() {
        let err = UploadForm::default()
            .with_field("operation", "watermark")
            .with_field("watermarkText", "X")
            .with_field("color", "blue-ish")
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap_err();
        assert!(matches!(err, ServerError::Pdf(PdfToolsError::Validation(_))));
    }

    #[test]
    fn test_organize_reads_json_operations() {
        let command = UploadForm::default()
            .with_field("operation", "organize")
            .with_field(
                "operations",
                r#"[{"type":"keep","pageIndex":1},{"type":"keep","pageIndex":0,"rotation":90}]"#,
            )
            .with_file(PDF.to_vec())
            .into_command()
            .unwrap();
        match command {
            PdfCommand::Organize { operations, .. } => {
                assert_eq!(operations.len(), 2);
                assert_eq!(operations[1].rotation, Some(90));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_merge_keeps_file_order() {
        let command = UploadForm::default()
            .with_field("operation", "merge")
            .with_file(b"first".to_vec())
            .with_file(b"second".to_vec())
            .into_command()
            .unwrap();
        match command {
            PdfCommand::Merge { files } => {
                assert_eq!(files, vec![b"first".to_vec(), b"second".to_vec()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
