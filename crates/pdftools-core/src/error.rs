use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PdfToolsError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<lopdf::Error> for PdfToolsError {
    fn from(err: lopdf::Error) -> Self {
        PdfToolsError::OperationError(err.to_string())
    }
}
