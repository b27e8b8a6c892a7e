//! Shared application state

use std::time::Duration;

/// Upload guards applied before any document is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

impl UploadLimits {
    /// Request body ceiling: every file at its maximum plus room for form
    /// fields and multipart framing
    pub fn body_limit(&self) -> usize {
        self.max_file_bytes
            .saturating_mul(self.max_files)
            .saturating_add(1024 * 1024)
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            max_files: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub limits: UploadLimits,
    /// Deadline for a single command
    pub timeout: Duration,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            timeout: Duration::from_secs(30),
        }
    }
}
