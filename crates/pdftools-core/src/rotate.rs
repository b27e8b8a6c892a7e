//! Absolute page rotation

use serde::Deserialize;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::document::{PdfHandle, SaveOptions};
use crate::error::PdfToolsError;
use crate::ranges::PageSpec;
use crate::result::PdfOutput;

pub const DEFAULT_ROTATION: i64 = 90;

/// Reject angles that are not a multiple of 90 degrees
pub fn validate_angle(angle: i64) -> Result<(), PdfToolsError> {
    if angle % 90 != 0 {
        return Err(PdfToolsError::Validation(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            angle
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateOptions {
    #[serde(default = "default_rotation")]
    pub angle: i64,
    /// Pages to rotate (1-based); all pages when absent
    #[serde(default)]
    pub pages: Option<PageSpec>,
}

fn default_rotation() -> i64 {
    DEFAULT_ROTATION
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            angle: DEFAULT_ROTATION,
            pages: None,
        }
    }
}

impl RotateOptions {
    pub fn new(angle: i64, pages: Option<PageSpec>) -> Result<Self, PdfToolsError> {
        validate_angle(angle)?;
        Ok(Self { angle, pages })
    }

    pub fn validate(&self) -> Result<(), PdfToolsError> {
        validate_angle(self.angle)
    }
}

/// Set the rotation of the selected pages to `options.angle`.
///
/// The angle replaces whatever rotation a page had. Page numbers outside the
/// document are ignored; malformed tokens come back as warnings.
pub fn rotate_pages(
    mut handle: PdfHandle,
    options: &RotateOptions,
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    options.validate()?;

    let page_count = handle.page_count();
    let (pages, warnings) = match &options.pages {
        Some(spec) => {
            let selection = spec.select(page_count);
            (selection.pages, selection.errors)
        }
        None => ((1..=page_count).collect(), Vec::new()),
    };

    let page_ids = handle.page_ids();
    for &page in &pages {
        cancel.checkpoint()?;
        let page_id = page_ids
            .get(page.saturating_sub(1) as usize)
            .copied()
            .ok_or_else(|| PdfToolsError::InvalidRange(format!("Page {} does not exist", page)))?;
        handle.set_rotation(page_id, options.angle)?;
        debug!("Page {} rotation set to {}", page, options.angle);
    }

    info!("Rotated {} of {} pages", pages.len(), page_count);
    Ok(handle
        .finish(SaveOptions::default())?
        .with_warnings(warnings))
}
