//! Reorder, delete and rotate pages in a single pass

use serde::Deserialize;
use tracing::info;

use crate::cancel::CancelToken;
use crate::document::{PdfHandle, SaveOptions};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;
use crate::rotate::validate_angle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeAction {
    Keep,
    Delete,
}

/// One entry of an organize request. `page_index` is 0-based.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeOperation {
    #[serde(rename = "type")]
    pub action: OrganizeAction,
    pub page_index: usize,
    #[serde(default)]
    pub rotation: Option<i64>,
}

impl OrganizeOperation {
    pub fn keep(page_index: usize) -> Self {
        Self {
            action: OrganizeAction::Keep,
            page_index,
            rotation: None,
        }
    }

    pub fn delete(page_index: usize) -> Self {
        Self {
            action: OrganizeAction::Delete,
            page_index,
            rotation: None,
        }
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotation = Some(degrees);
        self
    }
}

pub fn validate_operations(operations: &[OrganizeOperation]) -> Result<(), PdfToolsError> {
    for op in operations {
        if let Some(angle) = op.rotation {
            validate_angle(angle)?;
        }
    }
    Ok(())
}

/// Build a new document from the `keep` entries, in list order.
///
/// The list order, not the source order, decides the output order. `delete`
/// entries are never dereferenced. An empty or all-delete list gives a valid
/// zero-page document.
pub fn organize_pages(
    source: &PdfHandle,
    operations: &[OrganizeOperation],
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    validate_operations(operations)?;

    let page_count = source.page_count() as usize;
    let kept: Vec<&OrganizeOperation> = operations
        .iter()
        .filter(|op| op.action == OrganizeAction::Keep)
        .collect();

    let mut pages = Vec::with_capacity(kept.len());
    for op in &kept {
        if op.page_index >= page_count {
            return Err(PdfToolsError::InvalidRange(format!(
                "Page index {} is out of range (document has {} pages)",
                op.page_index, page_count
            )));
        }
        pages.push(op.page_index as u32 + 1);
    }

    let mut dest = PdfHandle::new_empty();
    let new_ids = dest.import_pages(source, &pages, cancel)?;
    for (op, page_id) in kept.iter().zip(new_ids) {
        if let Some(angle) = op.rotation {
            dest.set_rotation(page_id, angle)?;
        }
    }

    info!(
        "Organized {} source pages into {} pages",
        page_count,
        dest.page_count()
    );
    dest.finish(SaveOptions::default())
}
