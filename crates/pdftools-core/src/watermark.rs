//! Diagonal text watermark stamped on every page

use serde::Deserialize;
use tracing::info;

use crate::cancel::CancelToken;
use crate::document::{PdfHandle, SaveOptions};
use crate::draw::{approx_text_width, Color, TextRun};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

pub const DEFAULT_OPACITY: f32 = 0.3;
pub const DEFAULT_FONT_SIZE: f32 = 48.0;
const WATERMARK_ANGLE: f32 = 45.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkOptions {
    pub text: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default)]
    pub color: Color,
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

impl WatermarkOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            opacity: DEFAULT_OPACITY,
            font_size: DEFAULT_FONT_SIZE,
            color: Color::BLACK,
        }
    }

    pub fn validate(&self) -> Result<(), PdfToolsError> {
        if self.text.trim().is_empty() {
            return Err(PdfToolsError::Validation(
                "Watermark text is required".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(PdfToolsError::Validation(format!(
                "Opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        if !(self.font_size > 0.0 && self.font_size.is_finite()) {
            return Err(PdfToolsError::Validation(format!(
                "Font size must be positive, got {}",
                self.font_size
            )));
        }
        Ok(())
    }
}

/// Draw `options.text` across the middle of every page at 45 degrees.
///
/// Centering is approximate: the anchor is shifted left by half an estimated
/// text width (a quarter of `len * font_size`), not by real glyph metrics.
pub fn add_watermark(
    mut handle: PdfHandle,
    options: &WatermarkOptions,
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    options.validate()?;

    let page_ids = handle.page_ids();
    for &page_id in &page_ids {
        cancel.checkpoint()?;

        let page_box = handle.page_box(page_id);
        let x = page_box.x0 + page_box.width() / 2.0
            - approx_text_width(&options.text, options.font_size) / 2.0;
        let y = page_box.y0 + page_box.height() / 2.0;

        handle.ensure_font(page_id)?;
        let alpha_state = handle.ensure_alpha(page_id, options.opacity)?;

        let run = TextRun {
            text: &options.text,
            x,
            y,
            font_size: options.font_size,
            color: options.color,
            angle: WATERMARK_ANGLE,
            alpha_state: Some(&alpha_state),
        };
        handle.overlay(page_id, run.operations())?;
    }

    info!("Watermarked {} pages", page_ids.len());
    handle.finish(SaveOptions::default())
}
