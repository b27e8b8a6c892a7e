//! Page numbering along the bottom edge

use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::cancel::CancelToken;
use crate::document::{PdfHandle, SaveOptions};
use crate::draw::{approx_text_width, Color, TextRun};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Distance of the baseline from the bottom edge
const BOTTOM_OFFSET: f32 = 30.0;
const LEFT_INSET: f32 = 30.0;
const RIGHT_INSET: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomCenter,
    BottomRight,
    BottomLeft,
}

impl FromStr for Position {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "bottom-center" => Ok(Position::BottomCenter),
            "bottom-right" => Ok(Position::BottomRight),
            "bottom-left" => Ok(Position::BottomLeft),
            other => Err(PdfToolsError::Validation(format!(
                "Unknown page number position: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNumberOptions {
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

impl Default for PageNumberOptions {
    fn default() -> Self {
        Self {
            position: Position::default(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl PageNumberOptions {
    pub fn validate(&self) -> Result<(), PdfToolsError> {
        if !(self.font_size > 0.0 && self.font_size.is_finite()) {
            return Err(PdfToolsError::Validation(format!(
                "Font size must be positive, got {}",
                self.font_size
            )));
        }
        Ok(())
    }

    /// Baseline anchor for `label` on a page `width` units wide
    fn anchor_x(&self, label: &str, width: f32) -> f32 {
        match self.position {
            Position::BottomCenter => width / 2.0 - approx_text_width(label, self.font_size) / 2.0,
            Position::BottomRight => width - RIGHT_INSET,
            Position::BottomLeft => LEFT_INSET,
        }
    }
}

/// Stamp "1", "2", ... on every page in page order
pub fn add_page_numbers(
    mut handle: PdfHandle,
    options: &PageNumberOptions,
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    options.validate()?;

    let page_ids = handle.page_ids();
    for (i, &page_id) in page_ids.iter().enumerate() {
        cancel.checkpoint()?;

        let label = (i + 1).to_string();
        let page_box = handle.page_box(page_id);
        handle.ensure_font(page_id)?;

        let run = TextRun {
            text: &label,
            x: page_box.x0 + options.anchor_x(&label, page_box.width()),
            y: page_box.y0 + BOTTOM_OFFSET,
            font_size: options.font_size,
            color: Color::BLACK,
            angle: 0.0,
            alpha_state: None,
        };
        handle.overlay(page_id, run.operations())?;
    }

    info!("Numbered {} pages", page_ids.len());
    handle.finish(SaveOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{all_page_texts, build_numbered_pdf};

    #[test]
    fn test_position_parsing() {
        assert_eq!("bottom-right".parse::<Position>().unwrap(), Position::BottomRight);
        assert_eq!("".parse::<Position>().unwrap(), Position::BottomCenter);
        assert!("top-left".parse::<Position>().is_err());
    }

    #[test]
    fn test_anchor_positions() {
        let options = |position| PageNumberOptions {
            position,
            font_size: 12.0,
        };
        assert_eq!(options(Position::BottomLeft).anchor_x("7", 612.0), 30.0);
        assert_eq!(options(Position::BottomRight).anchor_x("7", 612.0), 562.0);
        assert_eq!(options(Position::BottomCenter).anchor_x("10", 612.0), 300.0);
    }

    #[test]
    fn test_numbers_every_page() {
        let handle = PdfHandle::load(&build_numbered_pdf(3)).unwrap();
        let output = add_page_numbers(handle, &PageNumberOptions::default(), &CancelToken::new()).unwrap();
        let texts = all_page_texts(&output.bytes);
        for (i, text) in texts.iter().enumerate() {
            assert!(text.contains(&format!("({}) Tj", i + 1)));
        }
    }

    #[test]
    fn test_zero_font_size_rejected() {
        let handle = PdfHandle::load(&build_numbered_pdf(1)).unwrap();
        let options = PageNumberOptions {
            position: Position::BottomCenter,
            font_size: 0.0,
        };
        let result = add_page_numbers(handle, &options, &CancelToken::new());
        assert!(matches!(result, Err(PdfToolsError::Validation(_))));
    }
}
