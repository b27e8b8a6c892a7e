//! Draw user annotations onto pages
//!
//! Annotation coordinates come from a top-left-origin UI. Every shape goes
//! through [`PageBox::ui_to_document`] before it is drawn.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use serde::Deserialize;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::document::{PageBox, PdfHandle, SaveOptions};
use crate::draw::{filled_rect, line, stroked_ellipse, stroked_rect, Color, TextRun};
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

pub const DEFAULT_FONT_SIZE: f32 = 12.0;
pub const DEFAULT_STROKE_WIDTH: f32 = 1.0;
const HIGHLIGHT_OPACITY: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Text,
    Rectangle,
    Highlight,
    Line,
    Circle,
    /// Anything else (e.g. "arrow") is accepted and skipped
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
}

/// Annotations keyed by 1-based page number, as written in the request
pub type PageAnnotations = BTreeMap<String, Vec<Annotation>>;

impl Annotation {
    pub fn text(x: f32, y: f32, text: &str) -> Self {
        Self {
            kind: AnnotationKind::Text,
            x,
            y,
            width: None,
            height: None,
            text: Some(text.to_string()),
            color: Color::BLACK,
            font_size: None,
            stroke_width: None,
        }
    }

    pub fn shape(kind: AnnotationKind, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            kind,
            x,
            y,
            width: Some(width),
            height: Some(height),
            text: None,
            color: Color::BLACK,
            font_size: None,
            stroke_width: None,
        }
    }

    pub fn validate(&self) -> Result<(), PdfToolsError> {
        let finite = [self.x, self.y]
            .into_iter()
            .chain(self.width)
            .chain(self.height)
            .all(f32::is_finite);
        if !finite {
            return Err(PdfToolsError::Validation(
                "Annotation coordinates must be finite numbers".into(),
            ));
        }
        if let Some(size) = self.font_size {
            if size <= 0.0 {
                return Err(PdfToolsError::Validation(format!(
                    "Annotation font size must be positive, got {}",
                    size
                )));
            }
        }
        if let Some(width) = self.stroke_width {
            if width < 0.0 {
                return Err(PdfToolsError::Validation(format!(
                    "Stroke width cannot be negative, got {}",
                    width
                )));
            }
        }
        Ok(())
    }

    /// Box dimensions when both are present and non-zero
    fn size(&self) -> Option<(f32, f32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w != 0.0 && h != 0.0 => Some((w, h)),
            _ => None,
        }
    }

    fn stroke(&self) -> f32 {
        self.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH)
    }
}

pub fn validate_annotations(annotations: &PageAnnotations) -> Result<(), PdfToolsError> {
    annotations
        .values()
        .flatten()
        .try_for_each(Annotation::validate)
}

/// Draw every annotation onto its page.
///
/// Pages outside the document and annotations missing what their type needs
/// (text without text, boxes without a size) are skipped.
pub fn annotate_pages(
    mut handle: PdfHandle,
    annotations: &PageAnnotations,
    cancel: &CancelToken,
) -> Result<PdfOutput, PdfToolsError> {
    validate_annotations(annotations)?;

    let page_count = handle.page_count();
    let mut warnings = Vec::new();
    let mut drawn = 0usize;

    for (key, page_annotations) in annotations {
        cancel.checkpoint()?;
        let page_number = match key.trim().parse::<u32>() {
            Ok(n) if (1..=page_count).contains(&n) => n,
            _ => {
                warnings.push(format!(
                    "Skipped annotations for page {} (document has {} pages)",
                    key, page_count
                ));
                continue;
            }
        };

        let page_id = handle.page_id(page_number)?;
        let page_box = handle.page_box(page_id);
        let mut ops = Vec::new();

        for annotation in page_annotations {
            let drawn_ops = match annotation.kind {
                AnnotationKind::Text => {
                    handle.ensure_font(page_id)?;
                    text_ops(annotation, &page_box)
                }
                AnnotationKind::Highlight => {
                    let state = handle.ensure_alpha(page_id, HIGHLIGHT_OPACITY)?;
                    highlight_ops(annotation, &page_box, &state)
                }
                AnnotationKind::Rectangle => rectangle_ops(annotation, &page_box),
                AnnotationKind::Line => line_ops(annotation, &page_box),
                AnnotationKind::Circle => circle_ops(annotation, &page_box),
                AnnotationKind::Other => None,
            };
            match drawn_ops {
                Some(shape) => {
                    ops.extend(shape);
                    drawn += 1;
                }
                None => debug!("Skipped {:?} annotation on page {}", annotation.kind, page_number),
            }
        }

        if !ops.is_empty() {
            handle.overlay(page_id, ops)?;
        }
    }

    info!("Drew {} annotations", drawn);
    Ok(handle
        .finish(SaveOptions::default())?
        .with_warnings(warnings))
}

fn text_ops(annotation: &Annotation, page_box: &PageBox) -> Option<Vec<Operation>> {
    let text = annotation.text.as_deref().filter(|t| !t.is_empty())?;
    let (x, y) = page_box.ui_to_document(annotation.x, annotation.y);
    let run = TextRun {
        text,
        x,
        y,
        font_size: annotation.font_size.unwrap_or(DEFAULT_FONT_SIZE),
        color: annotation.color,
        angle: 0.0,
        alpha_state: None,
    };
    Some(run.operations())
}

/// Lower-left corner of the annotation's box in document space
fn box_origin(annotation: &Annotation, page_box: &PageBox, height: f32) -> (f32, f32) {
    page_box.ui_to_document(annotation.x, annotation.y + height)
}

fn rectangle_ops(annotation: &Annotation, page_box: &PageBox) -> Option<Vec<Operation>> {
    let (width, height) = annotation.size()?;
    let (x, y) = box_origin(annotation, page_box, height);
    Some(stroked_rect(x, y, width, height, annotation.color, annotation.stroke()))
}

fn highlight_ops(annotation: &Annotation, page_box: &PageBox, state: &str) -> Option<Vec<Operation>> {
    let (width, height) = annotation.size()?;
    let (x, y) = box_origin(annotation, page_box, height);
    Some(filled_rect(x, y, width, height, annotation.color, Some(state)))
}

fn line_ops(annotation: &Annotation, page_box: &PageBox) -> Option<Vec<Operation>> {
    let dx = annotation.width.unwrap_or(0.0);
    let dy = annotation.height.unwrap_or(0.0);
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    let from = page_box.ui_to_document(annotation.x, annotation.y);
    let to = page_box.ui_to_document(annotation.x + dx, annotation.y + dy);
    Some(line(from, to, annotation.color, annotation.stroke()))
}

fn circle_ops(annotation: &Annotation, page_box: &PageBox) -> Option<Vec<Operation>> {
    let (width, height) = annotation.size()?;
    let (cx, cy) = page_box.ui_to_document(annotation.x + width / 2.0, annotation.y + height / 2.0);
    Some(stroked_ellipse(
        cx,
        cy,
        width.abs() / 2.0,
        height.abs() / 2.0,
        annotation.color,
        annotation.stroke(),
    ))
}
