//! Drawing primitives for stamps and annotations
//!
//! Everything here produces content-stream operations in the document's
//! bottom-left-origin space. Callers working from top-left UI coordinates go
//! through [`to_document_space`] first.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use serde::{Deserialize, Serialize};

use crate::document::FONT_RESOURCE;
use crate::error::PdfToolsError;

/// Bezier control-point factor for approximating a quarter ellipse
const KAPPA: f32 = 0.552_284_8;

/// Convert a top-left-origin UI point to the bottom-left-origin space of a
/// page `page_height` units tall
pub fn to_document_space(ui_x: f32, ui_y: f32, page_height: f32) -> (f32, f32) {
    (ui_x, page_height - ui_y)
}

/// An RGB color with channels in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse "#RRGGBB", "RRGGBB" or the short "#RGB" form
    pub fn from_hex(color: &str) -> Result<Self, PdfToolsError> {
        let invalid = || PdfToolsError::Validation(format!("Invalid hex color: {}", color));
        let hex = color.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| -> Result<f32, PdfToolsError> {
            u8::from_str_radix(digits, 16)
                .map(|v| f32::from(v) / 255.0)
                .map_err(|_| invalid())
        };

        match hex.len() {
            6 => Ok(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            3 => {
                let doubled: String = hex.chars().flat_map(|c| [c, c]).collect();
                Self::from_hex(&doubled)
            }
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    fn operands(self) -> Vec<Object> {
        vec![Object::Real(self.r), Object::Real(self.g), Object::Real(self.b)]
    }

    pub fn fill(self) -> Operation {
        Operation::new("rg", self.operands())
    }

    pub fn stroke(self) -> Operation {
        Operation::new("RG", self.operands())
    }
}

impl TryFrom<String> for Color {
    type Error = PdfToolsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Encode text for a simple font: Latin-1 code points pass through, anything
/// else becomes '?'
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Rough advance width of `text` in Helvetica, used for the same
/// length-based centering the stamps have always used
pub fn approx_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size / 2.0
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

/// A single run of text in the registered Helvetica font
#[derive(Debug, Clone)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: Color,
    /// Counter-clockwise rotation about `(x, y)`, in degrees
    pub angle: f32,
    /// ExtGState resource name to select before drawing
    pub alpha_state: Option<&'a str>,
}

impl TextRun<'_> {
    pub fn operations(&self) -> Vec<Operation> {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let mut ops = vec![Operation::new("q", vec![])];
        if let Some(state) = self.alpha_state {
            ops.push(Operation::new("gs", vec![Object::Name(state.as_bytes().to_vec())]));
        }
        ops.extend([
            self.color.fill(),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                    real(self.font_size),
                ],
            ),
            Operation::new(
                "Tm",
                vec![real(cos), real(sin), real(-sin), real(cos), real(self.x), real(self.y)],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_text(self.text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
        ops
    }
}

/// Stroked rectangle outline with its lower-left corner at `(x, y)`
pub fn stroked_rect(x: f32, y: f32, width: f32, height: f32, color: Color, line_width: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        color.stroke(),
        Operation::new("w", vec![real(line_width)]),
        Operation::new("re", vec![real(x), real(y), real(width), real(height)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Filled rectangle, optionally translucent
pub fn filled_rect(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    color: Color,
    alpha_state: Option<&str>,
) -> Vec<Operation> {
    let mut ops = vec![Operation::new("q", vec![])];
    if let Some(state) = alpha_state {
        ops.push(Operation::new("gs", vec![Object::Name(state.as_bytes().to_vec())]));
    }
    ops.extend([
        color.fill(),
        Operation::new("re", vec![real(x), real(y), real(width), real(height)]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]);
    ops
}

/// Straight stroked segment
pub fn line(from: (f32, f32), to: (f32, f32), color: Color, line_width: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        color.stroke(),
        Operation::new("w", vec![real(line_width)]),
        Operation::new("m", vec![real(from.0), real(from.1)]),
        Operation::new("l", vec![real(to.0), real(to.1)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Stroked ellipse centered on `(cx, cy)`, built from four Bezier arcs
pub fn stroked_ellipse(cx: f32, cy: f32, rx: f32, ry: f32, color: Color, line_width: f32) -> Vec<Operation> {
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    let curve = |pts: [f32; 6]| Operation::new("c", pts.iter().map(|&v| real(v)).collect());

    vec![
        Operation::new("q", vec![]),
        color.stroke(),
        Operation::new("w", vec![real(line_width)]),
        Operation::new("m", vec![real(cx + rx), real(cy)]),
        curve([cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry]),
        curve([cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy]),
        curve([cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry]),
        curve([cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy]),
        Operation::new("h", vec![]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}
