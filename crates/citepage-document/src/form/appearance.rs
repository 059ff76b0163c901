// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Appearance streams for filled-in text fields.
//
// A field's default appearance (/DA, e.g. "/Helv 0 Tf 0 g") names the font
// resource, the size (0 = fit the widget) and the fill colour. The stream
// built here is what a viewer would draw for the field and what flattening
// later burns into the page.

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use tracing::debug;

use crate::pdf::page::number;
use crate::pdf::text::encode_win_ansi;

/// Inner margin between widget border and text.
const PADDING: f32 = 2.0;
/// Bounds for automatically sized text.
const MIN_AUTO_SIZE: f32 = 4.0;
const MAX_AUTO_SIZE: f32 = 12.0;
/// Baseline-to-baseline distance as a multiple of the font size.
const LEADING: f32 = 1.15;

/// Font resource used when a field declares no default appearance.
pub const DEFAULT_FONT: &str = "Helv";

/// Parsed `/DA` string.
#[derive(Debug, Clone)]
pub struct DefaultAppearance {
    pub font: String,
    /// Font size in points; `0` means size to fit.
    pub size: f32,
    /// Colour operator from the DA (`g`, `rg` or `k`), if any.
    pub color: Option<Operation>,
}

impl Default for DefaultAppearance {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            size: 0.0,
            color: None,
        }
    }
}

impl DefaultAppearance {
    /// Parse a DA string; unparsable parts fall back to the defaults.
    pub fn parse(da: &str) -> Self {
        let mut parsed = Self::default();
        let content = match Content::decode(da.as_bytes()) {
            Ok(content) => content,
            Err(err) => {
                debug!(da, %err, "unparsable default appearance");
                return parsed;
            }
        };
        for operation in content.operations {
            match operation.operator.as_str() {
                "Tf" => {
                    if let [Object::Name(font), size] = operation.operands.as_slice() {
                        parsed.font = String::from_utf8_lossy(font).into_owned();
                        parsed.size = number(size).unwrap_or(0.0);
                    }
                }
                "g" | "rg" | "k" => parsed.color = Some(operation),
                _ => {}
            }
        }
        parsed
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

/// Horizontal alignment from the field's /Q entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadding {
    Left,
    Centered,
    Right,
}

impl Quadding {
    pub fn from_q(q: i64) -> Self {
        match q {
            1 => Self::Centered,
            2 => Self::Right,
            _ => Self::Left,
        }
    }
}

/// Layout inputs for one widget.
pub struct TextLayout<'a> {
    pub text: &'a str,
    pub width: f32,
    pub height: f32,
    pub multiline: bool,
    pub quadding: Quadding,
}

/// Content stream bytes drawing `layout.text` in a `width` × `height` box.
pub fn text_appearance(
    layout: &TextLayout<'_>,
    da: &DefaultAppearance,
) -> Result<Vec<u8>, lopdf::Error> {
    let inner_width = (layout.width - 2.0 * PADDING).max(1.0);
    let size = font_size(layout, da, inner_width);
    let lines = if layout.multiline {
        wrap_words(layout.text, size, inner_width)
    } else {
        vec![layout.text.to_string()]
    };

    let mut operations = vec![
        Operation::new("BMC", vec![Object::Name(b"Tx".to_vec())]),
        Operation::new("q", vec![]),
        Operation::new(
            "re",
            vec![
                real(1.0),
                real(1.0),
                real((layout.width - 2.0).max(0.0)),
                real((layout.height - 2.0).max(0.0)),
            ],
        ),
        Operation::new("W", vec![]),
        Operation::new("n", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(da.font.as_bytes().to_vec()), real(size)],
        ),
    ];
    operations.push(
        da.color
            .clone()
            .unwrap_or_else(|| Operation::new("g", vec![Object::Integer(0)])),
    );

    let first_baseline = if layout.multiline {
        layout.height - PADDING - size
    } else {
        // Centre the glyph body vertically; descenders take ~20% of the size.
        (layout.height - size) / 2.0 + 0.2 * size
    };

    for (index, line) in lines.iter().enumerate() {
        let line_width = text_width(line, size);
        let x = match layout.quadding {
            Quadding::Left => PADDING,
            Quadding::Centered => (layout.width - line_width) / 2.0,
            Quadding::Right => layout.width - PADDING - line_width,
        };
        let y = first_baseline - index as f32 * size * LEADING;
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                real(x.max(PADDING)),
                real(y),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    operations.push(Operation::new("Q", vec![]));
    operations.push(Operation::new("EMC", vec![]));

    Content { operations }.encode()
}

fn font_size(layout: &TextLayout<'_>, da: &DefaultAppearance, inner_width: f32) -> f32 {
    if da.size > 0.0 {
        return da.size;
    }
    if layout.multiline {
        return MAX_AUTO_SIZE;
    }
    let by_height = ((layout.height - 2.0 * PADDING) / LEADING).clamp(MIN_AUTO_SIZE, MAX_AUTO_SIZE);
    let width = text_width(layout.text, by_height);
    if width > inner_width {
        (by_height * inner_width / width).max(MIN_AUTO_SIZE)
    } else {
        by_height
    }
}

/// Approximate advance width of `text` in a Helvetica-like font.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(glyph_width).sum::<f32>() * size
}

fn glyph_width(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '.' | ',' | ';' | ':' | '\'' | '|' | '!' => 0.25,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.3,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.85,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.556,
        _ => 0.53,
    }
}

/// Greedy word wrap to `max_width`; explicit newlines always break.
/// Words wider than a line are kept whole on their own line.
pub fn wrap_words(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if text_width(&candidate, size) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_appearance() {
        let da = DefaultAppearance::parse("/TiRo 9 Tf 0 0 1 rg");
        assert_eq!(da.font, "TiRo");
        assert_eq!(da.size, 9.0);
        assert_eq!(da.color.map(|op| op.operator), Some("rg".to_string()));
    }

    #[test]
    fn broken_default_appearance_falls_back() {
        let da = DefaultAppearance::parse("Tf Tf");
        assert_eq!(da.font, DEFAULT_FONT);
        assert_eq!(da.size, 0.0);
        assert!(da.color.is_none());
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_words("alpha beta gamma delta", 10.0, 60.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.join(" "), "alpha beta gamma delta");
    }

    #[test]
    fn auto_size_shrinks_long_single_lines() {
        let layout = TextLayout {
            text: "A very long title that will never fit into this narrow box",
            width: 80.0,
            height: 20.0,
            multiline: false,
            quadding: Quadding::Left,
        };
        let size = font_size(&layout, &DefaultAppearance::default(), 76.0);
        assert!(size < MAX_AUTO_SIZE);
        assert!(size >= MIN_AUTO_SIZE);
    }

    #[test]
    fn appearance_shows_the_text() {
        let layout = TextLayout {
            text: "Doe, Jane",
            width: 200.0,
            height: 20.0,
            multiline: false,
            quadding: Quadding::Centered,
        };
        let bytes = text_appearance(&layout, &DefaultAppearance::parse("/Helv 10 Tf 0 g")).unwrap();
        let content = Content::decode(&bytes).unwrap();
        let shown: Vec<Vec<u8>> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .flat_map(|op| op.operands.iter())
            .filter_map(|operand| match operand {
                Object::String(bytes, _) => Some(bytes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(shown, vec![b"Doe, Jane".to_vec()]);
    }
}
