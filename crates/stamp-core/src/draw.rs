//! Per-stamp drawing
//!
//! Drawing happens in two steps. [`plan_stamp`] turns a stamp and its PDF
//! rectangle into [`DrawCommand`]s without touching any document.
//! [`PageCanvas`] then renders commands into content-stream operators and
//! collects the font and image resources they reference.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::content::Operation;
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};
use tracing::warn;

use crate::coords::PdfRect;
use crate::error::StampError;
use crate::image::{decode_signature, embed_image};
use crate::stamp::{CheckmarkVariant, Stamp, StampKind};

/// Font size cap for text stamps
pub const TEXT_FONT_CAP: f64 = 16.0;
/// Font size cap for date stamps
pub const DATE_FONT_CAP: f64 = 12.0;
/// Font size as a fraction of the box height, before the cap
const FONT_HEIGHT_RATIO: f64 = 0.7;
/// Baseline offset from the bottom of the box, as a fraction of its height
const BASELINE_RATIO: f64 = 0.3;
/// Side of the checkmark box as a fraction of the shorter side
const CHECK_BOX_RATIO: f64 = 0.55;
/// Check stroke width as a fraction of the shorter side
const CHECK_STROKE_RATIO: f64 = 0.1;

/// PDF standard-14 fonts usable for text stamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::Courier => "Courier",
        }
    }

    fn resource_prefix(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "StmpHelv",
            StandardFont::TimesRoman => "StmpTiRo",
            StandardFont::Courier => "StmpCour",
        }
    }
}

/// Map a CSS-style font family to the closest standard font
pub fn font_for_family(family: Option<&str>) -> StandardFont {
    let Some(family) = family else {
        return StandardFont::Helvetica;
    };
    let lower = family.trim().to_lowercase();

    match lower.as_str() {
        "serif" => return StandardFont::TimesRoman,
        "monospace" => return StandardFont::Courier,
        "sans-serif" | "cursive" | "fantasy" => return StandardFont::Helvetica,
        _ => {}
    }

    if lower.contains("times") || lower.contains("georgia") || lower.contains("garamond") {
        StandardFont::TimesRoman
    } else if lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
    {
        StandardFont::Courier
    } else {
        StandardFont::Helvetica
    }
}

/// One primitive drawing step in PDF space
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Stretch a PNG data URI to fill `rect`
    Image { rect: PdfRect, data_uri: String },
    /// Single line of text starting at the baseline origin (`x`, `y`)
    Text {
        text: String,
        font: StandardFont,
        size: f64,
        x: f64,
        y: f64,
    },
    FillRect { rect: PdfRect },
    /// Straight stroke with round caps
    Line {
        from: (f64, f64),
        to: (f64, f64),
        width: f64,
    },
}

/// Plan how `stamp` is drawn inside `rect` (already in PDF space)
pub fn plan_stamp(stamp: &Stamp, rect: PdfRect) -> Vec<DrawCommand> {
    match stamp.kind {
        StampKind::Signature => vec![DrawCommand::Image {
            rect,
            data_uri: stamp.content.clone(),
        }],
        StampKind::Text | StampKind::Date => {
            let cap = if stamp.kind == StampKind::Date {
                DATE_FONT_CAP
            } else {
                TEXT_FONT_CAP
            };
            vec![DrawCommand::Text {
                text: stamp.content.clone(),
                font: font_for_family(stamp.font_family.as_deref()),
                size: (rect.height * FONT_HEIGHT_RATIO).min(cap),
                x: rect.x,
                y: rect.y + rect.height * BASELINE_RATIO,
            }]
        }
        StampKind::Checkmark => {
            let variant = stamp.checkmark_variant().unwrap_or_else(|| {
                warn!(
                    stamp_id = %stamp.id,
                    content = %stamp.content,
                    "Unknown checkmark glyph, drawing a check"
                );
                CheckmarkVariant::Check
            });
            plan_checkmark(variant, rect)
        }
    }
}

fn plan_checkmark(variant: CheckmarkVariant, rect: PdfRect) -> Vec<DrawCommand> {
    let shorter = rect.shorter_side();
    let side = shorter * CHECK_BOX_RATIO;
    let bx = rect.centered_square(side);

    match variant {
        CheckmarkVariant::Square => vec![DrawCommand::FillRect { rect: bx }],
        CheckmarkVariant::Check => {
            let at = |fx: f64, fy: f64| (bx.x + fx * side, bx.y + fy * side);
            let start = at(0.1, 0.5);
            let corner = at(0.4, 0.15);
            let end = at(0.9, 0.85);
            let width = shorter * CHECK_STROKE_RATIO;
            vec![
                DrawCommand::Line {
                    from: start,
                    to: corner,
                    width,
                },
                DrawCommand::Line {
                    from: corner,
                    to: end,
                    width,
                },
            ]
        }
    }
}

/// Encode text for a standard font with WinAnsiEncoding.
///
/// Characters outside the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\t' => b' ',
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Font objects shared by every page of one export
#[derive(Debug, Default)]
pub(crate) struct FontCache {
    fonts: HashMap<StandardFont, ObjectId>,
}

impl FontCache {
    fn font_id(&mut self, doc: &mut Document, font: StandardFont) -> ObjectId {
        *self.fonts.entry(font).or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            })
        })
    }
}

/// Operators and resources accumulated for one page
#[derive(Debug, Default)]
pub(crate) struct PageCanvas {
    operations: Vec<Operation>,
    fonts: BTreeMap<String, ObjectId>,
    font_names: HashMap<StandardFont, String>,
    xobjects: BTreeMap<String, ObjectId>,
    /// Resource names already present on the page
    reserved: HashSet<String>,
}

impl PageCanvas {
    pub(crate) fn new(reserved: HashSet<String>) -> Self {
        Self {
            reserved,
            ..Self::default()
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn fonts(&self) -> &BTreeMap<String, ObjectId> {
        &self.fonts
    }

    pub(crate) fn xobjects(&self) -> &BTreeMap<String, ObjectId> {
        &self.xobjects
    }

    pub(crate) fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    /// First `<prefix><n>` not used by the page or by this canvas
    fn fresh_name(&self, prefix: &str) -> String {
        (1..)
            .map(|n| format!("{}{}", prefix, n))
            .find(|candidate| {
                !self.reserved.contains(candidate)
                    && !self.fonts.contains_key(candidate)
                    && !self.xobjects.contains_key(candidate)
            })
            .unwrap_or_else(|| prefix.to_string())
    }

    fn font_name(
        &mut self,
        doc: &mut Document,
        cache: &mut FontCache,
        font: StandardFont,
    ) -> String {
        if let Some(existing) = self.font_names.get(&font) {
            return existing.clone();
        }
        let resource = self.fresh_name(font.resource_prefix());
        let id = cache.font_id(doc, font);
        self.fonts.insert(resource.clone(), id);
        self.font_names.insert(font, resource.clone());
        resource
    }

    /// Render one command. Image commands decode and embed their payload.
    pub(crate) fn draw(
        &mut self,
        doc: &mut Document,
        cache: &mut FontCache,
        command: &DrawCommand,
    ) -> Result<(), StampError> {
        let mut ops = vec![Operation::new("q", vec![])];

        match command {
            DrawCommand::Image { rect, data_uri } => {
                let image = decode_signature(data_uri)?;
                let image_id = embed_image(doc, &image)?;
                let resource = self.fresh_name("StmpImg");
                self.xobjects.insert(resource.clone(), image_id);

                ops.push(Operation::new(
                    "cm",
                    vec![
                        real(rect.width),
                        real(0.0),
                        real(0.0),
                        real(rect.height),
                        real(rect.x),
                        real(rect.y),
                    ],
                ));
                ops.push(Operation::new("Do", vec![name(&resource)]));
            }
            DrawCommand::Text {
                text,
                font,
                size,
                x,
                y,
            } => {
                let resource = self.font_name(doc, cache, *font);
                ops.extend([
                    Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![name(&resource), real(*size)]),
                    Operation::new("Td", vec![real(*x), real(*y)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                    ),
                    Operation::new("ET", vec![]),
                ]);
            }
            DrawCommand::FillRect { rect } => {
                ops.extend([
                    Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
                    Operation::new(
                        "re",
                        vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
                    ),
                    Operation::new("f", vec![]),
                ]);
            }
            DrawCommand::Line { from, to, width } => {
                ops.extend([
                    Operation::new("RG", vec![real(0.0), real(0.0), real(0.0)]),
                    Operation::new("w", vec![real(*width)]),
                    Operation::new("J", vec![Object::Integer(1)]),
                    Operation::new("m", vec![real(from.0), real(from.1)]),
                    Operation::new("l", vec![real(to.0), real(to.1)]),
                    Operation::new("S", vec![]),
                ]);
            }
        }

        ops.push(Operation::new("Q", vec![]));
        self.operations.extend(ops);
        Ok(())
    }
}
