//! Stamp model
//!
//! A stamp is one annotation placed on a rendered page: a signature image,
//! a line of text, a date or a checkmark. Geometry lives in raster space,
//! the pixel grid of the rendered page image with its origin at the top-left.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coords::RasterRect;
use crate::error::StampError;

/// Smallest width an interactive resize may produce
pub const MIN_STAMP_WIDTH: f64 = 50.0;
/// Smallest height an interactive resize may produce
pub const MIN_STAMP_HEIGHT: f64 = 20.0;

/// Opaque stamp identifier, stable for the lifetime of the stamp
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StampId(String);

impl StampId {
    /// Generate a fresh id, prefixed by the stamp kind for readability in logs
    pub fn generate(kind: StampKind) -> Self {
        Self(format!("{}-{}", kind.id_prefix(), Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StampId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StampId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for StampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampKind {
    Signature,
    Text,
    Date,
    Checkmark,
}

impl StampKind {
    fn id_prefix(self) -> &'static str {
        match self {
            StampKind::Signature => "sig",
            StampKind::Text => "text",
            StampKind::Date => "date",
            StampKind::Checkmark => "check",
        }
    }

    /// Size given to a stamp placed by a tool click
    pub fn default_size(self) -> Size {
        match self {
            StampKind::Text | StampKind::Date => Size::new(100.0, 24.0),
            StampKind::Signature => Size::new(150.0, 50.0),
            StampKind::Checkmark => Size::new(24.0, 24.0),
        }
    }
}

/// The two checkmark shapes. The stamp content stores the glyph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckmarkVariant {
    Square,
    #[default]
    Check,
}

impl CheckmarkVariant {
    pub const SQUARE_GLYPH: &'static str = "■";
    pub const CHECK_GLYPH: &'static str = "✓";

    pub fn glyph(self) -> &'static str {
        match self {
            CheckmarkVariant::Square => Self::SQUARE_GLYPH,
            CheckmarkVariant::Check => Self::CHECK_GLYPH,
        }
    }

    pub fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph.trim() {
            Self::SQUARE_GLYPH => Some(CheckmarkVariant::Square),
            Self::CHECK_GLYPH => Some(CheckmarkVariant::Check),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Apply the interactive resize minimum (50x20)
    pub fn clamped_for_resize(self) -> Self {
        Self {
            width: self.width.max(MIN_STAMP_WIDTH),
            height: self.height.max(MIN_STAMP_HEIGHT),
        }
    }
}

/// One placed annotation.
///
/// `content` depends on `kind`: a PNG data URI for signatures, the literal
/// string for text and date stamps, and one of the [`CheckmarkVariant`]
/// glyphs for checkmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    pub id: StampId,
    #[serde(rename = "type")]
    pub kind: StampKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: String,
    pub page_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl Stamp {
    /// Create a stamp with a fresh id. Fields are stored verbatim.
    pub fn create(
        kind: StampKind,
        position: Point,
        page_index: usize,
        content: impl Into<String>,
        size: Size,
    ) -> Self {
        Self {
            id: StampId::generate(kind),
            kind,
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
            content: content.into(),
            page_index,
            font_family: None,
        }
    }

    /// Create a stamp of the kind's default size centred on `click`
    pub fn centered_at(
        kind: StampKind,
        click: Point,
        page_index: usize,
        content: impl Into<String>,
    ) -> Self {
        let size = kind.default_size();
        let position = Point::new(click.x - size.width / 2.0, click.y - size.height / 2.0);
        Self::create(kind, position, page_index, content, size)
    }

    pub fn with_font_family(mut self, font_family: impl Into<String>) -> Self {
        self.font_family = Some(font_family.into());
        self
    }

    /// Return a new stamp with the patched fields replaced.
    ///
    /// Id, kind and page never change.
    pub fn mutate(&self, patch: &StampPatch) -> Stamp {
        Stamp {
            id: self.id.clone(),
            kind: self.kind,
            x: patch.x.unwrap_or(self.x),
            y: patch.y.unwrap_or(self.y),
            width: patch.width.unwrap_or(self.width),
            height: patch.height.unwrap_or(self.height),
            content: patch
                .content
                .clone()
                .unwrap_or_else(|| self.content.clone()),
            page_index: self.page_index,
            font_family: patch
                .font_family
                .clone()
                .or_else(|| self.font_family.clone()),
        }
    }

    pub fn rect(&self) -> RasterRect {
        RasterRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Checkmark shape encoded in the content, if this is a checkmark stamp
    pub fn checkmark_variant(&self) -> Option<CheckmarkVariant> {
        match self.kind {
            StampKind::Checkmark => CheckmarkVariant::from_glyph(&self.content),
            _ => None,
        }
    }
}

/// Partial update for a stamp; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl StampPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(size: Size) -> Self {
        Self {
            width: Some(size.width),
            height: Some(size.height),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn font_family(font_family: impl Into<String>) -> Self {
        Self {
            font_family: Some(font_family.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Ordered stamps, insertion order doubling as z-order.
///
/// Every mutation returns a new collection. Stamps are shared behind `Arc`
/// between collections, so a snapshot taken earlier can never observe a
/// later change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StampCollection {
    stamps: Vec<Arc<Stamp>>,
}

impl StampCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stamp> {
        self.stamps.iter().map(|s| s.as_ref())
    }

    pub fn get(&self, id: &StampId) -> Option<&Stamp> {
        self.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &StampId) -> bool {
        self.get(id).is_some()
    }

    pub fn on_page(&self, page_index: usize) -> impl Iterator<Item = &Stamp> {
        self.iter().filter(move |s| s.page_index == page_index)
    }

    pub fn with_added(&self, stamp: Stamp) -> Self {
        let mut stamps = self.stamps.clone();
        stamps.push(Arc::new(stamp));
        Self { stamps }
    }

    /// Returns `None` when no stamp has the given id
    pub fn with_updated(&self, id: &StampId, patch: &StampPatch) -> Option<Self> {
        let position = self.stamps.iter().position(|s| &s.id == id)?;
        let mut stamps = self.stamps.clone();
        stamps[position] = Arc::new(stamps[position].mutate(patch));
        Some(Self { stamps })
    }

    /// Returns `None` when no stamp has the given id
    pub fn without(&self, id: &StampId) -> Option<Self> {
        let position = self.stamps.iter().position(|s| &s.id == id)?;
        let mut stamps = self.stamps.clone();
        stamps.remove(position);
        Some(Self { stamps })
    }

    pub fn to_json(&self) -> Result<String, StampError> {
        serde_json::to_string(self).map_err(|e| StampError::SerializationError(e.to_string()))
    }

    /// Parse a collection, rejecting duplicate ids
    pub fn from_json(json: &str) -> Result<Self, StampError> {
        let collection: Self = serde_json::from_str(json)
            .map_err(|e| StampError::SerializationError(e.to_string()))?;

        let mut seen = HashSet::new();
        for stamp in collection.iter() {
            if !seen.insert(&stamp.id) {
                return Err(StampError::SerializationError(format!(
                    "Duplicate stamp id: {}",
                    stamp.id
                )));
            }
        }
        Ok(collection)
    }

    #[cfg(test)]
    pub(crate) fn shares_stamp_with(&self, other: &Self, index: usize) -> bool {
        match (self.stamps.get(index), other.stamps.get(index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FromIterator<Stamp> for StampCollection {
    fn from_iter<T: IntoIterator<Item = Stamp>>(iter: T) -> Self {
        Self {
            stamps: iter.into_iter().map(Arc::new).collect(),
        }
    }
}
