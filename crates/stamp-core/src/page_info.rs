//! Page geometry extraction
//!
//! Page size comes from the MediaBox, which may be set on the page itself or
//! inherited from any ancestor in the page tree.

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;

use crate::coords::PageSize;
use crate::error::StampError;

/// US Letter, used when no MediaBox exists anywhere in the page tree
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against cyclic Parent links in malformed files
const MAX_TREE_DEPTH: usize = 32;

/// Geometry of a single page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    /// Zero-based page index
    pub page_index: usize,
    /// Lower-left corner of the MediaBox
    pub origin_x: f64,
    pub origin_y: f64,
    /// Width in points (1 point = 1/72 inch)
    pub width: f64,
    /// Height in points
    pub height: f64,
    /// Rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
}

impl PageGeometry {
    /// Extract the geometry of the page at `page_index`
    pub fn from_document(doc: &Document, page_index: usize) -> Result<Self, StampError> {
        let page_ids = page_object_ids(doc);
        let page_id = *page_ids.get(page_index).ok_or(StampError::PageOutOfRange {
            page_index,
            page_count: page_ids.len(),
        })?;
        Self::from_page_object(doc, page_id, page_index)
    }

    /// Geometry of every page, in document order
    pub fn all_from_document(doc: &Document) -> Result<Vec<Self>, StampError> {
        page_object_ids(doc)
            .into_iter()
            .enumerate()
            .map(|(page_index, page_id)| Self::from_page_object(doc, page_id, page_index))
            .collect()
    }

    pub(crate) fn from_page_object(
        doc: &Document,
        page_id: ObjectId,
        page_index: usize,
    ) -> Result<Self, StampError> {
        let page_dict = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|_| {
                StampError::ParseError(format!("Page {} is not a dictionary", page_index + 1))
            })?;

        let media_box = match inherited_attribute(doc, page_dict, b"MediaBox") {
            Some(Object::Array(array)) => parse_box_array(array)?,
            Some(_) => {
                return Err(StampError::ParseError(format!(
                    "Page {} MediaBox is not an array",
                    page_index + 1
                )))
            }
            None => DEFAULT_MEDIA_BOX,
        };

        let rotation = inherited_attribute(doc, page_dict, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .map(|angle| normalize_rotation(angle as i32))
            .unwrap_or(0);

        // Corners may be given in any order
        let [x1, y1, x2, y2] = media_box;
        Ok(Self {
            page_index,
            origin_x: x1.min(x2),
            origin_y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
            rotation,
        })
    }

    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation != 0
    }
}

/// Page object ids in document order. Index 0 is the first page.
pub(crate) fn page_object_ids(doc: &Document) -> Vec<ObjectId> {
    // get_pages is keyed by 1-based page number, so values come out in order
    doc.get_pages().into_values().collect()
}

/// Look up a page attribute, walking up the page tree for inheritable keys
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = page_dict;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    }
    None
}

/// Follow a single indirect reference, leaving direct objects untouched
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Parse a box array [x1, y1, x2, y2]
fn parse_box_array(array: &[Object]) -> Result<[f64; 4], StampError> {
    if array.len() != 4 {
        return Err(StampError::ParseError(
            "MediaBox must have 4 elements".to_string(),
        ));
    }

    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => {
                return Err(StampError::ParseError(format!(
                    "MediaBox element {} is not a number",
                    i
                )))
            }
        };
    }

    Ok(result)
}

/// Normalize rotation to 0, 90, 180, or 270
fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Two pages: the first inherits everything from the Pages node, the
    /// second carries its own A4 landscape box with an offset origin.
    fn two_page_doc() -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![10.into(), 20.into(), 852.into(), 615.into()],
            "Rotate" => -90,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![first.into(), second.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Rotate" => 0,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(360), 0);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-90), 270);
    }

    #[test]
    fn test_parse_box_array() {
        let array = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(612.0),
            Object::Real(792.0),
        ];
        assert_eq!(parse_box_array(&array).unwrap(), [0.0, 0.0, 612.0, 792.0]);
        assert!(parse_box_array(&array[..3]).is_err());
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let doc = two_page_doc();
        let page = PageGeometry::from_document(&doc, 0).unwrap();
        assert_eq!(page.width, 595.0);
        assert_eq!(page.height, 842.0);
        assert_eq!(page.rotation, 0);
        assert!(!page.is_rotated());
    }

    #[test]
    fn test_own_media_box_with_origin_and_rotation() {
        let doc = two_page_doc();
        let page = PageGeometry::from_document(&doc, 1).unwrap();
        assert_eq!((page.origin_x, page.origin_y), (10.0, 20.0));
        assert_eq!((page.width, page.height), (842.0, 595.0));
        assert_eq!(page.rotation, 270);
    }

    #[test]
    fn test_all_pages_and_out_of_range() {
        let doc = two_page_doc();
        let pages = PageGeometry::all_from_document(&doc).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_index, 1);

        assert!(matches!(
            PageGeometry::from_document(&doc, 2),
            Err(StampError::PageOutOfRange {
                page_index: 2,
                page_count: 2
            })
        ));
    }

    #[test]
    fn test_missing_media_box_defaults_to_letter() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let geometry = PageGeometry::from_document(&doc, 0).unwrap();
        assert_eq!(geometry.size(), PageSize { width: 612.0, height: 792.0 });
    }
}
