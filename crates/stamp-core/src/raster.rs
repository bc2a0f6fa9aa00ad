//! Page raster references
//!
//! Rendering pages to pixels is done elsewhere. The core only needs to know,
//! per page, which image the overlay was drawn on and its pixel dimensions.

use lopdf::Document;
use serde::{Deserialize, Serialize};

use crate::coords::ImageSize;
use crate::error::StampError;
use crate::page_info::PageGeometry;

/// Render scale used when nothing else is configured
pub const DEFAULT_RENDER_SCALE: f64 = 1.5;

/// One rendered page: where the pixels live and how many there are
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    /// URL, data URI or any other handle understood by the UI
    pub source: String,
    pub width: u32,
    pub height: u32,
}

impl PageImage {
    /// Pixel dimensions, rejecting empty images for `page_index`
    pub fn size(&self, page_index: usize) -> Result<ImageSize, StampError> {
        if self.width == 0 || self.height == 0 {
            return Err(StampError::InvalidPageImage {
                page_index,
                width: self.width,
                height: self.height,
            });
        }
        Ok(ImageSize {
            width: self.width as f64,
            height: self.height as f64,
        })
    }
}

/// Produces one [`PageImage`] per page, in page order, at a fixed scale
pub trait Rasterizer {
    fn rasterize(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, StampError>;
}

/// Computes the pixel dimensions a renderer at `scale` would produce,
/// without rendering anything.
///
/// Dimensions are truncated the way canvas-based renderers truncate them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledPageRasterizer {
    pub scale: f64,
}

impl ScaledPageRasterizer {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    pub fn page_image(&self, page: &PageGeometry) -> PageImage {
        // Viewers render rotated pages upright
        let (width, height) = match page.rotation {
            90 | 270 => (page.height, page.width),
            _ => (page.width, page.height),
        };
        PageImage {
            source: format!("page-{}", page.page_index + 1),
            width: (width * self.scale).floor() as u32,
            height: (height * self.scale).floor() as u32,
        }
    }
}

impl Default for ScaledPageRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_SCALE)
    }
}

impl Rasterizer for ScaledPageRasterizer {
    fn rasterize(&self, pdf_bytes: &[u8]) -> Result<Vec<PageImage>, StampError> {
        let doc =
            Document::load_mem(pdf_bytes).map_err(|e| StampError::ParseError(e.to_string()))?;
        Ok(PageGeometry::all_from_document(&doc)?
            .iter()
            .map(|page| self.page_image(page))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(width: f64, height: f64, rotation: i32) -> PageGeometry {
        PageGeometry {
            page_index: 0,
            origin_x: 0.0,
            origin_y: 0.0,
            width,
            height,
            rotation,
        }
    }

    #[test]
    fn test_letter_at_default_scale() {
        let image = ScaledPageRasterizer::default().page_image(&page(612.0, 792.0, 0));
        assert_eq!(
            image,
            PageImage {
                source: "page-1".to_string(),
                width: 918,
                height: 1188,
            }
        );
    }

    #[test]
    fn test_dimensions_truncate() {
        let image = ScaledPageRasterizer::new(1.5).page_image(&page(595.0, 842.0, 0));
        assert_eq!((image.width, image.height), (892, 1263));
    }

    #[test]
    fn test_rotated_page_swaps_dimensions() {
        let image = ScaledPageRasterizer::new(1.0).page_image(&page(612.0, 792.0, 90));
        assert_eq!((image.width, image.height), (792, 612));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let image = PageImage {
            source: "page-3".to_string(),
            width: 0,
            height: 100,
        };
        assert!(matches!(
            image.size(2),
            Err(StampError::InvalidPageImage { page_index: 2, .. })
        ));
    }

    #[test]
    fn test_rasterize_rejects_garbage() {
        let result = ScaledPageRasterizer::default().rasterize(b"not a pdf");
        assert!(matches!(result, Err(StampError::ParseError(_))));
    }
}
