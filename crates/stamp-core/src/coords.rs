//! Coordinate transformation between raster and PDF coordinate systems
//!
//! Raster space is the pixel grid of a rendered page image (origin top-left,
//! y grows downward). PDF space is the page's native space in points
//! (origin bottom-left, y grows upward).

use serde::{Deserialize, Serialize};

/// Rectangle in raster pixels, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in PDF points, anchored at its bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfRect {
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn shorter_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Square of side `side` centred in this rectangle
    pub fn centered_square(&self, side: f64) -> Self {
        Self {
            x: self.x + (self.width - side) / 2.0,
            y: self.y + (self.height - side) / 2.0,
            width: side,
            height: side,
        }
    }
}

/// Pixel dimensions of a rendered page image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Points per pixel, computed independently per axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScaleFactors {
    pub fn between(page: PageSize, image: ImageSize) -> Self {
        Self {
            scale_x: page.width / image.width,
            scale_y: page.height / image.height,
        }
    }
}

/// Convert a raster rectangle to PDF space.
///
/// Exact as long as the image was rendered from the whole page at a uniform
/// scale. Cropped or letterboxed images give wrong positions; see
/// [`detect_scale_drift`].
pub fn raster_to_pdf(rect: &RasterRect, image: ImageSize, page: PageSize) -> PdfRect {
    let ScaleFactors { scale_x, scale_y } = ScaleFactors::between(page, image);

    PdfRect {
        x: rect.x * scale_x,
        // Flip the y axis and anchor at the bottom edge
        y: page.height - (rect.y + rect.height) * scale_y,
        width: rect.width * scale_x,
        height: rect.height * scale_y,
    }
}

/// Convert a PDF rectangle back to raster space
pub fn pdf_to_raster(rect: &PdfRect, image: ImageSize, page: PageSize) -> RasterRect {
    let ScaleFactors { scale_x, scale_y } = ScaleFactors::between(page, image);

    let height = rect.height / scale_y;
    RasterRect {
        x: rect.x / scale_x,
        y: (page.height - rect.y) / scale_y - height,
        width: rect.width / scale_x,
        height,
    }
}

/// Render scales (pixels per point) that disagree with each other or with
/// the expected render scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDrift {
    pub render_scale_x: f64,
    pub render_scale_y: f64,
    pub expected: Option<f64>,
}

/// Check whether an image looks like an unscaled-aspect rendering of the page.
///
/// `tolerance` is relative; rasterizers round pixel dimensions, so a small
/// tolerance such as 0.01 avoids flagging ordinary rounding.
pub fn detect_scale_drift(
    image: ImageSize,
    page: PageSize,
    expected_render_scale: Option<f64>,
    tolerance: f64,
) -> Option<ScaleDrift> {
    let render_scale_x = image.width / page.width;
    let render_scale_y = image.height / page.height;

    let relative = |a: f64, b: f64| (a - b).abs() / a.abs().max(b.abs());

    let axes_disagree = relative(render_scale_x, render_scale_y) > tolerance;
    let off_expected = expected_render_scale.is_some_and(|expected| {
        relative(render_scale_x, expected) > tolerance
            || relative(render_scale_y, expected) > tolerance
    });

    if axes_disagree || off_expected {
        Some(ScaleDrift {
            render_scale_x,
            render_scale_y,
            expected: expected_render_scale,
        })
    } else {
        None
    }
}
