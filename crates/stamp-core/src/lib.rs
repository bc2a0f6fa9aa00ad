//! Stamp placement and export for PDF documents
//!
//! Stamps (signatures, text, dates and checkmarks) are placed on rendered
//! page images in pixel coordinates, edited with linear undo/redo, and
//! finally drawn into the page content of a new PDF using lopdf.
//!
//! - [`stamp`] / [`history`]: the stamp collection and its snapshot log
//! - [`coords`]: raster to PDF coordinate transform
//! - [`export`]: the export engine, built on [`draw`] and [`image`]
//! - [`state`] / [`command`]: the session object a UI drives

pub mod command;
pub mod config;
pub mod coords;
pub mod draw;
pub mod error;
pub mod export;
pub mod history;
pub mod image;
pub mod page_info;
pub mod raster;
pub mod stamp;
pub mod state;

pub use command::StampCommand;
pub use config::StampConfig;
pub use coords::{pdf_to_raster, raster_to_pdf, PdfRect, RasterRect};
pub use error::StampError;
pub use export::{export_pdf, DriftPolicy, ExportMetrics, ExportOptions, ExportOutput};
pub use history::EditHistory;
pub use page_info::PageGeometry;
pub use raster::{PageImage, Rasterizer, ScaledPageRasterizer};
pub use stamp::{CheckmarkVariant, Stamp, StampCollection, StampId, StampKind, StampPatch};
pub use state::{output_filename, AppState, Tool};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize, StampError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| StampError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len())
}
