use thiserror::Error;

use crate::stamp::StampId;

#[derive(Error, Debug)]
pub enum StampError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Invalid signature image: {0}")]
    ImageDecode(String),

    #[error("Failed to embed image: {0}")]
    ImageEmbed(String),

    #[error("Page image {page_index} has unusable dimensions {width}x{height}")]
    InvalidPageImage {
        page_index: usize,
        width: u32,
        height: u32,
    },

    #[error(
        "Raster scale mismatch on page {page_index}: horizontal {scale_x:.4}, vertical {scale_y:.4}"
    )]
    ScaleMismatch {
        page_index: usize,
        scale_x: f64,
        scale_y: f64,
    },

    #[error("Page {page_index} out of range (document has {page_count} pages)")]
    PageOutOfRange { page_index: usize, page_count: usize },

    #[error("Stamp not found: {0}")]
    StampNotFound(StampId),

    #[error("Duplicate stamp id: {0}")]
    DuplicateStampId(StampId),

    #[error("No document loaded")]
    NoDocument,

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
