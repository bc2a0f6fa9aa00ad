//! Signature image decoding and embedding
//!
//! Signature stamps carry a PNG as a base64 data URI. The PNG is decoded to
//! 8-bit RGB plus an optional alpha channel and embedded as an image XObject,
//! with the alpha channel attached as a soft mask.

use std::io::{Cursor, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::{dictionary, Document, ObjectId, Stream};
use png::{ColorType, Transformations};

use crate::error::StampError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Decoded payload of a `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Parse a `data:[<mime>][;base64],<payload>` URI.
///
/// Only base64 payloads are accepted; signature capture always produces them.
pub fn parse_data_uri(uri: &str) -> Result<DataUri, StampError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| StampError::InvalidDataUri("missing data: scheme".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StampError::InvalidDataUri("missing ',' separator".to_string()))?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default().to_string();
    if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(StampError::InvalidDataUri(
            "payload is not base64 encoded".to_string(),
        ));
    }

    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| StampError::InvalidDataUri(format!("base64: {}", e)))?;

    if data.is_empty() {
        return Err(StampError::InvalidDataUri("empty payload".to_string()));
    }

    Ok(DataUri { mime, data })
}

/// 8-bit RGB pixels with an optional 8-bit alpha plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    /// `None` when the image is fully opaque
    pub alpha: Option<Vec<u8>>,
}

/// Decode a PNG, normalising palette, gray and 16-bit inputs to 8-bit RGB
pub fn decode_png(bytes: &[u8]) -> Result<DecodedImage, StampError> {
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Err(StampError::ImageDecode("not a PNG image".to_string()));
    }

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| StampError::ImageDecode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| StampError::ImageDecode(e.to_string()))?;
    let pixels = &buf[..info.buffer_size()];

    if info.width == 0 || info.height == 0 {
        return Err(StampError::ImageDecode("image has no pixels".to_string()));
    }

    let pixel_count = info.width as usize * info.height as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::new();

    match info.color_type {
        ColorType::Rgb => rgb.extend_from_slice(pixels),
        ColorType::Rgba => {
            alpha.reserve(pixel_count);
            for px in pixels.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
        }
        ColorType::Grayscale => {
            for &gray in pixels {
                rgb.extend_from_slice(&[gray, gray, gray]);
            }
        }
        ColorType::GrayscaleAlpha => {
            alpha.reserve(pixel_count);
            for px in pixels.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
        }
        ColorType::Indexed => {
            return Err(StampError::ImageDecode(
                "palette image was not expanded".to_string(),
            ))
        }
    }

    if rgb.len() != pixel_count * 3 {
        return Err(StampError::ImageDecode(format!(
            "expected {} RGB bytes, decoded {}",
            pixel_count * 3,
            rgb.len()
        )));
    }

    let alpha = if alpha.is_empty() || alpha.iter().all(|&a| a == u8::MAX) {
        None
    } else {
        Some(alpha)
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}

/// Decode the PNG carried by a signature stamp's content
pub fn decode_signature(content: &str) -> Result<DecodedImage, StampError> {
    let uri = parse_data_uri(content)?;
    decode_png(&uri.data)
}

/// Add `image` to the document as an image XObject and return its id
pub fn embed_image(doc: &mut Document, image: &DecodedImage) -> Result<ObjectId, StampError> {
    let width = image.width as i64;
    let height = image.height as i64;

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &image.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            flate_compress(alpha)?,
        );
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", smask_id);
    }

    let stream = Stream::new(image_dict, flate_compress(&image.rgb)?);
    Ok(doc.add_object(stream))
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, StampError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| StampError::ImageEmbed(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| StampError::ImageEmbed(format!("compression failed: {}", e)))
}
