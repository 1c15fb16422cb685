//! Full decoding of a validated payload into image bytes.
//!
//! Extraction only probes a prefix of the payload; callers that write the
//! image to disk decode it here, which also sniffs the format and reads
//! the dimensions from the header without decoding pixels.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, ImageReader};

use crate::error::CoreError;

/// A decoded image payload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// Preferred file extension for the sniffed format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Decode a base64 payload and identify the image inside it.
pub fn decode_image(image_base64: &str) -> Result<DecodedImage, CoreError> {
    let bytes = STANDARD
        .decode(image_base64.trim())
        .map_err(|e| CoreError::InvalidImage(format!("base64 decode failed: {e}")))?;

    let format = image::guess_format(&bytes)
        .map_err(|e| CoreError::InvalidImage(format!("unrecognised image format: {e}")))?;

    let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format)
        .into_dimensions()
        .map_err(|e| CoreError::InvalidImage(format!("unreadable image header: {e}")))?;

    Ok(DecodedImage {
        bytes,
        format,
        width,
        height,
    })
}
