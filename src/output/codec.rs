//! Base64 image codec.
//!
//! Images travel as standard-alphabet base64. Inbound payloads may carry a
//! `data:<mime>;base64,` prefix and may be any format the `image` crate was
//! built with (PNG, JPEG). Outbound images are always PNG.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::CodecError;

/// Decode a base64 string into an image.
pub fn decode_base64_image(data: &str) -> Result<DynamicImage, CodecError> {
    let payload = strip_data_url(data.trim());
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| CodecError::Base64(e.to_string()))?;

    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))
}

/// Encode an image as base64 PNG.
pub fn encode_png_base64(image: &DynamicImage) -> Result<String, CodecError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(buf))
}

fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some((_, payload)) = data.split_once("base64,") {
            return payload;
        }
    }
    data
}
