//! Persistence boundary: encoded image bytes ↔ pixel buffers.
//!
//! The engine never touches files or documents. It hands out a drawing's
//! pixels as PNG bytes and accepts encoded images (any format the `image`
//! crate was built with) to initialize a drawing. Project documents carry
//! images as base64 `data:` URLs.

use crate::error::EngineError;
use crate::raster::PixelBuffer;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode a buffer as PNG.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, EngineError> {
    let image = RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec())
        .ok_or_else(|| EngineError::Encode("buffer does not match its dimensions".into()))?;
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Decode an encoded image into an RGBA buffer.
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer, EngineError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| EngineError::Decode(e.to_string()))?
        .into_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EngineError::Decode(format!("empty {width}x{height} image")));
    }
    PixelBuffer::from_rgba(width, height, image.into_raw())
}

/// Encode a buffer as a `data:image/png;base64,...` URL.
pub fn encode_data_url(buffer: &PixelBuffer) -> Result<String, EngineError> {
    let png = encode_png(buffer)?;
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png)))
}

/// Decode a base64 `data:` URL of any supported image type.
pub fn decode_data_url(url: &str) -> Result<PixelBuffer, EngineError> {
    let (header, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| EngineError::Decode("not a data URL".into()))?;
    if !header.ends_with(";base64") {
        return Err(EngineError::Decode(format!("unsupported data URL encoding {header:?}")));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| EngineError::Decode(e.to_string()))?;
    decode_image(&bytes)
}
