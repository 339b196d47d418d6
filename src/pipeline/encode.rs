//! Image encoding: `DynamicImage` → PNG bytes, and base64 PNG wrapped in
//! `ImageData` for the vision recognizer.
//!
//! PNG is used everywhere because it is lossless: JPEG artefacts around small
//! print make the transcript shorter and the legibility check stricter than
//! it should be.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a decoded upload as a base64 PNG ready for the vision API.
///
/// `detail: "high"` lets the model see the document at full tile resolution;
/// identity cards carry small print that a single low-detail tile loses.
pub fn encode_for_vision(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let buf = encode_png(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
