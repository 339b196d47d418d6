//! Upload validation: size bounds, photo background whiteness, identity
//! document legibility.
//!
//! ## Check order
//!
//! ```text
//! passport: size ──▶ decode ──▶ whiteness
//! identity: size ──▶ decode ──▶ legibility (OCR)
//! ```
//!
//! The first failing check returns its [`Rejection`] and nothing after it
//! runs. The OCR call comes last because it is the only check with network
//! I/O and the only one that costs money.

use crate::config::GatePassConfig;
use crate::error::{GatePassError, Rejection};
use crate::model::{DocumentSlot, UploadedDocument};
use crate::pipeline::input::CollectedInput;
use crate::pipeline::ocr::TextRecognizer;
use crate::pipeline::postprocess::clean_transcript;
use crate::pipeline::render::decode_upload;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

/// What validation learned about the uploads, for the generator.
pub struct ValidatedUploads {
    /// Decoded passport photo, placed on the gate pass.
    pub photo: DynamicImage,
    /// Characters recognised on the identity document after cleanup.
    pub identity_chars: usize,
}

/// Run every upload check on a collected submission, in order.
pub async fn validate_uploads(
    input: &CollectedInput,
    recognizer: &dyn TextRecognizer,
    config: &GatePassConfig,
) -> Result<ValidatedUploads, GatePassError> {
    let lib_path = config.pdfium_lib_path.as_deref();

    // Passport photo
    check_size(DocumentSlot::Passport, &input.passport, config)?;
    let photo = decode_upload(
        DocumentSlot::Passport,
        &input.passport,
        config.max_rendered_pixels,
        lib_path,
    )
    .await?;
    if !check_background_whiteness(&photo, config.whiteness_threshold) {
        return Err(Rejection::BackgroundNotWhite.into());
    }

    // Identity document
    check_size(DocumentSlot::Identity, &input.identity, config)?;
    let identity = decode_upload(
        DocumentSlot::Identity,
        &input.identity,
        config.max_rendered_pixels,
        lib_path,
    )
    .await?;
    let identity_chars = recognised_char_count(&identity, recognizer).await?;
    if identity_chars <= config.min_text_chars {
        return Err(Rejection::IllegibleDocument {
            chars_found: identity_chars,
        }
        .into());
    }

    info!(
        "Uploads for {} passed validation ({} characters on identity document)",
        input.application.registration_number, identity_chars
    );
    Ok(ValidatedUploads {
        photo,
        identity_chars,
    })
}

fn check_size(
    slot: DocumentSlot,
    doc: &UploadedDocument,
    config: &GatePassConfig,
) -> Result<(), Rejection> {
    validate_size(slot, doc.len(), config.min_size_kb, config.max_size_kb)
}

/// Pass iff `min_kb * 1024 <= len <= max_kb * 1024`.
///
/// The rejection reports the size in whole KB, rounded down.
pub fn validate_size(slot: DocumentSlot, len: usize, min_kb: u64, max_kb: u64) -> Result<(), Rejection> {
    let len = len as u64;
    let size_kb = len / 1024;
    debug!("{} upload is {} bytes ({} KB)", slot, len, size_kb);
    if len < min_kb.saturating_mul(1024) || len > max_kb.saturating_mul(1024) {
        return Err(Rejection::SizeOutOfRange {
            slot,
            size_kb,
            min_kb,
            max_kb,
        });
    }
    Ok(())
}

/// True iff every corner pixel's RGB mean is strictly above `threshold`.
///
/// Alpha is ignored. An image without pixels fails.
pub fn check_background_whiteness(image: &DynamicImage, threshold: u8) -> bool {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return false;
    }
    let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];
    // mean > t  ⇔  sum > 3t, without rounding
    let limit = 3 * u32::from(threshold);
    corners.iter().all(|&(x, y)| {
        let px = image.get_pixel(x, y);
        let sum: u32 = px.0[..3].iter().map(|&c| u32::from(c)).sum();
        sum > limit
    })
}

/// Recognise `image` and count the characters of the cleaned, trimmed
/// transcript.
pub async fn recognised_char_count(
    image: &DynamicImage,
    recognizer: &dyn TextRecognizer,
) -> Result<usize, GatePassError> {
    let raw = recognizer.recognize(image).await?;
    let count = clean_transcript(&raw).chars().count();
    debug!("Recognised {} characters ({} raw bytes)", count, raw.len());
    Ok(count)
}

/// True iff the recognised text is longer than `min_chars` characters.
pub async fn check_text_legibility(
    image: &DynamicImage,
    recognizer: &dyn TextRecognizer,
    min_chars: usize,
) -> Result<bool, GatePassError> {
    Ok(recognised_char_count(image, recognizer).await? > min_chars)
}
