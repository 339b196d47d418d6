//! Decoding uploads to images, including rasterising the first page of PDFs.
//!
//! ## Why one decode step for both checks?
//!
//! The background check (photo) and the legibility check (identity
//! document) both need pixels. Routing both through [`decode_upload`] means a
//! file that cannot be turned into pixels fails the same way in either slot:
//! a [`Rejection::DecodeFailure`] shown to the applicant.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not safe to call
//! from async contexts. Rasterising runs on the blocking pool so Tokio worker
//! threads never stall on it.

use crate::config::MAX_RENDERED_PIXELS;
use crate::error::{GatePassError, Rejection};
use crate::model::{DocumentSlot, MediaKind, UploadedDocument};
use crate::pipeline::input::sniff_media_kind;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind the pdfium library.
///
/// Resolution order: `lib_path` → `PDFIUM_LIB_PATH` → system loader. Call it
/// on the thread that will use the returned instance.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, GatePassError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let bindings = match lib_path.map(Path::to_path_buf).or(env_path) {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| GatePassError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Decode an upload into pixels.
///
/// PNG and JPEG content is decoded directly; PDF content has its first page
/// rasterised. The format is sniffed from the bytes, not taken from the
/// declared media type.
pub async fn decode_upload(
    slot: DocumentSlot,
    doc: &UploadedDocument,
    max_pixels: u32,
    lib_path: Option<&Path>,
) -> Result<DynamicImage, GatePassError> {
    let kind = sniff_media_kind(&doc.bytes).ok_or_else(|| Rejection::DecodeFailure {
        slot,
        detail: "not a PNG, JPEG or PDF file".to_string(),
    })?;

    match kind {
        MediaKind::Png | MediaKind::Jpeg => {
            let img = image::load_from_memory(&doc.bytes).map_err(|e| {
                Rejection::DecodeFailure {
                    slot,
                    detail: e.to_string(),
                }
            })?;
            debug!("{} decoded as {:?} → {}x{} px", slot, kind, img.width(), img.height());
            Ok(img)
        }
        MediaKind::Pdf => {
            let bytes = doc.bytes.clone();
            let lib_path = lib_path.map(Path::to_path_buf);
            tokio::task::spawn_blocking(move || {
                let pdfium = bind_pdfium(lib_path.as_deref())?;
                render_first_page(&pdfium, slot, &bytes, max_pixels)
            })
            .await
            .map_err(|e| GatePassError::Internal(format!("Render task panicked: {}", e)))?
        }
    }
}

/// Longest rendered edge as pdfium wants it. The config field is public, so
/// the builder's clamp is applied again here.
fn render_target(max_pixels: u32) -> i32 {
    max_pixels.clamp(1, MAX_RENDERED_PIXELS) as i32
}

/// Blocking rasterisation of page 1.
fn render_first_page(
    pdfium: &Pdfium,
    slot: DocumentSlot,
    bytes: &[u8],
    max_pixels: u32,
) -> Result<DynamicImage, GatePassError> {
    let decode_failure = |detail: String| GatePassError::from(Rejection::DecodeFailure { slot, detail });

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| decode_failure(format!("{:?}", e)))?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(decode_failure("document has no pages".to_string()));
    }

    let target = render_target(max_pixels);
    let render_config = PdfRenderConfig::new()
        .set_target_width(target)
        .set_maximum_height(target);

    let page = pages.get(0).map_err(|e| decode_failure(format!("{:?}", e)))?;
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| decode_failure(format!("{:?}", e)))?;

    let image = bitmap.as_image();
    info!(
        "{} PDF ({} pages) page 1 rendered → {}x{} px",
        slot,
        pages.len(),
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::TextRecognizer;
    use crate::pipeline::validate::check_text_legibility;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn render_target_stays_in_i32_range() {
        assert_eq!(render_target(2000), 2000);
        assert_eq!(render_target(0), 1);
        assert_eq!(render_target(u32::MAX), MAX_RENDERED_PIXELS as i32);
        assert_eq!(render_target(i32::MAX as u32 + 1), MAX_RENDERED_PIXELS as i32);
    }

    #[tokio::test]
    async fn decodes_png_without_pdfium() {
        let img = RgbImage::from_pixel(12, 8, Rgb([255, 255, 255]));
        let doc = UploadedDocument::new(png_bytes(&img), "image/png");
        let decoded = decode_upload(DocumentSlot::Passport, &doc, 2000, None)
            .await
            .unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 8));
    }

    #[tokio::test]
    async fn unknown_content_is_a_decode_failure() {
        let doc = UploadedDocument::new(b"just some text".to_vec(), "image/png");
        let err = decode_upload(DocumentSlot::Identity, &doc, 2000, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.rejection(),
            Some(Rejection::DecodeFailure {
                slot: DocumentSlot::Identity,
                ..
            })
        ));
    }

    /// Reads a fixed line whenever the page carries ink, nothing otherwise.
    struct InkReader;

    #[async_trait::async_trait]
    impl TextRecognizer for InkReader {
        async fn recognize(&self, image: &DynamicImage) -> Result<String, GatePassError> {
            let inked = image.to_luma8().pixels().any(|p| p.0[0] < 128);
            Ok(if inked {
                "GOVERNMENT OF INDIA Asha Rao DOB 14/02/2004 1234 5678 9012".into()
            } else {
                String::new()
            })
        }
    }

    fn one_page_pdf(lines: &[&str]) -> Vec<u8> {
        let pdfium = bind_pdfium(None).unwrap();
        let mut document = pdfium.create_new_pdf().unwrap();
        let font = document.fonts_mut().helvetica();
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
        for (i, line) in lines.iter().enumerate() {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(50.0),
                    PdfPoints::new(780.0 - 24.0 * i as f32),
                    line,
                    font,
                    PdfPoints::new(16.0),
                )
                .unwrap();
        }
        drop(page);
        document.save_to_bytes().unwrap()
    }

    async fn pdf_is_legible(bytes: Vec<u8>) -> bool {
        let doc = UploadedDocument::new(bytes, "application/pdf");
        let page = decode_upload(DocumentSlot::Identity, &doc, 1000, None)
            .await
            .unwrap();
        assert!(page.width() > 0 && page.height() > 0);
        check_text_legibility(&page, &InkReader, 50).await.unwrap()
    }

    #[tokio::test]
    async fn pdf_first_page_with_text_is_legible() {
        if bind_pdfium(None).is_err() {
            eprintln!("SKIP: pdfium library not available");
            return;
        }
        let bytes = one_page_pdf(&[
            "GOVERNMENT OF INDIA",
            "Asha Rao",
            "DOB: 14/02/2004    Female",
            "1234 5678 9012",
        ]);
        assert!(pdf_is_legible(bytes).await);
    }

    #[tokio::test]
    async fn blank_pdf_page_is_not_legible() {
        if bind_pdfium(None).is_err() {
            eprintln!("SKIP: pdfium library not available");
            return;
        }
        assert!(!pdf_is_legible(one_page_pdf(&[])).await);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_a_decode_failure() {
        if bind_pdfium(None).is_err() {
            eprintln!("SKIP: pdfium library not available");
            return;
        }
        let doc = UploadedDocument::new(b"%PDF-1.7\n%garbage".to_vec(), "application/pdf");
        let err = decode_upload(DocumentSlot::Identity, &doc, 1000, None)
            .await
            .unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::DecodeFailure { .. })));
    }

    #[tokio::test]
    async fn truncated_png_is_a_decode_failure() {
        let img = RgbImage::from_pixel(40, 40, Rgb([10, 20, 30]));
        let mut bytes = png_bytes(&img);
        bytes.truncate(bytes.len() / 2);
        let doc = UploadedDocument::new(bytes, "image/png");
        let err = decode_upload(DocumentSlot::Passport, &doc, 2000, None)
            .await
            .unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::DecodeFailure { .. })));
    }
}
