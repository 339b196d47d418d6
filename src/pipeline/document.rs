//! Gate pass composition: one A4 page with header, photo, details and QR.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          Gate Pass for Drone Workshop     │  top − 50   (bold 18, centred)
//! │      Skill Stork International School …   │  top − 70   (12, centred)
//! │                                           │
//! │  ┌──────┐   Name: …                       │  top − 150
//! │  │photo │   Registration No: …            │  top − 170
//! │  │      │   Phone: …                      │  top − 190
//! │  └──────┘   Email: …                      │  top − 210
//! │  ┌──────┐                                 │
//! │  │  QR  │                                 │
//! │  └──────┘                                 │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Coordinates are PDF points from the bottom-left corner. Like rasterising,
//! composition runs on the blocking pool with its own pdfium binding.
//!
//! [`PdfiumComposer`] is the [`PassComposer`] used unless the config carries
//! another one.

use crate::config::GatePassConfig;
use crate::error::GatePassError;
use crate::model::Application;
use crate::pipeline::render::bind_pdfium;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, warn};

const TITLE_SIZE: f32 = 18.0;
const SUBTITLE_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 12.0;
const TITLE_OFFSET: f32 = 50.0;
const SUBTITLE_OFFSET: f32 = 70.0;
const DETAILS_X: f32 = 200.0;
const DETAILS_FIRST_OFFSET: f32 = 150.0;
const DETAILS_LINE_GAP: f32 = 20.0;
const IMAGE_X: f32 = 50.0;
const IMAGE_SIDE: f32 = 100.0;
const PHOTO_OFFSET: f32 = 250.0;
const QR_OFFSET: f32 = 350.0;

/// Everything printed on a gate pass.
struct PassContent {
    title: String,
    subtitle: String,
    details: [String; 4],
    photo: Option<DynamicImage>,
    qr: DynamicImage,
}

/// Turns an accepted application into the gate pass document.
#[async_trait]
pub trait PassComposer: Send + Sync {
    /// `photo` is the decoded passport upload; `qr_png` the encoded QR image.
    async fn compose(
        &self,
        app: &Application,
        photo: Option<DynamicImage>,
        qr_png: &[u8],
        config: &GatePassConfig,
    ) -> Result<Vec<u8>, GatePassError>;
}

/// Single-page A4 PDF built with pdfium. See [`compose_gate_pass`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumComposer;

#[async_trait]
impl PassComposer for PdfiumComposer {
    async fn compose(
        &self,
        app: &Application,
        photo: Option<DynamicImage>,
        qr_png: &[u8],
        config: &GatePassConfig,
    ) -> Result<Vec<u8>, GatePassError> {
        compose_gate_pass(app, photo, qr_png, config).await
    }
}

/// Build the gate pass PDF for `app`.
///
/// `photo` is the decoded passport upload; if absent, the page is produced
/// without it. `qr_png` is the encoded QR image.
pub async fn compose_gate_pass(
    app: &Application,
    photo: Option<DynamicImage>,
    qr_png: &[u8],
    config: &GatePassConfig,
) -> Result<Vec<u8>, GatePassError> {
    let qr = image::load_from_memory(qr_png)
        .map_err(|e| GatePassError::DocumentCompositionFailed(format!("QR image: {}", e)))?;

    if photo.is_none() {
        warn!(
            "No photo for {}; composing gate pass without it",
            app.registration_number
        );
    }

    let content = PassContent {
        title: config.title.clone(),
        subtitle: config.subtitle.clone(),
        details: [
            format!("Name: {}", app.name),
            format!("Registration No: {}", app.registration_number),
            format!("Phone: {}", app.phone),
            format!("Email: {}", app.email),
        ],
        photo,
        qr,
    };
    let lib_path: Option<PathBuf> = config.pdfium_lib_path.clone();

    let bytes = tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(lib_path.as_deref())?;
        render_pass(&pdfium, &content)
    })
    .await
    .map_err(|e| GatePassError::Internal(format!("Compose task panicked: {}", e)))??;

    debug!(
        "Composed gate pass for {} ({} bytes)",
        app.registration_number,
        bytes.len()
    );
    Ok(bytes)
}

fn compose_err(e: PdfiumError) -> GatePassError {
    GatePassError::DocumentCompositionFailed(format!("{:?}", e))
}

/// Blocking page construction.
fn render_pass(pdfium: &Pdfium, content: &PassContent) -> Result<Vec<u8>, GatePassError> {
    let mut document = pdfium.create_new_pdf().map_err(compose_err)?;

    // Font tokens must be obtained before the page borrows the document.
    let bold = document.fonts_mut().helvetica_bold();
    let regular = document.fonts_mut().helvetica();

    let title = centred_text(&document, &content.title, bold, TITLE_SIZE, TITLE_OFFSET)?;
    let subtitle = centred_text(
        &document,
        &content.subtitle,
        regular,
        SUBTITLE_SIZE,
        SUBTITLE_OFFSET,
    )?;

    let mut page = document
        .pages_mut()
        .create_page_at_end(PdfPagePaperSize::a4())
        .map_err(compose_err)?;
    let top = page.height().value;

    let objects = page.objects_mut();
    for mut header in [title, subtitle] {
        // centred_text positions relative to the top; shift onto the page
        header.translate(PdfPoints::ZERO, PdfPoints::new(top)).map_err(compose_err)?;
        objects.add_text_object(header).map_err(compose_err)?;
    }

    for (i, line) in content.details.iter().enumerate() {
        let y = top - DETAILS_FIRST_OFFSET - DETAILS_LINE_GAP * i as f32;
        objects
            .create_text_object(
                PdfPoints::new(DETAILS_X),
                PdfPoints::new(y),
                line,
                regular,
                PdfPoints::new(BODY_SIZE),
            )
            .map_err(compose_err)?;
    }

    let side = Some(PdfPoints::new(IMAGE_SIDE));
    if let Some(photo) = &content.photo {
        objects
            .create_image_object(
                PdfPoints::new(IMAGE_X),
                PdfPoints::new(top - PHOTO_OFFSET),
                photo,
                side,
                side,
            )
            .map_err(compose_err)?;
    }
    objects
        .create_image_object(
            PdfPoints::new(IMAGE_X),
            PdfPoints::new(top - QR_OFFSET),
            &content.qr,
            side,
            side,
        )
        .map_err(compose_err)?;
    drop(page);

    document.save_to_bytes().map_err(compose_err)
}

/// A detached text object horizontally centred on an A4 page, with its
/// baseline `offset` points below y = 0.
fn centred_text<'a>(
    document: &PdfDocument<'a>,
    text: &str,
    font: PdfFontToken,
    size: f32,
    offset: f32,
) -> Result<PdfPageTextObject<'a>, GatePassError> {
    let mut object =
        PdfPageTextObject::new(document, text, font, PdfPoints::new(size)).map_err(compose_err)?;
    let page_width = PdfPagePaperSize::a4().width().value;
    let text_width = match object.width() {
        Ok(w) if w.value > 0.0 => w.value,
        // Helvetica averages about half an em per character
        _ => text.chars().count() as f32 * size * 0.5,
    };
    object
        .translate(
            PdfPoints::new((page_width - text_width) / 2.0),
            PdfPoints::new(-offset),
        )
        .map_err(compose_err)?;
    Ok(object)
}
