//! Integration tests for the submission pipeline.
//!
//! OCR is replaced by a fixed-text recognizer, and stores are local
//! directories under a temp dir so the tests can check exactly what was
//! written. Issuance runs with a stub composer; the tests that build the real
//! PDF need the pdfium shared library and skip themselves when it cannot be
//! bound (set `PDFIUM_LIB_PATH`).
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test submit -- --nocapture

use async_trait::async_trait;
use gatepass::model::PendingRecord;
use gatepass::pipeline::render::bind_pdfium;
use gatepass::pipeline::validate::check_background_whiteness;
use gatepass::store::{StoreError, StoreResult};
use gatepass::{
    check_submission, submit, Application, GatePassConfig, GatePassError, GatePassRecord,
    PassComposer, QrPayload, RecordStore, Rejection, Stores, Submission, TextRecognizer,
    UploadedDocument,
};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use once_cell::sync::Lazy;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if pdfium cannot be bound.
macro_rules! skip_unless_pdfium {
    () => {{
        if let Err(e) = bind_pdfium(None) {
            println!("SKIP — pdfium not available: {e}");
            return;
        }
    }};
}

const AADHAAR_TEXT: &str = "GOVERNMENT OF INDIA\nAsha Rao\nDOB: 14/02/2004\nFemale\n\
1234 5678 9012\nMera Aadhaar, Meri Pehchaan";

/// Recognizer returning fixed text and counting its calls.
struct FixedText {
    text: String,
    calls: AtomicUsize,
}

impl FixedText {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextRecognizer for FixedText {
    async fn recognize(&self, _image: &DynamicImage) -> Result<String, GatePassError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Stands in for pdfium: records the photo it was handed and returns a
/// small PDF-looking byte string.
#[derive(Default)]
struct StubComposer {
    photo_size: Mutex<Option<(u32, u32)>>,
}

#[async_trait]
impl PassComposer for StubComposer {
    async fn compose(
        &self,
        app: &Application,
        photo: Option<DynamicImage>,
        qr_png: &[u8],
        _config: &GatePassConfig,
    ) -> Result<Vec<u8>, GatePassError> {
        *self.photo_size.lock().unwrap() = photo.as_ref().map(|p| (p.width(), p.height()));
        Ok(format!(
            "%PDF-1.7 {} {} qr={}",
            app.registration_number,
            app.email,
            qr_png.len()
        )
        .into_bytes())
    }
}

/// Record store whose writes always fail.
struct BrokenRecords;

#[async_trait]
impl RecordStore for BrokenRecords {
    async fn put(&self, record: PendingRecord) -> StoreResult<GatePassRecord> {
        Err(StoreError::WriteFailed {
            key: record.reg_no,
            detail: "record store offline".into(),
        })
    }

    async fn get(&self, _reg_no: &str) -> StoreResult<Option<GatePassRecord>> {
        Ok(None)
    }
}

fn noise(side: u32, border: u32) -> RgbImage {
    let mut state: u32 = 0x2545_F491;
    RgbImage::from_fn(side, side, |x, y| {
        let mut px = [0u8; 3];
        for c in px.iter_mut() {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *c = (state >> 24) as u8;
        }
        let edge = side - border;
        if x < border || y < border || x >= edge || y >= edge {
            px = [255, 255, 255];
        }
        Rgb(px)
    })
}

/// Noise JPEG with a 16 px white frame, so its corners survive compression.
/// Grown in 16 px steps until it passes 240 KB.
static JPEG_PHOTO: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut side = 64;
    loop {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(noise(side, 16))
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 90))
            .unwrap();
        if buf.len() >= 240 * 1024 {
            return buf;
        }
        side += 16;
    }
});

/// Noise PNG of `side`×`side` px with white corners. Noise barely
/// compresses, so 260 px lands at roughly 200 KB.
fn noise_png(side: u32, corner: [u8; 3]) -> Vec<u8> {
    let mut img = noise(side, 0);
    let last = side - 1;
    for (x, y) in [(0, 0), (last, 0), (0, last), (last, last)] {
        img.put_pixel(x, y, Rgb([255, 255, 255]));
    }
    img.put_pixel(last, last, Rgb(corner));

    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn white_photo() -> UploadedDocument {
    UploadedDocument::new(JPEG_PHOTO.clone(), "image/jpeg")
}

fn identity_scan() -> UploadedDocument {
    UploadedDocument::new(noise_png(280, [255, 255, 255]), "image/png")
}

fn asha() -> Submission {
    Submission {
        name: Some("Asha Rao".into()),
        reg_no: Some("SS-2024-001".into()),
        phone: Some("9876543210".into()),
        email: Some("asha@example.com".into()),
        passport: Some(white_photo()),
        identity: Some(identity_scan()),
    }
}

fn config_with(recognizer: Arc<FixedText>) -> GatePassConfig {
    GatePassConfig::builder()
        .recognizer(recognizer)
        .build()
        .unwrap()
}

fn stub_config(composer: Arc<StubComposer>) -> GatePassConfig {
    GatePassConfig::builder()
        .recognizer(FixedText::new(AADHAAR_TEXT))
        .composer(composer)
        .build()
        .unwrap()
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let p = e.path();
            if p.is_dir() {
                count_files(&p)
            } else {
                1
            }
        })
        .sum()
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

#[test]
fn fixtures_are_inside_size_bounds() {
    for bytes in [white_photo().bytes, identity_scan().bytes] {
        assert!(
            (102_400..=512_000).contains(&bytes.len()),
            "fixture is {} bytes",
            bytes.len()
        );
    }
}

#[test]
fn jpeg_photo_fixture_is_a_white_background_jpeg() {
    let bytes = &*JPEG_PHOTO;
    assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
    assert!(bytes.len() >= 240 * 1024);
    let photo = image::load_from_memory(bytes).unwrap();
    assert!(check_background_whiteness(&photo, 240));
}

// ── Rejections (no pdfium needed) ────────────────────────────────────────────

#[tokio::test]
async fn missing_field_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();
    let recognizer = FixedText::new(AADHAAR_TEXT);

    let mut s = asha();
    s.email = None;
    let err = submit(s, &stores, &config_with(recognizer.clone()))
        .await
        .unwrap_err();

    assert_eq!(
        err.user_message(),
        "Please fill all fields and upload both files."
    );
    assert_eq!(count_files(dir.path()), 0);
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_photo_is_rejected_before_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();
    let recognizer = FixedText::new(AADHAAR_TEXT);

    let mut s = asha();
    s.passport = Some(UploadedDocument::new(noise_png(420, [255, 255, 255]), "image/png"));
    let err = submit(s, &stores, &config_with(recognizer.clone()))
        .await
        .unwrap_err();

    match err.rejection() {
        Some(Rejection::SizeOutOfRange { size_kb, .. }) => assert!(*size_kb > 500),
        other => panic!("expected size rejection, got {other:?}"),
    }
    assert!(err.user_message().starts_with("Passport Error: File size must be between 100 KB and 500 KB."));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn undersized_identity_is_rejected() {
    let stores = Stores::in_memory("gatepasses");
    let mut s = asha();
    s.identity = Some(UploadedDocument::new(noise_png(40, [255, 255, 255]), "image/png"));
    let err = submit(s, &stores, &config_with(FixedText::new(AADHAAR_TEXT)))
        .await
        .unwrap_err();

    assert!(err.user_message().starts_with("Aadhar Error:"), "{}", err.user_message());
}

#[tokio::test]
async fn dark_corner_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();

    let mut s = asha();
    s.passport = Some(UploadedDocument::new(noise_png(260, [30, 30, 30]), "image/png"));
    let err = submit(s, &stores, &config_with(FixedText::new(AADHAAR_TEXT)))
        .await
        .unwrap_err();

    assert_eq!(err.rejection(), Some(&Rejection::BackgroundNotWhite));
    assert_eq!(err.user_message(), "Passport photo background must be white.");
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn illegible_identity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();
    let recognizer = FixedText::new("```\nGOVT OF [illegible]\n```");

    let err = submit(asha(), &stores, &config_with(recognizer.clone()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.rejection(),
        Some(Rejection::IllegibleDocument { chars_found: 7 })
    ));
    assert_eq!(
        err.user_message(),
        "Aadhar details not clear. Please upload a clearer image."
    );
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn undecodable_upload_is_rejected() {
    let stores = Stores::in_memory("gatepasses");
    let mut s = asha();
    // Right size, declared as PNG, but not an image
    s.passport = Some(UploadedDocument::new(vec![b'x'; 150 * 1024], "image/png"));
    let err = submit(s, &stores, &config_with(FixedText::new(AADHAAR_TEXT)))
        .await
        .unwrap_err();

    assert!(matches!(err.rejection(), Some(Rejection::DecodeFailure { .. })));
    assert!(err.user_message().starts_with("Passport Error:"));
}

#[tokio::test]
async fn check_submission_accepts_valid_uploads() {
    let app = check_submission(asha(), &config_with(FixedText::new(AADHAAR_TEXT)))
        .await
        .unwrap();
    assert_eq!(app.registration_number, "SS-2024-001");
}

// ── Issuance ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn issues_and_stores_pass() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();
    let composer = Arc::new(StubComposer::default());

    let pass = submit(asha(), &stores, &stub_config(composer.clone()))
        .await
        .unwrap();

    assert_eq!(pass.download_name, "GatePass_SS-2024-001.pdf");
    assert!(pass.document.starts_with(b"%PDF"));
    assert_eq!(
        pass.qr_payload,
        "Name:Asha Rao|RegNo:SS-2024-001|Email:asha@example.com|Phone:9876543210"
    );

    // The decoded JPEG is what reaches the composer
    let photo = image::load_from_memory(&JPEG_PHOTO).unwrap();
    assert_eq!(
        *composer.photo_size.lock().unwrap(),
        Some((photo.width(), photo.height()))
    );

    let base = dir.path().join("gatepasses/SS-2024-001");
    for blob in ["passport", "aadhar", "qr.png", "gatepass.pdf"] {
        assert!(base.join(blob).is_file(), "missing blob {blob}");
    }
    assert_eq!(std::fs::read(base.join("passport")).unwrap(), *JPEG_PHOTO);
    assert_eq!(std::fs::read(base.join("qr.png")).unwrap(), pass.qr_png);
    assert_eq!(std::fs::read(base.join("gatepass.pdf")).unwrap(), pass.document);
    assert_eq!(count_files(dir.path()), 5);

    let record = stores.records.get("SS-2024-001").await.unwrap().unwrap();
    assert_eq!(record, pass.record);
    assert_eq!(record.name, "Asha Rao");
    assert_eq!(record.email, "asha@example.com");
    assert_eq!(record.phone, "9876543210");
    assert_eq!(record.qr_path, "gatepasses/SS-2024-001/qr.png");
    assert_eq!(record.pdf_path, "gatepasses/SS-2024-001/gatepass.pdf");
}

#[tokio::test]
async fn issued_qr_decodes_to_payload() {
    let stores = Stores::in_memory("gatepasses");
    let pass = submit(asha(), &stores, &stub_config(Arc::default()))
        .await
        .unwrap();

    let img = image::load_from_memory(&pass.qr_png).unwrap().to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        img.width() as usize,
        img.height() as usize,
        |x, y| img.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1);
    let (_meta, content) = grids[0].decode().unwrap();

    let parsed = QrPayload::parse(&content).unwrap();
    assert_eq!(parsed.name, "Asha Rao");
    assert_eq!(parsed.reg_no, "SS-2024-001");
    assert_eq!(parsed.email, "asha@example.com");
    assert_eq!(parsed.phone, "9876543210");
}

#[tokio::test]
async fn resubmission_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();
    let config = stub_config(Arc::default());

    let first = submit(asha(), &stores, &config).await.unwrap();
    let files_after_first = count_files(dir.path());

    let mut again = asha();
    again.email = Some("asha.rao@example.com".into());
    let second = submit(again, &stores, &config).await.unwrap();

    // four blobs + one record, still
    assert_eq!(files_after_first, 5);
    assert_eq!(count_files(dir.path()), 5);

    let record = stores.records.get("SS-2024-001").await.unwrap().unwrap();
    assert_eq!(record.email, "asha.rao@example.com");
    assert!(record.created_at >= first.record.created_at);
    assert_eq!(record, second.record);
    assert_eq!(
        std::fs::read(dir.path().join("gatepasses/SS-2024-001/gatepass.pdf")).unwrap(),
        second.document
    );
}

#[tokio::test]
async fn failed_resubmission_keeps_earlier_pass_intact() {
    let dir = tempfile::tempdir().unwrap();
    let stores = Stores::local(dir.path(), "gatepasses").unwrap();
    let config = stub_config(Arc::default());
    let first = submit(asha(), &stores, &config).await.unwrap();

    let broken = Stores::new(stores.blobs.clone(), Arc::new(BrokenRecords));
    let mut again = asha();
    again.email = Some("asha.rao@example.com".into());
    let err = submit(again, &broken, &config).await.unwrap_err();
    assert!(matches!(err, GatePassError::RecordWriteFailed { .. }));

    let record = stores.records.get("SS-2024-001").await.unwrap().unwrap();
    assert_eq!(record, first.record);
    assert_eq!(
        std::fs::read(dir.path().join(&record.pdf_path)).unwrap(),
        first.document
    );
    assert_eq!(
        std::fs::read(dir.path().join(&record.qr_path)).unwrap(),
        first.qr_png
    );
    assert_eq!(count_files(dir.path()), 5, "no set-aside copies left behind");
}

// ── Real PDF (needs pdfium) ──────────────────────────────────────────────────

#[tokio::test]
async fn issues_single_page_pdf_with_pdfium() {
    skip_unless_pdfium!();
    let stores = Stores::in_memory("gatepasses");

    let pass = submit(asha(), &stores, &config_with(FixedText::new(AADHAAR_TEXT)))
        .await
        .unwrap();
    assert!(pass.document.starts_with(b"%PDF"));

    let pdfium = bind_pdfium(None).unwrap();
    let doc = pdfium.load_pdf_from_byte_slice(&pass.document, None).unwrap();
    assert_eq!(doc.pages().len(), 1);
    let text = doc.pages().get(0).unwrap().text().unwrap().all();
    assert!(text.contains("Name: Asha Rao"), "page text: {text}");
    assert!(text.contains("Email: asha@example.com"));
}
