//! # gatepass
//!
//! Validate an applicant's uploads, generate a QR-encoded gate pass PDF, and
//! store the documents and a record of the pass.
//!
//! ## Why this crate?
//!
//! Workshop registrations arrive as a form: four text fields, a passport
//! photo, and a photo or scan of an identity card. Before a pass is printed
//! someone has to check that the photo has a white background, the ID is
//! readable, and the files are a sensible size. This crate does those checks
//! with simple heuristics, then builds the pass and files everything away.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Submission
//!  │
//!  ├─ 1. Collect   required fields, registration number, media types
//!  ├─ 2. Validate  size bounds → photo background → ID legibility (vision OCR)
//!  ├─ 3. Generate  QR payload + PNG, single-page A4 PDF (pdfium, spawn_blocking)
//!  └─ 4. Persist   four blobs, then the record; rollback on failure
//! ```
//!
//! The first failing check stops the submission with one user-facing
//! [`Rejection`], before anything is written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gatepass::{pipeline::input::read_upload, submit, GatePassConfig, Stores, Submission};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = GatePassConfig::default();
//!     let stores = Stores::local("./gatepass-data", "gatepasses")?;
//!
//!     let submission = Submission {
//!         name: Some("Asha Rao".into()),
//!         reg_no: Some("SS-2024-001".into()),
//!         phone: Some("9876543210".into()),
//!         email: Some("asha@example.com".into()),
//!         passport: Some(read_upload(Path::new("photo.jpg")).await?),
//!         identity: Some(read_upload(Path::new("aadhar.pdf")).await?),
//!     };
//!
//!     match submit(submission, &stores, &config).await {
//!         Ok(pass) => println!("issued {}", pass.download_name),
//!         Err(e) => eprintln!("{}", e.user_message()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `gatepass` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `s3`    | off     | [`Stores::s3`] over Amazon S3 or a compatible service |
//! | `gcs`   | off     | [`Stores::gcs`] over Google Cloud Storage |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! gatepass = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! PDF uploads and the gate pass itself go through pdfium. Point
//! `PDFIUM_LIB_PATH` at `libpdfium` (or set
//! [`GatePassConfig::pdfium_lib_path`]) if it is not on the loader path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod submit;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GatePassConfig, GatePassConfigBuilder};
pub use error::{GatePassError, Rejection};
pub use model::{
    Application, DocumentSlot, GatePassRecord, IssuedPass, Submission, UploadedDocument,
};
pub use pipeline::document::{PassComposer, PdfiumComposer};
pub use pipeline::ocr::{TextRecognizer, VisionRecognizer};
pub use pipeline::qr::QrPayload;
pub use progress::{NoopProgressCallback, ProgressCallback, Stage, SubmissionProgressCallback};
pub use store::{BlobStore, RecordStore, StoreError, Stores};
pub use submit::{check_submission, submit, submit_sync, write_download};
