//! Pipeline stages for issuing a gate pass.
//!
//! Each submodule implements one step, so each is testable on its own and a
//! backend (OCR engine, PDF library, store) can change without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ validate ──────────────────────────▶ qr ──▶ document ──▶ persist
//!  (fields)   │ render  (decode / rasterise)      (payload)  (A4 PDF)   (blobs + record)
//!             │ ocr ◀── encode (base64 PNG)
//!             └ postprocess (transcript cleanup)
//! ```
//!
//! 1. [`input`] — required fields, registration number, declared media types
//! 2. [`validate`] — size bounds, photo background, identity legibility;
//!    uses [`render`] to get pixels, [`ocr`] + [`postprocess`] to count text
//! 3. [`qr`] — payload string and QR PNG
//! 4. [`document`] — the single-page gate pass; pdfium work runs in
//!    `spawn_blocking`
//! 5. [`persist`] — two-phase write with rollback

pub mod document;
pub mod encode;
pub mod input;
pub mod ocr;
pub mod persist;
pub mod postprocess;
pub mod qr;
pub mod render;
pub mod validate;
