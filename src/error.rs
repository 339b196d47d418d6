//! Error types for the gatepass library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Rejection`] — **User-facing**: the applicant's input failed a check
//!   (missing field, file too large, background not white, unreadable
//!   document). Its `Display` text is the one message shown to the applicant,
//!   and nothing has been written when it is returned.
//!
//! * [`GatePassError`] — **Fatal**: everything else (store write failed, OCR
//!   provider unreachable, pdfium not bound). A rejection travels inside it as
//!   [`GatePassError::Rejected`] so the top-level functions have one `Err`
//!   type.
//!
//! Callers that only need "what do I show the user" use
//! [`GatePassError::user_message`].

use crate::model::DocumentSlot;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the gatepass library.
#[derive(Debug, Error)]
pub enum GatePassError {
    // ── Validation ────────────────────────────────────────────────────────
    /// A validation check failed; the submission was aborted before any write.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    // ── Input errors ──────────────────────────────────────────────────────
    /// An upload file given on the command line could not be read.
    #[error("Failed to read upload '{path}': {source}")]
    UploadReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// No text recognizer could be built (missing API key etc.).
    #[error("Text recognizer '{provider}' is not configured.\n{hint}")]
    RecognizerNotConfigured { provider: String, hint: String },

    /// The recognizer failed on every attempt.
    #[error("Text recognition failed after {retries} retries: {detail}")]
    RecognitionFailed { retries: u32, detail: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The QR payload could not be encoded (payload too long for any QR version).
    #[error("QR encoding failed: {0}")]
    QrEncodingFailed(String),

    /// pdfium refused to build the gate pass page.
    #[error("Gate pass composition failed: {0}")]
    DocumentCompositionFailed(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or pass --pdfium-lib, or install\n\
libpdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Storage errors ────────────────────────────────────────────────────
    /// A blob write failed. Blobs written earlier in the same submission
    /// have been deleted again.
    #[error("Failed to store '{key}': {source}")]
    StorageWriteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The metadata record write failed. All four blobs have been deleted again.
    #[error("Failed to write gate pass record for '{reg_no}': {source}")]
    RecordWriteFailed {
        reg_no: String,
        #[source]
        source: StoreError,
    },

    /// Could not write the downloadable copy of the gate pass.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatePassError {
    /// The single message to show the applicant for an aborted submission.
    pub fn user_message(&self) -> String {
        match self {
            GatePassError::Rejected(r) => r.to_string(),
            _ => "Something went wrong while issuing your gate pass. Please try again later."
                .to_string(),
        }
    }

    /// The rejection, if this error is a validation failure.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GatePassError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

/// A validation failure, reported to the applicant verbatim.
///
/// The first failing check wins; one submission produces at most one rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum Rejection {
    /// One of the four text fields or two uploads is missing or blank.
    #[error("Please fill all fields and upload both files.")]
    MissingField { field: String },

    /// The registration number cannot be used as a storage key.
    #[error(
        "Registration number '{reg_no}' may only contain letters, digits, '-', '_' and '.'"
    )]
    InvalidRegistrationNumber { reg_no: String },

    /// The declared media type is not one of png, jpeg or pdf.
    #[error("{slot} Error: unsupported file type '{media_type}'. Upload a PNG, JPEG or PDF.")]
    UnsupportedMediaType { slot: DocumentSlot, media_type: String },

    /// Upload size outside the configured closed interval.
    #[error(
        "{slot} Error: File size must be between {min_kb} KB and {max_kb} KB. Uploaded: {size_kb} KB"
    )]
    SizeOutOfRange {
        slot: DocumentSlot,
        size_kb: u64,
        min_kb: u64,
        max_kb: u64,
    },

    /// The upload is neither a decodable image nor a renderable document.
    #[error("{slot} Error: the file could not be read as an image or PDF ({detail})")]
    DecodeFailure { slot: DocumentSlot, detail: String },

    /// At least one corner of the photo is darker than the whiteness threshold.
    #[error("Passport photo background must be white.")]
    BackgroundNotWhite,

    /// OCR found too little text on the identity document.
    #[error("Aadhar details not clear. Please upload a clearer image.")]
    IllegibleDocument { chars_found: usize },
}
