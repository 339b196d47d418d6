//! Data types flowing through the gate pass pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME types an upload may declare.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "application/pdf"];

/// Raw form input for one submission.
///
/// Every field is optional so the collector, not the caller, decides what
/// counts as missing.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub name: Option<String>,
    pub reg_no: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Passport-style photo with a white background.
    pub passport: Option<UploadedDocument>,
    /// Identity document (Aadhaar card) photo or scan.
    pub identity: Option<UploadedDocument>,
}

/// Applicant details accepted by the collector. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub registration_number: String,
    pub phone: String,
    pub email: String,
}

/// An uploaded file: bytes plus the media type the uploader declared.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl UploadedDocument {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Bytes are elided; a 400 KB upload in a debug log helps nobody.
impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Which of the two upload fields a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentSlot {
    Passport,
    Identity,
}

impl DocumentSlot {
    /// Final path segment of the blob key.
    pub fn blob_name(self) -> &'static str {
        match self {
            DocumentSlot::Passport => "passport",
            DocumentSlot::Identity => "aadhar",
        }
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSlot::Passport => f.write_str("Passport"),
            DocumentSlot::Identity => f.write_str("Aadhar"),
        }
    }
}

/// Content format detected from the upload's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Png,
    Jpeg,
    /// Paginated document; the first page stands in for the image.
    Pdf,
}

impl MediaKind {
    pub fn mime(self) -> &'static str {
        match self {
            MediaKind::Png => "image/png",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Pdf => "application/pdf",
        }
    }
}

/// A gate pass record as handed to the record store, before the store
/// stamps it with its creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub name: String,
    pub reg_no: String,
    pub email: String,
    pub phone: String,
    pub qr_path: String,
    pub pdf_path: String,
}

impl PendingRecord {
    pub fn stamp(self, created_at: DateTime<Utc>) -> GatePassRecord {
        GatePassRecord {
            name: self.name,
            reg_no: self.reg_no,
            email: self.email,
            phone: self.phone,
            qr_path: self.qr_path,
            pdf_path: self.pdf_path,
            created_at,
        }
    }
}

/// Persisted metadata for one applicant, keyed by `reg_no`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassRecord {
    pub name: String,
    pub reg_no: String,
    pub email: String,
    pub phone: String,
    /// Blob key of the QR image.
    pub qr_path: String,
    /// Blob key of the gate pass PDF.
    pub pdf_path: String,
    /// Assigned by the record store at write time.
    pub created_at: DateTime<Utc>,
}

/// The artifacts generated for one accepted application.
#[derive(Clone)]
pub struct GeneratedArtifacts {
    pub qr_payload: String,
    pub qr_png: Vec<u8>,
    pub document_pdf: Vec<u8>,
}

/// Result of a successful submission.
#[derive(Clone)]
pub struct IssuedPass {
    pub record: GatePassRecord,
    /// The gate pass PDF, ready to offer as a download.
    pub document: Vec<u8>,
    pub qr_png: Vec<u8>,
    pub qr_payload: String,
    /// `GatePass_{reg_no}.pdf`
    pub download_name: String,
}

impl fmt::Debug for IssuedPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedPass")
            .field("record", &self.record)
            .field("document_len", &self.document.len())
            .field("qr_png_len", &self.qr_png.len())
            .field("qr_payload", &self.qr_payload)
            .field("download_name", &self.download_name)
            .finish()
    }
}

/// File name offered for the downloadable copy of the gate pass.
pub fn download_name(reg_no: &str) -> String {
    format!("GatePass_{reg_no}.pdf")
}
