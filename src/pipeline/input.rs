//! Input collection: turn a raw [`Submission`] into an accepted
//! [`Application`] plus its two uploads.
//!
//! Nothing here looks inside the uploads beyond their declared media type;
//! content checks belong to [`crate::pipeline::validate`]. The registration
//! number is checked here because it becomes a path segment in every blob
//! key, and a value like `../x` must never reach the store.

use crate::error::{GatePassError, Rejection};
use crate::model::{
    Application, DocumentSlot, MediaKind, Submission, UploadedDocument, ACCEPTED_MEDIA_TYPES,
};
use std::path::Path;
use tracing::debug;

/// An application whose fields are all present, with both uploads.
#[derive(Debug, Clone)]
pub struct CollectedInput {
    pub application: Application,
    pub passport: UploadedDocument,
    pub identity: UploadedDocument,
}

/// Check that all six inputs are present and usable.
///
/// Text fields are trimmed; a field that is empty after trimming counts as
/// missing. Missing fields are reported before anything else.
pub fn collect(submission: Submission) -> Result<CollectedInput, Rejection> {
    let Submission {
        name,
        reg_no,
        phone,
        email,
        passport,
        identity,
    } = submission;

    let name = required("name", name)?;
    let reg_no = required("registration number", reg_no)?;
    let phone = required("phone", phone)?;
    let email = required("email", email)?;
    let passport = required_upload("passport photo", passport)?;
    let identity = required_upload("identity document", identity)?;

    if !is_valid_reg_no(&reg_no) {
        return Err(Rejection::InvalidRegistrationNumber { reg_no });
    }

    check_media_type(DocumentSlot::Passport, &passport)?;
    check_media_type(DocumentSlot::Identity, &identity)?;

    debug!(
        "Collected application {}: passport {} bytes ({}), identity {} bytes ({})",
        reg_no,
        passport.len(),
        passport.media_type,
        identity.len(),
        identity.media_type
    );

    Ok(CollectedInput {
        application: Application {
            name,
            registration_number: reg_no,
            phone,
            email,
        },
        passport,
        identity,
    })
}

fn required(field: &str, value: Option<String>) -> Result<String, Rejection> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Rejection::MissingField {
            field: field.to_string(),
        }),
    }
}

fn required_upload(
    field: &str,
    value: Option<UploadedDocument>,
) -> Result<UploadedDocument, Rejection> {
    match value {
        Some(doc) if !doc.is_empty() => Ok(doc),
        _ => Err(Rejection::MissingField {
            field: field.to_string(),
        }),
    }
}

/// Letters, digits, `-`, `_` and `.`; must not start with `.`.
pub fn is_valid_reg_no(reg_no: &str) -> bool {
    !reg_no.is_empty()
        && !reg_no.starts_with('.')
        && reg_no
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn check_media_type(slot: DocumentSlot, doc: &UploadedDocument) -> Result<(), Rejection> {
    let declared = normalise_media_type(&doc.media_type);
    if ACCEPTED_MEDIA_TYPES.contains(&declared.as_str()) {
        Ok(())
    } else {
        Err(Rejection::UnsupportedMediaType {
            slot,
            media_type: doc.media_type.clone(),
        })
    }
}

/// Lower-case, drop parameters, and fold the legacy `image/jpg` alias.
fn normalise_media_type(media_type: &str) -> String {
    let base = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if base == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        base
    }
}

/// Detect the upload format from its leading bytes.
///
/// Returns `None` when the content is neither a PDF nor a PNG/JPEG image,
/// whatever the declared type says.
pub fn sniff_media_kind(bytes: &[u8]) -> Option<MediaKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(MediaKind::Pdf);
    }
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => Some(MediaKind::Png),
        Ok(image::ImageFormat::Jpeg) => Some(MediaKind::Jpeg),
        _ => None,
    }
}

/// Media type implied by a file extension, as a browser upload would declare it.
pub fn media_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Read an upload from disk, declaring its media type from the extension.
pub async fn read_upload(path: &Path) -> Result<UploadedDocument, GatePassError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| GatePassError::UploadReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    debug!("Read upload {} ({} bytes)", path.display(), bytes.len());
    Ok(UploadedDocument::new(bytes, media_type_for_path(path)))
}
