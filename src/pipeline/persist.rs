//! Persistence: four blobs, then one record, with rollback.
//!
//! ## Two phases
//!
//! ```text
//! phase 1: passport ─▶ aadhar ─▶ qr.png ─▶ gatepass.pdf
//!          each key: copy earlier content to previous/, then overwrite
//!          (any failure: undo the blobs written so far, abort)
//! phase 2: record
//!          (failure: undo all four blobs, abort)
//! commit:  delete previous/ copies
//! ```
//!
//! Blob keys are fixed per registration number, so a resubmission overwrites
//! the blobs an earlier record points at. Undoing a key restores the copy in
//! `{prefix}/{reg_no}/previous/`, or deletes the key when nothing was there
//! before. Whatever record is in the store after a failed submission points
//! at the blobs it was written with.
//!
//! Undo steps are best effort: a failed step is logged and the original
//! write error is what the caller sees. Nothing is retried.

use crate::error::GatePassError;
use crate::model::{Application, GatePassRecord, GeneratedArtifacts, PendingRecord, UploadedDocument};
use crate::store::{BlobKeys, BlobStore, StoreError, Stores};
use tracing::{debug, info, warn};

/// Directory, next to the blobs, holding the earlier submission's content.
const PREVIOUS_DIR: &str = "previous";

/// Store everything for one accepted application and return the record.
pub async fn persist(
    stores: &Stores,
    prefix: &str,
    app: &Application,
    passport: &UploadedDocument,
    identity: &UploadedDocument,
    artifacts: &GeneratedArtifacts,
) -> Result<GatePassRecord, GatePassError> {
    let keys = BlobKeys::new(prefix, &app.registration_number);

    let blobs: [(&str, &[u8], &str); 4] = [
        (keys.passport.as_str(), passport.bytes.as_slice(), passport.media_type.as_str()),
        (keys.identity.as_str(), identity.bytes.as_slice(), identity.media_type.as_str()),
        (keys.qr.as_str(), artifacts.qr_png.as_slice(), "image/png"),
        (keys.document.as_str(), artifacts.document_pdf.as_slice(), "application/pdf"),
    ];

    let mut changes = BlobChanges::new(stores.blobs.as_ref());
    for (key, data, content_type) in blobs {
        if let Err((failed_key, source)) = changes.overwrite(key, data, content_type).await {
            warn!(
                "Blob write '{}' failed; rolling back {} written blob(s)",
                failed_key,
                changes.written.len()
            );
            changes.rollback().await;
            return Err(GatePassError::StorageWriteFailed {
                key: failed_key,
                source,
            });
        }
    }

    let pending = PendingRecord {
        name: app.name.clone(),
        reg_no: app.registration_number.clone(),
        email: app.email.clone(),
        phone: app.phone.clone(),
        qr_path: keys.qr.clone(),
        pdf_path: keys.document.clone(),
    };

    match stores.records.put(pending).await {
        Ok(record) => {
            info!(
                "Stored gate pass for {} ({} blobs + record)",
                record.reg_no,
                changes.written.len()
            );
            changes.commit().await;
            Ok(record)
        }
        Err(source) => {
            warn!(
                "Record write for {} failed; rolling back all blobs",
                app.registration_number
            );
            changes.rollback().await;
            Err(GatePassError::RecordWriteFailed {
                reg_no: app.registration_number.clone(),
                source,
            })
        }
    }
}

/// `{dir}/{name}` → `{dir}/previous/{name}`.
fn previous_key(key: &str) -> String {
    match key.rsplit_once('/') {
        Some((dir, name)) => format!("{dir}/{PREVIOUS_DIR}/{name}"),
        None => format!("{PREVIOUS_DIR}/{key}"),
    }
}

/// Blob keys one submission has touched, and how to put them back.
struct BlobChanges<'a> {
    blobs: &'a dyn BlobStore,
    /// Keys overwritten so far, in write order.
    written: Vec<&'a str>,
    /// Keys whose earlier content sits at `previous_key(key)`.
    saved: Vec<&'a str>,
}

impl<'a> BlobChanges<'a> {
    fn new(blobs: &'a dyn BlobStore) -> Self {
        Self {
            blobs,
            written: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Set the current content of `key` aside, then overwrite it.
    async fn overwrite(
        &mut self,
        key: &'a str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), (String, StoreError)> {
        let previous = previous_key(key);
        match self.blobs.copy(key, &previous).await {
            Ok(true) => {
                debug!("Set aside earlier '{}'", key);
                self.saved.push(key);
            }
            Ok(false) => {}
            Err(e) => return Err((previous, e)),
        }

        self.blobs
            .put(key, data.to_vec(), content_type)
            .await
            .map_err(|e| (key.to_string(), e))?;
        self.written.push(key);
        Ok(())
    }

    /// Put every overwritten key back as it was, newest first.
    async fn rollback(self) {
        for key in self.written.iter().rev() {
            let undone = if self.saved.contains(key) {
                self.blobs.copy(&previous_key(key), key).await.map(|_| ())
            } else {
                self.blobs.delete(key).await
            };
            if let Err(e) = undone {
                warn!("Rollback could not restore '{}': {}", key, e);
            }
        }
        self.discard_saved().await;
    }

    async fn commit(self) {
        self.discard_saved().await;
    }

    async fn discard_saved(&self) {
        for key in &self.saved {
            let previous = previous_key(key);
            if let Err(e) = self.blobs.delete(&previous).await {
                warn!("Could not delete '{}': {}", previous, e);
            }
        }
    }
}
