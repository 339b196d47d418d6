//! Storage seams: where blobs and gate pass records go.
//!
//! The pipeline never talks to a cloud SDK directly. It receives a
//! [`Stores`] value holding one [`BlobStore`] and one [`RecordStore`], built
//! by the caller from explicit connection parameters. Tests pass in-memory
//! stores, or wrappers that fail on demand.
//!
//! ## Key layout
//!
//! ```text
//! {prefix}/{reg_no}/passport       declared upload type
//! {prefix}/{reg_no}/aadhar         declared upload type
//! {prefix}/{reg_no}/qr.png         image/png
//! {prefix}/{reg_no}/gatepass.pdf   application/pdf
//! {prefix}/{reg_no}/previous/*     earlier blobs, only while a resubmission is in flight
//! {collection}/{reg_no}.json       record (ObjectRecordStore)
//! ```

pub mod object;

use crate::model::{DocumentSlot, GatePassRecord, PendingRecord};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use object::{ObjectBlobStore, ObjectRecordStore};

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write of '{key}' failed: {detail}")]
    WriteFailed { key: String, detail: String },

    #[error("delete of '{key}' failed: {detail}")]
    DeleteFailed { key: String, detail: String },

    #[error("read of '{key}' failed: {detail}")]
    ReadFailed { key: String, detail: String },

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("record serialisation failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store configuration error: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub key: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// Opaque blob sink. `put` overwrites whatever is stored under `key`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StoreResult<BlobRef>;

    /// Copy `from` onto `to`, content type included, overwriting `to`.
    /// Returns `Ok(false)` when there is nothing at `from`.
    async fn copy(&self, from: &str, to: &str) -> StoreResult<bool>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Key-value store for gate pass records, keyed by registration number.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write (or overwrite) the record and stamp it with the store's clock.
    async fn put(&self, record: PendingRecord) -> StoreResult<GatePassRecord>;

    async fn get(&self, reg_no: &str) -> StoreResult<Option<GatePassRecord>>;
}

/// The two sinks a submission writes to.
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn RecordStore>,
}

impl Stores {
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn RecordStore>) -> Self {
        Self { blobs, records }
    }
}

/// The four blob keys of one registration number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobKeys {
    pub passport: String,
    pub identity: String,
    pub qr: String,
    pub document: String,
}

impl BlobKeys {
    pub fn new(prefix: &str, reg_no: &str) -> Self {
        let base = format!("{}/{}", prefix.trim_end_matches('/'), reg_no);
        Self {
            passport: format!("{base}/{}", DocumentSlot::Passport.blob_name()),
            identity: format!("{base}/{}", DocumentSlot::Identity.blob_name()),
            qr: format!("{base}/qr.png"),
            document: format!("{base}/gatepass.pdf"),
        }
    }
}

/// Reject keys that could escape their namespace.
pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
