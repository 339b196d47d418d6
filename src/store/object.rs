//! [`BlobStore`] and [`RecordStore`] over the `object_store` crate.
//!
//! One implementation covers every backend `object_store` knows: process
//! memory, the local filesystem, and (behind the `s3` / `gcs` features)
//! Amazon S3 or Google Cloud Storage buckets. Cloud credentials are picked
//! up from the environment by the `object_store` builders.

use super::{check_key, BlobRef, BlobStore, RecordStore, StoreError, StoreResult, Stores};
use crate::model::{GatePassRecord, PendingRecord};
use async_trait::async_trait;
use chrono::Utc;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Blob sink backed by any [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    /// `LocalFileSystem` rejects object attributes, so the content type can
    /// only be attached on backends that keep it.
    attach_content_type: bool,
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, attach_content_type: bool) -> Self {
        Self {
            store,
            attach_content_type,
        }
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StoreResult<BlobRef> {
        let location = parse_key(key)?;
        let size = data.len();
        let start = Instant::now();

        let mut attributes = Attributes::new();
        if self.attach_content_type {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
        }

        self.store
            .put_opts(&location, PutPayload::from(data), PutOptions::from(attributes))
            .await
            .map_err(|e| StoreError::WriteFailed {
                key: key.to_string(),
                detail: e.to_string(),
            })?;

        info!(
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob stored"
        );

        Ok(BlobRef {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size_bytes: size,
        })
    }

    async fn copy(&self, from: &str, to: &str) -> StoreResult<bool> {
        let source = parse_key(from)?;
        let target = parse_key(to)?;
        let start = Instant::now();

        match self.store.copy(&source, &target).await {
            Ok(()) => {
                debug!(
                    from_key = %from,
                    to_key = %to,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob copied"
                );
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::WriteFailed {
                key: to.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let location = parse_key(key)?;
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                debug!(key = %key, "Blob deleted");
                Ok(())
            }
            Err(e) => Err(StoreError::DeleteFailed {
                key: key.to_string(),
                detail: e.to_string(),
            }),
        }
    }
}

/// Record store writing one JSON object per registration number at
/// `{collection}/{reg_no}.json`.
#[derive(Clone)]
pub struct ObjectRecordStore {
    store: Arc<dyn ObjectStore>,
    collection: String,
}

impl ObjectRecordStore {
    pub fn new(store: Arc<dyn ObjectStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into().trim_end_matches('/').to_string(),
        }
    }

    fn record_key(&self, reg_no: &str) -> String {
        format!("{}/{}.json", self.collection, reg_no)
    }
}

#[async_trait]
impl RecordStore for ObjectRecordStore {
    async fn put(&self, record: PendingRecord) -> StoreResult<GatePassRecord> {
        let key = self.record_key(&record.reg_no);
        let location = parse_key(&key)?;

        let record = record.stamp(Utc::now());
        let body = serde_json::to_vec_pretty(&record)?;

        self.store
            .put(&location, PutPayload::from(body))
            .await
            .map_err(|e| StoreError::WriteFailed {
                key: key.clone(),
                detail: e.to_string(),
            })?;

        info!(key = %key, reg_no = %record.reg_no, "Gate pass record written");
        Ok(record)
    }

    async fn get(&self, reg_no: &str) -> StoreResult<Option<GatePassRecord>> {
        let key = self.record_key(reg_no);
        let location = parse_key(&key)?;

        let result = match self.store.get(&location).await {
            Ok(r) => r,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    key,
                    detail: e.to_string(),
                })
            }
        };

        let bytes = result.bytes().await.map_err(|e| StoreError::ReadFailed {
            key: key.clone(),
            detail: e.to_string(),
        })?;

        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

fn parse_key(key: &str) -> StoreResult<Path> {
    check_key(key)?;
    Path::parse(key).map_err(|e| StoreError::InvalidKey(format!("{key}: {e}")))
}

// ── Constructors ─────────────────────────────────────────────────────────

impl Stores {
    /// Both stores in process memory. Nothing survives the process.
    pub fn in_memory(collection: &str) -> Self {
        let store: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        Self::new(
            Arc::new(ObjectBlobStore::new(Arc::clone(&store), true)),
            Arc::new(ObjectRecordStore::new(store, collection)),
        )
    }

    /// Both stores under a local directory, created if missing.
    pub fn local(root: impl AsRef<std::path::Path>, collection: &str) -> StoreResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            StoreError::Config(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;
        let fs = object_store::local::LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let store: Arc<dyn ObjectStore> = Arc::new(fs);
        Ok(Self::new(
            Arc::new(ObjectBlobStore::new(Arc::clone(&store), false)),
            Arc::new(ObjectRecordStore::new(store, collection)),
        ))
    }

    /// An S3 (or S3-compatible) bucket, credentials from `AWS_*` variables.
    #[cfg(feature = "s3")]
    pub fn s3(
        bucket: &str,
        region: Option<&str>,
        endpoint_url: Option<&str>,
        collection: &str,
    ) -> StoreResult<Self> {
        let mut builder =
            object_store::aws::AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint_url {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let s3 = builder
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let store: Arc<dyn ObjectStore> = Arc::new(s3);
        Ok(Self::new(
            Arc::new(ObjectBlobStore::new(Arc::clone(&store), true)),
            Arc::new(ObjectRecordStore::new(store, collection)),
        ))
    }

    /// A Google Cloud Storage bucket, credentials from `GOOGLE_*` variables
    /// (e.g. `GOOGLE_APPLICATION_CREDENTIALS`).
    #[cfg(feature = "gcs")]
    pub fn gcs(bucket: &str, collection: &str) -> StoreResult<Self> {
        let gcs = object_store::gcp::GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let store: Arc<dyn ObjectStore> = Arc::new(gcs);
        Ok(Self::new(
            Arc::new(ObjectBlobStore::new(Arc::clone(&store), true)),
            Arc::new(ObjectRecordStore::new(store, collection)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(reg_no: &str, name: &str) -> PendingRecord {
        PendingRecord {
            name: name.into(),
            reg_no: reg_no.into(),
            email: "asha@example.com".into(),
            phone: "9876543210".into(),
            qr_path: format!("gatepasses/{reg_no}/qr.png"),
            pdf_path: format!("gatepasses/{reg_no}/gatepass.pdf"),
        }
    }

    #[tokio::test]
    async fn blob_put_keeps_content_type() {
        let mem: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        let blobs = ObjectBlobStore::new(Arc::clone(&mem), true);

        let r = blobs
            .put("gatepasses/R1/qr.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(r.size_bytes, 3);

        let got = mem.get(&Path::parse("gatepasses/R1/qr.png").unwrap()).await.unwrap();
        let ct: Option<&str> = got.attributes.get(&Attribute::ContentType).map(|v| v.as_ref());
        assert_eq!(ct, Some("image/png"));
        assert_eq!(got.bytes().await.unwrap().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn blob_put_overwrites_and_delete_is_idempotent() {
        let mem: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        let blobs = ObjectBlobStore::new(Arc::clone(&mem), true);
        let location = Path::parse("p/R1/passport").unwrap();

        blobs.put("p/R1/passport", vec![1], "image/png").await.unwrap();
        blobs.put("p/R1/passport", vec![2, 2], "image/jpeg").await.unwrap();
        let got = mem.get(&location).await.unwrap().bytes().await.unwrap();
        assert_eq!(got.as_ref(), &[2, 2]);

        blobs.delete("p/R1/passport").await.unwrap();
        blobs.delete("p/R1/passport").await.unwrap();
        assert!(matches!(
            mem.get(&location).await,
            Err(object_store::Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn blob_copy_keeps_content_type_and_reports_missing_source() {
        let mem: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        let blobs = ObjectBlobStore::new(Arc::clone(&mem), true);

        blobs.put("p/R1/qr.png", vec![7, 7], "image/png").await.unwrap();
        assert!(blobs.copy("p/R1/qr.png", "p/R1/previous/qr.png").await.unwrap());
        assert!(!blobs.copy("p/R1/gatepass.pdf", "p/R1/previous/gatepass.pdf").await.unwrap());

        let got = mem.get(&Path::parse("p/R1/previous/qr.png").unwrap()).await.unwrap();
        let ct: Option<&str> = got.attributes.get(&Attribute::ContentType).map(|v| v.as_ref());
        assert_eq!(ct, Some("image/png"));
        assert_eq!(got.bytes().await.unwrap().as_ref(), &[7, 7]);
        assert!(matches!(
            mem.get(&Path::parse("p/R1/previous/gatepass.pdf").unwrap()).await,
            Err(object_store::Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn local_copy_survives_overwrite_of_source() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::local(dir.path(), "records").unwrap();

        stores.blobs.put("p/R1/passport", vec![1], "image/png").await.unwrap();
        assert!(stores.blobs.copy("p/R1/passport", "p/R1/previous/passport").await.unwrap());
        stores.blobs.put("p/R1/passport", vec![2], "image/png").await.unwrap();
        assert!(!stores.blobs.copy("p/R1/aadhar", "p/R1/previous/aadhar").await.unwrap());

        assert_eq!(std::fs::read(dir.path().join("p/R1/previous/passport")).unwrap(), [1]);
        assert_eq!(std::fs::read(dir.path().join("p/R1/passport")).unwrap(), [2]);
    }

    #[tokio::test]
    async fn blob_put_rejects_traversal_key() {
        let blobs = ObjectBlobStore::new(Arc::new(object_store::memory::InMemory::new()), true);
        let err = blobs.put("p/../x", vec![1], "image/png").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn record_round_trip_and_overwrite() {
        let stores = Stores::in_memory("gatepasses");

        assert!(stores.records.get("SS-1").await.unwrap().is_none());

        let first = stores.records.put(pending("SS-1", "Asha")).await.unwrap();
        let second = stores.records.put(pending("SS-1", "Asha Rao")).await.unwrap();
        assert!(second.created_at >= first.created_at);

        let got = stores.records.get("SS-1").await.unwrap().unwrap();
        assert_eq!(got.name, "Asha Rao");
        assert_eq!(got, second);
    }

    #[tokio::test]
    async fn local_store_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::local(dir.path().join("data"), "records").unwrap();

        stores
            .blobs
            .put("gatepasses/R2/gatepass.pdf", b"%PDF-1.7".to_vec(), "application/pdf")
            .await
            .unwrap();
        stores.records.put(pending("R2", "Ravi")).await.unwrap();

        let pdf = dir.path().join("data/gatepasses/R2/gatepass.pdf");
        assert_eq!(std::fs::read(pdf).unwrap(), b"%PDF-1.7");
        let json = std::fs::read_to_string(dir.path().join("data/records/R2.json")).unwrap();
        assert!(json.contains("\"reg_no\": \"R2\""));
    }
}
