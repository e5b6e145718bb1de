//! Object storage backends behind the `ObjectStorage` seam.
//!
//! Buckets are named by each notification rather than configured ahead of
//! time, so backends keep one handle per bucket, built on first use and
//! cached for the process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use crate::error::StorageError;

// ── Seam ────────────────────────────────────────────────────────────

/// Byte-level object storage used by both pipeline stages.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch an object's bytes.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Store an object with its declared content type.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

fn read_error(bucket: &str, key: &str, source: object_store::Error) -> StorageError {
    match source {
        object_store::Error::NotFound { .. } => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        source => StorageError::Read {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        },
    }
}

/// Put options carrying the declared content type.
fn put_options(content_type: &str) -> PutOptions {
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, content_type.to_string().into());
    PutOptions {
        attributes,
        ..Default::default()
    }
}

// ── S3 backend ──────────────────────────────────────────────────────

/// S3-compatible backend. Credentials come from the environment; region
/// and endpoint can be overridden for S3-compatible stores.
pub struct S3Storage {
    region: Option<String>,
    endpoint: Option<String>,
    handles: Mutex<HashMap<String, Arc<AmazonS3>>>,
}

impl S3Storage {
    pub fn new(region: Option<String>, endpoint: Option<String>) -> Self {
        Self {
            region,
            endpoint,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Get or build the handle for a bucket.
    fn handle(&self, bucket: &str) -> Result<Arc<AmazonS3>, StorageError> {
        let mut handles = self.handles.lock().unwrap();
        if let Some(store) = handles.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &self.region {
            builder = builder.with_region(region.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = Arc::new(builder.build().map_err(|source| StorageError::Backend {
            bucket: bucket.to_string(),
            source,
        })?);
        handles.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.handle(bucket)?;
        let result = store
            .get(&Path::from(key))
            .await
            .map_err(|e| read_error(bucket, key, e))?;
        result.bytes().await.map_err(|e| read_error(bucket, key, e))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let store = self.handle(bucket)?;
        store
            .put_opts(
                &Path::from(key),
                PutPayload::from(bytes),
                put_options(content_type),
            )
            .await
            .map_err(|source| StorageError::Write {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;
        Ok(())
    }
}

// ── In-memory backend ───────────────────────────────────────────────

/// In-memory backend for tests and the self-contained `memory` mode.
#[derive(Default)]
pub struct MemoryStorage {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, bucket: &str) -> Arc<InMemory> {
        let mut buckets = self.buckets.lock().unwrap();
        Arc::clone(
            buckets
                .entry(bucket.to_string())
                .or_insert_with(|| Arc::new(InMemory::new())),
        )
    }

    /// Keys currently stored in a bucket, sorted (assertion helper).
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        use futures::TryStreamExt;

        let store = self.bucket(bucket);
        let metas: Vec<_> = store.list(None).try_collect().await.unwrap_or_default();
        let mut keys: Vec<String> = metas.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        keys
    }

    /// Declared content type of a stored object, if any (assertion helper).
    pub async fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let store = self.bucket(bucket);
        let result = store.get(&Path::from(key)).await.ok()?;
        result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.bucket(bucket);
        let result = store
            .get(&Path::from(key))
            .await
            .map_err(|e| read_error(bucket, key, e))?;
        result.bytes().await.map_err(|e| read_error(bucket, key, e))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let store = self.bucket(bucket);
        store
            .put_opts(
                &Path::from(key),
                PutPayload::from(bytes),
                put_options(content_type),
            )
            .await
            .map_err(|source| StorageError::Write {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;
        Ok(())
    }
}
