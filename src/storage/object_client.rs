//! S3-compatible object client seam
//!
//! `S3ObjectClient` wraps `aws_sdk_s3` (works with R2, MinIO and friends via a
//! custom endpoint); `MockObjectClient` keeps objects in memory and lets tests
//! play the part of a client completing a signed upload.

use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Returns the ETag reported by the store
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> VaultResult<Option<String>>;

    async fn head_object(&self, key: &str) -> VaultResult<Option<ObjectInfo>>;

    /// Every object whose key starts with `prefix`
    async fn list_objects(&self, prefix: &str) -> VaultResult<Vec<ObjectInfo>>;

    async fn copy_object(&self, from_key: &str, to_key: &str) -> VaultResult<()>;

    async fn delete_object(&self, key: &str) -> VaultResult<()>;

    async fn presign_put(&self, key: &str, content_type: &str, expires_in: Duration) -> VaultResult<String>;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> VaultResult<String>;
}

/// aws-sdk-s3 backed ObjectClient
pub struct S3ObjectClient {
    client: Client,
    bucket: String,
}

impl S3ObjectClient {
    pub fn new(client: Client, bucket: String) -> Self {
        debug!("Initializing S3 object client for bucket '{}'", bucket);
        Self { client, bucket }
    }

    /// Build a client from static settings; a custom endpoint switches to
    /// path-style addressing as S3-compatible services expect
    pub fn from_settings(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.to_string()));

        if let Some(endpoint_url) = endpoint {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        if let (Some(access_key), Some(secret_key)) = (access_key_id, secret_access_key) {
            let credentials = aws_sdk_s3::config::Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "file-vault-config",
            );
            builder = builder.credentials_provider(credentials);
        }

        Self::new(Client::from_conf(builder.build()), bucket.to_string())
    }

    fn presigning(expires_in: Duration) -> VaultResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in).map_err(|e| {
            error!("Failed to create presigning config: {}", e);
            VaultError::invalid(format!("Invalid presigning duration: {}", e))
        })
    }
}

fn smithy_time(at: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    at.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

fn strip_quotes(etag: Option<&str>) -> Option<String> {
    etag.map(|e| e.trim_matches('"').to_string())
}

/// `bucket/key` with everything outside the unreserved set percent-encoded,
/// as the copy-source header requires
fn copy_source(bucket: &str, key: &str) -> String {
    let mut encoded = String::with_capacity(bucket.len() + key.len() + 1);
    encoded.push_str(bucket);
    encoded.push('/');
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> VaultResult<Option<String>> {
        let size = data.len();
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to store object in S3: {}", e);
                VaultError::backend(format!("S3 put_object failed: {}", e))
            })?;
        debug!("Stored object {} in S3: {} bytes", key, size);
        Ok(strip_quotes(result.e_tag()))
    }

    async fn head_object(&self, key: &str) -> VaultResult<Option<ObjectInfo>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: smithy_time(output.last_modified()),
                etag: strip_quotes(output.e_tag()),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    error!("Failed to check object existence in S3: {}", service_error);
                    Err(VaultError::backend(format!("S3 head_object failed: {}", service_error)))
                }
            }
        }
    }

    async fn list_objects(&self, prefix: &str) -> VaultResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let page = request.send().await.map_err(|e| {
                error!("Failed to list objects in S3: {}", e);
                VaultError::backend(format!("S3 list_objects_v2 failed: {}", e))
            })?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: smithy_time(object.last_modified()),
                    etag: strip_quotes(object.e_tag()),
                });
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> VaultResult<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source(&self.bucket, from_key))
            .key(to_key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to copy object {} to {}: {}", from_key, to_key, e);
                VaultError::backend(format!("S3 copy_object failed: {}", e))
            })?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> VaultResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete object from S3: {}", e);
                VaultError::backend(format!("S3 delete_object failed: {}", e))
            })?;
        debug!("Deleted object from S3: {}", key);
        Ok(())
    }

    async fn presign_put(&self, key: &str, content_type: &str, expires_in: Duration) -> VaultResult<String> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| {
                error!("Failed to generate presigned upload URL: {}", e);
                VaultError::backend(format!("S3 presigning failed: {}", e))
            })?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> VaultResult<String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| {
                error!("Failed to generate presigned download URL: {}", e);
                VaultError::backend(format!("S3 presigning failed: {}", e))
            })?;
        Ok(request.uri().to_string())
    }
}

struct MockObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    etag: String,
}

/// In-memory ObjectClient
#[derive(Default)]
pub struct MockObjectClient {
    objects: Mutex<BTreeMap<String, MockObject>>,
}

impl MockObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Act as the remote client finishing a transfer against a signed URL
    pub fn complete_upload(&self, key: &str, data: Bytes) {
        let etag = crate::storage::compute_etag(&data);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data,
                last_modified: Utc::now(),
                etag,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|o| o.data.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn info(key: &str, object: &MockObject) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: object.data.len() as u64,
            last_modified: object.last_modified,
            etag: Some(object.etag.clone()),
        }
    }
}

#[async_trait]
impl ObjectClient for MockObjectClient {
    async fn put_object(&self, key: &str, data: Bytes, _content_type: &str) -> VaultResult<Option<String>> {
        let etag = crate::storage::compute_etag(&data);
        self.complete_upload(key, data);
        Ok(Some(etag))
    }

    async fn head_object(&self, key: &str) -> VaultResult<Option<ObjectInfo>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(key).map(|o| Self::info(key, o)))
    }

    async fn list_objects(&self, prefix: &str) -> VaultResult<Vec<ObjectInfo>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| Self::info(k, o))
            .collect())
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> VaultResult<()> {
        let mut objects = self.objects.lock().unwrap();
        let source = objects
            .get(from_key)
            .ok_or_else(|| VaultError::not_found(from_key))?;
        let copy = MockObject {
            data: source.data.clone(),
            last_modified: Utc::now(),
            etag: source.etag.clone(),
        };
        objects.insert(to_key.to_string(), copy);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> VaultResult<()> {
        // S3 deletes are idempotent
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_put(&self, key: &str, content_type: &str, expires_in: Duration) -> VaultResult<String> {
        Ok(format!(
            "memory://objects/{}?method=PUT&content-type={}&expires={}",
            key,
            content_type,
            expires_in.as_secs()
        ))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> VaultResult<String> {
        Ok(format!(
            "memory://objects/{}?method=GET&expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}
