//! S3-compatible object storage implementation
//!
//! Works against AWS S3 or Cloudflare R2 (endpoint derived from the account
//! id when not given explicitly). Credentials are required at startup when
//! this backend is selected; missing ones are a fatal configuration error.

use super::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Connection settings for an S3-compatible endpoint
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
}

// Settings end up in startup logs via the config dump, so the credential
// fields must never render
impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

impl S3Settings {
    /// Load settings from the environment.
    ///
    /// `S3_ENDPOINT_URL` wins; otherwise the endpoint is derived from
    /// `S3_ACCOUNT_ID` (R2 convention). All credentials are mandatory.
    pub fn from_env() -> anyhow::Result<Self> {
        let account_id = env_trimmed("S3_ACCOUNT_ID");
        let access_key_id = env_trimmed("S3_ACCESS_KEY_ID");
        let secret_access_key = env_trimmed("S3_SECRET_ACCESS_KEY");
        let bucket_name = env_trimmed("S3_BUCKET_NAME");

        let mut endpoint_url = env_trimmed("S3_ENDPOINT_URL");
        if endpoint_url.is_empty() && !account_id.is_empty() {
            endpoint_url = format!("https://{}.r2.cloudflarestorage.com", account_id);
        }

        let mut missing = Vec::new();
        if endpoint_url.is_empty() {
            missing.push("S3_ENDPOINT_URL (or S3_ACCOUNT_ID)");
        }
        if access_key_id.is_empty() {
            missing.push("S3_ACCESS_KEY_ID");
        }
        if secret_access_key.is_empty() {
            missing.push("S3_SECRET_ACCESS_KEY");
        }
        if bucket_name.is_empty() {
            missing.push("S3_BUCKET_NAME");
        }

        if !missing.is_empty() {
            anyhow::bail!("Missing object storage configuration: {}", missing.join(", "));
        }

        Ok(Self {
            endpoint_url,
            access_key_id,
            secret_access_key,
            bucket_name,
        })
    }
}

fn env_trimmed(name: &str) -> String {
    std::env::var(name).unwrap_or_default().trim().to_string()
}

/// S3-backed object storage
pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStorage {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "iris",
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(&settings.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: settings.bucket_name.clone(),
        }
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 put failed: {}", e)))?;

        debug!(bucket = %self.bucket, key = %key, "Put object to S3");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Backend(format!("S3 get failed: {}", e))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read S3 body: {}", e)))?;

        debug!(bucket = %self.bucket, key = %key, "Got object from S3");
        Ok(data.into_bytes())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        Ok(result.is_ok())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 delete failed: {}", e)))?;

        debug!(bucket = %self.bucket, key = %key, "Deleted object from S3");
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Backend(format!("Invalid presign TTL: {}", e)))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Backend(format!("S3 presign failed: {}", e)))?;

        Ok(presigned.uri().to_string())
    }
}
