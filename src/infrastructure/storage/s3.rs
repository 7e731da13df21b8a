use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::{ArtifactStore, ByteStream};
use crate::common::error::StorageError;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub async fn new(endpoint: &str, bucket: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!(bucket, "S3 storage client ready");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    fn location_for(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    /// Locations are `"{bucket}/{key}"`; anything outside this bucket is rejected.
    fn key_for<'a>(&self, location: &'a str) -> Result<&'a str, StorageError> {
        location
            .strip_prefix(self.bucket.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StorageError::InvalidLocation(location.to_string()))
    }

    async fn put(&self, key: &str, body: S3Body) -> Result<String, StorageError> {
        let content_type = mime_guess::from_path(key).first_or_octet_stream().to_string();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request(DisplayErrorContext(&e).to_string()))?;

        debug!(key, "Uploaded object");
        Ok(self.location_for(key))
    }
}

#[async_trait]
impl ArtifactStore for StorageService {
    async fn upload_bytes(&self, bytes: Bytes, name: &str) -> Result<String, StorageError> {
        self.put(name, S3Body::from(bytes)).await
    }

    async fn upload_file(&self, path: &Path, name: &str) -> Result<String, StorageError> {
        let body = S3Body::from_path(path)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        self.put(name, body).await
    }

    async fn download(&self, location: &str, local_path: &Path) -> Result<(), StorageError> {
        let mut reader = self.open_stream(location).await?;
        let mut file = tokio::fs::File::create(local_path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;

        debug!(location, bytes = written, "Downloaded object");
        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        let key = self.key_for(location)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::Request(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn open_stream(&self, location: &str) -> Result<ByteStream, StorageError> {
        let key = self.key_for(location)?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(location.to_string())
                } else {
                    StorageError::Request(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(Box::pin(resp.body.into_async_read()))
    }
}
