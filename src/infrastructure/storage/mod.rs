use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::common::error::StorageError;

pub mod s3;

pub use s3::StorageService;

pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Blob storage as seen by the pipeline. Locations are opaque strings handed out
/// by `upload_*` and accepted back by the read operations.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload_bytes(&self, bytes: Bytes, name: &str) -> Result<String, StorageError>;

    async fn upload_file(&self, path: &Path, name: &str) -> Result<String, StorageError>;

    async fn download(&self, location: &str, local_path: &Path) -> Result<(), StorageError>;

    async fn exists(&self, location: &str) -> Result<bool, StorageError>;

    async fn open_stream(&self, location: &str) -> Result<ByteStream, StorageError>;
}
