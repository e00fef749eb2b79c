//! `InMemoryObjectStorage` — a fake upload target used by tests and the demo
//! binary. Never a real bucket (out of scope per §1).

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::core::errors::PipelineError;

use super::{content_type_for_key, ObjectStorage, PresignedUrl, UploadResult};

#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: DashMap<String, Vec<u8>>,
    base_url: String,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            base_url: "https://storage.invalid".to_string(),
        }
    }

    fn etag_for(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload_file(
        &self,
        path: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<UploadResult, PipelineError> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::transient(format!("cannot read {}: {}", path, e)))?;
        self.upload_buffer(&bytes, key, content_type).await
    }

    async fn upload_buffer(
        &self,
        buffer: &[u8],
        key: &str,
        _content_type: Option<&str>,
    ) -> Result<UploadResult, PipelineError> {
        let etag = Self::etag_for(buffer);
        let size = buffer.len() as u64;
        self.objects.insert(key.to_string(), buffer.to_vec());
        Ok(UploadResult {
            key: key.to_string(),
            url: format!("{}/{}", self.base_url, key),
            size,
            etag,
        })
    }

    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Option<u64>,
    ) -> Result<PresignedUrl, PipelineError> {
        Ok(PresignedUrl {
            url: format!("{}/{}?upload=1", self.base_url, key),
            expires_in: expires_in.unwrap_or(900),
        })
    }

    async fn generate_presigned_download_url(
        &self,
        key: &str,
        expires_in: Option<u64>,
    ) -> Result<PresignedUrl, PipelineError> {
        Ok(PresignedUrl {
            url: format!("{}/{}?download=1", self.base_url, key),
            expires_in: expires_in.unwrap_or(900),
        })
    }
}
