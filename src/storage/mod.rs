//! Object-storage interface used by the image worker (§6). Key-extension to
//! content-type mapping is fixed for common image formats; unknown extensions
//! default to `application/octet-stream`.

pub mod in_memory;

use async_trait::async_trait;

use crate::core::errors::PipelineError;

pub use in_memory::InMemoryObjectStorage;

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub etag: String,
}

#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: u64,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload_file(
        &self,
        path: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<UploadResult, PipelineError>;

    async fn upload_buffer(
        &self,
        buffer: &[u8],
        key: &str,
        content_type: Option<&str>,
    ) -> Result<UploadResult, PipelineError>;

    async fn generate_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Option<u64>,
    ) -> Result<PresignedUrl, PipelineError>;

    async fn generate_presigned_download_url(
        &self,
        key: &str,
        expires_in: Option<u64>,
    ) -> Result<PresignedUrl, PipelineError>;
}

/// Fixed extension → content-type mapping; unknown extensions default to
/// `application/octet-stream` (§6).
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key.rsplit('.').next().unwrap_or("").to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tiff" | "tif" => "image/tiff",
        _ => "application/octet-stream",
    }
}
