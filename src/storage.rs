use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::UploadPurpose;

/// Lifetime of a presigned upload URL.
pub const PRESIGN_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Contract for the object storage layer (MinIO locally, any S3 endpoint in production).
/// Handlers only see this trait, so tests swap in `MockStorageService`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if it is missing. Called once at local startup.
    async fn ensure_bucket_exists(&self);

    /// Generates a signed PUT URL for `key`, constrained to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;
}

/// S3StorageClient
///
/// `force_path_style(true)` is required for MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket({}) skipped: {}", self.bucket_name, e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(PRESIGN_TTL).map_err(|e| e.to_string())?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a user-supplied key can't escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// object_key
///
/// Builds `{purpose}/{uuid}.{ext}` from the client's filename. Only the extension of the
/// original name survives, lowercased and limited to ASCII alphanumerics.
pub fn object_key(purpose: UploadPurpose, filename: &str, id: Uuid) -> String {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);

    let key = match extension {
        Some(ext) => format!("{}/{}.{}", purpose.prefix(), id, ext),
        None => format!("{}/{}", purpose.prefix(), id),
    };
    sanitize_key(&key)
}

/// MockStorageService
///
/// Deterministic stand-in for S3 used by the test suite.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every presign call fails.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_removes_traversal_segments() {
        assert_eq!(sanitize_key("../../etc//passwd"), "etc/passwd");
        assert_eq!(sanitize_key("./lecture/./a.mp4"), "lecture/a.mp4");
    }

    #[test]
    fn object_key_uses_purpose_prefix_and_extension() {
        let id = Uuid::nil();
        assert_eq!(
            object_key(UploadPurpose::CourseCover, "My Cover.PNG", id),
            format!("course-cover/{}.png", id)
        );
        assert_eq!(object_key(UploadPurpose::QuizMedia, "clip", id), format!("quiz-media/{}", id));
        // Anything odd in the extension is dropped rather than escaped.
        assert_eq!(
            object_key(UploadPurpose::Lecture, "x.mp4/../../y", id),
            format!("lecture/{}", id)
        );
    }
}
