use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// UploadPurpose
///
/// Decides the key prefix of an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum UploadPurpose {
    CourseCover,
    #[default]
    Lecture,
    Flashcard,
    QuizMedia,
    Avatar,
}

impl UploadPurpose {
    pub fn prefix(&self) -> &'static str {
        match self {
            UploadPurpose::CourseCover => "course-cover",
            UploadPurpose::Lecture => "lecture",
            UploadPurpose::Flashcard => "flashcard",
            UploadPurpose::QuizMedia => "quiz-media",
            UploadPurpose::Avatar => "avatar",
        }
    }
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived S3 upload URL (POST /upload/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "lesson_01.mp4")]
    pub filename: String,
    /// The MIME type the upload is constrained to.
    #[schema(example = "video/mp4")]
    pub file_type: String,
    #[serde(default)]
    pub purpose: UploadPurpose,
}

/// PresignedUrlResponse
///
/// The temporary URL for the client-to-cloud PUT, and the key to reference afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}
