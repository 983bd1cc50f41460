use serde::Serialize;
use utoipa::ToSchema;

use super::items::UploadedFileBody;

/// Multipart form accepted by `POST /api/upload`.  Schema only – the
/// handler reads the fields from the multipart stream directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// At most one image (jpg, jpeg, png, gif, webp).
    #[schema(value_type = Option<String>, format = Binary)]
    pub thumbnail: Option<String>,
    /// Up to ten images.
    #[schema(value_type = Option<Vec<String>>, format = Binary)]
    pub screenshots: Option<Vec<String>>,
    /// One to five content archives (zip, rar, jar, mcpack, mcaddon,
    /// mcworld).
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<String>,
}

/// Response for `POST /api/upload`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Storage path of the stored thumbnail, if one was sent.
    pub thumbnail: Option<String>,
    /// Storage paths of the stored screenshots, upload order preserved.
    pub screenshots: Vec<String>,
    pub files: Vec<UploadedFileBody>,
}
