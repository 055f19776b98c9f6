use std::{ffi::OsStr, path::Path};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::ImageModel;

/// Successful upload response
#[must_use]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub image_id: i32,
    pub file_path: String,
    pub retry_count: i32,
}

/// Short-circuit reply for a resubmitted upload
#[must_use]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DuplicateResponse {
    pub success: bool,
    pub message: String,
    pub duplicate: bool,
    pub image_id: i32,
    pub retry_count: i32,
}

/// Error envelope for recovered rejections
#[must_use]
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// Query parameters of the listing endpoint
#[must_use]
#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Listing response
#[must_use]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListResponse {
    pub images: Vec<ImageEntry>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Public shape of a stored image record
#[must_use]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageEntry {
    pub id: i32,
    pub image_url: String,
    pub uploaded_at: NaiveDateTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub retry_count: i32,
    pub status: String,
}

impl From<ImageModel> for ImageEntry {
    fn from(model: ImageModel) -> Self {
        let file_name = Path::new(&model.file_path)
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(model.file_path.as_str());
        let image_url = format!("/uploads/{file_name}");

        Self {
            id: model.id,
            image_url,
            uploaded_at: model.uploaded_at,
            latitude: model.latitude,
            longitude: model.longitude,
            retry_count: model.retry_count,
            status: model.status,
        }
    }
}
