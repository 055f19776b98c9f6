mod structure;

use std::sync::Arc;

use bytes::BufMut;
use futures_util::TryStreamExt;
use sea_orm::SqlErr;
use tracing::{info, warn};
use warp::{
    http::StatusCode,
    multipart::{FormData, Part},
    Filter, Rejection, Reply,
};

use crate::{Error, ImageDB, ImageStore, NewImage};
use structure::*;

/// Largest accepted multipart request body
const MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024;

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 20;

/// The complete filter tree of the service
///
/// `POST /upload`, `GET /upload`, `GET /upload/:id` and static file access
/// under `/uploads`
pub fn routes(
    db: Arc<ImageDB>,
    store: ImageStore,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let files = warp::path("uploads").and(warp::fs::dir(store.dir().to_path_buf()));

    let db_filter = warp::any().map(move || Arc::clone(&db));
    let store_filter = warp::any().map(move || store.clone());

    let upload = warp::path("upload")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD_SIZE))
        .and(db_filter.clone())
        .and(store_filter)
        .and_then(handle_upload);

    let list = warp::path("upload")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(db_filter.clone())
        .and_then(handle_list);

    let fetch = warp::path!("upload" / i32)
        .and(warp::get())
        .and(db_filter)
        .and_then(handle_fetch);

    upload
        .or(list)
        .or(fetch)
        .or(files)
        .recover(handle_rejection)
}

/// Collected multipart fields of an upload request
#[must_use]
#[derive(Default)]
struct UploadForm {
    image: Option<ImagePart>,
    latitude: Option<String>,
    longitude: Option<String>,
    unique_id: Option<String>,
    retry_count: Option<String>,
}

#[must_use]
struct ImagePart {
    file_name: String,
    bytes: Vec<u8>,
}

impl UploadForm {
    async fn parse(form: FormData) -> Result<Self, Rejection> {
        let parts: Vec<Part> = form.try_collect().await.map_err(reject)?;

        let mut parsed = UploadForm::default();
        for part in parts {
            let name = part.name().to_string();
            match name.as_str() {
                "image" => parsed.image = Some(image_part(part).await?),
                "latitude" => parsed.latitude = Some(text_part(part).await?),
                "longitude" => parsed.longitude = Some(text_part(part).await?),
                // Accepted but never parsed or persisted
                "timestamp" => drop(text_part(part).await?),
                "id" => parsed.unique_id = Some(text_part(part).await?),
                "retryCount" => parsed.retry_count = Some(text_part(part).await?),
                other => warn!("Ignoring unexpected form field `{other}`"),
            }
        }

        Ok(parsed)
    }
}

async fn handle_upload(
    form: FormData,
    db: Arc<ImageDB>,
    store: ImageStore,
) -> Result<impl Reply, Rejection> {
    let form = UploadForm::parse(form).await?;

    let (latitude, longitude) = match (present(&form.latitude), present(&form.longitude)) {
        (Some(latitude), Some(longitude)) => (coordinate(latitude), coordinate(longitude)),
        _ => {
            return Err(warp::reject::custom(Error::Validation(String::from(
                "Geolocation data is required.",
            ))))
        }
    };

    let image = form.image.ok_or_else(|| {
        warp::reject::custom(Error::Validation(String::from("Image file is required.")))
    })?;

    // The file hits disk before the duplicate check; a request answered with
    // a duplicate response leaves an orphaned file behind
    let stored_path = store
        .save(&image.file_name, image.bytes)
        .await
        .map_err(warp::reject::custom)?;

    let retry_count = form
        .retry_count
        .as_deref()
        .unwrap_or("0")
        .parse::<i32>()
        .unwrap_or(0);

    if let Some(unique_id) = present(&form.unique_id) {
        if let Some(existing) = db
            .find_by_unique_id(unique_id)
            .await
            .map_err(warp::reject::custom)?
        {
            info!("Duplicate upload detected for image ID: `{unique_id}`");

            // The counter never decreases
            let existing = if retry_count > existing.retry_count {
                db.update_retry_count(existing, retry_count)
                    .await
                    .map_err(warp::reject::custom)?
            } else {
                existing
            };

            return Ok(warp::reply::json(&DuplicateResponse {
                success: true,
                message: String::from("Image already processed"),
                duplicate: true,
                image_id: existing.id,
                retry_count: existing.retry_count,
            }));
        }
    }

    let new = NewImage {
        file_path: stored_path.display().to_string(),
        latitude,
        longitude,
        unique_id: present(&form.unique_id).map(String::from),
        retry_count,
    };

    let model = match db.insert_image(new).await {
        Ok(model) => model,
        // Two concurrent uploads with the same id can both pass the
        // pre-check; the unique index is the authoritative signal
        Err(Error::SeaOrm(err))
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
        {
            return Err(warp::reject::custom(Error::Conflict(String::from(
                "This image has already been uploaded",
            ))))
        }
        Err(err) => return Err(warp::reject::custom(err)),
    };

    info!("Image `{}` stored at `{}`", model.id, model.file_path);

    Ok(warp::reply::json(&UploadResponse {
        success: true,
        message: String::from("Upload successful"),
        image_id: model.id,
        file_path: model.file_path,
        retry_count: model.retry_count,
    }))
}

async fn handle_list(query: ListQuery, db: Arc<ImageDB>) -> Result<impl Reply, Rejection> {
    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);

    let (models, total, total_pages) = db
        .find_all_paged(page, limit)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&ListResponse {
        images: models.into_iter().map(ImageEntry::from).collect(),
        total,
        page,
        limit,
        total_pages,
    }))
}

async fn handle_fetch(id: i32, db: Arc<ImageDB>) -> Result<impl Reply, Rejection> {
    let model = db.find_by_id(id).await.map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&ImageEntry::from(model)))
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Rejection> {
    let (code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else if let Some(err) = rejection.find::<Error>() {
        (err.status_code(), err.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            String::from("Image exceeds the upload size limit"),
        )
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, String::from("Invalid query string"))
    } else if rejection.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, String::from("Invalid header"))
    } else if rejection
        .find::<warp::reject::MethodNotAllowed>()
        .is_some()
    {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            String::from("Method not allowed"),
        )
    } else {
        warn!("Unhandled rejection: `{rejection:?}`");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            success: false,
            message,
        }),
        code,
    ))
}

async fn image_part(part: Part) -> Result<ImagePart, Rejection> {
    if !is_allowed_image(part.content_type()) {
        return Err(warp::reject::custom(Error::Validation(String::from(
            "Only image files are allowed!",
        ))));
    }

    let file_name = part.filename().unwrap_or("image").to_string();
    let bytes = part_bytes(part).await?;

    Ok(ImagePart { file_name, bytes })
}

async fn text_part(part: Part) -> Result<String, Rejection> {
    String::from_utf8(part_bytes(part).await?).map_err(|_| {
        warp::reject::custom(Error::Validation(String::from(
            "Form fields must be valid UTF-8",
        )))
    })
}

async fn part_bytes(part: Part) -> Result<Vec<u8>, Rejection> {
    part.stream()
        .try_fold(Vec::new(), |mut bytes, buf| async move {
            bytes.put(buf);
            Ok(bytes)
        })
        .await
        .map_err(reject)
}

fn reject(err: warp::Error) -> Rejection {
    warp::reject::custom(Error::from(err))
}

fn is_allowed_image(content_type: Option<&str>) -> bool {
    match content_type.and_then(|mime| mime.split('/').nth(1)) {
        Some(subtype) => matches!(subtype, "jpg" | "jpeg" | "png"),
        None => false,
    }
}

/// A form field counts as supplied only when it is non-empty
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// A malformed coordinate is stored as not-a-number rather than rejected
fn coordinate(value: &str) -> f64 {
    value.trim().parse().unwrap_or(f64::NAN)
}
