use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tempfile::TempDir;
use warp::{filters::BoxedFilter, Filter, Reply};

use geoimage_api::{routes, Config, ImageDB, ImageStore};

const BOUNDARY: &str = "geoimage-test-boundary";

async fn test_routes(dir: &TempDir) -> Result<BoxedFilter<(impl Reply,)>> {
    let mut config = Config::default();
    config.database_url = Some(format!(
        "sqlite:{}?mode=rwc",
        dir.path().join("test.db").display()
    ));
    config.upload_dir = dir.path().join("uploads");

    let db = Arc::new(ImageDB::new(&config).await?);
    let store = ImageStore::init(&config.upload_dir).await?;

    Ok(routes(db, store).boxed())
}

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((file_name, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_upload<T>(filter: &BoxedFilter<(T,)>, fields: &[(&str, &str)]) -> (u16, Value)
where
    T: Reply + Send + 'static,
{
    let response = warp::test::request()
        .method("POST")
        .path("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(
            fields,
            Some(("shot.jpg", "image/jpeg", b"jpeg-bytes")),
        ))
        .reply(filter)
        .await;

    let status = response.status().as_u16();
    let body: Value = serde_json::from_slice(response.body()).expect("JSON response body");

    (status, body)
}

#[tokio::test]
async fn upload_creates_a_record() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let (status, body) = post_upload(
        &filter,
        &[
            ("latitude", "48.858844"),
            ("longitude", "2.294351"),
            ("timestamp", "2026-04-12T08:16:32Z"),
            ("id", "x1"),
        ],
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Upload successful");
    assert_eq!(body["imageId"], 1);
    assert_eq!(body["retryCount"], 0);
    assert!(body["filePath"].as_str().unwrap().contains("image-"));
    assert!(body.get("duplicate").is_none());

    Ok(())
}

#[tokio::test]
async fn duplicate_retry_count_is_monotonic() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let geo = [("latitude", "48.858844"), ("longitude", "2.294351")];

    let (status, body) = post_upload(
        &filter,
        &[geo[0], geo[1], ("id", "x1"), ("retryCount", "0")],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["imageId"], 1);

    // A later attempt with a higher counter replaces the stored value
    let (status, body) = post_upload(
        &filter,
        &[geo[0], geo[1], ("id", "x1"), ("retryCount", "2")],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Image already processed");
    assert_eq!(body["duplicate"], true);
    assert_eq!(body["imageId"], 1);
    assert_eq!(body["retryCount"], 2);

    // A lower counter leaves the stored value unchanged
    let (status, body) = post_upload(
        &filter,
        &[geo[0], geo[1], ("id", "x1"), ("retryCount", "1")],
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["duplicate"], true);
    assert_eq!(body["imageId"], 1);
    assert_eq!(body["retryCount"], 2);

    // No second record was created
    let response = warp::test::request().path("/upload").reply(&filter).await;
    let body: Value = serde_json::from_slice(response.body())?;
    assert_eq!(body["total"], 1);

    Ok(())
}

#[tokio::test]
async fn retry_count_is_recorded_at_creation() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let (status, body) = post_upload(
        &filter,
        &[
            ("latitude", "48.858844"),
            ("longitude", "2.294351"),
            ("id", "x2"),
            ("retryCount", "3"),
        ],
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["retryCount"], 3);

    Ok(())
}

#[tokio::test]
async fn missing_geolocation_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let (status, body) = post_upload(&filter, &[("longitude", "2.294351")]).await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Geolocation data is required.");

    // An empty field counts as missing
    let (status, _) = post_upload(
        &filter,
        &[("latitude", ""), ("longitude", "2.294351")],
    )
    .await;
    assert_eq!(status, 400);

    Ok(())
}

#[tokio::test]
async fn non_image_uploads_are_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let response = warp::test::request()
        .method("POST")
        .path("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(
            &[("latitude", "48.858844"), ("longitude", "2.294351")],
            Some(("notes.txt", "text/plain", b"plain text")),
        ))
        .reply(&filter)
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = serde_json::from_slice(response.body())?;
    assert_eq!(body["message"], "Only image files are allowed!");

    Ok(())
}

#[tokio::test]
async fn listing_paginates_newest_first() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    for n in 0..25 {
        let key = format!("key-{n}");
        let (status, _) = post_upload(
            &filter,
            &[
                ("latitude", "48.858844"),
                ("longitude", "2.294351"),
                ("id", &key),
            ],
        )
        .await;
        assert_eq!(status, 200);
    }

    let response = warp::test::request()
        .path("/upload?page=2&limit=10")
        .reply(&filter)
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = serde_json::from_slice(response.body())?;
    assert_eq!(body["total"], 25);
    assert_eq!(body["page"], 2);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["totalPages"], 3);

    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 10);
    // Records 25..16 fill page one, so page two starts at id 15
    assert_eq!(images[0]["id"], 15);
    assert!(images[0]["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("/uploads/image-"));
    assert_eq!(images[0]["status"], "uploaded");
    assert_eq!(images[0]["latitude"], 48.858844);

    // Defaults: page 1, limit 20
    let response = warp::test::request().path("/upload").reply(&filter).await;
    let body: Value = serde_json::from_slice(response.body())?;
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["images"].as_array().unwrap().len(), 20);
    assert_eq!(body["totalPages"], 2);

    Ok(())
}

#[tokio::test]
async fn fetching_an_unknown_id_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let response = warp::test::request().path("/upload/999").reply(&filter).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = serde_json::from_slice(response.body())?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Image not found.");

    Ok(())
}

#[tokio::test]
async fn stored_files_are_served() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let filter = test_routes(&dir).await?;

    let (status, _) = post_upload(
        &filter,
        &[("latitude", "48.858844"), ("longitude", "2.294351")],
    )
    .await;
    assert_eq!(status, 200);

    let response = warp::test::request().path("/upload/1").reply(&filter).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = serde_json::from_slice(response.body())?;

    let image_url = body["imageUrl"].as_str().unwrap().to_string();
    let response = warp::test::request().path(&image_url).reply(&filter).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.body().as_ref(), &b"jpeg-bytes"[..]);

    Ok(())
}
