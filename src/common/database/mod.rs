mod entity;
mod migration;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Database, DatabaseConnection, EntityTrait,
    ItemsAndPagesNumber, PaginatorTrait, QueryFilter, QueryOrder,
};
use tokio::fs;
use tracing::info;

use crate::{here, Config, Error, ErrorLocation, Timing};
use entity::{image, Image};
use migration::{Migrator, MigratorTrait};

pub use entity::image::Model as ImageModel;

const DB_FILE_NAME: &str = "geoimage.db";

/// Repository over the `image` table
///
/// Each operation is a single round trip; there are no transactions and no
/// caching. The unique index over `unique_id` is the authoritative
/// deduplication backstop for the check-then-insert race
#[must_use]
pub struct ImageDB {
    db: DatabaseConnection,
}

/// A freshly accepted upload, before the store assigns an id
#[must_use]
#[derive(Debug)]
pub struct NewImage {
    pub file_path: String,
    pub latitude: f64,
    pub longitude: f64,
    pub unique_id: Option<String>,
    pub retry_count: i32,
}

impl ImageDB {
    /// Connect and run pending migrations
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let mut timing = Timing::new();

        let db_url = match config.database_url.as_ref() {
            Some(url) => url.clone(),
            None => {
                let mut db_path = crate::data_dir_path(Config::APP_NAME).location(here!())?;
                fs::create_dir_all(&db_path).await.location(here!())?;

                db_path.push(DB_FILE_NAME);

                if db_path.exists() {
                    info!("The database file is located at `{}`", db_path.display());
                } else {
                    info!(
                        "The database file will be created at `{}`",
                        db_path.display()
                    );
                }

                format!("sqlite:{}?mode=rwc", db_path.display())
            }
        };

        let db = Database::connect(db_url).await.location(here!())?;
        Migrator::up(&db, None).await.location(here!())?;

        info!("Database creation takes `{}`", timing.elapsed());

        Ok(Self { db })
    }

    #[cfg(test)]
    pub(crate) async fn drop(&self) -> Result<(), Error> {
        Ok(Migrator::down(&self.db, None).await.location(here!())?)
    }

    /// Persist a new record, assigning id and upload time
    pub async fn insert_image(&self, new: NewImage) -> Result<ImageModel, Error> {
        let model = image::ActiveModel {
            file_path: Set(new.file_path),
            uploaded_at: Set(chrono::Utc::now().naive_utc()),
            latitude: Set(Some(new.latitude)),
            longitude: Set(Some(new.longitude)),
            status: Set(String::from("uploaded")),
            retry_count: Set(new.retry_count),
            unique_id: Set(new.unique_id),
            ..Default::default()
        };

        Ok(model.insert(&self.db).await.location(here!())?)
    }

    /// Replace the stored retry counter, leaving every other column untouched
    pub async fn update_retry_count(
        &self,
        image: ImageModel,
        retry_count: i32,
    ) -> Result<ImageModel, Error> {
        let mut model: image::ActiveModel = image.into();
        model.retry_count = Set(retry_count);

        Ok(model.update(&self.db).await.location(here!())?)
    }

    /// Look up by the client-supplied idempotency key, absence is not an error
    pub async fn find_by_unique_id<T>(&self, unique_id: T) -> Result<Option<ImageModel>, Error>
    where
        T: AsRef<str>,
    {
        Ok(Image::find()
            .filter(image::Column::UniqueId.eq(unique_id.as_ref()))
            .one(&self.db)
            .await
            .location(here!())?)
    }

    /// Look up by primary key
    pub async fn find_by_id(&self, id: i32) -> Result<ImageModel, Error> {
        match Image::find_by_id(id).one(&self.db).await.location(here!())? {
            Some(model) => Ok(model),
            None => Err(Error::NotFound(String::from("Image not found."))),
        }
    }

    /// One page of records, newest first, with total row and page counts
    pub async fn find_all_paged(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ImageModel>, u64, u64), Error> {
        let paginator = Image::find()
            .order_by_desc(image::Column::UploadedAt)
            // id as tie-break, upload bursts share a timestamp
            .order_by_desc(image::Column::Id)
            .paginate(&self.db, limit);

        let ItemsAndPagesNumber {
            number_of_items,
            number_of_pages,
        } = paginator.num_items_and_pages().await.location(here!())?;
        let models = paginator.fetch_page(page - 1).await.location(here!())?;

        Ok((models, number_of_items, number_of_pages))
    }
}
