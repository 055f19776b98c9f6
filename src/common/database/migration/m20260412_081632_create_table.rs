use async_trait::async_trait;
use sea_orm_migration::prelude::*;

#[must_use]
#[derive(Iden)]
enum Image {
    Table,
    Id,
    FilePath,
    UserId,
    UploadedAt,
    Latitude,
    Longitude,
    Status,
    RetryCount,
    UniqueId,
}

#[must_use]
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Image::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Image::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Image::FilePath).string().not_null())
                    .col(ColumnDef::new(Image::UserId).integer())
                    .col(ColumnDef::new(Image::UploadedAt).date_time().not_null())
                    .col(ColumnDef::new(Image::Latitude).decimal_len(10, 6))
                    .col(ColumnDef::new(Image::Longitude).decimal_len(10, 6))
                    .col(
                        ColumnDef::new(Image::Status)
                            .string()
                            .not_null()
                            .default("uploaded"),
                    )
                    .col(
                        ColumnDef::new(Image::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Image::UniqueId).string().unique_key())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Image::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}
