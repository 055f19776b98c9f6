use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

#[derive(Debug, PartialEq, Clone, DeriveEntityModel)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub file_path: String,
    pub user_id: Option<i32>,
    pub uploaded_at: NaiveDateTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    pub retry_count: i32,
    #[sea_orm(unique)]
    pub unique_id: Option<String>,
}

#[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
