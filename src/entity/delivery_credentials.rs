use sea_orm::entity::prelude::*;

/// Single-row table; `id` is always [`SINGLETON_ID`].
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "delivery_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i16,
    pub password_hash: String,
    pub updated_at: DateTimeWithTimeZone,
}

pub const SINGLETON_ID: i16 = 1;

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
