use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::assets::Entity")]
    Assets,
    #[sea_orm(has_many = "super::login_users::Entity")]
    LoginUsers,
    #[sea_orm(has_many = "super::project_grants::Entity")]
    ProjectGrants,
}

impl Related<super::assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl Related<super::login_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoginUsers.def()
    }
}

impl Related<super::project_grants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectGrants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
