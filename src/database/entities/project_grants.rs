use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A permission held by a principal. With a project id it is an object
/// permission on that project (`read`, `change`, `delete`, `cmd`); without one
/// it is a model permission such as `add_asset`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project_grants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub principal: String,
    pub project_id: Option<i32>,
    pub permission: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Projects,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
