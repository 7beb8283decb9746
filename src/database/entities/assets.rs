use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub hostname: String,
    pub network_ip: String,
    pub inner_ip: String,
    pub port: i32,
    pub is_active: bool,
    pub project_id: i32,
    pub business_id: Option<i32>,
    pub login_user_id: Option<i32>,
    // Hardware facts, refreshed by the asset_hardware job
    pub os_release: Option<String>,
    pub cpu_model: Option<String>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    pub serial_number: Option<String>,
    pub remark: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Projects,
    #[sea_orm(
        belongs_to = "super::businesses::Entity",
        from = "Column::BusinessId",
        to = "super::businesses::Column::Id"
    )]
    Businesses,
    #[sea_orm(
        belongs_to = "super::login_users::Entity",
        from = "Column::LoginUserId",
        to = "super::login_users::Column::Id"
    )]
    LoginUsers,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::businesses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Businesses.def()
    }
}

impl Related<super::login_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoginUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
