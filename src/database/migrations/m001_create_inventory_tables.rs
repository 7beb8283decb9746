use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Projects::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Businesses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Businesses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Businesses::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Businesses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Businesses::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LoginUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginUsers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginUsers::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(LoginUsers::Username).string().not_null())
                    .col(ColumnDef::new(LoginUsers::Password).text())
                    .col(ColumnDef::new(LoginUsers::PrivateKey).string())
                    .col(ColumnDef::new(LoginUsers::ProjectId).integer())
                    .col(ColumnDef::new(LoginUsers::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(LoginUsers::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_login_users_project_id")
                            .from(LoginUsers::Table, LoginUsers::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Projects owning assets cannot be removed until the assets move or go.
        manager
            .create_table(
                Table::create()
                    .table(Assets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Assets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Assets::Hostname).string().not_null().unique_key())
                    .col(ColumnDef::new(Assets::NetworkIp).string().not_null().default(""))
                    .col(ColumnDef::new(Assets::InnerIp).string().not_null().default(""))
                    .col(ColumnDef::new(Assets::Port).integer().not_null().default(22))
                    .col(ColumnDef::new(Assets::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Assets::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Assets::BusinessId).integer())
                    .col(ColumnDef::new(Assets::LoginUserId).integer())
                    .col(ColumnDef::new(Assets::OsRelease).string())
                    .col(ColumnDef::new(Assets::CpuModel).string())
                    .col(ColumnDef::new(Assets::Memory).string())
                    .col(ColumnDef::new(Assets::Disk).string())
                    .col(ColumnDef::new(Assets::SerialNumber).string())
                    .col(ColumnDef::new(Assets::Remark).text())
                    .col(ColumnDef::new(Assets::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Assets::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assets_project_id")
                            .from(Assets::Table, Assets::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assets_business_id")
                            .from(Assets::Table, Assets::BusinessId)
                            .to(Businesses::Table, Businesses::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assets_login_user_id")
                            .from(Assets::Table, Assets::LoginUserId)
                            .to(LoginUsers::Table, LoginUsers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assets_project_business")
                    .table(Assets::Table)
                    .col(Assets::ProjectId)
                    .col(Assets::BusinessId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectGrants::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectGrants::Principal).string().not_null())
                    .col(ColumnDef::new(ProjectGrants::ProjectId).integer())
                    .col(ColumnDef::new(ProjectGrants::Permission).string().not_null())
                    .col(ColumnDef::new(ProjectGrants::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_grants_project_id")
                            .from(ProjectGrants::Table, ProjectGrants::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_grants_lookup")
                    .table(ProjectGrants::Table)
                    .col(ProjectGrants::Principal)
                    .col(ProjectGrants::ProjectId)
                    .col(ProjectGrants::Permission)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectGrants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoginUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Businesses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Businesses {
    Table,
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum LoginUsers {
    Table,
    Id,
    Name,
    Username,
    Password,
    PrivateKey,
    ProjectId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Assets {
    Table,
    Id,
    Hostname,
    NetworkIp,
    InnerIp,
    Port,
    IsActive,
    ProjectId,
    BusinessId,
    LoginUserId,
    OsRelease,
    CpuModel,
    Memory,
    Disk,
    SerialNumber,
    Remark,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProjectGrants {
    Table,
    Id,
    Principal,
    ProjectId,
    Permission,
    CreatedAt,
}
