//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use inventory::auth::{grant_permission, DatabasePermissionOracle, Principal};
use inventory::database::entities::{assets, businesses, login_users, projects};
use inventory::database::setup_database;
use inventory::services::AuthorizationService;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use tempfile::NamedTempFile;

/// Migrated SQLite database in a temp file. Keep the file handle alive for
/// the duration of the test.
pub async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

pub fn principal(name: &str) -> Principal {
    Principal::new(name).expect("valid principal")
}

pub fn authz(db: &DatabaseConnection) -> AuthorizationService {
    AuthorizationService::new(Arc::new(DatabasePermissionOracle::new(db.clone())))
}

pub async fn grant(
    db: &DatabaseConnection,
    user: &str,
    project_id: Option<i32>,
    permission: &str,
) -> Result<()> {
    grant_permission(db, &principal(user), project_id, permission).await?;
    Ok(())
}

pub async fn create_project(db: &DatabaseConnection, name: &str) -> Result<projects::Model> {
    let now = Utc::now();
    Ok(projects::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn create_business(db: &DatabaseConnection, name: &str) -> Result<businesses::Model> {
    let now = Utc::now();
    Ok(businesses::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn create_login_user(
    db: &DatabaseConnection,
    name: &str,
    project_id: Option<i32>,
) -> Result<login_users::Model> {
    let now = Utc::now();
    Ok(login_users::ActiveModel {
        name: Set(name.to_string()),
        username: Set("root".to_string()),
        password: Set(None),
        private_key: Set(None),
        project_id: Set(project_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn create_asset(
    db: &DatabaseConnection,
    hostname: &str,
    project_id: i32,
    business_id: Option<i32>,
) -> Result<assets::Model> {
    let now = Utc::now();
    Ok(assets::ActiveModel {
        hostname: Set(hostname.to_string()),
        network_ip: Set(format!("203.0.113.{}", hostname.len())),
        inner_ip: Set(format!("10.0.0.{}", hostname.len())),
        port: Set(22),
        is_active: Set(true),
        project_id: Set(project_id),
        business_id: Set(business_id),
        login_user_id: Set(None),
        os_release: Set(None),
        cpu_model: Set(None),
        memory: Set(None),
        disk: Set(None),
        serial_number: Set(None),
        remark: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}
