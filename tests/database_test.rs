//! Database functionality tests
//!
//! Tests for migrations, constraints and the grant-backed permission oracle

mod common;

use anyhow::Result;
use chrono::Utc;
use common::*;
use inventory::auth::{
    grant_permission, Capability, DatabasePermissionOracle, ModelPermission, PermissionOracle,
};
use inventory::database::entities::*;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set};

#[tokio::test]
async fn test_database_migrations() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    assert!(projects::Entity::find().all(&db).await?.is_empty());
    assert!(businesses::Entity::find().all(&db).await?.is_empty());
    assert!(login_users::Entity::find().all(&db).await?.is_empty());
    assert!(assets::Entity::find().all(&db).await?.is_empty());
    assert!(project_grants::Entity::find().all(&db).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_hostname_is_unique() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let project = create_project(&db, "ops").await?;

    create_asset(&db, "web-01", project.id, None).await?;
    assert!(create_asset(&db, "web-01", project.id, None).await.is_err());
    // Case sensitive
    create_asset(&db, "WEB-01", project.id, None).await?;

    Ok(())
}

#[tokio::test]
async fn test_asset_requires_project() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let now = Utc::now();
    let orphan = assets::ActiveModel {
        hostname: Set("orphan".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    assert!(orphan.insert(&db).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_project_with_assets_cannot_be_deleted() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let project = create_project(&db, "ops").await?;
    let asset = create_asset(&db, "web-01", project.id, None).await?;

    assert!(project.clone().delete(&db).await.is_err());

    asset.delete(&db).await?;
    project.delete(&db).await?;
    assert!(projects::Entity::find().all(&db).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_deleting_business_clears_asset_reference() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let project = create_project(&db, "ops").await?;
    let business = create_business(&db, "billing").await?;
    let asset = create_asset(&db, "web-01", project.id, Some(business.id)).await?;

    business.delete(&db).await?;

    let asset = assets::Entity::find_by_id(asset.id)
        .one(&db)
        .await?
        .expect("asset survives");
    assert_eq!(asset.business_id, None);

    Ok(())
}

#[tokio::test]
async fn test_grants_back_the_oracle() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    let web = create_project(&db, "web").await?;
    let oracle = DatabasePermissionOracle::new(db.clone());
    let alice = principal("alice");

    grant(&db, "alice", Some(ops.id), "read").await?;
    grant(&db, "alice", None, "add_asset").await?;

    assert!(oracle.has_permission(&alice, Capability::Read, &ops).await);
    assert!(!oracle.has_permission(&alice, Capability::Change, &ops).await);
    assert!(!oracle.has_permission(&alice, Capability::Read, &web).await);
    assert!(!oracle.has_permission(&principal("bob"), Capability::Read, &ops).await);

    assert!(oracle.has_model_permission(&alice, ModelPermission::AddAsset).await);
    assert!(!oracle.has_model_permission(&alice, ModelPermission::AddProject).await);

    Ok(())
}

#[tokio::test]
async fn test_grant_is_idempotent_and_validated() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    let alice = principal("alice");

    let first = grant_permission(&db, &alice, Some(ops.id), "delete_project").await?;
    let second = grant_permission(&db, &alice, Some(ops.id), "delete_project").await?;
    assert_eq!(first.id, second.id);
    assert_eq!(project_grants::Entity::find().all(&db).await?.len(), 1);

    assert!(grant_permission(&db, &alice, Some(ops.id), "add_asset").await.is_err());
    assert!(grant_permission(&db, &alice, None, "read").await.is_err());

    Ok(())
}
