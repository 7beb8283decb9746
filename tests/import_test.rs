//! CSV import reconciliation tests

mod common;

use anyhow::Result;
use common::*;
use inventory::config::InventoryConfig;
use inventory::database::entities::assets;
use inventory::errors::ImportExportError;
use inventory::services::{ExportSelection, ExportService, ImportService};
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder};

fn importer(db: &sea_orm::DatabaseConnection) -> ImportService {
    ImportService::new(db.clone(), &InventoryConfig::default())
}

async fn asset_by_hostname(
    db: &sea_orm::DatabaseConnection,
    hostname: &str,
) -> Result<assets::Model> {
    Ok(assets::Entity::find()
        .filter(assets::Column::Hostname.eq(hostname))
        .one(db)
        .await?
        .expect("asset should exist"))
}

const THREE_HOSTS: &str = "\
Hostname,Public IP,Inner IP,SSH Port,Active,Project,Business,Login User
web-01,203.0.113.10,10.0.0.10,22,TRUE,ops,billing,deploy
web-02,203.0.113.11,10.0.0.11,2222,true,ops,,deploy
db-01,203.0.113.12,10.0.0.12,22,0,ops,billing,
";

#[tokio::test]
async fn test_import_creates_assets_with_references() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    let billing = create_business(&db, "billing").await?;
    let deploy = create_login_user(&db, "deploy", Some(ops.id)).await?;

    let report = importer(&db).reconcile(THREE_HOSTS.as_bytes()).await?;
    assert_eq!(report.created, vec!["web-01", "web-02", "db-01"]);
    assert!(report.updated.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.summary(), "Created: 3. Updated: 0, Error: 0");

    let web = asset_by_hostname(&db, "web-01").await?;
    assert_eq!(web.project_id, ops.id);
    assert_eq!(web.business_id, Some(billing.id));
    assert_eq!(web.login_user_id, Some(deploy.id));
    assert!(web.is_active);

    let web2 = asset_by_hostname(&db, "web-02").await?;
    assert_eq!(web2.port, 2222);
    assert_eq!(web2.business_id, None);

    let db01 = asset_by_hostname(&db, "db-01").await?;
    assert!(!db01.is_active);
    assert_eq!(db01.login_user_id, None);

    Ok(())
}

#[tokio::test]
async fn test_reimporting_an_export_only_updates() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    create_business(&db, "billing").await?;
    create_login_user(&db, "deploy", Some(ops.id)).await?;
    grant(&db, "alice", Some(ops.id), "read").await?;

    importer(&db).reconcile(THREE_HOSTS.as_bytes()).await?;
    let exported = ExportService::new(db.clone(), authz(&db))
        .export_assets(&principal("alice"), ExportSelection::All)
        .await?;

    let report = importer(&db).reconcile(&exported).await?;
    assert!(report.created.is_empty());
    assert_eq!(report.updated.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(assets::Entity::find().all(&db).await?.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_export_then_import_rebuilds_deleted_assets() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    create_business(&db, "billing").await?;
    create_login_user(&db, "deploy", Some(ops.id)).await?;
    grant(&db, "alice", Some(ops.id), "read").await?;

    importer(&db).reconcile(THREE_HOSTS.as_bytes()).await?;
    let before = assets::Entity::find()
        .order_by_asc(assets::Column::Hostname)
        .all(&db)
        .await?;
    let exported = ExportService::new(db.clone(), authz(&db))
        .export_assets(&principal("alice"), ExportSelection::All)
        .await?;

    for asset in before.clone() {
        asset.delete(&db).await?;
    }
    let report = importer(&db).reconcile(&exported).await?;
    assert_eq!(report.created.len(), 3);
    assert!(report.failed.is_empty());

    let after = assets::Entity::find()
        .order_by_asc(assets::Column::Hostname)
        .all(&db)
        .await?;
    assert_eq!(before.len(), after.len());
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(old.hostname, new.hostname);
        assert_eq!(old.network_ip, new.network_ip);
        assert_eq!(old.inner_ip, new.inner_ip);
        assert_eq!(old.port, new.port);
        assert_eq!(old.is_active, new.is_active);
        assert_eq!(old.project_id, new.project_id);
        assert_eq!(old.business_id, new.business_id);
        assert_eq!(old.login_user_id, new.login_user_id);
    }

    Ok(())
}

#[tokio::test]
async fn test_duplicate_hostname_fails_only_that_row() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    create_asset(&db, "web-01", ops.id, None).await?;

    let csv = "Hostname,Project\nweb-01,ops\nweb-09,ops\n";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert_eq!(report.created, vec!["web-09"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].row, "web-01");
    assert_eq!(report.failed[0].reason, "hostname already exists");

    Ok(())
}

#[tokio::test]
async fn test_unknown_columns_are_ignored() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let csv = "Rack,Hostname,Project,Owner Email\nr12,web-01,ops,ops@example.com\n";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert_eq!(report.created, vec!["web-01"]);
    assert!(report.failed.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_boolean_and_port_coercion() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let csv = "\
Hostname,SSH Port,Active,Project
a-01,ssh,yes,ops
a-02, 2200 , 1 ,ops
a-03,,,ops
";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;
    assert_eq!(report.created.len(), 3);

    let a1 = asset_by_hostname(&db, "a-01").await?;
    assert_eq!(a1.port, 22);
    assert!(!a1.is_active);

    let a2 = asset_by_hostname(&db, "a-02").await?;
    assert_eq!(a2.port, 2200);
    assert!(a2.is_active);

    // Blank cells fall back to column defaults on create
    let a3 = asset_by_hostname(&db, "a-03").await?;
    assert_eq!(a3.port, 22);
    assert!(a3.is_active);

    Ok(())
}

#[tokio::test]
async fn test_missing_project_fails_row_and_keeps_others() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let csv = "Hostname,Project\nweb-01,ops\nweb-02,nowhere\nweb-03,ops\n";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert_eq!(report.created, vec!["web-01", "web-03"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].row, "web-02");
    assert_eq!(assets::Entity::find().all(&db).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_update_by_id_keeps_data_for_blank_cells() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    let web = create_project(&db, "web").await?;
    let asset = create_asset(&db, "web-01", ops.id, None).await?;

    let csv = format!(
        "ID,Hostname,Public IP,Inner IP,Project,Remark\n{},,198.51.100.7,,web,rebuilt\n",
        asset.id
    );
    let report = importer(&db).reconcile(csv.as_bytes()).await?;
    assert_eq!(report.updated, vec!["web-01"]);

    let updated = asset_by_hostname(&db, "web-01").await?;
    assert_eq!(updated.network_ip, "198.51.100.7");
    assert_eq!(updated.inner_ip, asset.inner_ip);
    assert_eq!(updated.project_id, web.id);
    assert_eq!(updated.remark.as_deref(), Some("rebuilt"));

    Ok(())
}

#[tokio::test]
async fn test_update_that_breaks_unique_hostname_fails_row() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let ops = create_project(&db, "ops").await?;
    create_asset(&db, "a", ops.id, None).await?;
    let b = create_asset(&db, "b", ops.id, None).await?;

    let csv = format!("ID,Hostname\n{},a\n", b.id);
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert!(report.created.is_empty());
    assert!(report.updated.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].row, "a");
    assert!(report.failed[0].reason.contains("UNIQUE"));

    let unchanged = asset_by_hostname(&db, "b").await?;
    assert_eq!(unchanged.id, b.id);
    assert_eq!(assets::Entity::find().all(&db).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_gated_import_needs_change_per_row() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let p = create_project(&db, "P").await?;
    let q = create_project(&db, "Q").await?;
    let p1 = create_asset(&db, "p1", p.id, None).await?;
    let q1 = create_asset(&db, "q1", q.id, None).await?;
    grant(&db, "alice", Some(p.id), "change").await?;
    grant(&db, "alice", Some(q.id), "read").await?;

    let csv = format!(
        "ID,Hostname,Project,Remark\n\
         {},q1,,touched\n\
         {},p1,,touched\n\
         {},p1,Q,moved\n\
         ,p2,P,\n\
         ,q2,Q,\n",
        q1.id, p1.id, p1.id
    );
    let report = importer(&db)
        .on_behalf_of(authz(&db), principal("alice"))
        .reconcile(csv.as_bytes())
        .await?;

    assert_eq!(report.updated, vec!["p1"]);
    assert_eq!(report.created, vec!["p2"]);
    let failed: Vec<(&str, &str)> = report
        .failed
        .iter()
        .map(|f| (f.row.as_str(), f.reason.as_str()))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("q1", "no change_project permission"),
            ("p1", "no change_project permission"),
            ("q2", "no change_project permission"),
        ]
    );

    let q1 = asset_by_hostname(&db, "q1").await?;
    assert_eq!(q1.remark, None);
    let p1 = asset_by_hostname(&db, "p1").await?;
    assert_eq!(p1.project_id, p.id);
    assert_eq!(p1.remark.as_deref(), Some("touched"));

    // The same document runs ungated from the command line
    let report = importer(&db).reconcile(csv.as_bytes()).await?;
    assert_eq!(report.updated, vec!["q1", "p1", "p1"]);
    assert_eq!(report.created, vec!["q2"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reason, "hostname already exists");

    Ok(())
}

#[tokio::test]
async fn test_unknown_id_falls_back_to_create() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let csv = "ID,Hostname,Project\n999,web-01,ops\n0,web-02,ops\nabc,web-03,ops\n";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert_eq!(report.created, vec!["web-01", "web-02", "web-03"]);

    Ok(())
}

#[tokio::test]
async fn test_blank_rows_are_skipped_and_short_rows_accepted() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let csv = "Hostname,Project,Remark\n,,\nweb-01,ops\n\n";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert_eq!(report.created, vec!["web-01"]);
    assert!(report.failed.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_row_without_hostname_uses_raw_cells() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let csv = "Public IP,Project\n203.0.113.9,ops\n";
    let report = importer(&db).reconcile(csv.as_bytes()).await?;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].row, "203.0.113.9,ops");
    assert_eq!(report.failed[0].reason, "hostname is required");

    Ok(())
}

#[tokio::test]
async fn test_undecodable_upload_is_rejected_whole() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let mut bytes = b"Hostname,Project\nweb-01,ops\n".to_vec();
    bytes.extend_from_slice(&[0x00, 0x01, 0x02, 0x00]);

    let err = importer(&db)
        .reconcile(&bytes)
        .await
        .expect_err("binary content should be rejected");
    assert!(matches!(err, ImportExportError::EncodingError(_)));
    assert!(assets::Entity::find().all(&db).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_bom_prefixed_upload() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_project(&db, "ops").await?;

    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice("Hostname,Project\nweb-01,ops\n".as_bytes());
    let report = importer(&db).reconcile(&bytes).await?;

    assert_eq!(report.created, vec!["web-01"]);

    Ok(())
}
