use std::collections::HashMap;

use chrono::Utc;
use csv::ReaderBuilder;
use indexmap::IndexMap;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::{Capability, Principal};
use crate::config::InventoryConfig;
use crate::database::entities::{assets, businesses, login_users, projects};
use crate::errors::{ImportExportError, ImportExportResult};
use crate::services::asset_schema::{
    self, clean_text, coerce_bool, coerce_port, AssetField, CoercionKind, FieldSpec,
};
use crate::services::authorization::AuthorizationService;
use crate::services::text_decoding::decode_upload;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedRow {
    /// Hostname of the row, or the raw cells joined with commas
    pub row: String,
    pub reason: String,
}

/// Outcome of one import. Rows are independent: a failed row never undoes
/// the rows before it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<FailedRow>,
}

impl ReconcileReport {
    pub fn created_info(&self) -> String {
        format!("Created {}", self.created.len())
    }

    pub fn updated_info(&self) -> String {
        format!("Updated {}", self.updated.len())
    }

    pub fn failed_info(&self) -> String {
        format!("Failed {}", self.failed.len())
    }

    pub fn summary(&self) -> String {
        format!(
            "Created: {}. Updated: {}, Error: {}",
            self.created.len(),
            self.updated.len(),
            self.failed.len()
        )
    }

    /// Body returned by the import endpoint.
    pub fn to_json(&self) -> Value {
        let failed: Vec<String> = self
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.row, f.reason))
            .collect();
        json!({
            "created": self.created,
            "created_info": self.created_info(),
            "updated": self.updated,
            "updated_info": self.updated_info(),
            "failed": failed,
            "failed_info": self.failed_info(),
            "valid": true,
            "msg": self.summary(),
        })
    }
}

/// Coerced cell values of one row. `None` means "not supplied".
#[derive(Debug, Default)]
struct AssetValues {
    hostname: Option<String>,
    network_ip: Option<String>,
    inner_ip: Option<String>,
    port: Option<i32>,
    is_active: Option<bool>,
    project_id: Option<i32>,
    business_id: Option<i32>,
    login_user_id: Option<i32>,
    os_release: Option<String>,
    cpu_model: Option<String>,
    memory: Option<String>,
    disk: Option<String>,
    serial_number: Option<String>,
    remark: Option<String>,
}

/// Name to id lookups, cached for the duration of one import.
#[derive(Default)]
struct ReferenceCache {
    projects: HashMap<String, Option<i32>>,
    businesses: HashMap<String, Option<i32>>,
    login_users: HashMap<String, Option<i32>>,
}

/// Principal whose project permissions every row is checked against.
struct RowGate {
    authz: AuthorizationService,
    principal: Principal,
}

pub struct ImportService {
    db: DatabaseConnection,
    default_ssh_port: i32,
    gate: Option<RowGate>,
}

impl ImportService {
    pub fn new(db: DatabaseConnection, config: &InventoryConfig) -> Self {
        Self {
            db,
            default_ssh_port: config.default_ssh_port,
            gate: None,
        }
    }

    /// Require `change` on the projects a row writes to. Without this the
    /// import trusts its caller, as the CLI does.
    pub fn on_behalf_of(mut self, authz: AuthorizationService, principal: Principal) -> Self {
        self.gate = Some(RowGate { authz, principal });
        self
    }

    /// Create or update assets from an uploaded CSV file.
    ///
    /// Only whole-file problems (encoding, unreadable CSV, missing header)
    /// are returned as errors. Everything row specific ends up in the report.
    pub async fn reconcile(&self, raw: &[u8]) -> ImportExportResult<ReconcileReport> {
        let text = decode_upload(raw)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        let header = records
            .next()
            .ok_or_else(|| ImportExportError::MissingData("file has no header row".to_string()))??;
        let columns: Vec<Option<&'static FieldSpec>> =
            header.iter().map(asset_schema::field_for_label).collect();
        for (label, column) in header.iter().zip(&columns) {
            if column.is_none() {
                debug!("Ignoring unknown import column '{}'", label);
            }
        }

        let mut report = ReconcileReport::default();
        let mut cache = ReferenceCache::default();

        for (index, record) in records.enumerate() {
            let record = record?;
            let cells: Vec<&str> = record.iter().collect();
            if cells.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let mut row: IndexMap<AssetField, (&'static FieldSpec, &str)> = IndexMap::new();
            for (column, cell) in columns.iter().zip(cells.iter()) {
                if let Some(spec) = column {
                    row.insert(spec.field, (*spec, *cell));
                }
            }

            let label = row
                .get(&AssetField::Hostname)
                .and_then(|(_, cell)| clean_text(cell))
                .unwrap_or_else(|| cells.join(","));

            let id = row
                .shift_remove(&AssetField::Id)
                .and_then(|(_, cell)| asset_schema::parse_identifier(cell));

            let values = match self.coerce_row(&row, &mut cache).await {
                Ok(values) => values,
                Err(reason) => {
                    warn!("Import row {} ({}) failed: {}", index + 1, label, reason);
                    report.failed.push(FailedRow { row: label, reason });
                    continue;
                }
            };

            let outcome = match self.find_existing(id).await {
                Ok(Some(existing)) => self
                    .update_asset(existing, values)
                    .await
                    .map(|hostname| report.updated.push(hostname)),
                Ok(None) => self
                    .create_asset(values)
                    .await
                    .map(|hostname| report.created.push(hostname)),
                Err(reason) => Err(reason),
            };

            if let Err(reason) = outcome {
                warn!("Import row {} ({}) failed: {}", index + 1, label, reason);
                report.failed.push(FailedRow { row: label, reason });
            } else {
                debug!("Import row {} ({}) reconciled", index + 1, label);
            }
        }

        info!("Asset import finished. {}", report.summary());
        Ok(report)
    }

    async fn find_existing(&self, id: Option<i32>) -> Result<Option<assets::Model>, String> {
        match id {
            Some(id) => assets::Entity::find_by_id(id)
                .one(&self.db)
                .await
                .map_err(|e| e.to_string()),
            None => Ok(None),
        }
    }

    async fn coerce_row(
        &self,
        row: &IndexMap<AssetField, (&'static FieldSpec, &str)>,
        cache: &mut ReferenceCache,
    ) -> Result<AssetValues, String> {
        let mut values = AssetValues::default();

        for (field, (spec, cell)) in row {
            match spec.kind {
                CoercionKind::Identifier | CoercionKind::Timestamp => {}
                CoercionKind::Boolean => values.is_active = coerce_bool(cell),
                CoercionKind::Port => values.port = coerce_port(cell, self.default_ssh_port),
                CoercionKind::ProjectRef => {
                    values.project_id = self.project_ref(cell, cache).await?;
                }
                CoercionKind::BusinessRef => {
                    values.business_id = self.business_ref(cell, cache).await?;
                }
                CoercionKind::LoginUserRef => {
                    values.login_user_id = self.login_user_ref(cell, cache).await?;
                }
                CoercionKind::Text => {
                    let text = clean_text(cell);
                    match field {
                        AssetField::Hostname => values.hostname = text,
                        AssetField::NetworkIp => values.network_ip = text,
                        AssetField::InnerIp => values.inner_ip = text,
                        AssetField::OsRelease => values.os_release = text,
                        AssetField::CpuModel => values.cpu_model = text,
                        AssetField::Memory => values.memory = text,
                        AssetField::Disk => values.disk = text,
                        AssetField::SerialNumber => values.serial_number = text,
                        AssetField::Remark => values.remark = text,
                        _ => {}
                    }
                }
            }
        }

        Ok(values)
    }

    async fn project_ref(
        &self,
        cell: &str,
        cache: &mut ReferenceCache,
    ) -> Result<Option<i32>, String> {
        let Some(name) = clean_text(cell) else {
            return Ok(None);
        };
        if let Some(id) = cache.projects.get(&name) {
            return Ok(*id);
        }
        let id = projects::Entity::find()
            .filter(projects::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| e.to_string())?
            .map(|p| p.id);
        if id.is_none() {
            debug!("Import references unknown project '{}'", name);
        }
        cache.projects.insert(name, id);
        Ok(id)
    }

    async fn business_ref(
        &self,
        cell: &str,
        cache: &mut ReferenceCache,
    ) -> Result<Option<i32>, String> {
        let Some(name) = clean_text(cell) else {
            return Ok(None);
        };
        if let Some(id) = cache.businesses.get(&name) {
            return Ok(*id);
        }
        let id = businesses::Entity::find()
            .filter(businesses::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| e.to_string())?
            .map(|b| b.id);
        if id.is_none() {
            debug!("Import references unknown business '{}'", name);
        }
        cache.businesses.insert(name, id);
        Ok(id)
    }

    async fn login_user_ref(
        &self,
        cell: &str,
        cache: &mut ReferenceCache,
    ) -> Result<Option<i32>, String> {
        let Some(name) = clean_text(cell) else {
            return Ok(None);
        };
        if let Some(id) = cache.login_users.get(&name) {
            return Ok(*id);
        }
        let id = login_users::Entity::find()
            .filter(login_users::Column::Name.eq(name.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| e.to_string())?
            .map(|u| u.id);
        if id.is_none() {
            debug!("Import references unknown login user '{}'", name);
        }
        cache.login_users.insert(name, id);
        Ok(id)
    }

    /// `change` on `project_id` for the gated principal; a no-op when ungated.
    async fn authorize(&self, project_id: Option<i32>) -> Result<(), String> {
        let Some(gate) = &self.gate else {
            return Ok(());
        };
        let project = match project_id {
            Some(id) => projects::Entity::find_by_id(id)
                .one(&self.db)
                .await
                .map_err(|e| e.to_string())?,
            None => None,
        };
        gate.authz
            .check_project(&gate.principal, Capability::Change, project.as_ref())
            .await
            .map_err(|denial| denial.reason)
    }

    async fn create_asset(&self, values: AssetValues) -> Result<String, String> {
        let hostname = values
            .hostname
            .ok_or_else(|| "hostname is required".to_string())?;

        let duplicate = assets::Entity::find()
            .filter(assets::Column::Hostname.eq(hostname.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| e.to_string())?;
        if duplicate.is_some() {
            return Err("hostname already exists".to_string());
        }
        self.authorize(values.project_id).await?;

        let now = Utc::now();
        let mut asset = assets::ActiveModel {
            hostname: Set(hostname.clone()),
            network_ip: Set(values.network_ip.unwrap_or_default()),
            inner_ip: Set(values.inner_ip.unwrap_or_default()),
            port: Set(values.port.unwrap_or(self.default_ssh_port)),
            is_active: Set(values.is_active.unwrap_or(true)),
            business_id: Set(values.business_id),
            login_user_id: Set(values.login_user_id),
            os_release: Set(values.os_release),
            cpu_model: Set(values.cpu_model),
            memory: Set(values.memory),
            disk: Set(values.disk),
            serial_number: Set(values.serial_number),
            remark: Set(values.remark),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        // Left unset without a project so the NOT NULL constraint rejects the row
        if let Some(project_id) = values.project_id {
            asset.project_id = Set(project_id);
        }

        let txn = self.db.begin().await.map_err(|e| e.to_string())?;
        asset.insert(&txn).await.map_err(|e| e.to_string())?;
        txn.commit().await.map_err(|e| e.to_string())?;

        Ok(hostname)
    }

    async fn update_asset(
        &self,
        existing: assets::Model,
        values: AssetValues,
    ) -> Result<String, String> {
        self.authorize(Some(existing.project_id)).await?;
        if let Some(target) = values.project_id.filter(|id| *id != existing.project_id) {
            self.authorize(Some(target)).await?;
        }

        let mut asset: assets::ActiveModel = existing.into();

        if let Some(hostname) = values.hostname {
            asset.hostname = Set(hostname);
        }
        if let Some(network_ip) = values.network_ip {
            asset.network_ip = Set(network_ip);
        }
        if let Some(inner_ip) = values.inner_ip {
            asset.inner_ip = Set(inner_ip);
        }
        if let Some(port) = values.port {
            asset.port = Set(port);
        }
        if let Some(is_active) = values.is_active {
            asset.is_active = Set(is_active);
        }
        if let Some(project_id) = values.project_id {
            asset.project_id = Set(project_id);
        }
        if let Some(business_id) = values.business_id {
            asset.business_id = Set(Some(business_id));
        }
        if let Some(login_user_id) = values.login_user_id {
            asset.login_user_id = Set(Some(login_user_id));
        }
        if values.os_release.is_some() {
            asset.os_release = Set(values.os_release);
        }
        if values.cpu_model.is_some() {
            asset.cpu_model = Set(values.cpu_model);
        }
        if values.memory.is_some() {
            asset.memory = Set(values.memory);
        }
        if values.disk.is_some() {
            asset.disk = Set(values.disk);
        }
        if values.serial_number.is_some() {
            asset.serial_number = Set(values.serial_number);
        }
        if values.remark.is_some() {
            asset.remark = Set(values.remark);
        }
        asset.updated_at = Set(Utc::now());

        let saved = asset.update(&self.db).await.map_err(|e| e.to_string())?;
        Ok(saved.hostname)
    }
}
