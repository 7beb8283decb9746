use std::collections::HashMap;

use csv::Writer;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::info;

use crate::auth::{Capability, Principal};
use crate::database::entities::{assets, businesses, login_users};
use crate::errors::{ImportExportError, ImportExportResult};
use crate::services::asset_schema::{transferable_fields, AssetField};
use crate::services::authorization::{AuthorizationService, ProjectIndex};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which assets a caller asked to export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportSelection {
    All,
    Ids(Vec<i32>),
}

/// Names of the records assets point at, keyed by id.
#[derive(Default)]
struct ReferenceNames {
    businesses: HashMap<i32, String>,
    login_users: HashMap<i32, String>,
}

pub struct ExportService {
    db: DatabaseConnection,
    authz: AuthorizationService,
}

impl ExportService {
    pub fn new(db: DatabaseConnection, authz: AuthorizationService) -> Self {
        Self { db, authz }
    }

    /// Readable assets of `selection` as a BOM-prefixed CSV document whose
    /// header row uses the same labels the import understands.
    pub async fn export_assets(
        &self,
        principal: &Principal,
        selection: ExportSelection,
    ) -> ImportExportResult<Vec<u8>> {
        let mut query = assets::Entity::find().order_by_asc(assets::Column::Id);
        if let ExportSelection::Ids(ids) = selection {
            if ids.is_empty() {
                return self.write_csv(&[], &ProjectIndex::default(), &ReferenceNames::default());
            }
            query = query.filter(assets::Column::Id.is_in(ids));
        }
        let rows = query.all(&self.db).await?;

        let index = ProjectIndex::load_for(&self.db, &rows).await?;
        let readable = self
            .authz
            .filter_scoped(principal, Capability::Read, rows, &index)
            .await;
        let names = self.load_names(&readable).await?;

        info!("Exporting {} assets for {}", readable.len(), principal);
        self.write_csv(&readable, &index, &names)
    }

    async fn load_names(&self, rows: &[assets::Model]) -> ImportExportResult<ReferenceNames> {
        let business_ids: Vec<i32> = rows.iter().filter_map(|a| a.business_id).collect();
        let login_user_ids: Vec<i32> = rows.iter().filter_map(|a| a.login_user_id).collect();
        let mut names = ReferenceNames::default();

        if !business_ids.is_empty() {
            names.businesses = businesses::Entity::find()
                .filter(businesses::Column::Id.is_in(business_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|b| (b.id, b.name))
                .collect();
        }
        if !login_user_ids.is_empty() {
            names.login_users = login_users::Entity::find()
                .filter(login_users::Column::Id.is_in(login_user_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect();
        }

        Ok(names)
    }

    fn write_csv(
        &self,
        rows: &[assets::Model],
        index: &ProjectIndex,
        names: &ReferenceNames,
    ) -> ImportExportResult<Vec<u8>> {
        let mut writer = Writer::from_writer(UTF8_BOM.to_vec());

        writer.write_record(transferable_fields().map(|spec| spec.label))?;
        for asset in rows {
            let record: Vec<String> = transferable_fields()
                .map(|spec| render_field(asset, spec.field, index, names))
                .collect();
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| ImportExportError::ExportFailed(e.to_string()))
    }
}

fn render_field(
    asset: &assets::Model,
    field: AssetField,
    index: &ProjectIndex,
    names: &ReferenceNames,
) -> String {
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();
    match field {
        AssetField::Id => asset.id.to_string(),
        AssetField::Hostname => asset.hostname.clone(),
        AssetField::NetworkIp => asset.network_ip.clone(),
        AssetField::InnerIp => asset.inner_ip.clone(),
        AssetField::Port => asset.port.to_string(),
        AssetField::IsActive => asset.is_active.to_string(),
        AssetField::Project => index
            .get(asset.project_id)
            .map(|p| p.name.clone())
            .unwrap_or_default(),
        AssetField::Business => asset
            .business_id
            .and_then(|id| names.businesses.get(&id).cloned())
            .unwrap_or_default(),
        AssetField::LoginUser => asset
            .login_user_id
            .and_then(|id| names.login_users.get(&id).cloned())
            .unwrap_or_default(),
        AssetField::OsRelease => optional(&asset.os_release),
        AssetField::CpuModel => optional(&asset.cpu_model),
        AssetField::Memory => optional(&asset.memory),
        AssetField::Disk => optional(&asset.disk),
        AssetField::SerialNumber => optional(&asset.serial_number),
        AssetField::Remark => optional(&asset.remark),
        AssetField::CreatedAt => asset.created_at.to_rfc3339(),
        AssetField::UpdatedAt => asset.updated_at.to_rfc3339(),
    }
}
