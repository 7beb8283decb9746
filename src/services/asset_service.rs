use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{Capability, ModelPermission, Principal};
use crate::config::InventoryConfig;
use crate::crypto::Cipher;
use crate::database::entities::{assets, businesses, login_users, projects};
use crate::errors::{CoreError, CoreResult};
use crate::jobs::{JobQueue, ASSET_HARDWARE_JOB};
use crate::services::authorization::{
    ActionStatus, AuthorizationService, BulkOutcome, IdSelection, ProjectIndex, ProjectScoped,
};

/// Query string of the asset list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssetQuery {
    /// Exact match on public IP, hostname, inner IP or project name
    pub name: Option<String>,
    pub project: Option<i32>,
    /// Business name, only honoured together with `project`
    pub business: Option<String>,
    pub page: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssetPage {
    pub items: Vec<assets::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
    pub web_ssh: String,
    pub web_port: u16,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssetInput {
    pub hostname: String,
    #[serde(default)]
    pub network_ip: String,
    #[serde(default)]
    pub inner_ip: String,
    pub port: Option<i32>,
    pub is_active: Option<bool>,
    pub project_id: i32,
    pub business_id: Option<i32>,
    pub login_user_id: Option<i32>,
    pub os_release: Option<String>,
    pub cpu_model: Option<String>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    pub serial_number: Option<String>,
    pub remark: Option<String>,
}

impl AssetInput {
    fn validate(&self) -> CoreResult<()> {
        if self.hostname.trim().is_empty() {
            return Err(invalid_field("hostname", "hostname must not be empty"));
        }
        if let Some(port) = self.port {
            if !(1..=65535).contains(&port) {
                return Err(invalid_field("port", format!("port {} is out of range", port)));
            }
        }
        Ok(())
    }
}

fn invalid_field(field: &str, message: impl Into<String>) -> CoreError {
    let fields = BTreeMap::from([("field".to_string(), field.to_string())]);
    CoreError::validation(message).with_fields(fields)
}

/// What the browser terminal needs to open a session. The password stays
/// encrypted; the terminal service holds the key.
#[derive(Clone, Debug, Serialize)]
pub struct TerminalDescriptor {
    pub status: bool,
    pub ip: String,
    pub port: i32,
    pub username: String,
    pub password: Option<String>,
    pub privatekey: Option<String>,
}

#[derive(Clone)]
pub struct AssetService {
    db: DatabaseConnection,
    config: Arc<InventoryConfig>,
    authz: AuthorizationService,
    cipher: Arc<dyn Cipher>,
    jobs: Arc<dyn JobQueue>,
}

impl AssetService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<InventoryConfig>,
        authz: AuthorizationService,
        cipher: Arc<dyn Cipher>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            db,
            config,
            authz,
            cipher,
            jobs,
        }
    }

    /// Readable assets, newest first, one page at a time.
    pub async fn list(&self, principal: &Principal, query: &AssetQuery) -> CoreResult<AssetPage> {
        let mut select = assets::Entity::find();

        let search = query
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        if let Some(name) = search {
            let project_ids: Vec<i32> = projects::Entity::find()
                .filter(projects::Column::Name.eq(name))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();

            let mut condition = Condition::any()
                .add(assets::Column::NetworkIp.eq(name))
                .add(assets::Column::Hostname.eq(name))
                .add(assets::Column::InnerIp.eq(name));
            if !project_ids.is_empty() {
                condition = condition.add(assets::Column::ProjectId.is_in(project_ids));
            }
            select = select.filter(condition);
        } else if let Some(project_id) = query.project {
            select = select.filter(assets::Column::ProjectId.eq(project_id));
            if let Some(business) = query.business.as_deref() {
                select = select
                    .inner_join(businesses::Entity)
                    .filter(businesses::Column::Name.eq(business));
            }
        }

        let rows = select
            .order_by_desc(assets::Column::Id)
            .all(&self.db)
            .await?;
        let index = ProjectIndex::load_for(&self.db, &rows).await?;
        let readable = self
            .authz
            .filter_scoped(principal, Capability::Read, rows, &index)
            .await;

        let per_page = self.config.display_per_page;
        let page = query.page.unwrap_or(1).max(1);
        let total = readable.len() as u64;
        // `page` comes straight from the query string
        let skip = (page - 1).saturating_mul(per_page);
        let items = readable
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(per_page).unwrap_or(usize::MAX))
            .collect();

        Ok(AssetPage {
            items,
            page,
            per_page,
            total,
            pages: total.div_ceil(per_page),
            web_ssh: self.config.web_ssh.clone(),
            web_port: self.config.web_port,
        })
    }

    pub async fn get(&self, principal: &Principal, id: i32) -> CoreResult<assets::Model> {
        let asset = self.find(id).await?;
        let index = ProjectIndex::load_for(&self.db, std::slice::from_ref(&asset)).await?;
        self.authz
            .check_capability(principal, Capability::Read, &asset, &index)
            .await?;
        Ok(asset)
    }

    /// Needs `add_asset` and `change` on the target project.
    pub async fn create(
        &self,
        principal: &Principal,
        input: AssetInput,
    ) -> CoreResult<assets::Model> {
        self.authz
            .require_model_permission(principal, ModelPermission::AddAsset)
            .await?;
        input.validate()?;
        let project = self.require_project(input.project_id).await?;
        self.authz
            .check_project(principal, Capability::Change, Some(&project))
            .await?;
        self.ensure_hostname_free(input.hostname.trim(), None).await?;

        let now = Utc::now();
        let asset = assets::ActiveModel {
            hostname: Set(input.hostname.trim().to_string()),
            network_ip: Set(input.network_ip.trim().to_string()),
            inner_ip: Set(input.inner_ip.trim().to_string()),
            port: Set(input.port.unwrap_or(self.config.default_ssh_port)),
            is_active: Set(input.is_active.unwrap_or(true)),
            project_id: Set(input.project_id),
            business_id: Set(input.business_id),
            login_user_id: Set(input.login_user_id),
            os_release: Set(input.os_release),
            cpu_model: Set(input.cpu_model),
            memory: Set(input.memory),
            disk: Set(input.disk),
            serial_number: Set(input.serial_number),
            remark: Set(input.remark),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("{} created asset {}", principal, asset.hostname);
        Ok(asset)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: i32,
        input: AssetInput,
    ) -> CoreResult<assets::Model> {
        input.validate()?;
        let asset = self.find(id).await?;
        let index = ProjectIndex::load_for(&self.db, std::slice::from_ref(&asset)).await?;
        self.authz
            .check_capability(principal, Capability::Change, &asset, &index)
            .await?;

        if input.project_id != asset.project_id {
            let target = self.require_project(input.project_id).await?;
            self.authz
                .check_project(principal, Capability::Change, Some(&target))
                .await?;
        }
        self.ensure_hostname_free(input.hostname.trim(), Some(asset.id))
            .await?;

        let mut active: assets::ActiveModel = asset.into();
        active.hostname = Set(input.hostname.trim().to_string());
        active.network_ip = Set(input.network_ip.trim().to_string());
        active.inner_ip = Set(input.inner_ip.trim().to_string());
        active.port = Set(input.port.unwrap_or(self.config.default_ssh_port));
        active.is_active = Set(input.is_active.unwrap_or(true));
        active.project_id = Set(input.project_id);
        active.business_id = Set(input.business_id);
        active.login_user_id = Set(input.login_user_id);
        active.os_release = Set(input.os_release);
        active.cpu_model = Set(input.cpu_model);
        active.memory = Set(input.memory);
        active.disk = Set(input.disk);
        active.serial_number = Set(input.serial_number);
        active.remark = Set(input.remark);
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    /// Delete every selected asset the principal may delete; skip the rest.
    pub async fn delete(
        &self,
        principal: &Principal,
        selection: &IdSelection,
    ) -> CoreResult<ActionStatus> {
        let rows = assets::Entity::find()
            .filter(assets::Column::Id.is_in(selection.ids()))
            .all(&self.db)
            .await?;
        let mut outcome = BulkOutcome::new("delete");
        if let IdSelection::Single(id) = selection {
            if rows.is_empty() {
                outcome.failed(format!("asset {}", id), "not found");
            }
        }

        let index = ProjectIndex::load_for(&self.db, &rows).await?;
        for asset in rows {
            let label = asset.label();
            if self
                .authz
                .check_capability(principal, Capability::Delete, &asset, &index)
                .await
                .is_err()
            {
                warn!("{} may not delete asset {}", principal, label);
                outcome.denied(label);
                continue;
            }
            match asset.delete(&self.db).await {
                Ok(_) => outcome.applied(label),
                Err(e) => outcome.failed(label, e),
            }
        }

        info!("{} deleted {} assets", principal, outcome.applied_count());
        Ok(outcome.into_status())
    }

    /// Queue a hardware inventory refresh through the asset's login user.
    pub async fn refresh_hardware(&self, principal: &Principal, id: i32) -> CoreResult<()> {
        let asset = self.find(id).await?;
        let index = ProjectIndex::load_for(&self.db, std::slice::from_ref(&asset)).await?;
        self.authz
            .check_capability(principal, Capability::Change, &asset, &index)
            .await?;

        let login_user = self.login_user_of(&asset).await?.ok_or_else(|| {
            CoreError::validation(format!(
                "no login user associated with {}, associate one before refreshing",
                asset.hostname
            ))
        })?;
        let password = match login_user.password.as_deref() {
            Some(sealed) => Some(self.cipher.decrypt(sealed)?),
            None => None,
        };

        self.jobs.enqueue(
            ASSET_HARDWARE_JOB,
            json!({
                "asset_id": asset.id,
                "hostname": asset.hostname,
                "ip": asset.network_ip,
                "port": asset.port,
                "username": login_user.username,
                "password": password,
                "private_key": login_user.private_key,
            }),
        );
        info!("{} queued hardware refresh of {}", principal, asset.hostname);
        Ok(())
    }

    /// Connection details for the web terminal; requires `cmd` on the project.
    pub async fn terminal_descriptor(
        &self,
        principal: &Principal,
        id: i32,
    ) -> CoreResult<TerminalDescriptor> {
        let asset = self.find(id).await?;
        let index = ProjectIndex::load_for(&self.db, std::slice::from_ref(&asset)).await?;
        self.authz
            .check_capability(principal, Capability::Cmd, &asset, &index)
            .await?;

        let login_user = self.login_user_of(&asset).await?.ok_or_else(|| {
            CoreError::validation(format!("no login user associated with {}", asset.hostname))
        })?;

        info!("{} opened a terminal descriptor for {}", principal, asset.hostname);
        Ok(TerminalDescriptor {
            status: true,
            ip: asset.network_ip,
            port: asset.port,
            username: login_user.username,
            password: login_user.password,
            privatekey: login_user.private_key,
        })
    }

    async fn find(&self, id: i32) -> CoreResult<assets::Model> {
        assets::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("asset", id.to_string()))
    }

    async fn login_user_of(&self, asset: &assets::Model) -> CoreResult<Option<login_users::Model>> {
        Ok(asset.find_related(login_users::Entity).one(&self.db).await?)
    }

    async fn require_project(&self, id: i32) -> CoreResult<projects::Model> {
        projects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::validation(format!("project {} does not exist", id)))
    }

    async fn ensure_hostname_free(&self, hostname: &str, except: Option<i32>) -> CoreResult<()> {
        let mut query = assets::Entity::find().filter(assets::Column::Hostname.eq(hostname));
        if let Some(id) = except {
            query = query.filter(assets::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(CoreError::conflict("hostname already exists"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_names_the_field() {
        let input = AssetInput {
            hostname: "web-01".to_string(),
            port: Some(70000),
            ..Default::default()
        };
        let err = input.validate().expect_err("port is out of range");
        assert_eq!(err.message(), "port 70000 is out of range");
        assert_eq!(
            err.fields().and_then(|f| f.get("field")).map(String::as_str),
            Some("port")
        );

        let blank = AssetInput::default();
        let err = blank.validate().expect_err("hostname is required");
        assert_eq!(
            err.fields().and_then(|f| f.get("field")).map(String::as_str),
            Some("hostname")
        );
    }
}
