use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{Capability, ModelPermission, Principal};
use crate::database::entities::projects;
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{ActionStatus, AuthorizationService, BulkOutcome, IdSelection};

#[derive(Clone, Debug, Deserialize)]
pub struct ProjectInput {
    pub name: String,
}

#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseConnection,
    authz: AuthorizationService,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection, authz: AuthorizationService) -> Self {
        Self { db, authz }
    }

    pub async fn list(&self, principal: &Principal) -> CoreResult<Vec<projects::Model>> {
        let rows = projects::Entity::find()
            .order_by_asc(projects::Column::Id)
            .all(&self.db)
            .await?;
        Ok(self
            .authz
            .filter_by_capability(principal, Capability::Read, rows, |p| Some(p.clone()))
            .await)
    }

    pub async fn get(&self, principal: &Principal, id: i32) -> CoreResult<projects::Model> {
        let project = self.find(id).await?;
        self.authz
            .check_project(principal, Capability::Read, Some(&project))
            .await?;
        Ok(project)
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: ProjectInput,
    ) -> CoreResult<projects::Model> {
        self.authz
            .require_model_permission(principal, ModelPermission::AddProject)
            .await?;
        let name = validate_name(&input.name)?;
        self.ensure_name_free(name, None).await?;

        let now = Utc::now();
        let project = projects::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("{} created project {}", principal, project.name);
        Ok(project)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: i32,
        input: ProjectInput,
    ) -> CoreResult<projects::Model> {
        let name = validate_name(&input.name)?;
        let project = self.find(id).await?;
        self.authz
            .check_project(principal, Capability::Change, Some(&project))
            .await?;
        self.ensure_name_free(name, Some(project.id)).await?;

        let mut active: projects::ActiveModel = project.into();
        active.name = Set(name.to_string());
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Projects that still own assets cannot be removed; they are reported
    /// as failed items.
    pub async fn delete(
        &self,
        principal: &Principal,
        selection: &IdSelection,
    ) -> CoreResult<ActionStatus> {
        let rows = projects::Entity::find()
            .filter(projects::Column::Id.is_in(selection.ids()))
            .all(&self.db)
            .await?;
        let mut outcome = BulkOutcome::new("delete");
        if let IdSelection::Single(id) = selection {
            if rows.is_empty() {
                outcome.failed(format!("project {}", id), "not found");
            }
        }

        for project in rows {
            let label = project.name.clone();
            if self
                .authz
                .check_project(principal, Capability::Delete, Some(&project))
                .await
                .is_err()
            {
                warn!("{} may not delete project {}", principal, label);
                outcome.denied(label);
                continue;
            }
            match project.delete(&self.db).await {
                Ok(_) => outcome.applied(label),
                Err(e) => outcome.failed(label, e),
            }
        }

        Ok(outcome.into_status())
    }

    async fn find(&self, id: i32) -> CoreResult<projects::Model> {
        projects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("project", id.to_string()))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> CoreResult<()> {
        let mut query = projects::Entity::find().filter(projects::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(projects::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(CoreError::conflict(format!("project {} already exists", name)));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> CoreResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("name must not be empty"));
    }
    Ok(name)
}
