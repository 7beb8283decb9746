use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::{ModelPermission, Principal};
use crate::database::entities::businesses;
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{ActionStatus, AuthorizationService, IdSelection};

#[derive(Clone, Debug, Deserialize)]
pub struct BusinessInput {
    pub name: String,
}

/// Businesses are a shared catalogue: everyone reads it, model permissions
/// guard changes.
#[derive(Clone)]
pub struct BusinessService {
    db: DatabaseConnection,
    authz: AuthorizationService,
}

impl BusinessService {
    pub fn new(db: DatabaseConnection, authz: AuthorizationService) -> Self {
        Self { db, authz }
    }

    pub async fn list(&self) -> CoreResult<Vec<businesses::Model>> {
        Ok(businesses::Entity::find()
            .order_by_asc(businesses::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn get(&self, id: i32) -> CoreResult<businesses::Model> {
        businesses::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("business", id.to_string()))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: BusinessInput,
    ) -> CoreResult<businesses::Model> {
        self.authz
            .require_model_permission(principal, ModelPermission::AddBusiness)
            .await?;
        let name = validate_name(&input.name)?;
        self.ensure_name_free(name, None).await?;

        let now = Utc::now();
        let business = businesses::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("{} created business {}", principal, business.name);
        Ok(business)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: i32,
        input: BusinessInput,
    ) -> CoreResult<businesses::Model> {
        self.authz
            .require_model_permission(principal, ModelPermission::ChangeBusiness)
            .await?;
        let name = validate_name(&input.name)?;
        let business = self.get(id).await?;
        self.ensure_name_free(name, Some(business.id)).await?;

        let mut active: businesses::ActiveModel = business.into();
        active.name = Set(name.to_string());
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// One `DELETE ... WHERE id IN (...)`; assets keep existing with a null business.
    pub async fn delete(
        &self,
        principal: &Principal,
        selection: &IdSelection,
    ) -> CoreResult<ActionStatus> {
        if let Err(denial) = self
            .authz
            .require_model_permission(principal, ModelPermission::DeleteBusiness)
            .await
        {
            return Ok(ActionStatus::failed(denial.reason));
        }

        let result = businesses::Entity::delete_many()
            .filter(businesses::Column::Id.is_in(selection.ids()))
            .exec(&self.db)
            .await?;

        info!("{} deleted {} businesses", principal, result.rows_affected);
        if let IdSelection::Single(id) = selection {
            if result.rows_affected == 0 {
                return Ok(ActionStatus::failed(format!("business {} not found", id)));
            }
        }
        Ok(ActionStatus::ok())
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> CoreResult<()> {
        let mut query = businesses::Entity::find().filter(businesses::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(businesses::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(CoreError::conflict(format!("business {} already exists", name)));
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
