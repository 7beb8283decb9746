use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{Capability, ModelPermission, Principal};
use crate::crypto::Cipher;
use crate::database::entities::{assets, login_users, projects};
use crate::errors::{CoreError, CoreResult};
use crate::services::authorization::{
    ActionStatus, AuthorizationService, BulkOutcome, IdSelection, ProjectIndex, ProjectScoped,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginUserInput {
    pub name: String,
    pub username: String,
    /// Plaintext; encrypted before it is stored. Omit on update to keep the
    /// current password.
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub project_id: Option<i32>,
}

impl LoginUserInput {
    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("name must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(CoreError::validation("username must not be empty"));
        }
        Ok(())
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    fn private_key(&self) -> Option<String> {
        self.private_key
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}

#[derive(Clone)]
pub struct LoginUserService {
    db: DatabaseConnection,
    authz: AuthorizationService,
    cipher: Arc<dyn Cipher>,
}

impl LoginUserService {
    pub fn new(
        db: DatabaseConnection,
        authz: AuthorizationService,
        cipher: Arc<dyn Cipher>,
    ) -> Self {
        Self { db, authz, cipher }
    }

    pub async fn list(&self, principal: &Principal) -> CoreResult<Vec<login_users::Model>> {
        let rows = login_users::Entity::find()
            .order_by_desc(login_users::Column::Id)
            .all(&self.db)
            .await?;
        let index = ProjectIndex::load_for(&self.db, &rows).await?;
        Ok(self
            .authz
            .filter_scoped(principal, Capability::Read, rows, &index)
            .await)
    }

    pub async fn get(&self, principal: &Principal, id: i32) -> CoreResult<login_users::Model> {
        let user = self.find(id).await?;
        self.check(principal, Capability::Read, &user).await?;
        Ok(user)
    }

    /// Readable assets that log in through this user.
    pub async fn assets(&self, principal: &Principal, id: i32) -> CoreResult<Vec<assets::Model>> {
        let user = self.get(principal, id).await?;
        let rows = user
            .find_related(assets::Entity)
            .order_by_desc(assets::Column::Id)
            .all(&self.db)
            .await?;
        let index = ProjectIndex::load_for(&self.db, &rows).await?;
        Ok(self
            .authz
            .filter_scoped(principal, Capability::Read, rows, &index)
            .await)
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: LoginUserInput,
    ) -> CoreResult<login_users::Model> {
        self.authz
            .require_model_permission(principal, ModelPermission::AddLoginUser)
            .await?;
        input.validate()?;
        self.ensure_name_free(input.name.trim(), None).await?;

        let password = input
            .password()
            .map(|p| self.cipher.encrypt(p))
            .transpose()?;
        let private_key = input.private_key();

        let now = Utc::now();
        let user = login_users::ActiveModel {
            name: Set(input.name.trim().to_string()),
            username: Set(input.username.trim().to_string()),
            password: Set(password),
            private_key: Set(private_key.clone()),
            project_id: Set(input.project_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        if let Some(path) = private_key {
            restrict_key_permissions(Path::new(&path));
        }
        info!("{} created login user {}", principal, user.name);
        Ok(user)
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: i32,
        input: LoginUserInput,
    ) -> CoreResult<login_users::Model> {
        input.validate()?;
        let user = self.find(id).await?;
        self.check(principal, Capability::Change, &user).await?;
        // A move needs `change` on the destination as well; detaching is denied
        if input.project_id != user.project_id {
            let target = match input.project_id {
                Some(project_id) => Some(self.require_project(project_id).await?),
                None => None,
            };
            self.authz
                .check_project(principal, Capability::Change, target.as_ref())
                .await?;
        }
        self.ensure_name_free(input.name.trim(), Some(user.id)).await?;

        let new_password = input
            .password()
            .map(|p| self.cipher.encrypt(p))
            .transpose()?;
        let private_key = input.private_key();

        let mut active: login_users::ActiveModel = user.into();
        active.name = Set(input.name.trim().to_string());
        active.username = Set(input.username.trim().to_string());
        if let Some(password) = new_password {
            active.password = Set(Some(password));
        }
        active.private_key = Set(private_key.clone());
        active.project_id = Set(input.project_id);
        active.updated_at = Set(Utc::now());
        let user = active.update(&self.db).await?;

        if let Some(path) = private_key {
            restrict_key_permissions(Path::new(&path));
        }
        Ok(user)
    }

    pub async fn delete(
        &self,
        principal: &Principal,
        selection: &IdSelection,
    ) -> CoreResult<ActionStatus> {
        let rows = login_users::Entity::find()
            .filter(login_users::Column::Id.is_in(selection.ids()))
            .all(&self.db)
            .await?;
        let mut outcome = BulkOutcome::new("delete");
        if let IdSelection::Single(id) = selection {
            if rows.is_empty() {
                outcome.failed(format!("login user {}", id), "not found");
            }
        }

        let index = ProjectIndex::load_for(&self.db, &rows).await?;
        for user in rows {
            let label = user.label();
            if self
                .authz
                .check_capability(principal, Capability::Delete, &user, &index)
                .await
                .is_err()
            {
                warn!("{} may not delete login user {}", principal, label);
                outcome.denied(label);
                continue;
            }
            match user.delete(&self.db).await {
                Ok(_) => outcome.applied(label),
                Err(e) => outcome.failed(label, e),
            }
        }

        Ok(outcome.into_status())
    }

    async fn check(
        &self,
        principal: &Principal,
        capability: Capability,
        user: &login_users::Model,
    ) -> CoreResult<()> {
        let index = ProjectIndex::load_for(&self.db, std::slice::from_ref(user)).await?;
        self.authz
            .check_capability(principal, capability, user, &index)
            .await?;
        Ok(())
    }

    async fn require_project(&self, id: i32) -> CoreResult<projects::Model> {
        projects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::validation(format!("project {} does not exist", id)))
    }

    async fn find(&self, id: i32) -> CoreResult<login_users::Model> {
        login_users::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("login user", id.to_string()))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> CoreResult<()> {
        let mut query = login_users::Entity::find().filter(login_users::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(login_users::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(CoreError::conflict(format!("login user {} already exists", name)));
        }
        Ok(())
    }
}

/// SSH refuses keys readable by others. Failure is logged, never fatal.
fn restrict_key_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            warn!("Could not restrict permissions of {}: {}", path.display(), e);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
