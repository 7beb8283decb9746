use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use tracing::error;

use crate::database::entities::{project_grants, projects};
use crate::errors::{AuthError, AuthResult};

/// The authenticated operator on whose behalf a request runs.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Principal {
    username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> AuthResult<Self> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(AuthError::InvalidPrincipal(
                "username must not be empty".to_string(),
            ));
        }
        Ok(Self { username })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Object permission checked against a single project.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
    Read,
    Change,
    Delete,
    Cmd,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Change => "change",
            Capability::Delete => "delete",
            Capability::Cmd => "cmd",
        }
    }

    /// Name used in permission messages, e.g. `delete_project`.
    pub fn codename(&self) -> String {
        format!("{}_project", self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" | "read_project" => Ok(Capability::Read),
            "change" | "change_project" => Ok(Capability::Change),
            "delete" | "delete_project" => Ok(Capability::Delete),
            "cmd" | "cmd_project" => Ok(Capability::Cmd),
            other => Err(AuthError::InvalidPermission(other.to_string())),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission that is not tied to a project: creating records and managing
/// the business catalogue.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ModelPermission {
    AddAsset,
    AddLoginUser,
    AddProject,
    AddBusiness,
    ChangeBusiness,
    DeleteBusiness,
}

impl ModelPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPermission::AddAsset => "add_asset",
            ModelPermission::AddLoginUser => "add_login_user",
            ModelPermission::AddProject => "add_project",
            ModelPermission::AddBusiness => "add_business",
            ModelPermission::ChangeBusiness => "change_business",
            ModelPermission::DeleteBusiness => "delete_business",
        }
    }
}

impl FromStr for ModelPermission {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add_asset" => Ok(ModelPermission::AddAsset),
            "add_login_user" => Ok(ModelPermission::AddLoginUser),
            "add_project" => Ok(ModelPermission::AddProject),
            "add_business" => Ok(ModelPermission::AddBusiness),
            "change_business" => Ok(ModelPermission::ChangeBusiness),
            "delete_business" => Ok(ModelPermission::DeleteBusiness),
            other => Err(AuthError::InvalidPermission(other.to_string())),
        }
    }
}

impl fmt::Display for ModelPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers permission questions for a principal. Implementations must not
/// fail: an unanswerable question is a `false`.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn has_permission(
        &self,
        principal: &Principal,
        capability: Capability,
        project: &projects::Model,
    ) -> bool;

    async fn has_model_permission(&self, principal: &Principal, permission: ModelPermission)
        -> bool;
}

/// Oracle backed by the `project_grants` table.
#[derive(Clone, Debug)]
pub struct DatabasePermissionOracle {
    db: DatabaseConnection,
}

impl DatabasePermissionOracle {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn grant_exists(
        &self,
        principal: &Principal,
        project_id: Option<i32>,
        permission: &str,
    ) -> Result<bool, sea_orm::DbErr> {
        let mut query = project_grants::Entity::find()
            .filter(project_grants::Column::Principal.eq(principal.username()))
            .filter(project_grants::Column::Permission.eq(permission));

        query = match project_id {
            Some(id) => query.filter(project_grants::Column::ProjectId.eq(id)),
            None => query.filter(project_grants::Column::ProjectId.is_null()),
        };

        Ok(query.count(&self.db).await? > 0)
    }
}

#[async_trait]
impl PermissionOracle for DatabasePermissionOracle {
    async fn has_permission(
        &self,
        principal: &Principal,
        capability: Capability,
        project: &projects::Model,
    ) -> bool {
        self.grant_exists(principal, Some(project.id), capability.as_str())
            .await
            .unwrap_or_else(|e| {
                error!(
                    "Permission lookup failed for {} on project {}: {}",
                    principal, project.id, e
                );
                false
            })
    }

    async fn has_model_permission(
        &self,
        principal: &Principal,
        permission: ModelPermission,
    ) -> bool {
        self.grant_exists(principal, None, permission.as_str())
            .await
            .unwrap_or_else(|e| {
                error!("Permission lookup failed for {}: {}", principal, e);
                false
            })
    }
}

/// Record a grant. Granting the same permission twice is a no-op.
pub async fn grant_permission(
    db: &DatabaseConnection,
    principal: &Principal,
    project_id: Option<i32>,
    permission: &str,
) -> AuthResult<project_grants::Model> {
    // Stored in the short form the oracle looks up, e.g. `delete_project` as `delete`
    let permission = match project_id {
        Some(_) => Capability::from_str(permission)?.as_str().to_string(),
        None => ModelPermission::from_str(permission)?.as_str().to_string(),
    };

    let mut existing = project_grants::Entity::find()
        .filter(project_grants::Column::Principal.eq(principal.username()))
        .filter(project_grants::Column::Permission.eq(permission.as_str()));
    existing = match project_id {
        Some(id) => existing.filter(project_grants::Column::ProjectId.eq(id)),
        None => existing.filter(project_grants::Column::ProjectId.is_null()),
    };

    if let Some(grant) = existing.one(db).await? {
        return Ok(grant);
    }

    let grant = project_grants::ActiveModel {
        principal: Set(principal.username().to_string()),
        project_id: Set(project_id),
        permission: Set(permission),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    Ok(grant.insert(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_rejects_blank_username() {
        assert!(Principal::new("  ").is_err());
        let principal = Principal::new(" ops ").expect("valid principal");
        assert_eq!(principal.username(), "ops");
    }

    #[test]
    fn test_capability_parsing() {
        assert_eq!("read".parse::<Capability>().ok(), Some(Capability::Read));
        assert_eq!(
            "DELETE_PROJECT".parse::<Capability>().ok(),
            Some(Capability::Delete)
        );
        assert_eq!("cmd".parse::<Capability>().ok(), Some(Capability::Cmd));
        assert!("admin".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capability_codename() {
        assert_eq!(Capability::Change.codename(), "change_project");
        assert_eq!(Capability::Cmd.codename(), "cmd_project");
    }

    #[test]
    fn test_model_permission_round_trip() {
        for permission in [
            ModelPermission::AddAsset,
            ModelPermission::AddLoginUser,
            ModelPermission::AddProject,
            ModelPermission::AddBusiness,
            ModelPermission::ChangeBusiness,
            ModelPermission::DeleteBusiness,
        ] {
            assert_eq!(
                permission.as_str().parse::<ModelPermission>().ok(),
                Some(permission)
            );
        }
        assert!("read".parse::<ModelPermission>().is_err());
    }
}
