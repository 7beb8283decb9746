use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use tracing::debug;

use crate::auth::{Capability, ModelPermission, PermissionOracle, Principal};
use crate::database::entities::{assets, login_users, projects};
use crate::errors::CoreError;

/// A record whose permissions are decided by the project that owns it.
pub trait ProjectScoped {
    fn project_id(&self) -> Option<i32>;

    /// Human readable name used in bulk action messages.
    fn label(&self) -> String;
}

impl ProjectScoped for assets::Model {
    fn project_id(&self) -> Option<i32> {
        Some(self.project_id)
    }

    fn label(&self) -> String {
        self.hostname.clone()
    }
}

impl ProjectScoped for login_users::Model {
    fn project_id(&self) -> Option<i32> {
        self.project_id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl ProjectScoped for projects::Model {
    fn project_id(&self) -> Option<i32> {
        Some(self.id)
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/// Projects preloaded by id so a list can be filtered without a query per row.
#[derive(Clone, Debug, Default)]
pub struct ProjectIndex {
    projects: HashMap<i32, projects::Model>,
}

impl ProjectIndex {
    pub fn from_models(models: impl IntoIterator<Item = projects::Model>) -> Self {
        Self {
            projects: models.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Load only the projects referenced by `items`.
    pub async fn load_for<T: ProjectScoped>(
        db: &DatabaseConnection,
        items: &[T],
    ) -> Result<Self, DbErr> {
        let mut ids: Vec<i32> = items.iter().filter_map(|item| item.project_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Self::default());
        }

        let models = projects::Entity::find()
            .filter(projects::Column::Id.is_in(ids))
            .all(db)
            .await?;
        Ok(Self::from_models(models))
    }

    pub fn get(&self, id: i32) -> Option<&projects::Model> {
        self.projects.get(&id)
    }

    pub fn resolve<T: ProjectScoped>(&self, item: &T) -> Option<&projects::Model> {
        item.project_id().and_then(|id| self.get(id))
    }
}

/// A refused permission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Denial {
    pub reason: String,
}

impl Denial {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl From<Denial> for CoreError {
    fn from(denial: Denial) -> Self {
        CoreError::forbidden(denial.reason)
    }
}

#[derive(Clone)]
pub struct AuthorizationService {
    oracle: Arc<dyn PermissionOracle>,
}

impl AuthorizationService {
    pub fn new(oracle: Arc<dyn PermissionOracle>) -> Self {
        Self { oracle }
    }

    /// Keep the items whose owning project grants `capability` to `principal`.
    ///
    /// Input order is preserved. Items the resolver cannot map to a project
    /// are treated as denied. The oracle is asked once per distinct project.
    pub async fn filter_by_capability<T, F>(
        &self,
        principal: &Principal,
        capability: Capability,
        items: Vec<T>,
        resolver: F,
    ) -> Vec<T>
    where
        T: Send,
        F: Fn(&T) -> Option<projects::Model> + Send,
    {
        let mut decisions: HashMap<i32, bool> = HashMap::new();
        let mut kept = Vec::with_capacity(items.len());

        for item in items {
            let Some(project) = resolver(&item) else {
                debug!(
                    "Dropping record without a resolvable project for {}",
                    principal
                );
                continue;
            };

            let allowed = match decisions.get(&project.id) {
                Some(allowed) => *allowed,
                None => {
                    let allowed = self
                        .oracle
                        .has_permission(principal, capability, &project)
                        .await;
                    decisions.insert(project.id, allowed);
                    allowed
                }
            };

            if allowed {
                kept.push(item);
            } else {
                debug!(
                    "{} lacks {} on project {}",
                    principal,
                    capability.codename(),
                    project.id
                );
            }
        }

        kept
    }

    /// [`filter_by_capability`](Self::filter_by_capability) for project scoped
    /// records, resolving through a preloaded index.
    pub async fn filter_scoped<T>(
        &self,
        principal: &Principal,
        capability: Capability,
        items: Vec<T>,
        index: &ProjectIndex,
    ) -> Vec<T>
    where
        T: ProjectScoped + Send,
    {
        self.filter_by_capability(principal, capability, items, |item| {
            index.resolve(item).cloned()
        })
        .await
    }

    pub async fn check_project(
        &self,
        principal: &Principal,
        capability: Capability,
        project: Option<&projects::Model>,
    ) -> Result<(), Denial> {
        let denial = Denial::new(format!("no {} permission", capability.codename()));
        let Some(project) = project else {
            return Err(denial);
        };
        if self.oracle.has_permission(principal, capability, project).await {
            Ok(())
        } else {
            Err(denial)
        }
    }

    pub async fn check_capability<T: ProjectScoped>(
        &self,
        principal: &Principal,
        capability: Capability,
        item: &T,
        index: &ProjectIndex,
    ) -> Result<(), Denial> {
        self.check_project(principal, capability, index.resolve(item))
            .await
    }

    pub async fn require_model_permission(
        &self,
        principal: &Principal,
        permission: ModelPermission,
    ) -> Result<(), Denial> {
        if self.oracle.has_model_permission(principal, permission).await {
            Ok(())
        } else {
            Err(Denial::new(format!("no {} permission", permission)))
        }
    }
}

/// JSON body of bulk actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionStatus {
    pub status: bool,
    pub error: Option<String>,
}

impl ActionStatus {
    pub fn ok() -> Self {
        Self {
            status: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: false,
            error: Some(error.into()),
        }
    }
}

/// Target of a bulk action: one `nid` or a list of `id` values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdSelection {
    Single(i32),
    Many(Vec<i32>),
}

impl IdSelection {
    pub fn ids(&self) -> Vec<i32> {
        match self {
            IdSelection::Single(id) => vec![*id],
            IdSelection::Many(ids) => ids.clone(),
        }
    }
}

/// Per-item results of a bulk action that skips and continues.
#[derive(Clone, Debug, Default)]
pub struct BulkOutcome {
    action: String,
    applied: Vec<String>,
    denied: Vec<String>,
    failed: Vec<String>,
}

impl BulkOutcome {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn applied(&mut self, label: impl Into<String>) {
        self.applied.push(label.into());
    }

    pub fn denied(&mut self, label: impl Into<String>) {
        self.denied.push(label.into());
    }

    pub fn failed(&mut self, label: impl Into<String>, reason: impl fmt::Display) {
        self.failed.push(format!("{} ({})", label.into(), reason));
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// `status` is true when something was applied or nothing went wrong.
    pub fn into_status(self) -> ActionStatus {
        let mut errors = Vec::new();
        if !self.denied.is_empty() {
            errors.push(format!(
                "no {} permission: {}",
                self.action,
                self.denied.join(", ")
            ));
        }
        if !self.failed.is_empty() {
            errors.push(format!(
                "{} failed: {}",
                self.action,
                self.failed.join(", ")
            ));
        }

        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        ActionStatus {
            status: !self.applied.is_empty() || error.is_none(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticOracle {
        grants: HashSet<(String, Capability, i32)>,
        calls: AtomicUsize,
    }

    impl StaticOracle {
        fn new(grants: &[(&str, Capability, i32)]) -> Self {
            Self {
                grants: grants
                    .iter()
                    .map(|(user, cap, project)| (user.to_string(), *cap, *project))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PermissionOracle for StaticOracle {
        async fn has_permission(
            &self,
            principal: &Principal,
            capability: Capability,
            project: &projects::Model,
        ) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.grants
                .contains(&(principal.username().to_string(), capability, project.id))
        }

        async fn has_model_permission(&self, _: &Principal, _: ModelPermission) -> bool {
            false
        }
    }

    fn project(id: i32, name: &str) -> projects::Model {
        projects::Model {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn principal(name: &str) -> Principal {
        Principal::new(name).expect("principal")
    }

    #[tokio::test]
    async fn test_empty_input_gives_empty_output() {
        let service = AuthorizationService::new(Arc::new(StaticOracle::new(&[])));
        let kept: Vec<projects::Model> = service
            .filter_by_capability(&principal("ops"), Capability::Read, vec![], |p: &projects::Model| {
                Some(p.clone())
            })
            .await;
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn test_filter_preserves_order_and_drops_unresolved() {
        let oracle = Arc::new(StaticOracle::new(&[
            ("ops", Capability::Read, 1),
            ("ops", Capability::Read, 3),
        ]));
        let service = AuthorizationService::new(oracle.clone());
        let index =
            ProjectIndex::from_models(vec![project(1, "p1"), project(2, "p2"), project(3, "p3")]);

        let items = vec![
            project(3, "p3"),
            project(2, "p2"),
            project(9, "ghost"),
            project(1, "p1"),
            project(3, "p3"),
        ];
        let kept = service
            .filter_scoped(&principal("ops"), Capability::Read, items, &index)
            .await;

        let ids: Vec<i32> = kept.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 3]);
        // Projects 1, 2 and 3 asked once each; the ghost never reaches the oracle
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_capabilities_are_independent() {
        let service = AuthorizationService::new(Arc::new(StaticOracle::new(&[(
            "ops",
            Capability::Read,
            1,
        )])));
        let p1 = project(1, "p1");

        assert!(service
            .check_project(&principal("ops"), Capability::Read, Some(&p1))
            .await
            .is_ok());
        let denial = service
            .check_project(&principal("ops"), Capability::Delete, Some(&p1))
            .await
            .expect_err("delete not granted");
        assert_eq!(denial.reason, "no delete_project permission");
        assert!(service
            .check_project(&principal("ops"), Capability::Read, None)
            .await
            .is_err());
    }

    #[test]
    fn test_bulk_outcome_partial_success() {
        let mut outcome = BulkOutcome::new("delete");
        outcome.applied("web-01");
        outcome.denied("db-01");
        outcome.denied("db-02");

        let status = outcome.into_status();
        assert!(status.status);
        assert_eq!(status.error.as_deref(), Some("no delete permission: db-01, db-02"));
    }

    #[test]
    fn test_bulk_outcome_nothing_applied() {
        let mut outcome = BulkOutcome::new("delete");
        outcome.denied("db-01");
        outcome.failed("p1", "still owns assets");

        let status = outcome.into_status();
        assert!(!status.status);
        assert_eq!(
            status.error.as_deref(),
            Some("no delete permission: db-01; delete failed: p1 (still owns assets)")
        );
    }

    #[test]
    fn test_bulk_outcome_clean_run() {
        let mut outcome = BulkOutcome::new("delete");
        outcome.applied("web-01");
        assert_eq!(outcome.into_status(), ActionStatus::ok());
    }
}
