use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use tracing::debug;

use crate::auth::{Capability, Principal};
use crate::database::entities::{assets, businesses, projects};
use crate::errors::CoreResult;
use crate::services::authorization::AuthorizationService;

pub const ROOT_ID: &str = "0";

/// Node of the project/business navigation tree, in the flat `id`/`pId`
/// shape tree widgets consume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub id: String,
    #[serde(rename = "pId")]
    pub p_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl TreeNode {
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            p_id: ROOT_ID.to_string(),
            name: "Projects".to_string(),
            n: None,
            page: None,
        }
    }
}

pub fn project_node_id(project_id: i32) -> String {
    format!("000{}", project_id)
}

pub fn project_node(project: &projects::Model, asset_count: u64) -> TreeNode {
    TreeNode {
        id: project_node_id(project.id),
        p_id: ROOT_ID.to_string(),
        name: format!("{}({})", project.name, asset_count),
        n: Some(project.name.clone()),
        page: Some(format!("/api/v1/assets?project={}", project.id)),
    }
}

pub fn business_node(project_id: i32, business: &str, asset_count: i64) -> TreeNode {
    let parent = project_node_id(project_id);
    TreeNode {
        id: format!("{}:{}", parent, business),
        p_id: parent,
        name: format!("{}({})", business, asset_count),
        n: Some(business.to_string()),
        page: None,
    }
}

pub struct TreeService {
    db: DatabaseConnection,
    authz: AuthorizationService,
}

impl TreeService {
    pub fn new(db: DatabaseConnection, authz: AuthorizationService) -> Self {
        Self { db, authz }
    }

    /// Root, then each readable project followed by its non-empty businesses.
    pub async fn build_tree(&self, principal: &Principal) -> CoreResult<Vec<TreeNode>> {
        let all_projects = projects::Entity::find()
            .order_by_asc(projects::Column::Id)
            .all(&self.db)
            .await?;
        let readable = self
            .authz
            .filter_by_capability(principal, Capability::Read, all_projects, |p| {
                Some(p.clone())
            })
            .await;

        let mut nodes = vec![TreeNode::root()];
        for project in readable {
            let total = assets::Entity::find()
                .filter(assets::Column::ProjectId.eq(project.id))
                .count(&self.db)
                .await?;
            nodes.push(project_node(&project, total));

            for (business, count) in self.business_counts(project.id).await? {
                if count > 0 {
                    nodes.push(business_node(project.id, &business, count));
                }
            }
        }

        debug!("Built tree with {} nodes for {}", nodes.len(), principal);
        Ok(nodes)
    }

    /// Asset counts per business inside one project, in one grouped query.
    async fn business_counts(&self, project_id: i32) -> CoreResult<Vec<(String, i64)>> {
        let counts = assets::Entity::find()
            .select_only()
            .column(businesses::Column::Name)
            .column_as(
                Expr::col((assets::Entity, assets::Column::Id)).count(),
                "asset_count",
            )
            .join(JoinType::InnerJoin, assets::Relation::Businesses.def())
            .filter(assets::Column::ProjectId.eq(project_id))
            .group_by(businesses::Column::Name)
            .order_by_asc(businesses::Column::Name)
            .into_tuple::<(String, i64)>()
            .all(&self.db)
            .await?;
        Ok(counts)
    }
}
