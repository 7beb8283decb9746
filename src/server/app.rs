use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{assets, businesses, health, login_users, projects};
use crate::auth::PermissionOracle;
use crate::config::InventoryConfig;
use crate::crypto::Cipher;
use crate::jobs::JobQueue;
use crate::services::{
    AssetService, AuthorizationService, BusinessService, ExportService, ImportService,
    LoginUserService, ProjectService, TreeService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<InventoryConfig>,
    pub oracle: Arc<dyn PermissionOracle>,
    pub cipher: Arc<dyn Cipher>,
    pub jobs: Arc<dyn JobQueue>,
}

impl AppState {
    pub fn authz(&self) -> AuthorizationService {
        AuthorizationService::new(self.oracle.clone())
    }

    pub fn assets(&self) -> AssetService {
        AssetService::new(
            self.db.clone(),
            self.config.clone(),
            self.authz(),
            self.cipher.clone(),
            self.jobs.clone(),
        )
    }

    pub fn login_users(&self) -> LoginUserService {
        LoginUserService::new(self.db.clone(), self.authz(), self.cipher.clone())
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(self.db.clone(), self.authz())
    }

    pub fn businesses(&self) -> BusinessService {
        BusinessService::new(self.db.clone(), self.authz())
    }

    pub fn importer(&self) -> ImportService {
        ImportService::new(self.db.clone(), &self.config)
    }

    pub fn exporter(&self) -> ExportService {
        ExportService::new(self.db.clone(), self.authz())
    }

    pub fn tree(&self) -> TreeService {
        TreeService::new(self.db.clone(), self.authz())
    }
}

pub async fn create_app(state: AppState, cors_origin: Option<&str>) -> Result<Router> {
    let cors = match cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin {}", origin))?,
            )
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Assets
        .route("/assets", get(assets::list_assets).post(assets::create_asset))
        .route("/assets/tree", get(assets::asset_tree))
        .route(
            "/assets/export",
            get(assets::export_all_assets).post(assets::export_selected_assets),
        )
        .route("/assets/import", post(assets::import_assets))
        .route("/assets/delete", post(assets::delete_assets))
        .route("/assets/hardware", post(assets::refresh_hardware))
        .route("/assets/terminal", post(assets::terminal_descriptor))
        .route("/assets/:id", get(assets::get_asset).put(assets::update_asset))
        // Login users
        .route(
            "/login-users",
            get(login_users::list_login_users).post(login_users::create_login_user),
        )
        .route("/login-users/delete", post(login_users::delete_login_users))
        .route(
            "/login-users/:id",
            get(login_users::get_login_user).put(login_users::update_login_user),
        )
        .route("/login-users/:id/assets", get(login_users::login_user_assets))
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/delete", post(projects::delete_projects))
        .route(
            "/projects/:id",
            get(projects::get_project).put(projects::update_project),
        )
        // Businesses
        .route(
            "/businesses",
            get(businesses::list_businesses).post(businesses::create_business),
        )
        .route("/businesses/delete", post(businesses::delete_businesses))
        .route(
            "/businesses/:id",
            get(businesses::get_business).put(businesses::update_business),
        )
}
