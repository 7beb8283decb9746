pub mod app;
pub mod handlers;

use std::sync::Arc;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

use crate::auth::DatabasePermissionOracle;
use crate::config::InventoryConfig;
use crate::crypto::{AesGcmCipher, Cipher};
use crate::database::{connection::*, migrations::Migrator};
use crate::jobs::{spawn_job_forwarder, ChannelJobQueue};
use crate::services::asset_schema;
use anyhow::Result;
use sea_orm_migration::prelude::*;
use tracing::{info, warn};

pub async fn start_server(config: InventoryConfig) -> Result<()> {
    asset_schema::validate()?;

    let database_url = get_database_url(Some(&config.server.database));
    let db = establish_connection(&database_url).await?;

    // Run migrations
    Migrator::up(&db, None).await?;
    info!("Database migrations completed");

    let cipher = build_cipher(&config)?;
    let (jobs, receiver) = ChannelJobQueue::new();
    spawn_job_forwarder(receiver);

    let port = config.server.port;
    let cors_origin = config.server.cors_origin.clone();
    let state = app::AppState {
        oracle: Arc::new(DatabasePermissionOracle::new(db.clone())),
        db,
        config: Arc::new(config),
        cipher,
        jobs: Arc::new(jobs),
    };
    let app = app::create_app(state, cors_origin.as_deref()).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Cipher from the configured key, or a throwaway key when none is set.
/// Passwords sealed with a throwaway key cannot be read after a restart.
pub fn build_cipher(config: &InventoryConfig) -> Result<Arc<dyn Cipher>> {
    match config.security.encryption_key.as_deref() {
        Some(key) => Ok(Arc::new(AesGcmCipher::from_base64_key(key)?)),
        None => {
            warn!("No encryption key configured, using an ephemeral key");
            Ok(Arc::new(AesGcmCipher::ephemeral()))
        }
    }
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                     - Health check");
    info!("  /api/v1/assets              - Assets, import/export, tree, bulk actions");
    info!("  /api/v1/login-users         - Login users");
    info!("  /api/v1/projects            - Projects");
    info!("  /api/v1/businesses          - Businesses");
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
