use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use inventory::auth::{grant_permission, DatabasePermissionOracle, Principal};
use inventory::config::InventoryConfig;
use inventory::database::entities::projects;
use inventory::database::{establish_connection, get_database_url, setup_database};
use inventory::server;
use inventory::services::{AuthorizationService, ExportSelection, ExportService, ImportService};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// TOML configuration file
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(short, long)]
        port: Option<u16>,
        #[clap(short, long)]
        database: Option<String>,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    /// Reconcile a CSV file into the asset table
    Import {
        #[clap(short, long)]
        file: PathBuf,
    },
    /// Write the assets a principal may read to a CSV file
    Export {
        #[clap(short, long)]
        principal: String,
        #[clap(short, long, default_value = "assets.csv")]
        out: PathBuf,
        /// Restrict the export to these asset ids
        #[clap(long, value_delimiter = ',')]
        ids: Vec<i32>,
    },
    /// Grant a project or model permission to a principal
    Grant {
        #[clap(short, long)]
        principal: String,
        #[clap(long)]
        permission: String,
        /// Project name; omit for model permissions such as add_asset
        #[clap(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: server::MigrateDirection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut config = InventoryConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Serve {
            port,
            database,
            cors_origin,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(database) = database {
                config.server.database = database;
            }
            if cors_origin.is_some() {
                config.server.cors_origin = cors_origin;
            }
            info!("Starting server on port {}", config.server.port);
            server::start_server(config).await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("Initializing database: {}", config.server.database);
                server::migrate_database(&config.server.database, server::MigrateDirection::Up)
                    .await?;
            }
            DbCommands::Migrate { direction } => {
                info!("Running database migration: {:?}", direction);
                server::migrate_database(&config.server.database, direction).await?;
            }
        },
        Commands::Import { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let db = open_database(&config).await?;
            let report = ImportService::new(db, &config).reconcile(&bytes).await?;
            for failed in &report.failed {
                println!("{}: {}", failed.row, failed.reason);
            }
            println!("{}", report.summary());
        }
        Commands::Export {
            principal,
            out,
            ids,
        } => {
            let principal = Principal::new(principal)?;
            let db = open_database(&config).await?;
            let oracle = DatabasePermissionOracle::new(db.clone());
            let authz = AuthorizationService::new(Arc::new(oracle));
            let selection = if ids.is_empty() {
                ExportSelection::All
            } else {
                ExportSelection::Ids(ids)
            };
            let bytes = ExportService::new(db, authz)
                .export_assets(&principal, selection)
                .await?;
            std::fs::write(&out, bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {}", out.display());
        }
        Commands::Grant {
            principal,
            permission,
            project,
        } => {
            let principal = Principal::new(principal)?;
            let db = open_database(&config).await?;
            let project_id = match project {
                Some(name) => Some(
                    projects::Entity::find()
                        .filter(projects::Column::Name.eq(name.as_str()))
                        .one(&db)
                        .await?
                        .map(|p| p.id)
                        .with_context(|| format!("Project {} does not exist", name))?,
                ),
                None => None,
            };
            let grant = grant_permission(&db, &principal, project_id, &permission).await?;
            info!(
                "Granted {} to {} (project {:?})",
                grant.permission, grant.principal, grant.project_id
            );
        }
    }

    Ok(())
}

async fn open_database(config: &InventoryConfig) -> Result<sea_orm::DatabaseConnection> {
    let db = establish_connection(&get_database_url(Some(&config.server.database))).await?;
    setup_database(&db).await?;
    Ok(db)
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("hyper=info,{}", log_level)))
        .with_target(false)
        .without_time()
        .init();
}
