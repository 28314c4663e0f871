mod azure;
mod config;
mod convert;
mod inventory;
mod sink;
mod tidal;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::Level;

use azure::client::AzureClient;
use azure::http::ApiError;
use config::Config;
use inventory::migrate::MigrateScope;

/// Azure inventory collector for Tidal
#[derive(Parser, Debug)]
#[command(name = "aztidal", version, about, long_about = None)]
struct Args {
    /// Log level for progress output on stderr
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch all VMs across subscriptions and resource groups
    Vms {
        /// Narrow the walk to one subscription id
        #[arg(short, long)]
        subscription: Option<String>,
        /// Write one JSON file per subscription under this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Sync the records to Tidal after printing
        #[arg(long)]
        sync: bool,
        /// Records per sync request (default: everything in one chunk)
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Fetch database servers, databases, and elastic pools
    Databases {
        /// Narrow the walk to one subscription id
        #[arg(short, long)]
        subscription: Option<String>,
        /// Sync the records to Tidal after printing
        #[arg(long)]
        sync: bool,
        /// Records per sync request (default: everything in one chunk)
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Fetch App Services with service plans, connection strings, and app settings
    AppServices {
        /// Subscription to walk
        #[arg(short, long)]
        subscription: String,
        /// Only the named App Service
        name: Option<String>,
    },
    /// Export servers from an Azure Migrate assessment project
    Migrate {
        /// List assessment projects instead of exporting machines
        #[arg(long)]
        list_projects: bool,
    },
    /// Convert external exports into the Tidal schema
    Convert {
        #[command(subcommand)]
        format: ConvertFormat,
    },
}

#[derive(Subcommand, Debug)]
enum ConvertFormat {
    /// On-prem inventory CSV
    Csv {
        /// Path to the CSV file
        path: PathBuf,
    },
    /// vSphere VM export JSON
    Vsphere {
        /// Path to the export file
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Progress goes to stderr so stdout stays clean JSON for pipes
fn setup_logging(level: LogLevel) {
    let Some(tracing_level) = level.to_tracing_level() else {
        return;
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// 0 success, 1 usage/validation error, 2 upstream API error
fn exit_code(err: &anyhow::Error) -> i32 {
    let api_failure = err
        .chain()
        .any(|cause| cause.downcast_ref::<ApiError>().is_some());
    if api_failure {
        2
    } else {
        1
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load_or_init();

    match args.command {
        Command::Vms {
            subscription,
            output_dir,
            sync,
            page_size,
        } => {
            let client = AzureClient::new(config.api_versions.clone())?;
            let by_subscription = inventory::vms::collect(&client, subscription.as_deref()).await?;

            if let Some(dir) = output_dir.or_else(|| config.output_dir.clone()) {
                for (subscription, servers) in &by_subscription {
                    sink::write_subscription_file(
                        &dir,
                        subscription,
                        "virtual_machines",
                        &json!({ "servers": servers }),
                    )?;
                }
            }

            let servers: Vec<_> = by_subscription.into_values().flatten().collect();
            sink::print_document(&json!({ "servers": servers }))?;

            if sync {
                sync_values("servers", &servers, page_size.or(config.sync_page_size)).await?;
            }
        }

        Command::Databases {
            subscription,
            sync,
            page_size,
        } => {
            let client = AzureClient::new(config.api_versions.clone())?;
            let db_inventory =
                inventory::databases::collect(&client, subscription.as_deref()).await?;

            sink::print_document(&json!({
                "servers": db_inventory.servers,
                "database_instances": db_inventory.database_instances,
            }))?;

            if sync {
                let page_size = page_size.or(config.sync_page_size);
                sync_values("servers", &db_inventory.servers, page_size).await?;
                sync_values(
                    "database_instances",
                    &db_inventory.database_instances,
                    page_size,
                )
                .await?;
            }
        }

        Command::AppServices { subscription, name } => {
            let client = AzureClient::new(config.api_versions.clone())?;
            let details =
                inventory::app_services::collect(&client, &subscription, name.as_deref()).await?;

            for detail in &details {
                sink::write_resource_file(&detail.name, &detail.resource_group, &detail.site)?;
                tracing::info!(
                    "App Service {}",
                    inventory::app_services::plan_summary(detail)
                );
            }

            let servers: Vec<_> = details
                .iter()
                .map(inventory::app_services::normalize)
                .collect();
            sink::print_document(&json!({ "servers": servers }))?;
        }

        Command::Migrate { list_projects } => {
            let scope = MigrateScope::from_env()?;
            let client = AzureClient::new(config.api_versions.clone())?;

            if list_projects {
                let projects = inventory::migrate::list_assessment_projects(&client, &scope).await?;
                sink::print_document(&json!({ "assessment_projects": projects }))?;
            } else {
                let servers = inventory::migrate::collect(&client, &scope).await?;
                sink::print_document(&json!({ "servers": servers }))?;
            }
        }

        Command::Convert { format } => match format {
            ConvertFormat::Csv { path } => {
                let file = std::fs::File::open(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let doc = convert::csv::convert(file)?;
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
            ConvertFormat::Vsphere { path } => {
                let input = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let doc = convert::vsphere::convert(&input)?;
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
        },
    }

    Ok(())
}

/// Serialize records and push them through the Tidal sync CLI
async fn sync_values<T: serde::Serialize>(
    record_type: &str,
    records: &[T],
    page_size: Option<usize>,
) -> Result<()> {
    let values: Vec<Value> = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;

    let (ids, failed) = tidal::sync::sync_records(record_type, &values, page_size).await?;
    tracing::info!(
        "Synced {} {} chunks to Tidal ({} failed)",
        ids.len(),
        record_type,
        failed
    );
    Ok(())
}
