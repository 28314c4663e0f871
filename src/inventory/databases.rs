//! Database inventory
//!
//! Walks SQL servers (with their databases and elastic pools), Postgres and
//! MySQL flexible servers, and Redis caches. Servers normalize to Tidal
//! server records; databases normalize to database instances that reference
//! their server by host name.
//!
//! Pool-hosted SQL databases are not returned by the plain server/databases
//! listing, so each elastic pool is listed separately.

use anyhow::Result;
use serde_json::{json, Value};

use super::{dig, dig_str, scope_subscriptions};
use crate::azure::client::AzureClient;
use crate::azure::subscriptions::list_resource_groups;
use crate::tidal::tags::Tags;
use crate::tidal::{DatabaseInstance, Environment, Server, ServerRef, NOT_AVAILABLE};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Everything the database walk produces
#[derive(Debug, Default)]
pub struct DatabaseInventory {
    pub servers: Vec<Server>,
    pub database_instances: Vec<DatabaseInstance>,
}

/// Collect database servers and their databases across the scoped
/// subscriptions
pub async fn collect(
    client: &AzureClient,
    subscription_filter: Option<&str>,
) -> Result<DatabaseInventory> {
    let subscriptions = scope_subscriptions(client, subscription_filter).await?;
    let mut inventory = DatabaseInventory::default();

    for subscription in subscriptions {
        tracing::info!(
            "Fetching resource groups for subscription {}...",
            subscription
        );
        let groups = match list_resource_groups(client, &subscription).await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!("Skipping subscription {}: {:#}", subscription, e);
                continue;
            }
        };

        for group in groups {
            tracing::info!("Fetching database servers in resource group {}...", group);
            collect_group(client, &subscription, &group, &mut inventory).await;
        }
    }

    tracing::info!(
        "Found {} database servers and {} databases",
        inventory.servers.len(),
        inventory.database_instances.len()
    );
    Ok(inventory)
}

/// Each resource family is isolated: a failed listing skips that family in
/// that group, nothing else.
async fn collect_group(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    out: &mut DatabaseInventory,
) {
    match sql_servers(client, subscription, group).await {
        Ok(servers) => {
            for server in servers {
                collect_sql_server(client, subscription, group, &server, out).await;
            }
        }
        Err(e) => tracing::error!("Skipping SQL servers in {}: {:#}", group, e),
    }

    for (provider, engine, resource_label) in [
        (
            "Microsoft.DBforPostgreSQL",
            "PostgreSQL",
            "Azure Database for PostgreSQL",
        ),
        ("Microsoft.DBforMySQL", "MySQL", "Azure Database for MySQL"),
    ] {
        match flexible_servers(client, subscription, group, provider).await {
            Ok(servers) => {
                for server in servers {
                    collect_flexible_server(
                        client,
                        subscription,
                        group,
                        provider,
                        engine,
                        resource_label,
                        &server,
                        out,
                    )
                    .await;
                }
            }
            Err(e) => tracing::error!("Skipping {} servers in {}: {:#}", engine, group, e),
        }
    }

    match redis_caches(client, subscription, group).await {
        Ok(caches) => {
            for cache in caches {
                out.servers.push(redis_record(&cache));
            }
        }
        Err(e) => tracing::error!("Skipping Redis caches in {}: {:#}", group, e),
    }
}

async fn collect_sql_server(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    server: &Value,
    out: &mut DatabaseInventory,
) {
    let server_name = server
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(NOT_AVAILABLE)
        .to_string();

    out.servers.push(server_record(
        server,
        dig_str(server, &["properties", "fullyQualifiedDomainName"]),
    ));

    // A failed enrichment leaves this server with an empty database list
    // and moves on to its siblings.
    let databases = match sql_databases(client, subscription, group, &server_name).await {
        Ok(dbs) => dbs,
        Err(e) => {
            tracing::error!(
                "Error fetching databases for server {}: {:#}",
                server_name,
                e
            );
            Vec::new()
        }
    };
    for db in &databases {
        out.database_instances
            .push(sql_database_record(db, &server_name, None));
    }

    let pools = match elastic_pools(client, subscription, group, &server_name).await {
        Ok(pools) => pools,
        Err(e) => {
            tracing::error!(
                "Error fetching elastic pools for server {}: {:#}",
                server_name,
                e
            );
            Vec::new()
        }
    };
    for pool in &pools {
        let Some(pool_name) = pool.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        match pool_databases(client, subscription, group, &server_name, pool_name).await {
            Ok(dbs) => {
                for db in &dbs {
                    out.database_instances.push(sql_database_record(
                        db,
                        &server_name,
                        Some(pool_name),
                    ));
                }
            }
            Err(e) => tracing::error!(
                "Error fetching databases in pool {} on {}: {:#}",
                pool_name,
                server_name,
                e
            ),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn collect_flexible_server(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    provider: &str,
    engine: &str,
    resource_label: &str,
    server: &Value,
    out: &mut DatabaseInventory,
) {
    let server_name = server
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(NOT_AVAILABLE)
        .to_string();

    let mut record = server_record(
        server,
        dig_str(server, &["properties", "fullyQualifiedDomainName"]),
    );
    record
        .custom_fields
        .insert("az_resource".to_string(), json!(resource_label));
    record.storage_allocated_gb =
        dig(server, &["properties", "storage", "storageSizeGB"]).and_then(|v| v.as_u64());
    out.servers.push(record);

    let databases = match flexible_databases(client, subscription, group, provider, &server_name)
        .await
    {
        Ok(dbs) => dbs,
        Err(e) => {
            tracing::error!(
                "Error fetching databases for server {}: {:#}",
                server_name,
                e
            );
            Vec::new()
        }
    };
    for db in &databases {
        let tags = Tags::from_value(db.get("tags"));
        let mut custom_fields = tags.custom_fields();
        custom_fields.insert("az_resource".to_string(), json!(resource_label));
        out.database_instances.push(DatabaseInstance {
            name: db
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
            database_engine: engine.to_string(),
            database_size_mb: 0,
            database_path: NOT_AVAILABLE.to_string(),
            description: format!("{} database", resource_label),
            server: ServerRef {
                host_name: server_name.clone(),
            },
            environment: derived_environment(&tags),
            custom_fields,
        });
    }
}

/// The shared server shape: host name, FQDN, environment tag, and location
fn server_record(server: &Value, fqdn: Option<&str>) -> Server {
    let tags = Tags::from_value(server.get("tags"));
    let mut custom_fields = tags.custom_fields();
    if let Some(location) = server.get("location").and_then(|v| v.as_str()) {
        custom_fields.insert("location".to_string(), json!(location));
    }

    Server {
        host_name: server
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        fqdn: fqdn.unwrap_or(NOT_AVAILABLE).to_string(),
        environment: tags.environment(),
        custom_fields,
        ..Server::default()
    }
}

fn redis_record(cache: &Value) -> Server {
    let mut record = server_record(cache, dig_str(cache, &["properties", "hostName"]));
    record
        .custom_fields
        .insert("az_resource".to_string(), json!("Azure Cache for Redis"));
    if let Some(sku) = dig_str(cache, &["properties", "sku", "name"]) {
        record.custom_fields.insert("az_sku".to_string(), json!(sku));
    }
    record
}

fn sql_database_record(db: &Value, server_name: &str, pool_name: Option<&str>) -> DatabaseInstance {
    let tags = Tags::from_value(db.get("tags"));
    let max_size_bytes = dig(db, &["properties", "maxSizeBytes"])
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let mut custom_fields = tags.custom_fields();
    custom_fields.insert("az_resource".to_string(), json!("Azure SQL"));
    if let Some(location) = db.get("location").and_then(|v| v.as_str()) {
        custom_fields.insert("az_location".to_string(), json!(location));
    }
    if let Some(pool) = pool_name {
        custom_fields.insert("az_elastic_pool".to_string(), json!(pool));
    }

    DatabaseInstance {
        name: db
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        database_engine: "SQL Server".to_string(),
        database_size_mb: max_size_bytes / BYTES_PER_MB,
        database_path: NOT_AVAILABLE.to_string(),
        description: "Azure SQL Database".to_string(),
        server: ServerRef {
            host_name: server_name.to_string(),
        },
        environment: derived_environment(&tags),
        custom_fields,
    }
}

/// Databases default to "production" when tagged without an explicit
/// environment; untagged databases carry no environment at all.
fn derived_environment(tags: &Tags) -> Option<Environment> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.environment().unwrap_or(Environment {
            name: "production".to_string(),
        }))
    }
}

async fn sql_servers(
    client: &AzureClient,
    subscription: &str,
    group: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Sql/servers",
        urlencoding::encode(subscription),
        urlencoding::encode(group)
    );
    client
        .get_paged(&path, &client.versions.sql, "Azure Database Servers")
        .await
}

async fn sql_databases(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    server: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Sql/servers/{}/databases",
        urlencoding::encode(subscription),
        urlencoding::encode(group),
        urlencoding::encode(server)
    );
    client
        .get_paged(&path, &client.versions.sql, "Azure Databases By Server")
        .await
}

async fn elastic_pools(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    server: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Sql/servers/{}/elasticPools",
        urlencoding::encode(subscription),
        urlencoding::encode(group),
        urlencoding::encode(server)
    );
    client
        .get_paged(&path, &client.versions.sql, "Azure Elastic Pools")
        .await
}

async fn pool_databases(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    server: &str,
    pool: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Sql/servers/{}/elasticPools/{}/databases",
        urlencoding::encode(subscription),
        urlencoding::encode(group),
        urlencoding::encode(server),
        urlencoding::encode(pool)
    );
    client
        .get_paged(&path, &client.versions.sql, "Azure Elastic Pool Databases")
        .await
}

async fn flexible_servers(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    provider: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/flexibleServers",
        urlencoding::encode(subscription),
        urlencoding::encode(group),
        provider
    );
    let version = if provider.ends_with("PostgreSQL") {
        &client.versions.postgres
    } else {
        &client.versions.mysql
    };
    client
        .get_paged(&path, version, "Azure Flexible Servers")
        .await
}

async fn flexible_databases(
    client: &AzureClient,
    subscription: &str,
    group: &str,
    provider: &str,
    server: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/flexibleServers/{}/databases",
        urlencoding::encode(subscription),
        urlencoding::encode(group),
        provider,
        urlencoding::encode(server)
    );
    let version = if provider.ends_with("PostgreSQL") {
        &client.versions.postgres
    } else {
        &client.versions.mysql
    };
    client
        .get_paged(&path, version, "Azure Flexible Server Databases")
        .await
}

async fn redis_caches(
    client: &AzureClient,
    subscription: &str,
    group: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Cache/redis",
        urlencoding::encode(subscription),
        urlencoding::encode(group)
    );
    client
        .get_paged(&path, &client.versions.redis, "Azure Redis Caches")
        .await
}
