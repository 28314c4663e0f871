//! Azure Migrate assessment export
//!
//! Pulls the machines discovered by an Azure Migrate assessment project and
//! normalizes them into Tidal server records. The project scope comes from
//! environment variables, matching how the assessment tooling is usually
//! wired into CI.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use super::{dig, dig_str};
use crate::azure::client::AzureClient;
use crate::tidal::{IpAddress, Server, NOT_AVAILABLE};

pub const SUBSCRIPTION_ENV_VAR: &str = "AZ_MIGRATE_SUBSCRIPTION";
pub const RESOURCE_GROUP_ENV_VAR: &str = "AZ_MIGRATE_RG";
pub const PROJECT_ENV_VAR: &str = "AZ_MIGRATE_PROJECT";

/// The assessment project a run targets
#[derive(Debug, Clone)]
pub struct MigrateScope {
    pub subscription: String,
    pub resource_group: String,
    pub project: String,
}

impl MigrateScope {
    /// Read the scope from the environment. Missing variables are a
    /// validation error, raised before any network call.
    pub fn from_env() -> Result<Self> {
        let subscription = require_env(SUBSCRIPTION_ENV_VAR)?;
        let resource_group = require_env(RESOURCE_GROUP_ENV_VAR)?;
        let project = require_env(PROJECT_ENV_VAR)?;
        Ok(Self {
            subscription,
            resource_group,
            project,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => bail!("Error missing {} environment variable", name),
    }
}

/// Fetch every machine in the assessment project and normalize it
pub async fn collect(client: &AzureClient, scope: &MigrateScope) -> Result<Vec<Server>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Migrate/assessmentProjects/{}/machines",
        urlencoding::encode(&scope.subscription),
        urlencoding::encode(&scope.resource_group),
        urlencoding::encode(&scope.project)
    );
    let machines = client
        .get_paged(&path, &client.versions.migrate, "Azure Migrate")
        .await?;

    Ok(machines.iter().map(parse_machine).collect())
}

/// List the assessment project names in the configured scope
pub async fn list_assessment_projects(
    client: &AzureClient,
    scope: &MigrateScope,
) -> Result<Vec<String>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Migrate/assessmentProjects",
        urlencoding::encode(&scope.subscription),
        urlencoding::encode(&scope.resource_group)
    );
    let projects = client
        .get_paged(&path, &client.versions.migrate, "Azure Migrate")
        .await?;

    Ok(projects
        .iter()
        .filter_map(|p| p.get("name").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect())
}

/// Normalize one discovered machine
fn parse_machine(machine: &Value) -> Server {
    let properties = machine.get("properties").cloned().unwrap_or(Value::Null);

    let storage_allocated_gb = properties
        .get("disks")
        .and_then(|v| v.as_object())
        .map(|disks| {
            disks
                .values()
                .filter_map(|disk| disk.get("gigabytesAllocated").and_then(|v| v.as_f64()))
                .sum::<f64>() as u64
        });

    let ram_allocated_gb = properties
        .get("megabytesOfMemory")
        .and_then(|v| v.as_f64())
        .map(|mb| (mb / 1024.0) as u64);

    let ip_addresses = properties
        .get("networkAdapters")
        .and_then(|v| v.as_object())
        .map(|adapters| {
            adapters
                .values()
                .filter_map(|adapter| adapter.get("ipAddresses").and_then(|v| v.as_array()))
                .flatten()
                .filter_map(|ip| ip.as_str())
                .map(IpAddress::new)
                .collect()
        })
        .unwrap_or_default();

    let mut custom_fields = std::collections::BTreeMap::new();
    for (field, key) in [
        ("arm_id", "discoveryMachineArmId"),
        ("operating_system_type", "operatingSystemType"),
        ("operating_system_name", "operatingSystemName"),
        ("operating_system_version", "operatingSystemVersion"),
        ("first_seen", "createdTimestamp"),
        ("last_seen", "updatedTimestamp"),
    ] {
        if let Some(value) = properties.get(key).and_then(|v| v.as_str()) {
            custom_fields.insert(field.to_string(), json!(value));
        }
    }

    Server {
        host_name: dig_str(&properties, &["displayName"])
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        ip_addresses,
        description: dig_str(&properties, &["description"])
            .unwrap_or_default()
            .to_string(),
        operating_system: dig_str(&properties, &["operatingSystemName"])
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        operating_system_version: dig_str(&properties, &["operatingSystemVersion"])
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        cpu_count: dig(&properties, &["numberOfCores"])
            .and_then(|v| v.as_u64())
            .map(|n| n as u32),
        ram_allocated_gb,
        storage_allocated_gb,
        virtualization_cluster: dig_str(&properties, &["datacenterManagementServerName"])
            .map(|s| s.to_string()),
        custom_fields,
        ..Server::default()
    }
}
