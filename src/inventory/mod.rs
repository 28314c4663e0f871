//! Resource inventory walkers
//!
//! One module per resource family. Each walk follows the same shape:
//! subscription → resource group → resource listing → per-resource
//! enrichment → normalized Tidal records.
//!
//! Failure policy is uniform: a failed enrichment degrades that one record,
//! a failed resource-group listing skips that group, and a failed
//! subscription-level listing skips that subscription. Only the root
//! subscription listing aborts the run.
//!
//! # Module Structure
//!
//! - [`vms`] - Virtual machines with NIC, public IP, disk, and size lookups
//! - [`vm_sizes`] - Per-location VM size catalogue cache
//! - [`databases`] - SQL servers, databases, elastic pools, flexible servers,
//!   and Redis caches
//! - [`app_services`] - App Services with plans, connection strings, and
//!   app settings
//! - [`migrate`] - Azure Migrate assessment project export

pub mod app_services;
pub mod databases;
pub mod migrate;
pub mod vm_sizes;
pub mod vms;

use anyhow::Result;
use serde_json::Value;

use crate::azure::client::AzureClient;
use crate::azure::subscriptions::list_subscriptions;

/// The subscriptions a walk covers: the explicit filter, or all of them
pub(crate) async fn scope_subscriptions(
    client: &AzureClient,
    filter: Option<&str>,
) -> Result<Vec<String>> {
    match filter {
        Some(subscription) => Ok(vec![subscription.to_string()]),
        None => {
            tracing::info!("Fetching subscriptions...");
            let subscriptions = list_subscriptions(client).await?;
            tracing::info!("Found {} subscriptions", subscriptions.len());
            Ok(subscriptions)
        }
    }
}

/// Walk a dotted path into a JSON value
pub(crate) fn dig<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        current = current.get(part)?;
    }
    Some(current)
}

/// Walk a dotted path and read a string leaf
pub(crate) fn dig_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    dig(value, path).and_then(|v| v.as_str())
}
