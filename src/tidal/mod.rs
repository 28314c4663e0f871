//! Tidal inventory schema
//!
//! The target shape for everything the walkers produce. Every field is
//! best-effort: missing source data degrades to the "N/A" sentinel or is
//! omitted, never turned into an error.
//!
//! # Module Structure
//!
//! - [`tags`] - Canonical tag parsing (native mapping or joined string)
//! - [`redact`] - Secret redaction for connection strings and app settings
//! - [`sync`] - Upload to the Tidal platform via its CLI

pub mod redact;
pub mod sync;
pub mod tags;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel for string fields with no source data
pub const NOT_AVAILABLE: &str = "N/A";

/// A single address entry in a server's ip_addresses list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: String,
}

impl IpAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Environment reference; Tidal treats this as a named entity, not a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
}

/// A normalized server record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub host_name: String,
    pub fqdn: String,
    pub ip_addresses: Vec<IpAddress>,
    pub description: String,
    pub operating_system: String,
    pub operating_system_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_allocated_gb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_allocated_gb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtualization_cluster: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom_fields: BTreeMap<String, Value>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host_name: NOT_AVAILABLE.to_string(),
            fqdn: NOT_AVAILABLE.to_string(),
            ip_addresses: Vec::new(),
            description: String::new(),
            operating_system: NOT_AVAILABLE.to_string(),
            operating_system_version: NOT_AVAILABLE.to_string(),
            cpu_count: None,
            ram_allocated_gb: None,
            storage_allocated_gb: None,
            environment: None,
            assigned_id: None,
            virtualization_cluster: None,
            custom_fields: BTreeMap::new(),
        }
    }
}

/// Reference to a database's hosting server, by host name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRef {
    pub host_name: String,
}

/// A normalized database instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    pub name: String,
    pub database_engine: String,
    pub database_size_mb: u64,
    pub database_path: String,
    pub description: String,
    pub server: ServerRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom_fields: BTreeMap<String, Value>,
}
