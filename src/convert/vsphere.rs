//! vSphere export → Tidal servers
//!
//! Reshapes the JSON produced by a vSphere VM export (`VirtualMachines` with
//! Summary/Runtime/Guest blocks) into the Tidal server schema. Sizes convert
//! with binary divisors: MB → GB by 1024, bytes → GB by 1024³.

use anyhow::{Context, Result};
use serde_json::{json, Value};

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// Convert a vSphere export document into `{"servers": [...]}`
pub fn convert(input: &str) -> Result<Value> {
    let doc: Value = serde_json::from_str(input).context("Input is not valid JSON")?;
    let machines = doc
        .get("VirtualMachines")
        .and_then(|v| v.as_array())
        .context("Input has no 'VirtualMachines' array")?;

    let servers: Vec<Value> = machines.iter().map(transform_vm).collect();
    Ok(json!({ "servers": servers }))
}

fn transform_vm(vm: &Value) -> Value {
    let summary = vm.get("Summary").cloned().unwrap_or(Value::Null);
    let config = summary.get("Config").cloned().unwrap_or(Value::Null);
    let stats = summary.get("QuickStats").cloned().unwrap_or(Value::Null);
    let storage = summary.get("Storage").cloned().unwrap_or(Value::Null);
    let guest = vm.get("Guest").cloned().unwrap_or(Value::Null);

    let committed = storage.get("Committed").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let uncommitted = storage
        .get("Uncommitted")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    let ip_addresses: Vec<Value> = guest
        .get("Net")
        .and_then(|v| v.as_array())
        .map(|nets| {
            nets.iter()
                .filter_map(|net| net.get("IpAddress").and_then(|v| v.as_str()))
                .map(|ip| json!({ "address": ip }))
                .collect()
        })
        .unwrap_or_default();

    let cpu_name = vm
        .get("Summary")
        .and_then(|s| s.get("Runtime"))
        .and_then(|r| r.get("Host"))
        .and_then(|h| h.get("host"))
        .and_then(|h| h.get("Summary"))
        .and_then(|s| s.get("Hardware"))
        .and_then(|h| h.get("CpuModel"))
        .cloned()
        .unwrap_or(Value::Null);

    json!({
        "fqdn": guest.get("Hostname").cloned().unwrap_or(Value::Null),
        "operating_system": guest.get("GuestFullName").cloned().unwrap_or(Value::Null),
        "operating_system_version": Value::Null,
        "host_name": config.get("Name").cloned().unwrap_or(Value::Null),
        "description": config.get("Annotation").cloned().unwrap_or(Value::Null),
        "assigned_id": config.get("Uuid").cloned().unwrap_or(Value::Null),
        "ram_allocated_gb": config.get("MemorySizeMB").and_then(|v| v.as_f64()).unwrap_or(0.0) / 1024.0,
        "ram_used_gb": stats.get("GuestMemoryUsage").and_then(|v| v.as_f64()).unwrap_or(0.0) / 1024.0,
        "cpu_count": config.get("NumCpu").cloned().unwrap_or(Value::Null),
        "cpu_name": cpu_name,
        "storage_used_gb": committed / BYTES_PER_GB,
        "storage_allocated_gb": (committed + uncommitted) / BYTES_PER_GB,
        "virtual": true,
        "ip_addresses": ip_addresses,
        "custom_fields": {
            "status": stats.get("GuestHeartbeatStatus").cloned().unwrap_or(Value::Null),
            "product": config
                .get("Product")
                .and_then(|p| p.get("Name"))
                .cloned()
                .unwrap_or(Value::Bool(false)),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_export_normalizes() {
        let input = json!({
            "VirtualMachines": [{
                "Summary": {
                    "Config": {
                        "Name": "vm-app-01",
                        "Annotation": "App server",
                        "Uuid": "4207f7e1",
                        "MemorySizeMB": 8192,
                        "NumCpu": 4,
                        "Product": {"Name": "AppSuite"}
                    },
                    "QuickStats": {
                        "GuestMemoryUsage": 2048,
                        "GuestHeartbeatStatus": "green"
                    },
                    "Storage": {
                        "Committed": 32212254720u64,
                        "Uncommitted": 10737418240u64
                    },
                    "Runtime": {"Host": {"host": {"Summary": {"Hardware": {"CpuModel": "Xeon Gold"}}}}}
                },
                "Runtime": {},
                "Guest": {
                    "Hostname": "app-01.corp.example.com",
                    "GuestFullName": "Ubuntu Linux (64-bit)",
                    "Net": [
                        {"IpAddress": "10.2.0.11"},
                        {"IpAddress": "10.2.0.12"}
                    ]
                }
            }]
        })
        .to_string();

        let doc = convert(&input).unwrap();
        let server = &doc["servers"][0];
        assert_eq!(server["host_name"], "vm-app-01");
        assert_eq!(server["fqdn"], "app-01.corp.example.com");
        assert_eq!(server["ram_allocated_gb"], 8.0);
        assert_eq!(server["ram_used_gb"], 2.0);
        assert_eq!(server["cpu_count"], 4);
        assert_eq!(server["cpu_name"], "Xeon Gold");
        assert_eq!(server["storage_used_gb"], 30.0);
        assert_eq!(server["storage_allocated_gb"], 40.0);
        assert_eq!(server["virtual"], true);
        assert_eq!(server["ip_addresses"].as_array().unwrap().len(), 2);
        assert_eq!(server["custom_fields"]["status"], "green");
        assert_eq!(server["custom_fields"]["product"], "AppSuite");
    }

    #[test]
    fn missing_product_becomes_false() {
        let input = json!({
            "VirtualMachines": [{
                "Summary": {"Config": {"Name": "bare"}, "QuickStats": {}, "Storage": {}},
                "Guest": {}
            }]
        })
        .to_string();

        let doc = convert(&input).unwrap();
        assert_eq!(doc["servers"][0]["custom_fields"]["product"], false);
    }

    #[test]
    fn input_without_machines_is_an_error() {
        assert!(convert("{}").is_err());
        assert!(convert("not json").is_err());
    }
}
