//! Virtual machine inventory
//!
//! Walks subscription → resource group → VM, resolves NICs, public IPs,
//! managed disks, and size details, and normalizes every machine into a
//! Tidal server record.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{json, Value};

use super::vm_sizes::VmSizeCache;
use super::{dig, dig_str, scope_subscriptions};
use crate::azure::client::AzureClient;
use crate::azure::subscriptions::list_resource_groups;
use crate::tidal::tags::Tags;
use crate::tidal::{IpAddress, Server, NOT_AVAILABLE};

/// Collect and normalize every VM, grouped by subscription id
pub async fn collect(
    client: &AzureClient,
    subscription_filter: Option<&str>,
) -> Result<BTreeMap<String, Vec<Server>>> {
    let subscriptions = scope_subscriptions(client, subscription_filter).await?;
    let mut sizes = VmSizeCache::new();
    let mut by_subscription = BTreeMap::new();

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

        let mut servers = Vec::new();
        for group in groups {
            tracing::info!("Fetching VMs in resource group {}...", group);
            match vms_in_group(client, &subscription, &group).await {
                Ok(vms) => {
                    for vm in vms {
                        servers.push(enrich(client, &mut sizes, &subscription, &vm).await);
                    }
                }
                Err(e) => tracing::error!("Skipping resource group {}: {:#}", group, e),
            }
        }

        tracing::info!(
            "Total VMs found in subscription {}: {}",
            subscription,
            servers.len()
        );
        by_subscription.insert(subscription, servers);
    }

    Ok(by_subscription)
}

async fn vms_in_group(
    client: &AzureClient,
    subscription: &str,
    resource_group: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines",
        urlencoding::encode(subscription),
        urlencoding::encode(resource_group)
    );
    client
        .get_paged(&path, &client.versions.compute, "Azure Virtual Machines")
        .await
}

/// Build the normalized record for one VM. Enrichment failures degrade the
/// affected fields and never drop the record.
async fn enrich(
    client: &AzureClient,
    sizes: &mut VmSizeCache,
    subscription: &str,
    vm: &Value,
) -> Server {
    let host_name = vm
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(NOT_AVAILABLE)
        .to_string();
    let location = vm
        .get("location")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut private_ips = Vec::new();
    let mut public_ips = Vec::new();
    let mut fqdn: Option<String> = None;

    for nic_id in nic_ids(vm) {
        match nic_addresses(client, &nic_id).await {
            Ok(nic) => {
                private_ips.extend(nic.private);
                public_ips.extend(nic.public);
                if fqdn.is_none() {
                    fqdn = nic.fqdn;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to resolve NIC {} for VM {}: {:#}", nic_id, host_name, e)
            }
        }
    }

    let storage_allocated_gb = total_storage_gb(client, vm, &host_name).await;

    let size = match dig_str(vm, &["properties", "hardwareProfile", "vmSize"]) {
        Some(size_name) if !location.is_empty() => {
            sizes.lookup(client, subscription, &location, size_name).await
        }
        _ => None,
    };

    let operating_system = dig_str(vm, &["properties", "storageProfile", "osDisk", "osType"])
        .unwrap_or(NOT_AVAILABLE)
        .to_string();
    let operating_system_version = dig_str(
        vm,
        &["properties", "storageProfile", "imageReference", "version"],
    )
    .unwrap_or(NOT_AVAILABLE)
    .to_string();

    let tags = Tags::from_value(vm.get("tags"));
    let mut custom_fields = tags.custom_fields();
    custom_fields.insert("location".to_string(), json!(location));
    custom_fields.insert(
        "operating_system_name".to_string(),
        json!(operating_system.clone()),
    );

    let ip_addresses = private_ips
        .into_iter()
        .chain(public_ips)
        .map(IpAddress::new)
        .collect();

    Server {
        host_name,
        fqdn: fqdn.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ip_addresses,
        description: "Azure VM".to_string(),
        operating_system,
        operating_system_version,
        cpu_count: size.map(|s| s.number_of_cores),
        ram_allocated_gb: size.map(|s| s.memory_in_mb / 1024),
        storage_allocated_gb: Some(storage_allocated_gb),
        environment: tags.environment(),
        assigned_id: vm.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()),
        virtualization_cluster: None,
        custom_fields,
    }
}

fn nic_ids(vm: &Value) -> Vec<String> {
    dig(vm, &["properties", "networkProfile", "networkInterfaces"])
        .and_then(|v| v.as_array())
        .map(|nics| {
            nics.iter()
                .filter_map(|nic| nic.get("id").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct NicAddresses {
    private: Vec<String>,
    public: Vec<String>,
    fqdn: Option<String>,
}

/// Fetch one NIC and collect its private addresses, then chase every
/// referenced public IP for its address and FQDN. The first non-empty FQDN
/// seen wins.
async fn nic_addresses(client: &AzureClient, nic_id: &str) -> Result<NicAddresses> {
    let nic = client
        .get(nic_id, &client.versions.network, "Azure Network Interfaces")
        .await?;

    let mut out = NicAddresses::default();
    let ip_configs = dig(&nic, &["properties", "ipConfigurations"])
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    for ip_config in &ip_configs {
        if let Some(private) = dig_str(ip_config, &["properties", "privateIPAddress"]) {
            out.private.push(private.to_string());
        }

        if let Some(public_id) = dig_str(ip_config, &["properties", "publicIPAddress", "id"]) {
            let public = client
                .get(public_id, &client.versions.network, "Azure Public IP")
                .await?;
            if let Some(address) = dig_str(&public, &["properties", "ipAddress"]) {
                out.public.push(address.to_string());
            }
            if out.fqdn.is_none() {
                if let Some(fqdn) = dig_str(&public, &["properties", "dnsSettings", "fqdn"]) {
                    if !fqdn.is_empty() {
                        out.fqdn = Some(fqdn.to_string());
                    }
                }
            }
        }
    }

    Ok(out)
}

/// OS disk plus the sum of all data disks, in GB. A failed disk lookup
/// contributes 0 and is logged.
async fn total_storage_gb(client: &AzureClient, vm: &Value, vm_name: &str) -> u64 {
    let mut total = 0;

    if let Some(os_disk_id) = dig_str(
        vm,
        &["properties", "storageProfile", "osDisk", "managedDisk", "id"],
    ) {
        total += disk_size_gb(client, os_disk_id, vm_name).await;
    }

    let data_disks = dig(vm, &["properties", "storageProfile", "dataDisks"])
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    for disk in &data_disks {
        if let Some(disk_id) = dig_str(disk, &["managedDisk", "id"]) {
            total += disk_size_gb(client, disk_id, vm_name).await;
        }
    }

    total
}

async fn disk_size_gb(client: &AzureClient, disk_id: &str, vm_name: &str) -> u64 {
    match client
        .get(disk_id, &client.versions.disks, "Azure Disk")
        .await
    {
        Ok(disk) => dig(&disk, &["properties", "diskSizeGB"])
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        Err(e) => {
            tracing::warn!("Failed to look up disk {} for VM {}: {:#}", disk_id, vm_name, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiVersions;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> AzureClient {
        std::env::set_var(crate::azure::auth::TOKEN_ENV_VAR, "test-token");
        AzureClient::with_base_url(ApiVersions::default(), &server.uri()).unwrap()
    }

    async fn mount_json(server: &MockServer, at: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// One subscription, one resource group, one VM with two NICs (one of
    /// which carries a public IP bound to an FQDN), an OS disk, and a data
    /// disk.
    #[tokio::test]
    async fn vm_walk_end_to_end() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/subscriptions",
            json!({"value": [{"subscriptionId": "sub-1"}]}),
        )
        .await;
        mount_json(
            &server,
            "/subscriptions/sub-1/resourcegroups",
            json!({"value": [{"name": "rg-1"}]}),
        )
        .await;
        mount_json(
            &server,
            "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Compute/virtualMachines",
            json!({"value": [{
                "id": "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Compute/virtualMachines/web-01",
                "name": "web-01",
                "location": "eastus",
                "tags": {"Environment": "prod", "team": "web"},
                "properties": {
                    "hardwareProfile": {"vmSize": "Standard_D4s_v3"},
                    "storageProfile": {
                        "osDisk": {
                            "osType": "Linux",
                            "managedDisk": {"id": "/disks/os-disk"}
                        },
                        "dataDisks": [
                            {"managedDisk": {"id": "/disks/data-disk"}}
                        ],
                        "imageReference": {"version": "22.04"}
                    },
                    "networkProfile": {"networkInterfaces": [
                        {"id": "/nics/nic-1"},
                        {"id": "/nics/nic-2"}
                    ]}
                }
            }]}),
        )
        .await;
        mount_json(
            &server,
            "/nics/nic-1",
            json!({"properties": {"ipConfigurations": [{
                "properties": {
                    "privateIPAddress": "10.0.0.4",
                    "publicIPAddress": {"id": "/publicIPs/pip-1"}
                }
            }]}}),
        )
        .await;
        mount_json(
            &server,
            "/nics/nic-2",
            json!({"properties": {"ipConfigurations": [{
                "properties": {"privateIPAddress": "10.0.0.5"}
            }]}}),
        )
        .await;
        mount_json(
            &server,
            "/publicIPs/pip-1",
            json!({"properties": {
                "ipAddress": "52.10.20.30",
                "dnsSettings": {"fqdn": "web-01.eastus.cloudapp.example.com"}
            }}),
        )
        .await;
        mount_json(&server, "/disks/os-disk", json!({"properties": {"diskSizeGB": 64}})).await;
        mount_json(
            &server,
            "/disks/data-disk",
            json!({"properties": {"diskSizeGB": 128}}),
        )
        .await;
        mount_json(
            &server,
            "/subscriptions/sub-1/providers/Microsoft.Compute/locations/eastus/vmSizes",
            json!({"value": [
                {"name": "Standard_D4s_v3", "numberOfCores": 4, "memoryInMB": 16384}
            ]}),
        )
        .await;

        let client = test_client(&server);
        let by_subscription = collect(&client, None).await.unwrap();
        let servers = &by_subscription["sub-1"];
        assert_eq!(servers.len(), 1);

        let vm = &servers[0];
        assert_eq!(vm.host_name, "web-01");
        assert_eq!(vm.fqdn, "web-01.eastus.cloudapp.example.com");
        let addresses: Vec<&str> = vm.ip_addresses.iter().map(|ip| ip.address.as_str()).collect();
        assert_eq!(addresses, vec!["10.0.0.4", "10.0.0.5", "52.10.20.30"]);
        assert_eq!(vm.storage_allocated_gb, Some(192));
        assert_eq!(vm.cpu_count, Some(4));
        assert_eq!(vm.ram_allocated_gb, Some(16));
        assert_eq!(vm.operating_system, "Linux");
        assert_eq!(vm.operating_system_version, "22.04");
        assert_eq!(vm.environment.as_ref().unwrap().name, "prod");
        assert_eq!(vm.custom_fields["az_lbl_team"], json!("web"));
        assert_eq!(vm.custom_fields["location"], json!("eastus"));
    }

    /// A VM with no data disks reports exactly the OS disk size, and a disk
    /// response without a size field contributes 0.
    #[tokio::test]
    async fn storage_degrades_to_available_data() {
        let server = MockServer::start().await;

        mount_json(&server, "/disks/os-only", json!({"properties": {"diskSizeGB": 32}})).await;
        mount_json(&server, "/disks/sizeless", json!({"properties": {}})).await;

        let client = test_client(&server);

        let os_only = json!({"properties": {"storageProfile": {
            "osDisk": {"managedDisk": {"id": "/disks/os-only"}},
            "dataDisks": []
        }}});
        assert_eq!(total_storage_gb(&client, &os_only, "vm-a").await, 32);

        let with_sizeless_data = json!({"properties": {"storageProfile": {
            "osDisk": {"managedDisk": {"id": "/disks/os-only"}},
            "dataDisks": [{"managedDisk": {"id": "/disks/sizeless"}}]
        }}});
        assert_eq!(
            total_storage_gb(&client, &with_sizeless_data, "vm-b").await,
            32
        );
    }

    /// The first non-empty FQDN in traversal order wins; later ones are
    /// ignored
    #[tokio::test]
    async fn fqdn_first_wins_across_ip_configurations() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/nics/double",
            json!({"properties": {"ipConfigurations": [
                {"properties": {"publicIPAddress": {"id": "/publicIPs/first"}}},
                {"properties": {"publicIPAddress": {"id": "/publicIPs/second"}}}
            ]}}),
        )
        .await;
        mount_json(
            &server,
            "/publicIPs/first",
            json!({"properties": {
                "ipAddress": "52.0.0.1",
                "dnsSettings": {"fqdn": "first.example.com"}
            }}),
        )
        .await;
        mount_json(
            &server,
            "/publicIPs/second",
            json!({"properties": {
                "ipAddress": "52.0.0.2",
                "dnsSettings": {"fqdn": "second.example.com"}
            }}),
        )
        .await;

        let client = test_client(&server);
        let nic = nic_addresses(&client, "/nics/double").await.unwrap();
        assert_eq!(nic.fqdn.as_deref(), Some("first.example.com"));
        assert_eq!(nic.public, vec!["52.0.0.1", "52.0.0.2"]);
    }

    /// A NIC whose public IP has no FQDN yields none at all
    #[tokio::test]
    async fn fqdn_is_first_non_empty() {
        let server = MockServer::start().await;

        mount_json(
            &server,
            "/nics/bare",
            json!({"properties": {"ipConfigurations": [{
                "properties": {
                    "privateIPAddress": "10.1.0.4",
                    "publicIPAddress": {"id": "/publicIPs/no-fqdn"}
                }
            }]}}),
        )
        .await;
        mount_json(
            &server,
            "/publicIPs/no-fqdn",
            json!({"properties": {"ipAddress": "52.0.0.1"}}),
        )
        .await;

        let client = test_client(&server);
        let nic = nic_addresses(&client, "/nics/bare").await.unwrap();
        assert_eq!(nic.fqdn, None);
        assert_eq!(nic.public, vec!["52.0.0.1"]);
    }
}
