//! VM size resolution
//!
//! Core count and memory for a VM come from its size name. Azure publishes
//! the size catalogue per location, so the cache fetches a whole location on
//! the first miss and answers every other VM in that location from memory.

use std::collections::HashMap;

use anyhow::Result;
use serde_json::Value;

use crate::azure::client::AzureClient;

/// Core count and memory for one VM size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmSize {
    pub number_of_cores: u32,
    pub memory_in_mb: u64,
}

/// Seeded fallback for a couple of ubiquitous sizes. Consulted only after
/// the catalogue, never instead of it: the API result wins when present.
fn fallback(size_name: &str) -> Option<VmSize> {
    match size_name {
        "Standard_B2s" => Some(VmSize {
            number_of_cores: 2,
            memory_in_mb: 4096,
        }),
        "Standard_D2s_v3" => Some(VmSize {
            number_of_cores: 2,
            memory_in_mb: 8192,
        }),
        _ => None,
    }
}

/// Per-location size catalogue, populated lazily
#[derive(Default)]
pub struct VmSizeCache {
    by_location: HashMap<String, HashMap<String, VmSize>>,
}

impl VmSizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a size name within a location, fetching the location's
    /// catalogue on first use. A failed fetch caches an empty catalogue so
    /// one flaky location costs a single call, and leaves the fallback table
    /// as the only source for that location.
    pub async fn lookup(
        &mut self,
        client: &AzureClient,
        subscription: &str,
        location: &str,
        size_name: &str,
    ) -> Option<VmSize> {
        if !self.by_location.contains_key(location) {
            let catalogue = match fetch_location_sizes(client, subscription, location).await {
                Ok(sizes) => {
                    tracing::debug!("Loaded {} VM sizes for {}", sizes.len(), location);
                    sizes
                }
                Err(e) => {
                    tracing::warn!("Failed to list VM sizes for {}: {:#}", location, e);
                    HashMap::new()
                }
            };
            self.by_location.insert(location.to_string(), catalogue);
        }

        resolve(self.by_location.get(location), size_name)
    }
}

fn resolve(catalogue: Option<&HashMap<String, VmSize>>, size_name: &str) -> Option<VmSize> {
    catalogue
        .and_then(|sizes| sizes.get(size_name))
        .copied()
        .or_else(|| fallback(size_name))
}

async fn fetch_location_sizes(
    client: &AzureClient,
    subscription: &str,
    location: &str,
) -> Result<HashMap<String, VmSize>> {
    let path = format!(
        "/subscriptions/{}/providers/Microsoft.Compute/locations/{}/vmSizes",
        urlencoding::encode(subscription),
        urlencoding::encode(location)
    );
    let items = client
        .get_paged(&path, &client.versions.vm_sizes, "Azure VM Sizes")
        .await?;

    Ok(items.iter().filter_map(parse_size).collect())
}

fn parse_size(entry: &Value) -> Option<(String, VmSize)> {
    let name = entry.get("name")?.as_str()?.to_string();
    let number_of_cores = entry.get("numberOfCores")?.as_u64()? as u32;
    let memory_in_mb = entry.get("memoryInMB")?.as_u64()?;
    Some((
        name,
        VmSize {
            number_of_cores,
            memory_in_mb,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalogue_entry_wins_over_fallback() {
        let catalogue = HashMap::from([(
            "Standard_B2s".to_string(),
            VmSize {
                number_of_cores: 4,
                memory_in_mb: 9999,
            },
        )]);
        let size = resolve(Some(&catalogue), "Standard_B2s").unwrap();
        assert_eq!(size.number_of_cores, 4);
        assert_eq!(size.memory_in_mb, 9999);
    }

    #[test]
    fn fallback_fills_a_catalogue_miss() {
        let catalogue = HashMap::new();
        let size = resolve(Some(&catalogue), "Standard_D2s_v3").unwrap();
        assert_eq!(size.number_of_cores, 2);
        assert_eq!(size.memory_in_mb, 8192);
    }

    #[test]
    fn unknown_size_resolves_to_none() {
        assert!(resolve(None, "Standard_Imaginary_v9").is_none());
    }

    #[test]
    fn parse_size_reads_catalogue_entries() {
        let entry = json!({
            "name": "Standard_D4s_v3",
            "numberOfCores": 4,
            "memoryInMB": 16384,
            "maxDataDiskCount": 8
        });
        let (name, size) = parse_size(&entry).unwrap();
        assert_eq!(name, "Standard_D4s_v3");
        assert_eq!(size.number_of_cores, 4);
        assert_eq!(size.memory_in_mb, 16384);
    }

    #[test]
    fn parse_size_rejects_incomplete_entries() {
        assert!(parse_size(&json!({"name": "x"})).is_none());
        assert!(parse_size(&json!({"numberOfCores": 2, "memoryInMB": 4096})).is_none());
    }
}
