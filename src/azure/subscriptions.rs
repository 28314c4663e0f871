//! Subscriptions and resource groups
//!
//! The roots of every walk: list subscriptions, then the resource groups
//! inside each one. Everything else hangs off a (subscription, group) pair.

use anyhow::Result;

use super::client::AzureClient;

/// List the ids of every subscription visible to the token
pub async fn list_subscriptions(client: &AzureClient) -> Result<Vec<String>> {
    let items = client
        .get_paged(
            "/subscriptions",
            &client.versions.subscriptions,
            "Azure Subscriptions",
        )
        .await?;

    Ok(items
        .iter()
        .filter_map(|sub| sub.get("subscriptionId").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect())
}

/// List the resource group names in one subscription
pub async fn list_resource_groups(client: &AzureClient, subscription: &str) -> Result<Vec<String>> {
    let path = format!(
        "/subscriptions/{}/resourcegroups",
        urlencoding::encode(subscription)
    );
    let items = client
        .get_paged(
            &path,
            &client.versions.resource_groups,
            "Azure Resource Groups",
        )
        .await?;

    Ok(items
        .iter()
        .filter_map(|rg| rg.get("name").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect())
}
