//! App Service inventory
//!
//! Lists the web apps in a subscription, resolves each one's service plan,
//! and pulls its connection strings and app settings. Azure only exposes
//! those two reads as POST "list" actions. Secret material is redacted
//! before anything leaves this module.

use anyhow::Result;
use serde_json::{json, Value};

use super::dig_str;
use crate::azure::client::AzureClient;
use crate::azure::subscriptions::list_resource_groups;
use crate::tidal::redact::redact_properties;
use crate::tidal::tags::Tags;
use crate::tidal::{Server, NOT_AVAILABLE};

/// One enriched App Service: the raw site resource with `service_plan`,
/// `connection_strings`, and `app_settings` grafted on
#[derive(Debug, Clone)]
pub struct AppServiceDetail {
    pub name: String,
    pub resource_group: String,
    pub site: Value,
}

/// Collect every App Service in a subscription, or just the named one
pub async fn collect(
    client: &AzureClient,
    subscription: &str,
    name_filter: Option<&str>,
) -> Result<Vec<AppServiceDetail>> {
    let groups = list_resource_groups(client, subscription).await?;
    let mut details = Vec::new();

    for group in groups {
        tracing::info!("Fetching App Services in resource group {}...", group);
        let sites = match sites_in_group(client, subscription, &group).await {
            Ok(sites) => sites,
            Err(e) => {
                tracing::error!("Skipping resource group {}: {:#}", group, e);
                continue;
            }
        };

        for site in sites {
            let name = site
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(NOT_AVAILABLE)
                .to_string();
            if let Some(filter) = name_filter {
                if name != filter {
                    continue;
                }
            }

            let resource_group = dig_str(&site, &["properties", "resourceGroup"])
                .unwrap_or(&group)
                .to_string();
            let site = enrich(client, subscription, &resource_group, &name, site).await;
            details.push(AppServiceDetail {
                name,
                resource_group,
                site,
            });
        }
    }

    Ok(details)
}

/// Graft the service plan, connection strings, and app settings onto the
/// site resource. Each lookup degrades independently.
async fn enrich(
    client: &AzureClient,
    subscription: &str,
    resource_group: &str,
    name: &str,
    mut site: Value,
) -> Value {
    if let Some(plan_id) = dig_str(&site, &["properties", "serverFarmId"]).map(|s| s.to_string()) {
        match client
            .get(&plan_id, &client.versions.web, "Azure Service Plans")
            .await
        {
            Ok(plan) => site["service_plan"] = plan,
            Err(e) => tracing::warn!("Failed to resolve service plan for {}: {:#}", name, e),
        }
    }

    let base = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}",
        urlencoding::encode(subscription),
        urlencoding::encode(resource_group),
        urlencoding::encode(name)
    );

    match client
        .post_action(
            &format!("{}/config/connectionstrings/list", base),
            &client.versions.web,
            "Azure Connection Strings",
        )
        .await
    {
        Ok(mut doc) => {
            redact_properties(&mut doc);
            site["connection_strings"] = doc;
        }
        Err(e) => tracing::warn!("Failed to list connection strings for {}: {:#}", name, e),
    }

    match client
        .post_action(
            &format!("{}/config/appsettings/list", base),
            &client.versions.web,
            "Azure App Settings",
        )
        .await
    {
        Ok(mut doc) => {
            redact_properties(&mut doc);
            site["app_settings"] = doc;
        }
        Err(e) => tracing::warn!("Failed to list app settings for {}: {:#}", name, e),
    }

    site
}

/// Normalize an enriched App Service into a Tidal server record
pub fn normalize(detail: &AppServiceDetail) -> Server {
    let site = &detail.site;
    let tags = Tags::from_value(site.get("tags"));

    let mut custom_fields = tags.custom_fields();
    if let Some(location) = site.get("location").and_then(|v| v.as_str()) {
        custom_fields.insert("location".to_string(), json!(location));
    }
    if let Some(plan) = dig_str(site, &["service_plan", "name"]) {
        custom_fields.insert("az_service_plan".to_string(), json!(plan));
    }
    if let Some(sku) = dig_str(site, &["service_plan", "sku", "name"]) {
        custom_fields.insert("az_sku".to_string(), json!(sku));
    }

    Server {
        host_name: detail.name.clone(),
        fqdn: dig_str(site, &["properties", "defaultHostName"])
            .unwrap_or(NOT_AVAILABLE)
            .to_string(),
        description: "Azure App Service".to_string(),
        environment: tags.environment(),
        custom_fields,
        ..Server::default()
    }
}

async fn sites_in_group(
    client: &AzureClient,
    subscription: &str,
    group: &str,
) -> Result<Vec<Value>> {
    let path = format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites",
        urlencoding::encode(subscription),
        urlencoding::encode(group)
    );
    client
        .get_paged(&path, &client.versions.web, "Azure App Services")
        .await
}

/// Plan name and SKU for the stderr summary
pub fn plan_summary(detail: &AppServiceDetail) -> String {
    let plan = dig_str(&detail.site, &["service_plan", "name"]).unwrap_or(NOT_AVAILABLE);
    let sku = dig_str(&detail.site, &["service_plan", "sku", "name"]).unwrap_or(NOT_AVAILABLE);
    format!("{} (plan: {}, sku: {})", detail.name, plan, sku)
}
