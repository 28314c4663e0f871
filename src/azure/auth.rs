//! Azure authentication
//!
//! Resolves a bearer token from the environment, falling back to the `az`
//! CLI, and caches the result for the lifetime of the process. The token is
//! never refreshed: a run that outlives it starts failing with 401s, which
//! surface as ordinary upstream errors.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::sync::RwLock;

/// Environment variable checked before shelling out to the Azure CLI
pub const TOKEN_ENV_VAR: &str = "AZURE_TOKEN";

/// Token holder with process-lifetime caching
#[derive(Clone, Default)]
pub struct Credentials {
    cache: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a bearer token for API calls
    pub async fn token(&self) -> Result<String> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref() {
                return Ok(token.clone());
            }
        }

        let token = resolve_token().await?;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(token.clone());
        }

        tracing::debug!("Access token resolved and cached");

        Ok(token)
    }
}

/// Read the token from the environment, or mint one via the Azure CLI
async fn resolve_token() -> Result<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        let trimmed = token.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    tracing::debug!("{} not set, invoking the Azure CLI", TOKEN_ENV_VAR);

    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--query",
            "accessToken",
            "--output",
            "tsv",
        ])
        .output()
        .await
        .with_context(|| {
            format!(
                "Failed to run 'az account get-access-token'. Set {} or log in with 'az login'",
                TOKEN_ENV_VAR
            )
        })?;

    if !output.status.success() {
        bail!(
            "'az account get-access-token' exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        bail!("The Azure CLI returned an empty access token");
    }

    Ok(token)
}
