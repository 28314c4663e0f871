//! Output sinks
//!
//! Files and stdout. Progress and summaries go to stderr via tracing so
//! stdout carries nothing but the JSON document a downstream pipe expects.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

/// Write a resource-type document under `<output_dir>/<subscription>/`
pub fn write_subscription_file(
    output_dir: &Path,
    subscription: &str,
    resource_type: &str,
    payload: &Value,
) -> Result<PathBuf> {
    let dir = output_dir.join(subscription);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(format!("{}.json", resource_type));
    let content = serde_json::to_string_pretty(payload)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Wrote {}", path.display());
    Ok(path)
}

/// Write one resource's payload to `<name>_<resource_group>.json` in the
/// working directory
pub fn write_resource_file(name: &str, resource_group: &str, payload: &Value) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_{}.json", name, resource_group));
    let content = serde_json::to_string_pretty(payload)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Wrote {}", path.display());
    Ok(path)
}

/// Print the final document to stdout
pub fn print_document(payload: &Value) -> Result<()> {
    println!("{}", serde_json::to_string(payload)?);
    Ok(())
}
