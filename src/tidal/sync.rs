//! Upload to the Tidal platform
//!
//! The platform's `tidal` CLI takes a JSON file and POSTs it to a sync
//! endpoint. There is no structured success contract: the only observable
//! outcome is the record id printed in its stdout, so success is scraping a
//! numeric `"id": N` out of that output.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tokio::process::Command;

/// Sync records in chunks. `page_size` of `None` or 0 sends everything in
/// one chunk. A chunk that fails is logged and skipped; later chunks still
/// run. Returns the scraped ids alongside the number of failed chunks.
pub async fn sync_records(
    record_type: &str,
    records: &[Value],
    page_size: Option<usize>,
) -> Result<(Vec<u64>, usize)> {
    if records.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let chunk_size = match page_size {
        Some(n) if n > 0 => n,
        _ => records.len(),
    };

    let mut ids = Vec::new();
    let mut failed = 0;

    for (index, chunk) in records.chunks(chunk_size).enumerate() {
        match sync_chunk(record_type, chunk).await {
            Ok(id) => {
                tracing::info!(
                    "Synced {} {} records (chunk {}), id {}",
                    chunk.len(),
                    record_type,
                    index + 1,
                    id
                );
                ids.push(id);
            }
            Err(e) => {
                failed += 1;
                tracing::error!(
                    "Sync of {} chunk {} failed: {:#}",
                    record_type,
                    index + 1,
                    e
                );
            }
        }
    }

    Ok((ids, failed))
}

/// Write one chunk to a temp file, hand it to the CLI, scrape the id, and
/// delete the file whether or not the sync worked.
async fn sync_chunk(record_type: &str, chunk: &[Value]) -> Result<u64> {
    let file_path = std::env::temp_dir().join(format!("tidal_{}_data.json", record_type));
    let payload = json!({ record_type: chunk });
    std::fs::write(&file_path, serde_json::to_vec(&payload)?)
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    let result = Command::new("tidal")
        .args([
            "request",
            "-X",
            "POST",
            &format!("/api/v1/{}/sync", record_type),
        ])
        .arg(&file_path)
        .output()
        .await;

    let _ = std::fs::remove_file(&file_path);

    let output = result.context("Failed to run the 'tidal' CLI. Is it on the PATH?")?;
    if !output.status.success() {
        bail!(
            "'tidal request' exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    scrape_id(&stdout).ok_or_else(|| anyhow!("Failed to capture ID from Tidal sync output"))
}

/// Find the first `"id": N` in the CLI's output
pub fn scrape_id(output: &str) -> Option<u64> {
    let start = output.find("\"id\"")?;
    let rest = output[start + "\"id\"".len()..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
