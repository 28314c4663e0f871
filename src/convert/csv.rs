//! CSV → Tidal servers
//!
//! Reads an on-prem inventory spreadsheet and keeps the rows that describe a
//! sized machine. Rows where both RAM and core count are missing or zero are
//! dropped.

use anyhow::{Context, Result};
use serde_json::{json, Value};

const HOSTNAME_COLUMN: &str = "Server Name";
const RAM_COLUMN: &str = "OnPrem RAM(GB)";
const CPUS_COLUMN: &str = "OnPrem Cores";

/// Convert CSV input into a `{"servers": [...]}` document
pub fn convert<R: std::io::Read>(input: R) -> Result<Value> {
    let mut reader = csv::Reader::from_reader(input);

    let headers = reader.headers().context("Failed to read CSV headers")?;
    let hostname_idx = column_index(headers, HOSTNAME_COLUMN)?;
    let ram_idx = column_index(headers, RAM_COLUMN)?;
    let cpus_idx = column_index(headers, CPUS_COLUMN)?;

    let mut servers = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;

        let ram_gb = parse_count(record.get(ram_idx));
        let cpu_count = parse_count(record.get(cpus_idx));
        if ram_gb == 0 && cpu_count == 0 {
            continue;
        }

        servers.push(json!({
            "host_name": record.get(hostname_idx).unwrap_or_default(),
            "ram_allocated_gb": ram_gb,
            "cpu_count": cpu_count,
        }));
    }

    Ok(json!({ "servers": servers }))
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("CSV input is missing the '{}' column", name))
}

/// Non-numeric and missing cells count as zero, like Ruby's to_i
fn parse_count(cell: Option<&str>) -> u64 {
    cell.map(|s| {
        let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "\
Server Name,OnPrem RAM(GB),OnPrem Cores
db-host,64,16
empty-row,0,0
partial,8,
junk,n/a,abc
";

    #[test]
    fn sized_rows_are_kept() {
        let doc = convert(INPUT.as_bytes()).unwrap();
        let servers = doc["servers"].as_array().unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0]["host_name"], "db-host");
        assert_eq!(servers[0]["ram_allocated_gb"], 64);
        assert_eq!(servers[0]["cpu_count"], 16);
    }

    #[test]
    fn unsized_rows_are_dropped() {
        let doc = convert(INPUT.as_bytes()).unwrap();
        let names: Vec<&str> = doc["servers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["host_name"].as_str().unwrap())
            .collect();
        assert!(!names.contains(&"empty-row"));
        assert!(!names.contains(&"junk"));
        assert!(names.contains(&"partial"));
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = convert("Host,RAM\na,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Server Name"));
    }
}
