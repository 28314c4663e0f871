//! External export converters
//!
//! Standalone transformations that reshape other tools' exports into the
//! Tidal schema without touching any Azure API.
//!
//! - [`csv`] - On-prem server spreadsheets
//! - [`vsphere`] - vSphere VM export JSON

pub mod csv;
pub mod vsphere;
