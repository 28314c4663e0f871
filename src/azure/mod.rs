//! Azure API interaction module
//!
//! Core functionality for talking to Azure Resource Manager: authentication,
//! the HTTP layer, the main client with pagination, and the walk roots.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer token from the environment or the Azure CLI
//! - [`http`] - HTTP verbs, body modes, and response interpretation
//! - [`client`] - Main client with api-version handling and pagination
//! - [`subscriptions`] - Subscription and resource group listing

pub mod auth;
pub mod client;
pub mod http;
pub mod subscriptions;
