//! GCP API interaction module
//!
//! REST access to Resource Manager and Cloud Asset Inventory, used by the
//! `api` backend of the GCP provider.
//!
//! # Module Structure
//!
//! - [`auth`] - access tokens from Application Default Credentials
//! - [`client`] - authenticated client, endpoints and pagination
//! - [`http`] - HTTP utilities and status classification
//! - [`projects`] - projects of an organization
//! - [`assets`] - asset counts per project and type

pub mod assets;
pub mod auth;
pub mod client;
pub mod http;
pub mod projects;
