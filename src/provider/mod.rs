//! Cloud providers
//!
//! Each provider knows how to enumerate its scopes and how to count the
//! assets of one type inside one scope.
//!
//! # Module Structure
//!
//! - [`azure`] - subscriptions and resource groups through the `az` CLI
//! - [`gcp`] - projects of an organization through `gcloud` or the REST APIs

pub mod azure;
pub mod gcp;

use crate::error::{CountError, ScopeError};
use async_trait::async_trait;
use std::fmt;

/// Supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Azure,
    Gcp,
}

impl Provider {
    /// Word used for top-level scopes in the console summary
    pub fn scope_label(self) -> &'static str {
        match self {
            Provider::Azure => "subscription",
            Provider::Gcp => "project",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Azure => write!(f, "azure"),
            Provider::Gcp => write!(f, "gcp"),
        }
    }
}

/// A place where assets are counted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Subscription or project id; totals roll up to this
    pub id: String,
    /// Resource group inside a subscription
    pub group: Option<String>,
}

impl Scope {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: None,
        }
    }

    pub fn with_group(id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: Some(group.into()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}/{}", self.id, group),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Source of scopes and asset counts for one provider
#[async_trait]
pub trait AssetSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Enumerate every scope of the run. An empty root list is an error.
    async fn list_scopes(&self) -> Result<Vec<Scope>, ScopeError>;

    /// Count assets of one type in one scope. Makes a single attempt;
    /// retrying is left to the caller.
    async fn count_assets(&self, scope: &Scope, asset_type: &str) -> Result<usize, CountError>;
}

/// Substrings that classify a vendor CLI failure
#[derive(Debug, Clone, Copy)]
pub struct FailureSignatures {
    pub rate_limit: &'static [&'static str],
    pub permission_denied: &'static [&'static str],
}

impl FailureSignatures {
    /// Classify the stderr of a failed command
    pub fn classify(&self, stderr: &str) -> CountError {
        let detail = stderr.trim().to_string();
        if self.rate_limit.iter().any(|s| stderr.contains(s)) {
            CountError::RateLimited { detail }
        } else if self.permission_denied.iter().any(|s| stderr.contains(s)) {
            CountError::PermissionDenied { detail }
        } else {
            CountError::Command(detail)
        }
    }
}

/// Count the entries of a JSON array listing
pub fn parse_count(stdout: &str) -> Result<usize, CountError> {
    let value: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| CountError::Decode {
            detail: e.to_string(),
        })?;

    value
        .as_array()
        .map(|items| items.len())
        .ok_or_else(|| CountError::Decode {
            detail: "expected a JSON array".to_string(),
        })
}

/// Log a classified failure at the level it deserves
pub(crate) fn log_count_failure(scope: &Scope, asset_type: &str, err: &CountError) {
    match err {
        CountError::RateLimited { .. } => {
            tracing::warn!("Rate limit exceeded for {} - {}: {}", scope, asset_type, err.detail())
        }
        CountError::PermissionDenied { .. } => {
            tracing::error!("Permission error for {} - {}: {}", scope, asset_type, err.detail())
        }
        CountError::Decode { .. } => {
            tracing::error!("Malformed response for {} - {}: {}", scope, asset_type, err.detail())
        }
        CountError::Command(_) => {
            tracing::error!("Command error for {} - {}: {}", scope, asset_type, err.detail())
        }
    }
}
