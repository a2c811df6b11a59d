//! GCP
//!
//! Scopes are the projects of one organization. Two backends: the `gcloud`
//! CLI, and the Resource Manager / Cloud Asset REST APIs.

use super::{log_count_failure, parse_count, AssetSource, FailureSignatures, Provider, Scope};
use crate::error::{CountError, ScopeError};
use crate::gcp::client::GcpClient;
use crate::gcp::{assets, projects};
use crate::shell::{CommandRunner, SystemRunner};
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const GCLOUD: &str = "gcloud";

pub const GCLOUD_SIGNATURES: FailureSignatures = FailureSignatures {
    rate_limit: &["Quota exceeded"],
    permission_denied: &["Permission denied"],
};

/// How GCP is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcpBackend {
    /// Shell out to the gcloud CLI
    #[default]
    Cli,
    /// Call the REST APIs with Application Default Credentials
    Api,
}

/// Entry of `gcloud projects list --format=json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectEntry {
    project_id: String,
}

/// GCP asset source backed by the `gcloud` CLI
pub struct GcloudCli<R = SystemRunner> {
    org_id: String,
    runner: R,
}

impl GcloudCli<SystemRunner> {
    pub fn new(org_id: &str) -> Self {
        Self::with_runner(org_id, SystemRunner)
    }
}

impl<R: CommandRunner> GcloudCli<R> {
    pub fn with_runner(org_id: &str, runner: R) -> Self {
        Self {
            org_id: org_id.to_string(),
            runner,
        }
    }
}

#[async_trait]
impl<R: CommandRunner> AssetSource for GcloudCli<R> {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn list_scopes(&self) -> Result<Vec<Scope>, ScopeError> {
        let args = vec![
            "projects".to_string(),
            "list".to_string(),
            format!("--filter={}", projects::organization_filter(&self.org_id)),
            "--format=json".to_string(),
        ];
        let out = self.runner.run(GCLOUD, &args).await;
        if !out.is_success() {
            tracing::error!("Error listing projects: {}", out.stderr.trim());
            return Err(ScopeError::Command(out.stderr.trim().to_string()));
        }

        let entries: Vec<ProjectEntry> =
            serde_json::from_str(&out.stdout).map_err(|e| ScopeError::Decode(e.to_string()))?;
        if entries.is_empty() {
            return Err(ScopeError::NoneFound);
        }

        tracing::info!("Organization {}: {} projects", self.org_id, entries.len());
        Ok(entries.into_iter().map(|p| Scope::new(p.project_id)).collect())
    }

    async fn count_assets(&self, scope: &Scope, asset_type: &str) -> Result<usize, CountError> {
        let args = vec![
            "asset".to_string(),
            "list".to_string(),
            format!("--project={}", scope.id),
            format!("--asset-types={}", asset_type),
            "--format=json".to_string(),
        ];
        let out = self.runner.run(GCLOUD, &args).await;

        let result = if out.is_success() {
            parse_count(&out.stdout)
        } else {
            Err(GCLOUD_SIGNATURES.classify(&out.stderr))
        };

        if let Err(err) = &result {
            log_count_failure(scope, asset_type, err);
        }
        result
    }
}

/// GCP asset source backed by the REST APIs
pub struct GcpApi {
    org_id: String,
    client: GcpClient,
}

impl GcpApi {
    pub fn new(org_id: &str, client: GcpClient) -> Self {
        Self {
            org_id: org_id.to_string(),
            client,
        }
    }
}

#[async_trait]
impl AssetSource for GcpApi {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn list_scopes(&self) -> Result<Vec<Scope>, ScopeError> {
        let ids = match projects::list_project_ids(&self.client, &self.org_id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Error listing projects: {}", e);
                return Err(ScopeError::Command(e.to_string()));
            }
        };
        if ids.is_empty() {
            return Err(ScopeError::NoneFound);
        }

        tracing::info!("Organization {}: {} active projects", self.org_id, ids.len());
        Ok(ids.into_iter().map(Scope::new).collect())
    }

    async fn count_assets(&self, scope: &Scope, asset_type: &str) -> Result<usize, CountError> {
        let result = assets::count_assets(&self.client, &scope.id, asset_type)
            .await
            .map_err(|e| e.classify());

        if let Err(err) = &result {
            log_count_failure(scope, asset_type, err);
        }
        result
    }
}
