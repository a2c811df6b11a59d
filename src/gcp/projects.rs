//! GCP Projects
//!
//! Listing the projects that sit directly under an organization.

use super::client::{with_query, GcpClient};
use super::http::HttpError;
use serde_json::Value;

/// Project information
#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub lifecycle_state: String,
}

impl From<&Value> for Project {
    fn from(value: &Value) -> Self {
        Self {
            project_id: value
                .get("projectId")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            lifecycle_state: value
                .get("lifecycleState")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string(),
        }
    }
}

/// Resource Manager filter selecting the direct children of an organization
pub fn organization_filter(org_id: &str) -> String {
    format!("parent.id:{} parent.type:organization", org_id)
}

/// List active projects of an organization
pub async fn list_projects(client: &GcpClient, org_id: &str) -> Result<Vec<Project>, HttpError> {
    let url = with_query(
        &client.resourcemanager_url("projects"),
        "filter",
        &organization_filter(org_id),
    );
    let items = client.get_all_pages(&url, "projects").await?;

    Ok(items
        .iter()
        .map(Project::from)
        .filter(|p| p.lifecycle_state == "ACTIVE")
        .collect())
}

/// Get project IDs as a simple list
pub async fn list_project_ids(client: &GcpClient, org_id: &str) -> Result<Vec<String>, HttpError> {
    let projects = list_projects(client, org_id).await?;
    Ok(projects.into_iter().map(|p| p.project_id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_from_value() {
        let p = Project::from(&json!({"projectId": "demo", "lifecycleState": "ACTIVE"}));
        assert_eq!(p.project_id, "demo");
        assert_eq!(p.lifecycle_state, "ACTIVE");

        let p = Project::from(&json!({}));
        assert_eq!(p.project_id, "-");
        assert_eq!(p.lifecycle_state, "UNKNOWN");
    }

    #[test]
    fn test_organization_filter() {
        assert_eq!(
            organization_filter("123"),
            "parent.id:123 parent.type:organization"
        );
    }
}
