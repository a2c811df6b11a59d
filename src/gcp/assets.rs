//! Cloud Asset inventory

use super::client::{with_query, GcpClient};
use super::http::HttpError;

/// Largest page the Cloud Asset API accepts
const PAGE_SIZE: &str = "1000";

/// Count the assets of one type in a project, across all pages
pub async fn count_assets(
    client: &GcpClient,
    project_id: &str,
    asset_type: &str,
) -> Result<usize, HttpError> {
    let url = client.cloudasset_url(&format!("projects/{}/assets", project_id));
    let url = with_query(&url, "assetTypes", asset_type);
    let url = with_query(&url, "pageSize", PAGE_SIZE);

    let assets = client.get_all_pages(&url, "assets").await?;
    Ok(assets.len())
}
