//! SharePoint source, via the Microsoft Graph search API.
//!
//! Authenticates with an Azure AD app registration (client-credentials
//! grant, scope `https://graph.microsoft.com/.default`) and posts a
//! `driveItem`/`listItem` query to `/v1.0/search/query`, scoped to the
//! configured site with a KQL `path:` restriction.
//!
//! # Environment Variables
//!
//! - `SHAREPOINT_TENANT_ID`
//! - `SHAREPOINT_CLIENT_ID`
//! - `SHAREPOINT_CLIENT_SECRET`
//! - `SHAREPOINT_SITE_URL`

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SharePointConfig;
use crate::error::SourceError;
use crate::models::RawResult;
use crate::oauth::ClientCredentials;
use crate::text::{strip_html, truncate_chars};
use crate::traits::{clamp_limit, SourceClient};

const CONTENT_CHARS: usize = 1000;

const SOURCE_NAME: &str = "SharePoint";

struct GraphAccess {
    search_url: String,
    site_url: String,
    credentials: ClientCredentials,
}

/// Microsoft Graph search client for one SharePoint site.
pub struct SharePointClient {
    client: reqwest::Client,
    access: Option<GraphAccess>,
}

impl SharePointClient {
    pub fn new(config: Option<&SharePointConfig>) -> Result<Self> {
        let timeout = config.map_or(30, |c| c.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let access = match config {
            Some(SharePointConfig {
                tenant_id: Some(tenant),
                client_id: Some(client_id),
                client_secret: Some(secret),
                site_url: Some(site_url),
                graph_url,
                login_url,
                ..
            }) => {
                let graph_url = graph_url.trim_end_matches('/');
                let token_url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    login_url.trim_end_matches('/'),
                    tenant
                );
                info!(site = %site_url, "SharePoint source enabled");
                Some(GraphAccess {
                    search_url: format!("{}/v1.0/search/query", graph_url),
                    site_url: site_url.clone(),
                    credentials: ClientCredentials::new(
                        client.clone(),
                        token_url,
                        client_id.as_str(),
                        secret.as_str(),
                        "https://graph.microsoft.com/.default",
                    ),
                })
            }
            _ => {
                info!("SharePoint source disabled: configuration incomplete");
                None
            }
        };

        Ok(Self { client, access })
    }
}

#[async_trait]
impl SourceClient for SharePointClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn description(&self) -> &str {
        "Search SharePoint documents via Microsoft Graph"
    }

    fn source_type(&self) -> &str {
        "sharepoint"
    }

    fn is_enabled(&self) -> bool {
        self.access.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, SourceError> {
        let access = self.access.as_ref().ok_or_else(|| SourceError::Disabled {
            source_name: SOURCE_NAME.to_string(),
        })?;

        let token = access.credentials.access_token().await?;
        let limit = clamp_limit(limit);
        let body = build_search_request(query, &access.site_url, limit);

        let response = self
            .client
            .post(&access.search_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let mut results = parse_search_response(&text)?;
        results.truncate(limit);
        debug!(hits = results.len(), "SharePoint search complete");
        Ok(results)
    }
}

/// Build the Graph `search/query` request body.
pub fn build_search_request(query: &str, site_url: &str, limit: usize) -> serde_json::Value {
    let kql = format!("{} path:\"{}\"", query.trim(), site_url.trim_end_matches('/'));
    json!({
        "requests": [{
            "entityTypes": ["driveItem"],
            "query": { "queryString": kql },
            "from": 0,
            "size": limit,
        }]
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchSet>,
}

#[derive(Debug, Deserialize)]
struct SearchSet {
    #[serde(default, rename = "hitsContainers")]
    hits_containers: Vec<HitsContainer>,
}

#[derive(Debug, Deserialize)]
struct HitsContainer {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    resource: Resource,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Resource {
    name: Option<String>,
    web_url: Option<String>,
    last_modified_date_time: Option<String>,
    last_modified_by: Option<IdentitySet>,
}

#[derive(Debug, Deserialize)]
struct IdentitySet {
    user: Option<Identity>,
}

#[derive(Debug, Deserialize)]
struct Identity {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

/// Flatten a Graph search response into results, in hit order.
pub fn parse_search_response(body: &str) -> Result<Vec<RawResult>, SourceError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let results = parsed
        .value
        .into_iter()
        .flat_map(|set| set.hits_containers)
        .flat_map(|container| container.hits)
        .map(|hit| {
            let resource = hit.resource;
            let summary = hit.summary.map(|s| strip_html(&s)).unwrap_or_default();
            RawResult {
                title: resource
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "Untitled".to_string()),
                url: resource.web_url.unwrap_or_default(),
                content: truncate_chars(&summary, CONTENT_CHARS).to_string(),
                source_name: SOURCE_NAME.to_string(),
                last_modified: resource
                    .last_modified_date_time
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                author: resource
                    .last_modified_by
                    .and_then(|b| b.user)
                    .and_then(|u| u.display_name),
            }
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_scopes_query_to_site() {
        let body = build_search_request("vpn setup", "https://acme.sharepoint.com/sites/it/", 10);
        let request = &body["requests"][0];
        assert_eq!(
            request["query"]["queryString"],
            "vpn setup path:\"https://acme.sharepoint.com/sites/it\""
        );
        assert_eq!(request["size"], 10);
        assert_eq!(request["entityTypes"], json!(["driveItem"]));
    }

    #[test]
    fn parses_hits_across_containers() {
        let body = r#"{
            "value": [{
                "hitsContainers": [
                    {"hits": [{
                        "summary": "Connect to the <c0>VPN</c0> using the client",
                        "resource": {
                            "name": "VPN Setup.docx",
                            "webUrl": "https://acme.sharepoint.com/sites/it/VPN%20Setup.docx",
                            "lastModifiedDateTime": "2024-05-02T08:00:00Z",
                            "lastModifiedBy": {"user": {"displayName": "Grace"}}
                        }
                    }]},
                    {"hits": [{"resource": {"name": "Remote Access FAQ.docx"}}]}
                ]
            }]
        }"#;
        let results = parse_search_response(body).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "VPN Setup.docx");
        assert_eq!(results[0].content, "Connect to the VPN using the client");
        assert_eq!(results[0].author.as_deref(), Some("Grace"));
        assert!(results[0].last_modified.is_some());
        assert_eq!(results[1].title, "Remote Access FAQ.docx");
        assert_eq!(results[1].url, "");
        assert_eq!(results[1].source_name, "SharePoint");
    }

    #[test]
    fn empty_value_yields_nothing() {
        assert!(parse_search_response(r#"{"value":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn partial_config_disables_client() {
        let config = SharePointConfig {
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            ..Default::default()
        };
        assert!(!SharePointClient::new(Some(&config)).unwrap().is_enabled());
    }
}
