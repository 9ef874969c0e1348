//! Confluence Cloud source.
//!
//! Searches pages through the REST search endpoint using CQL, authenticated
//! with HTTP basic auth (`email:api_token`).
//!
//! # Configuration
//!
//! ```toml
//! [sources.confluence]
//! base_url = "https://acme.atlassian.net/wiki"
//! # email / api_token usually come from the environment
//! ```
//!
//! # Environment Variables
//!
//! - `CONFLUENCE_CLOUD_URL`
//! - `CONFLUENCE_EMAIL`
//! - `CONFLUENCE_API_TOKEN`
//!
//! The client is enabled only when all three are present.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ConfluenceConfig;
use crate::error::SourceError;
use crate::models::RawResult;
use crate::text::{strip_html, truncate_chars};
use crate::traits::{clamp_limit, SourceClient};

/// Characters of page body kept per result.
const CONTENT_CHARS: usize = 1000;

const SOURCE_NAME: &str = "Confluence";

struct Credentials {
    base_url: String,
    auth_header: String,
}

/// Confluence Cloud search client.
pub struct ConfluenceClient {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl ConfluenceClient {
    /// Build a client; it is disabled when any credential is missing.
    pub fn new(config: Option<&ConfluenceConfig>) -> Result<Self> {
        let timeout = config.map_or(30, |c| c.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let credentials = match config {
            Some(ConfluenceConfig {
                base_url: Some(base_url),
                email: Some(email),
                api_token: Some(token),
                ..
            }) => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", email, token));
                info!(base_url = %base_url, "Confluence source enabled");
                Some(Credentials {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    auth_header: format!("Basic {}", encoded),
                })
            }
            _ => {
                info!("Confluence source disabled: configuration incomplete");
                None
            }
        };

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl SourceClient for ConfluenceClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn description(&self) -> &str {
        "Search Confluence Cloud pages via CQL"
    }

    fn source_type(&self) -> &str {
        "confluence"
    }

    fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, SourceError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| SourceError::Disabled {
                source_name: SOURCE_NAME.to_string(),
            })?;

        let limit = clamp_limit(limit);
        let limit_param = limit.to_string();
        let cql = build_cql(query);
        let params = [
            ("cql", cql.as_str()),
            ("limit", limit_param.as_str()),
            ("expand", "content.body.storage,content.space,content.version"),
        ];

        let response = self
            .client
            .get(format!("{}/rest/api/search", creds.base_url))
            .header("Authorization", &creds.auth_header)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut results = parse_search_response(&creds.base_url, &body)?;
        results.truncate(limit);
        debug!(hits = results.len(), "Confluence search complete");
        Ok(results)
    }
}

/// Translate free text into a CQL page search.
///
/// Backslashes and double quotes are escaped so the query stays inside the
/// string literal.
pub fn build_cql(query: &str) -> String {
    let escaped = query.trim().replace('\\', "\\\\").replace('"', "\\\"");
    format!("text ~ \"{}\" AND type = \"page\"", escaped)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: Option<Content>,
    /// Top-level title, present on some hit shapes without `content`.
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<Body>,
    #[serde(default)]
    version: Option<Version>,
    #[serde(default, rename = "_links")]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Body {
    storage: Option<Storage>,
}

#[derive(Debug, Deserialize)]
struct Storage {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Version {
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    by: Option<VersionAuthor>,
}

#[derive(Debug, Deserialize)]
struct VersionAuthor {
    #[serde(default, rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    webui: Option<String>,
}

/// Parse a `/rest/api/search` response body into results.
pub fn parse_search_response(base_url: &str, body: &str) -> Result<Vec<RawResult>, SourceError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let results = parsed
        .results
        .into_iter()
        .map(|hit| {
            let content = hit.content.unwrap_or_default();
            let title = content
                .title
                .or(hit.title)
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let text = content
                .body
                .and_then(|b| b.storage)
                .map(|s| strip_html(&s.value))
                .unwrap_or_default();
            let url = content
                .links
                .and_then(|l| l.webui)
                .map(|webui| format!("{}{}", base_url, webui))
                .unwrap_or_default();
            let (last_modified, author) = match content.version {
                Some(v) => (
                    v.when.as_deref().and_then(parse_timestamp),
                    v.by.and_then(|b| b.display_name),
                ),
                None => (None, None),
            };

            RawResult {
                title,
                url,
                content: truncate_chars(&text, CONTENT_CHARS).to_string(),
                source_name: SOURCE_NAME.to_string(),
                last_modified,
                author,
            }
        })
        .collect();

    Ok(results)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
