//! Source status listing for `navo sources` and `GET /sources`.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::traits::SourceRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub source_type: String,
    pub enabled: bool,
    pub description: String,
}

/// Status of every registered source, in registration order.
pub fn get_sources(registry: &SourceRegistry) -> Vec<SourceStatus> {
    registry
        .sources()
        .iter()
        .map(|s| SourceStatus {
            name: s.name().to_string(),
            source_type: s.source_type().to_string(),
            enabled: s.is_enabled(),
            description: s.description().to_string(),
        })
        .collect()
}

/// Print a status table for the built-in sources.
///
/// Does not need an LLM key, so it works for checking credentials before the
/// first `serve`.
pub fn list_sources(config: &Config) -> Result<()> {
    let registry = SourceRegistry::from_config(config)?;

    println!("{:<12} {:<12} {:<10} DESCRIPTION", "SOURCE", "TYPE", "STATUS");
    for status in get_sources(&registry) {
        let state = if status.enabled {
            "enabled"
        } else {
            "disabled"
        };
        println!(
            "{:<12} {:<12} {:<10} {}",
            status.name, status.source_type, state, status.description
        );
    }
    if registry.enabled_count() == 0 {
        println!();
        println!("No sources enabled. Set CONFLUENCE_*, SHAREPOINT_*, or LOCAL_DOCS_PATH.");
    }
    Ok(())
}
