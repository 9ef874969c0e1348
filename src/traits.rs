//! Extension traits for knowledge sources and chat models.
//!
//! The query processor only ever talks to these two seams. Built-in
//! implementations cover Confluence, SharePoint, local files, and
//! OpenAI-compatible chat; tests and custom binaries can register their own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             SourceRegistry               │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐  │
//! │  │Confluence│ │SharePoint│ │  Local   │  │
//! │  │  (CQL)   │ │ (Graph)  │ │  files   │  │
//! │  └──────────┘ └──────────┘ └──────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!      QueryProcessor::process() ──▶ ChatModel
//! ```
//!
//! # Usage
//!
//! ```rust
//! use navo::traits::SourceRegistry;
//!
//! let sources = SourceRegistry::new();
//! // sources.register(Box::new(MySource::new()));
//! assert_eq!(sources.enabled_count(), 0);
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::error::{LlmError, SourceError};
use crate::llm::ChatMessage;
use crate::models::RawResult;

/// Hard upper bound on results any single source call may return.
pub const MAX_RESULTS_PER_CALL: usize = 25;

// ═══════════════════════════════════════════════════════════════════════
// SourceClient Trait
// ═══════════════════════════════════════════════════════════════════════

/// An adapter over one external knowledge repository.
///
/// # Contract
///
/// - [`is_enabled`](SourceClient::is_enabled) is fixed at construction and
///   reflects whether the required configuration was present. Disabled
///   clients are skipped by the query processor and never searched.
/// - [`search`](SourceClient::search) returns a typed error instead of
///   swallowing failures; the processor logs it and treats the source as
///   having returned nothing.
/// - Implementations cap their own result count at `limit` (itself clamped
///   to [`MAX_RESULTS_PER_CALL`]).
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use navo::error::SourceError;
/// use navo::models::RawResult;
/// use navo::traits::SourceClient;
///
/// pub struct WikiSource;
///
/// #[async_trait]
/// impl SourceClient for WikiSource {
///     fn name(&self) -> &str { "Wiki" }
///     fn description(&self) -> &str { "Internal wiki search" }
///
///     async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<RawResult>, SourceError> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Display name attached to every result (e.g. `"Confluence"`).
    fn name(&self) -> &str;

    /// One-line description for `navo sources` and `/sources`.
    fn description(&self) -> &str;

    /// Source type identifier (e.g. `"confluence"`, `"sharepoint"`).
    fn source_type(&self) -> &str {
        "custom"
    }

    /// Whether the source had the configuration it needs.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Search the source for `query`, returning at most `limit` hits.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, SourceError>;
}

/// Clamp a requested limit into `1..=MAX_RESULTS_PER_CALL`.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_RESULTS_PER_CALL)
}

// ═══════════════════════════════════════════════════════════════════════
// ChatModel Trait
// ═══════════════════════════════════════════════════════════════════════

/// A chat-completion backend producing one terminal text answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier (e.g. `"gpt-4"`).
    fn model_name(&self) -> &str;

    /// Run one completion and return the assistant's text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered collection of source clients.
///
/// Registration order is the merge order: results from earlier sources come
/// first in the flattened result list, whatever order the searches finish in.
pub struct SourceRegistry {
    sources: Vec<Box<dyn SourceClient>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Create a registry with the built-in Confluence, SharePoint, and
    /// local-files clients, in that order.
    ///
    /// Every client is registered even when disabled so that it shows up in
    /// status listings.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::connector_confluence::ConfluenceClient;
        use crate::connector_fs::LocalFilesClient;
        use crate::connector_sharepoint::SharePointClient;

        let mut registry = Self::new();
        registry.register(Box::new(ConfluenceClient::new(
            config.sources.confluence.as_ref(),
        )?));
        registry.register(Box::new(SharePointClient::new(
            config.sources.sharepoint.as_ref(),
        )?));
        registry.register(Box::new(LocalFilesClient::new(
            config.sources.local_files.as_ref(),
        )?));
        Ok(registry)
    }

    /// Register a source client.
    pub fn register(&mut self, source: Box<dyn SourceClient>) {
        self.sources.push(source);
    }

    /// All registered clients, enabled or not.
    pub fn sources(&self) -> &[Box<dyn SourceClient>] {
        &self.sources
    }

    /// Enabled clients in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = &dyn SourceClient> {
        self.sources
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.as_ref())
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
