//! Configuration parsing.
//!
//! NAVO reads an optional TOML file and then fills credentials from the
//! environment (and `.env`, via `dotenvy`). Every tunable has a serde default,
//! so an empty file, or no file at all, yields a runnable configuration as
//! long as `OPENAI_API_KEY` is set.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3978"
//!
//! [llm]
//! model = "gpt-4"
//!
//! [retrieval]
//! excerpt_chars = 800
//!
//! [sources.local_files]
//! root = "./docs"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3978".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Usually supplied through `OPENAI_API_KEY` rather than the file.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
            organization: None,
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4".to_string()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.3
}
fn default_timeout_secs() -> u64 {
    30
}

/// Fan-out and prompt-size limits.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results requested from each source (clamped to 1..=25 by the clients).
    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: usize,
    /// Results, in fetch order, that may contribute to the prompt.
    #[serde(default = "default_max_context_results")]
    pub max_context_results: usize,
    /// Per-result excerpt cap in characters.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Whole-context cap in characters; parts are dropped from the tail.
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,
    /// Ranked sources returned with an answer.
    #[serde(default = "default_display_sources")]
    pub display_sources: usize,
    /// Deadline for the whole fan-out; slower sources are abandoned.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_source_limit: default_per_source_limit(),
            max_context_results: default_max_context_results(),
            excerpt_chars: default_excerpt_chars(),
            context_char_budget: default_context_char_budget(),
            display_sources: default_display_sources(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn default_per_source_limit() -> usize {
    10
}
fn default_max_context_results() -> usize {
    5
}
fn default_excerpt_chars() -> usize {
    800
}
fn default_context_char_budget() -> usize {
    4000
}
fn default_display_sources() -> usize {
    3
}
fn default_query_timeout_secs() -> u64 {
    45
}

/// Constants of the answer-confidence heuristic:
/// `min(cap, base + min(result_cap, per_result * n) + min(context_cap, len / context_divisor))`.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_confidence_base")]
    pub base: f64,
    #[serde(default = "default_per_result")]
    pub per_result: f64,
    #[serde(default = "default_result_cap")]
    pub result_cap: f64,
    #[serde(default = "default_context_divisor")]
    pub context_divisor: f64,
    #[serde(default = "default_context_cap")]
    pub context_cap: f64,
    #[serde(default = "default_confidence_cap")]
    pub cap: f64,
    /// Confidence reported when the LLM call fails but sources exist.
    #[serde(default = "default_degraded_confidence")]
    pub degraded_confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: default_confidence_base(),
            per_result: default_per_result(),
            result_cap: default_result_cap(),
            context_divisor: default_context_divisor(),
            context_cap: default_context_cap(),
            cap: default_confidence_cap(),
            degraded_confidence: default_degraded_confidence(),
        }
    }
}

fn default_confidence_base() -> f64 {
    0.6
}
fn default_per_result() -> f64 {
    0.1
}
fn default_result_cap() -> f64 {
    0.3
}
fn default_context_divisor() -> f64 {
    2000.0
}
fn default_context_cap() -> f64 {
    0.1
}
fn default_confidence_cap() -> f64 {
    0.95
}
fn default_degraded_confidence() -> f64 {
    0.4
}

/// Weights of the display relevance score.
#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,
    #[serde(default = "default_body_weight")]
    pub body_weight: f64,
    #[serde(default = "default_intent_weight")]
    pub intent_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// Age at which the recency boost reaches zero.
    #[serde(default = "default_recency_horizon_days")]
    pub recency_horizon_days: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            title_weight: default_title_weight(),
            body_weight: default_body_weight(),
            intent_weight: default_intent_weight(),
            recency_weight: default_recency_weight(),
            recency_horizon_days: default_recency_horizon_days(),
        }
    }
}

fn default_title_weight() -> f64 {
    0.5
}
fn default_body_weight() -> f64 {
    0.3
}
fn default_intent_weight() -> f64 {
    0.1
}
fn default_recency_weight() -> f64 {
    0.1
}
fn default_recency_horizon_days() -> i64 {
    365
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    1800
}
fn default_cache_max_entries() -> usize {
    1000
}

/// Bot Framework credentials used to post replies back to Teams.
#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_password: Option<String>,
    #[serde(default = "default_bot_token_url")]
    pub token_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_password: None,
            token_url: default_bot_token_url(),
        }
    }
}

impl BotConfig {
    pub fn is_configured(&self) -> bool {
        self.app_id.is_some() && self.app_password.is_some()
    }
}

fn default_bot_token_url() -> String {
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub confluence: Option<ConfluenceConfig>,
    pub sharepoint: Option<SharePointConfig>,
    pub local_files: Option<LocalFilesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfluenceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            email: None,
            api_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SharePointConfig {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SharePointConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            site_url: None,
            graph_url: default_graph_url(),
            login_url: default_login_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_graph_url() -> String {
    "https://graph.microsoft.com".to_string()
}
fn default_login_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalFilesConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for LocalFilesConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.rst".to_string(),
    ]
}

impl Config {
    /// All defaults, no sources, no credentials.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Fill credential fields from environment-style lookups.
    ///
    /// Values already present in the file win, except that empty strings are
    /// treated as absent. Source sections are created on demand so that a
    /// deployment configured purely through the environment still enables its
    /// sources.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fill(&mut self.llm.api_key, get("OPENAI_API_KEY"));
        fill(&mut self.llm.organization, get("OPENAI_ORGANIZATION"));
        if let Some(base) = get("OPENAI_API_BASE") {
            self.llm.base_url = base;
        }

        fill(&mut self.bot.app_id, get("TEAMS_APP_ID"));
        fill(&mut self.bot.app_password, get("TEAMS_APP_PASSWORD"));

        let confluence = (
            get("CONFLUENCE_CLOUD_URL"),
            get("CONFLUENCE_EMAIL"),
            get("CONFLUENCE_API_TOKEN"),
        );
        if confluence.0.is_some() || confluence.1.is_some() || confluence.2.is_some() {
            let cfg = self.sources.confluence.get_or_insert_with(Default::default);
            fill(&mut cfg.base_url, confluence.0);
            fill(&mut cfg.email, confluence.1);
            fill(&mut cfg.api_token, confluence.2);
        }

        let sharepoint = [
            get("SHAREPOINT_TENANT_ID"),
            get("SHAREPOINT_CLIENT_ID"),
            get("SHAREPOINT_CLIENT_SECRET"),
            get("SHAREPOINT_SITE_URL"),
        ];
        if sharepoint.iter().any(Option::is_some) {
            let [tenant, client, secret, site] = sharepoint;
            let cfg = self.sources.sharepoint.get_or_insert_with(Default::default);
            fill(&mut cfg.tenant_id, tenant);
            fill(&mut cfg.client_id, client);
            fill(&mut cfg.client_secret, secret);
            fill(&mut cfg.site_url, site);
        }

        if let Some(path) = get("LOCAL_DOCS_PATH") {
            let cfg = self.sources.local_files.get_or_insert_with(Default::default);
            if cfg.root.is_none() {
                cfg.root = Some(PathBuf::from(path));
            }
        }

        self.clear_blank_credentials();
    }

    fn clear_blank_credentials(&mut self) {
        let blank = |v: &mut Option<String>| {
            if v.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *v = None;
            }
        };
        blank(&mut self.llm.api_key);
        blank(&mut self.bot.app_id);
        blank(&mut self.bot.app_password);
        if let Some(c) = self.sources.confluence.as_mut() {
            blank(&mut c.base_url);
            blank(&mut c.email);
            blank(&mut c.api_token);
        }
        if let Some(s) = self.sources.sharepoint.as_mut() {
            blank(&mut s.tenant_id);
            blank(&mut s.client_id);
            blank(&mut s.client_secret);
            blank(&mut s.site_url);
        }
    }

    /// Check value ranges. Credentials are not checked here; a missing LLM
    /// key is reported when the chat client is constructed.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.per_source_limit == 0 {
            bail!("retrieval.per_source_limit must be >= 1");
        }
        if r.max_context_results == 0 {
            bail!("retrieval.max_context_results must be >= 1");
        }
        if r.excerpt_chars == 0 {
            bail!("retrieval.excerpt_chars must be > 0");
        }
        if r.context_char_budget == 0 {
            bail!("retrieval.context_char_budget must be > 0");
        }
        if r.display_sources == 0 {
            bail!("retrieval.display_sources must be >= 1");
        }
        if r.query_timeout_secs == 0 {
            bail!("retrieval.query_timeout_secs must be > 0");
        }

        let s = &self.scoring;
        for (key, value) in [
            ("scoring.base", s.base),
            ("scoring.per_result", s.per_result),
            ("scoring.result_cap", s.result_cap),
            ("scoring.context_cap", s.context_cap),
            ("scoring.cap", s.cap),
            ("scoring.degraded_confidence", s.degraded_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be in [0.0, 1.0]", key);
            }
        }
        if s.context_divisor <= 0.0 {
            bail!("scoring.context_divisor must be > 0");
        }

        let k = &self.ranking;
        if [k.title_weight, k.body_weight, k.intent_weight, k.recency_weight]
            .iter()
            .any(|w| *w < 0.0)
        {
            bail!("ranking weights must be >= 0");
        }
        if k.recency_horizon_days <= 0 {
            bail!("ranking.recency_horizon_days must be > 0");
        }

        if self.cache.enabled && (self.cache.ttl_secs == 0 || self.cache.max_entries == 0) {
            bail!("cache.ttl_secs and cache.max_entries must be > 0 when the cache is enabled");
        }

        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be > 0");
        }

        Ok(())
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, |s| s.trim().is_empty()) {
        if let Some(v) = value {
            *slot = Some(v);
        }
    }
}

/// Load configuration from `path` (if it exists), overlay the process
/// environment, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    dotenvy::dotenv().ok();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        Config::minimal()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.retrieval.max_context_results, 5);
        assert_eq!(config.retrieval.excerpt_chars, 800);
        assert_eq!(config.retrieval.display_sources, 3);
        assert!((config.scoring.cap - 0.95).abs() < 1e-9);
        assert!(config.sources.confluence.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn env_enables_sources() {
        let mut config = Config::minimal();
        config.apply_env(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("CONFLUENCE_CLOUD_URL", "https://acme.atlassian.net/wiki"),
            ("CONFLUENCE_EMAIL", "bot@acme.com"),
            ("CONFLUENCE_API_TOKEN", "token"),
            ("SHAREPOINT_TENANT_ID", "tenant"),
            ("LOCAL_DOCS_PATH", "/srv/docs"),
        ]));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        let confluence = config.sources.confluence.as_ref().unwrap();
        assert_eq!(confluence.email.as_deref(), Some("bot@acme.com"));
        assert_eq!(confluence.api_token.as_deref(), Some("token"));
        let sp = config.sources.sharepoint.as_ref().unwrap();
        assert_eq!(sp.tenant_id.as_deref(), Some("tenant"));
        assert!(sp.client_secret.is_none());
        assert_eq!(
            config.sources.local_files.as_ref().unwrap().root,
            Some(PathBuf::from("/srv/docs"))
        );
    }

    #[test]
    fn file_values_win_over_env() {
        let mut config: Config = toml::from_str(
            r#"
[llm]
api_key = "from-file"

[sources.confluence]
base_url = "https://file.example"
"#,
        )
        .unwrap();
        config.apply_env(env(&[
            ("OPENAI_API_KEY", "from-env"),
            ("CONFLUENCE_CLOUD_URL", "https://env.example"),
        ]));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
        assert_eq!(
            config.sources.confluence.unwrap().base_url.as_deref(),
            Some("https://file.example")
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut config = Config::minimal();
        config.apply_env(env(&[("OPENAI_API_KEY", "   "), ("CONFLUENCE_EMAIL", "")]));
        assert!(config.llm.api_key.is_none());
        assert!(config.sources.confluence.is_none());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut config = Config::minimal();
        config.scoring.cap = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::minimal();
        config.retrieval.excerpt_chars = 0;
        assert!(config.validate().is_err());

        let mut config = Config::minimal();
        config.cache.enabled = true;
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(include_str!("../config/navo.example.toml")).unwrap();
        config.validate().unwrap();
        assert!(config.cache.enabled);
        assert_eq!(
            config.sources.local_files.unwrap().exclude_globs,
            vec!["**/drafts/**".to_string()]
        );
    }

    #[test]
    fn api_base_override() {
        let mut config = Config::minimal();
        config.apply_env(env(&[("OPENAI_API_BASE", "https://gpt.internal/v1")]));
        assert_eq!(config.llm.base_url, "https://gpt.internal/v1");
    }
}
