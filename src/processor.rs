//! Query orchestration: fan-out search, prompt, one completion, ranking.
//!
//! # Pipeline
//!
//! ```text
//! Query ─▶ cache? ─▶ enabled sources ─▶ join_all(search) ─▶ flatten
//!                                          (deadline)          │
//!            ┌─────────────────────────────────────────────────┤
//!            ▼                                                 ▼
//!   first N in fetch order ─▶ prompt ─▶ ChatModel     rank all, keep top 3
//!            └──────────────────────────┬─────────────────────┘
//!                                       ▼
//!                                    Answer
//! ```
//!
//! The prompt sees results in fetch order while the answer carries the
//! best-ranked ones, so the two sets can differ.
//!
//! Only construction can fail. Once built, [`QueryProcessor::process`] always
//! returns an [`Answer`]: source failures shrink the result set and a failed
//! completion yields a degraded answer that still lists sources.

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{cache_key, AnswerCache};
use crate::config::{Config, RankingConfig, RetrievalConfig, ScoringConfig};
use crate::llm::OpenAiChatClient;
use crate::models::{Answer, Query, RawResult};
use crate::prompt::{build_context, build_messages};
use crate::ranking::{confidence, rank_results};
use crate::traits::{ChatModel, SourceClient, SourceRegistry};

pub const NO_SOURCES_MESSAGE: &str = "No knowledge sources are configured. Ask an administrator \
to set up Confluence, SharePoint, or a local documentation folder.";

pub const NO_RESULTS_MESSAGE: &str = "I couldn't find any relevant information in the knowledge \
base. Try rephrasing your question or using different keywords.";

pub const DEGRADED_MESSAGE: &str = "I found documentation but could not summarize it. Please \
check the source links below.";

pub struct QueryProcessor {
    sources: SourceRegistry,
    llm: Arc<dyn ChatModel>,
    cache: Option<AnswerCache>,
    retrieval: RetrievalConfig,
    scoring: ScoringConfig,
    ranking: RankingConfig,
}

impl QueryProcessor {
    /// Assemble a processor from already-built parts.
    pub fn new(config: &Config, sources: SourceRegistry, llm: Arc<dyn ChatModel>) -> Self {
        Self {
            sources,
            llm,
            cache: AnswerCache::from_config(&config.cache),
            retrieval: config.retrieval.clone(),
            scoring: config.scoring.clone(),
            ranking: config.ranking.clone(),
        }
    }

    /// Build the chat client and the built-in sources from configuration.
    ///
    /// Fails when no LLM API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = OpenAiChatClient::new(&config.llm)?;
        let sources = SourceRegistry::from_config(config)?;
        info!(
            model = %config.llm.model,
            sources = sources.len(),
            enabled = sources.enabled_count(),
            "query processor ready"
        );
        Ok(Self::new(config, sources, Arc::new(llm)))
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer TTL, or `None` when caching is off.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.as_ref().map(AnswerCache::ttl)
    }

    /// Drop expired cached answers, returning how many were removed.
    pub fn sweep_cache(&self) -> usize {
        self.cache.as_ref().map_or(0, AnswerCache::sweep_expired)
    }

    /// Answer one query.
    pub async fn process(&self, query: &Query) -> Answer {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_secs_f64();

        let key = self.cache.as_ref().map(|_| cache_key(query));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                debug!(user = %query.user_id, "answer served from cache");
                return hit;
            }
        }

        if self.sources.enabled_count() == 0 {
            warn!("no knowledge sources enabled");
            return Answer::canned(NO_SOURCES_MESSAGE, elapsed());
        }

        let results = self.gather(&query.text).await;
        if results.is_empty() {
            info!(user = %query.user_id, "no results from any source");
            return Answer::canned(NO_RESULTS_MESSAGE, elapsed());
        }

        let context = build_context(&results, &self.retrieval);
        let messages = build_messages(&query.text, &context);

        let mut ranked = rank_results(&query.text, &results, &self.ranking, Utc::now());
        ranked.truncate(self.retrieval.display_sources);

        match self.llm.complete(&messages).await {
            Ok(text) => {
                let answer = Answer {
                    answer: text,
                    sources: ranked,
                    confidence: confidence(results.len(), context.char_len(), &self.scoring),
                    processing_time: elapsed(),
                };
                info!(
                    results = results.len(),
                    context_results = context.included,
                    confidence = answer.confidence,
                    elapsed = answer.processing_time,
                    "query answered"
                );
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    if answer.confidence > 0.0 {
                        cache.insert(key, answer.clone());
                    }
                }
                answer
            }
            Err(e) => {
                error!(error = %e, results = results.len(), "chat completion failed, returning sources only");
                Answer {
                    answer: DEGRADED_MESSAGE.to_string(),
                    sources: ranked,
                    confidence: self.scoring.degraded_confidence,
                    processing_time: elapsed(),
                }
            }
        }
    }

    /// Search every enabled source concurrently and flatten the hits in
    /// registration order.
    ///
    /// A failing source contributes nothing. Sources still running when the
    /// query deadline passes are dropped and also contribute nothing.
    pub async fn gather(&self, text: &str) -> Vec<RawResult> {
        let deadline = self.retrieval.query_timeout();
        let token = CancellationToken::new();
        let watchdog = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                token.cancel();
            })
        };

        let limit = self.retrieval.per_source_limit;
        let searches = self
            .sources
            .enabled()
            .map(|source| search_one(source, text, limit, token.clone()));
        let per_source = join_all(searches).await;
        watchdog.abort();

        per_source.into_iter().flatten().collect()
    }
}

async fn search_one(
    source: &dyn SourceClient,
    text: &str,
    limit: usize,
    token: CancellationToken,
) -> Vec<RawResult> {
    let started = Instant::now();
    tokio::select! {
        outcome = source.search(text, limit) => match outcome {
            Ok(hits) => {
                debug!(
                    source = source.name(),
                    hits = hits.len(),
                    ms = started.elapsed().as_millis() as u64,
                    "search finished"
                );
                hits
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "search failed");
                Vec::new()
            }
        },
        _ = token.cancelled() => {
            warn!(source = source.name(), "search abandoned at query deadline");
            Vec::new()
        }
    }
}
