//! Core data models used throughout NAVO.
//!
//! These types represent the query, search hits, and final answer that flow
//! through one pass of the question-answering pipeline. None of them outlive
//! a single query except through the optional answer cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user question as received at the bot boundary.
///
/// Immutable once created. `filters` is a sorted map so it hashes the same
/// way regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Query {
    /// Create a query stamped with the current time and no filters.
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
            filters: BTreeMap::new(),
        }
    }
}

/// Unprocessed search hit returned by a source client.
///
/// Vendor fields that are missing are defaulted once, by the client that
/// produced the hit, so downstream code never re-checks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub title: String,
    pub url: String,
    pub content: String,
    /// Display name of the producing source (e.g. `"Confluence"`).
    pub source_name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

/// A [`RawResult`] annotated with its display relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    #[serde(flatten)]
    pub result: RawResult,
    pub relevance_score: f64,
}

/// The final structured reply to one user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// At most `retrieval.display_sources` entries, best first.
    pub sources: Vec<RankedResult>,
    /// Heuristic reliability in `[0, 1]`; not a calibrated probability.
    pub confidence: f64,
    /// Wall-clock seconds spent producing this answer.
    pub processing_time: f64,
}

impl Answer {
    /// An answer with no sources and zero confidence.
    pub fn canned(message: &str, processing_time: f64) -> Self {
        Self {
            answer: message.to_string(),
            sources: Vec::new(),
            confidence: 0.0,
            processing_time,
        }
    }
}
