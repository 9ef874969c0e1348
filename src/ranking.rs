//! Display ranking and the answer-confidence heuristic.
//!
//! Both are fixed-weight linear combinations whose constants live in
//! `[ranking]` and `[scoring]`. Neither is calibrated; they only order results
//! and bucket answers for the card.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::{RankingConfig, ScoringConfig};
use crate::models::{RankedResult, RawResult};
use crate::text::tokenize;

/// What kind of answer the question is after, inferred from its wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    HowTo,
    Troubleshooting,
    Definition,
    General,
}

const TROUBLESHOOTING_CUES: &[&str] = &[
    "error", "errors", "fix", "issue", "issues", "fail", "fails", "failed", "failing", "broken",
    "not working", "crash", "exception",
];
const HOW_TO_CUES: &[&str] = &[
    "how to", "how do", "how can", "steps", "guide", "setup", "set up", "install", "configure",
];
const DEFINITION_CUES: &[&str] = &["what is", "what are", "define", "definition", "explain", "meaning"];

impl QueryIntent {
    /// Title keywords that mark a document as suited to this intent.
    fn title_markers(self) -> &'static [&'static str] {
        match self {
            QueryIntent::HowTo => &[
                "guide", "guides", "tutorial", "how to", "runbook", "setup", "set up",
            ],
            QueryIntent::Troubleshooting => &[
                "troubleshoot",
                "troubleshooting",
                "faq",
                "known issue",
                "known issues",
                "fix",
                "error",
                "errors",
            ],
            QueryIntent::Definition => &["overview", "introduction", "intro", "glossary"],
            QueryIntent::General => &[],
        }
    }
}

/// Lowercase, replace punctuation with spaces, and pad so phrase lookups can
/// match on word boundaries.
fn normalize(s: &str) -> String {
    let words: Vec<String> = s
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    format!(" {} ", words.join(" "))
}

fn has_cue(normalized: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| normalized.contains(&format!(" {} ", cue)))
}

/// Infer the query's intent. Troubleshooting wins over how-to ("how to fix
/// the login error"), which wins over definition.
pub fn infer_intent(query: &str) -> QueryIntent {
    let q = normalize(query);
    if has_cue(&q, TROUBLESHOOTING_CUES) {
        QueryIntent::Troubleshooting
    } else if has_cue(&q, HOW_TO_CUES) {
        QueryIntent::HowTo
    } else if has_cue(&q, DEFINITION_CUES) {
        QueryIntent::Definition
    } else {
        QueryIntent::General
    }
}

/// Fraction of distinct query tokens present in `text`.
pub fn keyword_overlap(query_tokens: &HashSet<String>, text: &str) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let doc: HashSet<String> = tokenize(text).into_iter().collect();
    let hits = query_tokens.iter().filter(|t| doc.contains(*t)).count();
    hits as f64 / query_tokens.len() as f64
}

fn intent_match(intent: QueryIntent, title: &str) -> f64 {
    if has_cue(&normalize(title), intent.title_markers()) {
        1.0
    } else {
        0.0
    }
}

/// `max(0, 1 - age_days / horizon_days)`; unknown dates score 0 and future
/// dates score 1.
pub fn recency_score(
    last_modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    horizon_days: i64,
) -> f64 {
    let Some(modified) = last_modified else {
        return 0.0;
    };
    if horizon_days <= 0 {
        return 0.0;
    }
    let age_days = (now - modified).num_seconds() as f64 / 86_400.0;
    (1.0 - age_days / horizon_days as f64).clamp(0.0, 1.0)
}

/// Weighted display relevance of one result, clamped to `[0, 1]`.
pub fn relevance_score(
    result: &RawResult,
    query_tokens: &HashSet<String>,
    intent: QueryIntent,
    weights: &RankingConfig,
    now: DateTime<Utc>,
) -> f64 {
    let score = weights.title_weight * keyword_overlap(query_tokens, &result.title)
        + weights.body_weight * keyword_overlap(query_tokens, &result.content)
        + weights.intent_weight * intent_match(intent, &result.title)
        + weights.recency_weight
            * recency_score(result.last_modified, now, weights.recency_horizon_days);
    score.clamp(0.0, 1.0)
}

/// Score every result and sort by descending relevance. Ties keep fetch
/// order.
pub fn rank_results(
    query: &str,
    results: &[RawResult],
    weights: &RankingConfig,
    now: DateTime<Utc>,
) -> Vec<RankedResult> {
    let tokens: HashSet<String> = tokenize(query).into_iter().collect();
    let intent = infer_intent(query);

    let mut ranked: Vec<RankedResult> = results
        .iter()
        .map(|r| RankedResult {
            relevance_score: relevance_score(r, &tokens, intent, weights, now),
            result: r.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// Answer confidence:
/// `min(cap, base + min(result_cap, per_result * n) + min(context_cap, len / divisor))`.
pub fn confidence(result_count: usize, context_len: usize, scoring: &ScoringConfig) -> f64 {
    let from_results = (scoring.per_result * result_count as f64).min(scoring.result_cap);
    let from_context = (context_len as f64 / scoring.context_divisor).min(scoring.context_cap);
    (scoring.base + from_results + from_context).clamp(0.0, scoring.cap)
}
