//! Adaptive card rendering for Teams replies.
//!
//! Everything here is a pure function of its inputs; the bot layer wraps the
//! returned JSON in an attachment.

use serde_json::{json, Value};

use crate::models::{Answer, RankedResult};
use crate::text::ellipsize;

pub const CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Sources shown on one card.
pub const MAX_CARD_SOURCES: usize = 3;

const EXCERPT_CHARS: usize = 150;

const SOURCES_FACT: &str = "Sources Found:";

pub const WELCOME_TEXT: &str = "Hi! I'm NAVO, your knowledge discovery assistant.\n\n\
Ask me questions about your documentation and I'll search Confluence, SharePoint, \
and local docs to find the answers.\n\n\
Try asking: *Where's the API documentation?*";

/// `High` at 0.8 and above, `Medium` at 0.6 and above, otherwise `Low`.
pub fn confidence_label(confidence: f64) -> &'static str {
    if confidence >= 0.8 {
        "High"
    } else if confidence >= 0.6 {
        "Medium"
    } else {
        "Low"
    }
}

fn confidence_color(confidence: f64) -> &'static str {
    match confidence_label(confidence) {
        "High" => "good",
        "Medium" => "warning",
        _ => "attention",
    }
}

pub fn format_search_time(seconds: f64) -> String {
    if seconds < 1.0 {
        "< 1 second".to_string()
    } else {
        format!("{:.1} seconds", seconds)
    }
}

fn source_block(source: &RankedResult) -> Value {
    let r = &source.result;
    let title = if r.title.trim().is_empty() {
        "Untitled"
    } else {
        r.title.as_str()
    };
    let excerpt = if r.content.trim().is_empty() {
        "No preview available".to_string()
    } else {
        ellipsize(r.content.trim(), EXCERPT_CHARS)
    };

    let mut right = Vec::new();
    if !r.url.is_empty() {
        right.push(json!({
            "type": "ActionSet",
            "actions": [{ "type": "Action.OpenUrl", "title": "View", "url": r.url }]
        }));
    }

    json!({
        "type": "ColumnSet",
        "columns": [
            {
                "type": "Column",
                "width": "stretch",
                "items": [
                    { "type": "TextBlock", "text": format!("**{}**", title), "wrap": true },
                    { "type": "TextBlock", "text": excerpt, "wrap": true, "isSubtle": true, "size": "small" },
                    { "type": "TextBlock", "text": r.source_name, "isSubtle": true, "size": "small" }
                ]
            },
            { "type": "Column", "width": "auto", "items": right }
        ]
    })
}

/// Render an answer to a Teams adaptive card (schema 1.4).
pub fn answer_card(query: &str, answer: &Answer) -> Value {
    let shown: Vec<&RankedResult> = answer.sources.iter().take(MAX_CARD_SOURCES).collect();

    let mut body = vec![
        json!({
            "type": "Container",
            "style": "emphasis",
            "items": [
                { "type": "TextBlock", "text": "NAVO Knowledge Discovery", "weight": "bolder", "size": "medium" },
                { "type": "TextBlock", "text": format!("*{}*", query), "isSubtle": true, "wrap": true }
            ]
        }),
        json!({
            "type": "Container",
            "items": [
                { "type": "TextBlock", "text": "**Summary**", "weight": "bolder" },
                { "type": "TextBlock", "text": answer.answer, "wrap": true }
            ]
        }),
    ];

    if !shown.is_empty() {
        let mut items = vec![json!({ "type": "TextBlock", "text": "**Sources**", "weight": "bolder" })];
        items.extend(shown.iter().map(|s| source_block(s)));
        body.push(json!({ "type": "Container", "items": items }));
    }

    body.push(json!({
        "type": "Container",
        "items": [{
            "type": "FactSet",
            "facts": [
                { "title": SOURCES_FACT, "value": shown.len().to_string() },
                {
                    "title": "Confidence:",
                    "value": format!("{} ({:.0}%)", confidence_label(answer.confidence), answer.confidence * 100.0)
                },
                { "title": "Search Time:", "value": format_search_time(answer.processing_time) }
            ]
        }, {
            "type": "TextBlock",
            "text": "\u{25CF}",
            "color": confidence_color(answer.confidence),
            "size": "small"
        }]
    }));

    json!({
        "type": "AdaptiveCard",
        "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
        "version": "1.4",
        "body": body,
        "actions": [
            {
                "type": "Action.Submit",
                "title": "\u{1F44D} Helpful",
                "data": { "action": "feedback", "type": "positive", "query": query }
            },
            {
                "type": "Action.Submit",
                "title": "\u{1F44E} Not Helpful",
                "data": { "action": "feedback", "type": "negative", "query": query }
            },
            {
                "type": "Action.Submit",
                "title": "Ask a follow-up",
                "data": { "action": "follow_up", "query": query }
            },
            {
                "type": "Action.Submit",
                "title": "Copy answer",
                "data": { "action": "copy", "answer": answer.answer }
            }
        ]
    })
}

/// Card shown when a request cannot be processed.
pub fn error_card(message: &str) -> Value {
    json!({
        "type": "AdaptiveCard",
        "version": "1.4",
        "body": [{
            "type": "Container",
            "style": "attention",
            "items": [
                { "type": "TextBlock", "text": "\u{26A0}\u{FE0F} Error", "weight": "bolder", "size": "medium" },
                { "type": "TextBlock", "text": message, "wrap": true }
            ]
        }]
    })
}

/// Wrap card content in a Bot Framework attachment.
pub fn attachment(card: Value) -> Value {
    json!({ "contentType": CARD_CONTENT_TYPE, "content": card })
}

/// Read back the `Sources Found` fact of a card built by [`answer_card`].
pub fn declared_source_count(card: &Value) -> Option<usize> {
    card["body"]
        .as_array()?
        .iter()
        .filter_map(|block| block["items"].as_array())
        .flatten()
        .filter_map(|item| item["facts"].as_array())
        .flatten()
        .find(|fact| fact["title"] == SOURCES_FACT)
        .and_then(|fact| fact["value"].as_str())
        .and_then(|v| v.parse().ok())
}
