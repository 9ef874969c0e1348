//! # NAVO
//!
//! A Microsoft Teams knowledge bot. A question from Teams (or the `/query`
//! API) is searched across Confluence, SharePoint, and a local docs folder
//! concurrently, the best snippets go to an OpenAI-compatible chat model, and
//! the answer comes back as an adaptive card listing its sources.
//!
//! ## Architecture
//!
//! ```text
//!  Teams ──▶ /api/messages ─┐
//!                           ▼
//!  HTTP  ──▶ /query ──▶ QueryProcessor ──▶ ChatModel (chat/completions)
//!                           │
//!             ┌─────────────┼─────────────┐
//!             ▼             ▼             ▼
//!        Confluence    SharePoint     local files
//!          (CQL)         (Graph)      (walk+grep)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! export CONFLUENCE_CLOUD_URL=https://acme.atlassian.net/wiki
//! export CONFLUENCE_EMAIL=bot@acme.com CONFLUENCE_API_TOKEN=...
//! navo sources
//! navo ask "how do I deploy the gateway?"
//! navo serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Query, result, and answer types |
//! | [`error`] | Typed errors for sources, tokens, and the chat API |
//! | [`traits`] | `SourceClient` / `ChatModel` seams and the source registry |
//! | [`connector_confluence`] | Confluence Cloud search |
//! | [`connector_sharepoint`] | SharePoint search via Microsoft Graph |
//! | [`connector_fs`] | Local documentation folder |
//! | [`oauth`] | Client-credentials token cache |
//! | [`llm`] | OpenAI-compatible chat client |
//! | [`prompt`] | Context and message assembly |
//! | [`ranking`] | Display relevance and answer confidence |
//! | [`cache`] | TTL answer cache |
//! | [`processor`] | Query orchestration |
//! | [`card`] | Adaptive card rendering |
//! | [`bot`] | Bot Framework activities and reply delivery |
//! | [`server`] | HTTP server |
//! | [`sources`] | Source status listing |
//! | [`text`] | Truncation, markup stripping, tokenizing |

pub mod bot;
pub mod cache;
pub mod card;
pub mod config;
pub mod connector_confluence;
pub mod connector_fs;
pub mod connector_sharepoint;
pub mod error;
pub mod llm;
pub mod models;
pub mod oauth;
pub mod processor;
pub mod prompt;
pub mod ranking;
pub mod server;
pub mod sources;
pub mod text;
pub mod traits;
