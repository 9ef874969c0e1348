//! # NAVO CLI (`navo`)
//!
//! Runs the Teams bot server, answers one-off questions from the terminal,
//! and reports which knowledge sources are configured.
//!
//! ## Usage
//!
//! ```bash
//! navo --config ./config/navo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `navo serve` | Start the HTTP server (`/api/messages`, `/query`, `/health`) |
//! | `navo ask "<question>"` | Run one question through the pipeline and print the answer |
//! | `navo sources` | List knowledge sources and whether they are enabled |
//!
//! ## Examples
//!
//! ```bash
//! # Check which sources the environment enables
//! navo sources
//!
//! # Ask a question without Teams
//! navo ask "where is the API documentation?"
//!
//! # Machine-readable answer
//! navo ask "how do I rotate the staging certs" --json
//!
//! # Serve the bot endpoint
//! RUST_LOG=navo=debug navo serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use navo::card::{confidence_label, format_search_time};
use navo::config::load_config;
use navo::models::Query;
use navo::processor::QueryProcessor;
use navo::server::run_server;
use navo::sources::list_sources;

/// NAVO: answers questions from Confluence, SharePoint, and local docs.
///
/// Credentials come from the environment (or `.env`); the config file holds
/// tuning knobs and is optional.
#[derive(Parser)]
#[command(
    name = "navo",
    about = "NAVO: a Teams knowledge bot over Confluence, SharePoint and local docs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "./config/navo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Ask one question and print the answer.
    Ask {
        /// The question.
        query: String,

        /// User id used for caching.
        #[arg(long, default_value = "cli")]
        user: String,

        /// Print the answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List knowledge sources and their status.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("navo=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => run_server(&config).await?,
        Commands::Ask { query, user, json } => {
            let processor = QueryProcessor::from_config(&config)?;
            let answer = processor.process(&Query::new(query, user)).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}\n", answer.answer);
                for (i, source) in answer.sources.iter().enumerate() {
                    println!(
                        "{}. {} [{}] {:.2}",
                        i + 1,
                        source.result.title,
                        source.result.source_name,
                        source.relevance_score
                    );
                    if !source.result.url.is_empty() {
                        println!("   {}", source.result.url);
                    }
                }
                println!(
                    "\nconfidence: {} ({:.0}%)  time: {}",
                    confidence_label(answer.confidence),
                    answer.confidence * 100.0,
                    format_search_time(answer.processing_time)
                );
            }
        }
        Commands::Sources => list_sources(&config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn about_is_plain_ascii() {
        let about = Cli::command().get_about().map(|a| a.to_string()).unwrap();
        assert!(about.starts_with("NAVO: "));
        assert!(about.is_ascii());
    }

    #[test]
    fn ask_defaults_to_cli_user() {
        let cli = Cli::parse_from(["navo", "ask", "how do I deploy?"]);
        match cli.command {
            Commands::Ask { query, user, json } => {
                assert_eq!(query, "how do I deploy?");
                assert_eq!(user, "cli");
                assert!(!json);
            }
            _ => panic!("expected ask"),
        }
    }
}
