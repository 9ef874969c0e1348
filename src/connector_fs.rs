//! Local documentation directory source.
//!
//! Walks `root` on every query and returns files whose body or file name
//! contains the query text (case-insensitive). Meant for small doc trees
//! checked out next to the bot; there is no index.
//!
//! ```toml
//! [sources.local_files]
//! root = "./docs"
//! include_globs = ["**/*.md", "**/*.txt", "**/*.rst"]
//! exclude_globs = ["**/drafts/**"]
//! ```
//!
//! `LOCAL_DOCS_PATH` sets `root` when the file does not.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LocalFilesConfig;
use crate::error::SourceError;
use crate::models::RawResult;
use crate::text::truncate_chars;
use crate::traits::{clamp_limit, SourceClient};

const CONTENT_CHARS: usize = 1000;

const SOURCE_NAME: &str = "LocalDocs";

struct Scan {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

/// Keyword search over a local directory of text documents.
pub struct LocalFilesClient {
    scan: Option<std::sync::Arc<Scan>>,
}

impl LocalFilesClient {
    /// Build a client. It is disabled when no root is configured or the root
    /// is not a directory; bad glob patterns are a configuration error.
    pub fn new(config: Option<&LocalFilesConfig>) -> Result<Self> {
        let Some(config) = config else {
            info!("Local files source disabled: no root configured");
            return Ok(Self { scan: None });
        };
        let Some(root) = config.root.as_ref() else {
            info!("Local files source disabled: no root configured");
            return Ok(Self { scan: None });
        };
        if !root.is_dir() {
            warn!(root = %root.display(), "Local files root is not a directory, source disabled");
            return Ok(Self { scan: None });
        }

        let include = build_globset(&config.include_globs)?;
        let mut excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
        excludes.extend(config.exclude_globs.iter().cloned());
        let exclude = build_globset(&excludes)?;

        info!(root = %root.display(), "Local files source enabled");
        Ok(Self {
            scan: Some(std::sync::Arc::new(Scan {
                root: root.clone(),
                include,
                exclude,
                follow_symlinks: config.follow_symlinks,
            })),
        })
    }
}

#[async_trait]
impl SourceClient for LocalFilesClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn description(&self) -> &str {
        "Keyword search over a local documentation directory"
    }

    fn source_type(&self) -> &str {
        "filesystem"
    }

    fn is_enabled(&self) -> bool {
        self.scan.is_some()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, SourceError> {
        let scan = self.scan.clone().ok_or_else(|| SourceError::Disabled {
            source_name: SOURCE_NAME.to_string(),
        })?;
        let needle = query.trim().to_lowercase();
        let limit = clamp_limit(limit);

        let results = tokio::task::spawn_blocking(move || search_tree(&scan, &needle, limit))
            .await
            .map_err(|e| SourceError::Task(e.to_string()))?;

        debug!(hits = results.len(), "Local files search complete");
        Ok(results)
    }
}

fn search_tree(scan: &Scan, needle: &str, limit: usize) -> Vec<RawResult> {
    let candidates = collect_candidates(scan);
    match_candidates(&candidates, needle, limit)
}

/// Files under the root that pass the include/exclude globs, sorted by
/// relative path.
fn collect_candidates(scan: &Scan) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(&scan.root).follow_links(scan.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(&scan.root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if scan.exclude.is_match(&rel_str) || !scan.include.is_match(&rel_str) {
            continue;
        }
        candidates.push((rel_str, path.to_path_buf()));
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates.into_iter().map(|(_, path)| path).collect()
}

/// Match candidates in order until `limit` hits. Files that cannot be read
/// or stat'ed are skipped.
fn match_candidates(candidates: &[PathBuf], needle: &str, limit: usize) -> Vec<RawResult> {
    candidates
        .iter()
        .filter_map(|path| match_file(path, needle))
        .take(limit)
        .collect()
}

fn match_file(path: &Path, needle: &str) -> Option<RawResult> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    };
    let body = String::from_utf8_lossy(&bytes);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let hit = needle.is_empty()
        || body.to_lowercase().contains(needle)
        || file_name.to_lowercase().contains(needle);
    if !hit {
        return None;
    }

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping file that vanished");
            return None;
        }
    };
    let last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    Some(RawResult {
        title: file_name,
        url: format!("file://{}", absolute.display()),
        content: truncate_chars(&body, CONTENT_CHARS).to_string(),
        source_name: SOURCE_NAME.to_string(),
        last_modified,
        author: None,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(root: &Path) -> LocalFilesClient {
        let config = LocalFilesConfig {
            root: Some(root.to_path_buf()),
            ..Default::default()
        };
        LocalFilesClient::new(Some(&config)).unwrap()
    }

    #[tokio::test]
    async fn matches_body_and_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deploy.md"), "Run helm upgrade to deploy.").unwrap();
        std::fs::write(dir.path().join("helm-notes.txt"), "chart values").unwrap();
        std::fs::write(dir.path().join("other.md"), "nothing here").unwrap();
        std::fs::write(dir.path().join("helm.png"), "binary").unwrap();

        let client = client_for(dir.path());
        let results = client.search("HELM", 10).await.unwrap();
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["deploy.md", "helm-notes.txt"]);
        assert!(results[0].url.starts_with("file://"));
        assert_eq!(results[0].source_name, "LocalDocs");
        assert!(results[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn stops_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("doc{}.md", i)), "vpn guide").unwrap();
        }
        let results = client_for(dir.path()).search("vpn", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn caps_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.md"), "a".repeat(3000)).unwrap();
        let results = client_for(dir.path()).search("aaa", 10).await.unwrap();
        assert_eq!(results[0].content.len(), CONTENT_CHARS);
    }

    #[test]
    fn files_removed_after_the_walk_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a-vpn.md");
        let gone = dir.path().join("b-vpn.md");
        let last = dir.path().join("c-vpn.md");
        for path in [&first, &gone, &last] {
            std::fs::write(path, "vpn setup").unwrap();
        }
        std::fs::remove_file(&gone).unwrap();

        let results = match_candidates(&[first, gone, last], "vpn", 10);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a-vpn.md", "c-vpn.md"]);
    }

    #[test]
    fn missing_root_disables() {
        let config = LocalFilesConfig {
            root: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(!LocalFilesClient::new(Some(&config)).unwrap().is_enabled());
        assert!(!LocalFilesClient::new(None).unwrap().is_enabled());
    }
}
