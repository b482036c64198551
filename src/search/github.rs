//! Live repository search used as supporting evidence.
//!
//! Every failure (network, auth, rate limit, bad payload) degrades to an
//! empty result; a rate-limited response is never retried within a request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::catalog::{canonical_name, TechCatalog};
use crate::config::SearchConfig;
use crate::models::SimilarProject;

const MAX_KEYWORDS: usize = 5;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "to", "of", "a", "in", "on", "is", "it", "as", "by", "at", "an",
    "be", "or", "from", "that", "this", "are", "was", "but", "if", "then", "so", "should", "can",
    "will", "has", "have", "had", "do", "does", "did", "which", "who", "what", "when", "where",
    "why", "how", "all", "any", "each", "other", "their", "more", "most", "such", "no", "nor",
    "not", "only", "own", "same", "than", "too", "very", "s", "t", "just", "now",
];

/// A source of "similar project" evidence independent of the local corpus.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Never fails; problems are logged and yield an empty list.
    async fn search(&self, description: &str, limit: usize) -> Vec<SimilarProject>;
}

/// Up to five distinct lower-cased non-stopword words, in order of appearance.
pub fn extract_keywords(description: &str) -> Vec<String> {
    static WORD: OnceLock<Regex> = OnceLock::new();
    let word = WORD.get_or_init(|| Regex::new(r"\b\w+\b").expect("valid regex"));

    let lower = description.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();
    for m in word.find_iter(&lower) {
        let w = m.as_str();
        if STOPWORDS.contains(&w) || keywords.iter().any(|k| k == w) {
            continue;
        }
        keywords.push(w.to_string());
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

/// Rate-limit signal parsed from response metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub reset_at: Option<DateTime<Utc>>,
    pub retry_after_secs: Option<u64>,
}

/// Detect a rate-limit response from its status and headers.
pub fn detect_rate_limit(status: StatusCode, headers: &HeaderMap) -> Option<RateLimited> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    let remaining = header_u64("x-ratelimit-remaining");
    let retry_after_secs = header_u64("retry-after");
    if remaining != Some(0) && retry_after_secs.is_none() && status != StatusCode::TOO_MANY_REQUESTS
    {
        // plain 403: bad token or blocked, not throttling
        return None;
    }

    let reset_at = header_u64("x-ratelimit-reset")
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Some(RateLimited {
        reset_at,
        retry_after_secs,
    })
}

// ─── GitHub ──────────────────────────────────────────────

pub struct GithubSearch {
    client: reqwest::Client,
    config: SearchConfig,
    catalog: Arc<TechCatalog>,
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Option<Vec<RepoItem>>,
}

#[derive(Deserialize)]
struct RepoItem {
    name: String,
    description: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

impl GithubSearch {
    pub fn new(client: reqwest::Client, config: SearchConfig, catalog: Arc<TechCatalog>) -> Self {
        Self {
            client,
            config,
            catalog,
        }
    }

    async fn search_repositories(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<SimilarProject>> {
        let url = format!(
            "{}/search/repositories",
            self.config.base_url.trim_end_matches('/')
        );
        let per_page = limit.min(100).to_string();
        let query = keywords.join(" ");

        let mut req = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "stacksense")
            .query(&[
                ("q", query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = self.config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            req = req.header("Authorization", format!("Bearer {}", token.trim()));
        }

        let resp = req.send().await.context("Failed to call GitHub search API")?;

        if let Some(limited) = detect_rate_limit(resp.status(), resp.headers()) {
            let reset = limited
                .reset_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            anyhow::bail!(
                "GitHub rate limit exceeded (resets at {reset}, retry after {:?}s)",
                limited.retry_after_secs
            );
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub search API returned {status}: {body}");
        }

        let body: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse GitHub search response")?;
        let items = body
            .items
            .context("GitHub search response has no `items`")?;

        Ok(items
            .into_iter()
            .filter_map(|item| repo_to_project(item, &self.catalog))
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl EvidenceSource for GithubSearch {
    async fn search(&self, description: &str, limit: usize) -> Vec<SimilarProject> {
        if limit == 0 {
            return Vec::new();
        }
        let keywords = extract_keywords(description);
        if keywords.is_empty() {
            tracing::debug!("No search keywords in description, skipping GitHub search");
            return Vec::new();
        }

        match self.search_repositories(&keywords, limit).await {
            Ok(projects) => {
                tracing::info!(
                    "GitHub search for {:?} returned {} projects",
                    keywords,
                    projects.len()
                );
                projects
            }
            Err(e) => {
                tracing::warn!("GitHub search failed: {e:#}");
                Vec::new()
            }
        }
    }
}

/// Convert a search hit into a project; repositories without a description
/// carry no usable evidence and are dropped.
fn repo_to_project(item: RepoItem, catalog: &TechCatalog) -> Option<SimilarProject> {
    let description = item.description.unwrap_or_default().trim().to_string();
    if description.is_empty() || item.name.trim().is_empty() {
        return None;
    }

    let mut technologies: Vec<String> = Vec::new();
    for raw in item.language.iter().chain(item.topics.iter()) {
        let tech = canonical_name(raw);
        if !tech.is_empty() && !technologies.contains(&tech) {
            technologies.push(tech);
        }
    }

    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for tech in &technologies {
        if let Some(category) = catalog.classify(tech) {
            by_category
                .entry(category.to_string())
                .or_default()
                .push(tech.clone());
        }
    }

    Some(SimilarProject {
        name: item.name,
        description,
        technologies,
        technologies_by_category: by_category,
        similarity_score: None,
        url: item.html_url,
        stars: Some(item.stargazers_count),
    })
}
