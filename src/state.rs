use anyhow::Context;
use std::sync::Arc;

use crate::catalog::TechCatalog;
use crate::config::Config;
use crate::corpus;
use crate::llm::chain::ProviderChain;
use crate::llm::{embeddings, providers};
use crate::recommend::Recommender;
use crate::search::github::GithubSearch;
use crate::search::vector::CorpusIndex;

/// Everything a request needs, built once at startup.
pub struct AppState {
    pub recommender: Arc<Recommender>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.vector_dir())?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let catalog = Arc::new(TechCatalog::builtin());

        let records = if config.corpus_path.exists() {
            corpus::load_records(&config.corpus_path, &catalog)?
        } else {
            tracing::warn!(
                "Corpus {} not found, local fallback will have no evidence",
                config.corpus_path.display()
            );
            Vec::new()
        };

        let embedder = embeddings::from_config(&http_client, &config.embedding)?;
        let index = CorpusIndex::open_or_build(records, embedder, &config.vector_dir())
            .await
            .context("Failed to build the corpus index")?;
        tracing::info!("Corpus index ready with {} projects", index.len());

        let providers = providers::from_config(&http_client, &config.providers);
        let evidence = GithubSearch::new(http_client.clone(), config.search.clone(), catalog.clone());

        let recommender = Recommender::new(
            Arc::new(index),
            catalog,
            ProviderChain::new(providers),
            Arc::new(evidence),
        )
        .with_top_n(config.top_n)
        .with_evidence_limit(config.search.limit);

        Ok(Self {
            recommender: Arc::new(recommender),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn offline_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.data_dir = dir.join("data");
        config.corpus_path = dir.join("corpus.json");
        config.embedding.provider = "hashing".to_string();
        config.providers = ProviderConfig::defaults();
        config
    }

    #[tokio::test]
    async fn test_missing_corpus_builds_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(&offline_config(dir.path())).await.unwrap();
        assert_eq!(state.recommender.corpus_len(), 0);
        assert!(dir.path().join("data").join("vectors").is_dir());
    }

    #[tokio::test]
    async fn test_loads_corpus_and_writes_vector_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("corpus.json"),
            r#"[{"name": "shop", "description": "online store", "frontend": ["react"]}]"#,
        )
        .unwrap();
        let config = offline_config(dir.path());
        let state = AppState::new(&config).await.unwrap();
        assert_eq!(state.recommender.corpus_len(), 1);
        assert!(config.vector_dir().join("corpus_vectors.json").exists());
    }

    #[tokio::test]
    async fn test_unknown_embedding_provider_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.embedding.provider = "word2vec".to_string();
        assert!(AppState::new(&config).await.is_err());
    }
}
