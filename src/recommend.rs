//! Request orchestration.
//!
//! One call to [`Recommender::recommend`] walks
//! `FETCH_EVIDENCE -> TRY_PROVIDERS -> (SUCCESS | LOCAL_FALLBACK) -> ASSEMBLE`.
//! Evidence and provider failures are recovered here; only invalid input and
//! corpus/embedding failures reach the caller.

use std::sync::Arc;

use tracing::Instrument;

use crate::aggregate::{aggregate, Aggregation};
use crate::catalog::TechCatalog;
use crate::llm::chain::{ChainOutcome, ExternalStack, ProviderChain};
use crate::models::{RecommendRequest, Recommendation, SimilarProject};
use crate::search::github::EvidenceSource;
use crate::search::vector::CorpusIndex;

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 2_000;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_EVIDENCE_LIMIT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("failed to query the project corpus")]
    Corpus(#[source] anyhow::Error),
}

/// Where the stack came from.
enum StackSource {
    External(ExternalStack),
    Local {
        aggregation: Aggregation,
        matches: Vec<SimilarProject>,
    },
}

pub struct Recommender {
    index: Arc<CorpusIndex>,
    catalog: Arc<TechCatalog>,
    chain: ProviderChain,
    evidence: Arc<dyn EvidenceSource>,
    top_n: usize,
    evidence_limit: usize,
}

impl Recommender {
    pub fn new(
        index: Arc<CorpusIndex>,
        catalog: Arc<TechCatalog>,
        chain: ProviderChain,
        evidence: Arc<dyn EvidenceSource>,
    ) -> Self {
        Self {
            index,
            catalog,
            chain,
            evidence,
            top_n: DEFAULT_TOP_N,
            evidence_limit: DEFAULT_EVIDENCE_LIMIT,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_evidence_limit(mut self, limit: usize) -> Self {
        self.evidence_limit = limit;
        self
    }

    pub fn corpus_len(&self) -> usize {
        self.index.len()
    }

    pub async fn recommend(
        &self,
        request: &RecommendRequest,
    ) -> Result<Recommendation, RecommendError> {
        validate(request)?;

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("recommend", %request_id);
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &RecommendRequest) -> Result<Recommendation, RecommendError> {
        let description = request.description.trim();

        let evidence = self.evidence.search(description, self.evidence_limit).await;
        tracing::debug!("Fetched {} evidence projects", evidence.len());

        let outcome = self
            .chain
            .generate(description, &request.requirements, &request.constraints)
            .await;
        let source = match outcome {
            ChainOutcome::Generated(stack) => StackSource::External(stack),
            ChainOutcome::Exhausted(attempts) => {
                tracing::info!(
                    "All {} LLM providers failed, aggregating from the local corpus",
                    attempts.len()
                );
                self.local_fallback(request).await?
            }
        };

        Ok(assemble(source, evidence))
    }

    async fn local_fallback(&self, request: &RecommendRequest) -> Result<StackSource, RecommendError> {
        let matches: Vec<SimilarProject> = self
            .index
            .query(request.description.trim(), self.top_n)
            .await
            .map_err(RecommendError::Corpus)?
            .iter()
            .map(|hit| SimilarProject::from_record(&hit.record, hit.score))
            .collect();

        let aggregation = aggregate(&self.catalog, &matches, &request.constraints);
        tracing::info!(
            matches = matches.len(),
            confidence = aggregation.confidence,
            "Aggregated local stack"
        );
        Ok(StackSource::Local {
            aggregation,
            matches,
        })
    }
}

fn validate(request: &RecommendRequest) -> Result<(), RecommendError> {
    let description = request.description.trim();
    if description.is_empty() {
        return Err(RecommendError::InvalidInput(
            "description must not be empty".to_string(),
        ));
    }
    let chars = description.chars().count();
    if chars > MAX_DESCRIPTION_CHARS {
        return Err(RecommendError::InvalidInput(format!(
            "description is {chars} characters, the limit is {MAX_DESCRIPTION_CHARS}"
        )));
    }
    Ok(())
}

fn assemble(source: StackSource, evidence: Vec<SimilarProject>) -> Recommendation {
    match source {
        // No alternatives on this path.
        StackSource::External(stack) => Recommendation {
            primary_tech_stack: stack.primary_tech_stack,
            alternatives: Default::default(),
            explanation: stack.explanation,
            detailed_explanation: None,
            confidence_level: stack.confidence,
            similar_projects: evidence,
        },
        StackSource::Local {
            aggregation,
            matches,
        } => Recommendation {
            primary_tech_stack: aggregation.primary_stack,
            alternatives: aggregation.alternatives,
            explanation: aggregation.explanation,
            detailed_explanation: Some(aggregation.detailed_explanation),
            confidence_level: aggregation.confidence,
            similar_projects: if evidence.is_empty() { matches } else { evidence },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use crate::llm::embeddings::HashingEmbedder;
    use crate::llm::providers::{CompletionProvider, ProviderError};
    use crate::models::ProjectRecord;

    struct NoEvidence;

    #[async_trait]
    impl EvidenceSource for NoEvidence {
        async fn search(&self, _description: &str, _limit: usize) -> Vec<SimilarProject> {
            Vec::new()
        }
    }

    struct Failing;

    #[async_trait]
    impl CompletionProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn confidence(&self) -> f32 {
            0.8
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            Err(ProviderError::MissingCredential)
        }
    }

    fn record(name: &str, description: &str, frontend: &str, backend: &str) -> ProjectRecord {
        let mut by_cat = BTreeMap::new();
        by_cat.insert("frontend".to_string(), vec![frontend.to_string()]);
        by_cat.insert("backend".to_string(), vec![backend.to_string()]);
        ProjectRecord {
            name: name.to_string(),
            description: description.to_string(),
            technologies_by_category: by_cat,
        }
    }

    async fn recommender(records: Vec<ProjectRecord>) -> Recommender {
        let index = CorpusIndex::build(records, Arc::new(HashingEmbedder::new(64)))
            .await
            .unwrap();
        Recommender::new(
            Arc::new(index),
            Arc::new(TechCatalog::builtin()),
            ProviderChain::new(vec![Arc::new(Failing)]),
            Arc::new(NoEvidence),
        )
    }

    #[tokio::test]
    async fn test_rejects_blank_and_oversized_descriptions() {
        let rec = recommender(Vec::new()).await;
        for description in ["", "   \n"] {
            let err = rec
                .recommend(&RecommendRequest::new(description))
                .await
                .unwrap_err();
            assert!(matches!(err, RecommendError::InvalidInput(_)));
        }
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(matches!(
            rec.recommend(&RecommendRequest::new(long)).await,
            Err(RecommendError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_local_fallback_uses_corpus_matches() {
        let rec = recommender(vec![
            record("chat-a", "realtime chat application", "react", "node.js"),
            record("chat-b", "chat application with rooms", "react", "django"),
        ])
        .await;

        let result = rec
            .recommend(&RecommendRequest::new("a chat application"))
            .await
            .unwrap();
        let frontend = result
            .primary_tech_stack
            .iter()
            .find(|item| item.category == "frontend")
            .unwrap();
        assert_eq!(frontend.name, "react");
        assert_eq!(result.similar_projects.len(), 2);
        assert!(result.detailed_explanation.is_some());
        // 0.6 * 2/5 + 0.4 * 2/10
        assert_eq!(result.confidence_level, 0.32);
    }

    #[tokio::test]
    async fn test_empty_corpus_yields_empty_stack() {
        let rec = recommender(Vec::new()).await;
        let result = rec
            .recommend(&RecommendRequest::new("an inventory tracker"))
            .await
            .unwrap();
        assert!(result.primary_tech_stack.is_empty());
        assert!(result.alternatives.is_empty());
        assert_eq!(result.confidence_level, 0.0);
    }

    #[test]
    fn test_assemble_external_has_no_alternatives() {
        let stack = ExternalStack {
            provider: "openai".to_string(),
            primary_tech_stack: vec![crate::models::TechStackItem::new("Svelte", "frontend")],
            explanation: "Small.".to_string(),
            confidence: 0.8,
        };
        let evidence = vec![SimilarProject::from_record(
            &record("x", "y", "vue", "rails"),
            0.5,
        )];
        let result = assemble(StackSource::External(stack), evidence.clone());
        assert!(result.alternatives.is_empty());
        assert!(result.detailed_explanation.is_none());
        assert_eq!(result.confidence_level, 0.8);
        assert_eq!(result.similar_projects, evidence);
    }
}
