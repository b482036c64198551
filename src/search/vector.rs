use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use crate::llm::embeddings::Embedder;
use crate::models::ProjectRecord;

const CACHE_FILE: &str = "corpus_vectors.json";

/// Immutable corpus of reference projects with one embedding per description.
/// Safe to share between any number of concurrent readers.
pub struct CorpusIndex {
    records: Vec<ProjectRecord>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProject {
    pub record: ProjectRecord,
    pub score: f32,
}

/// On-disk form of the embedding cache.
#[derive(Serialize, Deserialize)]
struct CachedVectors {
    fingerprint: String,
    model: String,
    embeddings: Vec<Vec<f32>>,
}

impl CorpusIndex {
    /// Embed every record's description once.
    pub async fn build(records: Vec<ProjectRecord>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let embeddings = embed_records(&records, embedder.as_ref()).await?;
        Ok(Self {
            records,
            embeddings,
            embedder,
        })
    }

    /// Like [`CorpusIndex::build`], but reuses vectors persisted in `cache_dir`
    /// when they were computed by the same model over the same descriptions.
    pub async fn open_or_build(
        records: Vec<ProjectRecord>,
        embedder: Arc<dyn Embedder>,
        cache_dir: &Path,
    ) -> Result<Self> {
        let model = embedder.model_id();
        let fingerprint = corpus_fingerprint(&model, &records);
        let cache_path = cache_dir.join(CACHE_FILE);

        if let Some(cached) = read_cache(&cache_path) {
            if cached.fingerprint == fingerprint && cached.embeddings.len() == records.len() {
                tracing::info!(
                    "Reusing {} cached corpus embeddings ({model})",
                    cached.embeddings.len()
                );
                return Ok(Self {
                    records,
                    embeddings: cached.embeddings,
                    embedder,
                });
            }
            tracing::info!("Corpus or model changed, re-embedding");
        }

        let index = Self::build(records, embedder).await?;

        let cached = CachedVectors {
            fingerprint,
            model,
            embeddings: index.embeddings.clone(),
        };
        if let Err(e) = write_cache(cache_dir, &cache_path, &cached) {
            tracing::warn!("Failed to persist corpus embeddings: {e:#}");
        }

        Ok(index)
    }

    /// Top `top_n` records by cosine similarity to `text`, best first.
    ///
    /// An empty corpus or blank `text` yields no results rather than an error.
    /// Equal scores keep corpus order.
    pub async fn query(&self, text: &str, top_n: usize) -> Result<Vec<ScoredProject>> {
        if self.records.is_empty() || text.trim().is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed_single(text)
            .await
            .context("Failed to embed query text")?;

        let mut scored: Vec<(f32, usize)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (cosine_similarity(&query_embedding, e), i))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);

        Ok(scored
            .into_iter()
            .map(|(score, i)| ScoredProject {
                record: self.records[i].clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

async fn embed_records(records: &[ProjectRecord], embedder: &dyn Embedder) -> Result<Vec<Vec<f32>>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let descriptions: Vec<String> = records.iter().map(|r| r.description.clone()).collect();
    let embeddings = embedder
        .embed_batch(&descriptions)
        .await
        .context("Failed to embed corpus descriptions")?;

    if embeddings.len() != records.len() {
        anyhow::bail!(
            "Embedder returned {} vectors for {} corpus records",
            embeddings.len(),
            records.len()
        );
    }
    Ok(embeddings)
}

/// SHA-256 over the model id and every record's name and description.
fn corpus_fingerprint(model: &str, records: &[ProjectRecord]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    for r in records {
        hasher.update(r.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(r.description.as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn read_cache(path: &Path) -> Option<CachedVectors> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(cached) => Some(cached),
        Err(e) => {
            tracing::warn!("Ignoring unreadable embedding cache {}: {e}", path.display());
            None
        }
    }
}

/// Atomic write via temp file + rename.
fn write_cache(dir: &Path, path: &Path, cached: &CachedVectors) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let data = serde_json::to_string(cached)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
