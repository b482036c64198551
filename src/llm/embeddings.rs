use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;

/// Maximum characters to send per text to the embedding API.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Text -> fixed-length vector. Implementations must be deterministic for a
/// given model and text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model; part of the corpus cache fingerprint.
    fn model_id(&self) -> String;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("No embedding returned")
    }
}

/// Build the embedder named by `config.provider`.
pub fn from_config(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
) -> Result<std::sync::Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(std::sync::Arc::new(HashingEmbedder::new(config.dim))),
        _ => Ok(std::sync::Arc::new(HttpEmbedder::new(
            client.clone(),
            config.clone(),
        )?)),
    }
}

// ─── Local hashing ───────────────────────────────────────

/// Offline embedder: hashes word unigrams and bigrams into a fixed number of
/// buckets and L2-normalises the result. Works without any model download and
/// is stable across runs and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric() && c != '.' && c != '#' && c != '+')
            .map(|w| w.trim_matches('.').to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        for word in &words {
            self.add_feature(&mut vector, word, 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dim as u64) as usize;
        // high bit picks the sign so collisions partially cancel
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> String {
        format!("hashing-{}", self.dim)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| self.embed_text(truncate_for_embedding(t)))
            .collect())
    }
}

// ─── Remote (Ollama / OpenAI-compatible) ─────────────────

/// Wire shape of the embedding endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmbeddingApi {
    /// `POST /api/embed` -> `{"embeddings": [[..]]}`
    Ollama,
    /// `POST /v1/embeddings` -> `{"data": [{"embedding": [..]}]}`
    OpenAi,
}

impl EmbeddingApi {
    fn path(self) -> &'static str {
        match self {
            EmbeddingApi::Ollama => "api/embed",
            EmbeddingApi::OpenAi => "v1/embeddings",
        }
    }

    fn batch_size(self) -> usize {
        match self {
            EmbeddingApi::Ollama => 32,
            EmbeddingApi::OpenAi => 64,
        }
    }
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
    api: EmbeddingApi,
}

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    input: &'a [String],
    /// Ollama only
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedReply {
    Ollama { embeddings: Vec<Vec<f32>> },
    OpenAi { data: Vec<EmbeddingRow> },
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl EmbedReply {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            EmbedReply::Ollama { embeddings } => embeddings,
            EmbedReply::OpenAi { data } => data.into_iter().map(|row| row.embedding).collect(),
        }
    }
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: EmbeddingConfig) -> Result<Self> {
        let api = match config.provider.as_str() {
            "ollama" => EmbeddingApi::Ollama,
            "openai" => EmbeddingApi::OpenAi,
            other => anyhow::bail!("Unknown embedding provider: {other}"),
        };
        Ok(Self {
            client,
            config,
            api,
        })
    }

    async fn embed_chunk(&self, url: &str, chunk: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbedBody {
            model: &self.config.model,
            input: chunk,
            truncate: (self.api == EmbeddingApi::Ollama).then_some(true),
        };

        let mut req = self.client.post(url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Embedding request to {url} failed"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Embedding endpoint {url} returned {status}: {text}");
        }

        let reply: EmbedReply = resp
            .json()
            .await
            .context("Unexpected embedding response shape")?;
        Ok(reply.into_vectors())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> String {
        format!("{}:{}", self.config.provider, self.config.model)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.api.path()
        );
        let inputs: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        let mut vectors = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.api.batch_size()) {
            vectors.extend(self.embed_chunk(&url, chunk).await?);
        }

        if vectors.len() != texts.len() {
            anyhow::bail!(
                "Embedding endpoint returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hashing_is_deterministic() {
        let e = HashingEmbedder::new(64);
        assert_eq!(
            e.embed_text("A realtime chat app"),
            e.embed_text("A realtime chat app")
        );
    }

    #[test]
    fn test_hashing_dimension_and_norm() {
        let e = HashingEmbedder::new(128);
        let v = e.embed_text("e-commerce storefront with payments");
        assert_eq!(v.len(), 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        assert!(e.embed_text("   ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_hashing_similar_texts_score_higher() {
        let e = HashingEmbedder::new(256);
        let query = e.embed_text("real-time chat application with messaging");
        let chat = e.embed_text("chat application with real-time messaging and rooms");
        let ml = e.embed_text("machine learning pipeline for image classification");
        assert!(cosine(&query, &chat) > cosine(&query, &ml));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let truncated = truncate_for_embedding(&text);
        assert!(truncated.len() <= MAX_EMBED_CHARS);
        assert!(text.is_char_boundary(truncated.len()));
    }

    #[tokio::test]
    async fn test_embed_single_via_trait_default() {
        let e = HashingEmbedder::new(32);
        let v = e.embed_single("todo list").await.unwrap();
        assert_eq!(v, e.embed_text("todo list"));
        assert_eq!(e.model_id(), "hashing-32");
    }

    #[test]
    fn test_reply_shapes() {
        let ollama: EmbedReply = serde_json::from_str(r#"{"embeddings": [[0.1, 0.2]]}"#).unwrap();
        assert_eq!(ollama.into_vectors(), vec![vec![0.1, 0.2]]);
        let openai: EmbedReply =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0]}, {"embedding": [2.0]}]}"#)
                .unwrap();
        assert_eq!(openai.into_vectors(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_ollama_body_carries_truncate_flag() {
        let input = vec!["a".to_string()];
        let body = EmbedBody {
            model: "nomic-embed-text",
            input: &input,
            truncate: None,
        };
        assert!(serde_json::to_value(&body).unwrap().get("truncate").is_none());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(from_config(&reqwest::Client::new(), &config).is_err());
    }
}
