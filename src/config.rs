use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reference corpus (JSON list of project records)
    pub corpus_path: PathBuf,
    /// Where cached corpus embeddings are stored
    pub data_dir: PathBuf,
    /// Number of similar projects to consider
    pub top_n: usize,
    /// Embedding backend configuration
    pub embedding: EmbeddingConfig,
    /// LLM providers, in the order they are tried
    pub providers: Vec<ProviderConfig>,
    /// Public repository search configuration
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "hashing" (local, offline), "ollama" or "openai"
    pub provider: String,
    /// Base URL for the embedding API (unused by "hashing")
    pub base_url: String,
    /// Model name for embeddings
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub dim: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Credential for the provider. For Ollama this is unused; the provider
    /// counts as configured when `base_url` is set explicitly.
    pub api_key: Option<String>,
    /// Whether the provider has what it needs to be called at all
    pub enabled: bool,
    /// Fixed confidence reported when this provider produces a stack
    pub confidence: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL for the GitHub REST API
    pub base_url: String,
    /// Personal access token; anonymous search is used when absent
    pub token: Option<String>,
    /// Maximum repositories to fetch per request
    pub limit: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

pub const LLM_TIMEOUT_SECS: u64 = 30;
pub const LLM_TEMPERATURE: f32 = 0.3;
pub const SEARCH_TIMEOUT_SECS: u64 = 10;

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("./data/tech_stacks.json"),
            data_dir: PathBuf::from("./data"),
            top_n: 5,
            embedding: EmbeddingConfig::default(),
            providers: ProviderConfig::defaults(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dim: 384,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: None,
            limit: 5,
            timeout_secs: SEARCH_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    /// Provider chain in priority order. None are enabled until a credential
    /// shows up in the environment.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                kind: ProviderKind::OpenAi,
                base_url: "https://api.openai.com".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                enabled: false,
                confidence: 0.8,
                timeout_secs: LLM_TIMEOUT_SECS,
                temperature: LLM_TEMPERATURE,
            },
            Self {
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-5-haiku-latest".to_string(),
                api_key: None,
                enabled: false,
                confidence: 0.75,
                timeout_secs: LLM_TIMEOUT_SECS,
                temperature: LLM_TEMPERATURE,
            },
            Self {
                kind: ProviderKind::Ollama,
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                api_key: None,
                enabled: false,
                confidence: 0.7,
                timeout_secs: LLM_TIMEOUT_SECS,
                temperature: LLM_TEMPERATURE,
            },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("STACKSENSE_CORPUS_PATH") {
            config.corpus_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("STACKSENSE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("STACKSENSE_TOP_N") {
            if let Ok(v) = val.parse::<usize>() {
                config.top_n = v.max(1);
            }
        }

        // Embeddings
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dim = d;
            }
        }

        // LLM providers
        for provider in config.providers.iter_mut() {
            match provider.kind {
                ProviderKind::OpenAi => {
                    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                        provider.api_key = Some(key);
                    }
                    if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
                        provider.base_url = url;
                    }
                    if let Ok(model) = std::env::var("OPENAI_MODEL") {
                        provider.model = model;
                    }
                }
                ProviderKind::Anthropic => {
                    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                        provider.api_key = Some(key);
                    }
                    if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
                        provider.model = model;
                    }
                }
                ProviderKind::Ollama => {
                    if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
                        provider.base_url = url;
                        provider.enabled = true;
                    }
                    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
                        provider.model = model;
                    }
                }
            }
            if provider.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
                provider.enabled = true;
            }
        }

        // Repository search
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            config.search.token = Some(token);
        }
        if let Ok(url) = std::env::var("GITHUB_API_URL") {
            config.search.base_url = url;
        }
        if let Ok(val) = std::env::var("STACKSENSE_SEARCH_LIMIT") {
            if let Ok(v) = val.parse() {
                config.search.limit = v;
            }
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}
