//! # stacksense
//!
//! Recommends a technology stack for a free-text project description. An
//! ordered chain of LLM providers is tried first; when every provider fails,
//! the stack is voted from the most similar projects in a local corpus.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │ description, reqs, cons  │
//!                    └────────────┬─────────────┘
//!                                 │ validate
//!                                 ▼
//!                    ┌──────────────────────────┐
//!                    │  FETCH_EVIDENCE          │
//!                    │  GitHub search (5 kw)    │
//!                    │  failure → empty list    │
//!                    └────────────┬─────────────┘
//!                                 ▼
//!                    ┌──────────────────────────┐
//!                    │  TRY_PROVIDERS           │
//!                    │  openai → anthropic →    │
//!                    │  ollama, 30s each        │
//!                    └──────┬─────────────┬─────┘
//!                 Generated │             │ Exhausted
//!                           ▼             ▼
//!              ┌────────────────┐  ┌──────────────────────┐
//!              │ SUCCESS        │  │ LOCAL_FALLBACK       │
//!              │ fixed provider │  │ cosine top-n corpus  │
//!              │ confidence     │  │ → frequency voting   │
//!              │ no alternatives│  │ → alternatives (≤3)  │
//!              └───────┬────────┘  └──────────┬───────────┘
//!                      └──────────┬───────────┘
//!                                 ▼
//!                    ┌──────────────────────────┐
//!                    │  ASSEMBLE                │
//!                    │  uniform Recommendation  │
//!                    └──────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for corpus, embeddings, providers and search
//! - [`models`] - Shared data types: `ProjectRecord`, `TechStackItem`, `Recommendation`
//! - [`catalog`] - Category table and technology name normalisation
//! - [`constraints`] - Per-category caller constraints (exclusion and required picks)
//! - [`corpus`] - Corpus file loading in either supported layout
//! - [`aggregate`] - Frequency voting, alternatives, confidence and explanations
//! - [`search::vector`] - Embedded corpus index with cosine top-n and a disk cache
//! - [`search::github`] - Keyword repository search used as supporting evidence
//! - [`llm::embeddings`] - Local hashing embedder and Ollama / OpenAI-compatible embedding APIs
//! - [`llm::prompt`] - Shared prompt and response parsing for stack generation
//! - [`llm::providers`] - OpenAI, Anthropic and Ollama completion providers
//! - [`llm::chain`] - Ordered provider fallback with explicit outcomes
//! - [`recommend`] - Request orchestration
//! - [`state`] - Builds every collaborator once from `Config`

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod constraints;
pub mod corpus;
pub mod llm;
pub mod models;
pub mod recommend;
pub mod search;
pub mod state;
