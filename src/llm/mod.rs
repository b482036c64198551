pub mod chain;
pub mod embeddings;
pub mod prompt;
pub mod providers;
