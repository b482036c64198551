use std::sync::Arc;
use std::time::Duration;

use crate::config::LLM_TIMEOUT_SECS;
use crate::constraints::Constraints;
use crate::llm::prompt::{build_prompt, parse_stack_response};
use crate::llm::providers::{CompletionProvider, ProviderError};
use crate::models::TechStackItem;

/// A stack produced by one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalStack {
    pub provider: String,
    pub primary_tech_stack: Vec<TechStackItem>,
    pub explanation: String,
    pub confidence: f32,
}

/// Why one provider did not produce a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub error: ProviderError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// The first provider that answered with a valid stack.
    Generated(ExternalStack),
    /// Every provider failed, in order.
    Exhausted(Vec<ProviderAttempt>),
}

/// Ordered list of providers; the first valid answer wins.
pub struct ProviderChain {
    providers: Vec<Arc<dyn CompletionProvider>>,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        Self {
            providers,
            timeout: Duration::from_secs(LLM_TIMEOUT_SECS),
        }
    }

    /// Upper bound on a single provider call, on top of whatever the
    /// provider's HTTP client enforces.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn generate(
        &self,
        description: &str,
        requirements: &[String],
        constraints: &Constraints,
    ) -> ChainOutcome {
        let prompt = build_prompt(description, requirements, constraints);
        let mut failures = Vec::new();

        for provider in &self.providers {
            match self.attempt(provider.as_ref(), &prompt).await {
                Ok(stack) => {
                    tracing::info!(
                        provider = provider.name(),
                        items = stack.primary_tech_stack.len(),
                        "LLM provider produced a stack"
                    );
                    return ChainOutcome::Generated(stack);
                }
                Err(error) => {
                    tracing::warn!(provider = provider.name(), "LLM provider failed: {error}");
                    failures.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        error,
                    });
                }
            }
        }

        ChainOutcome::Exhausted(failures)
    }

    async fn attempt(
        &self,
        provider: &dyn CompletionProvider,
        prompt: &str,
    ) -> Result<ExternalStack, ProviderError> {
        let raw = tokio::time::timeout(self.timeout, provider.complete(prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let parsed = parse_stack_response(&raw)?;
        Ok(ExternalStack {
            provider: provider.name().to_string(),
            primary_tech_stack: parsed.primary_tech_stack,
            explanation: parsed.explanation,
            confidence: provider.confidence(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOOD: &str = r#"{"primary_tech_stack": [{"category": "frontend", "name": "Svelte"}], "explanation": "Small and fast."}"#;

    struct Scripted {
        name: &'static str,
        confidence: f32,
        reply: Result<String, ProviderError>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, confidence: f32, reply: Result<String, ProviderError>) -> Self {
            Self {
                name,
                confidence,
                reply,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn confidence(&self) -> f32 {
            self.confidence
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let first = Arc::new(Scripted::new("first", 0.8, Ok(GOOD.to_string())));
        let second = Arc::new(Scripted::new("second", 0.75, Ok(GOOD.to_string())));
        let chain = ProviderChain::new(vec![first.clone(), second.clone()]);

        match chain.generate("a blog", &[], &Constraints::new()).await {
            ChainOutcome::Generated(stack) => {
                assert_eq!(stack.provider, "first");
                assert_eq!(stack.confidence, 0.8);
                assert_eq!(stack.primary_tech_stack[0].name, "Svelte");
            }
            other => panic!("expected a stack, got {other:?}"),
        }
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_provider() {
        let missing = Arc::new(Scripted::new(
            "missing",
            0.8,
            Err(ProviderError::MissingCredential),
        ));
        let garbage = Arc::new(Scripted::new("garbage", 0.75, Ok("Sure! Use Rails.".into())));
        let good = Arc::new(Scripted::new("good", 0.7, Ok(format!("```json\n{GOOD}\n```"))));
        let chain = ProviderChain::new(vec![missing.clone(), garbage.clone(), good.clone()]);

        match chain.generate("a blog", &[], &Constraints::new()).await {
            ChainOutcome::Generated(stack) => {
                assert_eq!(stack.provider, "good");
                assert_eq!(stack.confidence, 0.7);
            }
            other => panic!("expected a stack, got {other:?}"),
        }
        assert_eq!(missing.calls() + garbage.calls() + good.calls(), 3);
    }

    #[tokio::test]
    async fn test_all_failures_exhaust_chain_in_order() {
        let chain = ProviderChain::new(vec![
            Arc::new(Scripted::new(
                "a",
                0.8,
                Err(ProviderError::Status {
                    status: 500,
                    body: "boom".into(),
                }),
            )),
            Arc::new(Scripted::new("b", 0.75, Ok("{\"explanation\": \"x\"}".into()))),
        ]);

        match chain.generate("a blog", &[], &Constraints::new()).await {
            ChainOutcome::Exhausted(attempts) => {
                let names: Vec<_> = attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
                assert!(matches!(attempts[1].error, ProviderError::Malformed(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let mut slow = Scripted::new("slow", 0.8, Ok(GOOD.to_string()));
        slow.delay = Some(Duration::from_secs(5));
        let fallback = Arc::new(Scripted::new("fallback", 0.75, Ok(GOOD.to_string())));
        let chain = ProviderChain::new(vec![Arc::new(slow), fallback.clone()])
            .with_timeout(Duration::from_millis(50));

        match chain.generate("a blog", &[], &Constraints::new()).await {
            ChainOutcome::Generated(stack) => assert_eq!(stack.provider, "fallback"),
            other => panic!("expected fallback stack, got {other:?}"),
        }
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let chain = ProviderChain::new(Vec::new());
        assert_eq!(
            chain.generate("a blog", &[], &Constraints::new()).await,
            ChainOutcome::Exhausted(Vec::new())
        );
    }
}
