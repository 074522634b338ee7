//! Page-context extraction with an ordered fallback chain.
//!
//! Each [`ContextStrategy`] is one way of getting the text of a page
//! (an interpreter running the extraction script, or `lopdf` in-process).
//! [`ContextExtractor`] tries them in order and stops at the first success.
//! When all of them fail the caller still gets a non-empty placeholder.

pub mod in_process;
pub mod subprocess;

use crate::config::ExtractorConfig;
use crate::document_store::DocumentStore;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What a strategy is asked to extract.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    pub document: PathBuf,
    pub stored_name: String,
    /// 1-indexed, not checked against the document length.
    pub page: u32,
    /// Number of neighbouring pages on each side to include.
    pub radius: u32,
}

impl ContextRequest {
    /// Inclusive page window, clamped at page 1.
    pub fn window(&self) -> (u32, u32) {
        (
            self.page.saturating_sub(self.radius).max(1),
            self.page.saturating_add(self.radius),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("malformed output: {0}")]
    Malformed(String),
    #[error("extractor reported: {0}")]
    Reported(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("no text on page {0}")]
    Empty(u32),
}

/// One candidate method of extracting page text.
#[async_trait::async_trait]
pub trait ContextStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, request: &ContextRequest) -> Result<String, ExtractionFailure>;
}

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextOutcome {
    Extracted { strategy: String, text: String },
    Placeholder(String),
}

impl ContextOutcome {
    pub fn text(&self) -> &str {
        match self {
            ContextOutcome::Extracted { text, .. } => text,
            ContextOutcome::Placeholder(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ContextOutcome::Extracted { text, .. } => text,
            ContextOutcome::Placeholder(text) => text,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ContextOutcome::Placeholder(_))
    }
}

/// Context used when no strategy produced any text.
pub fn placeholder(stored_name: &str, page: u32) -> String {
    format!("Context for page {} from {}", page, stored_name)
}

/// Runs the configured strategies in order.
pub struct ContextExtractor {
    store: DocumentStore,
    strategies: Vec<Box<dyn ContextStrategy>>,
    radius: u32,
}

impl ContextExtractor {
    pub fn new(store: DocumentStore, strategies: Vec<Box<dyn ContextStrategy>>) -> Self {
        Self {
            store,
            strategies,
            radius: 0,
        }
    }

    pub fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    /// Build the default chain: one interpreter candidate per configured
    /// binary name, then `lopdf` if enabled.
    pub fn from_config(store: DocumentStore, config: &ExtractorConfig) -> Self {
        let mut strategies: Vec<Box<dyn ContextStrategy>> = config
            .interpreters
            .iter()
            .map(|program| {
                Box::new(
                    subprocess::InterpreterStrategy::new(program.clone(), config.script.clone())
                        .with_timeout(config.timeout_secs),
                ) as Box<dyn ContextStrategy>
            })
            .collect();

        if config.in_process_fallback {
            strategies.push(Box::new(in_process::LopdfStrategy));
        }

        info!(
            "Context extractor chain: {:?}",
            strategies.iter().map(|s| s.name()).collect::<Vec<_>>()
        );

        Self::new(store, strategies).with_radius(config.context_radius)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract context for `page` of `stored_name`. Never fails.
    pub async fn extract_context(&self, stored_name: &str, page: u32) -> ContextOutcome {
        let document = match self.store.resolve(stored_name) {
            Ok(path) => path,
            Err(e) => {
                warn!("Context extraction skipped for '{}': {}", stored_name, e);
                return ContextOutcome::Placeholder(placeholder(stored_name, page));
            }
        };

        let request = ContextRequest {
            document,
            stored_name: stored_name.to_string(),
            page,
            radius: self.radius,
        };

        for strategy in &self.strategies {
            debug!("Trying context strategy '{}'", strategy.name());
            match strategy.extract(&request).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        "Context for '{}' page {} via '{}' ({} chars)",
                        stored_name,
                        page,
                        strategy.name(),
                        text.len()
                    );
                    return ContextOutcome::Extracted {
                        strategy: strategy.name().to_string(),
                        text,
                    };
                }
                Ok(_) => warn!(
                    "Context strategy '{}' failed: {}",
                    strategy.name(),
                    ExtractionFailure::Empty(page)
                ),
                Err(e) => warn!("Context strategy '{}' failed: {}", strategy.name(), e),
            }
        }

        warn!(
            "All context strategies failed for '{}' page {}; using placeholder",
            stored_name, page
        );
        ContextOutcome::Placeholder(placeholder(stored_name, page))
    }
}
