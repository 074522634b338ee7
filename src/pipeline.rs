//! Question-answering pipeline: context, prompt, remote model.

use crate::context::ContextExtractor;
use crate::gemini::{GeminiClient, InferenceError};
use crate::prompt;
use crate::schema::QueryRequest;
use tracing::{debug, info};

/// Sequential stages behind `POST /api/query`.
pub struct QueryPipeline {
    extractor: ContextExtractor,
    client: GeminiClient,
}

impl QueryPipeline {
    pub fn new(extractor: ContextExtractor, client: GeminiClient) -> Self {
        Self { extractor, client }
    }

    /// Answer a validated request.
    ///
    /// Context extraction cannot fail (it degrades to a placeholder); only
    /// the remote call can.
    pub async fn answer(&self, request: &QueryRequest) -> Result<String, InferenceError> {
        info!(
            "AI query: prompt={:?} page={} file={}",
            request.prompt, request.page_number, request.filename
        );

        let context = self
            .extractor
            .extract_context(&request.filename, request.page_number)
            .await;
        if context.is_placeholder() {
            debug!("Using placeholder context for {}", request.filename);
        }

        let full_prompt = prompt::assemble(&request.prompt, context.text(), &request.text);
        debug!("Full prompt sent to Gemini:\n{}", full_prompt);

        let reply = self.client.generate(&full_prompt).await?;
        info!("AI reply: {} chars", reply.len());
        Ok(reply)
    }
}
