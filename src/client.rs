//! HTTP client for the upload and query endpoints, used by the viewer.

use crate::schema::{ErrorBody, QueryRequest, QueryResponse, UploadResponse};
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

#[derive(Clone)]
pub struct CopilotClient {
    client: Client,
    base_url: String,
}

impl CopilotClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Upload a document. Returns the server's `filePath`.
    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<UploadResponse> {
        debug!("Uploading {} ({} bytes)", filename, data.len());

        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Failed to send upload request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Upload failed ({}): {}", status, error_message(response).await);
        }

        response
            .json()
            .await
            .context("Failed to parse upload response")
    }

    /// Ask a question. Returns the model's reply text.
    pub async fn query(&self, request: &QueryRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/query", self.base_url))
            .json(request)
            .send()
            .await
            .context("Failed to send query request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Query failed ({}): {}", status, error_message(response).await);
        }

        let body: QueryResponse = response
            .json()
            .await
            .context("Failed to parse query response")?;
        Ok(body.response)
    }
}

/// `error` field of a JSON error body, or the raw text.
async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text)
}
