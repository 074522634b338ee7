//! PDF Copilot server - ask a model about passages selected in uploaded PDFs.

use pdf_copilot::config::{self, AppConfig};
use pdf_copilot::context::ContextExtractor;
use pdf_copilot::document_store::DocumentStore;
use pdf_copilot::gemini::GeminiClient;
use pdf_copilot::pipeline::QueryPipeline;
use pdf_copilot::{run_server, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdf_copilot=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let store = DocumentStore::new(&config.upload_dir, &config.upload_url_prefix);
    store.init().await?;
    info!("Storing uploads in {:?}", store.root());

    let extractor = ContextExtractor::from_config(store.clone(), &config.extractor);

    let gemini = GeminiClient::new(&config.gemini, config::gemini_api_key()?);
    info!("Gemini client initialized (model={})", gemini.model());

    let state = AppState::new(store, QueryPipeline::new(extractor, gemini));

    run_server(config, state).await
}
