//! PDF Copilot: upload a PDF, select a passage, ask a model about it.

pub mod client;
pub mod config;
pub mod context;
pub mod document_store;
pub mod error;
pub mod gemini;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod server;
pub mod viewer;

pub use config::AppConfig;
pub use server::{router, run_server, AppState};
