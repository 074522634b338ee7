//! Application configuration.
//!
//! Defaults cover a local setup. An optional JSON file (path from
//! `PDF_COPILOT_CONFIG`, else `config/pdf-copilot.json` when present) can
//! override any of them. The Gemini API key only ever comes from
//! `GEMINI_API_KEY`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config/pdf-copilot.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    /// URL prefix uploaded files are served under.
    pub upload_url_prefix: String,
    /// Request body limit in bytes.
    pub max_upload_bytes: usize,
    pub extractor: ExtractorConfig,
    pub gemini: GeminiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            upload_url_prefix: "/uploads".to_string(),
            max_upload_bytes: 100 * 1024 * 1024,
            extractor: ExtractorConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Context extraction chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Script each interpreter candidate runs.
    pub script: PathBuf,
    /// Interpreter binaries, tried in order.
    pub interpreters: Vec<String>,
    /// Neighbouring pages on each side to include.
    pub context_radius: u32,
    /// Append the in-process `lopdf` candidate to the chain.
    pub in_process_fallback: bool,
    /// Per-candidate subprocess timeout. Unset means wait indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("scripts/extract_context.py"),
            interpreters: vec!["python3".to_string(), "python".to_string(), "py".to_string()],
            context_radius: 0,
            in_process_fallback: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash-latest".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `PDF_COPILOT_CONFIG`, the default path, or built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("PDF_COPILOT_CONFIG") {
            return Self::load_from_file(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(default_path);
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;

        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

/// Read the Gemini API key from the environment.
pub fn gemini_api_key() -> Result<String> {
    std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY environment variable not set")
}
