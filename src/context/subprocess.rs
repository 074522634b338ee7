//! Interpreter candidate: runs the extraction script out of process.
//!
//! Invocation is `<program> <script> <pdf path> <page> <radius>`. The script
//! prints `{"context": "..."}` on success or `{"error": "..."}` on failure.

use super::{ContextRequest, ContextStrategy, ExtractionFailure};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Script stdout (private deserialization type).
#[derive(Debug, Deserialize)]
struct ScriptOutput {
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct InterpreterStrategy {
    program: String,
    script: PathBuf,
    timeout_secs: Option<u64>,
}

impl InterpreterStrategy {
    pub fn new(program: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    async fn run(&self, mut cmd: Command) -> Result<Output, ExtractionFailure> {
        cmd.kill_on_drop(true);
        let spawn_failure = |source| ExtractionFailure::Spawn {
            program: self.program.clone(),
            source,
        };

        match self.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), cmd.output())
                .await
                .map_err(|_| ExtractionFailure::Timeout(secs))?
                .map_err(spawn_failure),
            None => cmd.output().await.map_err(spawn_failure),
        }
    }
}

#[async_trait::async_trait]
impl ContextStrategy for InterpreterStrategy {
    fn name(&self) -> &str {
        &self.program
    }

    async fn extract(&self, request: &ContextRequest) -> Result<String, ExtractionFailure> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.script)
            .arg(&request.document)
            .arg(request.page.to_string())
            .arg(request.radius.to_string());

        debug!(
            "InterpreterStrategy: {} {:?} {:?} {}",
            self.program, self.script, request.document, request.page
        );

        let output = self.run(cmd).await?;

        if !output.status.success() {
            return Err(ExtractionFailure::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_script_output(&output.stdout)
    }
}

/// Interpret the script's stdout.
fn parse_script_output(stdout: &[u8]) -> Result<String, ExtractionFailure> {
    let parsed: ScriptOutput = serde_json::from_slice(stdout).map_err(|e| {
        let preview: String = String::from_utf8_lossy(stdout).chars().take(200).collect();
        ExtractionFailure::Malformed(format!("{} in {:?}", e, preview))
    })?;

    if let Some(error) = parsed.error {
        return Err(ExtractionFailure::Reported(error));
    }

    parsed
        .context
        .ok_or_else(|| ExtractionFailure::Malformed("missing \"context\" field".to_string()))
}
