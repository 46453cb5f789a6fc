use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::{AuditError, AuditResult};

/// Report format requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Html => "text/html",
            OutputFormat::Json => "application/json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AuditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(AuditError::InvalidArgument(format!(
                "unknown output type {other:?}"
            ))),
        }
    }
}

/// One audit invocation against the shared browser's control port.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub url: String,
    pub format: OutputFormat,
    pub control_port: u16,
    /// JSON object of extra HTTP headers the engine sends with page loads.
    pub extra_headers: Option<serde_json::Value>,
}

/// Report payload plus the engine's raw 0-1 performance score.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub report: String,
    pub score: f64,
}

/// The external auditing engine, opaque to the coordinator. Failures carry
/// the engine's message unmodified.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    async fn audit(&self, request: &AuditRequest) -> AuditResult<AuditOutcome>;
}

/// Drives the Lighthouse CLI against an already-running browser. Reports
/// land in a per-invocation temp directory: the json report always, for the
/// score, plus the html report when that is the requested payload.
#[derive(Debug, Clone)]
pub struct LighthouseCli {
    binary: PathBuf,
}

impl LighthouseCli {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl AuditEngine for LighthouseCli {
    async fn audit(&self, request: &AuditRequest) -> AuditResult<AuditOutcome> {
        let workdir = tempfile::tempdir().map_err(|err| AuditError::Engine(err.to_string()))?;
        let base = workdir.path().join("audit");

        let mut command = Command::new(&self.binary);
        command
            .arg(&request.url)
            .arg(format!("--port={}", request.control_port))
            .arg("--only-categories=performance")
            .arg("--output=json")
            .arg("--output=html")
            .arg(format!("--output-path={}", base.display()))
            .arg("--quiet");
        if let Some(headers) = &request.extra_headers {
            command.arg(format!("--extra-headers={headers}"));
        }

        debug!(url = %request.url, port = request.control_port, "invoking audit engine");
        let output = command
            .output()
            .await
            .map_err(|err| AuditError::Engine(err.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuditError::Engine(stderr.trim().to_string()));
        }

        // With multiple outputs the CLI appends `.report.<ext>` to the base.
        let raw_json = tokio::fs::read_to_string(base.with_extension("report.json"))
            .await
            .map_err(|err| AuditError::Engine(format!("missing json report: {err}")))?;
        let parsed: serde_json::Value = serde_json::from_str(&raw_json)
            .map_err(|err| AuditError::Engine(format!("unparseable json report: {err}")))?;
        let score = parsed
            .pointer("/categories/performance/score")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                AuditError::Engine("performance score missing from report".to_string())
            })?;

        let report = match request.format {
            OutputFormat::Json => raw_json,
            OutputFormat::Html => {
                tokio::fs::read_to_string(base.with_extension("report.html"))
                    .await
                    .map_err(|err| AuditError::Engine(format!("missing html report: {err}")))?
            }
        };

        Ok(AuditOutcome { report, score })
    }
}
