use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::browser::BrowserSupervisor;
use crate::config::{extra_headers_from_env, GateSection, PharosConfig};
use crate::poll::PollOptions;

use super::engine::{AuditEngine, AuditRequest, LighthouseCli, OutputFormat};
use super::error::{AuditError, AuditResult};
use super::gate::AuditGate;

/// The audit entry point as the HTTP layer sees it, mockable in its tests.
#[async_trait]
pub trait AuditService: Send + Sync {
    async fn run_audit(&self, url: &str, format: OutputFormat) -> AuditResult<String>;
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub control_port: u16,
    /// Run a discarded engine pass first to warm page caches.
    pub warm_cache: bool,
    pub gate_timeout: Duration,
    pub gate_interval: Duration,
    pub extra_headers: Option<serde_json::Value>,
}

impl CoordinatorSettings {
    pub fn new(control_port: u16, warm_cache: bool, gate: &GateSection) -> Self {
        Self {
            control_port,
            warm_cache,
            gate_timeout: gate.timeout(),
            gate_interval: gate.poll_interval(),
            extra_headers: None,
        }
    }

    pub fn with_extra_headers(mut self, headers: Option<serde_json::Value>) -> Self {
        self.extra_headers = headers;
        self
    }
}

/// Owns everything one audit needs: the browser singleton, the
/// single-flight gate, and the engine. Constructed once per process and
/// passed around by reference; there is no hidden global state.
pub struct AuditCoordinator {
    supervisor: Arc<BrowserSupervisor>,
    engine: Arc<dyn AuditEngine>,
    gate: AuditGate,
    settings: CoordinatorSettings,
}

impl AuditCoordinator {
    pub fn new(
        supervisor: Arc<BrowserSupervisor>,
        engine: Arc<dyn AuditEngine>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            supervisor,
            engine,
            gate: AuditGate::new(),
            settings,
        }
    }

    /// Production wiring: real launcher and probe, Lighthouse CLI engine,
    /// extra headers from the environment.
    pub fn from_config(config: &PharosConfig) -> crate::error::Result<Self> {
        let supervisor = Arc::new(BrowserSupervisor::from_config(&config.browser));
        let engine = Arc::new(LighthouseCli::new(&config.engine.binary));
        let settings = CoordinatorSettings::new(
            config.browser.control_port,
            config.engine.warm_cache,
            &config.gate,
        )
        .with_extra_headers(extra_headers_from_env()?);
        Ok(Self::new(supervisor, engine, settings))
    }

    pub fn gate(&self) -> &AuditGate {
        &self.gate
    }

    /// The shared browser singleton, for callers that want to start the
    /// launch ahead of the first audit.
    pub fn supervisor(&self) -> Arc<BrowserSupervisor> {
        Arc::clone(&self.supervisor)
    }

    fn gate_poll(&self) -> PollOptions {
        PollOptions {
            interval: self.settings.gate_interval,
            timeout: self.settings.gate_timeout,
            max_tries: None,
            fail_silently: false,
        }
    }
}

#[async_trait]
impl AuditService for AuditCoordinator {
    async fn run_audit(&self, url: &str, format: OutputFormat) -> AuditResult<String> {
        if url.trim().is_empty() {
            return Err(AuditError::InvalidArgument(
                "url must not be empty".to_string(),
            ));
        }

        let sequence = self.gate.admit();
        info!(sequence, url, "audit queued");
        let _slot = self.gate.acquire(&self.gate_poll()).await?;
        info!(sequence, url, "audit running");

        self.supervisor.ensure_ready().await?;

        let request = AuditRequest {
            url: url.to_string(),
            format,
            control_port: self.settings.control_port,
            extra_headers: self.settings.extra_headers.clone(),
        };

        if self.settings.warm_cache {
            debug!(sequence, "warm-up pass");
            if let Err(err) = self.engine.audit(&request).await {
                warn!(sequence, error = %err, "warm-up pass failed, continuing");
            }
        }

        let outcome = self.engine.audit(&request).await?;
        info!(
            sequence,
            url,
            score = (outcome.score * 100.0).round() as i64,
            "audit finished"
        );
        Ok(outcome.report)
    }
}
