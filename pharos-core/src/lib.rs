pub mod audit;
pub mod browser;
pub mod config;
pub mod error;
pub mod poll;

pub use audit::{
    AuditCoordinator, AuditEngine, AuditError, AuditGate, AuditOutcome, AuditRequest, AuditResult,
    AuditService, CoordinatorSettings, LighthouseCli, OutputFormat,
};
pub use browser::{
    BrowserError, BrowserHandle, BrowserResult, BrowserSupervisor, LaunchBrowser, LaunchState,
    ProcessLauncher, ReadinessProbe, SupervisorSettings, TcpProbe,
};
pub use config::{
    extra_headers_from_env, load_pharos_config, BrowserSection, EngineSection, GateSection,
    PharosConfig, ServerSection,
};
pub use error::{ConfigError, Result};
pub use poll::{wait_for_truthy, wait_until_ready, CheckFailure, PollError, PollOptions};
