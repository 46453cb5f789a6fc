use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Environment variable holding a JSON object of extra HTTP headers to
/// forward to the auditing engine on every run.
pub const EXTRA_HEADERS_ENV: &str = "PHAROS_EXTRA_HEADERS";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PharosConfig {
    pub server: ServerSection,
    pub browser: BrowserSection,
    pub gate: GateSection,
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    /// Well-known install locations, checked in order; the first that
    /// exists on disk is launched.
    pub executable_candidates: Vec<PathBuf>,
    /// Remote-debugging port the browser is told to listen on.
    pub control_port: u16,
    /// Root for the browser's throwaway profile and cache directories.
    pub temp_root: PathBuf,
    pub launch_timeout_seconds: u64,
    pub probe_interval_ms: u64,
    /// Grace period after the control port first accepts a connection,
    /// before the browser is declared ready.
    pub settle_delay_ms: u64,
}

impl BrowserSection {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_seconds)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateSection {
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
}

impl GateSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Auditing engine executable, resolved through PATH when relative.
    pub binary: PathBuf,
    /// Run a discarded warm-up audit before the real one to stabilise
    /// scores at the cost of latency.
    pub warm_cache: bool,
}

/// Extra HTTP headers for the engine, taken from [`EXTRA_HEADERS_ENV`].
/// Absent or empty means no extra headers; invalid JSON is an error rather
/// than a silently dropped setting.
pub fn extra_headers_from_env() -> Result<Option<serde_json::Value>> {
    let raw = match std::env::var(EXTRA_HEADERS_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(None),
    };
    let headers = serde_json::from_str(&raw).map_err(|source| ConfigError::Headers {
        source,
        variable: EXTRA_HEADERS_ENV.to_string(),
    })?;
    Ok(Some(headers))
}

pub fn load_pharos_config<P: AsRef<Path>>(path: P) -> Result<PharosConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
