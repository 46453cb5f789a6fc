use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::BrowserSection;

use super::error::{BrowserError, BrowserResult};

/// Handle to a spawned browser process. The child itself is owned by a
/// background task that waits on it; the handle only carries what the
/// supervisor needs for logging and cleanup.
#[derive(Debug, Clone, Copy)]
pub struct BrowserHandle {
    pid: u32,
}

impl BrowserHandle {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Seam between the supervisor and the actual process spawn, so tests can
/// count launches without a real browser.
#[async_trait]
pub trait LaunchBrowser: Send + Sync {
    async fn launch(&self) -> BrowserResult<BrowserHandle>;

    async fn kill(&self, _handle: &BrowserHandle) -> BrowserResult<()> {
        Ok(())
    }
}

/// Locates and spawns the system chromium with a fixed headless profile.
/// Does not wait for readiness; that is the probe's job.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: Arc<BrowserSection>,
}

impl ProcessLauncher {
    pub fn new(config: BrowserSection) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// First candidate path that exists on disk wins.
    pub fn resolve_executable(candidates: &[PathBuf]) -> BrowserResult<PathBuf> {
        candidates
            .iter()
            .find(|path| path.exists())
            .cloned()
            .ok_or(BrowserError::ExecutableNotFound)
    }

    async fn spawn(&self) -> BrowserResult<BrowserHandle> {
        let executable = Self::resolve_executable(&self.config.executable_candidates)?;
        debug!(path = %executable.display(), "launching browser");

        let mut command = Command::new(&executable);
        command
            .args(headless_flags(self.config.control_port, &self.config.temp_root))
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|err| BrowserError::Spawn(err.to_string()))?;
        let pid = child.id().unwrap_or_default();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output("stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output("stderr", stderr));
        }
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(%status, "browser process exited"),
                Err(err) => debug!(error = %err, "browser process wait failed"),
            }
        });

        Ok(BrowserHandle { pid })
    }
}

#[async_trait]
impl LaunchBrowser for ProcessLauncher {
    async fn launch(&self) -> BrowserResult<BrowserHandle> {
        self.spawn().await
    }

    async fn kill(&self, handle: &BrowserHandle) -> BrowserResult<()> {
        kill_process_group(handle.pid()).await
    }
}

/// Terminate the whole process group. A plain signal to the leader is
/// unreliable for multi-process browsers, so this shells out to `kill`
/// with a negative pid.
pub async fn kill_process_group(pid: u32) -> BrowserResult<()> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg("--")
        .arg(format!("-{pid}"))
        .status()
        .await?;
    if !status.success() {
        warn!(pid, %status, "process group kill reported failure");
    }
    Ok(())
}

async fn forward_output<R>(stream: &'static str, source: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(source).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream, line, "browser output");
    }
}

/// The fixed launch profile: headless, remote debugging on the control
/// port, sandbox/GPU/telemetry/extensions off, profile and caches under
/// the temp root. Inert configuration data, not logic.
fn headless_flags(control_port: u16, temp_root: &Path) -> Vec<String> {
    let temp = temp_root.display();
    vec![
        "--ignore-certificate-errors".into(),
        format!("--remote-debugging-port={control_port}"),
        "--headless".into(),
        "--disable-gpu".into(),
        "--no-sandbox".into(),
        format!("--homedir={temp}"),
        "--single-process".into(),
        format!("--data-path={temp}/data-path"),
        format!("--disk-cache-dir={temp}/cache-dir"),
        "--autoplay-policy=user-gesture-required".into(),
        format!("--user-data-dir={temp}/chromium"),
        "--disable-web-security".into(),
        "--disable-background-networking".into(),
        "--disable-background-timer-throttling".into(),
        "--disable-backgrounding-occluded-windows".into(),
        "--disable-breakpad".into(),
        "--disable-client-side-phishing-detection".into(),
        "--disable-component-update".into(),
        "--disable-default-apps".into(),
        "--disable-dev-shm-usage".into(),
        "--disable-domain-reliability".into(),
        "--disable-extensions".into(),
        "--disable-features=AudioServiceOutOfProcess".into(),
        "--disable-hang-monitor".into(),
        "--disable-ipc-flooding-protection".into(),
        "--disable-notifications".into(),
        "--disable-offer-store-unmasked-wallet-cards".into(),
        "--disable-popup-blocking".into(),
        "--disable-print-preview".into(),
        "--disable-prompt-on-repost".into(),
        "--disable-renderer-backgrounding".into(),
        "--disable-setuid-sandbox".into(),
        "--disable-speech-api".into(),
        "--disable-sync".into(),
        "--disk-cache-size=33554432".into(),
        "--hide-scrollbars".into(),
        "--ignore-gpu-blocklist".into(),
        "--metrics-recording-only".into(),
        "--mute-audio".into(),
        "--no-default-browser-check".into(),
        "--no-first-run".into(),
        "--no-pings".into(),
        "--no-zygote".into(),
        "--password-store=basic".into(),
        "--use-gl=swiftshader".into(),
        "--use-mock-keychain".into(),
    ]
}
