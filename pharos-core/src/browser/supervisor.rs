use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;
use crate::poll::{wait_for_truthy, PollError, PollOptions};

use super::error::{BrowserError, BrowserResult};
use super::launcher::{BrowserHandle, LaunchBrowser, ProcessLauncher};
use super::probe::{ReadinessProbe, TcpProbe};

const STATE_NOT_LAUNCHED: u8 = 0;
const STATE_LAUNCHING: u8 = 1;
const STATE_READY: u8 = 2;

/// Observable lifecycle of the shared browser. There is no transition back
/// from `Ready`: a crashed browser stays `Ready` and fails later probes,
/// which is surfaced instead of silently recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    NotLaunched,
    Launching,
    Ready,
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub launch_timeout: Duration,
    pub probe_interval: Duration,
    /// Grace period after the first successful probe, absorbing control
    /// port flakiness right after connect starts succeeding.
    pub settle_delay: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &BrowserSection) -> Self {
        Self {
            launch_timeout: config.launch_timeout(),
            probe_interval: config.probe_interval(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// Owns the one browser of the process. `ensure_ready` is idempotent under
/// any amount of concurrency: the first caller claims the launch through an
/// atomic counter, everyone else polls readiness of that same browser.
pub struct BrowserSupervisor {
    launcher: Arc<dyn LaunchBrowser>,
    probe: Arc<dyn ReadinessProbe>,
    settings: SupervisorSettings,
    launch_claims: AtomicU64,
    state: AtomicU8,
    handle: Mutex<Option<BrowserHandle>>,
}

impl BrowserSupervisor {
    pub fn new(
        launcher: Arc<dyn LaunchBrowser>,
        probe: Arc<dyn ReadinessProbe>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            launcher,
            probe,
            settings,
            launch_claims: AtomicU64::new(0),
            state: AtomicU8::new(STATE_NOT_LAUNCHED),
            handle: Mutex::new(None),
        }
    }

    /// Wires the real process launcher and TCP probe from configuration.
    pub fn from_config(config: &BrowserSection) -> Self {
        let settings = SupervisorSettings::from_config(config);
        let probe = Arc::new(TcpProbe::new(config.control_port));
        let launcher = Arc::new(ProcessLauncher::new(config.clone()));
        Self::new(launcher, probe, settings)
    }

    pub fn state(&self) -> LaunchState {
        match self.state.load(Ordering::SeqCst) {
            STATE_LAUNCHING => LaunchState::Launching,
            STATE_READY => LaunchState::Ready,
            _ => LaunchState::NotLaunched,
        }
    }

    /// Resolves once the browser accepts control connections, launching it
    /// first if this is the first call of the process lifetime.
    pub async fn ensure_ready(&self) -> BrowserResult<()> {
        if self.launch_claims.fetch_add(1, Ordering::SeqCst) == 0 {
            self.launch_and_wait().await
        } else {
            debug!("browser launch already claimed, awaiting readiness");
            self.await_ready().await
        }
    }

    async fn launch_and_wait(&self) -> BrowserResult<()> {
        self.state.store(STATE_LAUNCHING, Ordering::SeqCst);
        let handle = self.launcher.launch().await?;
        debug!(pid = handle.pid(), "browser process spawned");
        {
            let mut slot = self.handle.lock().unwrap();
            *slot = Some(handle);
        }

        match self.await_ready().await {
            Ok(()) => {
                if !self.settings.settle_delay.is_zero() {
                    debug!(delay_ms = self.settings.settle_delay.as_millis() as u64, "letting control port settle");
                    sleep(self.settings.settle_delay).await;
                }
                self.state.store(STATE_READY, Ordering::SeqCst);
                info!(pid = handle.pid(), "browser ready");
                Ok(())
            }
            Err(err) => {
                let handle = self.handle.lock().unwrap().take();
                if let Some(handle) = handle {
                    warn!(pid = handle.pid(), "browser never became ready, killing process group");
                    if let Err(kill_err) = self.launcher.kill(&handle).await {
                        warn!(pid = handle.pid(), error = %kill_err, "cleanup kill failed");
                    }
                }
                Err(err)
            }
        }
    }

    async fn await_ready(&self) -> BrowserResult<()> {
        let opts = PollOptions {
            interval: self.settings.probe_interval,
            timeout: self.settings.launch_timeout,
            max_tries: None,
            fail_silently: false,
        };
        let probe = Arc::clone(&self.probe);
        let outcome = wait_for_truthy::<(), BrowserError, _, _>(&opts, move || {
            let probe = Arc::clone(&probe);
            async move { Ok(probe.is_ready().await.then_some(())) }
        })
        .await;
        match outcome {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(BrowserError::LaunchTimeout(self.settings.launch_timeout)),
            Err(PollError::Check(err)) => Err(err),
            Err(_) => Err(BrowserError::LaunchTimeout(self.settings.launch_timeout)),
        }
    }
}
