use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use pharos_core::{
    AuditCoordinator, AuditEngine, AuditError, AuditOutcome, AuditRequest, AuditResult,
    AuditService, BrowserError, BrowserHandle, BrowserResult, BrowserSupervisor,
    CoordinatorSettings, GateSection, LaunchBrowser, OutputFormat, ReadinessProbe,
    SupervisorSettings,
};

#[derive(Default)]
struct CountingLauncher {
    launches: AtomicU32,
    missing_executable: bool,
}

#[async_trait]
impl LaunchBrowser for CountingLauncher {
    async fn launch(&self) -> BrowserResult<BrowserHandle> {
        if self.missing_executable {
            return Err(BrowserError::ExecutableNotFound);
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(BrowserHandle::new(1234))
    }
}

struct AlwaysReadyProbe;

#[async_trait]
impl ReadinessProbe for AlwaysReadyProbe {
    async fn is_ready(&self) -> bool {
        true
    }
}

struct StubEngine {
    calls: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
    fail_first: AtomicU32,
    report: String,
    score: f64,
}

impl StubEngine {
    fn new(report: &str, score: f64) -> Self {
        Self {
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            fail_first: AtomicU32::new(0),
            report: report.to_string(),
            score,
        }
    }

    fn failing_first(self, failures: u32) -> Self {
        self.fail_first.store(failures, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl AuditEngine for StubEngine {
    async fn audit(&self, _request: &AuditRequest) -> AuditResult<AuditOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then(|| left - 1)
            })
            .is_ok()
        {
            return Err(AuditError::Engine("engine crashed".to_string()));
        }
        Ok(AuditOutcome {
            report: self.report.clone(),
            score: self.score,
        })
    }
}

fn supervisor_settings() -> SupervisorSettings {
    SupervisorSettings {
        launch_timeout: Duration::from_millis(500),
        probe_interval: Duration::from_millis(2),
        settle_delay: Duration::ZERO,
    }
}

fn coordinator_settings(warm_cache: bool) -> CoordinatorSettings {
    CoordinatorSettings::new(
        9223,
        warm_cache,
        &GateSection {
            timeout_seconds: 2,
            poll_interval_ms: 1,
        },
    )
}

fn coordinator(
    launcher: Arc<CountingLauncher>,
    engine: Arc<StubEngine>,
    warm_cache: bool,
) -> AuditCoordinator {
    let supervisor = Arc::new(BrowserSupervisor::new(
        launcher as Arc<dyn LaunchBrowser>,
        Arc::new(AlwaysReadyProbe) as Arc<dyn ReadinessProbe>,
        supervisor_settings(),
    ));
    AuditCoordinator::new(
        supervisor,
        engine as Arc<dyn AuditEngine>,
        coordinator_settings(warm_cache),
    )
}

#[tokio::test]
async fn returns_the_engine_report_verbatim() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("<html>...</html>", 0.87));
    let coordinator = coordinator(launcher, Arc::clone(&engine), false);

    let report = coordinator
        .run_audit("https://example.com", OutputFormat::Html)
        .await
        .unwrap();
    assert_eq!(report, "<html>...</html>");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert!(!coordinator.gate().is_busy());
}

#[tokio::test]
async fn empty_url_fails_fast_without_launch_or_slot() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("{}", 0.5));
    let coordinator = coordinator(Arc::clone(&launcher), Arc::clone(&engine), false);

    let err = coordinator.run_audit("", OutputFormat::Html).await.unwrap_err();
    assert!(matches!(err, AuditError::InvalidArgument(_)));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert!(!coordinator.gate().is_busy());
}

#[tokio::test]
async fn missing_executable_propagates_without_engine_call() {
    let launcher = Arc::new(CountingLauncher {
        missing_executable: true,
        ..CountingLauncher::default()
    });
    let engine = Arc::new(StubEngine::new("{}", 0.5));
    let coordinator = coordinator(launcher, Arc::clone(&engine), false);

    let err = coordinator
        .run_audit("https://example.com", OutputFormat::Json)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuditError::Browser(BrowserError::ExecutableNotFound)
    ));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert!(!coordinator.gate().is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_audits_never_overlap_and_launch_once() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("report", 0.9));
    let coordinator = Arc::new(coordinator(
        Arc::clone(&launcher),
        Arc::clone(&engine),
        false,
    ));

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let coordinator = Arc::clone(&coordinator);
        tasks.push(tokio::spawn(async move {
            coordinator
                .run_audit("https://example.com", OutputFormat::Html)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(engine.peak_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 6);
    assert!(!coordinator.gate().is_busy());
}

#[tokio::test]
async fn eager_launch_is_shared_with_the_first_audit() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("report", 0.8));
    let coordinator = coordinator(Arc::clone(&launcher), Arc::clone(&engine), false);

    // Start the browser ahead of any request, the way the server does at
    // startup, then audit: the launch claim must be shared.
    coordinator.supervisor().ensure_ready().await.unwrap();
    coordinator
        .run_audit("https://example.com", OutputFormat::Html)
        .await
        .unwrap();

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn back_to_back_audits_reuse_the_browser() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("report", 0.42));
    let coordinator = coordinator(Arc::clone(&launcher), Arc::clone(&engine), false);

    coordinator
        .run_audit("https://example.com/a", OutputFormat::Html)
        .await
        .unwrap();
    coordinator
        .run_audit("https://example.com/b", OutputFormat::Json)
        .await
        .unwrap();

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn engine_failure_releases_the_slot_for_the_next_audit() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("report", 0.7).failing_first(1));
    let coordinator = coordinator(launcher, Arc::clone(&engine), false);

    let err = coordinator
        .run_audit("https://example.com", OutputFormat::Html)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Engine(_)));
    assert!(!coordinator.gate().is_busy());

    let report = coordinator
        .run_audit("https://example.com", OutputFormat::Html)
        .await
        .unwrap();
    assert_eq!(report, "report");
}

#[tokio::test]
async fn warm_cache_runs_a_discarded_extra_pass() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("warmed", 0.95));
    let coordinator = coordinator(launcher, Arc::clone(&engine), true);

    let report = coordinator
        .run_audit("https://example.com", OutputFormat::Html)
        .await
        .unwrap();
    assert_eq!(report, "warmed");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn warm_cache_failure_does_not_fail_the_audit() {
    let launcher = Arc::new(CountingLauncher::default());
    let engine = Arc::new(StubEngine::new("still fine", 0.6).failing_first(1));
    let coordinator = coordinator(launcher, Arc::clone(&engine), true);

    let report = coordinator
        .run_audit("https://example.com", OutputFormat::Html)
        .await
        .unwrap();
    assert_eq!(report, "still fine");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}
