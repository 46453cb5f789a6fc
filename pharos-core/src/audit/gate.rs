use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::trace;

use crate::poll::{wait_for_truthy, PollOptions};

use super::error::AuditError;

/// Single-flight gate: at most one holder at any instant. Waiters poll the
/// busy flag rather than queueing, so admission order is best-effort, not
/// FIFO; whichever waiter claims the flag first wins. The sequence counter
/// is assigned at admission and used for logging only.
#[derive(Debug, Default)]
pub struct AuditGate {
    busy: AtomicBool,
    sequence: AtomicU64,
}

/// Holding this is the right to run; the flag is released when it drops,
/// on every exit path including panics.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a AuditGate,
}

impl AuditGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next request number, handed out before admission is decided.
    pub fn admit(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn try_claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Poll until the gate can be claimed; a hard `Busy` failure when the
    /// budget runs out.
    pub async fn acquire(&self, opts: &PollOptions) -> Result<GateGuard<'_>, AuditError> {
        let outcome = wait_for_truthy::<(), Infallible, _, _>(opts, || async {
            Ok(self.try_claim().then_some(()))
        })
        .await;
        match outcome {
            Ok(Some(())) => {
                trace!("gate claimed");
                Ok(GateGuard { gate: self })
            }
            Ok(None) | Err(_) => Err(AuditError::Busy(opts.timeout)),
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::SeqCst);
        trace!("gate released");
    }
}
