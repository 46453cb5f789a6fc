mod coordinator;
mod engine;
mod error;
mod gate;

pub use coordinator::{AuditCoordinator, AuditService, CoordinatorSettings};
pub use engine::{AuditEngine, AuditOutcome, AuditRequest, LighthouseCli, OutputFormat};
pub use error::{AuditError, AuditResult};
pub use gate::{AuditGate, GateGuard};
