mod error;
mod launcher;
mod probe;
mod supervisor;

pub use error::{BrowserError, BrowserResult};
pub use launcher::{kill_process_group, BrowserHandle, LaunchBrowser, ProcessLauncher};
pub use probe::{ReadinessProbe, TcpProbe};
pub use supervisor::{BrowserSupervisor, LaunchState, SupervisorSettings};
