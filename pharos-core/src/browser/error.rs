use std::time::Duration;

use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no browser executable found in any known install location")]
    ExecutableNotFound,
    #[error("browser spawn failed: {0}")]
    Spawn(String),
    #[error("browser did not become ready within {0:?}")]
    LaunchTimeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
