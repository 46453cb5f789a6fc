use std::time::Duration;

use thiserror::Error;

use crate::browser::BrowserError;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("no audit slot became available within {0:?}")]
    Busy(Duration),
    #[error("audit engine failed: {0}")]
    Engine(String),
}
