use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

/// A single readiness check against the browser's control port. Retry
/// cadence comes from wrapping a probe in the poll primitive.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self) -> bool;
}

/// Probes by opening a raw TCP connection to the control port. Never
/// errors; the socket is dropped before the probe resolves on both paths.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn is_ready(&self) -> bool {
        match TcpStream::connect(("127.0.0.1", self.port)).await {
            Ok(stream) => {
                drop(stream);
                debug!(port = self.port, "control port accepting connections");
                true
            }
            Err(err) => {
                debug!(port = self.port, error = %err, "control port not ready");
                false
            }
        }
    }
}
