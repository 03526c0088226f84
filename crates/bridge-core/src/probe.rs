//! Connectivity probing.
//!
//! A probe answers one question: does a TCP connection to `(host, port)`
//! succeed within the timeout? Every failure mode (refused, timed out,
//! unreachable, DNS) collapses to `false`. Retry policy belongs to callers.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Well-known host used to decide whether the internet is reachable.
pub const INTERNET_HOST: &str = "8.8.8.8";

/// DNS port on [`INTERNET_HOST`].
pub const INTERNET_PORT: u16 = 53;

/// Loopback address the local inference server listens on.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Default timeout for a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// A (host, port) pair to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A port on the loopback interface.
    pub fn loopback(port: u16) -> Self {
        Self::new(LOOPBACK_HOST, port)
    }

    /// The fixed internet reachability target.
    pub fn internet() -> Self {
        Self::new(INTERNET_HOST, INTERNET_PORT)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Reachability check against an endpoint.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Returns `true` iff a transport-level connection succeeds within `timeout`.
    async fn reachable(&self, endpoint: &Endpoint, timeout: Duration) -> bool;
}

/// Probe backed by a real TCP connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn reachable(&self, endpoint: &Endpoint, timeout: Duration) -> bool {
        probe(&endpoint.host, endpoint.port, timeout).await
    }
}

/// Attempt one TCP connection to `host:port`, bounded by `timeout`.
///
/// The socket is dropped immediately on success.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Probe {}:{} failed: {}", host, port, e);
            false
        }
        Err(_) => {
            debug!("Probe {}:{} timed out after {:?}", host, port, timeout);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_accepting_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        assert!(probe("127.0.0.1", port, Duration::from_secs(1)).await);
        assert!(
            TcpProbe
                .reachable(&Endpoint::loopback(port), Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        // Bind then drop so the port is known to be free.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };

        assert!(!probe("127.0.0.1", port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_unresolvable_host() {
        assert!(!probe("host.invalid", 80, Duration::from_millis(500)).await);
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::loopback(11434).to_string(), "127.0.0.1:11434");
        assert_eq!(Endpoint::internet().to_string(), "8.8.8.8:53");
    }
}
