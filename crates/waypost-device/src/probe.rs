//! Device health probe
//!
//! One `GET /api/status` with a bounded timeout. The probe never errors:
//! every failure mode (refused, timed out, non-2xx) collapses to
//! [`ProbeOutcome::Unreachable`], because "can't reach the Device" is an
//! answer, not a fault.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::endpoints::DeviceEndpoints;

/// Result of one reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The Device answered the status request with a success status.
    Reachable,
    /// No answer, a transport error, or a non-success status.
    Unreachable,
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Reachable => "reachable",
            ProbeOutcome::Unreachable => "unreachable",
        }
    }
}

/// Checks whether the Device answers on its status endpoint.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    http: Client,
    status_url: Url,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(http: Client, endpoints: &DeviceEndpoints, timeout: Duration) -> Self {
        Self {
            http,
            status_url: endpoints.status_url().clone(),
            timeout,
        }
    }

    /// Issue one status request. Completes within the configured timeout.
    pub async fn check(&self) -> ProbeOutcome {
        let response = self
            .http
            .get(self.status_url.clone())
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => ProbeOutcome::Reachable,
            Ok(response) => {
                debug!("Probe got non-success status {}", response.status());
                ProbeOutcome::Unreachable
            }
            Err(err) => {
                debug!("Probe request failed: {err}");
                ProbeOutcome::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_http_client;
    use crate::test_utils::{spawn_http_stub, spawn_silent_stub, unused_local_addr};

    fn probe_for(addr: std::net::SocketAddr, timeout: Duration) -> HealthProbe {
        let endpoints = DeviceEndpoints::new(&addr.to_string()).unwrap();
        HealthProbe::new(build_http_client().unwrap(), &endpoints, timeout)
    }

    #[tokio::test]
    async fn test_probe_success_is_reachable() {
        let (addr, mut requests, _) = spawn_http_stub("200 OK").await;
        let probe = probe_for(addr, Duration::from_secs(2));

        assert_eq!(probe.check().await, ProbeOutcome::Reachable);

        let request = requests.recv().await.unwrap();
        assert!(request.head.starts_with("GET /api/status "));
    }

    #[tokio::test]
    async fn test_probe_server_error_is_unreachable() {
        let (addr, _requests, _) = spawn_http_stub("500 Internal Server Error").await;
        let probe = probe_for(addr, Duration::from_secs(2));

        assert_eq!(probe.check().await, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn test_probe_refused_connection_is_unreachable() {
        let addr = unused_local_addr().await;
        let probe = probe_for(addr, Duration::from_secs(2));

        assert_eq!(probe.check().await, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unreachable() {
        let addr = spawn_silent_stub().await;
        let probe = probe_for(addr, Duration::from_millis(100));

        assert_eq!(probe.check().await, ProbeOutcome::Unreachable);
    }

    #[test]
    fn test_outcome_labels() {
        assert!(ProbeOutcome::Reachable.is_reachable());
        assert!(!ProbeOutcome::Unreachable.is_reachable());
        assert_eq!(ProbeOutcome::Reachable.label(), "reachable");
        assert_eq!(ProbeOutcome::Unreachable.label(), "unreachable");
    }
}
