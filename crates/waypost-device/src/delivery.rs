//! Location delivery
//!
//! One `POST /api/send_location` per fix, no retry. If the Device does not
//! acknowledge with a success status the attempt failed and the caller
//! decides what to do with that; a stale position silently retried later
//! would be worse than a reported failure.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use waypost_core::{Error, Fix, Result};

use crate::endpoints::DeviceEndpoints;

/// Wire shape of the ingest request body.
#[derive(Debug, Serialize)]
struct LocationPayload {
    latitude: f64,
    longitude: f64,
    accuracy: f64,
    timestamp: String,
}

impl LocationPayload {
    fn from_fix(fix: &Fix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            timestamp: fix.captured_at.to_rfc3339(),
        }
    }
}

/// Sends acquired fixes to the Device's ingest endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: Client,
    ingest_url: Url,
    timeout: Duration,
}

impl DeliveryClient {
    pub fn new(http: Client, endpoints: &DeviceEndpoints, timeout: Duration) -> Self {
        Self {
            http,
            ingest_url: endpoints.ingest_url().clone(),
            timeout,
        }
    }

    /// Deliver one fix. Exactly one request is issued per call.
    pub async fn deliver(&self, fix: &Fix) -> Result<()> {
        let payload = LocationPayload::from_fix(fix);

        let response = self
            .http
            .post(self.ingest_url.clone())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| Error::delivery(format!("request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            debug!("Delivered fix to {}", self.ingest_url);
            Ok(())
        } else {
            Err(Error::delivery(format!("device returned status {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_http_client;
    use crate::test_utils::{spawn_http_stub, unused_local_addr};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::Ordering;

    fn sample_fix() -> Fix {
        let captured_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 45).unwrap();
        Fix::new(51.5007, -0.1246, 4.5, captured_at)
    }

    fn client_for(addr: std::net::SocketAddr) -> DeliveryClient {
        let endpoints = DeviceEndpoints::new(&addr.to_string()).unwrap();
        DeliveryClient::new(build_http_client().unwrap(), &endpoints, Duration::from_secs(2))
    }

    #[test]
    fn test_payload_shape() {
        let payload = LocationPayload::from_fix(&sample_fix());
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["latitude"], 51.5007);
        assert_eq!(value["longitude"], -0.1246);
        assert_eq!(value["accuracy"], 4.5);
        assert_eq!(value["timestamp"], "2024-06-01T12:30:45+00:00");
    }

    #[tokio::test]
    async fn test_deliver_posts_fix_as_json() {
        let (addr, mut requests, _) = spawn_http_stub("200 OK").await;
        let client = client_for(addr);

        client.deliver(&sample_fix()).await.unwrap();

        let request = requests.recv().await.unwrap();
        assert!(request.head.starts_with("POST /api/send_location "));

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["latitude"], 51.5007);
        assert_eq!(body["longitude"], -0.1246);
        assert_eq!(body["accuracy"], 4.5);
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_deliver_rejection_is_error() {
        let (addr, _requests, _) = spawn_http_stub("400 Bad Request").await;
        let client = client_for(addr);

        let err = client.deliver(&sample_fix()).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_deliver_refused_connection_is_error() {
        let addr = unused_local_addr().await;
        let client = client_for(addr);

        assert!(client.deliver(&sample_fix()).await.is_err());
    }

    #[tokio::test]
    async fn test_deliver_makes_exactly_one_attempt() {
        let (addr, _requests, hits) = spawn_http_stub("503 Service Unavailable").await;
        let client = client_for(addr);

        let _ = client.deliver(&sample_fix()).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
