//! Shared HTTP client construction
//!
//! One `reqwest::Client` is built at startup and cloned into the probe and
//! delivery clients; cloning shares the underlying connection pool.

use std::time::Duration;

use waypost_core::{Error, Result};

/// Upper bound for any request issued through this client. Individual
/// requests set their own, much shorter, per-request timeouts.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used for all Device endpoint requests.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .map_err(|err| Error::http(format!("failed to build HTTP client: {err}")))
}
