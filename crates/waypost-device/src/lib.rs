//! # waypost-device - Device Transport
//!
//! Talks to the Device over its two surfaces:
//!
//! - **Event channel**: a supervised WebSocket (`ws://<address>/ws`) that the
//!   Device pushes JSON event frames over. [`ConnectionSupervisor`] owns the
//!   connection, reconnects on a fixed cadence, and forwards raw frames.
//! - **HTTP endpoints**: short-lived requests for the health probe
//!   (`GET /api/status`) and location delivery (`POST /api/send_location`).
//!
//! ## Public API
//!
//! - [`DeviceEndpoints`]: validated URLs derived from the Device address
//! - [`ConnectionSupervisor`]: owns the event channel, publishes
//!   [`waypost_core::ConnectionState`], forwards frames verbatim
//! - [`HealthProbe`] / [`ProbeOutcome`]: reachability check that never errors
//! - [`DeliveryClient`]: single-attempt location POST
//! - [`build_http_client`]: shared `reqwest` client constructor

pub mod delivery;
pub mod endpoints;
pub mod http;
pub mod probe;
pub mod supervisor;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use delivery::DeliveryClient;
pub use endpoints::DeviceEndpoints;
pub use http::build_http_client;
pub use probe::{HealthProbe, ProbeOutcome};
pub use supervisor::ConnectionSupervisor;
