//! Device endpoint URLs
//!
//! The Device lives at a fixed address on the local network, typically the
//! access point it serves itself (`192.168.4.1`). All three endpoints are
//! derived from that one address and validated once, up front, so the rest
//! of the crate works with `Url` values that are known good.

use url::Url;

use waypost_core::{Error, Result};

/// Validated endpoint set for one Device address.
#[derive(Debug, Clone)]
pub struct DeviceEndpoints {
    address: String,
    ws_url: Url,
    status_url: Url,
    ingest_url: Url,
}

impl DeviceEndpoints {
    /// Build the endpoint set from a bare host or host:port address.
    ///
    /// The address must not carry a scheme; the schemes are fixed by the
    /// Device firmware (`ws://` for the channel, `http://` for the rest).
    pub fn new(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::config_invalid("device address is empty"));
        }
        if address.contains("://") {
            return Err(Error::config_invalid(format!(
                "device address must be a bare host or host:port, got '{address}'"
            )));
        }

        let ws_url = Url::parse(&format!("ws://{address}/ws"))
            .map_err(|err| Error::config_invalid(format!("invalid device address '{address}': {err}")))?;
        let status_url = Url::parse(&format!("http://{address}/api/status"))
            .map_err(|err| Error::config_invalid(format!("invalid device address '{address}': {err}")))?;
        let ingest_url = Url::parse(&format!("http://{address}/api/send_location"))
            .map_err(|err| Error::config_invalid(format!("invalid device address '{address}': {err}")))?;

        Ok(Self {
            address: address.to_string(),
            ws_url,
            status_url,
            ingest_url,
        })
    }

    /// The address this set was built from, as configured.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Event channel URL (`ws://<address>/ws`).
    pub fn ws_url(&self) -> &str {
        self.ws_url.as_str()
    }

    /// Health probe URL (`http://<address>/api/status`).
    pub fn status_url(&self) -> &Url {
        &self.status_url
    }

    /// Location ingest URL (`http://<address>/api/send_location`).
    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_bare_host() {
        let ep = DeviceEndpoints::new("192.168.4.1").unwrap();
        assert_eq!(ep.address(), "192.168.4.1");
        assert_eq!(ep.ws_url(), "ws://192.168.4.1/ws");
        assert_eq!(ep.status_url().as_str(), "http://192.168.4.1/api/status");
        assert_eq!(
            ep.ingest_url().as_str(),
            "http://192.168.4.1/api/send_location"
        );
    }

    #[test]
    fn test_endpoints_from_host_with_port() {
        let ep = DeviceEndpoints::new("127.0.0.1:8032").unwrap();
        assert_eq!(ep.ws_url(), "ws://127.0.0.1:8032/ws");
        assert_eq!(
            ep.status_url().as_str(),
            "http://127.0.0.1:8032/api/status"
        );
    }

    #[test]
    fn test_endpoints_trims_whitespace() {
        let ep = DeviceEndpoints::new("  192.168.4.1 ").unwrap();
        assert_eq!(ep.address(), "192.168.4.1");
    }

    #[test]
    fn test_empty_address_rejected() {
        assert!(DeviceEndpoints::new("").is_err());
        assert!(DeviceEndpoints::new("   ").is_err());
    }

    #[test]
    fn test_address_with_scheme_rejected() {
        assert!(DeviceEndpoints::new("http://192.168.4.1").is_err());
        assert!(DeviceEndpoints::new("ws://192.168.4.1").is_err());
    }

    #[test]
    fn test_unparseable_address_rejected() {
        assert!(DeviceEndpoints::new("host with spaces").is_err());
    }
}
