//! NDJSON report stream for the coordinator
//!
//! The coordinator writes structured JSON events to stdout, one per line,
//! so whatever launched it (a shell script, a supervisor process, a test
//! harness) can follow along without scraping log text. Diagnostics go to
//! the tracing log file, never to stdout.
//!
//! # Example Output
//!
//! ```json
//! {"event":"channel_connected","device":"192.168.4.1","timestamp":1704700001000}
//! {"event":"phase_changed","phase":"acquiring","timestamp":1704700002000}
//! {"event":"fix_acquired","latitude":51.5007,"longitude":-0.1246,"accuracy":4.5,"captured_at":"2024-01-08T08:26:42+00:00","timestamp":1704700002500}
//! {"event":"delivery_completed","sent_at":"2024-01-08T08:26:43+00:00","timestamp":1704700003000}
//! ```

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use waypost_core::{DeliveryRecord, Fix, PipelinePhase};

/// Events emitted on the report stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    /// Event channel to the Device is open
    ChannelConnected { device: String, timestamp: i64 },

    /// Event channel closed; the supervisor keeps retrying
    ChannelDisconnected { device: String, timestamp: i64 },

    /// Pipeline moved to a new phase
    PhaseChanged { phase: String, timestamp: i64 },

    /// A position fix was acquired
    FixAcquired {
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        captured_at: String,
        timestamp: i64,
    },

    /// The Device acknowledged a delivered fix
    DeliveryCompleted { sent_at: String, timestamp: i64 },

    /// A requested operation failed
    OperationFailed {
        operation: String,
        error: String,
        timestamp: i64,
    },

    /// Result of a reachability probe
    ProbeCompleted { reachable: bool, timestamp: i64 },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl ReportEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        // Serialize to JSON
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize report event: {}", e);
                return;
            }
        };

        // Write to stdout with newline (NDJSON format)
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write report event to stdout: {}", e);
            return;
        }

        // Flush to ensure immediate output
        if let Err(e) = stdout.flush() {
            error!("Failed to flush report stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn channel_connected(device: &str) -> Self {
        Self::ChannelConnected {
            device: device.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn channel_disconnected(device: &str) -> Self {
        Self::ChannelDisconnected {
            device: device.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn phase_changed(phase: PipelinePhase) -> Self {
        Self::PhaseChanged {
            phase: phase.label().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn fix_acquired(fix: &Fix) -> Self {
        Self::FixAcquired {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            captured_at: fix.captured_at.to_rfc3339(),
            timestamp: Self::now(),
        }
    }

    pub fn delivery_completed(record: &DeliveryRecord) -> Self {
        Self::DeliveryCompleted {
            sent_at: record.sent_at.to_rfc3339(),
            timestamp: Self::now(),
        }
    }

    pub fn operation_failed(operation: &str, error: String) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            error,
            timestamp: Self::now(),
        }
    }

    pub fn probe_completed(reachable: bool) -> Self {
        Self::ProbeCompleted {
            reachable,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
