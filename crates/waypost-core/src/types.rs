//! Core domain types shared across all Waypost crates

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Fix
// ─────────────────────────────────────────────────────────────────

/// One geographic position measurement.
///
/// A `Fix` is immutable once captured: re-acquisition produces a new value,
/// it never mutates an old one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Accuracy radius in meters. Never negative.
    pub accuracy: f64,
    /// When the measurement was taken.
    pub captured_at: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            captured_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// ConnectionState
// ─────────────────────────────────────────────────────────────────

/// State of the Device event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No channel open. A reconnect attempt may be pending.
    #[default]
    Disconnected,
    /// Channel open and receiving.
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Short lowercase name, suitable for log lines and report events.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// PipelinePhase
// ─────────────────────────────────────────────────────────────────

/// Phase of the location pipeline.
///
/// There is exactly one pipeline per coordinator, so exactly one phase value
/// exists at a time. Every operation returns the phase to [`Idle`] on every
/// path, success or failure.
///
/// [`Idle`]: PipelinePhase::Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelinePhase {
    /// No operation running; the pipeline will accept a trigger.
    #[default]
    Idle,
    /// Waiting on the location source (grant and fix).
    Acquiring,
    /// Pushing an acquired fix to the Device.
    Sending,
}

impl PipelinePhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, PipelinePhase::Idle)
    }

    /// Short lowercase name, suitable for log lines and report events.
    pub fn label(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Acquiring => "acquiring",
            PipelinePhase::Sending => "sending",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// DeliveryRecord
// ─────────────────────────────────────────────────────────────────

/// Proof of the most recent successful delivery.
///
/// Set only when the Device confirms receipt; a later failed delivery never
/// clears or regresses it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// When the Device acknowledged the delivery.
    pub sent_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Record stamped with the current time.
    pub fn now() -> Self {
        Self {
            sent_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// FixRequest
// ─────────────────────────────────────────────────────────────────

/// Options forwarded to the location source for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixRequest {
    /// Prefer the high-accuracy positioning mode.
    pub high_accuracy: bool,
    /// How long the source may spend producing a fix.
    pub timeout: Duration,
    /// Oldest cached fix the source may return. Zero means a cached fix is
    /// never acceptable.
    pub max_cache_age: Duration,
}

impl Default for FixRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_cache_age: Duration::ZERO,
        }
    }
}
