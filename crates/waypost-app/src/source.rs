//! Location source seam
//!
//! This module provides the LocationSource trait, the pipeline's view of
//! whatever platform positioning facility the binary is built against. The
//! pipeline asks for a grant first and a fix second; sources that have no
//! grant concept answer `true` unconditionally.

use chrono::Utc;
use thiserror::Error;

use waypost_core::{Fix, FixRequest};

/// Ways a source can fail to produce a fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The platform denied (or revoked) the positioning grant.
    #[error("positioning grant denied")]
    PermissionDenied,
    /// No fix arrived within the requested timeout.
    #[error("timed out waiting for a fix")]
    Timeout,
    /// The source cannot produce fixes at all right now.
    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SourceError::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Positioning facility the pipeline acquires fixes from.
///
/// The pipeline is generic over this trait so tests can script grants and
/// fixes without any platform plumbing.
#[trait_variant::make(LocationSource: Send)]
pub trait LocalLocationSource {
    /// Ask for (or confirm) the positioning grant.
    ///
    /// Returns `false` when positioning is not permitted. Never errors; a
    /// denial is an expected answer.
    async fn request_grant(&self) -> bool;

    /// Acquire one position fix honoring the request parameters.
    async fn request_fix(&self, request: &FixRequest) -> std::result::Result<Fix, SourceError>;
}

/// Source that reports a fixed position configured up front.
///
/// Stands in for platform positioning on hosts that have none. The reported
/// fix carries the configured coordinates with a fresh capture time.
#[derive(Debug, Clone)]
pub struct PresetSource {
    latitude: f64,
    longitude: f64,
    accuracy: f64,
}

impl PresetSource {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }
}

impl LocationSource for PresetSource {
    async fn request_grant(&self) -> bool {
        true
    }

    async fn request_fix(&self, _request: &FixRequest) -> std::result::Result<Fix, SourceError> {
        Ok(Fix::new(
            self.latitude,
            self.longitude,
            self.accuracy,
            Utc::now(),
        ))
    }
}
