//! # waypost-core - Core Domain Types
//!
//! Foundation crate for Waypost. Provides the domain types, error handling,
//! Device event decoding, and logging setup shared by the other crates.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Fix`] - One geographic position measurement (immutable once captured)
//! - [`ConnectionState`] - Event channel state (Disconnected, Connected)
//! - [`PipelinePhase`] - Location pipeline phase (Idle, Acquiring, Sending)
//! - [`DeliveryRecord`] - Timestamp of the last confirmed delivery
//! - [`FixRequest`] - Acquisition options forwarded to the location source
//!
//! ### Events (`events`)
//! - [`DeviceMessage`] - Decoded form of one raw event-channel frame
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use waypost_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all Waypost crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::DeviceMessage;
pub use types::{ConnectionState, DeliveryRecord, Fix, FixRequest, PipelinePhase};
