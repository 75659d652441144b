//! Decoding of Device event-channel frames
//!
//! The Device pushes small JSON objects over the event channel, each with an
//! `event` field naming the notification:
//!
//! ```json
//! {"event": "buttonPressed"}
//! ```
//!
//! Decoding is deliberately tolerant: anything that is not a JSON object
//! with a string `event` field parses to `None` and is dropped by the
//! caller. An object naming an event we do not handle decodes to
//! [`DeviceMessage::Unknown`] so it can be traced without being treated as
//! a failure.

use serde::Deserialize;
use serde_json::Value;

/// Raw shape of one channel frame. Extra fields are tolerated and ignored.
#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    params: Value,
}

/// Decoded form of one raw event-channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    /// The hardware button on the Device was pressed.
    ButtonPressed,
    /// A well-formed frame naming an event we do not handle.
    Unknown { event: String, params: Value },
}

impl DeviceMessage {
    /// Decode one raw frame.
    ///
    /// Returns `None` for anything that is not a JSON object carrying a
    /// string `event` field. Malformed input is not an error here; the
    /// channel may carry traffic for other consumers.
    pub fn parse(text: &str) -> Option<Self> {
        let raw: RawEvent = serde_json::from_str(text.trim()).ok()?;
        Some(match raw.event.as_str() {
            "buttonPressed" => DeviceMessage::ButtonPressed,
            _ => DeviceMessage::Unknown {
                event: raw.event,
                params: raw.params,
            },
        })
    }

    /// Short human-readable summary for log lines.
    pub fn summary(&self) -> String {
        match self {
            DeviceMessage::ButtonPressed => "buttonPressed".to_string(),
            DeviceMessage::Unknown { event, .. } => format!("unknown({event})"),
        }
    }
}
