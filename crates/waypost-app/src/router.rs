//! Routing of raw event-channel frames
//!
//! The supervisor forwards frames verbatim; this is where they are decoded
//! and acted on. Undecodable frames are discarded silently (the channel is
//! not exclusively ours to police) and recognized triggers are handed to
//! the pipeline on a detached task so routing never blocks the channel.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use waypost_core::{DeviceMessage, Error};

use crate::pipeline::{FixDeliverer, LocationPipeline};
use crate::source::LocationSource;

/// Decodes Device events and triggers pipeline runs.
pub struct EventRouter<S, D> {
    pipeline: Arc<LocationPipeline<S, D>>,
}

impl<S, D> EventRouter<S, D>
where
    S: LocationSource + Sync + 'static,
    D: FixDeliverer + Sync + 'static,
{
    pub fn new(pipeline: Arc<LocationPipeline<S, D>>) -> Self {
        Self { pipeline }
    }

    /// Route one raw frame.
    ///
    /// Returns immediately. A `buttonPressed` event starts one fire-and-forget
    /// pipeline run; its outcome is logged, not returned, and a run rejected
    /// because the pipeline is busy is dropped rather than queued.
    pub fn route(&self, raw: &str) {
        let Some(message) = DeviceMessage::parse(raw) else {
            trace!("Discarding undecodable frame ({} bytes)", raw.len());
            return;
        };

        match message {
            DeviceMessage::ButtonPressed => {
                info!("Device button pressed, starting location run");
                let pipeline = Arc::clone(&self.pipeline);
                tokio::spawn(async move {
                    match pipeline.acquire_and_deliver().await {
                        Ok(record) => {
                            info!("Location delivered at {}", record.sent_at);
                        }
                        Err(Error::Busy) => {
                            debug!("Pipeline busy, trigger dropped");
                        }
                        Err(err) => {
                            warn!("Triggered location run failed: {}", err);
                        }
                    }
                });
            }
            DeviceMessage::Unknown { event, .. } => {
                debug!("Ignoring unrecognized device event: {}", event);
            }
        }
    }
}
