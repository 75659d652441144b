//! Single-flight location pipeline
//!
//! [`LocationPipeline`] runs the grant → fix → deliver sequence for one
//! trigger at a time. A trigger that arrives while a run is in progress is
//! rejected with [`Error::Busy`] rather than queued; the next press of the
//! button is the retry.
//!
//! The pipeline keeps three pieces of state that observers read without
//! blocking an in-flight run: the current [`PipelinePhase`], the most recent
//! [`Fix`] (kept across later failures), and the most recent successful
//! [`DeliveryRecord`] (set only on success, never cleared). State changes
//! are also published as [`PipelineEvent`]s on a broadcast channel.

use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;

use waypost_core::{DeliveryRecord, Error, Fix, FixRequest, PipelinePhase, Result};
use waypost_device::DeliveryClient;

use crate::source::{LocationSource, SourceError};

/// Capacity of the pipeline event channel. Slow subscribers lag and miss
/// events rather than stall a run.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sink the pipeline hands acquired fixes to.
///
/// In production this is [`DeliveryClient`]; tests substitute scripted
/// deliverers.
#[trait_variant::make(FixDeliverer: Send)]
pub trait LocalFixDeliverer {
    /// Deliver one fix, making exactly one attempt.
    async fn deliver(&self, fix: &Fix) -> Result<()>;
}

impl FixDeliverer for DeliveryClient {
    async fn deliver(&self, fix: &Fix) -> Result<()> {
        DeliveryClient::deliver(self, fix).await
    }
}

/// Notification of one pipeline state change.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    PhaseChanged(PipelinePhase),
    FixStored(Fix),
    DeliveryRecorded(DeliveryRecord),
}

/// Runs the acquire-and-deliver sequence, one trigger at a time.
pub struct LocationPipeline<S, D> {
    source: S,
    deliverer: D,
    request: FixRequest,
    phase: RwLock<PipelinePhase>,
    last_fix: RwLock<Option<Fix>>,
    last_delivery: RwLock<Option<DeliveryRecord>>,
    events: broadcast::Sender<PipelineEvent>,
}

impl<S, D> LocationPipeline<S, D>
where
    S: LocationSource,
    D: FixDeliverer,
{
    pub fn new(source: S, deliverer: D, request: FixRequest) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            deliverer,
            request,
            phase: RwLock::new(PipelinePhase::Idle),
            last_fix: RwLock::new(None),
            last_delivery: RwLock::new(None),
            events,
        }
    }

    /// Subscribe to pipeline state changes.
    ///
    /// Each subscriber gets every event from subscription onward; a
    /// subscriber that falls more than the channel capacity behind misses
    /// the overwritten events but stays subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Current phase.
    pub fn phase(&self) -> PipelinePhase {
        *self.phase.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Most recently acquired fix, surviving later failed runs.
    pub fn last_fix(&self) -> Option<Fix> {
        *self.last_fix.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Record of the most recent successful delivery, if any.
    pub fn last_delivery(&self) -> Option<DeliveryRecord> {
        *self.last_delivery.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire a fix without delivering it.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if a run is already in progress.
    /// - [`Error::PermissionDenied`] if the positioning grant was refused.
    /// - [`Error::Acquisition`] if the source failed to produce a fix.
    pub async fn acquire_only(&self) -> Result<Fix> {
        self.begin()?;

        let fix = match self.acquire().await {
            Ok(fix) => fix,
            Err(err) => {
                self.set_phase(PipelinePhase::Idle);
                return Err(err);
            }
        };

        self.store_fix(fix);
        self.set_phase(PipelinePhase::Idle);
        Ok(fix)
    }

    /// Run the full sequence: grant, fix, deliver.
    ///
    /// An acquired fix is stored before delivery is attempted, so a failed
    /// delivery still leaves the fix behind. The delivery record is updated
    /// only when the Device acknowledged the delivery.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if a run is already in progress.
    /// - [`Error::PermissionDenied`] if the positioning grant was refused.
    /// - [`Error::Acquisition`] if the source failed to produce a fix.
    /// - [`Error::Delivery`] if the Device did not acknowledge the fix.
    pub async fn acquire_and_deliver(&self) -> Result<DeliveryRecord> {
        self.begin()?;

        let fix = match self.acquire().await {
            Ok(fix) => fix,
            Err(err) => {
                self.set_phase(PipelinePhase::Idle);
                return Err(err);
            }
        };

        self.store_fix(fix);
        self.set_phase(PipelinePhase::Sending);

        match self.deliverer.deliver(&fix).await {
            Ok(()) => {
                let record = DeliveryRecord::now();
                self.store_delivery(record);
                self.set_phase(PipelinePhase::Idle);
                Ok(record)
            }
            Err(err) => {
                self.set_phase(PipelinePhase::Idle);
                Err(err)
            }
        }
    }

    /// Claim the pipeline for one run.
    ///
    /// The test-and-set happens under a single write lock so two racing
    /// triggers cannot both claim an idle pipeline.
    fn begin(&self) -> Result<()> {
        {
            let mut phase = self.phase.write().unwrap_or_else(|e| e.into_inner());
            if *phase != PipelinePhase::Idle {
                return Err(Error::Busy);
            }
            *phase = PipelinePhase::Acquiring;
        }
        self.notify(PipelineEvent::PhaseChanged(PipelinePhase::Acquiring));
        Ok(())
    }

    async fn acquire(&self) -> Result<Fix> {
        if !self.source.request_grant().await {
            debug!("Positioning grant denied, aborting acquisition");
            return Err(Error::PermissionDenied);
        }

        match self.source.request_fix(&self.request).await {
            Ok(fix) => Ok(fix),
            Err(SourceError::PermissionDenied) => Err(Error::PermissionDenied),
            Err(err) => Err(Error::acquisition(err.to_string())),
        }
    }

    fn set_phase(&self, next: PipelinePhase) {
        {
            let mut phase = self.phase.write().unwrap_or_else(|e| e.into_inner());
            *phase = next;
        }
        self.notify(PipelineEvent::PhaseChanged(next));
    }

    fn store_fix(&self, fix: Fix) {
        {
            let mut last = self.last_fix.write().unwrap_or_else(|e| e.into_inner());
            *last = Some(fix);
        }
        self.notify(PipelineEvent::FixStored(fix));
    }

    fn store_delivery(&self, record: DeliveryRecord) {
        {
            let mut last = self.last_delivery.write().unwrap_or_else(|e| e.into_inner());
            *last = Some(record);
        }
        self.notify(PipelineEvent::DeliveryRecorded(record));
    }

    fn notify(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
