//! Coordinator runner - wires the Device transport to the pipeline
//!
//! `run` is the long-lived mode: it supervises the event channel, routes
//! Device triggers into the pipeline, mirrors state changes onto the NDJSON
//! report stream, and accepts one-letter commands on stdin. The one-shot
//! entry points (`probe_once`, `locate_once`, `send_once`) perform a single
//! operation and exit.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use waypost_app::{EventRouter, LocationPipeline, PipelineEvent, PresetSource, Settings};
use waypost_core::{ConnectionState, Result};
use waypost_device::{
    build_http_client, ConnectionSupervisor, DeliveryClient, DeviceEndpoints, HealthProbe,
};

use crate::report::ReportEvent;

/// Capacity of the stdin command channel.
const CMD_CHANNEL_CAPACITY: usize = 8;

/// Commands accepted on stdin while the coordinator runs.
enum Command {
    Locate,
    Send,
    Probe,
    Quit,
}

type CoordinatorPipeline = LocationPipeline<PresetSource, DeliveryClient>;

/// Everything built from settings that the run loop and the one-shot
/// entry points share.
struct Coordinator {
    endpoints: DeviceEndpoints,
    probe: Arc<HealthProbe>,
    pipeline: Arc<CoordinatorPipeline>,
}

fn build(settings: &Settings) -> Result<Coordinator> {
    let endpoints = DeviceEndpoints::new(&settings.device.address)?;
    let http = build_http_client()?;
    let timeout = settings.device.request_timeout();

    let probe = Arc::new(HealthProbe::new(http.clone(), &endpoints, timeout));
    let delivery = DeliveryClient::new(http, &endpoints, timeout);
    let source = PresetSource::new(
        settings.source.preset.latitude,
        settings.source.preset.longitude,
        settings.source.preset.accuracy,
    );
    let pipeline = Arc::new(LocationPipeline::new(
        source,
        delivery,
        settings.source.fix_request(),
    ));

    Ok(Coordinator {
        endpoints,
        probe,
        pipeline,
    })
}

/// Run the coordinator until stdin asks to quit or the process is
/// interrupted.
pub async fn run(settings: Settings) -> Result<()> {
    let coordinator = build(&settings)?;
    let router = EventRouter::new(Arc::clone(&coordinator.pipeline));

    let mut supervisor = ConnectionSupervisor::new(&coordinator.endpoints);
    let mut state_rx = supervisor.watch_state();
    let mut pipeline_events = coordinator.pipeline.subscribe();

    supervisor.start().await?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(CMD_CHANNEL_CAPACITY);
    std::thread::spawn(move || read_stdin_commands(cmd_tx));

    info!(
        "Coordinator running against {}",
        coordinator.endpoints.address()
    );

    loop {
        tokio::select! {
            frame = supervisor.frame_receiver().recv() => {
                match frame {
                    Some(frame) => router.route(&frame),
                    None => {
                        error!("Frame channel closed, exiting");
                        break;
                    }
                }
            }

            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                match state {
                    ConnectionState::Connected => {
                        ReportEvent::channel_connected(coordinator.endpoints.address()).emit();
                    }
                    ConnectionState::Disconnected => {
                        ReportEvent::channel_disconnected(coordinator.endpoints.address()).emit();
                    }
                }
            }

            event = pipeline_events.recv() => {
                match event {
                    Ok(event) => report_pipeline_event(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Report stream lagged, {} pipeline event(s) dropped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Locate) => {
                        let pipeline = Arc::clone(&coordinator.pipeline);
                        tokio::spawn(async move {
                            if let Err(err) = pipeline.acquire_only().await {
                                ReportEvent::operation_failed("locate", err.to_string()).emit();
                            }
                        });
                    }
                    Some(Command::Send) => {
                        let pipeline = Arc::clone(&coordinator.pipeline);
                        tokio::spawn(async move {
                            if let Err(err) = pipeline.acquire_and_deliver().await {
                                ReportEvent::operation_failed("send", err.to_string()).emit();
                            }
                        });
                    }
                    Some(Command::Probe) => {
                        let probe = Arc::clone(&coordinator.probe);
                        tokio::spawn(async move {
                            let outcome = probe.check().await;
                            ReportEvent::probe_completed(outcome.is_reachable()).emit();
                        });
                    }
                    Some(Command::Quit) | None => {
                        info!("Quit requested");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    supervisor.stop().await;
    Ok(())
}

/// Probe the Device once and report the outcome.
///
/// Exits nonzero when the Device is unreachable so scripts can branch on
/// the result.
pub async fn probe_once(settings: &Settings) -> Result<()> {
    let coordinator = build(settings)?;
    let outcome = coordinator.probe.check().await;
    ReportEvent::probe_completed(outcome.is_reachable()).emit();

    if !outcome.is_reachable() {
        std::process::exit(1);
    }
    Ok(())
}

/// Acquire one fix and report it without delivering.
pub async fn locate_once(settings: &Settings) -> Result<()> {
    let coordinator = build(settings)?;
    match coordinator.pipeline.acquire_only().await {
        Ok(fix) => {
            ReportEvent::fix_acquired(&fix).emit();
            Ok(())
        }
        Err(err) => {
            ReportEvent::operation_failed("locate", err.to_string()).emit();
            Err(err)
        }
    }
}

/// Acquire one fix and deliver it to the Device.
pub async fn send_once(settings: &Settings) -> Result<()> {
    let coordinator = build(settings)?;
    match coordinator.pipeline.acquire_and_deliver().await {
        Ok(record) => {
            ReportEvent::delivery_completed(&record).emit();
            Ok(())
        }
        Err(err) => {
            ReportEvent::operation_failed("send", err.to_string()).emit();
            Err(err)
        }
    }
}

/// Mirror one pipeline event onto the report stream.
fn report_pipeline_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::PhaseChanged(phase) => ReportEvent::phase_changed(*phase).emit(),
        PipelineEvent::FixStored(fix) => ReportEvent::fix_acquired(fix).emit(),
        PipelineEvent::DeliveryRecorded(record) => ReportEvent::delivery_completed(record).emit(),
    }
}

/// Read one-letter commands from stdin and forward them to the run loop
/// (blocking version, runs on its own thread).
fn read_stdin_commands(cmd_tx: mpsc::Sender<Command>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                match trimmed {
                    "l" | "locate" => {
                        info!("Stdin: locate requested");
                        let _ = cmd_tx.blocking_send(Command::Locate);
                    }
                    "s" | "send" => {
                        info!("Stdin: send requested");
                        let _ = cmd_tx.blocking_send(Command::Send);
                    }
                    "p" | "probe" => {
                        info!("Stdin: probe requested");
                        let _ = cmd_tx.blocking_send(Command::Probe);
                    }
                    "q" | "quit" => {
                        info!("Stdin: quit requested");
                        let _ = cmd_tx.blocking_send(Command::Quit);
                        break;
                    }
                    "" => {
                        // Ignore empty lines
                    }
                    _ => {
                        warn!("Unknown stdin command: {}", trimmed);
                    }
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_with_default_settings() {
        let coordinator = build(&Settings::default()).unwrap();
        assert_eq!(coordinator.endpoints.address(), "192.168.4.1");
        assert_eq!(
            coordinator.endpoints.ws_url(),
            "ws://192.168.4.1/ws"
        );
    }

    #[tokio::test]
    async fn test_build_rejects_bad_address() {
        let mut settings = Settings::default();
        settings.device.address = "http://192.168.4.1".to_string();
        assert!(build(&settings).is_err());
    }
}
