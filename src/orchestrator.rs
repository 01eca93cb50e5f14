//! Process-group wiring.
//!
//! `Orchestrator::start` builds every channel and source up front, then spawns
//! one named thread per role. Any construction failure is fatal: already
//! started workers are stopped and joined before the error is returned.
//! `shutdown` raises the shared stop flag and joins everything.
//!
//! Worst-case stop latency per worker:
//! - capture, inference, sink: 1 ms poll plus one in-flight call (<= 250 ms)
//! - heading: 250 ms, position: 500 ms
//! - coordinate ingest: 50 ms accept poll, 250 ms client read timeout
//! - controller: 250 ms receive timeout plus the final halt request

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::command::{command_channel, CommandSender, ControlMessage};
use crate::config::PtzdConfig;
use crate::detect::{backend_from_spec, DetectionBackend};
use crate::frame::{FrameChannel, FrameReader, FrameWriter, FRAME_POLL_INTERVAL_MS};
use crate::ingest::{run_capture_worker, source_from_config, CoordinateIngest};
use crate::ptz::{PtzClient, PtzController};
use crate::sensors::{
    run_heading_worker, run_position_worker, FixedGps, FixedImu, HeadingEstimator,
};
use crate::shared::SharedState;
use crate::sink::FrameSink;
use crate::tracker::Tracker;

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    reported: bool,
}

pub struct Orchestrator {
    shared: Arc<SharedState>,
    commands: CommandSender,
    workers: Vec<Worker>,
    coordinate_addr: std::net::SocketAddr,
}

impl Orchestrator {
    pub fn start(config: &PtzdConfig) -> Result<Self> {
        let shared = SharedState::new();
        let shape = config.frame_shape()?;
        let (raw_writer, raw_reader) = FrameChannel::create("raw", shape)?;
        let (annotated_writer, annotated_reader) = FrameChannel::create("annotated", shape)?;
        let (commands, command_rx) = command_channel();

        let mut source = source_from_config(config.source_config()?)?;
        source.connect()?;
        let mut backend = backend_from_spec(&config.detector)?;
        backend.warm_up()?;
        let ingest = CoordinateIngest::bind(&config.ingest_addr)?;
        let coordinate_addr = ingest.local_addr();
        let sink = FrameSink::new(&config.sink_url)?;
        let controller = PtzController::new(PtzClient::new(config.ptz_client_config()));
        let tracker = Tracker::new(config.tracker_config(), Instant::now());

        let mut orchestrator = Self {
            shared: Arc::clone(&shared),
            commands: commands.clone(),
            workers: Vec::new(),
            coordinate_addr,
        };

        let spawned = (|| -> Result<()> {
            let s = Arc::clone(&shared);
            orchestrator.spawn("ptz-controller", move || controller.run(command_rx, s))?;

            let s = Arc::clone(&shared);
            orchestrator.spawn("capture", move || run_capture_worker(source, raw_writer, s))?;

            let s = Arc::clone(&shared);
            orchestrator.spawn("inference", move || {
                run_inference_worker(backend, raw_reader, annotated_writer, tracker, commands, s)
            })?;

            let s = Arc::clone(&shared);
            orchestrator.spawn("frame-sink", move || sink.run(annotated_reader, s))?;

            let s = Arc::clone(&shared);
            orchestrator.spawn("coordinate-ingest", move || ingest.run(s))?;

            if let Some(heading) = config.mount.heading_deg {
                let estimator = HeadingEstimator::new(config.mount.device_angle_deg);
                let s = Arc::clone(&shared);
                orchestrator.spawn("heading", move || {
                    run_heading_worker(Box::new(FixedImu::facing(heading)), estimator, s)
                })?;
            } else {
                log::warn!("no mount heading configured; slews use a zero heading offset");
            }

            if let Some((lon, lat)) = config.mount.position {
                let s = Arc::clone(&shared);
                orchestrator.spawn("position", move || {
                    run_position_worker(Box::new(FixedGps::at(lon, lat)), s)
                })?;
            } else {
                log::warn!("no mount position configured; coordinate slews are disabled");
            }
            Ok(())
        })();

        if let Err(e) = spawned {
            log::error!("startup failed: {:#}; stopping started workers", e);
            // Teardown errors are secondary to the startup failure.
            let _ = orchestrator.shutdown();
            return Err(e);
        }

        log::info!(
            "ptzd running: {} workers, camera {}, frames {}x{}",
            orchestrator.workers.len(),
            config.camera.host,
            shape.width,
            shape.height
        );
        Ok(orchestrator)
    }

    fn spawn<F>(&mut self, name: &'static str, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|e| anyhow!("spawn {} worker: {}", name, e))?;
        self.workers.push(Worker {
            name,
            handle,
            reported: false,
        });
        Ok(())
    }

    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    /// Sender for operator commands. Shares the controller's depth-1 queue.
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Bound address of the coordinate ingest listener.
    pub fn coordinate_addr(&self) -> std::net::SocketAddr {
        self.coordinate_addr
    }

    /// Log workers that ended while the system is still supposed to be running.
    /// Returns the number of workers that are no longer alive.
    pub fn check_health(&mut self) -> usize {
        let stopping = self.shared.is_stop_requested();
        let mut dead = 0;
        for worker in &mut self.workers {
            if !worker.handle.is_finished() {
                continue;
            }
            dead += 1;
            if !stopping && !worker.reported {
                log::error!("{} worker exited early", worker.name);
                worker.reported = true;
            }
        }
        dead
    }

    /// Stop every worker and join it. Fails if any worker panicked.
    pub fn shutdown(self) -> Result<()> {
        self.shared.request_stop();
        let mut panicked = Vec::new();
        for worker in self.workers {
            if worker.handle.join().is_err() {
                log::error!("{} worker panicked", worker.name);
                panicked.push(worker.name);
            }
        }
        if panicked.is_empty() {
            log::info!("all workers stopped");
            Ok(())
        } else {
            Err(anyhow!("workers panicked: {}", panicked.join(", ")))
        }
    }
}

/// Detection + tracking loop.
///
/// Consumes raw frames, publishes annotated frames when the sink has taken the
/// previous one, feeds detections to the tracker and ticks it every iteration.
/// On stop it queues a `Stop` for the controller.
pub fn run_inference_worker(
    mut backend: Box<dyn DetectionBackend>,
    mut raw: FrameReader,
    mut annotated: FrameWriter,
    mut tracker: Tracker,
    commands: CommandSender,
    shared: Arc<SharedState>,
) {
    log::info!("inference worker started (backend {})", backend.name());
    let poll = Duration::from_millis(FRAME_POLL_INTERVAL_MS);
    let mut frames = 0u64;
    loop {
        if shared.is_stop_requested() {
            if let Err(e) = commands.send(ControlMessage::Stop, &shared) {
                log::debug!("inference worker: {:#}", e);
            }
            break;
        }

        let mut idle = true;
        match raw.take_if_fresh() {
            Ok(Some(frame)) => {
                idle = false;
                frames += 1;
                match backend.detect(&frame) {
                    Ok(output) => {
                        if !annotated.is_fresh() {
                            let shown = output.annotated.as_ref().unwrap_or(&frame);
                            if let Err(e) = annotated.write_frame(shown) {
                                log::warn!("annotated frame dropped: {:#}", e);
                            }
                        }
                        tracker.observe(Instant::now(), &output.detections);
                    }
                    Err(e) => log::warn!("detection failed: {:#}", e),
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("raw frame unavailable: {:#}", e),
        }

        if let Some(command) = tracker.tick(Instant::now(), &shared) {
            match commands.send(ControlMessage::auto(command), &shared) {
                Ok(_) => {}
                Err(e) => {
                    log::error!("inference worker: {:#}", e);
                    break;
                }
            }
        }

        if idle {
            thread::sleep(poll);
        }
    }
    log::info!("inference worker stopped after {} frames", frames);
}
