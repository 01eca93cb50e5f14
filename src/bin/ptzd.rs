//! ptzd - PTZ target tracker daemon
//!
//! This daemon:
//! 1. Captures frames into the raw frame channel
//! 2. Runs detection/tracking and the lock/slew/patrol state machine
//! 3. Drives the camera over ISAPI from the command queue
//! 4. Streams annotated frames to the viewer
//! 5. Accepts coordinate fixes over WebSocket
//!
//! Operator console on stdin: any command line (`m on`, `m c 10 0 0`, `m off`,
//! ...) is queued to the controller; `q` stops the daemon.

use anyhow::Result;
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ptz_tracker::{CommandSender, ControlMessage, Orchestrator, PtzdConfig, SharedState};

const SUPERVISE_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = PtzdConfig::load()?;
    log::info!(
        "ptzd {} starting: source={} detector={} ingest={} sink={}",
        env!("CARGO_PKG_VERSION"),
        cfg.source.url,
        cfg.detector,
        cfg.ingest_addr,
        cfg.sink_url
    );

    let mut orchestrator = Orchestrator::start(&cfg)?;
    let shared = orchestrator.shared();

    {
        let shared = Arc::clone(&shared);
        ctrlc::set_handler(move || {
            log::info!("interrupt received, stopping");
            shared.request_stop();
        })?;
    }

    // The console blocks on stdin, so it is not joined on shutdown.
    {
        let shared = Arc::clone(&shared);
        let commands = orchestrator.commands();
        thread::Builder::new()
            .name("console".into())
            .spawn(move || run_console(commands, shared))?;
    }

    while !shared.is_stop_requested() {
        orchestrator.check_health();
        thread::sleep(SUPERVISE_INTERVAL);
    }

    orchestrator.shutdown()
}

fn run_console(commands: CommandSender, shared: Arc<SharedState>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("console read failed: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "q" {
            shared.request_stop();
            break;
        }
        match line.parse::<ControlMessage>() {
            Ok(message) => match commands.send(message, &shared) {
                Ok(true) => log::debug!("console queued '{}'", message),
                Ok(false) => break,
                Err(e) => {
                    log::warn!("console: {:#}", e);
                    break;
                }
            },
            Err(e) => log::warn!("console: {:#}", e),
        }
        if shared.is_stop_requested() {
            break;
        }
    }
}
