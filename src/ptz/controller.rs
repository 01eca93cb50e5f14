use std::sync::Arc;

use crate::command::{CommandReceiver, ControlMessage, PtzCommand, Scope, COMMAND_WAIT_SLICE};
use crate::shared::SharedState;

use super::client::{PtzClient, PtzResponse};

/// Anything that can move the camera.
pub trait PtzActuator: Send {
    fn continuous(&mut self, pan: f64, tilt: f64, zoom: f64) -> PtzResponse;
    fn absolute(&mut self, pan_deg: f64, tilt_deg: f64, zoom: f64) -> PtzResponse;
}

impl PtzActuator for PtzClient {
    fn continuous(&mut self, pan: f64, tilt: f64, zoom: f64) -> PtzResponse {
        PtzClient::continuous(self, pan, tilt, zoom)
    }

    fn absolute(&mut self, pan_deg: f64, tilt_deg: f64, zoom: f64) -> PtzResponse {
        PtzClient::absolute(self, pan_deg, tilt_deg, zoom)
    }
}

/// What the controller did with one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handled {
    Actuated(PtzResponse),
    /// Auto command dropped while manual mode is active.
    Suppressed,
    ModeChanged,
    Stopped(PtzResponse),
}

/// Drains the command channel and drives the camera.
///
/// Starts in auto mode. Manual-scoped commands always actuate; auto-scoped ones
/// only while manual mode is off.
pub struct PtzController<A: PtzActuator> {
    actuator: A,
    manual: bool,
    failures: u64,
}

impl<A: PtzActuator> PtzController<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            actuator,
            manual: false,
            failures: 0,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Non-Ok responses seen so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn handle(&mut self, message: ControlMessage) -> Handled {
        match message {
            ControlMessage::Stop => Handled::Stopped(self.actuate(PtzCommand::halt())),
            ControlMessage::SetManual(on) => {
                if on != self.manual {
                    log::info!("manual mode {}", if on { "on" } else { "off" });
                }
                self.manual = on;
                Handled::ModeChanged
            }
            ControlMessage::Actuate {
                scope: Scope::Auto,
                ..
            } if self.manual => {
                log::trace!("ignoring auto command in manual mode");
                Handled::Suppressed
            }
            ControlMessage::Actuate { command, .. } => Handled::Actuated(self.actuate(command)),
        }
    }

    fn actuate(&mut self, command: PtzCommand) -> PtzResponse {
        let response = match command {
            PtzCommand::Continuous { pan, tilt, zoom } => self.actuator.continuous(pan, tilt, zoom),
            PtzCommand::Absolute {
                pan_deg,
                tilt_deg,
                zoom,
            } => self.actuator.absolute(pan_deg, tilt_deg, zoom),
        };
        if !response.is_ok() {
            self.failures += 1;
            log::warn!("ptz command {:?} failed: {}", command, response);
        }
        response
    }

    /// Serve `commands` until a `Stop` arrives or the stop flag is raised. The
    /// camera is always sent a zero-rate command on the way out.
    pub fn run(mut self, commands: CommandReceiver, shared: Arc<SharedState>) {
        log::info!("ptz controller started");
        loop {
            if shared.is_stop_requested() {
                self.actuate(PtzCommand::halt());
                break;
            }
            match commands.recv_timeout(COMMAND_WAIT_SLICE) {
                Ok(Some(message)) => {
                    if let Handled::Stopped(_) = self.handle(message) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("ptz controller: {:#}", e);
                    self.actuate(PtzCommand::halt());
                    break;
                }
            }
        }
        log::info!("ptz controller stopped ({} failed commands)", self.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_channel;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<PtzCommand>,
        reply: Vec<PtzResponse>,
    }

    impl Recorder {
        fn next_reply(&mut self) -> PtzResponse {
            if self.reply.is_empty() {
                PtzResponse::Ok
            } else {
                self.reply.remove(0)
            }
        }
    }

    impl PtzActuator for Recorder {
        fn continuous(&mut self, pan: f64, tilt: f64, zoom: f64) -> PtzResponse {
            self.calls.push(PtzCommand::Continuous { pan, tilt, zoom });
            self.next_reply()
        }

        fn absolute(&mut self, pan_deg: f64, tilt_deg: f64, zoom: f64) -> PtzResponse {
            self.calls.push(PtzCommand::Absolute {
                pan_deg,
                tilt_deg,
                zoom,
            });
            self.next_reply()
        }
    }

    fn msg(line: &str) -> ControlMessage {
        line.parse().unwrap()
    }

    #[test]
    fn manual_mode_suppresses_auto_commands() {
        let mut controller = PtzController::new(Recorder::default());
        assert_eq!(controller.handle(msg("m on")), Handled::ModeChanged);
        assert_eq!(controller.handle(msg("a c 10 10 0")), Handled::Suppressed);
        assert_eq!(
            controller.handle(msg("m c 5 0 0")),
            Handled::Actuated(PtzResponse::Ok)
        );
        assert_eq!(controller.handle(msg("m off")), Handled::ModeChanged);
        assert_eq!(
            controller.handle(msg("a c 10 10 0")),
            Handled::Actuated(PtzResponse::Ok)
        );
        assert_eq!(
            controller.actuator().calls,
            vec![
                PtzCommand::Continuous {
                    pan: 5.0,
                    tilt: 0.0,
                    zoom: 0.0
                },
                PtzCommand::Continuous {
                    pan: 10.0,
                    tilt: 10.0,
                    zoom: 0.0
                },
            ]
        );
    }

    #[test]
    fn failures_are_counted_and_do_not_stop_processing() {
        let mut controller = PtzController::new(Recorder {
            reply: vec![PtzResponse::Unauthorized, PtzResponse::Timeout],
            ..Recorder::default()
        });
        assert_eq!(
            controller.handle(msg("a a 90 0 1")),
            Handled::Actuated(PtzResponse::Unauthorized)
        );
        assert_eq!(
            controller.handle(msg("a c 1 1 0")),
            Handled::Actuated(PtzResponse::Timeout)
        );
        assert_eq!(
            controller.handle(msg("a c 2 2 0")),
            Handled::Actuated(PtzResponse::Ok)
        );
        assert_eq!(controller.failures(), 2);
    }

    #[test]
    fn stop_sends_zero_rate() {
        let mut controller = PtzController::new(Recorder::default());
        assert_eq!(
            controller.handle(ControlMessage::Stop),
            Handled::Stopped(PtzResponse::Ok)
        );
        assert_eq!(controller.actuator().calls, vec![PtzCommand::halt()]);
    }

    #[test]
    fn run_exits_on_stop_flag() {
        let shared = SharedState::new();
        let (_tx, rx) = command_channel();
        let controller = PtzController::new(Recorder::default());
        let handle = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || controller.run(rx, shared))
        };
        thread::sleep(Duration::from_millis(20));
        shared.request_stop();
        handle.join().unwrap();
    }
}
