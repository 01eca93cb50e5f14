//! PTZ commands and the depth-1 command channel.
//!
//! Commands travel from the tracker (and the operator console) to the PTZ
//! controller as `ControlMessage` values. The plain-text grammar
//! (`"a c -34 0 0"`, `"m on"`, `"stop"`) exists only at the console boundary and
//! is parsed exactly once, by `ControlMessage::from_str`.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::shared::SharedState;

/// Queue depth between tracker and controller. A full queue blocks the producer.
pub const COMMAND_CHANNEL_DEPTH: usize = 1;

/// Slice length for blocking sends/receives so the stop flag is re-checked.
pub const COMMAND_WAIT_SLICE: Duration = Duration::from_millis(250);

/// One actuation request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PtzCommand {
    /// Rate command, pan/tilt roughly within [-100, 100].
    Continuous { pan: f64, tilt: f64, zoom: f64 },
    /// Positional command in degrees. `zoom` is sent x10 on the wire.
    Absolute { pan_deg: f64, tilt_deg: f64, zoom: f64 },
}

impl PtzCommand {
    pub const fn halt() -> Self {
        PtzCommand::Continuous {
            pan: 0.0,
            tilt: 0.0,
            zoom: 0.0,
        }
    }
}

/// Who issued a command. Manual always wins over auto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Manual,
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlMessage {
    Actuate { scope: Scope, command: PtzCommand },
    SetManual(bool),
    Stop,
}

impl ControlMessage {
    pub fn auto(command: PtzCommand) -> Self {
        ControlMessage::Actuate {
            scope: Scope::Auto,
            command,
        }
    }

    pub fn manual(command: PtzCommand) -> Self {
        ControlMessage::Actuate {
            scope: Scope::Manual,
            command,
        }
    }
}

impl FromStr for ControlMessage {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["stop"] => Ok(ControlMessage::Stop),
            ["m", "on"] => Ok(ControlMessage::SetManual(true)),
            ["m", "off"] => Ok(ControlMessage::SetManual(false)),
            [scope, kind, p1, p2, p3] => {
                let scope = match *scope {
                    "m" => Scope::Manual,
                    "a" => Scope::Auto,
                    other => return Err(anyhow!("unknown command scope '{}'", other)),
                };
                let (a, b, c) = (parse_value(p1)?, parse_value(p2)?, parse_value(p3)?);
                let command = match *kind {
                    "c" => PtzCommand::Continuous {
                        pan: a,
                        tilt: b,
                        zoom: c,
                    },
                    "a" => PtzCommand::Absolute {
                        pan_deg: a,
                        tilt_deg: b,
                        zoom: c,
                    },
                    other => return Err(anyhow!("unknown command kind '{}'", other)),
                };
                Ok(ControlMessage::Actuate { scope, command })
            }
            [] => Err(anyhow!("empty command")),
            _ => Err(anyhow!("unrecognised command '{}'", line.trim())),
        }
    }
}

fn parse_value(token: &str) -> Result<f64> {
    let value: f64 = token
        .parse()
        .map_err(|_| anyhow!("invalid command value '{}'", token))?;
    if !value.is_finite() {
        return Err(anyhow!("command value '{}' is not finite", token));
    }
    Ok(value)
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Stop => write!(f, "stop"),
            ControlMessage::SetManual(true) => write!(f, "m on"),
            ControlMessage::SetManual(false) => write!(f, "m off"),
            ControlMessage::Actuate { scope, command } => {
                let scope = match scope {
                    Scope::Manual => "m",
                    Scope::Auto => "a",
                };
                match command {
                    PtzCommand::Continuous { pan, tilt, zoom } => {
                        write!(f, "{} c {} {} {}", scope, pan, tilt, zoom)
                    }
                    PtzCommand::Absolute {
                        pan_deg,
                        tilt_deg,
                        zoom,
                    } => write!(f, "{} a {} {} {}", scope, pan_deg, tilt_deg, zoom),
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Command channel
// ----------------------------------------------------------------------------

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = bounded(COMMAND_CHANNEL_DEPTH);
    (CommandSender { tx }, CommandReceiver { rx })
}

#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<ControlMessage>,
}

impl CommandSender {
    /// Block until the controller has room for `message`.
    ///
    /// The wait is cut into `COMMAND_WAIT_SLICE` pieces; if the stop flag is
    /// raised while the queue stays full, the message is dropped and `Ok(false)`
    /// is returned.
    pub fn send(&self, message: ControlMessage, shared: &SharedState) -> Result<bool> {
        let mut pending = message;
        loop {
            match self.tx.send_timeout(pending, COMMAND_WAIT_SLICE) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(message)) => {
                    if shared.is_stop_requested() {
                        log::debug!("dropping '{}' on shutdown", message);
                        return Ok(false);
                    }
                    pending = message;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(anyhow!("command channel closed"));
                }
            }
        }
    }
}

pub struct CommandReceiver {
    rx: Receiver<ControlMessage>,
}

impl CommandReceiver {
    /// Next message, or `None` if nothing arrived within `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ControlMessage>> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("command channel closed")),
        }
    }
}
