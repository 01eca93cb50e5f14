//! Camera actuation: ISAPI PTZ client and the command-draining controller.

mod client;
mod controller;
mod digest;

pub use client::{
    absolute_payload, continuous_payload, PtzClient, PtzClientConfig, PtzResponse, ABSOLUTE_PATH,
    CONTINUOUS_PATH, PTZ_REQUEST_TIMEOUT,
};
pub use controller::{Handled, PtzActuator, PtzController};
pub use digest::{DigestChallenge, DigestSession};
