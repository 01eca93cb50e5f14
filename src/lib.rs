//! PTZ target tracker
//!
//! Keeps a motorized pan-tilt-zoom camera pointed at something useful: a
//! tracked target when one is locked, an externally supplied geographic fix when
//! one arrives, and a slow patrol sweep otherwise.
//!
//! # Architecture
//!
//! Each role runs on its own thread and talks to the others only through
//! explicit shared state:
//!
//! - `frame`: single-slot frame channels (raw and annotated) with role-typed
//!   writer/reader handles
//! - `ingest`: frame sources and the coordinate-fix WebSocket listener
//! - `detect`: detection/tracking backend boundary
//! - `tracker`: lock / slew / patrol state machine
//! - `sensors`: heading and position estimators and their workers
//! - `command`: tagged PTZ commands and the depth-1 command channel
//! - `ptz`: ISAPI client with Digest auth, and the controller loop
//! - `sink`: JPEG WebSocket stream of annotated frames
//! - `shared`: stop flag and polled scalars shared between workers
//! - `orchestrator`: builds all of the above and owns their threads

pub mod command;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geo;
pub mod ingest;
pub mod orchestrator;
pub mod ptz;
pub mod sensors;
pub mod shared;
pub mod sink;
pub mod tracker;

pub use command::{
    command_channel, CommandReceiver, CommandSender, ControlMessage, PtzCommand, Scope,
};
pub use config::PtzdConfig;
pub use detect::{BoundingBox, Detection, DetectionBackend, DetectionOutput};
pub use frame::{Frame, FrameChannel, FrameReader, FrameShape, FrameWriter};
pub use geo::{cart2pol, normalize_degrees, pol2cart};
pub use orchestrator::Orchestrator;
pub use ptz::{PtzClient, PtzClientConfig, PtzController, PtzResponse};
pub use shared::{CoordinateFix, GeoPosition, HeadingReading, SharedState};
pub use tracker::{dead_zone_correction, Tracker, TrackerConfig, TrackerState};
