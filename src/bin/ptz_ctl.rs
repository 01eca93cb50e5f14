//! ptz_ctl - send one PTZ command straight to the camera

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;

use ptz_tracker::{PtzClient, PtzClientConfig, PtzResponse};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a single PTZ command to the camera")]
struct Args {
    /// Camera `host[:port]`.
    #[arg(long, env = "PTZ_CAMERA_HOST", default_value = "192.168.3.64:80")]
    host: String,
    /// Digest auth user.
    #[arg(long, env = "PTZ_CAMERA_USER", default_value = "admin")]
    user: String,
    /// Digest auth password.
    #[arg(long, env = "PTZ_CAMERA_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 250)]
    timeout_ms: u64,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Rate command (pan/tilt roughly -100..100).
    Continuous {
        #[arg(allow_hyphen_values = true)]
        pan: f64,
        #[arg(allow_hyphen_values = true)]
        tilt: f64,
        #[arg(allow_hyphen_values = true, default_value_t = 0.0)]
        zoom: f64,
    },
    /// Positional command in degrees.
    Absolute {
        #[arg(allow_hyphen_values = true)]
        pan_deg: f64,
        #[arg(allow_hyphen_values = true)]
        tilt_deg: f64,
        #[arg(default_value_t = 1.0)]
        zoom: f64,
    },
    /// Zero-rate command.
    Stop,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut client = PtzClient::new(PtzClientConfig {
        host: args.host,
        user: args.user,
        password: args.password,
        timeout: Duration::from_millis(args.timeout_ms),
    });

    let response = match args.action {
        Action::Continuous { pan, tilt, zoom } => client.continuous(pan, tilt, zoom),
        Action::Absolute {
            pan_deg,
            tilt_deg,
            zoom,
        } => client.absolute(pan_deg, tilt_deg, zoom),
        Action::Stop => client.stop(),
    };

    println!("{}: {}", client.host(), response);
    if response == PtzResponse::Ok {
        Ok(())
    } else {
        Err(anyhow!("camera did not accept the command ({})", response))
    }
}
