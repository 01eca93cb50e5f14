use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::frame::FrameShape;
use crate::ingest::SourceConfig;
use crate::ptz::{PtzClientConfig, PTZ_REQUEST_TIMEOUT};
use crate::tracker::{TrackerConfig, MAX_HOLD_OFF, MIN_HOLD_OFF};

const DEFAULT_CAMERA_HOST: &str = "192.168.3.64:80";
const DEFAULT_CAMERA_USER: &str = "admin";
const DEFAULT_SOURCE_URL: &str = "stub://ptz_camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 2560;
const DEFAULT_SOURCE_HEIGHT: u32 = 1440;
const DEFAULT_DETECTOR: &str = "stub";
const DEFAULT_INGEST_ADDR: &str = "0.0.0.0:3013";
const DEFAULT_SINK_URL: &str = "ws://localhost:8080/andros/sender";

#[derive(Debug, Deserialize, Default)]
struct PtzdConfigFile {
    camera: Option<CameraConfigFile>,
    source: Option<SourceConfigFile>,
    detector: Option<String>,
    ingest: Option<IngestConfigFile>,
    sink: Option<SinkConfigFile>,
    mount: Option<MountConfigFile>,
    tracker: Option<TrackerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    host: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct IngestConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SinkConfigFile {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MountConfigFile {
    device_angle_deg: Option<f64>,
    heading_deg: Option<f64>,
    lon: Option<f64>,
    lat: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    hold_off_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PtzdConfig {
    pub camera: CameraSettings,
    pub source: SourceSettings,
    /// Detection backend spec: `stub` or `replay:<path>`.
    pub detector: String,
    pub ingest_addr: String,
    pub sink_url: String,
    pub mount: MountSettings,
    pub hold_off: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub host: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Static description of the camera mount.
#[derive(Debug, Clone, Default)]
pub struct MountSettings {
    /// Mount orientation relative to the camera's pan zero.
    pub device_angle_deg: f64,
    /// Magnetic heading for a fixed IMU. `None` runs without a heading worker.
    pub heading_deg: Option<f64>,
    /// Surveyed `(lon, lat)` for a fixed GPS. `None` runs without GPS, which
    /// disables coordinate slews.
    pub position: Option<(f64, f64)>,
}

impl PtzdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PTZ_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PtzdConfigFile) -> Result<Self> {
        let camera = file.camera.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let mount = file.mount.unwrap_or_default();
        let position = match (mount.lon, mount.lat) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            (None, None) => None,
            _ => return Err(anyhow!("mount position needs both lon and lat")),
        };
        Ok(Self {
            camera: CameraSettings {
                host: camera
                    .host
                    .unwrap_or_else(|| DEFAULT_CAMERA_HOST.to_string()),
                user: camera
                    .user
                    .unwrap_or_else(|| DEFAULT_CAMERA_USER.to_string()),
                password: camera.password.unwrap_or_default(),
            },
            source: SourceSettings {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            detector: file
                .detector
                .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
            ingest_addr: file
                .ingest
                .and_then(|ingest| ingest.addr)
                .unwrap_or_else(|| DEFAULT_INGEST_ADDR.to_string()),
            sink_url: file
                .sink
                .and_then(|sink| sink.url)
                .unwrap_or_else(|| DEFAULT_SINK_URL.to_string()),
            mount: MountSettings {
                device_angle_deg: mount.device_angle_deg.unwrap_or(0.0),
                heading_deg: mount.heading_deg,
                position,
            },
            hold_off: file
                .tracker
                .and_then(|tracker| tracker.hold_off_ms)
                .map(Duration::from_millis)
                .unwrap_or(MAX_HOLD_OFF),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("PTZ_CAMERA_HOST") {
            if !host.trim().is_empty() {
                self.camera.host = host;
            }
        }
        if let Ok(user) = std::env::var("PTZ_CAMERA_USER") {
            if !user.trim().is_empty() {
                self.camera.user = user;
            }
        }
        if let Ok(password) = std::env::var("PTZ_CAMERA_PASSWORD") {
            self.camera.password = password;
        }
        if let Ok(url) = std::env::var("PTZ_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(detector) = std::env::var("PTZ_DETECTOR") {
            if !detector.trim().is_empty() {
                self.detector = detector;
            }
        }
        if let Ok(addr) = std::env::var("PTZ_INGEST_ADDR") {
            if !addr.trim().is_empty() {
                self.ingest_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("PTZ_SINK_URL") {
            if !url.trim().is_empty() {
                self.sink_url = url;
            }
        }
        if let Ok(angle) = std::env::var("PTZ_DEVICE_ANGLE") {
            self.mount.device_angle_deg = angle
                .trim()
                .parse()
                .map_err(|_| anyhow!("PTZ_DEVICE_ANGLE must be a number of degrees"))?;
        }
        if let Ok(hold_off) = std::env::var("PTZ_HOLD_OFF_MS") {
            let millis: u64 = hold_off.trim().parse().map_err(|_| {
                anyhow!("PTZ_HOLD_OFF_MS must be an integer number of milliseconds")
            })?;
            self.hold_off = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.host.trim().is_empty() {
            return Err(anyhow!("camera host must not be empty"));
        }
        FrameShape::new(self.source.width, self.source.height)?;
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.detector != "stub" && !self.detector.starts_with("replay:") {
            return Err(anyhow!(
                "unknown detector '{}'; expected 'stub' or 'replay:<path>'",
                self.detector
            ));
        }
        self.ingest_addr
            .parse::<SocketAddr>()
            .map_err(|_| anyhow!("invalid ingest address '{}'", self.ingest_addr))?;
        let sink = url::Url::parse(&self.sink_url)
            .map_err(|e| anyhow!("invalid sink url '{}': {}", self.sink_url, e))?;
        if sink.scheme() != "ws" {
            return Err(anyhow!("sink url must use ws:// (got '{}')", self.sink_url));
        }
        if !(MIN_HOLD_OFF..=MAX_HOLD_OFF).contains(&self.hold_off) {
            return Err(anyhow!(
                "hold-off must be between {} and {} ms (got {} ms)",
                MIN_HOLD_OFF.as_millis(),
                MAX_HOLD_OFF.as_millis(),
                self.hold_off.as_millis()
            ));
        }
        let mut angles = vec![self.mount.device_angle_deg];
        angles.extend(self.mount.heading_deg);
        if let Some((lon, lat)) = self.mount.position {
            angles.extend([lon, lat]);
        }
        if angles.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("mount values must be finite numbers"));
        }
        Ok(())
    }

    pub fn ptz_client_config(&self) -> PtzClientConfig {
        PtzClientConfig {
            host: self.camera.host.clone(),
            user: self.camera.user.clone(),
            password: self.camera.password.clone(),
            timeout: PTZ_REQUEST_TIMEOUT,
        }
    }

    pub fn frame_shape(&self) -> Result<FrameShape> {
        FrameShape::new(self.source.width, self.source.height)
    }

    pub fn source_config(&self) -> Result<SourceConfig> {
        Ok(SourceConfig {
            url: self.source.url.clone(),
            target_fps: self.source.target_fps,
            shape: self.frame_shape()?,
        })
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            hold_off: self.hold_off,
            ..TrackerConfig::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<PtzdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
