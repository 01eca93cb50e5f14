use std::error::Error as _;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use super::digest::{DigestChallenge, DigestSession};

/// Time budget for one actuation, including a Digest challenge round trip. A
/// slow camera must never stall the control loop.
pub const PTZ_REQUEST_TIMEOUT: Duration = Duration::from_millis(250);

pub const ABSOLUTE_PATH: &str = "/ISAPI/PTZCtrl/channels/1/absolute";
pub const CONTINUOUS_PATH: &str = "/ISAPI/PTZCtrl/channels/1/continuous";

/// Classified outcome of one actuation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PtzResponse {
    Ok,
    Unauthorized,
    NotFound,
    Forbidden,
    Timeout,
    ConnectionError,
    RequestError,
    Other,
}

impl PtzResponse {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => PtzResponse::Ok,
            401 => PtzResponse::Unauthorized,
            403 => PtzResponse::Forbidden,
            404 => PtzResponse::NotFound,
            _ => PtzResponse::Other,
        }
    }

    pub fn is_ok(self) -> bool {
        self == PtzResponse::Ok
    }

    fn from_transport(transport: &ureq::Transport) -> Self {
        match transport.kind() {
            ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io => {
                if is_timeout(transport) {
                    PtzResponse::Timeout
                } else {
                    PtzResponse::ConnectionError
                }
            }
            ureq::ErrorKind::InvalidUrl
            | ureq::ErrorKind::UnknownScheme
            | ureq::ErrorKind::BadHeader
            | ureq::ErrorKind::BadStatus
            | ureq::ErrorKind::TooManyRedirects => PtzResponse::RequestError,
            _ => PtzResponse::Other,
        }
    }
}

impl fmt::Display for PtzResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PtzResponse::Ok => "ok",
            PtzResponse::Unauthorized => "unauthorized",
            PtzResponse::NotFound => "not found",
            PtzResponse::Forbidden => "forbidden",
            PtzResponse::Timeout => "timeout",
            PtzResponse::ConnectionError => "connection error",
            PtzResponse::RequestError => "request error",
            PtzResponse::Other => "other",
        };
        f.write_str(label)
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    transport
        .source()
        .and_then(|e| e.downcast_ref::<io::Error>())
        .is_some_and(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock))
}

/// Body for a rate command. Values are truncated toward zero.
pub fn continuous_payload(pan: f64, tilt: f64, zoom: f64) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <PTZData>\n    <pan>{}</pan>\n    <tilt>{}</tilt>\n    <zoom>{}</zoom>\n</PTZData>\n",
        pan as i64, tilt as i64, zoom as i64
    )
}

/// Body for a positional command. Degrees and zoom are sent x10, truncated.
pub fn absolute_payload(pan_deg: f64, tilt_deg: f64, zoom: f64) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <PTZData>\n    <AbsoluteHigh>\n        <elevation>{}</elevation>\n        \
         <azimuth>{}</azimuth>\n        <absoluteZoom>{}</absoluteZoom>\n    \
         </AbsoluteHigh>\n</PTZData>\n",
        (tilt_deg * 10.0) as i64,
        (pan_deg * 10.0) as i64,
        (zoom * 10.0) as i64
    )
}

#[derive(Clone, Debug)]
pub struct PtzClientConfig {
    /// `host` or `host:port` of the camera's HTTP API.
    pub host: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for PtzClientConfig {
    fn default() -> Self {
        Self {
            host: "192.168.3.64:80".to_string(),
            user: "admin".to_string(),
            password: String::new(),
            timeout: PTZ_REQUEST_TIMEOUT,
        }
    }
}

/// ISAPI PTZ client. Every call returns a classified `PtzResponse`; nothing
/// here returns an error or panics on a misbehaving camera.
pub struct PtzClient {
    config: PtzClientConfig,
    agent: ureq::Agent,
    session: Option<DigestSession>,
}

impl PtzClient {
    pub fn new(config: PtzClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .redirects(0)
            .build();
        Self {
            config,
            agent,
            session: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn continuous(&mut self, pan: f64, tilt: f64, zoom: f64) -> PtzResponse {
        self.put(CONTINUOUS_PATH, &continuous_payload(pan, tilt, zoom))
    }

    pub fn absolute(&mut self, pan_deg: f64, tilt_deg: f64, zoom: f64) -> PtzResponse {
        self.put(ABSOLUTE_PATH, &absolute_payload(pan_deg, tilt_deg, zoom))
    }

    pub fn stop(&mut self) -> PtzResponse {
        self.continuous(0.0, 0.0, 0.0)
    }

    fn put(&mut self, path: &str, body: &str) -> PtzResponse {
        let url = format!("http://{}{}", self.config.host, path);
        let started = Instant::now();
        match self.send_once(&url, path, body, self.config.timeout) {
            Err(ureq::Error::Status(401, response)) => {
                let Some(header) = response.header("WWW-Authenticate") else {
                    return PtzResponse::Unauthorized;
                };
                match DigestChallenge::parse(header) {
                    Ok(challenge) => {
                        log::debug!(
                            "new digest challenge from {} (realm {})",
                            self.config.host,
                            challenge.realm
                        );
                        self.session = Some(DigestSession::new(challenge));
                    }
                    Err(e) => {
                        log::warn!(
                            "unusable digest challenge from {}: {:#}",
                            self.config.host,
                            e
                        );
                        return PtzResponse::Unauthorized;
                    }
                }
                // The retry only gets what is left of the budget.
                let remaining = self.config.timeout.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return PtzResponse::Timeout;
                }
                classify(self.send_once(&url, path, body, remaining))
            }
            other => classify(other),
        }
    }

    fn send_once(
        &mut self,
        url: &str,
        path: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<ureq::Response, ureq::Error> {
        let mut request = self
            .agent
            .put(url)
            .timeout(timeout)
            .set("Content-Type", "application/xml");
        if let Some(session) = self.session.as_mut() {
            let header = session.authorize(&self.config.user, &self.config.password, "PUT", path);
            request = request.set("Authorization", &header);
        }
        request.send_string(body)
    }
}

fn classify(result: Result<ureq::Response, ureq::Error>) -> PtzResponse {
    match result {
        Ok(response) => PtzResponse::from_status(response.status()),
        Err(ureq::Error::Status(code, _)) => PtzResponse::from_status(code),
        Err(ureq::Error::Transport(transport)) => PtzResponse::from_transport(&transport),
    }
}
