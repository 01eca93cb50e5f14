//! Annotated-frame sink.
//!
//! Streams the egress frame channel to a remote viewer as JPEG-encoded binary
//! WebSocket messages, at most one every `SINK_MIN_INTERVAL`. Connection loss is
//! handled by reconnecting; a viewer that is down is retried every
//! `SINK_RECONNECT_BACKOFF`.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::frame::{Frame, FrameReader, FRAME_POLL_INTERVAL_MS};
use crate::shared::SharedState;

pub const JPEG_QUALITY: u8 = 65;
pub const SINK_MIN_INTERVAL: Duration = Duration::from_millis(100);
pub const SINK_RECONNECT_BACKOFF: Duration = Duration::from_millis(250);
const SINK_IO_TIMEOUT: Duration = Duration::from_millis(250);

/// Encode a BGR frame as JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&rgb, frame.width(), frame.height(), ExtendedColorType::Rgb8)
        .context("encode jpeg")?;
    Ok(out)
}

pub struct FrameSink {
    url: Url,
    socket: Option<WebSocket<TcpStream>>,
    last_sent: Option<Instant>,
    frames_sent: u64,
}

impl FrameSink {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid sink url '{}'", url))?;
        if url.scheme() != "ws" {
            return Err(anyhow!(
                "unsupported sink scheme '{}'; expected ws://",
                url.scheme()
            ));
        }
        if url.host_str().is_none() {
            return Err(anyhow!("sink url '{}' has no host", url));
        }
        Ok(Self {
            url,
            socket: None,
            last_sent: None,
            frames_sent: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        let addr = self
            .url
            .socket_addrs(|| Some(80))
            .context("resolve sink address")?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("sink url '{}' did not resolve", self.url))?;
        let stream = TcpStream::connect_timeout(&addr, SINK_IO_TIMEOUT)
            .with_context(|| format!("connect to viewer at {}", addr))?;
        stream.set_read_timeout(Some(SINK_IO_TIMEOUT))?;
        stream.set_write_timeout(Some(SINK_IO_TIMEOUT))?;
        stream.set_nodelay(true)?;
        let (socket, _response) = tungstenite::client(self.url.as_str(), stream)
            .map_err(|e| anyhow!("viewer handshake failed: {}", e))?;
        log::info!("frame sink connected to {}", self.url);
        self.socket = Some(socket);
        Ok(())
    }

    /// Send one JPEG. On failure the connection is dropped so the next call
    /// reconnects.
    fn send(&mut self, jpeg: Vec<u8>) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| anyhow!("frame sink not connected"))?;
        if let Err(e) = socket.send(Message::Binary(jpeg)) {
            self.socket = None;
            return Err(anyhow!("send to viewer failed: {}", e));
        }
        self.frames_sent += 1;
        Ok(())
    }

    /// Stream `frames` until stop is requested.
    pub fn run(mut self, mut frames: FrameReader, shared: Arc<SharedState>) {
        log::info!("frame sink started ({})", self.url);
        let poll = Duration::from_millis(FRAME_POLL_INTERVAL_MS);
        while !shared.is_stop_requested() {
            if self.socket.is_none() {
                if let Err(e) = self.connect() {
                    log::debug!("frame sink: {:#}", e);
                    thread::sleep(SINK_RECONNECT_BACKOFF);
                    continue;
                }
            }

            let due = self
                .last_sent
                .map_or(true, |at| at.elapsed() >= SINK_MIN_INTERVAL);
            if !due || !frames.is_fresh() {
                thread::sleep(poll);
                continue;
            }

            let frame = match frames.take_if_fresh() {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("frame sink: {:#}", e);
                    thread::sleep(poll);
                    continue;
                }
            };
            self.last_sent = Some(Instant::now());

            match encode_jpeg(&frame, JPEG_QUALITY) {
                Ok(jpeg) => {
                    if let Err(e) = self.send(jpeg) {
                        log::warn!("frame sink: {:#}; reconnecting", e);
                    }
                }
                Err(e) => log::warn!("frame sink: {:#}", e),
            }
        }
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
        }
        log::info!("frame sink stopped after {} frames", self.frames_sent);
    }
}
