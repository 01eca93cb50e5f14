//! Coordinate ingest.
//!
//! A WebSocket listener that accepts `"<lon>,<lat>"` text messages and records
//! each as the latest `CoordinateFix`. Every client gets its own thread and a
//! persistent connection. Malformed messages and broken connections are logged
//! and backed off from; they never take the listener down.

use anyhow::{anyhow, Context, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::{Message, WebSocket};

use crate::shared::SharedState;

/// Socket read timeout; bounds how long a client thread can miss the stop flag.
pub const INGEST_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Pause after a parse failure or socket error.
pub const INGEST_BACKOFF: Duration = Duration::from_millis(250);

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Parse `"<lon>,<lat>"`. Fields after the second are ignored.
pub fn parse_fix(message: &str) -> Result<(f64, f64)> {
    let mut fields = message.trim().split(',');
    let mut next = |name: &str| -> Result<f64> {
        let raw = fields
            .next()
            .ok_or_else(|| anyhow!("missing {} in '{}'", name, message))?
            .trim();
        let value: f64 = raw
            .parse()
            .with_context(|| format!("invalid {} '{}'", name, raw))?;
        if !value.is_finite() {
            return Err(anyhow!("{} '{}' is not finite", name, raw));
        }
        Ok(value)
    };
    let lon = next("longitude")?;
    let lat = next("latitude")?;
    Ok((lon, lat))
}

pub struct CoordinateIngest {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CoordinateIngest {
    /// Bind the listening socket. Failure here is a startup error.
    pub fn bind(addr: &str) -> Result<Self> {
        let configured: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid ingest address '{}'", addr))?;
        let listener = TcpListener::bind(configured)
            .with_context(|| format!("bind coordinate ingest on {}", configured))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept clients until stop is requested. Client threads are joined before
    /// returning.
    pub fn run(self, shared: Arc<SharedState>) {
        log::info!("coordinate ingest listening on {}", self.addr);
        let mut clients = Vec::new();
        while !shared.is_stop_requested() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let shared = Arc::clone(&shared);
                    let spawned = thread::Builder::new()
                        .name(format!("ingest-{}", peer))
                        .spawn(move || serve_client(stream, peer, &shared));
                    match spawned {
                        Ok(handle) => clients.push(handle),
                        Err(e) => log::warn!("coordinate ingest: cannot serve {}: {}", peer, e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    log::warn!("coordinate ingest accept failed: {}", e);
                    thread::sleep(INGEST_BACKOFF);
                }
            }
            clients.retain(|handle: &thread::JoinHandle<()>| !handle.is_finished());
        }
        for handle in clients {
            if handle.join().is_err() {
                log::error!("coordinate ingest client thread panicked");
            }
        }
        log::info!("coordinate ingest stopped");
    }
}

fn serve_client(stream: TcpStream, peer: SocketAddr, shared: &SharedState) {
    let mut socket = match handshake(stream) {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("coordinate ingest: handshake with {} failed: {:#}", peer, e);
            return;
        }
    };
    log::info!("coordinate client {} connected", peer);

    while !shared.is_stop_requested() {
        match socket.read() {
            Ok(Message::Text(text)) => match parse_fix(&text) {
                Ok((lon, lat)) => {
                    log::debug!("coordinate fix ({}, {}) from {}", lon, lat, peer);
                    shared.record_fix(lon, lat, Instant::now());
                }
                Err(e) => {
                    log::warn!("dropping coordinate message from {}: {:#}", peer, e);
                    thread::sleep(INGEST_BACKOFF);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
            Err(e) => {
                log::warn!("coordinate client {}: {}", peer, e);
                thread::sleep(INGEST_BACKOFF);
                break;
            }
        }
    }
    let _ = socket.close(None);
    log::info!("coordinate client {} disconnected", peer);
}

fn handshake(stream: TcpStream) -> Result<WebSocket<TcpStream>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    let socket = tungstenite::accept(stream).map_err(|e| anyhow!("{}", e))?;
    socket.get_ref().set_read_timeout(Some(INGEST_READ_TIMEOUT))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lon_lat() {
        assert_eq!(parse_fix("10.0,20.0").unwrap(), (10.0, 20.0));
        assert_eq!(parse_fix(" -3.5 , 51.25 \n").unwrap(), (-3.5, 51.25));
        assert_eq!(parse_fix("1,2,99").unwrap(), (1.0, 2.0));
    }

    #[test]
    fn rejects_malformed_messages() {
        for message in ["", "10.0", "10.0;20.0", "east,north", "inf,1", "1,NaN"] {
            assert!(parse_fix(message).is_err(), "accepted '{}'", message);
        }
    }

    #[test]
    fn bad_address_is_a_startup_error() {
        assert!(CoordinateIngest::bind("not-an-address").is_err());
    }
}
