//! Frame exchange layer.
//!
//! This module enforces the single-writer / single-reader discipline of the
//! frame channels at the type level.
//!
//! - `Frame`: owned copy of one BGR image.
//! - `FrameWriter`: the only handle that can publish into a channel.
//! - `FrameReader`: the only handle that can take from a channel.
//!
//! A channel holds exactly one image. Publishing overwrites whatever is there and
//! raises the freshness flag; taking copies the image out and lowers the flag.
//! Slow readers miss intermediate frames. Nothing is queued.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Bytes per pixel (B, G, R).
pub const CHANNELS: usize = 3;

/// Interval at which frame consumers poll a channel for freshness.
pub const FRAME_POLL_INTERVAL_MS: u64 = 1;

/// Fixed image geometry agreed by writer and reader at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
}

impl FrameShape {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "frame shape must be non-zero (got {}x{})",
                width,
                height
            ));
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(CHANNELS))
            .ok_or_else(|| anyhow!("frame shape {}x{} overflows", width, height))?;
        Ok(Self { width, height })
    }

    /// Size of one frame in bytes (H x W x 3).
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

// ----------------------------------------------------------------------------
// Frame: owned BGR image
// ----------------------------------------------------------------------------

/// Owned BGR frame, row-major, 8 bits per channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    shape: FrameShape,
}

impl Frame {
    pub fn new(data: Vec<u8>, shape: FrameShape) -> Result<Self> {
        if data.len() != shape.byte_len() {
            return Err(anyhow!(
                "frame has {} bytes, expected {} for {}x{}x{}",
                data.len(),
                shape.byte_len(),
                shape.width,
                shape.height,
                CHANNELS
            ));
        }
        Ok(Self { data, shape })
    }

    /// All-black frame of the given shape.
    pub fn blank(shape: FrameShape) -> Self {
        Self {
            data: vec![0u8; shape.byte_len()],
            shape,
        }
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy of the pixels with the channel order swapped to RGB.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = self.data.clone();
        for px in rgb.chunks_exact_mut(CHANNELS) {
            px.swap(0, 2);
        }
        rgb
    }
}

// ----------------------------------------------------------------------------
// FrameChannel: one slot, two role handles
// ----------------------------------------------------------------------------

struct FrameSlot {
    name: &'static str,
    shape: FrameShape,
    pixels: Mutex<Vec<u8>>,
    fresh: AtomicBool,
}

/// Constructor for a writer/reader pair sharing one frame slot.
pub struct FrameChannel;

impl FrameChannel {
    /// Allocate a channel and hand out its only two handles.
    ///
    /// Neither handle implements `Clone`, so a channel can never gain a second
    /// writer or a second reader:
    ///
    /// ```compile_fail
    /// use ptz_tracker::frame::{FrameChannel, FrameShape};
    /// let shape = FrameShape::new(4, 4).unwrap();
    /// let (writer, _reader) = FrameChannel::create("raw", shape).unwrap();
    /// let _second_writer = writer.clone();
    /// ```
    ///
    /// and a reader has no way to publish:
    ///
    /// ```compile_fail
    /// use ptz_tracker::frame::{FrameChannel, FrameShape};
    /// let shape = FrameShape::new(4, 4).unwrap();
    /// let (_writer, mut reader) = FrameChannel::create("raw", shape).unwrap();
    /// reader.write(&[0u8; 48]).unwrap();
    /// ```
    pub fn create(name: &'static str, shape: FrameShape) -> Result<(FrameWriter, FrameReader)> {
        let len = shape.byte_len();
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| anyhow!("failed to allocate {} frame buffer ({} bytes): {}", name, len, e))?;
        pixels.resize(len, 0);

        let slot = Arc::new(FrameSlot {
            name,
            shape,
            pixels: Mutex::new(pixels),
            fresh: AtomicBool::new(false),
        });
        log::debug!(
            "frame channel '{}' allocated: {}x{} ({} KB)",
            name,
            shape.width,
            shape.height,
            len / 1024
        );
        Ok((FrameWriter { slot: slot.clone() }, FrameReader { slot }))
    }
}

/// Publishing side of a frame channel.
pub struct FrameWriter {
    slot: Arc<FrameSlot>,
}

impl FrameWriter {
    /// Copy `pixels` into the channel and mark it fresh.
    pub fn write(&mut self, pixels: &[u8]) -> Result<()> {
        if pixels.len() != self.slot.shape.byte_len() {
            return Err(anyhow!(
                "{} channel expects {} bytes, got {}",
                self.slot.name,
                self.slot.shape.byte_len(),
                pixels.len()
            ));
        }
        let mut guard = self
            .slot
            .pixels
            .lock()
            .map_err(|_| anyhow!("{} channel lock poisoned", self.slot.name))?;
        guard.copy_from_slice(pixels);
        self.slot.fresh.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write(frame.as_bytes())
    }

    /// True while the last published frame has not been taken yet.
    pub fn is_fresh(&self) -> bool {
        self.slot.fresh.load(Ordering::SeqCst)
    }

    pub fn shape(&self) -> FrameShape {
        self.slot.shape
    }
}

/// Consuming side of a frame channel.
pub struct FrameReader {
    slot: Arc<FrameSlot>,
}

impl FrameReader {
    /// Copy the frame out if it is fresh, clearing the flag. Never blocks on an
    /// empty channel.
    pub fn take_if_fresh(&mut self) -> Result<Option<Frame>> {
        if !self.slot.fresh.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let guard = self
            .slot
            .pixels
            .lock()
            .map_err(|_| anyhow!("{} channel lock poisoned", self.slot.name))?;
        if !self.slot.fresh.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Frame {
            data: guard.clone(),
            shape: self.slot.shape,
        }))
    }

    pub fn is_fresh(&self) -> bool {
        self.slot.fresh.load(Ordering::SeqCst)
    }

    pub fn shape(&self) -> FrameShape {
        self.slot.shape
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
