//! Media source ownership and frame acquisition.

pub mod encode;
pub mod synthetic;

pub use encode::encode_jpeg;
pub use synthetic::SyntheticCamera;

use async_trait::async_trait;
use log::debug;

use crate::error::{Error, Result};

/// Raw RGB8 frame as produced by a capture device.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({}x{})", self.width, self.height)
    }
}

/// A capture device that can be opened for streaming.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Request device access and start streaming.
    ///
    /// Permission denial fails with [`Error::Device`] and leaves nothing
    /// acquired.
    async fn open(&self) -> Result<CaptureHandle>;
}

/// An open device stream.
#[async_trait]
pub trait CameraStream: Send {
    /// Fails with [`Error::FrameNotReady`] until the device has produced a
    /// full frame.
    async fn current_frame(&mut self) -> Result<Frame>;

    /// Stop the device. Called at most once by the owning handle.
    fn close(&mut self);
}

/// Exclusive ownership of an open device stream. At most one exists per
/// session; dropping the handle closes the device if `release` was never
/// called, so every exit path frees it.
pub struct CaptureHandle {
    stream: Box<dyn CameraStream>,
    released: bool,
}

impl CaptureHandle {
    pub fn new(stream: Box<dyn CameraStream>) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    pub async fn current_frame(&mut self) -> Result<Frame> {
        if self.released {
            return Err(Error::Device("capture handle already released".into()));
        }
        self.stream.current_frame().await
    }

    /// Close the underlying device. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            self.stream.close();
            self.released = true;
            debug!("capture handle released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}
