//! Built-in noise-pattern camera for development and tests.

use async_trait::async_trait;
use rand::Rng;

use crate::error::{Error, Result};

use super::{Camera, CameraStream, CaptureHandle, Frame};

/// Generates random-noise frames after a configurable warm-up, standing in
/// for real hardware when none is attached.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    pub width: u32,
    pub height: u32,
    /// Number of reads that fail with `FrameNotReady` before frames flow.
    pub warmup_reads: u32,
    /// Simulate the user denying the device permission prompt.
    pub deny_permission: bool,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            warmup_reads: 1,
            deny_permission: false,
        }
    }
}

impl SyntheticCamera {
    /// A source that produces frames from the very first read.
    pub fn ready() -> Self {
        Self {
            warmup_reads: 0,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Camera for SyntheticCamera {
    async fn open(&self) -> Result<CaptureHandle> {
        if self.deny_permission {
            return Err(Error::Device("camera permission denied".into()));
        }

        Ok(CaptureHandle::new(Box::new(SyntheticStream {
            width: self.width,
            height: self.height,
            warmup_left: self.warmup_reads,
            closed: false,
        })))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    warmup_left: u32,
    closed: bool,
}

#[async_trait]
impl CameraStream for SyntheticStream {
    async fn current_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(Error::Device("synthetic stream closed".into()));
        }
        if self.warmup_left > 0 {
            self.warmup_left -= 1;
            return Err(Error::FrameNotReady);
        }

        let mut rgb = vec![0u8; (self.width * self.height * 3) as usize];
        rand::thread_rng().fill(&mut rgb[..]);
        Ok(Frame {
            rgb,
            width: self.width,
            height: self.height,
        })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn warms_up_before_producing_frames() {
        let camera = SyntheticCamera {
            warmup_reads: 2,
            ..SyntheticCamera::default()
        };
        let mut handle = camera.open().await.unwrap();

        assert!(matches!(
            handle.current_frame().await,
            Err(Error::FrameNotReady)
        ));
        assert!(matches!(
            handle.current_frame().await,
            Err(Error::FrameNotReady)
        ));

        let frame = handle.current_frame().await.unwrap();
        assert_eq!(frame.width, 320);
        assert_eq!(frame.rgb.len(), 320 * 240 * 3);
    }

    #[tokio::test]
    async fn denied_permission_acquires_nothing() {
        let camera = SyntheticCamera {
            deny_permission: true,
            ..SyntheticCamera::default()
        };
        assert!(matches!(camera.open().await, Err(Error::Device(_))));
    }
}
