//! Frame type and the frame-delivery side of a camera source.

use std::sync::Arc;

use camkit_core::PixelFormat;

use crate::device::{CameraDevice, CameraError};
use crate::settables::CameraSettables;

/// A captured camera frame, still in the device's pixel format.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

/// Hands out frames from one device.
///
/// Built alongside the settables of the same device; the frame geometry
/// is whatever mode the hardware is running when a frame is grabbed.
pub struct FrameProvider<D> {
    device: Arc<D>,
    device_path: String,
}

impl<D: CameraDevice> FrameProvider<D> {
    pub fn new(device: Arc<D>, settables: &CameraSettables<D>) -> Self {
        tracing::debug!(device = %settables.device_path(), "frame provider ready");
        Self {
            device,
            device_path: settables.device_path().to_string(),
        }
    }

    /// Grab the next frame.
    pub fn next_frame(&self) -> Result<Frame, CameraError> {
        if !self.device.is_connected() {
            return Err(CameraError::Disconnected);
        }
        let frame = self.device.capture_frame()?;
        tracing::trace!(
            device = %self.device_path,
            seq = frame.sequence,
            width = frame.width,
            height = frame.height,
            "frame captured"
        );
        Ok(frame)
    }
}
