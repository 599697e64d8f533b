//! The hardware seam every capture backend implements.

use camkit_core::{DeviceIdentity, VideoMode};
use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("device disconnected")]
    Disconnected,
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("unknown control: {0}")]
    UnknownControl(String),
    #[error("failed to set control {name}: {reason}")]
    ControlFailed { name: String, reason: String },
    #[error("video mode enumeration failed: {0}")]
    EnumerationFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Blocking calls into one physical capture device.
///
/// Every call may fail with a driver error. Callers serialize access; no
/// implementation is expected to lock internally.
pub trait CameraDevice {
    /// Static descriptor of the attached device.
    fn identity(&self) -> &DeviceIdentity;

    /// Every mode the driver reports, in driver order, unfiltered.
    fn enumerate_video_modes(&self) -> Result<Vec<VideoMode>, CameraError>;

    /// Switch to manual exposure and set it to `percent` (0–100) of the range.
    fn set_exposure_manual(&self, percent: i32) -> Result<(), CameraError>;

    /// Set brightness to `percent` (0–100) of the control range.
    fn set_brightness(&self, percent: i32) -> Result<(), CameraError>;

    /// Write a raw value to a named control (e.g. `exposure_time_absolute`).
    fn set_property(&self, name: &str, value: i32) -> Result<(), CameraError>;

    /// Read a raw value from a named control.
    fn property(&self, name: &str) -> Result<i64, CameraError>;

    fn is_connected(&self) -> bool;

    /// Mode the hardware is currently configured for.
    fn video_mode(&self) -> Result<VideoMode, CameraError>;

    fn set_video_mode(&self, mode: &VideoMode) -> Result<(), CameraError>;

    /// Dequeue a single frame in the current mode.
    fn capture_frame(&self) -> Result<Frame, CameraError>;
}
