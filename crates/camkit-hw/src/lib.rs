//! camkit-hw — Hardware side of camera configuration.
//!
//! Provides the V4L2 backend, quirk-aware settings application and the
//! `CameraSource` that ties settings and frame delivery to one device.

pub mod config;
pub mod device;
pub mod frame;
pub mod mock;
pub mod settables;
pub mod source;
pub mod usb;
pub mod v4l2;

pub use config::HardwareConfig;
pub use device::{CameraDevice, CameraError};
pub use frame::{Frame, FrameProvider};
pub use settables::CameraSettables;
pub use source::CameraSource;
pub use v4l2::V4l2Camera;
