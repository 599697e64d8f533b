//! In-memory device for exercising camera logic without hardware.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use camkit_core::{DeviceIdentity, PixelFormat, VideoMode};

use crate::device::{CameraDevice, CameraError};
use crate::frame::Frame;

/// A call the mock received that would reach hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareCall {
    EnumerateVideoModes,
    SetExposureManual(i32),
    SetBrightness(i32),
    SetProperty(String, i32),
    SetVideoMode(VideoMode),
    CaptureFrame,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<HardwareCall>,
    properties: BTreeMap<String, i64>,
    current: Option<VideoMode>,
    connected: bool,
    sequence: u32,
}

/// Scriptable stand-in for a capture device.
#[derive(Debug)]
pub struct MockDevice {
    identity: DeviceIdentity,
    modes: Option<Vec<VideoMode>>,
    fail_writes: bool,
    state: Mutex<MockState>,
}

impl MockDevice {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            modes: Some(Vec::new()),
            fail_writes: false,
            state: Mutex::new(MockState {
                connected: true,
                ..MockState::default()
            }),
        }
    }

    /// A generic USB webcam with no known quirks.
    pub fn webcam(path: &str) -> Self {
        Self::new(DeviceIdentity {
            vendor_id: Some(0x046d),
            product_id: Some(0x0825),
            base_name: "HD Webcam C270".into(),
            path: path.into(),
        })
    }

    /// A PlayStation 3 Eye (gain quirk).
    pub fn ps3_eye(path: &str) -> Self {
        Self::new(DeviceIdentity {
            vendor_id: Some(0x1415),
            product_id: Some(0x2000),
            base_name: "USB Camera-B4.09.24.1".into(),
            path: path.into(),
        })
    }

    /// A Raspberry Pi camera module (pi_cam quirk).
    pub fn picam(path: &str) -> Self {
        Self::new(DeviceIdentity {
            vendor_id: None,
            product_id: None,
            base_name: "mmal service 16.1".into(),
            path: path.into(),
        })
    }

    /// Modes reported by enumeration.
    pub fn with_modes(mut self, modes: Vec<VideoMode>) -> Self {
        self.modes = Some(modes);
        self
    }

    /// Mode the device is already running before any write.
    pub fn with_current_mode(self, mode: VideoMode) -> Self {
        self.state().current = Some(mode);
        self
    }

    /// Make mode enumeration fail.
    pub fn with_failing_enumeration(mut self) -> Self {
        self.modes = None;
        self
    }

    /// Make every setter fail after being recorded.
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<HardwareCall> {
        self.state().calls.clone()
    }

    /// Recorded calls that change device state.
    pub fn writes(&self) -> Vec<HardwareCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, HardwareCall::EnumerateVideoModes | HardwareCall::CaptureFrame))
            .collect()
    }

    /// Last value written to a named property.
    pub fn property_value(&self, name: &str) -> Option<i64> {
        self.state().properties.get(name).copied()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_write(&self, call: HardwareCall, name: &str) -> Result<(), CameraError> {
        let mut state = self.state();
        state.calls.push(call.clone());
        if self.fail_writes {
            return Err(CameraError::ControlFailed {
                name: name.to_string(),
                reason: "injected failure".into(),
            });
        }
        if !state.connected {
            return Err(CameraError::Disconnected);
        }
        match call {
            HardwareCall::SetExposureManual(v) => {
                state.properties.insert("exposure_manual".into(), i64::from(v));
            }
            HardwareCall::SetBrightness(v) => {
                state.properties.insert("brightness".into(), i64::from(v));
            }
            HardwareCall::SetProperty(name, v) => {
                state.properties.insert(name, i64::from(v));
            }
            HardwareCall::SetVideoMode(mode) => state.current = Some(mode),
            HardwareCall::EnumerateVideoModes | HardwareCall::CaptureFrame => {}
        }
        Ok(())
    }
}

impl CameraDevice for MockDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn enumerate_video_modes(&self) -> Result<Vec<VideoMode>, CameraError> {
        self.state().calls.push(HardwareCall::EnumerateVideoModes);
        self.modes
            .clone()
            .ok_or_else(|| CameraError::EnumerationFailed("injected failure".into()))
    }

    fn set_exposure_manual(&self, percent: i32) -> Result<(), CameraError> {
        self.record_write(HardwareCall::SetExposureManual(percent), "exposure")
    }

    fn set_brightness(&self, percent: i32) -> Result<(), CameraError> {
        self.record_write(HardwareCall::SetBrightness(percent), "brightness")
    }

    fn set_property(&self, name: &str, value: i32) -> Result<(), CameraError> {
        self.record_write(HardwareCall::SetProperty(name.to_string(), value), name)
    }

    fn property(&self, name: &str) -> Result<i64, CameraError> {
        self.property_value(name)
            .ok_or_else(|| CameraError::UnknownControl(name.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn video_mode(&self) -> Result<VideoMode, CameraError> {
        let state = self.state();
        if !state.connected {
            return Err(CameraError::Disconnected);
        }
        state
            .current
            .ok_or_else(|| CameraError::FormatNegotiationFailed("no mode selected".into()))
    }

    fn set_video_mode(&self, mode: &VideoMode) -> Result<(), CameraError> {
        self.record_write(HardwareCall::SetVideoMode(*mode), "video_mode")
    }

    fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut state = self.state();
        state.calls.push(HardwareCall::CaptureFrame);
        let mode = state
            .current
            .ok_or_else(|| CameraError::CaptureFailed("no mode selected".into()))?;
        state.sequence += 1;
        let bytes_per_pixel = match mode.pixel_format {
            PixelFormat::Bgr => 3,
            _ => 2,
        };
        Ok(Frame {
            data: vec![0; (mode.width * mode.height) as usize * bytes_per_pixel],
            width: mode.width,
            height: mode.height,
            pixel_format: mode.pixel_format,
            timestamp: std::time::Instant::now(),
            sequence: state.sequence,
        })
    }
}
