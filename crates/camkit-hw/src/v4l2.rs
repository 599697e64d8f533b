//! V4L2 capture devices via the `v4l` crate.

use std::path::Path;

use camkit_core::{DeviceIdentity, PixelFormat, VideoMode};
use v4l::buffer::Type as BufType;
use v4l::control::{Control, Description, Value};
use v4l::framesize::FrameSizeEnum;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::FourCC;

use crate::device::{CameraDevice, CameraError};
use crate::frame::Frame;
use crate::usb::get_usb_ids;

const V4L2_CID_BRIGHTNESS: u32 = 0x0098_0900;
const V4L2_CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
const V4L2_EXPOSURE_MANUAL: i64 = 1;

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
    pub usb_ids: Option<(u16, u16)>,
}

/// An opened V4L2 capture node.
pub struct V4l2Camera {
    device: Device,
    identity: DeviceIdentity,
}

impl V4l2Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::DeviceNotFound(format!("{device_path}: failed to query capabilities: {e}"))
        })?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let usb_ids = get_usb_ids(device_path);
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            usb_ids = ?usb_ids,
            "opened camera"
        );

        Ok(Self {
            device,
            identity: DeviceIdentity {
                vendor_id: usb_ids.map(|(vid, _)| vid),
                product_id: usb_ids.map(|(_, pid)| pid),
                base_name: caps.card,
                path: device_path.to_string(),
            },
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            let usb_ids = get_usb_ids(&path);
            devices.push(DeviceInfo {
                path,
                name: caps.card,
                driver: caps.driver,
                bus: caps.bus,
                usb_ids,
            });
        }

        devices
    }

    fn control_failed(name: &str, e: std::io::Error) -> CameraError {
        CameraError::ControlFailed {
            name: name.to_string(),
            reason: e.to_string(),
        }
    }

    fn controls(&self) -> Result<Vec<Description>, CameraError> {
        self.device
            .query_controls()
            .map_err(|e| Self::control_failed("query_controls", e))
    }

    fn find_control(&self, name: &str) -> Result<Description, CameraError> {
        self.controls()?
            .into_iter()
            .find(|d| control_key(&d.name) == name)
            .ok_or_else(|| CameraError::UnknownControl(name.to_string()))
    }

    fn write_control(&self, id: u32, name: &str, value: i64) -> Result<(), CameraError> {
        tracing::trace!(device = %self.identity.path, control = name, value, "set control");
        self.device
            .set_control(Control {
                id,
                value: Value::Integer(value),
            })
            .map_err(|e| Self::control_failed(name, e))
    }

    /// Set a control by id to `percent` of its range.
    fn write_percent(&self, id: u32, name: &str, percent: i32) -> Result<(), CameraError> {
        let desc = self
            .controls()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| CameraError::UnknownControl(name.to_string()))?;
        self.write_control(id, name, scale_percent(percent, desc.minimum, desc.maximum))
    }
}

impl CameraDevice for V4l2Camera {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn enumerate_video_modes(&self) -> Result<Vec<VideoMode>, CameraError> {
        let formats = self
            .device
            .enum_formats()
            .map_err(|e| CameraError::EnumerationFailed(format!("formats: {e}")))?;

        let mut modes = Vec::new();
        for fmt in formats {
            let pixel_format = PixelFormat::from_fourcc(&fmt.fourcc.repr);
            let sizes = match self.device.enum_framesizes(fmt.fourcc) {
                Ok(sizes) => sizes,
                Err(e) => {
                    tracing::debug!(fourcc = %fmt.fourcc, error = %e, "skipping format without frame sizes");
                    continue;
                }
            };
            for size in sizes {
                let FrameSizeEnum::Discrete(discrete) = size.size else {
                    tracing::debug!(fourcc = %fmt.fourcc, "skipping stepwise frame size");
                    continue;
                };
                let intervals = self
                    .device
                    .enum_frameintervals(fmt.fourcc, discrete.width, discrete.height)
                    .unwrap_or_default();
                for interval in intervals {
                    let FrameIntervalEnum::Discrete(fraction) = interval.interval else {
                        continue;
                    };
                    if let Some(fps) = fps_from_interval(fraction.numerator, fraction.denominator) {
                        modes.push(VideoMode::new(discrete.width, discrete.height, pixel_format, fps));
                    }
                }
            }
        }

        tracing::debug!(device = %self.identity.path, count = modes.len(), "enumerated video modes");
        Ok(modes)
    }

    fn set_exposure_manual(&self, percent: i32) -> Result<(), CameraError> {
        self.write_control(V4L2_CID_EXPOSURE_AUTO, "exposure_auto", V4L2_EXPOSURE_MANUAL)?;
        self.write_percent(V4L2_CID_EXPOSURE_ABSOLUTE, "exposure_absolute", percent)
    }

    fn set_brightness(&self, percent: i32) -> Result<(), CameraError> {
        self.write_percent(V4L2_CID_BRIGHTNESS, "brightness", percent)
    }

    fn set_property(&self, name: &str, value: i32) -> Result<(), CameraError> {
        let desc = self.find_control(name)?;
        self.write_control(desc.id, name, i64::from(value))
    }

    fn property(&self, name: &str) -> Result<i64, CameraError> {
        let desc = self.find_control(name)?;
        let ctrl = self
            .device
            .control(desc.id)
            .map_err(|e| Self::control_failed(name, e))?;
        match ctrl.value {
            Value::Integer(v) => Ok(v),
            Value::Boolean(v) => Ok(i64::from(v)),
            _ => Err(CameraError::UnknownControl(name.to_string())),
        }
    }

    fn is_connected(&self) -> bool {
        Path::new(&self.identity.path).exists() && self.device.query_caps().is_ok()
    }

    fn video_mode(&self) -> Result<VideoMode, CameraError> {
        let fmt = self.device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        let params = self.device.params().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get parameters: {e}"))
        })?;
        let fps = fps_from_interval(params.interval.numerator, params.interval.denominator)
            .ok_or_else(|| {
                CameraError::FormatNegotiationFailed("driver reported no frame interval".into())
            })?;
        Ok(VideoMode::new(
            fmt.width,
            fmt.height,
            PixelFormat::from_fourcc(&fmt.fourcc.repr),
            fps,
        ))
    }

    fn set_video_mode(&self, mode: &VideoMode) -> Result<(), CameraError> {
        let code = mode
            .pixel_format
            .fourcc()
            .ok_or_else(|| CameraError::UnsupportedPixelFormat(mode.pixel_format.to_string()))?;

        let mut fmt = self.device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(code);
        fmt.width = mode.width;
        fmt.height = mode.height;

        let negotiated = self.device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;
        if negotiated.width != mode.width
            || negotiated.height != mode.height
            || negotiated.fourcc != fmt.fourcc
        {
            tracing::warn!(
                requested = %mode,
                width = negotiated.width,
                height = negotiated.height,
                fourcc = %negotiated.fourcc,
                "driver adjusted requested format"
            );
        }

        self.device
            .set_params(&Parameters::with_fps(mode.fps))
            .map_err(|e| {
                CameraError::FormatNegotiationFailed(format!("failed to set frame rate: {e}"))
            })?;
        Ok(())
    }

    fn capture_frame(&self) -> Result<Frame, CameraError> {
        let fmt = self
            .device
            .format()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to get format: {e}")))?;

        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        let used = (meta.bytesused as usize).min(buf.len());

        Ok(Frame {
            data: buf[..used].to_vec(),
            width: fmt.width,
            height: fmt.height,
            pixel_format: PixelFormat::from_fourcc(&fmt.fourcc.repr),
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }
}

/// Frames per second for a frame interval, rounded to the nearest integer.
fn fps_from_interval(numerator: u32, denominator: u32) -> Option<u32> {
    if numerator == 0 || denominator == 0 {
        return None;
    }
    let fps = (f64::from(denominator) / f64::from(numerator)).round() as u32;
    (fps > 0).then_some(fps)
}

/// Map `percent` (clamped to 0–100) onto `[min, max]`.
fn scale_percent(percent: i32, min: i64, max: i64) -> i64 {
    let percent = i64::from(percent.clamp(0, 100));
    min + (max - min) * percent / 100
}

/// Normalize a V4L2 control name ("Exposure Time, Absolute") to a
/// property key ("exposure_time_absolute").
fn control_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
        } else if !key.is_empty() && !key.ends_with('_') {
            key.push('_');
        }
    }
    while key.ends_with('_') {
        key.pop();
    }
    key
}
