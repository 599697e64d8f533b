//! Quirk-aware camera settings.
//!
//! Every setter swallows hardware errors after logging them: a failed
//! write leaves whatever the driver retained and the caller carries on.

use std::sync::Arc;

use camkit_core::{ModeMap, Quirk, QuirkyCamera, VideoMode, VideoModeCatalog};

use crate::device::CameraDevice;

/// Full scale of the Pi camera's `exposure_time_absolute` control.
const MAX_EXPOSURE_TIME: i32 = 10_000;

const AUTO_EXPOSURE: &str = "auto_exposure";
/// `auto_exposure` menu value for manual mode.
const AUTO_EXPOSURE_MANUAL: i32 = 1;
const EXPOSURE_TIME_ABSOLUTE: &str = "exposure_time_absolute";
const GAIN_AUTOMATIC: &str = "gain_automatic";
const GAIN: &str = "gain";

/// How exposure is driven on a given camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureStrategy {
    /// Auto exposure off, then an absolute exposure time derived from the value.
    AbsoluteTime,
    /// The driver's generic manual-exposure call.
    Manual,
}

impl ExposureStrategy {
    pub fn for_camera(camera: &QuirkyCamera) -> Self {
        if camera.has_quirk(Quirk::PiCam) {
            Self::AbsoluteTime
        } else {
            Self::Manual
        }
    }
}

/// Whether gain may be touched at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainStrategy {
    /// Auto gain off, then the raw gain value.
    Manual,
    /// Gain is left alone on cameras not known to handle it.
    Unsupported,
}

impl GainStrategy {
    pub fn for_camera(camera: &QuirkyCamera) -> Self {
        if camera.has_quirk(Quirk::Gain) {
            Self::Manual
        } else {
            Self::Unsupported
        }
    }
}

/// Absolute exposure time for an exposure setting: `10000 / exposure`.
///
/// Returns 0 when `exposure` is 0 instead of faulting.
pub fn exposure_time_for(exposure: i32) -> i32 {
    MAX_EXPOSURE_TIME.checked_div(exposure).unwrap_or(0)
}

/// Settings controller for one device session. Owns the mode catalog.
pub struct CameraSettables<D> {
    device: Arc<D>,
    camera: QuirkyCamera,
    blacklist: Vec<usize>,
    catalog: VideoModeCatalog,
    exposure: ExposureStrategy,
    gain: GainStrategy,
}

impl<D: CameraDevice> CameraSettables<D> {
    pub fn new(device: Arc<D>, camera: QuirkyCamera, blacklist: Vec<usize>) -> Self {
        let exposure = ExposureStrategy::for_camera(&camera);
        let gain = GainStrategy::for_camera(&camera);
        Self {
            device,
            camera,
            blacklist,
            catalog: VideoModeCatalog::new(),
            exposure,
            gain,
        }
    }

    /// Build the catalog and select its first mode.
    pub fn initialize(&self) {
        let first = self.all_video_modes().get(&0).copied();
        if first.is_none() {
            tracing::warn!(device = %self.device_path(), "no usable video modes; keeping driver default");
        }
        self.set_video_mode_internal(first.as_ref());
    }

    pub fn set_exposure(&self, exposure: i32) {
        let result = match self.exposure {
            ExposureStrategy::AbsoluteTime => self
                .device
                .set_property(AUTO_EXPOSURE, AUTO_EXPOSURE_MANUAL)
                .and_then(|()| {
                    self.device
                        .set_property(EXPOSURE_TIME_ABSOLUTE, exposure_time_for(exposure))
                }),
            // Written twice: some UVC drivers drop the first write after a
            // mode change. Unconfirmed whether current drivers still need it.
            ExposureStrategy::Manual => self
                .device
                .set_exposure_manual(exposure)
                .and_then(|()| self.device.set_exposure_manual(exposure)),
        };
        if let Err(e) = result {
            tracing::error!(device = %self.device_path(), exposure, error = %e, "failed to set camera exposure");
        }
    }

    pub fn set_brightness(&self, brightness: i32) {
        // Same double write as manual exposure.
        let result = self
            .device
            .set_brightness(brightness)
            .and_then(|()| self.device.set_brightness(brightness));
        if let Err(e) = result {
            tracing::error!(device = %self.device_path(), brightness, error = %e, "failed to set camera brightness");
        }
    }

    pub fn set_gain(&self, gain: i32) {
        match self.gain {
            GainStrategy::Manual => {
                let result = self
                    .device
                    .set_property(GAIN_AUTOMATIC, 0)
                    .and_then(|()| self.device.set_property(GAIN, gain));
                if let Err(e) = result {
                    tracing::error!(device = %self.device_path(), gain, error = %e, "failed to set camera gain");
                }
            }
            GainStrategy::Unsupported => {
                tracing::debug!(device = %self.device_path(), gain, "gain control not supported on this camera");
            }
        }
    }

    /// Apply a mode to the hardware. `None` is rejected without a hardware call.
    pub fn set_video_mode_internal(&self, mode: Option<&VideoMode>) {
        let Some(mode) = mode else {
            tracing::error!(device = %self.device_path(), "got no video mode; doing nothing");
            return;
        };
        match self.device.set_video_mode(mode) {
            Ok(()) => tracing::info!(device = %self.device_path(), mode = %mode, "video mode applied"),
            Err(e) => {
                tracing::error!(device = %self.device_path(), mode = %mode, error = %e, "failed to set video mode")
            }
        }
    }

    /// Apply the catalog entry at `index`.
    pub fn set_video_mode(&self, index: usize) {
        let mode = self.all_video_modes().get(&index).copied();
        if mode.is_none() {
            tracing::warn!(device = %self.device_path(), index, "no video mode at catalog index");
        }
        self.set_video_mode_internal(mode.as_ref());
    }

    /// Hardware-reported mode, or `None` when disconnected or unreadable.
    pub fn current_video_mode(&self) -> Option<VideoMode> {
        if !self.device.is_connected() {
            return None;
        }
        match self.device.video_mode() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!(device = %self.device_path(), error = %e, "failed to read current video mode");
                None
            }
        }
    }

    /// The mode catalog, enumerated from the device on first use.
    pub fn all_video_modes(&self) -> &ModeMap {
        self.catalog.get_or_enumerate(
            || self.device.enumerate_video_modes(),
            self.camera.quirks(),
            &self.blacklist,
        )
    }

    pub fn exposure_strategy(&self) -> ExposureStrategy {
        self.exposure
    }

    pub fn gain_strategy(&self) -> GainStrategy {
        self.gain
    }

    pub fn device_path(&self) -> &str {
        &self.device.identity().path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HardwareCall, MockDevice};
    use camkit_core::PixelFormat;

    fn controller(device: MockDevice, blacklist: Vec<usize>) -> (Arc<MockDevice>, CameraSettables<MockDevice>) {
        let device = Arc::new(device);
        let camera = camkit_core::quirks::resolve_identity(device.identity());
        let settables = CameraSettables::new(Arc::clone(&device), camera, blacklist);
        (device, settables)
    }

    fn webcam_modes() -> Vec<VideoMode> {
        vec![
            VideoMode::new(1280, 720, PixelFormat::Mjpeg, 30),
            VideoMode::new(640, 480, PixelFormat::Yuyv, 30),
            VideoMode::new(640, 480, PixelFormat::Gray, 30),
        ]
    }

    #[test]
    fn test_exposure_time_for() {
        assert_eq!(exposure_time_for(1), 10_000);
        assert_eq!(exposure_time_for(3), 3_333);
        assert_eq!(exposure_time_for(20_000), 0);
        assert_eq!(exposure_time_for(0), 0);
    }

    #[test]
    fn test_strategies_follow_quirks() {
        let picam = QuirkyCamera::new(None, None, "cam", [Quirk::PiCam]);
        let eye = QuirkyCamera::new(Some(1), Some(2), "eye", [Quirk::Gain]);
        let plain = QuirkyCamera::new(Some(1), Some(2), "plain", []);
        assert_eq!(ExposureStrategy::for_camera(&picam), ExposureStrategy::AbsoluteTime);
        assert_eq!(ExposureStrategy::for_camera(&eye), ExposureStrategy::Manual);
        assert_eq!(GainStrategy::for_camera(&eye), GainStrategy::Manual);
        assert_eq!(GainStrategy::for_camera(&plain), GainStrategy::Unsupported);
    }

    #[test]
    fn test_manual_exposure_written_twice() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0"), vec![]);
        settables.set_exposure(40);
        assert_eq!(
            device.writes(),
            vec![HardwareCall::SetExposureManual(40), HardwareCall::SetExposureManual(40)]
        );
    }

    #[test]
    fn test_picam_exposure_uses_absolute_time() {
        let (device, settables) = controller(MockDevice::picam("/dev/video0"), vec![]);
        settables.set_exposure(50);
        assert_eq!(
            device.writes(),
            vec![
                HardwareCall::SetProperty("auto_exposure".into(), 1),
                HardwareCall::SetProperty("exposure_time_absolute".into(), 200),
            ]
        );
    }

    #[test]
    fn test_picam_zero_exposure_writes_zero() {
        let (device, settables) = controller(MockDevice::picam("/dev/video0"), vec![]);
        settables.set_exposure(0);
        assert_eq!(device.property_value("exposure_time_absolute"), Some(0));
    }

    #[test]
    fn test_brightness_written_twice() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0"), vec![]);
        settables.set_brightness(70);
        assert_eq!(
            device.writes(),
            vec![HardwareCall::SetBrightness(70), HardwareCall::SetBrightness(70)]
        );
    }

    #[test]
    fn test_gain_without_quirk_touches_nothing() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0"), vec![]);
        settables.set_gain(12);
        settables.set_gain(12);
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_gain_with_quirk() {
        let (device, settables) = controller(MockDevice::ps3_eye("/dev/video0"), vec![]);
        settables.set_gain(12);
        assert_eq!(
            device.writes(),
            vec![
                HardwareCall::SetProperty("gain_automatic".into(), 0),
                HardwareCall::SetProperty("gain".into(), 12),
            ]
        );
    }

    #[test]
    fn test_failed_write_is_swallowed_and_not_repeated() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0").with_failing_writes(), vec![]);
        settables.set_exposure(10);
        settables.set_brightness(10);
        // The first failing write aborts the pair.
        assert_eq!(
            device.calls(),
            vec![HardwareCall::SetExposureManual(10), HardwareCall::SetBrightness(10)]
        );
    }

    #[test]
    fn test_failed_picam_exposure_stops_after_first_write() {
        let running = VideoMode::new(640, 480, PixelFormat::Bgr, 30);
        let (device, settables) = controller(
            MockDevice::picam("/dev/video0").with_current_mode(running).with_failing_writes(),
            vec![],
        );
        settables.set_exposure(50);
        assert_eq!(
            device.calls(),
            vec![HardwareCall::SetProperty("auto_exposure".into(), 1)]
        );
        assert_eq!(device.property_value("exposure_time_absolute"), None);
        assert_eq!(settables.current_video_mode(), Some(running));
    }

    #[test]
    fn test_failed_gain_stops_after_first_write() {
        let running = VideoMode::new(640, 480, PixelFormat::Yuyv, 60);
        let (device, settables) = controller(
            MockDevice::ps3_eye("/dev/video0").with_current_mode(running).with_failing_writes(),
            vec![],
        );
        settables.set_gain(12);
        assert_eq!(
            device.calls(),
            vec![HardwareCall::SetProperty("gain_automatic".into(), 0)]
        );
        assert_eq!(device.property_value("gain"), None);
        assert_eq!(settables.current_video_mode(), Some(running));
    }

    #[test]
    fn test_failed_video_mode_keeps_running_mode() {
        let running = VideoMode::new(640, 480, PixelFormat::Yuyv, 30);
        let wanted = VideoMode::new(1280, 720, PixelFormat::Mjpeg, 30);
        let (device, settables) = controller(
            MockDevice::webcam("/dev/video0").with_current_mode(running).with_failing_writes(),
            vec![],
        );
        settables.set_video_mode_internal(Some(&wanted));
        assert_eq!(device.calls(), vec![HardwareCall::SetVideoMode(wanted)]);
        assert_eq!(settables.current_video_mode(), Some(running));
    }

    #[test]
    fn test_none_mode_is_rejected() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0"), vec![]);
        settables.set_video_mode_internal(None);
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_initialize_selects_first_catalog_mode() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0").with_modes(webcam_modes()), vec![]);
        settables.initialize();
        let expected = VideoMode::new(640, 480, PixelFormat::Yuyv, 30);
        assert_eq!(settables.all_video_modes()[&0], expected);
        assert_eq!(device.writes(), vec![HardwareCall::SetVideoMode(expected)]);
        assert_eq!(settables.current_video_mode(), Some(expected));
    }

    #[test]
    fn test_initialize_with_empty_catalog_makes_no_write() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0").with_failing_enumeration(), vec![]);
        settables.initialize();
        assert!(settables.all_video_modes().is_empty());
        assert!(device.writes().is_empty());
    }

    #[test]
    fn test_catalog_enumerated_once_with_blacklist() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0").with_modes(webcam_modes()), vec![0]);
        assert_eq!(settables.all_video_modes().len(), 1);
        assert_eq!(settables.all_video_modes().len(), 1);
        let enumerations = device
            .calls()
            .into_iter()
            .filter(|c| *c == HardwareCall::EnumerateVideoModes)
            .count();
        assert_eq!(enumerations, 1);
        assert_eq!(
            settables.all_video_modes()[&0],
            VideoMode::new(1280, 720, PixelFormat::Mjpeg, 30)
        );
    }

    #[test]
    fn test_set_video_mode_by_index() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0").with_modes(webcam_modes()), vec![]);
        settables.set_video_mode(1);
        settables.set_video_mode(7);
        assert_eq!(
            device.writes(),
            vec![HardwareCall::SetVideoMode(VideoMode::new(1280, 720, PixelFormat::Mjpeg, 30))]
        );
    }

    #[test]
    fn test_current_mode_when_disconnected() {
        let (device, settables) = controller(MockDevice::webcam("/dev/video0").with_modes(webcam_modes()), vec![]);
        settables.initialize();
        device.set_connected(false);
        assert_eq!(settables.current_video_mode(), None);
    }
}
