//! A camera source: settings and frame delivery for one physical device.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Once};

use camkit_core::{quirks, Quirk, QuirkyCamera};

use crate::config::HardwareConfig;
use crate::device::CameraDevice;
use crate::frame::FrameProvider;
use crate::settables::CameraSettables;

pub struct CameraSource<D> {
    camera: QuirkyCamera,
    settables: CameraSettables<D>,
    frame_provider: FrameProvider<D>,
    config: HardwareConfig,
    initialized: Once,
}

impl<D: CameraDevice> CameraSource<D> {
    pub fn new(device: D, config: HardwareConfig) -> Self {
        Self::from_shared(Arc::new(device), config)
    }

    /// Resolve quirks, build the settables and attach a frame provider to
    /// the same device. Nothing is written to the device here: the initial
    /// mode is applied on first access through [`Self::settables`] or
    /// [`Self::frame_provider`].
    pub fn from_shared(device: Arc<D>, config: HardwareConfig) -> Self {
        let camera = quirks::resolve_identity(device.identity());
        if camera.has_quirks() {
            tracing::info!(
                device = %device.identity().path,
                name = camera.base_name(),
                quirks = ?camera.quirks(),
                "quirky camera detected"
            );
        }

        let settables = CameraSettables::new(
            Arc::clone(&device),
            camera.clone(),
            config.blacklisted_res_indices.clone(),
        );
        let frame_provider = FrameProvider::new(device, &settables);

        Self {
            camera,
            settables,
            frame_provider,
            config,
            initialized: Once::new(),
        }
    }

    pub fn frame_provider(&self) -> &FrameProvider<D> {
        self.ensure_initialized();
        &self.frame_provider
    }

    /// The settings controller. The first call selects catalog index 0.
    pub fn settables(&self) -> &CameraSettables<D> {
        self.ensure_initialized();
        &self.settables
    }

    /// The settings controller as found, without selecting an initial mode.
    pub fn inspect(&self) -> &CameraSettables<D> {
        &self.settables
    }

    pub fn quirks(&self) -> &QuirkyCamera {
        &self.camera
    }

    /// A board-supplied camera: preset FOV configured and a Pi camera attached.
    pub fn is_vendor_camera(&self) -> bool {
        // TODO: match the sensor model once the driver exposes it; a preset
        // FOV alone says nothing about which module is attached.
        self.config.has_preset_fov() && self.camera.has_quirk(Quirk::PiCam)
    }

    fn ensure_initialized(&self) {
        self.initialized.call_once(|| self.settables.initialize());
    }
}

/// Sources compare by quirk set only. Two different units with the same
/// quirks are equal, regardless of path or USB ids.
impl<D> PartialEq for CameraSource<D> {
    fn eq(&self, other: &Self) -> bool {
        self.camera.quirks() == other.camera.quirks()
    }
}

impl<D> Eq for CameraSource<D> {}

impl<D> Hash for CameraSource<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.camera.quirks().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HardwareCall, MockDevice};
    use camkit_core::{PixelFormat, VideoMode};
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn picam_modes() -> Vec<VideoMode> {
        vec![
            VideoMode::new(160, 120, PixelFormat::Bgr, 90),
            VideoMode::new(640, 480, PixelFormat::Bgr, 30),
            VideoMode::new(640, 480, PixelFormat::Yuyv, 90),
            VideoMode::new(1296, 972, PixelFormat::Bgr, 42),
            VideoMode::new(1920, 1080, PixelFormat::Bgr, 30),
        ]
    }

    #[test]
    fn test_same_quirks_different_paths_are_equal() {
        let a = CameraSource::new(MockDevice::ps3_eye("/dev/video0"), HardwareConfig::default());
        let b = CameraSource::new(MockDevice::ps3_eye("/dev/video2"), HardwareConfig::default());
        assert!(a == b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_unrelated_normal_cameras_are_equal() {
        let other = MockDevice::new(camkit_core::DeviceIdentity {
            vendor_id: Some(0x0c45),
            product_id: Some(0x6366),
            base_name: "USB 2.0 Camera".into(),
            path: "/dev/video1".into(),
        });
        let a = CameraSource::new(MockDevice::webcam("/dev/video0"), HardwareConfig::default());
        let b = CameraSource::new(other, HardwareConfig::default());
        assert_ne!(a.quirks(), b.quirks());
        assert!(a == b);
    }

    #[test]
    fn test_different_quirks_are_not_equal() {
        let a = CameraSource::new(MockDevice::ps3_eye("/dev/video0"), HardwareConfig::default());
        let b = CameraSource::new(MockDevice::picam("/dev/video0"), HardwareConfig::default());
        assert!(a != b);
    }

    #[test]
    fn test_construction_writes_nothing() {
        let device = Arc::new(MockDevice::picam("/dev/video0").with_modes(picam_modes()));
        let _source = CameraSource::from_shared(Arc::clone(&device), HardwareConfig::default());
        assert!(device.writes().is_empty());
    }

    #[test]
    fn test_first_settables_access_selects_first_mode() {
        let device = Arc::new(MockDevice::picam("/dev/video0").with_modes(picam_modes()));
        let source = CameraSource::from_shared(Arc::clone(&device), HardwareConfig::default());

        let modes = source.settables().all_video_modes();
        assert_eq!(
            modes.values().copied().collect::<Vec<_>>(),
            vec![
                VideoMode::new(640, 480, PixelFormat::Bgr, 30),
                VideoMode::new(1920, 1080, PixelFormat::Bgr, 30),
            ]
        );
        source.settables();
        assert_eq!(
            device.writes(),
            vec![HardwareCall::SetVideoMode(VideoMode::new(640, 480, PixelFormat::Bgr, 30))]
        );
    }

    #[test]
    fn test_inspect_reports_running_mode() {
        let device = Arc::new(MockDevice::picam("/dev/video0").with_modes(picam_modes()));
        let first = CameraSource::from_shared(Arc::clone(&device), HardwareConfig::default());
        first.settables().set_video_mode(1);
        let running = VideoMode::new(1920, 1080, PixelFormat::Bgr, 30);

        let second = CameraSource::from_shared(Arc::clone(&device), HardwareConfig::default());
        assert_eq!(second.inspect().all_video_modes()[&1], running);
        assert_eq!(second.inspect().current_video_mode(), Some(running));
        assert_eq!(
            device.writes(),
            vec![
                HardwareCall::SetVideoMode(VideoMode::new(640, 480, PixelFormat::Bgr, 30)),
                HardwareCall::SetVideoMode(running),
            ]
        );
    }

    #[test]
    fn test_blacklist_comes_from_config() {
        let config = HardwareConfig {
            blacklisted_res_indices: vec![1],
            vendor_fov: None,
        };
        let source = CameraSource::new(MockDevice::picam("/dev/video0").with_modes(picam_modes()), config);
        // Sorted: 160x120, 640x480, 1296x972, 1920x1080. Index 1 is dropped
        // before the bogus-mode filter runs.
        assert_eq!(
            source.settables().all_video_modes().values().copied().collect::<Vec<_>>(),
            vec![VideoMode::new(1920, 1080, PixelFormat::Bgr, 30)]
        );
    }

    #[test]
    fn test_is_vendor_camera() {
        let fov = HardwareConfig {
            vendor_fov: Some(62.2),
            ..HardwareConfig::default()
        };
        assert!(CameraSource::new(MockDevice::picam("/dev/video0"), fov.clone()).is_vendor_camera());
        assert!(!CameraSource::new(MockDevice::picam("/dev/video0"), HardwareConfig::default()).is_vendor_camera());
        assert!(!CameraSource::new(MockDevice::webcam("/dev/video0"), fov).is_vendor_camera());
    }

    #[test]
    fn test_frame_provider_uses_selected_mode() {
        let device = Arc::new(MockDevice::picam("/dev/video0").with_modes(picam_modes()));
        let source = CameraSource::from_shared(Arc::clone(&device), HardwareConfig::default());
        let frame = source.frame_provider().next_frame().unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.data.len(), 640 * 480 * 3);

        device.set_connected(false);
        assert!(source.frame_provider().next_frame().is_err());
    }
}
