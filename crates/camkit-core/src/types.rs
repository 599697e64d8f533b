use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel layout reported by a capture device for one of its modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Motion JPEG.
    Mjpeg,
    /// YUYV 4:2:2 packed.
    Yuyv,
    /// 16-bit RGB 5:6:5.
    Rgb565,
    /// 24-bit packed BGR.
    Bgr,
    /// 8- or 16-bit grayscale.
    Gray,
    /// Anything the pipeline does not recognise.
    Unknown,
}

impl PixelFormat {
    /// Map a V4L2 FourCC code to a pixel format.
    pub fn from_fourcc(code: &[u8; 4]) -> Self {
        match code {
            b"MJPG" => Self::Mjpeg,
            b"YUYV" => Self::Yuyv,
            b"RGBP" => Self::Rgb565,
            b"BGR3" => Self::Bgr,
            b"GREY" | b"Y16 " | b"Y16\0" => Self::Gray,
            _ => Self::Unknown,
        }
    }

    /// FourCC used when asking a driver for this format.
    ///
    /// `Unknown` has no code and cannot be requested.
    pub fn fourcc(self) -> Option<&'static [u8; 4]> {
        match self {
            Self::Mjpeg => Some(b"MJPG"),
            Self::Yuyv => Some(b"YUYV"),
            Self::Rgb565 => Some(b"RGBP"),
            Self::Bgr => Some(b"BGR3"),
            Self::Gray => Some(b"GREY"),
            Self::Unknown => None,
        }
    }

    /// Whether frames in this format can be fed to the processing pipeline.
    pub fn is_usable(self) -> bool {
        !matches!(self, Self::Gray | Self::Unknown)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mjpeg => "MJPEG",
            Self::Yuyv => "YUYV",
            Self::Rgb565 => "RGB565",
            Self::Bgr => "BGR",
            Self::Gray => "GRAY",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// One capture configuration a device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoMode {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub fps: u32,
}

impl VideoMode {
    pub const fn new(width: u32, height: u32, pixel_format: PixelFormat, fps: u32) -> Self {
        Self {
            width,
            height,
            pixel_format,
            fps,
        }
    }

    /// Resolution key used for catalog ordering.
    pub fn resolution_sum(&self) -> u64 {
        u64::from(self.width) + u64::from(self.height)
    }

    /// True when both modes share width, height and pixel format.
    pub fn same_shape(&self, other: &VideoMode) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.pixel_format == other.pixel_format
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} @ {} fps",
            self.width, self.height, self.pixel_format, self.fps
        )
    }
}

/// Who a capture device says it is.
///
/// Vendor and product ids are `None` for devices not attached over USB
/// (e.g. CSI camera modules).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub base_name: String,
    pub path: String,
}
