//! camkit-core — Video mode normalization and camera quirk resolution.
//!
//! Pure logic with no hardware access: the quirk registry maps a device
//! identity to its known deviations, and the catalog turns a raw mode
//! list into a deduplicated, ordered, indexable set of usable modes.

pub mod catalog;
pub mod quirks;
pub mod types;

pub use catalog::{ModeMap, VideoModeCatalog};
pub use quirks::{Quirk, QuirkyCamera};
pub use types::{DeviceIdentity, PixelFormat, VideoMode};
