//! Video mode catalog — turns a device's raw mode list into a clean,
//! densely indexed set of usable modes.
//!
//! A catalog is built at most once per device session. Capability changes
//! after the first build are not picked up; open a new session instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use crate::quirks::Quirk;
use crate::types::{PixelFormat, VideoMode};

/// Catalog index → mode. Keys are always `0..len`.
pub type ModeMap = BTreeMap<usize, VideoMode>;

/// Modes the Pi camera driver advertises but cannot actually deliver.
const PICAM_BOGUS_MODES: [(u32, u32, PixelFormat); 4] = [
    (1296, 730, PixelFormat::Bgr),
    (1296, 972, PixelFormat::Bgr),
    (2592, 1944, PixelFormat::Bgr),
    (160, 120, PixelFormat::Bgr),
];

/// Lazily built, never invalidated mode catalog for one device session.
#[derive(Debug, Default)]
pub struct VideoModeCatalog {
    modes: OnceLock<ModeMap>,
}

impl VideoModeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from already enumerated modes.
    ///
    /// Only the first call does any work; later calls return the cached
    /// catalog and ignore their arguments.
    pub fn build(&self, raw: &[VideoMode], quirks: &BTreeSet<Quirk>, blacklist: &[usize]) -> &ModeMap {
        self.modes
            .get_or_init(|| index_modes(normalize_modes(raw, quirks, blacklist)))
    }

    /// Build the catalog, running `enumerate` only if nothing is cached yet.
    ///
    /// An enumeration error is logged and treated as an empty mode list.
    pub fn get_or_enumerate<F, E>(
        &self,
        enumerate: F,
        quirks: &BTreeSet<Quirk>,
        blacklist: &[usize],
    ) -> &ModeMap
    where
        F: FnOnce() -> Result<Vec<VideoMode>, E>,
        E: fmt::Display,
    {
        self.modes.get_or_init(|| {
            let raw = enumerate().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "video mode enumeration failed; catalog will be empty");
                Vec::new()
            });
            let modes = index_modes(normalize_modes(&raw, quirks, blacklist));
            tracing::debug!(raw = raw.len(), usable = modes.len(), "built video mode catalog");
            modes
        })
    }

    /// The catalog if it has been built.
    pub fn get(&self) -> Option<&ModeMap> {
        self.modes.get()
    }

    pub fn is_built(&self) -> bool {
        self.modes.get().is_some()
    }
}

/// Run the full filtering pipeline over `raw` in reported order.
///
/// Returns the surviving modes in catalog order.
pub fn normalize_modes(
    raw: &[VideoMode],
    quirks: &BTreeSet<Quirk>,
    blacklist: &[usize],
) -> Vec<VideoMode> {
    let pi_cam = quirks.contains(&Quirk::PiCam);

    let mut modes: Vec<VideoMode> = Vec::with_capacity(raw.len());
    for mode in raw {
        if !mode.pixel_format.is_usable() {
            continue;
        }
        // Anything but BGR costs a conversion on the Pi.
        if pi_cam && mode.pixel_format != PixelFormat::Bgr {
            continue;
        }
        keep_fastest(&mut modes, *mode);
    }

    // Stable: equal sums keep their dedup order.
    modes.sort_by_key(VideoMode::resolution_sum);

    // Each removal shifts the positions later blacklist entries refer to.
    for &index in blacklist {
        if index < modes.len() {
            let removed = modes.remove(index);
            tracing::debug!(index, mode = %removed, "removed blacklisted video mode");
        } else {
            tracing::warn!(
                index,
                len = modes.len(),
                "blacklisted resolution index out of range; ignoring"
            );
        }
    }

    if pi_cam {
        modes.retain(|mode| !is_picam_bogus(mode));
    }

    modes
}

/// Add `mode` to `modes`, keeping only the fastest entry per shape.
///
/// A faster newcomer replaces the incumbent and goes to the back; a
/// newcomer that is not faster is dropped.
fn keep_fastest(modes: &mut Vec<VideoMode>, mode: VideoMode) {
    match modes.iter().position(|m| m.same_shape(&mode)) {
        Some(i) if modes[i].fps >= mode.fps => {}
        Some(i) => {
            modes.remove(i);
            modes.push(mode);
        }
        None => modes.push(mode),
    }
}

fn is_picam_bogus(mode: &VideoMode) -> bool {
    PICAM_BOGUS_MODES
        .iter()
        .any(|&(w, h, fmt)| mode.width == w && mode.height == h && mode.pixel_format == fmt)
}

fn index_modes(modes: Vec<VideoMode>) -> ModeMap {
    modes.into_iter().enumerate().collect()
}
