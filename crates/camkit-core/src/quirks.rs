//! Camera quirks database.
//!
//! Maps a device identity (USB VID:PID plus declared base name) to the
//! set of behavioral deviations the rest of the stack must honor. The
//! table is embedded at compile time from `contrib/quirks.toml`.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use crate::types::DeviceIdentity;

const QUIRK_TABLE: &str = include_str!("../../../contrib/quirks.toml");

static QUIRK_DB: OnceLock<Vec<QuirkEntry>> = OnceLock::new();

/// One documented deviation from plain UVC behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quirk {
    /// Raspberry Pi camera module driven through V4L2. Only BGR is fast,
    /// some reported modes do not work, and exposure is an absolute time.
    PiCam,
    /// Exposes manual gain control that is safe to drive.
    Gain,
}

impl fmt::Display for Quirk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quirk::PiCam => f.write_str("pi_cam"),
            Quirk::Gain => f.write_str("gain"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuirkTable {
    #[serde(default)]
    camera: Vec<QuirkEntry>,
}

/// A single `[[camera]]` row of the quirk table.
#[derive(Debug, Clone, Deserialize)]
pub struct QuirkEntry {
    /// Human-readable model name.
    pub name: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// Exact device name to match; absent matches any name.
    pub base_name: Option<String>,
    pub quirks: BTreeSet<Quirk>,
}

impl QuirkEntry {
    fn matches(&self, vendor_id: Option<u16>, product_id: Option<u16>, base_name: &str) -> bool {
        let name_ok = match &self.base_name {
            Some(name) => name == base_name,
            None => true,
        };
        self.vendor_id == vendor_id && self.product_id == product_id && name_ok
    }
}

/// Resolved quirk profile of one attached camera. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuirkyCamera {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    base_name: String,
    quirks: BTreeSet<Quirk>,
}

impl QuirkyCamera {
    pub fn new(
        vendor_id: Option<u16>,
        product_id: Option<u16>,
        base_name: impl Into<String>,
        quirks: impl IntoIterator<Item = Quirk>,
    ) -> Self {
        Self {
            vendor_id,
            product_id,
            base_name: base_name.into(),
            quirks: quirks.into_iter().collect(),
        }
    }

    pub fn has_quirk(&self, quirk: Quirk) -> bool {
        self.quirks.contains(&quirk)
    }

    pub fn has_quirks(&self) -> bool {
        !self.quirks.is_empty()
    }

    pub fn quirks(&self) -> &BTreeSet<Quirk> {
        &self.quirks
    }

    pub fn vendor_id(&self) -> Option<u16> {
        self.vendor_id
    }

    pub fn product_id(&self) -> Option<u16> {
        self.product_id
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }
}

fn quirk_db() -> &'static Vec<QuirkEntry> {
    QUIRK_DB.get_or_init(|| match toml::from_str::<QuirkTable>(QUIRK_TABLE) {
        Ok(table) => table.camera,
        Err(e) => {
            tracing::error!(error = %e, "bad embedded quirk table; treating every camera as normal");
            Vec::new()
        }
    })
}

/// Look up the table entry for an identity, if any.
pub fn lookup_quirk(
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    base_name: &str,
) -> Option<&'static QuirkEntry> {
    quirk_db()
        .iter()
        .find(|entry| entry.matches(vendor_id, product_id, base_name))
}

/// Quirk set for an identity. Unknown cameras resolve to the empty set.
pub fn quirks_for(
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    base_name: &str,
) -> BTreeSet<Quirk> {
    lookup_quirk(vendor_id, product_id, base_name)
        .map(|entry| entry.quirks.clone())
        .unwrap_or_default()
}

/// Build the quirk profile for an identity.
pub fn resolve(vendor_id: Option<u16>, product_id: Option<u16>, base_name: &str) -> QuirkyCamera {
    QuirkyCamera::new(
        vendor_id,
        product_id,
        base_name,
        quirks_for(vendor_id, product_id, base_name),
    )
}

/// Build the quirk profile for a device the hardware layer reported.
pub fn resolve_identity(identity: &DeviceIdentity) -> QuirkyCamera {
    resolve(identity.vendor_id, identity.product_id, &identity.base_name)
}

/// List all known quirky cameras.
pub fn list_quirks() -> &'static [QuirkEntry] {
    quirk_db()
}
