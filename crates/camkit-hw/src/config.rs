use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid hardware config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Board-level hardware settings, loaded from TOML and `CAMKIT_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Catalog positions to drop, applied in order against the sorted list.
    pub blacklisted_res_indices: Vec<usize>,
    /// Diagonal field of view of a vendor-supplied camera, in degrees.
    pub vendor_fov: Option<f64>,
}

impl HardwareConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&src)?.with_env_overrides();
        tracing::debug!(path = %path.display(), ?config, "loaded hardware config");
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `CAMKIT_BLACKLISTED_RES_INDICES` (comma separated) and
    /// `CAMKIT_VENDOR_FOV`. Unparseable values are logged and ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("CAMKIT_BLACKLISTED_RES_INDICES") {
            match parse_indices(&raw) {
                Some(indices) => self.blacklisted_res_indices = indices,
                None => tracing::warn!(value = %raw, "ignoring invalid CAMKIT_BLACKLISTED_RES_INDICES"),
            }
        }
        if let Some(raw) = lookup("CAMKIT_VENDOR_FOV") {
            match raw.trim().parse::<f64>() {
                Ok(fov) => self.vendor_fov = Some(fov),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid CAMKIT_VENDOR_FOV"),
            }
        }
        self
    }

    /// Whether the board ships a camera with a known field of view.
    pub fn has_preset_fov(&self) -> bool {
        self.vendor_fov.is_some_and(|fov| fov > 0.0)
    }
}

fn parse_indices(raw: &str) -> Option<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}
