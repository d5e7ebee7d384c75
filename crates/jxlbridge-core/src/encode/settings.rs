//! Encode settings.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Quality used when the caller doesn't choose one.
pub const DEFAULT_QUALITY: u32 = 75;

/// Effort used when the caller doesn't choose one.
pub const DEFAULT_EFFORT: u32 = 7;

/// Quality that selects lossless mode.
pub const LOSSLESS_QUALITY: u32 = 100;

/// Quality and effort for one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// 0..=100. 100 is lossless, lower values trade fidelity for size.
    pub quality: u32,
    /// 1..=10, passed to the engine unchanged. Higher is slower and smaller.
    pub effort: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            effort: DEFAULT_EFFORT,
        }
    }
}

impl EncodeSettings {
    pub fn new(quality: u32, effort: u32) -> Self {
        Self { quality, effort }
    }

    /// Lossless settings at the default effort.
    pub fn lossless() -> Self {
        Self {
            quality: LOSSLESS_QUALITY,
            ..Self::default()
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.quality == LOSSLESS_QUALITY
    }

    /// Check both knobs are in range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.quality > LOSSLESS_QUALITY {
            return Err(Error::InvalidQuality(self.quality as i64));
        }
        if !(1..=10).contains(&self.effort) {
            return Err(Error::InvalidEffort(self.effort as i64));
        }
        Ok(())
    }
}
