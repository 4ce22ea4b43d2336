//! Read-only device properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const BOARD_API_LEVEL: &str = "ro.board.api_level";
pub const BOARD_FIRST_API_LEVEL: &str = "ro.board.first_api_level";
pub const VENDOR_BUILD_SDK: &str = "ro.vendor.build.version.sdk";
pub const PRODUCT_FIRST_API_LEVEL: &str = "ro.product.first_api_level";
pub const BUILD_SDK: &str = "ro.build.version.sdk";
pub const VENDOR_API_LEVEL: &str = "ro.vendor.api_level";
pub const BUILD_CODENAME: &str = "ro.build.version.codename";
pub const TIMEOUT_MULTIPLIER: &str = "ro.hw_timeout_multiplier";
pub const VNDK_VERSION: &str = "ro.vndk.version";
pub const LOW_RAM: &str = "ro.config.low_ram";

/// A string-to-string property map, as read from the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceProperties(BTreeMap<String, String>);

impl DeviceProperties {
    pub fn new() -> Self {
        DeviceProperties::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The value of `key`, treating an empty string as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    fn first_u64(&self, keys: &[&str]) -> Option<u64> {
        keys.iter().find_map(|k| self.get_u64(k))
    }

    /// Minimum of the first set board level and the first set device level.
    ///
    /// Returns 0 when neither can be determined.
    pub fn board_api_level(&self) -> u64 {
        let board = self.first_u64(&[BOARD_API_LEVEL, BOARD_FIRST_API_LEVEL, VENDOR_BUILD_SDK]);
        let device = self.first_u64(&[PRODUCT_FIRST_API_LEVEL, BUILD_SDK]);
        match (board, device) {
            (Some(b), Some(d)) => b.min(d),
            (Some(level), None) | (None, Some(level)) => level,
            (None, None) => 0,
        }
    }

    /// `ro.vendor.api_level` when set, otherwise the derived board level.
    pub fn vendor_api_level(&self) -> u64 {
        self.get_u64(VENDOR_API_LEVEL)
            .unwrap_or_else(|| self.board_api_level())
    }

    pub fn shipping_api_level(&self) -> Option<u64> {
        self.get_u64(PRODUCT_FIRST_API_LEVEL)
    }

    pub fn is_release(&self) -> bool {
        self.get(BUILD_CODENAME) == Some("REL")
    }

    pub fn vndk_version(&self) -> Option<&str> {
        self.get(VNDK_VERSION).map(str::trim)
    }

    /// Go devices set `ro.config.low_ram`.
    pub fn is_low_ram(&self) -> bool {
        matches!(self.get(LOW_RAM).map(str::trim), Some("1" | "y" | "yes" | "on" | "true"))
    }

    pub fn timeout_multiplier(&self) -> u32 {
        self.get(TIMEOUT_MULTIPLIER)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|m| *m > 0)
            .unwrap_or(1)
    }
}

impl FromIterator<(String, String)> for DeviceProperties {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        DeviceProperties(iter.into_iter().collect())
    }
}
