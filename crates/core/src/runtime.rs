//! Runtime facts observed on the device (kernel, sepolicy, AVB).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeFacts {
    /// `uname -r` style version, e.g. `4.19.123`.
    pub kernel_version: String,
    #[serde(default)]
    pub os_release: String,
    #[serde(default)]
    pub kernel_config: BTreeMap<String, String>,
    #[serde(default)]
    pub kernel_sepolicy_version: Option<u64>,
    #[serde(default)]
    pub avb_version: Option<String>,
}

impl RuntimeFacts {
    pub fn kernel(&self) -> Result<KernelVersion, CoreError> {
        self.kernel_version.parse()
    }

    pub fn is_mainline_kernel(&self) -> bool {
        self.os_release.contains("-mainline")
    }
}

/// `version.major_rev.minor_rev`, e.g. `4.19.123`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KernelVersion {
    pub version: u64,
    pub major_rev: u64,
    pub minor_rev: u64,
}

impl KernelVersion {
    /// Same `version.major_rev` line.
    pub fn same_line(&self, other: &KernelVersion) -> bool {
        self.version == other.version && self.major_rev == other.major_rev
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.version, self.major_rev, self.minor_rev)
    }
}

impl FromStr for KernelVersion {
    type Err = CoreError;

    /// Accepts trailing suffixes like `4.19.123-android12-9-g1234`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let numeric: String = s
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let parts: Vec<&str> = numeric.split('.').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            return Err(CoreError::InvalidName {
                name: s.to_string(),
                reason: "kernel version must be <version>.<major>[.<minor>]".to_string(),
            });
        }
        let parse = |p: &str| {
            p.parse::<u64>().map_err(|e| CoreError::InvalidName {
                name: s.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(KernelVersion {
            version: parse(parts[0])?,
            major_rev: parse(parts[1])?,
            minor_rev: match parts.get(2) {
                Some(p) => parse(p)?,
                None => 0,
            },
        })
    }
}
