//! Verification policy knobs.

use serde::{Deserialize, Serialize};
use vintf_core::FqName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Packages that may be declared with the in-process transport.
    #[serde(default = "default_passthrough_hals")]
    pub passthrough_hals: Vec<String>,
    /// Package roots of Android platform interfaces.
    #[serde(default = "default_package_roots")]
    pub package_roots: Vec<String>,
    /// Boards at or below this API level get legacy exemptions for non-platform HALs.
    #[serde(default = "default_legacy_api_level")]
    pub legacy_api_level: u64,
    /// Devices targeting this FCM level or lower may declare a stale flat-RPC version.
    #[serde(default = "default_legacy_aidl_fcm_level")]
    pub legacy_aidl_fcm_level: u64,
}

fn default_passthrough_hals() -> Vec<String> {
    vec![
        "android.hardware.graphics.mapper".to_string(),
        "android.hardware.renderscript".to_string(),
        "android.hidl.memory".to_string(),
    ]
}

fn default_package_roots() -> Vec<String> {
    vec![
        "android.frameworks".to_string(),
        "android.hardware".to_string(),
        "android.hidl".to_string(),
        "android.system".to_string(),
    ]
}

fn default_legacy_api_level() -> u64 {
    27
}

fn default_legacy_aidl_fcm_level() -> u64 {
    5
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            passthrough_hals: default_passthrough_hals(),
            package_roots: default_package_roots(),
            legacy_api_level: default_legacy_api_level(),
            legacy_aidl_fcm_level: default_legacy_aidl_fcm_level(),
        }
    }
}

impl Policy {
    /// Exact package match, not prefix.
    pub fn allows_passthrough(&self, package: &str) -> bool {
        self.passthrough_hals.iter().any(|p| p == package)
    }

    /// True iff the interface lives under a known platform package root.
    pub fn is_platform_interface(&self, fq_name: &FqName) -> bool {
        self.package_roots.iter().any(|root| fq_name.in_package(root))
    }
}
