//! Framework compatibility matrix (FCM) levels and launch requirements.

/// Vendor API level to the minimum target FCM level a device launching at
/// that API level must declare. From 202404 on, levels use `YYYYMM`.
pub const API_LEVEL_TO_FCM: &[(u64, u64)] = &[
    (25, 1),
    (26, 1),
    (27, 2),
    (28, 3),
    (29, 4),
    (30, 5),
    (31, 6),
    (32, 6),
    (33, 7),
    (34, 8),
    (202404, 202404),
];

/// Highest vendor API level that may omit a target FCM level.
pub const LAST_UNSPECIFIED_TARGET_API_LEVEL: u64 = 27;

/// First vendor API level subject to the HIDL registration census.
pub const HIDL_CENSUS_API_LEVEL: u64 = 34;

/// Named target FCM levels.
pub const FCM_LEVEL_R: u64 = 5;
pub const FCM_LEVEL_T: u64 = 7;
pub const FCM_LEVEL_U: u64 = 8;
pub const FCM_LEVEL_V: u64 = 202404;

/// First board API level whose device matrix must name a vendor NDK version.
pub const VNDK_FIRST_API_LEVEL: u64 = 28;

/// API level at which the VNDK is frozen. Devices may still report it, never above.
pub const VNDK_LAST_VERSION: u64 = 35;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("device's vendor API level cannot be determined")]
    UnknownApiLevel,

    #[error("target FCM version (device manifest target-level) must be set for vendor API level {api_level}")]
    MissingTarget { api_level: u64 },

    #[error("pre-N devices (vendor API level {api_level}) are not supported")]
    TooOld { api_level: u64 },

    #[error("no launch requirement is known for vendor API level {api_level}")]
    NoRequirement { api_level: u64 },

    #[error("vendor API level {api_level} requires target FCM version >= {required} (but is {actual})")]
    TooLow {
        api_level: u64,
        required: u64,
        actual: u64,
    },
}

pub fn fcm_level_for_api_level(api_level: u64) -> Option<u64> {
    API_LEVEL_TO_FCM
        .iter()
        .find(|(api, _)| *api == api_level)
        .map(|(_, fcm)| *fcm)
}

/// Check a device's declared target FCM level against its vendor API level.
pub fn check_target_fcm_version(target: Option<u64>, vendor_api_level: u64) -> Result<(), LevelError> {
    if vendor_api_level == 0 {
        return Err(LevelError::UnknownApiLevel);
    }
    let Some(actual) = target else {
        if vendor_api_level <= LAST_UNSPECIFIED_TARGET_API_LEVEL {
            return Ok(());
        }
        return Err(LevelError::MissingTarget {
            api_level: vendor_api_level,
        });
    };
    let oldest = API_LEVEL_TO_FCM.first().map(|(api, _)| *api).unwrap_or(0);
    if vendor_api_level < oldest {
        return Err(LevelError::TooOld {
            api_level: vendor_api_level,
        });
    }
    let required = fcm_level_for_api_level(vendor_api_level).ok_or(LevelError::NoRequirement {
        api_level: vendor_api_level,
    })?;
    if actual < required {
        return Err(LevelError::TooLow {
            api_level: vendor_api_level,
            required,
            actual,
        });
    }
    Ok(())
}

/// How many distinct versioned-RPC packages may still be registered.
///
/// `None` means the census does not apply; `Some(Err(level))` means the level
/// has no known limit.
pub fn hidl_package_limit(vendor_api_level: u64) -> Option<Result<usize, u64>> {
    match vendor_api_level {
        l if l < HIDL_CENSUS_API_LEVEL => None,
        34 => Some(Ok(100)),
        202404 => Some(Ok(4)),
        other => Some(Err(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_target_only_for_old_devices() {
        assert_eq!(check_target_fcm_version(None, 27), Ok(()));
        assert_eq!(
            check_target_fcm_version(None, 28),
            Err(LevelError::MissingTarget { api_level: 28 })
        );
    }

    #[test]
    fn unknown_api_level_fails() {
        assert_eq!(check_target_fcm_version(Some(5), 0), Err(LevelError::UnknownApiLevel));
        assert_eq!(
            check_target_fcm_version(Some(5), 24),
            Err(LevelError::TooOld { api_level: 24 })
        );
        assert_eq!(
            check_target_fcm_version(Some(9), 35),
            Err(LevelError::NoRequirement { api_level: 35 })
        );
    }

    #[test]
    fn target_must_reach_table_minimum() {
        assert_eq!(check_target_fcm_version(Some(5), 30), Ok(()));
        assert_eq!(check_target_fcm_version(Some(6), 30), Ok(()));
        assert_eq!(
            check_target_fcm_version(Some(4), 30),
            Err(LevelError::TooLow {
                api_level: 30,
                required: 5,
                actual: 4
            })
        );
        assert_eq!(check_target_fcm_version(Some(202404), 202404), Ok(()));
    }

    #[test]
    fn census_limits() {
        assert_eq!(hidl_package_limit(33), None);
        assert_eq!(hidl_package_limit(34), Some(Ok(100)));
        assert_eq!(hidl_package_limit(202404), Some(Ok(4)));
        assert_eq!(hidl_package_limit(202504), Some(Err(202504)));
    }
}
