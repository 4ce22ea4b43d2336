//! Launch-level checks: the device's target FCM level, its vendor NDK
//! version, and the census of versioned-RPC packages still registered.

use std::collections::BTreeSet;

use vintf_core::properties::BOARD_API_LEVEL;
use vintf_core::{
    check_target_fcm_version, hidl_package_limit, DeviceProperties, FCM_LEVEL_V, VNDK_FIRST_API_LEVEL,
    VNDK_LAST_VERSION,
};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const FCM_CHECK: &str = "fcm-version";
pub const VNDK_CHECK: &str = "vndk-version";
pub const CENSUS_CHECK: &str = "hidl-census";

pub async fn check_fcm_version(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let manifest = ctx.manifests.device_manifest().await?;
    let api_level = ctx.properties.board_api_level();
    let subject = format!("target FCM level {:?} at vendor API level {}", manifest.target_level, api_level);
    Ok(vec![match check_target_fcm_version(manifest.target_level, api_level) {
        Ok(()) => Verdict::satisfied(FCM_CHECK, subject),
        Err(e) => Verdict::failure(FCM_CHECK, subject, VerdictKind::Incompatible, e.to_string()),
    }])
}

/// Compare `ro.vndk.version` with the device matrix's vendor NDK version.
pub fn vndk_verdict(properties: &DeviceProperties, matrix_version: Option<&str>) -> Verdict {
    let board_level = properties.board_api_level();
    let subject = format!("VNDK version at board API level {}", board_level);
    if board_level < VNDK_FIRST_API_LEVEL {
        return Verdict::skipped(
            VNDK_CHECK,
            subject,
            format!("not required before board API level {}", VNDK_FIRST_API_LEVEL),
        );
    }
    if properties.get_u64(BOARD_API_LEVEL).unwrap_or(0) >= FCM_LEVEL_V {
        return Verdict::skipped(
            VNDK_CHECK,
            subject,
            format!("not set on boards built at API level {} or later", FCM_LEVEL_V),
        );
    }

    let Some(device_version) = properties.vndk_version() else {
        return Verdict::failure(VNDK_CHECK, subject, VerdictKind::Missing, "ro.vndk.version must not be empty");
    };
    // Codenames count as 0.
    let number = device_version.parse::<u64>().unwrap_or(0);
    if number == VNDK_LAST_VERSION {
        return Verdict::skipped(VNDK_CHECK, subject, format!("VNDK version {} is not compared", VNDK_LAST_VERSION));
    }
    if number > VNDK_LAST_VERSION {
        return Verdict::failure(
            VNDK_CHECK,
            subject,
            VerdictKind::VersionMismatch,
            format!("ro.vndk.version must be less than {}, got {}", VNDK_LAST_VERSION, device_version),
        );
    }

    match matrix_version.map(str::trim).filter(|v| !v.is_empty()) {
        None => Verdict::failure(
            VNDK_CHECK,
            subject,
            VerdictKind::Missing,
            "device compatibility matrix does not declare a vendor NDK version",
        ),
        Some(declared) if declared == device_version => Verdict::satisfied(VNDK_CHECK, subject),
        Some(declared) => Verdict::failure(
            VNDK_CHECK,
            subject,
            VerdictKind::VersionMismatch,
            format!(
                "ro.vndk.version={} but the device compatibility matrix requires {}",
                device_version, declared
            ),
        ),
    }
}

pub async fn check_vndk_version(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let matrix = ctx.matrices.device_matrix().await?;
    Ok(vec![vndk_verdict(&ctx.properties, matrix.vendor_ndk_version.as_deref())])
}

/// Distinct packages among `package@major.minor::Interface/instance` names.
pub fn distinct_packages(names: &[String]) -> BTreeSet<&str> {
    names
        .iter()
        .map(|name| name.split_once('@').map_or(name.as_str(), |(package, _)| package))
        .collect()
}

pub async fn check_hidl_census(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let level = ctx.properties.vendor_api_level();
    let subject = format!("vendor API level {}", level);
    let max = match hidl_package_limit(level) {
        None => return Ok(vec![Verdict::skipped(CENSUS_CHECK, subject, "not applicable to this device")]),
        Some(Err(level)) => {
            return Ok(vec![Verdict::failure(
                CENSUS_CHECK,
                subject,
                VerdictKind::Incompatible,
                format!("unexpected vendor API level {}; must be 34 or 202404", level),
            )])
        }
        Some(Ok(max)) => max,
    };
    let live = ctx.registry().list_all().await?;
    let packages = distinct_packages(&live);
    if packages.len() <= max {
        return Ok(vec![Verdict::satisfied(CENSUS_CHECK, subject)]);
    }
    let mut verdicts = vec![Verdict::failure(
        CENSUS_CHECK,
        subject,
        VerdictKind::Incompatible,
        format!(
            "{} versioned-RPC packages are served (at most {} allowed); they must be converted to flat RPC",
            packages.len(),
            max
        ),
    )];
    verdicts.extend(packages.into_iter().map(|package| {
        Verdict::failure(
            CENSUS_CHECK,
            package,
            VerdictKind::Incompatible,
            "registered as a versioned-RPC HAL but must be flat RPC",
        )
    }));
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vintf_core::properties::{BOARD_FIRST_API_LEVEL, VNDK_VERSION};

    fn board(level: &str, vndk: &str) -> DeviceProperties {
        DeviceProperties::new()
            .with(BOARD_API_LEVEL, level)
            .with(VNDK_VERSION, vndk)
    }

    #[test]
    fn vndk_matches_matrix() {
        let verdict = vndk_verdict(&board("33", "33"), Some("33"));
        assert_eq!(verdict.kind, VerdictKind::Satisfied);
        let verdict = vndk_verdict(&board("33", "33"), Some("32"));
        assert_eq!(verdict.kind, VerdictKind::VersionMismatch);
    }

    #[test]
    fn vndk_missing_on_either_side_fails() {
        let verdict = vndk_verdict(&board("33", ""), Some("33"));
        assert_eq!(verdict.kind, VerdictKind::Missing);
        let verdict = vndk_verdict(&board("33", "33"), None);
        assert_eq!(verdict.kind, VerdictKind::Missing);
        let verdict = vndk_verdict(&board("33", "33"), Some(" "));
        assert_eq!(verdict.kind, VerdictKind::Missing);
    }

    #[test]
    fn vndk_skips_old_and_new_boards() {
        let old = DeviceProperties::new().with(BOARD_FIRST_API_LEVEL, "27");
        assert_eq!(vndk_verdict(&old, None).kind, VerdictKind::Skipped);
        assert_eq!(vndk_verdict(&board("202404", ""), None).kind, VerdictKind::Skipped);
    }

    #[test]
    fn vndk_version_ceiling() {
        assert_eq!(vndk_verdict(&board("34", "35"), None).kind, VerdictKind::Skipped);
        let verdict = vndk_verdict(&board("34", "36"), Some("36"));
        assert_eq!(verdict.kind, VerdictKind::VersionMismatch);
        // Codenames compare as text.
        let verdict = vndk_verdict(&board("30", "R"), Some("R"));
        assert_eq!(verdict.kind, VerdictKind::Satisfied);
    }

    #[test]
    fn packages_are_counted_once() {
        let names: Vec<String> = [
            "android.hardware.foo@1.0::IFoo/default",
            "android.hardware.foo@1.1::IFoo/default",
            "android.hardware.bar@1.0::IBar/default",
            "android.hidl.base@1.0::IBase/default",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let packages = distinct_packages(&names);
        assert_eq!(packages.len(), 3);
        assert!(packages.contains("android.hardware.foo"));
    }
}
