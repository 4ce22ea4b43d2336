//! VINTF reconciliation engine -- declared vs. served HALs with structured output.
//!
//! The engine consumes manifests, matrices and a live registry through the
//! collaborator traits of `vintf-registry`. Each check is a separate module
//! producing [`Verdict`]s. The `verify()` function runs every check against
//! one [`VerifyContext`] and aggregates the verdicts into a
//! [`VerificationReport`].

pub mod aidl;
pub mod catalog;
pub mod context;
pub mod deprecation;
pub mod error;
pub mod levels;
pub mod matcher;
pub mod native;
pub mod passthrough;
pub mod policy;
pub mod released;
pub mod reconcile;
pub mod report;
pub mod required;
pub mod runtime_check;

pub use catalog::{expand, serving_obligations, Catalog, StructuralIssue};
pub use context::VerifyContext;
pub use deprecation::{
    analyze_declared, DeprecatedLevel, DeprecationFinding, DeprecationReport, DeprecationState,
};
pub use error::VerifyError;
pub use matcher::{is_compatible, is_document_pair_compatible, CompatibilityRequirement, HalRequirement};
pub use passthrough::{PassthroughResolver, Resolution};
pub use policy::Policy;
pub use reconcile::reconcile;
pub use report::{ReportSummary, Severity, Verdict, VerdictKind, VerificationReport};
pub use runtime_check::{check_runtime, CheckFlags, RuntimeMismatch};

/// Every check, in the order `verify()` runs them.
pub const CHECK_NAMES: &[&str] = &[
    catalog::CHECK,
    passthrough::CHECK,
    reconcile::SERVED_CHECK,
    reconcile::IN_MANIFEST_CHECK,
    released::CHECK,
    aidl::CHECK,
    native::CHECK,
    required::CHECK,
    matcher::CHECK,
    runtime_check::RUNTIME_CHECK,
    runtime_check::KERNEL_CHECK,
    runtime_check::MAINLINE_CHECK,
    deprecation::MANIFEST_CHECK,
    deprecation::SERVED_CHECK,
    levels::FCM_CHECK,
    levels::VNDK_CHECK,
    levels::CENSUS_CHECK,
];

async fn run_check(ctx: &VerifyContext, name: &str) -> Result<Vec<Verdict>, VerifyError> {
    match name {
        catalog::CHECK => catalog::check_entries(ctx).await,
        passthrough::CHECK => passthrough::check_binderized(ctx).await,
        reconcile::SERVED_CHECK => reconcile::check_served(ctx).await,
        reconcile::IN_MANIFEST_CHECK => reconcile::check_served_in_manifest(ctx).await,
        released::CHECK => released::check_released(ctx).await,
        aidl::CHECK => aidl::check_aidl(ctx).await,
        native::CHECK => native::check_native(ctx).await,
        required::CHECK => required::check_required_hals(ctx).await,
        matcher::CHECK => matcher::check_compatibility(ctx).await,
        runtime_check::RUNTIME_CHECK => runtime_check::check_runtime_info(ctx).await,
        runtime_check::KERNEL_CHECK => runtime_check::check_kernel_info(ctx).await,
        runtime_check::MAINLINE_CHECK => runtime_check::check_mainline(ctx).await,
        deprecation::MANIFEST_CHECK => deprecation::check_deprecation_manifest(ctx).await,
        deprecation::SERVED_CHECK => deprecation::check_deprecation_served(ctx).await,
        levels::FCM_CHECK => levels::check_fcm_version(ctx).await,
        levels::VNDK_CHECK => levels::check_vndk_version(ctx).await,
        levels::CENSUS_CHECK => levels::check_hidl_census(ctx).await,
        other => Err(VerifyError::UnknownCheck(other.to_string())),
    }
}

/// Run every check.
pub async fn verify(ctx: &VerifyContext) -> Result<VerificationReport, VerifyError> {
    verify_selected(ctx, CHECK_NAMES).await
}

/// Run the named checks, in canonical order, each at most once.
///
/// An unknown name fails before anything runs. A check whose collaborator
/// is unavailable records one `Structural` failure and the remaining checks
/// still run.
pub async fn verify_selected(ctx: &VerifyContext, checks: &[&str]) -> Result<VerificationReport, VerifyError> {
    if let Some(unknown) = checks.iter().find(|name| !CHECK_NAMES.contains(*name)) {
        return Err(VerifyError::UnknownCheck(unknown.to_string()));
    }

    let mut report = VerificationReport::new();
    for &name in CHECK_NAMES.iter().filter(|name| checks.contains(*name)) {
        tracing::info!(check = name, "running check");
        let verdicts = match run_check(ctx, name).await {
            Ok(verdicts) => verdicts,
            Err(e) => {
                tracing::error!(check = name, error = %e, "check aborted");
                vec![Verdict::failure(name, name, VerdictKind::Structural, e.to_string())]
            }
        };
        report.record(name, verdicts);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use vintf_registry::DeviceSnapshot;

    fn make_test_context(snapshot: &str) -> VerifyContext {
        let snapshot = DeviceSnapshot::from_json_str(snapshot).unwrap();
        VerifyContext::from_snapshot(snapshot, Policy::default(), Duration::from_millis(1000), None)
    }

    const HEALTHY: &str = r#"{
        "device_manifest": {
            "type": "device", "target_level": 8,
            "hals": [{"name": "android.hardware.foo", "transport": "hwbinder", "versions": ["1.0"],
                      "interfaces": [{"name": "IFoo", "instances": ["default"]}]}]
        },
        "framework_manifest": {"type": "framework", "hals": []},
        "device_matrix": {"type": "device", "hals": []},
        "framework_matrix": {"type": "framework", "hals": [
            {"name": "android.hardware.foo", "versions": ["1.0"],
             "interfaces": [{"name": "IFoo", "instances": ["default"]}]}
        ]},
        "properties": {"ro.vendor.api_level": "33", "ro.board.api_level": "34"},
        "services": [
            {"name": "android.hardware.foo@1.0::IFoo/default", "partition": "vendor",
             "interface_chain": ["android.hardware.foo@1.0::IFoo", "android.hidl.base@1.0::IBase"],
             "hash_chain": ["aa", "bb"]}
        ],
        "hashes": {"versioned": {
            "android.hardware.foo@1.0::IFoo": ["aa"],
            "android.hidl.base@1.0::IBase": ["bb"]
        }}
    }"#;

    #[tokio::test]
    async fn test_selected_checks_run_in_canonical_order() {
        let ctx = make_test_context(HEALTHY);
        let report = verify_selected(&ctx, &["served-in-manifest", "entries", "served"])
            .await
            .unwrap();
        assert_eq!(report.checks_run, vec!["entries", "served", "served-in-manifest"]);
        assert!(!report.has_failures(), "{:#?}", report.verdicts);
    }

    #[tokio::test]
    async fn test_unknown_check_is_rejected() {
        let ctx = make_test_context(HEALTHY);
        let err = verify_selected(&ctx, &["served", "nope"]).await.unwrap_err();
        assert!(matches!(err, VerifyError::UnknownCheck(ref name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_unavailable_collaborator_fails_only_its_check() {
        let ctx = make_test_context(HEALTHY);
        let report = verify_selected(&ctx, &["released", "runtime"]).await.unwrap();
        assert_eq!(report.checks_run, vec!["released", "runtime"]);
        let failures: Vec<&Verdict> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].check, "runtime");
        assert_eq!(failures[0].kind, VerdictKind::Structural);
    }

    #[tokio::test]
    async fn test_full_verify_runs_every_check() {
        let ctx = make_test_context(HEALTHY);
        let report = verify(&ctx).await.unwrap();
        assert_eq!(report.checks_run.len(), CHECK_NAMES.len());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("verdicts").unwrap().is_array());
    }
}
