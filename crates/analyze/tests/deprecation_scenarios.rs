//! Integration tests for deprecation analysis in both modes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use vintf_analyze::{verify_selected, Policy, VerdictKind, VerificationReport, VerifyContext};
use vintf_registry::{BoundedLookup, DeviceSnapshot, InMemoryRegistry, LookupConfig, StaticHandle};

const IBASE: &str = "android.hidl.base@1.0::IBase";

fn context(snapshot: Value, registry: InMemoryRegistry) -> VerifyContext {
    let _ = tracing_subscriber::fmt::try_init();
    let snapshot: DeviceSnapshot = serde_json::from_value(snapshot).expect("valid snapshot");
    let mut ctx = VerifyContext::from_snapshot(snapshot, Policy::default(), Duration::from_millis(1000), Some(1));
    ctx.lookup = BoundedLookup::new(Arc::new(registry), LookupConfig::default());
    ctx
}

/// `pkg@1.0` deprecated by the framework matrix; the device declares `versions`.
fn snapshot(versions: &[&str], deprecated: &[&str]) -> Value {
    json!({
        "device_manifest": {"type": "device", "hals": [{
            "name": "pkg", "transport": "hwbinder", "versions": versions,
            "interfaces": [{"name": "IFoo", "instances": ["default"]}]
        }]},
        "framework_manifest": {"type": "framework", "hals": []},
        "device_matrix": {"type": "device", "hals": []},
        "framework_matrix": {"type": "framework", "hals": [{
            "name": "pkg", "versions": ["1.0-2"], "deprecated": deprecated,
            "interfaces": [{"name": "IFoo", "instances": ["default"]}]
        }]}
    })
}

async fn run(ctx: &VerifyContext, check: &str) -> VerificationReport {
    verify_selected(ctx, &[check]).await.expect("known check")
}

fn unsuperseded(report: &VerificationReport) -> usize {
    report.of_kind(VerdictKind::DeprecatedWithoutSuperseder).count()
}

// ──────────────────────────────────────────────
// Declaration mode
// ──────────────────────────────────────────────

#[tokio::test]
async fn declared_higher_minor_supersedes() {
    let ctx = context(snapshot(&["1.2"], &["1.0"]), InMemoryRegistry::new());
    let report = run(&ctx, "deprecation-manifest").await;
    assert_eq!(unsuperseded(&report), 0);
    assert_eq!(report.of_kind(VerdictKind::Satisfied).count(), 1);
}

#[tokio::test]
async fn declared_deprecated_level_only_fails() {
    let ctx = context(snapshot(&["1.0"], &["1.0"]), InMemoryRegistry::new());
    let report = run(&ctx, "deprecation-manifest").await;
    assert_eq!(unsuperseded(&report), 1);
    assert!(report.has_failures());
}

#[tokio::test]
async fn superseder_must_not_be_deprecated_itself() {
    let ctx = context(snapshot(&["1.1"], &["1.0", "1.1"]), InMemoryRegistry::new());
    let report = run(&ctx, "deprecation-manifest").await;
    // Both 1.0 and 1.1 are in use on the 1.x line and neither is superseded.
    assert_eq!(unsuperseded(&report), 2);
}

#[tokio::test]
async fn unused_deprecated_level_is_skipped() {
    let ctx = context(snapshot(&["2.0"], &["1.0"]), InMemoryRegistry::new());
    let report = run(&ctx, "deprecation-manifest").await;
    assert!(!report.has_failures());
    assert_eq!(report.of_kind(VerdictKind::Skipped).count(), 1);
}

#[tokio::test]
async fn malformed_deprecated_version_is_structural() {
    let ctx = context(snapshot(&["1.0"], &["one"]), InMemoryRegistry::new());
    let report = run(&ctx, "deprecation-manifest").await;
    assert_eq!(report.of_kind(VerdictKind::Structural).count(), 1);
}

// ──────────────────────────────────────────────
// Serving mode
// ──────────────────────────────────────────────

fn served_as(chain: &[&str]) -> InMemoryRegistry {
    InMemoryRegistry::new().with_service(
        StaticHandle::remote("pkg@1.0::IFoo/default").with_chain(chain.iter().copied()),
    )
}

#[tokio::test]
async fn served_chain_with_higher_minor_supersedes() {
    let ctx = context(snapshot(&["1.2"], &["1.0"]), served_as(&["pkg@1.2::IFoo", IBASE]));
    let report = run(&ctx, "deprecation-served").await;
    assert_eq!(unsuperseded(&report), 0);
    assert!(!report.has_failures(), "{:#?}", report.verdicts);
}

#[tokio::test]
async fn served_chain_at_deprecated_level_fails() {
    let ctx = context(snapshot(&["1.0"], &["1.0"]), served_as(&["pkg@1.0::IFoo", IBASE]));
    let report = run(&ctx, "deprecation-served").await;
    assert_eq!(unsuperseded(&report), 1);
}

#[tokio::test]
async fn unparsable_chain_entry_is_skipped() {
    let ctx = context(
        snapshot(&["1.2"], &["1.0"]),
        served_as(&["not a versioned name", "pkg@1.2::IFoo", IBASE]),
    );
    let report = run(&ctx, "deprecation-served").await;
    assert_eq!(unsuperseded(&report), 0);

    let ctx = context(snapshot(&["1.0"], &["1.0"]), served_as(&["garbage", IBASE]));
    let report = run(&ctx, "deprecation-served").await;
    assert_eq!(unsuperseded(&report), 1);
}

#[tokio::test]
async fn nothing_served_is_not_evaluated() {
    let ctx = context(snapshot(&["1.0"], &["1.0"]), InMemoryRegistry::new());
    let report = run(&ctx, "deprecation-served").await;
    assert!(!report.has_failures());
    assert_eq!(report.of_kind(VerdictKind::Skipped).count(), 1);
}

#[tokio::test]
async fn every_unsuperseded_instance_is_reported() {
    let mut snap = snapshot(&["1.0"], &["1.0"]);
    snap["framework_matrix"]["hals"][0]["interfaces"][0]["instances"] = json!(["default", "slot1"]);
    let registry = served_as(&["pkg@1.0::IFoo", IBASE]).with_service(
        StaticHandle::remote("pkg@1.0::IFoo/slot1").with_chain(["pkg@1.0::IFoo", IBASE]),
    );
    let ctx = context(snap, registry);
    let report = run(&ctx, "deprecation-served").await;
    let failures: Vec<String> = report
        .of_kind(VerdictKind::DeprecatedWithoutSuperseder)
        .map(|v| v.subject.clone())
        .collect();
    assert_eq!(failures, vec!["pkg@1.0::IFoo/default", "pkg@1.0::IFoo/slot1"]);
}

#[tokio::test(start_paused = true)]
async fn slow_service_is_a_timeout_not_a_verdict_on_deprecation() {
    let registry = InMemoryRegistry::new().with_service(
        StaticHandle::remote("pkg@1.0::IFoo/default")
            .with_chain(["pkg@1.0::IFoo", IBASE])
            .with_delay(Duration::from_secs(10)),
    );
    let ctx = context(snapshot(&["1.0"], &["1.0"]), registry);
    let report = run(&ctx, "deprecation-served").await;
    assert_eq!(report.of_kind(VerdictKind::TimedOut).count(), 1);
    assert_eq!(unsuperseded(&report), 0);
}
