//! Served/declared reconciler.
//!
//! Two directions: every declared versioned-RPC instance must be served
//! (`served`), and every served name must be declared (`served-in-manifest`).
//! Declared names are expanded first, since a declaration at `x.N` answers
//! to `x.0` through `x.N`.

use std::collections::BTreeSet;

use vintf_core::{
    is_platform_package, DeclaredInstance, FqInstance, FqName, HalFormat, Partition, Transport,
};
use vintf_registry::{LookupOutcome, RegistryError};

use crate::catalog::Catalog;
use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::passthrough::{PassthroughResolver, Resolution};
use crate::report::{Verdict, VerdictKind};

pub const SERVED_CHECK: &str = "served";
pub const IN_MANIFEST_CHECK: &str = "served-in-manifest";

/// Served ⇒ declared over one expanded name set.
///
/// Every live name other than the base interface must be in
/// `declared_expanded`. Unparsable live names are structural failures.
pub fn reconcile(declared_expanded: &BTreeSet<String>, live_names: &[String]) -> Vec<Verdict> {
    let mut verdicts = Vec::new();
    for name in live_names {
        match name.parse::<FqInstance>() {
            Ok(fq) if fq.fq_name.is_base_interface() => continue,
            Ok(_) => {}
            Err(e) => {
                verdicts.push(Verdict::failure(
                    IN_MANIFEST_CHECK,
                    name.clone(),
                    VerdictKind::Structural,
                    e.to_string(),
                ));
                continue;
            }
        }
        if declared_expanded.contains(name) {
            verdicts.push(Verdict::satisfied(IN_MANIFEST_CHECK, name.clone()));
        } else {
            verdicts.push(Verdict::failure(
                IN_MANIFEST_CHECK,
                name.clone(),
                VerdictKind::MissingFromManifest,
                "served but not declared in either manifest",
            ));
        }
    }
    verdicts
}

/// Only a determinable partition can mismatch.
pub fn partition_mismatch(expected: Partition, observed: Partition) -> bool {
    observed != Partition::Unknown && observed != expected
}

// ──────────────────────────────────────────────
// Check: declared ⇒ served
// ──────────────────────────────────────────────

pub async fn check_served(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let resolver = PassthroughResolver::new(&ctx.lookup);
    let mut verdicts = Vec::new();
    for catalog in ctx.load_catalogs().await? {
        let declared: Vec<DeclaredInstance> = catalog.of_format(HalFormat::VersionedRpc).cloned().collect();
        let expected = catalog.schema_type.expected_partition();
        for instance in &declared {
            let verdict = match instance.transport {
                Transport::Remote => served_remote(ctx, instance, expected).await,
                Transport::InProcess => served_in_process(&resolver, instance, &declared).await,
            };
            verdicts.push(
                verdict.unwrap_or_else(|e| Verdict::lookup_failed(SERVED_CHECK, instance.to_string(), &e)),
            );
        }
    }
    Ok(verdicts)
}

async fn served_remote(
    ctx: &VerifyContext,
    instance: &DeclaredInstance,
    expected: Partition,
) -> Result<Verdict, RegistryError> {
    let subject = instance.to_string();
    let fq_name = instance.fq_name();
    let handle = match ctx
        .lookup
        .handle(&fq_name.to_string(), &instance.instance, Transport::Remote)
        .await?
    {
        LookupOutcome::Found(handle) => handle,
        LookupOutcome::Missing if ctx.legacy_exempt(&fq_name) => {
            tracing::info!(%fq_name, "legacy board, non-platform HAL not served");
            return Ok(Verdict::warning(
                SERVED_CHECK,
                subject,
                VerdictKind::Missing,
                "declared but not served (exempt on legacy boards)",
            ));
        }
        LookupOutcome::Missing => {
            return Ok(Verdict::failure(
                SERVED_CHECK,
                subject,
                VerdictKind::Missing,
                "declared but not served",
            ))
        }
        LookupOutcome::TimedOut(after) => {
            return Ok(Verdict::failure(
                SERVED_CHECK,
                subject,
                VerdictKind::TimedOut,
                format!("no answer within {:?}", after),
            ))
        }
    };
    if !handle.is_remote() {
        return Ok(Verdict::failure(
            SERVED_CHECK,
            subject,
            VerdictKind::TransportMismatch,
            "declared as hwbinder but the registry returned an in-process object",
        ));
    }
    let observed = ctx.registry().owning_partition(handle.as_ref()).await;
    if partition_mismatch(expected, observed) {
        return Ok(Verdict::failure(
            SERVED_CHECK,
            subject,
            VerdictKind::PartitionMismatch,
            format!("served from the {} partition, expected {}", observed, expected),
        ));
    }
    Ok(Verdict::satisfied(SERVED_CHECK, subject))
}

async fn served_in_process(
    resolver: &PassthroughResolver<'_>,
    instance: &DeclaredInstance,
    declared: &[DeclaredInstance],
) -> Result<Verdict, RegistryError> {
    let subject = instance.to_string();
    if !is_platform_package(instance.package()) {
        return Ok(Verdict::skipped(
            SERVED_CHECK,
            subject,
            "in-process modules outside the platform are not checked",
        ));
    }
    let verdict = match resolver.resolve(&instance.fq_instance(), declared).await? {
        Resolution::Found {
            loaded_as,
            via_extension,
            ..
        } => {
            if via_extension {
                tracing::debug!(%loaded_as, requested = %instance.fq_instance(), "served by an extension module");
            }
            Verdict::satisfied(SERVED_CHECK, subject)
        }
        Resolution::NotFound => Verdict::failure(
            SERVED_CHECK,
            subject,
            VerdictKind::MissingFromRegistry,
            "no in-process module answers at this or any lower minor version",
        ),
        Resolution::TimedOut(after) => Verdict::failure(
            SERVED_CHECK,
            subject,
            VerdictKind::TimedOut,
            format!("no answer within {:?}", after),
        ),
    };
    Ok(verdict)
}

// ──────────────────────────────────────────────
// Check: served ⇒ declared
// ──────────────────────────────────────────────

pub async fn check_served_in_manifest(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let catalogs = ctx.load_catalogs().await?;
    let live = ctx.registry().list_all().await?;
    tracing::debug!(count = live.len(), "registry listed served instances");

    let union: BTreeSet<String> = catalogs
        .iter()
        .flat_map(|c| c.obligations(Transport::Remote))
        .collect();
    let mut verdicts = reconcile(&union, &live);
    let failed: BTreeSet<String> = verdicts
        .iter()
        .filter(|v| v.is_failure())
        .map(|v| v.subject.clone())
        .collect();

    for catalog in &catalogs {
        verdicts.extend(partition_scoped(ctx, catalog, &live, &failed).await);
        verdicts.extend(in_process_in_manifest(ctx, catalog).await);
    }
    Ok(verdicts)
}

/// Names served from this manifest's partition must be in this manifest.
async fn partition_scoped(
    ctx: &VerifyContext,
    catalog: &Catalog,
    live: &[String],
    already_failed: &BTreeSet<String>,
) -> Vec<Verdict> {
    let expected = catalog.schema_type.expected_partition();
    let declared = catalog.obligations(Transport::Remote);
    let mut verdicts = Vec::new();
    for name in live {
        if already_failed.contains(name) {
            continue;
        }
        let Ok(fq) = name.parse::<FqInstance>() else {
            continue;
        };
        if fq.fq_name.is_base_interface() {
            continue;
        }
        let handle = match ctx
            .lookup
            .handle(&fq.fq_name.to_string(), &fq.instance, Transport::Remote)
            .await
        {
            Ok(LookupOutcome::Found(handle)) => handle,
            Ok(LookupOutcome::Missing) => continue,
            Err(e) => {
                verdicts.push(Verdict::lookup_failed(IN_MANIFEST_CHECK, name.clone(), &e));
                continue;
            }
            Ok(LookupOutcome::TimedOut(after)) => {
                verdicts.push(Verdict::failure(
                    IN_MANIFEST_CHECK,
                    name.clone(),
                    VerdictKind::TimedOut,
                    format!("no answer within {:?}", after),
                ));
                continue;
            }
        };
        let observed = ctx.registry().owning_partition(handle.as_ref()).await;
        if observed != expected {
            // Unknown or the other side: inconclusive for this manifest.
            continue;
        }
        if !declared.contains(name) {
            verdicts.push(Verdict::failure(
                IN_MANIFEST_CHECK,
                name.clone(),
                VerdictKind::MissingFromManifest,
                format!("served from {} but not declared in the {} manifest", observed, catalog.schema_type),
            ));
        }
    }
    verdicts
}

/// Every interface a declared platform in-process module implements must be
/// declared in-process in the same manifest.
async fn in_process_in_manifest(ctx: &VerifyContext, catalog: &Catalog) -> Vec<Verdict> {
    let declared = catalog.obligations(Transport::InProcess);
    let mut seen = BTreeSet::new();
    let mut verdicts = Vec::new();
    for instance in catalog.versioned(Transport::InProcess) {
        if !is_platform_package(instance.package()) {
            continue;
        }
        let base = instance.fq_instance().with_minor(0);
        if !seen.insert(base.clone()) {
            continue;
        }
        let base_name = base.fq_name.to_string();
        let handle = match ctx.lookup.handle(&base_name, &base.instance, Transport::InProcess).await {
            Ok(LookupOutcome::Found(handle)) => handle,
            Err(e) => {
                verdicts.push(Verdict::lookup_failed(IN_MANIFEST_CHECK, base.to_string(), &e));
                continue;
            }
            Ok(LookupOutcome::Missing) => {
                tracing::debug!(module = %base, "in-process module not loadable; reported by the served check");
                continue;
            }
            Ok(LookupOutcome::TimedOut(after)) => {
                verdicts.push(Verdict::failure(
                    IN_MANIFEST_CHECK,
                    base.to_string(),
                    VerdictKind::TimedOut,
                    format!("no answer within {:?}", after),
                ));
                continue;
            }
        };
        let chain = match ctx.lookup.interface_chain(&base.to_string(), handle.as_ref()).await {
            Ok(LookupOutcome::Found(chain)) => chain,
            Ok(LookupOutcome::Missing) => continue,
            Err(e) => {
                verdicts.push(Verdict::lookup_failed(IN_MANIFEST_CHECK, base.to_string(), &e));
                continue;
            }
            Ok(LookupOutcome::TimedOut(after)) => {
                verdicts.push(Verdict::failure(
                    IN_MANIFEST_CHECK,
                    base.to_string(),
                    VerdictKind::TimedOut,
                    format!("no answer within {:?}", after),
                ));
                continue;
            }
        };
        for entry in &chain {
            let fq_name: FqName = match entry.parse() {
                Ok(fq_name) => fq_name,
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "unparsable interface chain entry");
                    continue;
                }
            };
            if fq_name.is_base_interface() {
                continue;
            }
            let name = fq_name.instance(base.instance.clone()).to_string();
            if declared.contains(&name) {
                verdicts.push(Verdict::satisfied(IN_MANIFEST_CHECK, name));
            } else {
                verdicts.push(Verdict::failure(
                    IN_MANIFEST_CHECK,
                    name,
                    VerdictKind::MissingFromManifest,
                    format!(
                        "implemented by in-process module {} but not declared as passthrough in the {} manifest",
                        base, catalog.schema_type
                    ),
                ));
            }
        }
    }
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn declared_and_served_match() {
        let declared: BTreeSet<String> = names(&["android.hardware.foo@1.0::IFoo/default"]).into_iter().collect();
        let verdicts = reconcile(&declared, &names(&["android.hardware.foo@1.0::IFoo/default"]));
        assert_eq!(verdicts.len(), 1);
        assert!(!verdicts[0].is_failure());
    }

    #[test]
    fn undeclared_name_is_missing_from_manifest() {
        let declared: BTreeSet<String> = names(&["android.hardware.foo@1.0::IFoo/default"]).into_iter().collect();
        let verdicts = reconcile(
            &declared,
            &names(&[
                "android.hardware.foo@1.0::IFoo/default",
                "android.hardware.bar@1.0::IBar/default",
                "android.hidl.base@1.0::IBase/default",
            ]),
        );
        let failures: Vec<&Verdict> = verdicts.iter().filter(|v| v.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, VerdictKind::MissingFromManifest);
        assert_eq!(failures[0].subject, "android.hardware.bar@1.0::IBar/default");
        assert!(verdicts.iter().all(|v| !v.subject.contains("IBase")));
    }

    #[test]
    fn malformed_live_name_is_structural() {
        let verdicts = reconcile(&BTreeSet::new(), &names(&["garbage"]));
        assert_eq!(verdicts[0].kind, VerdictKind::Structural);
    }

    #[test]
    fn unknown_partition_never_mismatches() {
        for expected in [Partition::System, Partition::Vendor] {
            assert!(!partition_mismatch(expected, Partition::Unknown));
        }
        assert!(partition_mismatch(Partition::Vendor, Partition::System));
        assert!(!partition_mismatch(Partition::Vendor, Partition::Vendor));
    }
}
