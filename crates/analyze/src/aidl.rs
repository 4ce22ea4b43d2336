//! Flat-RPC (AIDL) instances: served, at the declared version, with a
//! recognized interface hash.

use vintf_core::{
    flat_instance_name, is_empty_hash, is_platform_package, DeclaredInstance, HalFormat, Transport,
    DEFAULT_FLAT_RPC_VERSION, NOT_FROZEN_HASH,
};
use vintf_registry::{LookupOutcome, RegistryError};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Severity, Verdict, VerdictKind};

pub const CHECK: &str = "aidl";

/// Outcome of comparing a reported version with the declared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    Matches,
    Upgraded,
    /// Mismatch tolerated because the device targets an old FCM level.
    Exempt,
    Mismatch(String),
}

impl VersionCheck {
    /// Whether the declared version can be trusted for the hash check.
    pub fn is_reliable(&self) -> bool {
        !matches!(self, VersionCheck::Mismatch(_))
    }
}

/// Compare `actual` against `declared`.
///
/// `target_level` is the device manifest's target FCM level; `None` is
/// never exempt.
pub fn check_version(
    declared: u64,
    actual: u64,
    allow_upgrade: bool,
    target_level: Option<u64>,
    legacy_level: u64,
) -> VersionCheck {
    if actual < 1 {
        return VersionCheck::Mismatch(format!("version should be >= 1 but it is {}", actual));
    }
    if actual == declared {
        return VersionCheck::Matches;
    }
    if allow_upgrade && actual > declared {
        return VersionCheck::Upgraded;
    }
    if target_level.is_some_and(|level| level <= legacy_level) {
        return VersionCheck::Exempt;
    }
    VersionCheck::Mismatch(format!(
        "manifest declares version {}, but the actual version is {}",
        declared, actual
    ))
}

/// Judge a served interface hash.
///
/// Returns the severity and message of a problem, or `None` when the hash is fine.
pub fn judge_hash(
    ctx: &VerifyContext,
    instance: &DeclaredInstance,
    hash: &str,
    reliable_version: bool,
) -> Option<(Severity, String)> {
    let type_name = format!("{}.{}", instance.package(), instance.interface);
    let is_release = ctx.properties.is_release();
    if is_platform_package(instance.package()) {
        let Some(metadata) = ctx.hashes.flat_metadata(&type_name) else {
            return Some((Severity::Failure, format!("platform interface {} must have metadata", type_name)));
        };
        if metadata.has_hash(hash) {
            return None;
        }
        let message = format!(
            "{} has an unrecognized hash '{}'; known hashes: [{}]",
            type_name,
            hash,
            metadata.hashes.join(", ")
        );
        let existing = metadata.has_version(instance.flat_version());
        if is_release || (reliable_version && existing) {
            Some((Severity::Failure, message))
        } else {
            tracing::info!(%type_name, hash, "unfrozen hash on a non-release build");
            Some((Severity::Info, message))
        }
    } else if hash.is_empty() || is_empty_hash(hash) || hash == NOT_FROZEN_HASH {
        let message = format!("{} is used but not frozen", type_name);
        if is_release {
            Some((Severity::Failure, message))
        } else {
            Some((Severity::Info, message))
        }
    } else {
        None
    }
}

pub async fn check_aidl(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let catalogs = ctx.load_catalogs().await?;
    let target_level = catalogs.first().and_then(|device| device.target_level);
    let mut verdicts = Vec::new();
    for catalog in &catalogs {
        for instance in catalog.of_format(HalFormat::FlatRpc) {
            match check_instance(ctx, instance, target_level).await {
                Ok(found) => verdicts.extend(found),
                Err(e) => verdicts.push(Verdict::lookup_failed(CHECK, instance.to_string(), &e)),
            }
        }
    }
    Ok(verdicts)
}

async fn check_instance(
    ctx: &VerifyContext,
    instance: &DeclaredInstance,
    target_level: Option<u64>,
) -> Result<Vec<Verdict>, RegistryError> {
    let subject = instance.to_string();
    let type_name = format!("{}.{}", instance.package(), instance.interface);
    let name = flat_instance_name(instance.package(), &instance.interface, &instance.instance);
    let timed_out = |after: std::time::Duration| {
        Verdict::failure(
            CHECK,
            instance.to_string(),
            VerdictKind::TimedOut,
            format!("no answer within {:?}", after),
        )
    };

    let handle = match ctx.lookup.handle(&type_name, &instance.instance, Transport::Remote).await? {
        LookupOutcome::Found(handle) => handle,
        LookupOutcome::Missing => {
            return Ok(vec![Verdict::failure(
                CHECK,
                subject,
                VerdictKind::Missing,
                format!("failed to get {}", name),
            )])
        }
        LookupOutcome::TimedOut(after) => return Ok(vec![timed_out(after)]),
    };

    let mut verdicts = Vec::new();
    let actual = match ctx.lookup.reported_version(&name, handle.as_ref()).await? {
        LookupOutcome::Found(version) => version.unwrap_or(DEFAULT_FLAT_RPC_VERSION),
        LookupOutcome::Missing => DEFAULT_FLAT_RPC_VERSION,
        LookupOutcome::TimedOut(after) => return Ok(vec![timed_out(after)]),
    };
    let allow_upgrade = instance
        .updatable_unit
        .as_deref()
        .is_some_and(|apex| ctx.is_apex_updated(apex));
    let version = check_version(
        instance.flat_version(),
        actual,
        allow_upgrade,
        target_level,
        ctx.policy.legacy_aidl_fcm_level,
    );
    match &version {
        VersionCheck::Matches => {}
        VersionCheck::Upgraded => {
            tracing::info!(%name, actual, declared = instance.flat_version(), "upgraded version allowed");
        }
        VersionCheck::Exempt => {
            verdicts.push(Verdict::new(
                CHECK,
                subject.clone(),
                VerdictKind::VersionMismatch,
                Severity::Warning,
                format!(
                    "manifest declares version {}, but the actual version is {}; exempt for target FCM level {:?}",
                    instance.flat_version(),
                    actual,
                    target_level
                ),
            ));
        }
        VersionCheck::Mismatch(message) => {
            verdicts.push(Verdict::failure(
                CHECK,
                subject.clone(),
                VerdictKind::VersionMismatch,
                message.clone(),
            ));
        }
    }

    let hash = match ctx.lookup.hash_chain(&name, handle.as_ref()).await {
        Ok(LookupOutcome::Found(hashes)) => hashes.into_iter().next().unwrap_or_default(),
        Ok(LookupOutcome::Missing) => String::new(),
        Ok(LookupOutcome::TimedOut(after)) => {
            verdicts.push(timed_out(after));
            return Ok(verdicts);
        }
        Err(e) => {
            verdicts.push(Verdict::lookup_failed(CHECK, subject, &e));
            return Ok(verdicts);
        }
    };
    if let Some((severity, message)) = judge_hash(ctx, instance, &hash, version.is_reliable()) {
        verdicts.push(Verdict::new(CHECK, subject.clone(), VerdictKind::HashUnrecognized, severity, message));
    }

    if verdicts.is_empty() {
        verdicts.push(Verdict::satisfied(CHECK, subject));
    }
    Ok(verdicts)
}
