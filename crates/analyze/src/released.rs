//! Served versioned-RPC interfaces must be released: every hash in the
//! served hash chain is non-empty and, for platform interfaces, listed in
//! the released-hash catalog.

use std::time::Duration;

use vintf_core::{is_empty_hash, DeclaredInstance, FqName, HalFormat, Transport};
use vintf_registry::{LookupOutcome, RegistryError};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const CHECK: &str = "released";

/// Passthrough modules are only reachable through their platform base at
/// minor 0; anything else is checked through that base.
fn applies_to(ctx: &VerifyContext, instance: &DeclaredInstance) -> bool {
    match instance.transport {
        Transport::Remote => true,
        Transport::InProcess => {
            ctx.policy.is_platform_interface(&instance.fq_name()) && instance.name.minor() == 0
        }
    }
}

/// Judge one (interface, hash) pair of a served chain.
pub fn judge_hash(ctx: &VerifyContext, subject: &str, fq_name: &FqName, hash: &str) -> Option<Verdict> {
    if is_empty_hash(hash) {
        let message = format!("{} has an empty hash; it was not frozen", fq_name);
        if ctx.legacy_exempt(fq_name) {
            tracing::warn!(%fq_name, "empty hash exempted on legacy board");
            return Some(Verdict::warning(CHECK, subject, VerdictKind::HashUnrecognized, message));
        }
        if !ctx.properties.is_release() {
            tracing::warn!(%fq_name, "empty hash exempted on non-release build");
            return Some(Verdict::warning(CHECK, subject, VerdictKind::HashUnrecognized, message));
        }
        return Some(Verdict::failure(CHECK, subject, VerdictKind::HashUnrecognized, message));
    }
    if ctx.policy.is_platform_interface(fq_name) && !ctx.hashes.is_released(fq_name, hash) {
        return Some(Verdict::failure(
            CHECK,
            subject,
            VerdictKind::HashUnrecognized,
            format!("{} has hash {} which was never released", fq_name, hash),
        ));
    }
    None
}

pub async fn check_released(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let mut verdicts = Vec::new();
    for catalog in ctx.load_catalogs().await? {
        for instance in catalog.of_format(HalFormat::VersionedRpc) {
            if !applies_to(ctx, instance) {
                continue;
            }
            match check_instance(ctx, instance).await {
                Ok(found) => verdicts.extend(found),
                Err(e) => verdicts.push(Verdict::lookup_failed(CHECK, instance.to_string(), &e)),
            }
        }
    }
    Ok(verdicts)
}

async fn check_instance(ctx: &VerifyContext, instance: &DeclaredInstance) -> Result<Vec<Verdict>, RegistryError> {
    let subject = instance.to_string();
    let fq = instance.fq_instance();
    let name = fq.to_string();
    let handle = match ctx
        .lookup
        .handle(&fq.fq_name.to_string(), &fq.instance, instance.transport)
        .await?
    {
        LookupOutcome::Found(handle) => handle,
        LookupOutcome::Missing if ctx.legacy_exempt(&fq.fq_name) => {
            return Ok(vec![Verdict::warning(
                CHECK,
                subject,
                VerdictKind::Missing,
                "not available (exempt on legacy boards)",
            )])
        }
        LookupOutcome::Missing => {
            return Ok(vec![Verdict::failure(CHECK, subject, VerdictKind::Missing, "not available")])
        }
        LookupOutcome::TimedOut(after) => return Ok(timed_out(&subject, after)),
    };
    let chain = match ctx.lookup.interface_chain(&name, handle.as_ref()).await? {
        LookupOutcome::Found(chain) => chain,
        LookupOutcome::Missing => Vec::new(),
        LookupOutcome::TimedOut(after) => return Ok(timed_out(&subject, after)),
    };
    let hashes = match ctx.lookup.hash_chain(&name, handle.as_ref()).await? {
        LookupOutcome::Found(hashes) => hashes,
        LookupOutcome::Missing => Vec::new(),
        LookupOutcome::TimedOut(after) => return Ok(timed_out(&subject, after)),
    };
    if chain.len() != hashes.len() {
        return Ok(vec![Verdict::failure(
            CHECK,
            subject,
            VerdictKind::Structural,
            format!(
                "interface chain has {} entries but hash chain has {}",
                chain.len(),
                hashes.len()
            ),
        )]);
    }

    let mut verdicts = Vec::new();
    for (entry, hash) in chain.iter().zip(&hashes) {
        let fq_name: FqName = match entry.parse() {
            Ok(fq_name) => fq_name,
            Err(e) => {
                verdicts.push(Verdict::failure(
                    CHECK,
                    subject.clone(),
                    VerdictKind::Structural,
                    format!("could not parse interface chain entry: {}", e),
                ));
                return Ok(verdicts);
            }
        };
        verdicts.extend(judge_hash(ctx, &subject, &fq_name, hash));
    }
    if verdicts.is_empty() {
        verdicts.push(Verdict::satisfied(CHECK, subject));
    }
    Ok(verdicts)
}

fn timed_out(subject: &str, after: Duration) -> Vec<Verdict> {
    vec![Verdict::failure(
        CHECK,
        subject,
        VerdictKind::TimedOut,
        format!("no answer within {:?}", after),
    )]
}
