//! Passthrough resolver and the binderization policy.
//!
//! In-process modules are keyed by the lowest minor version they were built
//! against, so a request for `x.3` may be answered by a module registered at
//! any of `x.3` down to `x.0`. The resolver walks every rung.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use vintf_core::{DeclaredInstance, FqInstance, FqName, HalFormat, Transport};
use vintf_registry::{BoundedLookup, HalHandle, LookupOutcome, RegistryError};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::policy::Policy;
use crate::report::{Verdict, VerdictKind};

pub const CHECK: &str = "binderized";

#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        handle: Arc<dyn HalHandle>,
        /// The name the module was actually loaded under.
        loaded_as: FqInstance,
        via_extension: bool,
    },
    NotFound,
    TimedOut(Duration),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

pub struct PassthroughResolver<'a> {
    lookup: &'a BoundedLookup,
}

impl<'a> PassthroughResolver<'a> {
    pub fn new(lookup: &'a BoundedLookup) -> Self {
        PassthroughResolver { lookup }
    }

    /// Walk minor versions from the requested one down to 0.
    ///
    /// With `expect_chain_valid`, the first module found must list the
    /// requested interface in its chain, otherwise resolution fails.
    pub async fn resolve_exact(
        &self,
        requested: &FqInstance,
        expect_chain_valid: bool,
    ) -> Result<Resolution, RegistryError> {
        let mut timed_out = None;
        for rung in requested.fq_name.name.lower_minors_inclusive() {
            let candidate = FqName::new(rung, requested.interface());
            tracing::debug!(requested = %requested, rung = %candidate, "trying in-process module");
            let handle = match self
                .lookup
                .handle(&candidate.to_string(), &requested.instance, Transport::InProcess)
                .await?
            {
                LookupOutcome::Found(handle) => handle,
                LookupOutcome::Missing => continue,
                LookupOutcome::TimedOut(after) => {
                    timed_out = Some(after);
                    continue;
                }
            };
            let loaded_as = candidate.instance(requested.instance.clone());
            if expect_chain_valid {
                let chain = match self
                    .lookup
                    .interface_chain(&loaded_as.to_string(), handle.as_ref())
                    .await?
                {
                    LookupOutcome::Found(chain) => chain,
                    LookupOutcome::Missing => Vec::new(),
                    LookupOutcome::TimedOut(after) => return Ok(Resolution::TimedOut(after)),
                };
                let wanted = requested.fq_name.to_string();
                if !chain.iter().any(|entry| *entry == wanted) {
                    tracing::warn!(
                        loaded = %loaded_as,
                        requested = %requested,
                        "module's interface chain does not contain the requested interface"
                    );
                    return Ok(Resolution::NotFound);
                }
            }
            tracing::debug!(loaded = %loaded_as, requested = %requested, "resolved in-process module");
            return Ok(Resolution::Found {
                handle,
                loaded_as,
                via_extension: false,
            });
        }
        Ok(match timed_out {
            Some(after) => Resolution::TimedOut(after),
            None => Resolution::NotFound,
        })
    }

    /// Exact resolution, then a scan of the other declared in-process
    /// instances with the same instance name whose chain contains the
    /// requested interface (vendor extensions).
    pub async fn resolve(
        &self,
        requested: &FqInstance,
        declared: &[DeclaredInstance],
    ) -> Result<Resolution, RegistryError> {
        match self.resolve_exact(requested, true).await? {
            Resolution::NotFound => {}
            other => return Ok(other),
        }
        tracing::debug!(requested = %requested, "searching declared in-process modules for an extension");
        for other in declared {
            if other.transport != Transport::InProcess
                || other.format != HalFormat::VersionedRpc
                || other.instance != requested.instance
            {
                continue;
            }
            let other_fq = other.fq_instance();
            if other_fq == *requested {
                continue;
            }
            let (handle, loaded_as) = match self.resolve_exact(&other_fq, false).await {
                Ok(Resolution::Found {
                    handle, loaded_as, ..
                }) => (handle, loaded_as),
                Ok(Resolution::NotFound | Resolution::TimedOut(_)) => continue,
                Err(e) => {
                    tracing::debug!(module = %other_fq, error = %e, "cannot load candidate extension, skipping");
                    continue;
                }
            };
            let chain = match self
                .lookup
                .interface_chain(&loaded_as.to_string(), handle.as_ref())
                .await
            {
                Ok(LookupOutcome::Found(chain)) => chain,
                Ok(_) | Err(_) => {
                    tracing::debug!(module = %loaded_as, "cannot read interface chain, skipping");
                    continue;
                }
            };
            let matches = chain.iter().any(|entry| {
                format!("{}/{}", entry, other_fq.instance)
                    .parse::<FqInstance>()
                    .is_ok_and(|fq| fq == *requested)
            });
            if matches {
                tracing::info!(module = %loaded_as, requested = %requested, "extension module implements requested interface");
                return Ok(Resolution::Found {
                    handle,
                    loaded_as,
                    via_extension: true,
                });
            }
        }
        Ok(Resolution::NotFound)
    }
}

/// Chain entries allowed to be in-process, re-expressed under `instance`.
///
/// Walking from the base interface to the most derived one, the first
/// entry in an allowed package and every entry more derived than it are allowed.
pub fn allowed_instances(chain: &[String], instance: &str, policy: &Policy) -> BTreeSet<FqInstance> {
    let mut allowed = BTreeSet::new();
    let mut allowing = false;
    for entry in chain.iter().rev() {
        let fq = match format!("{}/{}", entry, instance).parse::<FqInstance>() {
            Ok(fq) => fq,
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "unparsable interface chain entry");
                continue;
            }
        };
        if policy.allows_passthrough(fq.package()) {
            allowing = true;
        }
        if allowing {
            allowed.insert(fq);
        }
    }
    allowed
}

// ──────────────────────────────────────────────
// Check: binderization
// ──────────────────────────────────────────────

/// Only allowed packages (and their extensions) may be declared in-process.
pub async fn check_binderized(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let resolver = PassthroughResolver::new(&ctx.lookup);
    let mut verdicts = Vec::new();
    for catalog in ctx.load_catalogs().await? {
        let declared: Vec<DeclaredInstance> = catalog.of_format(HalFormat::VersionedRpc).cloned().collect();
        for instance in &declared {
            let subject = instance.to_string();
            if instance.transport == Transport::Remote {
                verdicts.push(Verdict::satisfied(CHECK, subject));
                continue;
            }
            let verdict = binderized(ctx, &resolver, instance, &declared)
                .await
                .unwrap_or_else(|e| Verdict::lookup_failed(CHECK, subject, &e));
            verdicts.push(verdict);
        }
    }
    Ok(verdicts)
}

async fn binderized(
    ctx: &VerifyContext,
    resolver: &PassthroughResolver<'_>,
    instance: &DeclaredInstance,
    declared: &[DeclaredInstance],
) -> Result<Verdict, RegistryError> {
    let subject = instance.to_string();
    let requested = instance.fq_instance();
    let allowed = match resolver.resolve(&requested, declared).await? {
        Resolution::Found {
            handle, loaded_as, ..
        } => match ctx
            .lookup
            .interface_chain(&loaded_as.to_string(), handle.as_ref())
            .await?
        {
            LookupOutcome::Found(chain) => allowed_instances(&chain, &requested.instance, &ctx.policy),
            LookupOutcome::Missing => BTreeSet::new(),
            LookupOutcome::TimedOut(after) => return Ok(timed_out(&subject, after)),
        },
        Resolution::NotFound => {
            tracing::info!(%requested, "cannot retrieve in-process module, not reading its chain");
            BTreeSet::new()
        }
        Resolution::TimedOut(after) => return Ok(timed_out(&subject, after)),
    };
    if allowed.contains(&requested) {
        Ok(Verdict::satisfied(CHECK, subject))
    } else {
        Ok(Verdict::failure(
            CHECK,
            subject,
            VerdictKind::PassthroughNotAllowed,
            format!("{} can't be passthrough (or can't be retrieved)", requested),
        ))
    }
}

fn timed_out(subject: &str, after: Duration) -> Verdict {
    Verdict::failure(
        CHECK,
        subject,
        VerdictKind::TimedOut,
        format!("no answer within {:?}", after),
    )
}
