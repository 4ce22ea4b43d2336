//! Deprecation analyzer.
//!
//! A matrix may mark versions of a HAL as deprecated. Wherever such a level
//! is in use (declared in a manifest, or answered by the live registry) it
//! must be superseded by a higher minor version that is not deprecated
//! itself. Every unsuperseded level is reported, not just the first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use vintf_core::{
    DeclaredInstance, FqInstance, FqName, HalFormat, MatrixDocument, Transport, Version,
    VersionedName,
};
use vintf_registry::LookupOutcome;

use crate::catalog::{Catalog, StructuralIssue};
use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const MANIFEST_CHECK: &str = "deprecation-manifest";
pub const SERVED_CHECK: &str = "deprecation-served";

/// One deprecated `package@major.minor::Interface/instance` to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeprecatedLevel {
    pub level: FqInstance,
    /// Every deprecated version of the package; a superseder must not be one.
    pub deprecated: BTreeSet<Version>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeprecationState {
    /// The level is not in use.
    NotEvaluated,
    Superseded { by: Version },
    UnsupersededFound { found: Version },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationFinding {
    pub level: FqInstance,
    pub state: DeprecationState,
}

impl fmt::Display for DeprecationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            DeprecationState::NotEvaluated => write!(f, "{} is not in use", self.level),
            DeprecationState::Superseded { by } => {
                write!(f, "{} is superseded by {}", self.level, by)
            }
            DeprecationState::UnsupersededFound { found } => write!(
                f,
                "{} is deprecated; found version {} with no non-deprecated higher minor version",
                self.level, found
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationReport {
    pub findings: Vec<DeprecationFinding>,
}

impl DeprecationReport {
    pub fn unsuperseded(&self) -> impl Iterator<Item = &DeprecationFinding> {
        self.findings
            .iter()
            .filter(|f| matches!(f.state, DeprecationState::UnsupersededFound { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.unsuperseded().next().is_none()
    }

    /// Every unsuperseded level, one per line.
    pub fn combined_error(&self) -> Option<String> {
        let lines: Vec<String> = self.unsuperseded().map(|f| f.to_string()).collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Decide the state of `level` given the highest version in use on its
/// major line, if any.
pub fn evaluate(level: &DeprecatedLevel, in_use: Option<Version>) -> DeprecationState {
    let Some(found) = in_use else {
        return DeprecationState::NotEvaluated;
    };
    let wanted = level.level.version();
    if found.minor_at_least(&wanted) && found.minor > wanted.minor && !level.deprecated.contains(&found) {
        DeprecationState::Superseded { by: found }
    } else {
        DeprecationState::UnsupersededFound { found }
    }
}

/// The first chain entry in `package` on the same major line at or above
/// `level`. Unparsable entries are logged and skipped.
pub fn served_version_from_chain(package: &str, level: Version, chain: &[String]) -> Option<Version> {
    for entry in chain {
        let fq: FqName = match entry.parse() {
            Ok(fq) => fq,
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "unparsable interface chain entry, continuing");
                continue;
            }
        };
        if fq.package() == package && fq.version().minor_at_least(&level) {
            return Some(fq.version());
        }
    }
    None
}

/// Deprecated levels of every matrix, fanned out over the interfaces and
/// instances they apply to.
///
/// A matrix HAL that lists no interfaces applies to every declared
/// (interface, instance) of its package.
pub fn deprecated_levels(
    matrices: &[MatrixDocument],
    catalogs: &[Catalog],
) -> (Vec<DeprecatedLevel>, Vec<StructuralIssue>) {
    let mut levels = BTreeSet::new();
    let mut issues = Vec::new();
    for hal in matrices.iter().flat_map(|m| m.hals.iter()) {
        if hal.format != HalFormat::VersionedRpc || hal.deprecated.is_empty() {
            continue;
        }
        let deprecated: BTreeSet<Version> = match hal.deprecated_versions() {
            Ok(versions) => versions.into_iter().collect(),
            Err(error) => {
                issues.push(StructuralIssue {
                    subject: hal.name.clone(),
                    error,
                });
                continue;
            }
        };
        let surfaces: BTreeSet<(String, String)> = if hal.interfaces.is_empty() {
            catalogs
                .iter()
                .flat_map(|c| c.of_format(HalFormat::VersionedRpc))
                .filter(|i| i.package() == hal.name)
                .map(|i| (i.interface.clone(), i.instance.clone()))
                .collect()
        } else {
            hal.interfaces
                .iter()
                .flat_map(|iface| {
                    iface
                        .instances
                        .iter()
                        .map(move |inst| (iface.name.clone(), inst.clone()))
                })
                .collect()
        };
        for version in &deprecated {
            for (interface, instance) in &surfaces {
                levels.insert(DeprecatedLevel {
                    level: FqInstance::new(
                        VersionedName::new(hal.name.clone(), version.major, version.minor),
                        interface.clone(),
                        instance.clone(),
                    ),
                    deprecated: deprecated.clone(),
                });
            }
        }
    }
    (levels.into_iter().collect(), issues)
}

/// Declaration mode: the highest declared version on each level's major line.
pub fn analyze_declared<'a>(
    levels: &[DeprecatedLevel],
    declared: impl IntoIterator<Item = &'a DeclaredInstance>,
) -> DeprecationReport {
    let mut highest: BTreeMap<(String, u64, String, String), Version> = BTreeMap::new();
    for instance in declared {
        if instance.format != HalFormat::VersionedRpc {
            continue;
        }
        let key = (
            instance.package().to_string(),
            instance.name.major(),
            instance.interface.clone(),
            instance.instance.clone(),
        );
        let entry = highest.entry(key).or_insert(instance.name.version);
        if instance.name.version > *entry {
            *entry = instance.name.version;
        }
    }
    let findings = levels
        .iter()
        .map(|level| {
            let key = (
                level.level.package().to_string(),
                level.level.version().major,
                level.level.interface().to_string(),
                level.level.instance.clone(),
            );
            DeprecationFinding {
                level: level.level.clone(),
                state: evaluate(level, highest.get(&key).copied()),
            }
        })
        .collect();
    DeprecationReport { findings }
}

fn verdicts(check: &str, report: &DeprecationReport) -> Vec<Verdict> {
    if let Some(combined) = report.combined_error() {
        tracing::warn!(check, "deprecated HALs without a superseder:\n{}", combined);
    }
    report
        .findings
        .iter()
        .map(|finding| {
            let subject = finding.level.to_string();
            match finding.state {
                DeprecationState::NotEvaluated => Verdict::skipped(check, subject, "not in use"),
                DeprecationState::Superseded { .. } => Verdict::satisfied(check, subject),
                DeprecationState::UnsupersededFound { .. } => Verdict::failure(
                    check,
                    subject,
                    VerdictKind::DeprecatedWithoutSuperseder,
                    finding.to_string(),
                ),
            }
        })
        .collect()
}

async fn load_levels(ctx: &VerifyContext, check: &str) -> Result<(Vec<DeprecatedLevel>, Vec<Catalog>, Vec<Verdict>), VerifyError> {
    let catalogs = ctx.load_catalogs().await?;
    let matrices = vec![
        ctx.matrices.framework_matrix().await?,
        ctx.matrices.device_matrix().await?,
    ];
    let (levels, issues) = deprecated_levels(&matrices, &catalogs);
    let structural = issues
        .into_iter()
        .map(|issue| Verdict::failure(check, issue.subject, VerdictKind::Structural, issue.error.to_string()))
        .collect();
    Ok((levels, catalogs, structural))
}

// ──────────────────────────────────────────────
// Check: deprecation (declared)
// ──────────────────────────────────────────────

pub async fn check_deprecation_manifest(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let (levels, catalogs, mut out) = load_levels(ctx, MANIFEST_CHECK).await?;
    let report = analyze_declared(&levels, catalogs.iter().flat_map(|c| c.instances.iter()));
    out.extend(verdicts(MANIFEST_CHECK, &report));
    Ok(out)
}

// ──────────────────────────────────────────────
// Check: deprecation (served)
// ──────────────────────────────────────────────

/// Serving mode: ask the registry for each deprecated level over either
/// transport and read the served version off the answering interface chain.
pub async fn check_deprecation_served(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let (levels, _, mut out) = load_levels(ctx, SERVED_CHECK).await?;
    let mut report = DeprecationReport::default();
    for level in &levels {
        let fq = &level.level;
        let name = fq.fq_name.to_string();
        let mut timed_out = None;
        let mut failed = None;
        let mut in_use = None;
        for transport in [Transport::Remote, Transport::InProcess] {
            let handle = match ctx.lookup.handle(&name, &fq.instance, transport).await {
                Ok(LookupOutcome::Found(handle)) => handle,
                Ok(LookupOutcome::Missing) => continue,
                Ok(LookupOutcome::TimedOut(after)) => {
                    timed_out = Some(after);
                    continue;
                }
                Err(e) => {
                    failed = Some(e);
                    continue;
                }
            };
            match ctx.lookup.interface_chain(&fq.to_string(), handle.as_ref()).await {
                Ok(LookupOutcome::Found(chain)) => {
                    let served = served_version_from_chain(fq.package(), fq.version(), &chain);
                    if served.is_none() {
                        tracing::warn!(level = %fq, "no chain entry on the deprecated major line; treating as the deprecated level");
                    }
                    in_use = Some(served.unwrap_or_else(|| fq.version()));
                    break;
                }
                Ok(LookupOutcome::Missing) => continue,
                Ok(LookupOutcome::TimedOut(after)) => {
                    timed_out = Some(after);
                    continue;
                }
                Err(e) => {
                    failed = Some(e);
                    continue;
                }
            }
        }
        if in_use.is_none() {
            if let Some(after) = timed_out {
                out.push(Verdict::failure(
                    SERVED_CHECK,
                    fq.to_string(),
                    VerdictKind::TimedOut,
                    format!("no answer within {:?}", after),
                ));
                continue;
            }
            if let Some(e) = failed {
                out.push(Verdict::lookup_failed(SERVED_CHECK, fq.to_string(), &e));
                continue;
            }
        }
        report.findings.push(DeprecationFinding {
            level: fq.clone(),
            state: evaluate(level, in_use),
        });
    }
    out.extend(verdicts(SERVED_CHECK, &report));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vintf_core::ManifestDocument;

    fn level(s: &str, deprecated: &[(u64, u64)]) -> DeprecatedLevel {
        DeprecatedLevel {
            level: s.parse().unwrap(),
            deprecated: deprecated.iter().map(|&(a, b)| Version::new(a, b)).collect(),
        }
    }

    fn chain(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn higher_minor_supersedes() {
        let l = level("pkg@1.0::IFoo/default", &[(1, 0)]);
        assert_eq!(
            evaluate(&l, Some(Version::new(1, 2))),
            DeprecationState::Superseded { by: Version::new(1, 2) }
        );
        assert_eq!(
            evaluate(&l, Some(Version::new(1, 0))),
            DeprecationState::UnsupersededFound { found: Version::new(1, 0) }
        );
        assert_eq!(evaluate(&l, None), DeprecationState::NotEvaluated);
    }

    #[test]
    fn deprecated_superseder_does_not_count() {
        let l = level("pkg@1.0::IFoo/default", &[(1, 0), (1, 1)]);
        assert!(matches!(
            evaluate(&l, Some(Version::new(1, 1))),
            DeprecationState::UnsupersededFound { .. }
        ));
    }

    #[test]
    fn chain_scan_takes_first_entry_on_the_major_line() {
        let found = served_version_from_chain(
            "pkg",
            Version::new(1, 0),
            &chain(&["pkg@1.2::IFoo", "pkg@1.0::IFoo", "android.hidl.base@1.0::IBase"]),
        );
        assert_eq!(found, Some(Version::new(1, 2)));
        let none = served_version_from_chain("pkg", Version::new(1, 0), &chain(&["other@1.2::IFoo"]));
        assert_eq!(none, None);
    }

    #[test]
    fn unparsable_chain_entry_is_skipped_not_fatal() {
        let found = served_version_from_chain(
            "pkg",
            Version::new(1, 0),
            &chain(&["not a name", "pkg@1.1::IFoo"]),
        );
        assert_eq!(found, Some(Version::new(1, 1)));
        let only_garbage = served_version_from_chain("pkg", Version::new(1, 0), &chain(&["garbage"]));
        assert_eq!(only_garbage, None);
    }

    #[test]
    fn levels_fan_out_over_declared_surfaces_when_matrix_lists_none() {
        let matrix = MatrixDocument::from_json(&json!({
            "type": "framework",
            "hals": [{"name": "pkg", "versions": ["1.0"], "deprecated": ["1.0"]}]
        }))
        .unwrap();
        let manifest = ManifestDocument::from_json(&json!({
            "type": "device",
            "hals": [{
                "name": "pkg", "transport": "hwbinder", "versions": ["1.0"],
                "interfaces": [{"name": "IFoo", "instances": ["default", "slot1"]}]
            }]
        }))
        .unwrap();
        let catalogs = vec![crate::catalog::expand(&manifest)];
        let (levels, issues) = deprecated_levels(&[matrix], &catalogs);
        assert!(issues.is_empty());
        let names: Vec<String> = levels.iter().map(|l| l.level.to_string()).collect();
        assert_eq!(names, vec!["pkg@1.0::IFoo/default", "pkg@1.0::IFoo/slot1"]);
    }

    #[test]
    fn declaration_mode_reports_every_unsuperseded_level() {
        let manifest = ManifestDocument::from_json(&json!({
            "type": "device",
            "hals": [
                {"name": "a", "transport": "hwbinder", "versions": ["1.0"],
                 "interfaces": [{"name": "IA", "instances": ["default"]}]},
                {"name": "b", "transport": "hwbinder", "versions": ["2.0"],
                 "interfaces": [{"name": "IB", "instances": ["default"]}]},
                {"name": "c", "transport": "hwbinder", "versions": ["1.3"],
                 "interfaces": [{"name": "IC", "instances": ["default"]}]}
            ]
        }))
        .unwrap();
        let catalog = crate::catalog::expand(&manifest);
        let levels = vec![
            level("a@1.0::IA/default", &[(1, 0)]),
            level("b@2.0::IB/default", &[(2, 0)]),
            level("c@1.0::IC/default", &[(1, 0)]),
            level("d@1.0::ID/default", &[(1, 0)]),
        ];
        let report = analyze_declared(&levels, catalog.instances.iter());
        assert!(!report.is_clean());
        assert_eq!(report.unsuperseded().count(), 2);
        let combined = report.combined_error().unwrap();
        assert!(combined.contains("a@1.0::IA/default"));
        assert!(combined.contains("b@2.0::IB/default"));
        assert!(!combined.contains("c@1.0"));
        assert_eq!(report.findings[3].state, DeprecationState::NotEvaluated);
    }
}
