//! Compatibility matcher: declared instances against matrix requirements.

use std::fmt;

use vintf_core::{DeclaredInstance, HalFormat, MatrixDocument, MatrixHal, VersionedName};

use crate::catalog::{expand, Catalog, StructuralIssue};
use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const CHECK: &str = "compatibility";

/// One matrix requirement on one interface at one version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityRequirement {
    pub format: HalFormat,
    pub package: String,
    /// `None` accepts any interface of the package.
    pub interface: Option<String>,
    pub min_version: VersionedName,
    /// Instances that must each be provided; empty accepts any.
    pub instance_hints: Vec<String>,
}

impl fmt::Display for CompatibilityRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.min_version)?;
        if let Some(iface) = &self.interface {
            write!(f, "::{}", iface)?;
        }
        if !self.instance_hints.is_empty() {
            write!(f, "/{{{}}}", self.instance_hints.join(","))?;
        }
        Ok(())
    }
}

/// A matrix HAL: satisfied when every requirement of at least one
/// alternative (one per listed version range) is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalRequirement {
    pub name: String,
    pub optional: bool,
    pub alternatives: Vec<Vec<CompatibilityRequirement>>,
}

/// Decompose a matrix into HAL requirements.
pub fn requirements(matrix: &MatrixDocument) -> (Vec<HalRequirement>, Vec<StructuralIssue>) {
    let mut out = Vec::new();
    let mut issues = Vec::new();
    for hal in &matrix.hals {
        match hal_requirement(hal) {
            Ok(req) => out.push(req),
            Err(error) => issues.push(StructuralIssue {
                subject: hal.name.clone(),
                error,
            }),
        }
    }
    (out, issues)
}

fn hal_requirement(hal: &MatrixHal) -> Result<HalRequirement, vintf_core::CoreError> {
    let mut alternatives = Vec::new();
    for range in hal.version_ranges()? {
        let min_version = VersionedName::new(hal.name.clone(), range.major, range.min_minor);
        let alternative = if hal.interfaces.is_empty() {
            vec![CompatibilityRequirement {
                format: hal.format,
                package: hal.name.clone(),
                interface: None,
                min_version,
                instance_hints: Vec::new(),
            }]
        } else {
            hal.interfaces
                .iter()
                .map(|iface| CompatibilityRequirement {
                    format: hal.format,
                    package: hal.name.clone(),
                    interface: Some(iface.name.clone()),
                    min_version: min_version.clone(),
                    instance_hints: iface.instances.clone(),
                })
                .collect()
        };
        alternatives.push(alternative);
    }
    Ok(HalRequirement {
        name: hal.name.clone(),
        optional: hal.optional,
        alternatives,
    })
}

/// Same format, package and interface (or wildcard), an acceptable instance,
/// and a version with the same major and at least the minimum minor.
pub fn is_compatible(declared: &DeclaredInstance, requirement: &CompatibilityRequirement) -> bool {
    declared.format == requirement.format
        && declared.package() == requirement.package
        && requirement
            .interface
            .as_ref()
            .map_or(true, |iface| *iface == declared.interface)
        && (requirement.instance_hints.is_empty()
            || requirement.instance_hints.contains(&declared.instance))
        && declared.name.minor_at_least(&requirement.min_version)
}

/// Unmet parts of one requirement against a set of declared instances.
fn unmet<'a>(
    requirement: &CompatibilityRequirement,
    declared: impl Iterator<Item = &'a DeclaredInstance> + Clone,
) -> Vec<String> {
    if requirement.instance_hints.is_empty() {
        if declared.clone().any(|d| is_compatible(d, requirement)) {
            return Vec::new();
        }
        return vec![requirement.to_string()];
    }
    requirement
        .instance_hints
        .iter()
        .filter(|hint| {
            !declared
                .clone()
                .any(|d| d.instance == **hint && is_compatible(d, requirement))
        })
        .map(|hint| {
            let mut single = requirement.clone();
            single.instance_hints = vec![hint.clone()];
            single.to_string()
        })
        .collect()
}

/// Outcome of matching a manifest against a matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairCompatibility {
    /// One entry per unmet mandatory HAL, naming what is missing.
    pub unmet: Vec<String>,
}

impl PairCompatibility {
    pub fn is_compatible(&self) -> bool {
        self.unmet.is_empty()
    }

    pub fn error_detail(&self) -> Option<String> {
        if self.unmet.is_empty() {
            None
        } else {
            Some(self.unmet.join("\n"))
        }
    }
}

/// Every mandatory matrix HAL must be satisfied by the manifest's declared instances.
pub fn is_document_pair_compatible(manifest: &Catalog, matrix: &[HalRequirement]) -> PairCompatibility {
    let mut result = PairCompatibility::default();
    for hal in matrix {
        if hal.optional {
            continue;
        }
        let mut best: Option<Vec<String>> = None;
        for alternative in &hal.alternatives {
            let missing: Vec<String> = alternative
                .iter()
                .flat_map(|req| unmet(req, manifest.instances.iter()))
                .collect();
            if missing.is_empty() {
                best = Some(Vec::new());
                break;
            }
            if best.as_ref().map_or(true, |b| missing.len() < b.len()) {
                best = Some(missing);
            }
        }
        if let Some(missing) = best.filter(|m| !m.is_empty()) {
            result.unmet.push(format!(
                "HAL {} is required but not satisfied: {}",
                hal.name,
                missing.join(", ")
            ));
        }
    }
    result
}

// ──────────────────────────────────────────────
// Check
// ──────────────────────────────────────────────

/// Device manifest against the framework matrix, and framework manifest
/// against the device matrix.
pub async fn check_compatibility(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let device = expand(&ctx.manifests.device_manifest().await?);
    let framework = expand(&ctx.manifests.framework_manifest().await?);
    let framework_matrix = ctx.matrices.framework_matrix().await?;
    let device_matrix = ctx.matrices.device_matrix().await?;

    let mut verdicts = Vec::new();
    for (catalog, matrix, subject) in [
        (&device, &framework_matrix, "device manifest vs framework matrix"),
        (&framework, &device_matrix, "framework manifest vs device matrix"),
    ] {
        let (reqs, issues) = requirements(matrix);
        for issue in issues {
            verdicts.push(Verdict::failure(
                CHECK,
                format!("{}: {}", subject, issue.subject),
                VerdictKind::Structural,
                issue.error.to_string(),
            ));
        }
        let pair = is_document_pair_compatible(catalog, &reqs);
        if pair.is_compatible() {
            verdicts.push(Verdict::satisfied(CHECK, subject));
        }
        for unmet in pair.unmet {
            verdicts.push(Verdict::failure(CHECK, subject, VerdictKind::Incompatible, unmet));
        }
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vintf_core::{ManifestDocument, Transport};

    fn hidl(name: &str, major: u64, minor: u64, iface: &str, instance: &str) -> DeclaredInstance {
        DeclaredInstance {
            name: VersionedName::new(name, major, minor),
            interface: iface.to_string(),
            instance: instance.to_string(),
            transport: Transport::Remote,
            format: HalFormat::VersionedRpc,
            updatable_unit: None,
        }
    }

    fn requirement(name: &str, major: u64, minor: u64) -> CompatibilityRequirement {
        CompatibilityRequirement {
            format: HalFormat::VersionedRpc,
            package: name.to_string(),
            interface: Some("IFoo".to_string()),
            min_version: VersionedName::new(name, major, minor),
            instance_hints: Vec::new(),
        }
    }

    #[test]
    fn compatible_requires_same_major_and_minor_at_least() {
        let req = requirement("pkg", 1, 2);
        assert!(is_compatible(&hidl("pkg", 1, 2, "IFoo", "default"), &req));
        assert!(is_compatible(&hidl("pkg", 1, 5, "IFoo", "default"), &req));
        assert!(!is_compatible(&hidl("pkg", 1, 1, "IFoo", "default"), &req));
        assert!(!is_compatible(&hidl("pkg", 2, 9, "IFoo", "default"), &req));
        assert!(!is_compatible(&hidl("other", 1, 2, "IFoo", "default"), &req));
        assert!(!is_compatible(&hidl("pkg", 1, 2, "IBar", "default"), &req));
    }

    #[test]
    fn wildcard_interface_and_instance_hints() {
        let mut req = requirement("pkg", 1, 0);
        req.interface = None;
        assert!(is_compatible(&hidl("pkg", 1, 0, "IAnything", "x"), &req));
        req.instance_hints = vec!["default".to_string()];
        assert!(!is_compatible(&hidl("pkg", 1, 0, "IAnything", "x"), &req));
    }

    fn catalog(value: serde_json::Value) -> Catalog {
        expand(&ManifestDocument::from_json(&value).unwrap())
    }

    fn matrix(value: serde_json::Value) -> Vec<HalRequirement> {
        let (reqs, issues) = requirements(&MatrixDocument::from_json(&value).unwrap());
        assert!(issues.is_empty());
        reqs
    }

    #[test]
    fn document_pair_enumerates_every_unmet_requirement() {
        let manifest = catalog(json!({
            "type": "device",
            "hals": [{
                "name": "android.hardware.foo",
                "transport": "hwbinder",
                "versions": ["1.1"],
                "interfaces": [{"name": "IFoo", "instances": ["default"]}]
            }]
        }));
        let reqs = matrix(json!({
            "type": "framework",
            "hals": [
                {"name": "android.hardware.foo", "versions": ["1.0-2"],
                 "interfaces": [{"name": "IFoo", "instances": ["default", "slot1"]}]},
                {"name": "android.hardware.bar", "versions": ["1.0"],
                 "interfaces": [{"name": "IBar", "instances": ["default"]}]},
                {"name": "android.hardware.opt", "optional": true, "versions": ["1.0"]}
            ]
        }));
        let pair = is_document_pair_compatible(&manifest, &reqs);
        assert!(!pair.is_compatible());
        assert_eq!(pair.unmet.len(), 2);
        assert!(pair.unmet[0].contains("slot1"));
        assert!(pair.unmet[1].contains("android.hardware.bar"));
        assert!(pair.error_detail().unwrap().contains('\n'));
    }

    #[test]
    fn any_version_range_alternative_satisfies() {
        let manifest = catalog(json!({
            "type": "device",
            "hals": [{
                "name": "android.hardware.foo",
                "transport": "hwbinder",
                "versions": ["2.0"],
                "interfaces": [{"name": "IFoo", "instances": ["default"]}]
            }]
        }));
        let reqs = matrix(json!({
            "type": "framework",
            "hals": [{"name": "android.hardware.foo", "versions": ["1.0-2", "2.0"],
                      "interfaces": [{"name": "IFoo", "instances": ["default"]}]}]
        }));
        assert!(is_document_pair_compatible(&manifest, &reqs).is_compatible());
    }

    #[test]
    fn flat_rpc_requirements_match_flat_versions() {
        let manifest = catalog(json!({
            "type": "device",
            "hals": [{
                "format": "aidl",
                "name": "android.hardware.power",
                "versions": ["3"],
                "interfaces": [{"name": "IPower", "instances": ["default"]}]
            }]
        }));
        let ok = matrix(json!({
            "type": "framework",
            "hals": [{"format": "aidl", "name": "android.hardware.power", "versions": ["2-4"],
                      "interfaces": [{"name": "IPower", "instances": ["default"]}]}]
        }));
        assert!(is_document_pair_compatible(&manifest, &ok).is_compatible());
        let too_new = matrix(json!({
            "type": "framework",
            "hals": [{"format": "aidl", "name": "android.hardware.power", "versions": ["4"],
                      "interfaces": [{"name": "IPower", "instances": ["default"]}]}]
        }));
        assert!(!is_document_pair_compatible(&manifest, &too_new).is_compatible());
    }
}
