//! Instance catalog: expansion of a manifest into declared instances.
//!
//! Every (version, interface, instance) triple of a HAL entry becomes one
//! [`DeclaredInstance`]. Malformed names are reported as structural issues
//! and excluded; they never abort the expansion.

use std::collections::BTreeSet;

use vintf_core::{
    CoreError, DeclaredInstance, FqInstance, HalFormat, ManifestDocument, ManifestHal, SchemaType,
    Transport, Version, VersionedName, DEFAULT_FLAT_RPC_VERSION, FLAT_RPC_MAJOR,
};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const CHECK: &str = "entries";

/// A manifest entry that could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralIssue {
    pub subject: String,
    pub error: CoreError,
}

impl StructuralIssue {
    fn new(subject: impl Into<String>, error: CoreError) -> Self {
        StructuralIssue {
            subject: subject.into(),
            error,
        }
    }
}

/// The declared instances of one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub schema_type: SchemaType,
    pub target_level: Option<u64>,
    pub instances: BTreeSet<DeclaredInstance>,
    pub issues: Vec<StructuralIssue>,
}

impl Catalog {
    pub fn of_format(&self, format: HalFormat) -> impl Iterator<Item = &DeclaredInstance> {
        self.instances.iter().filter(move |i| i.format == format)
    }

    /// Versioned-RPC instances declared with `transport`.
    pub fn versioned(&self, transport: Transport) -> impl Iterator<Item = &DeclaredInstance> {
        self.of_format(HalFormat::VersionedRpc)
            .filter(move |i| i.transport == transport)
    }

    /// Expanded serving obligations of this catalog for `transport`.
    pub fn obligations(&self, transport: Transport) -> BTreeSet<String> {
        serving_obligations(self.versioned(transport))
    }
}

/// Expand `manifest` into its declared instances.
///
/// Pure: expanding the same document twice yields the same catalog.
pub fn expand(manifest: &ManifestDocument) -> Catalog {
    let mut catalog = Catalog {
        schema_type: manifest.schema_type,
        target_level: manifest.target_level,
        instances: BTreeSet::new(),
        issues: Vec::new(),
    };
    for hal in &manifest.hals {
        match hal.format {
            HalFormat::VersionedRpc | HalFormat::NativeLib => expand_versioned(hal, &mut catalog),
            HalFormat::FlatRpc => expand_flat(hal, &mut catalog),
        }
    }
    catalog
}

fn transport_of(hal: &ManifestHal) -> Result<Transport, CoreError> {
    match (hal.format, hal.transport) {
        (HalFormat::VersionedRpc, Some(t)) => Ok(t),
        (HalFormat::VersionedRpc, None) => Err(CoreError::Document(format!(
            "versioned HAL {} declares no transport",
            hal.name
        ))),
        (HalFormat::FlatRpc, _) => Ok(Transport::Remote),
        (HalFormat::NativeLib, _) => Ok(Transport::InProcess),
    }
}

fn declared(fq: FqInstance, hal: &ManifestHal, transport: Transport) -> DeclaredInstance {
    DeclaredInstance {
        name: fq.fq_name.name,
        interface: fq.fq_name.interface,
        instance: fq.instance,
        transport,
        format: hal.format,
        updatable_unit: hal.updatable_via_apex.clone(),
    }
}

fn expand_versioned(hal: &ManifestHal, catalog: &mut Catalog) {
    let transport = match transport_of(hal) {
        Ok(t) => t,
        Err(error) => {
            catalog.issues.push(StructuralIssue::new(&hal.name, error));
            return;
        }
    };
    for version in &hal.versions {
        for iface in &hal.interfaces {
            for instance in &iface.instances {
                let name = format!("{}@{}::{}/{}", hal.name, version, iface.name, instance);
                match parse_member(hal, &name, version, &iface.name, instance) {
                    Ok(fq) => {
                        catalog.instances.insert(declared(fq, hal, transport));
                    }
                    Err(error) => catalog.issues.push(StructuralIssue::new(name, error)),
                }
            }
        }
    }
    for relative in &hal.fqnames {
        let parsed = if hal.format == HalFormat::NativeLib {
            parse_native_relative(&hal.name, relative)
        } else {
            FqInstance::parse_relative(&hal.name, relative)
        };
        match parsed {
            Ok(fq) => {
                catalog.instances.insert(declared(fq, hal, transport));
            }
            Err(error) => catalog
                .issues
                .push(StructuralIssue::new(format!("{}{}", hal.name, relative), error)),
        }
    }
}

/// Native libraries may use an empty interface name, which the versioned
/// grammar rejects.
fn parse_member(
    hal: &ManifestHal,
    name: &str,
    version: &str,
    interface: &str,
    instance: &str,
) -> Result<FqInstance, CoreError> {
    if hal.format == HalFormat::NativeLib {
        let versioned: VersionedName = format!("{}@{}", hal.name, version).parse()?;
        if instance.is_empty() {
            return Err(CoreError::InvalidName {
                name: name.to_string(),
                reason: "empty instance name".to_string(),
            });
        }
        return Ok(FqInstance::new(versioned, interface, instance));
    }
    name.parse()
}

fn parse_native_relative(package: &str, relative: &str) -> Result<FqInstance, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidName {
        name: format!("{}{}", package, relative),
        reason: reason.to_string(),
    };
    let rest = relative
        .strip_prefix('@')
        .ok_or_else(|| invalid("relative names must start with '@'"))?;
    let (version, rest) = rest
        .split_once("::")
        .ok_or_else(|| invalid("missing '::<Interface>'"))?;
    let (interface, instance) = rest
        .rsplit_once('/')
        .ok_or_else(|| invalid("missing '/<instance>'"))?;
    if instance.is_empty() {
        return Err(invalid("empty instance name"));
    }
    let versioned: VersionedName = format!("{}@{}", package, version).parse()?;
    Ok(FqInstance::new(versioned, interface, instance))
}

fn flat_version(hal: &ManifestHal, raw: &str) -> Result<Version, CoreError> {
    raw.trim()
        .parse::<u64>()
        .map(|v| Version::new(FLAT_RPC_MAJOR, v))
        .map_err(|_| CoreError::InvalidName {
            name: format!("{}@{}", hal.name, raw),
            reason: "flat-RPC versions are single non-negative integers".to_string(),
        })
}

fn expand_flat(hal: &ManifestHal, catalog: &mut Catalog) {
    let default_version = [DEFAULT_FLAT_RPC_VERSION.to_string()];
    let versions: &[String] = if hal.versions.is_empty() {
        &default_version
    } else {
        &hal.versions
    };
    for raw in versions {
        let version = match flat_version(hal, raw) {
            Ok(v) => v,
            Err(error) => {
                catalog.issues.push(StructuralIssue::new(&hal.name, error));
                continue;
            }
        };
        // Validate through the versioned grammar, then keep the flat version.
        let as_versioned = format!("{}@{}", hal.name, version);
        let mut members: Vec<(String, String)> = Vec::new();
        for iface in &hal.interfaces {
            for instance in &iface.instances {
                members.push((iface.name.clone(), instance.clone()));
            }
        }
        for relative in &hal.fqnames {
            match relative.split_once('/') {
                Some((iface, instance)) => members.push((iface.to_string(), instance.to_string())),
                None => catalog.issues.push(StructuralIssue::new(
                    format!("{}.{}", hal.name, relative),
                    CoreError::InvalidName {
                        name: relative.clone(),
                        reason: "expected <Interface>/<instance>".to_string(),
                    },
                )),
            }
        }
        for (iface, instance) in members {
            let name = format!("{}::{}/{}", as_versioned, iface, instance);
            match name.parse::<FqInstance>() {
                Ok(fq) => {
                    catalog.instances.insert(declared(fq, hal, Transport::Remote));
                }
                Err(error) => catalog.issues.push(StructuralIssue::new(
                    vintf_core::flat_instance_name(&hal.name, &iface, &instance),
                    error,
                )),
            }
        }
    }
}

/// Every `package@major.minor::Interface/instance` the given versioned-RPC
/// instances must answer to: a declaration at `x.N` obliges `x.0` through `x.N`.
pub fn serving_obligations<'a>(
    instances: impl IntoIterator<Item = &'a DeclaredInstance>,
) -> BTreeSet<String> {
    instances
        .into_iter()
        .filter(|i| i.format == HalFormat::VersionedRpc)
        .flat_map(obligations_of)
        .map(|fq| fq.to_string())
        .collect()
}

/// The `minor + 1` instances one declaration obliges, highest minor first.
pub fn obligations_of(instance: &DeclaredInstance) -> Vec<FqInstance> {
    instance
        .name
        .lower_minors_inclusive()
        .into_iter()
        .map(|name| FqInstance::new(name, instance.interface.clone(), instance.instance.clone()))
        .collect()
}

// ──────────────────────────────────────────────
// Check: entry completeness
// ──────────────────────────────────────────────

/// Structural soundness of both manifests.
///
/// Every HAL entry must declare at least one instance or be an override,
/// and every name must decompose.
pub async fn check_entries(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let mut verdicts = Vec::new();
    for manifest in ctx.load_manifests().await? {
        for hal in &manifest.hals {
            let subject = format!("{} manifest: {}", manifest.schema_type, hal.name);
            if hal.is_disabled() {
                verdicts.push(Verdict::failure(
                    CHECK,
                    subject,
                    VerdictKind::Structural,
                    "HAL entry declares no instances and is not an override",
                ));
            } else {
                verdicts.push(Verdict::satisfied(CHECK, subject));
            }
        }
        for issue in expand(&manifest).issues {
            tracing::warn!(subject = %issue.subject, error = %issue.error, "excluded malformed manifest entry");
            verdicts.push(Verdict::failure(
                CHECK,
                issue.subject,
                VerdictKind::Structural,
                issue.error.to_string(),
            ));
        }
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> ManifestDocument {
        ManifestDocument::from_json(&value).unwrap()
    }

    fn names(catalog: &Catalog) -> Vec<String> {
        catalog.instances.iter().map(|i| i.registry_name()).collect()
    }

    #[test]
    fn expands_every_version_interface_instance_triple() {
        let catalog = expand(&manifest(json!({
            "type": "device",
            "hals": [{
                "name": "android.hardware.foo",
                "transport": "hwbinder",
                "versions": ["1.1", "2.0"],
                "interfaces": [
                    {"name": "IFoo", "instances": ["default", "slot1"]},
                    {"name": "IBar", "instances": ["default"]}
                ]
            }]
        })));
        assert_eq!(catalog.instances.len(), 6);
        assert!(catalog.issues.is_empty());
        assert!(names(&catalog).contains(&"android.hardware.foo@2.0::IBar/default".to_string()));
        assert!(names(&catalog).contains(&"android.hardware.foo@1.1::IFoo/slot1".to_string()));
    }

    #[test]
    fn oversized_minor_is_a_structural_issue() {
        let catalog = expand(&manifest(json!({
            "type": "device",
            "hals": [{
                "name": "android.hardware.foo",
                "transport": "hwbinder",
                "versions": ["1.4000000000", "1.1"],
                "interfaces": [{"name": "IFoo", "instances": ["default"]}]
            }]
        })));
        assert_eq!(catalog.issues.len(), 1);
        assert_eq!(names(&catalog), vec!["android.hardware.foo@1.1::IFoo/default"]);
        assert_eq!(catalog.obligations(Transport::Remote).len(), 2);
    }

    #[test]
    fn expands_relative_fqnames() {
        let catalog = expand(&manifest(json!({
            "type": "framework",
            "hals": [{
                "name": "android.hidl.manager",
                "transport": "hwbinder",
                "fqnames": ["@1.2::IServiceManager/default"]
            }]
        })));
        assert_eq!(
            names(&catalog),
            vec!["android.hidl.manager@1.2::IServiceManager/default"]
        );
    }

    #[test]
    fn flat_rpc_versions_are_single_integers() {
        let catalog = expand(&manifest(json!({
            "type": "device",
            "hals": [
                {
                    "format": "aidl",
                    "name": "android.hardware.power",
                    "versions": ["3"],
                    "interfaces": [{"name": "IPower", "instances": ["default"]}],
                    "updatable_via_apex": "com.android.hardware.power"
                },
                {
                    "format": "aidl",
                    "name": "android.hardware.light",
                    "fqnames": ["ILights/default"]
                }
            ]
        })));
        let power = catalog
            .instances
            .iter()
            .find(|i| i.package() == "android.hardware.power")
            .unwrap();
        assert_eq!(power.flat_version(), 3);
        assert_eq!(power.transport, Transport::Remote);
        assert_eq!(power.updatable_unit.as_deref(), Some("com.android.hardware.power"));
        assert_eq!(power.registry_name(), "android.hardware.power.IPower/default");

        let light = catalog
            .instances
            .iter()
            .find(|i| i.package() == "android.hardware.light")
            .unwrap();
        assert_eq!(light.flat_version(), DEFAULT_FLAT_RPC_VERSION);
    }

    #[test]
    fn native_allows_empty_interface() {
        let catalog = expand(&manifest(json!({
            "type": "device",
            "hals": [{
                "format": "native",
                "name": "mapper",
                "versions": ["5.0"],
                "interfaces": [{"name": "", "instances": ["minigbm"]}]
            }]
        })));
        assert!(catalog.issues.is_empty());
        let mapper = catalog.instances.iter().next().unwrap();
        assert_eq!(mapper.interface, "");
        assert_eq!(mapper.transport, Transport::InProcess);
        assert_eq!(mapper.registry_name(), "mapper.minigbm");
    }

    #[test]
    fn malformed_entries_are_excluded_not_fatal() {
        let catalog = expand(&manifest(json!({
            "type": "device",
            "hals": [
                {
                    "name": "android.hardware.foo",
                    "transport": "hwbinder",
                    "versions": ["1.x", "1.0"],
                    "interfaces": [{"name": "IFoo", "instances": ["default"]}]
                },
                {
                    "name": "android.hardware.bar",
                    "versions": ["1.0"],
                    "interfaces": [{"name": "IBar", "instances": ["default"]}]
                },
                {
                    "format": "aidl",
                    "name": "android.hardware.baz",
                    "versions": ["two"],
                    "interfaces": [{"name": "IBaz", "instances": ["default"]}]
                }
            ]
        })));
        assert_eq!(names(&catalog), vec!["android.hardware.foo@1.0::IFoo/default"]);
        assert_eq!(catalog.issues.len(), 3);
    }

    #[test]
    fn expansion_is_idempotent() {
        let doc = manifest(json!({
            "type": "device",
            "hals": [{
                "name": "android.hardware.foo",
                "transport": "passthrough",
                "versions": ["1.3"],
                "interfaces": [{"name": "IFoo", "instances": ["default"]}]
            }]
        }));
        assert_eq!(expand(&doc), expand(&doc));
    }

    #[test]
    fn obligations_walk_down_to_minor_zero() {
        let catalog = expand(&manifest(json!({
            "type": "device",
            "hals": [{
                "name": "pkg",
                "transport": "hwbinder",
                "versions": ["1.3"],
                "interfaces": [{"name": "IFoo", "instances": ["default"]}]
            }]
        })));
        let obligations = catalog.obligations(Transport::Remote);
        let expected: BTreeSet<String> = (0..=3)
            .map(|minor| format!("pkg@1.{}::IFoo/default", minor))
            .collect();
        assert_eq!(obligations, expected);
        assert!(catalog.obligations(Transport::InProcess).is_empty());
    }
}
