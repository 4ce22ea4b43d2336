//! Native (shared library) HALs.

use std::collections::BTreeSet;

use vintf_core::{DeclaredInstance, HalFormat};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const CHECK: &str = "native";

/// Native packages the platform knows about, with their current major version.
pub const KNOWN_NATIVE_PACKAGES: &[(&str, u64)] = &[("mapper", 5)];

fn known_major(package: &str) -> Option<u64> {
    KNOWN_NATIVE_PACKAGES
        .iter()
        .find(|(name, _)| *name == package)
        .map(|(_, major)| *major)
}

/// `<package>.<instance>.so`, split at the first dot.
pub fn parse_library_name(file_name: &str) -> Option<(&str, &str)> {
    let stem = file_name.strip_suffix(".so")?;
    let (package, instance) = stem.split_once('.')?;
    if package.is_empty() || instance.is_empty() {
        return None;
    }
    Some((package, instance))
}

pub fn library_name(instance: &DeclaredInstance) -> String {
    format!("{}.{}.so", instance.package(), instance.instance)
}

/// Problems with one declared native instance, in declaration order.
pub fn declaration_problems(instance: &DeclaredInstance, installed: &BTreeSet<&str>) -> Vec<(VerdictKind, String)> {
    let mut problems = Vec::new();
    if instance.name.minor() != 0 {
        problems.push((
            VerdictKind::VersionMismatch,
            format!("minor version must be 0, got {}", instance.name.version),
        ));
    }
    match known_major(instance.package()) {
        None => problems.push((
            VerdictKind::Incompatible,
            format!("unknown native package '{}'", instance.package()),
        )),
        Some(major) if major != instance.name.major() => problems.push((
            VerdictKind::VersionMismatch,
            format!("major version must be {}, got {}", major, instance.name.major()),
        )),
        Some(_) => {}
    }
    if !(instance.interface.is_empty() || instance.interface == "I") {
        problems.push((
            VerdictKind::Structural,
            format!("interface must be 'I' or empty, got '{}'", instance.interface),
        ));
    }
    let library = library_name(instance);
    if !installed.contains(library.as_str()) {
        problems.push((VerdictKind::Missing, format!("library {} is not installed", library)));
    }
    problems
}

pub async fn check_native(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let catalogs = ctx.load_catalogs().await?;
    let installed: BTreeSet<&str> = ctx.native_libraries.iter().map(String::as_str).collect();
    let mut verdicts = Vec::new();

    for instance in catalogs.iter().flat_map(|c| c.of_format(HalFormat::NativeLib)) {
        let subject = instance.to_string();
        let problems = declaration_problems(instance, &installed);
        if problems.is_empty() {
            verdicts.push(Verdict::satisfied(CHECK, subject));
            continue;
        }
        for (kind, message) in problems {
            verdicts.push(Verdict::failure(CHECK, subject.clone(), kind, message));
        }
    }

    let device_declared: BTreeSet<(&str, &str)> = catalogs
        .first()
        .into_iter()
        .flat_map(|device| device.of_format(HalFormat::NativeLib))
        .map(|i| (i.package(), i.instance.as_str()))
        .collect();
    for file_name in &ctx.native_libraries {
        let Some((package, instance)) = parse_library_name(file_name) else {
            tracing::debug!(%file_name, "not a native HAL library name, ignoring");
            continue;
        };
        if known_major(package).is_none() {
            continue;
        }
        if device_declared.contains(&(package, instance)) {
            verdicts.push(Verdict::satisfied(CHECK, file_name.clone()));
        } else {
            verdicts.push(Verdict::failure(
                CHECK,
                file_name.clone(),
                VerdictKind::MissingFromManifest,
                format!("installed native library for '{}' instance '{}' is not declared in the device manifest", package, instance),
            ));
        }
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vintf_core::{Transport, VersionedName};

    fn native(package: &str, major: u64, minor: u64, interface: &str) -> DeclaredInstance {
        DeclaredInstance {
            name: VersionedName::new(package, major, minor),
            interface: interface.to_string(),
            instance: "minigbm".to_string(),
            transport: Transport::InProcess,
            format: HalFormat::NativeLib,
            updatable_unit: None,
        }
    }

    #[test]
    fn library_names_split_at_first_dot() {
        assert_eq!(parse_library_name("mapper.minigbm.so"), Some(("mapper", "minigbm")));
        assert_eq!(parse_library_name("mapper.a.b.so"), Some(("mapper", "a.b")));
        assert_eq!(parse_library_name("mapper.so"), None);
        assert_eq!(parse_library_name("mapper.minigbm"), None);
    }

    #[test]
    fn well_formed_installed_declaration_passes() {
        let installed: BTreeSet<&str> = ["mapper.minigbm.so"].into_iter().collect();
        assert!(declaration_problems(&native("mapper", 5, 0, "I"), &installed).is_empty());
        assert!(declaration_problems(&native("mapper", 5, 0, ""), &installed).is_empty());
    }

    #[test]
    fn every_problem_is_reported() {
        let installed = BTreeSet::new();
        let kinds: Vec<VerdictKind> = declaration_problems(&native("mapper", 4, 1, "IMapper"), &installed)
            .into_iter()
            .map(|(kind, _)| kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                VerdictKind::VersionMismatch,
                VerdictKind::VersionMismatch,
                VerdictKind::Structural,
                VerdictKind::Missing,
            ]
        );
    }

    #[test]
    fn unknown_package_is_incompatible() {
        let installed: BTreeSet<&str> = ["gralloc.minigbm.so"].into_iter().collect();
        let problems = declaration_problems(&native("gralloc", 1, 0, "I"), &installed);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].0, VerdictKind::Incompatible);
    }

    #[tokio::test]
    async fn check_reports_each_problem_under_one_subject() {
        let snapshot = vintf_registry::DeviceSnapshot::from_json_str(
            r#"{
                "device_manifest": {"type": "device", "hals": [
                    {"format": "native", "name": "mapper", "versions": ["5.0"],
                     "interfaces": [{"name": "I", "instances": ["minigbm"]}]},
                    {"format": "native", "name": "mapper", "versions": ["5.1"],
                     "interfaces": [{"name": "I", "instances": ["other"]}]}
                ]},
                "framework_manifest": {"type": "framework", "hals": []},
                "native_libraries": ["mapper.minigbm.so"]
            }"#,
        )
        .unwrap();
        let ctx = VerifyContext::from_snapshot(
            snapshot,
            crate::policy::Policy::default(),
            std::time::Duration::from_millis(100),
            None,
        );
        let verdicts = check_native(&ctx).await.unwrap();

        let broken: Vec<&Verdict> = verdicts.iter().filter(|v| v.is_failure()).collect();
        assert_eq!(broken.len(), 2);
        assert!(broken.iter().all(|v| v.subject == broken[0].subject));
        assert_eq!(
            verdicts.iter().filter(|v| v.kind == VerdictKind::Satisfied).count(),
            2,
            "{:#?}",
            verdicts
        );
    }
}
