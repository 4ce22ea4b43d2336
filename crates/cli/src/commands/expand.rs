use std::path::Path;
use std::process;

use vintf_analyze::{expand, Catalog};
use vintf_core::{HalFormat, Transport};

use super::load_snapshot;
use crate::{report_error, ManifestChoice, OutputFormat};

pub(crate) fn cmd_expand(
    snapshot_path: &Path,
    choice: ManifestChoice,
    output: OutputFormat,
    quiet: bool,
) {
    let snapshot = load_snapshot(snapshot_path, output, quiet);
    let (label, manifest) = match choice {
        ManifestChoice::Device => ("device", snapshot.device_manifest),
        ManifestChoice::Framework => ("framework", snapshot.framework_manifest),
    };
    let manifest = match manifest {
        Some(m) => m,
        None => {
            let msg = format!("{} manifest is missing from {}", label, snapshot_path.display());
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let catalog = expand(&manifest);
    for issue in &catalog.issues {
        tracing::warn!(subject = %issue.subject, error = %issue.error, "entry excluded from expansion");
    }

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&catalog_json(label, &catalog))
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => print_catalog(label, &catalog),
    }
}

fn registry_names(catalog: &Catalog, format: HalFormat) -> Vec<String> {
    catalog
        .of_format(format)
        .map(|instance| instance.registry_name())
        .collect()
}

fn catalog_json(label: &str, catalog: &Catalog) -> serde_json::Value {
    serde_json::json!({
        "manifest": label,
        "target_level": catalog.target_level,
        "hwbinder": catalog.obligations(Transport::Remote),
        "passthrough": catalog.obligations(Transport::InProcess),
        "aidl": registry_names(catalog, HalFormat::FlatRpc),
        "native": registry_names(catalog, HalFormat::NativeLib),
        "issues": catalog
            .issues
            .iter()
            .map(|i| serde_json::json!({"subject": i.subject, "error": i.error.to_string()}))
            .collect::<Vec<_>>(),
    })
}

fn print_catalog(label: &str, catalog: &Catalog) {
    println!("Serving obligations ({} manifest)", label);
    println!("==================================");

    let sections: [(&str, Vec<String>); 4] = [
        ("hwbinder", catalog.obligations(Transport::Remote).into_iter().collect()),
        ("passthrough", catalog.obligations(Transport::InProcess).into_iter().collect()),
        ("aidl", registry_names(catalog, HalFormat::FlatRpc)),
        ("native", registry_names(catalog, HalFormat::NativeLib)),
    ];
    for (heading, names) in &sections {
        if names.is_empty() {
            continue;
        }
        println!();
        println!("  {} ({}):", heading, names.len());
        for name in names {
            println!("    {}", name);
        }
    }

    if !catalog.issues.is_empty() {
        println!();
        println!("  Excluded entries ({}):", catalog.issues.len());
        for issue in &catalog.issues {
            println!("    {}: {}", issue.subject, issue.error);
        }
    }
}
