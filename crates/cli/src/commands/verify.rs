use std::path::Path;
use std::process;

use vintf_analyze::{VerificationReport, VerifyContext, CHECK_NAMES};

use super::load_snapshot;
use crate::config::VerifyConfig;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_verify(
    snapshot_path: &Path,
    checks: Option<&str>,
    config_path: Option<&Path>,
    timeout_multiplier: Option<u32>,
    output: OutputFormat,
    quiet: bool,
) {
    // Step 1: Load inputs
    let snapshot = load_snapshot(snapshot_path, output, quiet);
    let config = match config_path {
        Some(path) => match VerifyConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                report_error(&e.to_string(), output, quiet);
                process::exit(1);
            }
        },
        None => VerifyConfig::default(),
    };

    // Step 2: Parse check selection
    let selected: Option<Vec<&str>> = checks.map(|c| {
        let selected: Vec<&str> = c
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        for s in &selected {
            if !CHECK_NAMES.contains(s) {
                let msg = format!("invalid check '{}'. Valid: {}", s, CHECK_NAMES.join(", "));
                report_error(&msg, output, quiet);
                process::exit(1);
            }
        }
        selected
    });

    // Step 3: Run checks
    let multiplier = timeout_multiplier.or(config.lookup.timeout_multiplier);
    let ctx = VerifyContext::from_snapshot(snapshot, config.policy, config.lookup.base(), multiplier);
    tracing::debug!(timeout = ?ctx.lookup.config().timeout(), "lookup timeout");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start async runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let report = runtime.block_on(async {
        match &selected {
            None => vintf_analyze::verify(&ctx).await,
            Some(names) => vintf_analyze::verify_selected(&ctx, names).await,
        }
    });
    let report = match report {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("verification error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    // Step 4: Format output
    if !quiet {
        match output {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&report)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
                println!("{}", json);
            }
            OutputFormat::Text => print_report(&report),
        }
    }

    if report.has_failures() {
        process::exit(1);
    }
}

fn print_report(report: &VerificationReport) {
    println!("VINTF Verification Report");
    println!("=========================");
    println!();

    for check in &report.checks_run {
        println!("  {}", check);
        for verdict in report.for_check(check) {
            println!("    {}", verdict);
        }
    }

    let summary = report.summary();
    println!();
    println!(
        "{} checks run: {} satisfied, {} skipped, {} warnings, {} failures",
        report.checks_run.len(),
        summary.satisfied,
        summary.skipped,
        summary.warnings,
        summary.failures
    );

    let by_check = report.failures_by_check();
    if !by_check.is_empty() {
        println!();
        println!("Failing checks:");
        for (check, count) in by_check {
            println!("  {}: {}", check, count);
        }
    }
}
