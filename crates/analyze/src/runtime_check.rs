//! Runtime facts against a matrix's kernel, sepolicy and AVB requirements.

use std::fmt;

use vintf_core::{KernelRequirement, KernelVersion, MatrixDocument, RuntimeFacts, Version};

use crate::context::VerifyContext;
use crate::error::VerifyError;
use crate::report::{Verdict, VerdictKind};

pub const RUNTIME_CHECK: &str = "runtime";
pub const KERNEL_CHECK: &str = "kernel";
pub const MAINLINE_CHECK: &str = "mainline";

/// Which runtime areas to evaluate. Each is independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckFlags {
    pub kernel_version: bool,
    pub kernel_config: bool,
    pub sepolicy: bool,
    pub avb: bool,
}

impl CheckFlags {
    pub const ALL: CheckFlags = CheckFlags {
        kernel_version: true,
        kernel_config: true,
        sepolicy: true,
        avb: true,
    };

    pub const KERNEL_ONLY: CheckFlags = CheckFlags {
        kernel_version: true,
        kernel_config: true,
        sepolicy: false,
        avb: false,
    };

    pub fn without_avb(self) -> Self {
        CheckFlags { avb: false, ..self }
    }

    pub fn without_sepolicy(self) -> Self {
        CheckFlags {
            sepolicy: false,
            ..self
        }
    }
}

impl Default for CheckFlags {
    fn default() -> Self {
        CheckFlags::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeArea {
    KernelVersion,
    KernelConfig,
    Sepolicy,
    Avb,
}

impl fmt::Display for RuntimeArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeArea::KernelVersion => write!(f, "kernel version"),
            RuntimeArea::KernelConfig => write!(f, "kernel config"),
            RuntimeArea::Sepolicy => write!(f, "sepolicy"),
            RuntimeArea::Avb => write!(f, "avb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMismatch {
    pub area: RuntimeArea,
    pub message: String,
}

impl RuntimeMismatch {
    fn new(area: RuntimeArea, message: impl Into<String>) -> Self {
        RuntimeMismatch {
            area,
            message: message.into(),
        }
    }
}

/// Every mismatch between `facts` and `matrix` in the areas `flags` enables.
pub fn check_runtime(facts: &RuntimeFacts, matrix: &MatrixDocument, flags: CheckFlags) -> Vec<RuntimeMismatch> {
    let mut mismatches = Vec::new();
    if flags.kernel_version || flags.kernel_config {
        check_kernel(facts, &matrix.kernel, flags, &mut mismatches);
    }
    if flags.sepolicy {
        if let Some(required) = &matrix.sepolicy {
            match facts.kernel_sepolicy_version {
                Some(actual) if actual >= required.kernel_sepolicy_version => {}
                Some(actual) => mismatches.push(RuntimeMismatch::new(
                    RuntimeArea::Sepolicy,
                    format!(
                        "kernel sepolicy version {} is below the required {}",
                        actual, required.kernel_sepolicy_version
                    ),
                )),
                None => mismatches.push(RuntimeMismatch::new(
                    RuntimeArea::Sepolicy,
                    "kernel sepolicy version is unknown",
                )),
            }
        }
    }
    if flags.avb {
        if let Some(required) = &matrix.avb {
            check_avb(facts, &required.vbmeta_version, &mut mismatches);
        }
    }
    mismatches
}

/// Matrix kernel entries applying to `running`: same line, minor revision at most the running one.
fn applicable<'a>(
    running: &KernelVersion,
    kernels: &'a [KernelRequirement],
    mismatches: &mut Vec<RuntimeMismatch>,
) -> Vec<&'a KernelRequirement> {
    let mut out = Vec::new();
    for req in kernels {
        match req.version.parse::<KernelVersion>() {
            Ok(v) if v.same_line(running) && v.minor_rev <= running.minor_rev => out.push(req),
            Ok(_) => {}
            Err(e) => mismatches.push(RuntimeMismatch::new(
                RuntimeArea::KernelVersion,
                format!("matrix kernel entry is malformed: {}", e),
            )),
        }
    }
    out
}

fn check_kernel(
    facts: &RuntimeFacts,
    kernels: &[KernelRequirement],
    flags: CheckFlags,
    mismatches: &mut Vec<RuntimeMismatch>,
) {
    if kernels.is_empty() {
        return;
    }
    let running = match facts.kernel() {
        Ok(k) => k,
        Err(e) => {
            mismatches.push(RuntimeMismatch::new(
                RuntimeArea::KernelVersion,
                format!("running kernel version is unreadable: {}", e),
            ));
            return;
        }
    };
    let matched = applicable(&running, kernels, mismatches);
    if matched.is_empty() {
        if flags.kernel_version {
            let supported: Vec<&str> = kernels.iter().map(|k| k.version.as_str()).collect();
            mismatches.push(RuntimeMismatch::new(
                RuntimeArea::KernelVersion,
                format!(
                    "kernel {} is not supported; the matrix lists {}",
                    running,
                    supported.join(", ")
                ),
            ));
        }
        return;
    }
    if !flags.kernel_config {
        return;
    }
    for req in matched {
        for (key, expected) in &req.configs {
            let actual = facts.kernel_config.get(key).map(String::as_str);
            let ok = match (expected.as_str(), actual) {
                ("n", None) => true,
                (expected, Some(actual)) => expected == actual,
                (_, None) => false,
            };
            if !ok {
                mismatches.push(RuntimeMismatch::new(
                    RuntimeArea::KernelConfig,
                    format!(
                        "{} must be {} (kernel {}), found {}",
                        key,
                        expected,
                        req.version,
                        actual.unwrap_or("<unset>")
                    ),
                ));
            }
        }
    }
}

fn check_avb(facts: &RuntimeFacts, required: &str, mismatches: &mut Vec<RuntimeMismatch>) {
    let required: Version = match required.parse() {
        Ok(v) => v,
        Err(e) => {
            mismatches.push(RuntimeMismatch::new(RuntimeArea::Avb, e.to_string()));
            return;
        }
    };
    let actual = facts.avb_version.as_deref().map(str::parse::<Version>);
    match actual {
        Some(Ok(actual)) if actual.minor_at_least(&required) => {}
        Some(Ok(actual)) => mismatches.push(RuntimeMismatch::new(
            RuntimeArea::Avb,
            format!("AVB version {} does not satisfy required {}", actual, required),
        )),
        Some(Err(e)) => mismatches.push(RuntimeMismatch::new(RuntimeArea::Avb, e.to_string())),
        None => mismatches.push(RuntimeMismatch::new(RuntimeArea::Avb, "AVB version is unknown")),
    }
}

// ──────────────────────────────────────────────
// Checks
// ──────────────────────────────────────────────

async fn run(ctx: &VerifyContext, check: &str, flags: CheckFlags) -> Result<Vec<Verdict>, VerifyError> {
    let facts = ctx.runtime.runtime_facts().await?;
    let matrix = ctx.matrices.framework_matrix().await?;
    let mismatches = check_runtime(&facts, &matrix, flags);
    if mismatches.is_empty() {
        return Ok(vec![Verdict::satisfied(check, "runtime info vs framework matrix")]);
    }
    Ok(mismatches
        .into_iter()
        .map(|m| Verdict::failure(check, m.area.to_string(), VerdictKind::Incompatible, m.message))
        .collect())
}

pub async fn check_runtime_info(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    run(ctx, RUNTIME_CHECK, CheckFlags::ALL).await
}

pub async fn check_kernel_info(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    run(ctx, KERNEL_CHECK, CheckFlags::KERNEL_ONLY).await
}

/// Mainline (upstream-tracking) kernels are for development only.
pub async fn check_mainline(ctx: &VerifyContext) -> Result<Vec<Verdict>, VerifyError> {
    let facts = ctx.runtime.runtime_facts().await?;
    let subject = format!("kernel {}", facts.os_release);
    if !facts.is_mainline_kernel() {
        return Ok(vec![Verdict::satisfied(MAINLINE_CHECK, subject)]);
    }
    let message = "mainline kernels are not supported on release builds";
    if ctx.properties.is_release() {
        Ok(vec![Verdict::failure(MAINLINE_CHECK, subject, VerdictKind::Incompatible, message)])
    } else {
        Ok(vec![Verdict::warning(MAINLINE_CHECK, subject, VerdictKind::Incompatible, message)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matrix() -> MatrixDocument {
        MatrixDocument::from_json(&json!({
            "type": "framework",
            "kernel": [
                {"version": "5.10.0", "configs": {"CONFIG_A": "y", "CONFIG_B": "n"}},
                {"version": "5.10.50", "configs": {"CONFIG_C": "m"}},
                {"version": "5.15.0", "configs": {"CONFIG_D": "y"}}
            ],
            "sepolicy": {"kernel_sepolicy_version": 30},
            "avb": {"vbmeta_version": "1.0"}
        }))
        .unwrap()
    }

    fn facts() -> RuntimeFacts {
        RuntimeFacts {
            kernel_version: "5.10.66-android12".to_string(),
            os_release: "5.10.66-android12".to_string(),
            kernel_config: [("CONFIG_A", "y"), ("CONFIG_C", "m")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            kernel_sepolicy_version: Some(30),
            avb_version: Some("1.2".to_string()),
        }
    }

    #[test]
    fn compatible_runtime_has_no_mismatches() {
        assert!(check_runtime(&facts(), &matrix(), CheckFlags::ALL).is_empty());
    }

    #[test]
    fn config_mismatches_are_enumerated() {
        let mut facts = facts();
        facts.kernel_config.insert("CONFIG_B".to_string(), "y".to_string());
        facts.kernel_config.remove("CONFIG_C");
        let mismatches = check_runtime(&facts, &matrix(), CheckFlags::ALL);
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches.iter().all(|m| m.area == RuntimeArea::KernelConfig));
    }

    #[test]
    fn unsupported_kernel_line() {
        let mut facts = facts();
        facts.kernel_version = "4.19.1".to_string();
        let mismatches = check_runtime(&facts, &matrix(), CheckFlags::KERNEL_ONLY);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].area, RuntimeArea::KernelVersion);
    }

    #[test]
    fn flags_toggle_areas_independently() {
        let mut facts = facts();
        facts.avb_version = Some("2.0".to_string());
        facts.kernel_sepolicy_version = Some(29);
        let all = check_runtime(&facts, &matrix(), CheckFlags::ALL);
        assert_eq!(all.len(), 2);
        let no_avb = check_runtime(&facts, &matrix(), CheckFlags::ALL.without_avb());
        assert_eq!(no_avb.len(), 1);
        assert_eq!(no_avb[0].area, RuntimeArea::Sepolicy);
        let kernel = check_runtime(&facts, &matrix(), CheckFlags::ALL.without_avb().without_sepolicy());
        assert!(kernel.is_empty());
    }

    #[test]
    fn missing_runtime_values_fail_their_area() {
        let mut facts = facts();
        facts.avb_version = None;
        facts.kernel_sepolicy_version = None;
        let areas: Vec<RuntimeArea> = check_runtime(&facts, &matrix(), CheckFlags::ALL)
            .into_iter()
            .map(|m| m.area)
            .collect();
        assert_eq!(areas, vec![RuntimeArea::Sepolicy, RuntimeArea::Avb]);
    }
}
