//! VerificationReport: aggregated verdicts from every check that ran.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use vintf_registry::RegistryError;

/// Severity of a verdict. Only `Failure` affects the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Failure,
}

/// What a check concluded about one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Satisfied,
    Skipped,
    Missing,
    MissingFromManifest,
    MissingFromRegistry,
    DeprecatedWithoutSuperseder,
    HashUnrecognized,
    VersionMismatch,
    PartitionMismatch,
    TransportMismatch,
    PassthroughNotAllowed,
    Incompatible,
    TimedOut,
    /// The registry errored for this subject only.
    LookupFailed,
    Structural,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerdictKind::Satisfied => "satisfied",
            VerdictKind::Skipped => "skipped",
            VerdictKind::Missing => "missing",
            VerdictKind::MissingFromManifest => "missing from manifest",
            VerdictKind::MissingFromRegistry => "missing from registry",
            VerdictKind::DeprecatedWithoutSuperseder => "deprecated without superseder",
            VerdictKind::HashUnrecognized => "hash unrecognized",
            VerdictKind::VersionMismatch => "version mismatch",
            VerdictKind::PartitionMismatch => "partition mismatch",
            VerdictKind::TransportMismatch => "transport mismatch",
            VerdictKind::PassthroughNotAllowed => "passthrough not allowed",
            VerdictKind::Incompatible => "incompatible",
            VerdictKind::TimedOut => "timed out",
            VerdictKind::LookupFailed => "lookup failed",
            VerdictKind::Structural => "structural",
        };
        f.write_str(name)
    }
}

/// One check's conclusion about one subject (an instance, a name, a document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub check: String,
    pub subject: String,
    pub kind: VerdictKind,
    pub severity: Severity,
    pub message: String,
}

impl Verdict {
    pub fn new(
        check: &str,
        subject: impl Into<String>,
        kind: VerdictKind,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Verdict {
            check: check.to_string(),
            subject: subject.into(),
            kind,
            severity,
            message: message.into(),
        }
    }

    pub fn satisfied(check: &str, subject: impl Into<String>) -> Self {
        Verdict::new(check, subject, VerdictKind::Satisfied, Severity::Info, String::new())
    }

    pub fn skipped(check: &str, subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Verdict::new(check, subject, VerdictKind::Skipped, Severity::Info, reason)
    }

    pub fn failure(
        check: &str,
        subject: impl Into<String>,
        kind: VerdictKind,
        message: impl Into<String>,
    ) -> Self {
        Verdict::new(check, subject, kind, Severity::Failure, message)
    }

    pub fn warning(
        check: &str,
        subject: impl Into<String>,
        kind: VerdictKind,
        message: impl Into<String>,
    ) -> Self {
        Verdict::new(check, subject, kind, Severity::Warning, message)
    }

    /// A registry error confined to one subject; siblings are still evaluated.
    pub fn lookup_failed(check: &str, subject: impl Into<String>, error: &RegistryError) -> Self {
        let subject = subject.into();
        tracing::warn!(check, %subject, %error, "registry lookup failed");
        Verdict::failure(check, subject, VerdictKind::LookupFailed, error.to_string())
    }

    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match (self.severity, self.kind) {
            (_, VerdictKind::Satisfied) => "PASS",
            (_, VerdictKind::Skipped) => "SKIP",
            (Severity::Failure, _) => "FAIL",
            (Severity::Warning, _) => "WARN",
            (Severity::Info, _) => "INFO",
        };
        write!(f, "[{}] {}: {}", tag, self.check, self.subject)?;
        if !self.message.is_empty() {
            write!(f, " ({}: {})", self.kind, self.message)?;
        }
        Ok(())
    }
}

/// Counts per outcome, for summary display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub satisfied: usize,
    pub skipped: usize,
    pub warnings: usize,
    pub failures: usize,
}

/// Every verdict produced by a run, in check order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub checks_run: Vec<String>,
    pub verdicts: Vec<Verdict>,
}

impl VerificationReport {
    pub fn new() -> Self {
        VerificationReport::default()
    }

    pub fn record(&mut self, check: &str, verdicts: Vec<Verdict>) {
        self.checks_run.push(check.to_string());
        self.verdicts.extend(verdicts);
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| v.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn of_kind(&self, kind: VerdictKind) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(move |v| v.kind == kind)
    }

    pub fn for_check<'a>(&'a self, check: &'a str) -> impl Iterator<Item = &'a Verdict> + 'a {
        self.verdicts.iter().filter(move |v| v.check == check)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for verdict in &self.verdicts {
            match (verdict.kind, verdict.severity) {
                (VerdictKind::Satisfied, _) => summary.satisfied += 1,
                (VerdictKind::Skipped, _) => summary.skipped += 1,
                (_, Severity::Failure) => summary.failures += 1,
                (_, Severity::Warning) => summary.warnings += 1,
                (_, Severity::Info) => {}
            }
        }
        summary
    }

    /// Failure counts keyed by check name.
    pub fn failures_by_check(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for verdict in self.failures() {
            *counts.entry(verdict.check.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
