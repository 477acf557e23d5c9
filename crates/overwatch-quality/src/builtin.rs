//! Built-in checkers.
//!
//! Each checker reads a report section from `context.quality` that an
//! upstream collaborator (linter, test runner, scanner) attached to the task.
//! A field that was not reported produces a `Skipped` check.

use crate::checker::QualityChecker;
use crate::config::BuiltinThresholds;
use crate::types::{CheckCategory, CheckSeverity, QualityCheck};
use async_trait::async_trait;
use serde_json::Value;

fn count_limit(
    context: &Value,
    pointer: &str,
    name: &str,
    category: CheckCategory,
    severity: CheckSeverity,
    limit: u64,
    fix: &str,
) -> QualityCheck {
    match context.pointer(pointer).and_then(Value::as_u64) {
        None => QualityCheck::skipped(name, category, severity, format!("{pointer} not reported")),
        Some(found) if found <= limit => {
            QualityCheck::passed(name, category, severity, format!("{found} found (limit {limit})"))
        }
        Some(found) => QualityCheck::failed(
            name,
            category,
            severity,
            (limit as f64 + 1.0) / (found as f64 + 1.0),
            format!("{found} found (limit {limit})"),
        )
        .with_fix(fix),
    }
}

fn measure_budget(
    context: &Value,
    pointer: &str,
    name: &str,
    category: CheckCategory,
    severity: CheckSeverity,
    budget: f64,
    fix: &str,
) -> QualityCheck {
    match context.pointer(pointer).and_then(Value::as_f64) {
        None => QualityCheck::skipped(name, category, severity, format!("{pointer} not reported")),
        Some(measured) if measured <= budget => QualityCheck::passed(
            name,
            category,
            severity,
            format!("{measured} within budget {budget}"),
        ),
        Some(measured) => QualityCheck::failed(
            name,
            category,
            severity,
            overwatch_core::clamp_unit(budget / measured),
            format!("{measured} exceeds budget {budget}"),
        )
        .with_fix(fix),
    }
}

/// Compiler and linter findings from `quality.static`.
pub struct StaticAnalysisChecker {
    thresholds: BuiltinThresholds,
}

impl StaticAnalysisChecker {
    pub fn new(thresholds: BuiltinThresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl QualityChecker for StaticAnalysisChecker {
    fn name(&self) -> &str {
        "static_analysis"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::StaticAnalysis
    }

    async fn check(&self, context: &Value) -> Vec<QualityCheck> {
        vec![
            count_limit(
                context,
                "/quality/static/errors",
                "lint_errors",
                self.category(),
                CheckSeverity::Error,
                0,
                "Fix all compiler and linter errors",
            ),
            count_limit(
                context,
                "/quality/static/warnings",
                "lint_warnings",
                self.category(),
                CheckSeverity::Warning,
                self.thresholds.max_lint_warnings,
                "Address linter warnings or document the allowed ones",
            ),
        ]
    }
}

/// Layering and complexity findings from `quality.architecture`.
pub struct ArchitectureChecker {
    thresholds: BuiltinThresholds,
}

impl ArchitectureChecker {
    pub fn new(thresholds: BuiltinThresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl QualityChecker for ArchitectureChecker {
    fn name(&self) -> &str {
        "architecture"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Architecture
    }

    async fn check(&self, context: &Value) -> Vec<QualityCheck> {
        vec![
            count_limit(
                context,
                "/quality/architecture/layer_violations",
                "layer_violations",
                self.category(),
                CheckSeverity::Error,
                0,
                "Route the dependency through the owning layer's public interface",
            ),
            count_limit(
                context,
                "/quality/architecture/max_complexity",
                "cyclomatic_complexity",
                self.category(),
                CheckSeverity::Warning,
                self.thresholds.max_cyclomatic_complexity,
                "Split the most complex function into smaller units",
            ),
        ]
    }
}

/// Latency and regression measurements from `quality.performance`.
pub struct PerformanceChecker {
    thresholds: BuiltinThresholds,
}

impl PerformanceChecker {
    pub fn new(thresholds: BuiltinThresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl QualityChecker for PerformanceChecker {
    fn name(&self) -> &str {
        "performance"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Performance
    }

    async fn check(&self, context: &Value) -> Vec<QualityCheck> {
        vec![
            measure_budget(
                context,
                "/quality/performance/p95_latency_ms",
                "p95_latency",
                self.category(),
                CheckSeverity::Warning,
                self.thresholds.latency_budget_ms,
                "Profile the hot path and add an index or cache",
            ),
            measure_budget(
                context,
                "/quality/performance/regression_pct",
                "performance_regression",
                self.category(),
                CheckSeverity::Error,
                self.thresholds.max_regression_pct,
                "Compare benchmark runs and revert the regressing change",
            ),
        ]
    }
}

/// Secret and vulnerability scan results from `quality.security`.
pub struct SecurityChecker;

#[async_trait]
impl QualityChecker for SecurityChecker {
    fn name(&self) -> &str {
        "security"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Security
    }

    async fn check(&self, context: &Value) -> Vec<QualityCheck> {
        vec![
            count_limit(
                context,
                "/quality/security/secrets",
                "exposed_secrets",
                self.category(),
                CheckSeverity::Critical,
                0,
                "Remove the secret from the change and rotate it",
            ),
            count_limit(
                context,
                "/quality/security/vulnerabilities/critical",
                "critical_vulnerabilities",
                self.category(),
                CheckSeverity::Critical,
                0,
                "Upgrade or replace the vulnerable dependency",
            ),
            count_limit(
                context,
                "/quality/security/vulnerabilities/high",
                "high_vulnerabilities",
                self.category(),
                CheckSeverity::Error,
                0,
                "Upgrade or replace the vulnerable dependency",
            ),
            count_limit(
                context,
                "/quality/security/vulnerabilities/medium",
                "medium_vulnerabilities",
                self.category(),
                CheckSeverity::Warning,
                0,
                "Schedule a dependency upgrade",
            ),
        ]
    }
}

/// Spatial data integrity findings from `quality.domain`.
///
/// Registered behind the `domain_specific` context flag.
pub struct DomainDataChecker;

#[async_trait]
impl QualityChecker for DomainDataChecker {
    fn name(&self) -> &str {
        "domain_data_compliance"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::DomainData
    }

    async fn check(&self, context: &Value) -> Vec<QualityCheck> {
        let completeness = match context
            .pointer("/quality/domain/completeness")
            .and_then(Value::as_f64)
        {
            None => QualityCheck::skipped(
                "attribute_completeness",
                self.category(),
                CheckSeverity::Info,
                "/quality/domain/completeness not reported",
            ),
            Some(ratio) if ratio >= 0.95 => QualityCheck::passed(
                "attribute_completeness",
                self.category(),
                CheckSeverity::Info,
                format!("{:.0}% of required attributes populated", ratio * 100.0),
            ),
            Some(ratio) => QualityCheck::failed(
                "attribute_completeness",
                self.category(),
                CheckSeverity::Info,
                overwatch_core::clamp_unit(ratio),
                format!("{:.0}% of required attributes populated", ratio * 100.0),
            )
            .with_fix("Backfill missing attributes from the source dataset"),
        };

        vec![
            count_limit(
                context,
                "/quality/domain/invalid_geometries",
                "geometry_validity",
                self.category(),
                CheckSeverity::Error,
                0,
                "Repair invalid geometries before import",
            ),
            count_limit(
                context,
                "/quality/domain/missing_crs",
                "coordinate_reference",
                self.category(),
                CheckSeverity::Warning,
                0,
                "Declare the coordinate reference system for every layer",
            ),
            count_limit(
                context,
                "/quality/domain/topology_errors",
                "topology",
                self.category(),
                CheckSeverity::Warning,
                0,
                "Snap shared boundaries and remove slivers",
            ),
            completeness,
        ]
    }
}

/// Test-run results from `quality.tests`.
pub struct TestCoverageChecker {
    thresholds: BuiltinThresholds,
}

impl TestCoverageChecker {
    pub fn new(thresholds: BuiltinThresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl QualityChecker for TestCoverageChecker {
    fn name(&self) -> &str {
        "test_coverage"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::TestCoverage
    }

    async fn check(&self, context: &Value) -> Vec<QualityCheck> {
        let min = self.thresholds.min_coverage;
        let target = self.thresholds.target_coverage;
        let coverage = match context.pointer("/quality/tests/coverage").and_then(Value::as_f64) {
            None => QualityCheck::skipped(
                "line_coverage",
                self.category(),
                CheckSeverity::Error,
                "/quality/tests/coverage not reported",
            ),
            Some(c) if c < min => QualityCheck::failed(
                "line_coverage",
                self.category(),
                CheckSeverity::Error,
                overwatch_core::clamp_unit(c),
                format!("coverage {:.0}% below minimum {:.0}%", c * 100.0, min * 100.0),
            )
            .with_fix("Add tests for the uncovered branches"),
            Some(c) if c < target => QualityCheck::failed(
                "line_coverage",
                self.category(),
                CheckSeverity::Warning,
                overwatch_core::clamp_unit(c / target),
                format!("coverage {:.0}% below target {:.0}%", c * 100.0, target * 100.0),
            )
            .with_fix("Add tests for the uncovered branches"),
            Some(c) => QualityCheck::passed(
                "line_coverage",
                self.category(),
                CheckSeverity::Error,
                format!("coverage {:.0}%", c * 100.0),
            ),
        };

        vec![
            coverage,
            count_limit(
                context,
                "/quality/tests/failed",
                "failing_tests",
                self.category(),
                CheckSeverity::Error,
                0,
                "Fix or quarantine the failing tests",
            ),
        ]
    }
}
