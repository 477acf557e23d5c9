use overwatch_core::{OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};

/// Limits applied by the built-in checkers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinThresholds {
    pub max_lint_warnings: u64,
    pub max_cyclomatic_complexity: u64,
    pub latency_budget_ms: f64,
    pub max_regression_pct: f64,
    pub min_coverage: f64,
    pub target_coverage: f64,
}

impl Default for BuiltinThresholds {
    fn default() -> Self {
        Self {
            max_lint_warnings: 10,
            max_cyclomatic_complexity: 15,
            latency_budget_ms: 500.0,
            max_regression_pct: 10.0,
            min_coverage: 0.6,
            target_coverage: 0.8,
        }
    }
}

/// Quality gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Score at or above which an unblocked result is `Approved`.
    pub approve_threshold: f64,
    /// Score at or above which an unblocked result is `ApprovedWithSuggestions`.
    pub suggestions_threshold: f64,
    pub minutes_per_blocker: u32,
    pub minutes_per_suggestion: u32,
    pub thresholds: BuiltinThresholds,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            approve_threshold: 0.95,
            suggestions_threshold: 0.85,
            minutes_per_blocker: 30,
            minutes_per_suggestion: 10,
            thresholds: BuiltinThresholds::default(),
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> OverwatchResult<()> {
        for (name, v) in [
            ("approve_threshold", self.approve_threshold),
            ("suggestions_threshold", self.suggestions_threshold),
            ("thresholds.min_coverage", self.thresholds.min_coverage),
            ("thresholds.target_coverage", self.thresholds.target_coverage),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(OverwatchError::Config(format!(
                    "quality.{name} must be within [0, 1], got {v}"
                )));
            }
        }
        if self.suggestions_threshold > self.approve_threshold {
            return Err(OverwatchError::Config(
                "quality.suggestions_threshold must not exceed approve_threshold".into(),
            ));
        }
        if self.thresholds.min_coverage > self.thresholds.target_coverage {
            return Err(OverwatchError::Config(
                "quality.thresholds.min_coverage must not exceed target_coverage".into(),
            ));
        }
        Ok(())
    }
}
