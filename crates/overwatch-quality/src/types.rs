use crate::config::QualityConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Area of concern a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    StaticAnalysis,
    Architecture,
    Performance,
    Security,
    DomainData,
    TestCoverage,
    Custom,
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckCategory::StaticAnalysis => write!(f, "static_analysis"),
            CheckCategory::Architecture => write!(f, "architecture"),
            CheckCategory::Performance => write!(f, "performance"),
            CheckCategory::Security => write!(f, "security"),
            CheckCategory::DomainData => write!(f, "domain_data"),
            CheckCategory::TestCoverage => write!(f, "test_coverage"),
            CheckCategory::Custom => write!(f, "custom"),
        }
    }
}

/// How much a failed check matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl CheckSeverity {
    /// Fixed weight in the overall score.
    pub fn weight(self) -> f64 {
        match self {
            CheckSeverity::Critical => 1.0,
            CheckSeverity::Error => 0.8,
            CheckSeverity::Warning => 0.6,
            CheckSeverity::Info => 0.2,
        }
    }

    /// Failed checks of this severity block the gate.
    pub fn is_blocking(self) -> bool {
        matches!(self, CheckSeverity::Critical | CheckSeverity::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// The check did not run (input not reported); excluded from the score.
    Skipped,
}

/// One result produced by a checker. Read-only after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub category: CheckCategory,
    pub severity: CheckSeverity,
    pub status: CheckStatus,
    pub score: f64,
    pub detail: String,
    pub fix_suggestion: Option<String>,
}

impl QualityCheck {
    /// A passing check with full score.
    pub fn passed(
        name: impl Into<String>,
        category: CheckCategory,
        severity: CheckSeverity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            severity,
            status: CheckStatus::Passed,
            score: 1.0,
            detail: detail.into(),
            fix_suggestion: None,
        }
    }

    /// A failing check with a partial score.
    pub fn failed(
        name: impl Into<String>,
        category: CheckCategory,
        severity: CheckSeverity,
        score: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            severity,
            status: CheckStatus::Failed,
            score,
            detail: detail.into(),
            fix_suggestion: None,
        }
    }

    /// A check that could not run.
    pub fn skipped(
        name: impl Into<String>,
        category: CheckCategory,
        severity: CheckSeverity,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            severity,
            status: CheckStatus::Skipped,
            score: 0.0,
            detail: detail.into(),
            fix_suggestion: None,
        }
    }

    pub fn with_fix(mut self, suggestion: impl Into<String>) -> Self {
        self.fix_suggestion = Some(suggestion.into());
        self
    }

    /// Failed with a blocking severity.
    pub fn is_blocker(&self) -> bool {
        self.status == CheckStatus::Failed && self.severity.is_blocking()
    }

    /// Failed with warning severity.
    pub fn is_suggestion(&self) -> bool {
        self.status == CheckStatus::Failed && self.severity == CheckSeverity::Warning
    }
}

/// Coarse classification of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    ApprovedWithSuggestions,
    RequiresRevision,
    Blocked,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "approved"),
            Verdict::ApprovedWithSuggestions => write!(f, "approved_with_suggestions"),
            Verdict::RequiresRevision => write!(f, "requires_revision"),
            Verdict::Blocked => write!(f, "blocked"),
        }
    }
}

/// Aggregate judgment over a list of checks. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateResult {
    pub overall_score: f64,
    pub verdict: Verdict,
    pub checks: Vec<QualityCheck>,
    pub auto_merge_eligible: bool,
    /// Failed Critical/Error checks.
    pub blockers: Vec<QualityCheck>,
    /// Failed Warning checks.
    pub suggestions: Vec<QualityCheck>,
    /// Triage estimate only; never used to derive the verdict.
    pub estimated_remediation_minutes: u32,
    pub evaluated_at: DateTime<Utc>,
}

impl QualityGateResult {
    /// Derive the result from a list of checks. Pure: the same checks and
    /// policy always give the same score and verdict.
    pub fn from_checks(
        checks: Vec<QualityCheck>,
        config: &QualityConfig,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let overall_score = weighted_score(&checks);
        let blockers: Vec<QualityCheck> =
            checks.iter().filter(|c| c.is_blocker()).cloned().collect();
        let suggestions: Vec<QualityCheck> =
            checks.iter().filter(|c| c.is_suggestion()).cloned().collect();

        let verdict = if !blockers.is_empty() {
            Verdict::Blocked
        } else if overall_score >= config.approve_threshold {
            Verdict::Approved
        } else if overall_score >= config.suggestions_threshold {
            Verdict::ApprovedWithSuggestions
        } else {
            Verdict::RequiresRevision
        };

        let estimated_remediation_minutes = config.minutes_per_blocker
            * blockers.len() as u32
            + config.minutes_per_suggestion * suggestions.len() as u32;

        Self {
            overall_score,
            verdict,
            auto_merge_eligible: verdict == Verdict::Approved,
            checks,
            blockers,
            suggestions,
            estimated_remediation_minutes,
            evaluated_at,
        }
    }

    /// Whether the gate lets the task complete.
    pub fn passed(&self) -> bool {
        self.verdict != Verdict::Blocked
    }

    /// One-paragraph summary for operator messages.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "verdict {} with score {:.2} across {} checks",
            self.verdict,
            self.overall_score,
            self.checks.len()
        );
        if !self.blockers.is_empty() {
            let names: Vec<&str> = self.blockers.iter().map(|c| c.name.as_str()).collect();
            text.push_str(&format!("; blockers: {}", names.join(", ")));
        }
        if !self.suggestions.is_empty() {
            let names: Vec<&str> = self.suggestions.iter().map(|c| c.name.as_str()).collect();
            text.push_str(&format!("; suggestions: {}", names.join(", ")));
        }
        if self.estimated_remediation_minutes > 0 {
            text.push_str(&format!(
                "; estimated remediation {} min",
                self.estimated_remediation_minutes
            ));
        }
        text
    }
}

/// Severity-weighted mean of the scores of checks that actually ran.
pub fn weighted_score(checks: &[QualityCheck]) -> f64 {
    let (weighted, total) = checks
        .iter()
        .filter(|c| c.status != CheckStatus::Skipped)
        .fold((0.0, 0.0), |(sum, weights), c| {
            let w = c.severity.weight();
            (sum + w * c.score, weights + w)
        });
    if total == 0.0 {
        0.0
    } else {
        overwatch_core::clamp_unit(weighted / total)
    }
}
