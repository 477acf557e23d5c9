use crate::builtin::{
    ArchitectureChecker, DomainDataChecker, PerformanceChecker, SecurityChecker,
    StaticAnalysisChecker, TestCoverageChecker,
};
use crate::checker::{CheckerPredicate, QualityChecker};
use crate::config::QualityConfig;
use crate::types::{QualityCheck, QualityGateResult};
use overwatch_core::{Clock, OverwatchError, OverwatchResult, SystemClock};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

struct RegisteredChecker {
    checker: Arc<dyn QualityChecker>,
    predicate: CheckerPredicate,
}

/// Ordered set of independent checkers plus the verdict policy.
pub struct QualityGatePipeline {
    config: QualityConfig,
    checkers: Vec<RegisteredChecker>,
    names: HashSet<String>,
    clock: Arc<dyn Clock>,
}

impl QualityGatePipeline {
    /// Create an empty pipeline.
    pub fn new(config: QualityConfig) -> OverwatchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            checkers: Vec::new(),
            names: HashSet::new(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Create a pipeline with the six built-in checkers registered in order:
    /// static analysis, architecture, performance, security, domain data
    /// (only for domain-specific contexts) and test coverage.
    pub fn with_builtin_checkers(config: QualityConfig) -> OverwatchResult<Self> {
        let thresholds = config.thresholds.clone();
        let mut pipeline = Self::new(config)?;
        pipeline.register(
            Arc::new(StaticAnalysisChecker::new(thresholds.clone())),
            CheckerPredicate::Always,
        )?;
        pipeline.register(
            Arc::new(ArchitectureChecker::new(thresholds.clone())),
            CheckerPredicate::Always,
        )?;
        pipeline.register(
            Arc::new(PerformanceChecker::new(thresholds.clone())),
            CheckerPredicate::Always,
        )?;
        pipeline.register(Arc::new(SecurityChecker), CheckerPredicate::Always)?;
        pipeline.register(
            Arc::new(DomainDataChecker),
            CheckerPredicate::flag("domain_specific"),
        )?;
        pipeline.register(
            Arc::new(TestCoverageChecker::new(thresholds)),
            CheckerPredicate::Always,
        )?;
        Ok(pipeline)
    }

    /// Use an injected clock for result timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append a checker. Names must be unique and non-empty.
    pub fn register(
        &mut self,
        checker: Arc<dyn QualityChecker>,
        predicate: CheckerPredicate,
    ) -> OverwatchResult<()> {
        let name = checker.name().to_string();
        if name.trim().is_empty() {
            return Err(OverwatchError::CheckerMisconfiguration(
                "checker registered with an empty name".into(),
            ));
        }
        predicate.validate()?;
        if !self.names.insert(name.clone()) {
            return Err(OverwatchError::CheckerMisconfiguration(format!(
                "checker '{name}' registered twice"
            )));
        }
        debug!(checker = %name, category = %checker.category(), "Quality checker registered");
        self.checkers.push(RegisteredChecker { checker, predicate });
        Ok(())
    }

    /// Startup validation: a gate with no checkers can never approve anything.
    pub fn validate(&self) -> OverwatchResult<()> {
        if self.checkers.is_empty() {
            return Err(OverwatchError::CheckerMisconfiguration(
                "quality gate has no registered checkers".into(),
            ));
        }
        Ok(())
    }

    /// Names of registered checkers, in run order.
    pub fn checker_names(&self) -> Vec<&str> {
        self.checkers.iter().map(|c| c.checker.name()).collect()
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Run every applicable checker against `context` and derive the verdict.
    ///
    /// Fails only when a checker produces an impossible result (a score that
    /// is not a finite number in `[0, 1]`).
    pub async fn evaluate(&self, context: &Value) -> OverwatchResult<QualityGateResult> {
        let mut checks: Vec<QualityCheck> = Vec::new();

        for registered in &self.checkers {
            if !registered.predicate.matches(context) {
                debug!(checker = %registered.checker.name(), "Checker not applicable");
                continue;
            }
            let produced = registered.checker.check(context).await;
            for check in &produced {
                if !check.score.is_finite() || !(0.0..=1.0).contains(&check.score) {
                    return Err(OverwatchError::CheckerMisconfiguration(format!(
                        "checker '{}' produced check '{}' with score {} outside [0, 1]",
                        registered.checker.name(),
                        check.name,
                        check.score
                    )));
                }
            }
            checks.extend(produced);
        }

        let result = QualityGateResult::from_checks(checks, &self.config, self.clock.now());
        info!(
            verdict = %result.verdict,
            score = result.overall_score,
            checks = result.checks.len(),
            blockers = result.blockers.len(),
            "Quality gate evaluated"
        );
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{CheckCategory, CheckSeverity, CheckStatus, Verdict};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedChecker {
        name: &'static str,
        checks: Vec<QualityCheck>,
    }

    #[async_trait]
    impl QualityChecker for FixedChecker {
        fn name(&self) -> &str {
            self.name
        }

        fn category(&self) -> CheckCategory {
            CheckCategory::Custom
        }

        async fn check(&self, _context: &Value) -> Vec<QualityCheck> {
            self.checks.clone()
        }
    }

    fn fixed(name: &'static str, checks: Vec<QualityCheck>) -> Arc<dyn QualityChecker> {
        Arc::new(FixedChecker { name, checks })
    }

    fn pass(name: &str) -> QualityCheck {
        QualityCheck::passed(name, CheckCategory::Custom, CheckSeverity::Info, "ok")
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let mut pipeline = QualityGatePipeline::new(QualityConfig::default()).unwrap();
        pipeline.register(fixed("a", vec![]), CheckerPredicate::Always).unwrap();
        let err = pipeline.register(fixed("a", vec![]), CheckerPredicate::Always);
        assert!(matches!(err, Err(OverwatchError::CheckerMisconfiguration(_))));
    }

    #[tokio::test]
    async fn test_empty_pipeline_invalid() {
        let pipeline = QualityGatePipeline::new(QualityConfig::default()).unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[tokio::test]
    async fn test_predicates_select_checkers() {
        let mut pipeline = QualityGatePipeline::new(QualityConfig::default()).unwrap();
        pipeline
            .register(fixed("general", vec![pass("general")]), CheckerPredicate::Always)
            .unwrap();
        pipeline
            .register(
                fixed(
                    "domain",
                    vec![QualityCheck::failed(
                        "geometry",
                        CheckCategory::DomainData,
                        CheckSeverity::Error,
                        0.0,
                        "self-intersecting polygon",
                    )],
                ),
                CheckerPredicate::flag("domain_specific"),
            )
            .unwrap();

        let plain = pipeline.evaluate(&json!({})).await.unwrap();
        assert_eq!(plain.checks.len(), 1);
        assert_eq!(plain.verdict, Verdict::Approved);

        let domain = pipeline
            .evaluate(&json!({"flags": {"domain_specific": true}}))
            .await
            .unwrap();
        assert_eq!(domain.checks.len(), 2);
        assert_eq!(domain.verdict, Verdict::Blocked);
        assert_eq!(domain.blockers[0].name, "geometry");
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_misconfiguration() {
        let mut pipeline = QualityGatePipeline::new(QualityConfig::default()).unwrap();
        let mut bad = pass("bad");
        bad.score = 1.5;
        pipeline.register(fixed("bad", vec![bad]), CheckerPredicate::Always).unwrap();
        let err = pipeline.evaluate(&json!({})).await;
        assert!(matches!(err, Err(OverwatchError::CheckerMisconfiguration(_))));
    }

    #[tokio::test]
    async fn test_builtin_registration_order() {
        let pipeline = QualityGatePipeline::with_builtin_checkers(QualityConfig::default()).unwrap();
        assert_eq!(
            pipeline.checker_names(),
            vec![
                "static_analysis",
                "architecture",
                "performance",
                "security",
                "domain_data_compliance",
                "test_coverage"
            ]
        );
        assert!(pipeline.validate().is_ok());
    }

    #[tokio::test]
    async fn test_builtins_with_no_reports_skip_everything() {
        let pipeline = QualityGatePipeline::with_builtin_checkers(QualityConfig::default()).unwrap();
        let result = pipeline.evaluate(&json!({})).await.unwrap();
        assert!(result.checks.iter().all(|c| c.status == CheckStatus::Skipped));
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.verdict, Verdict::RequiresRevision);
    }

    #[tokio::test]
    async fn test_builtins_handle_extreme_counts() {
        let pipeline = QualityGatePipeline::with_builtin_checkers(QualityConfig::default()).unwrap();
        let result = pipeline
            .evaluate(&json!({"quality": {"static": {"errors": u64::MAX}}}))
            .await
            .unwrap();
        let errors = result.checks.iter().find(|c| c.name == "lint_errors").unwrap();
        assert_eq!(errors.status, CheckStatus::Failed);
        assert!((0.0..=1.0).contains(&errors.score));
        assert_eq!(result.verdict, Verdict::Blocked);
    }
}
