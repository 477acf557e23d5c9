use overwatch_core::{OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};

use crate::signals::Signals;
use crate::types::DecisionAction;

/// Weights of the confidence factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub historical_similarity: f64,
    pub inverse_complexity: f64,
    pub test_coverage: f64,
    pub guideline_compliance: f64,
    pub data_quality: f64,
    pub agent_performance: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            historical_similarity: 0.25,
            inverse_complexity: 0.20,
            test_coverage: 0.20,
            guideline_compliance: 0.15,
            data_quality: 0.10,
            agent_performance: 0.10,
        }
    }
}

impl ConfidenceWeights {
    fn as_pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("historical_similarity", self.historical_similarity),
            ("inverse_complexity", self.inverse_complexity),
            ("test_coverage", self.test_coverage),
            ("guideline_compliance", self.guideline_compliance),
            ("data_quality", self.data_quality),
            ("agent_performance", self.agent_performance),
        ]
    }
}

/// Weights of the risk factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub change_scope: f64,
    pub production_impact: f64,
    pub security_sensitivity: f64,
    pub data_integrity_impact: f64,
    pub rollback_complexity: f64,
    pub inverse_team_availability: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            change_scope: 0.20,
            production_impact: 0.25,
            security_sensitivity: 0.20,
            data_integrity_impact: 0.15,
            rollback_complexity: 0.10,
            inverse_team_availability: 0.10,
        }
    }
}

impl RiskWeights {
    fn as_pairs(&self) -> [(&'static str, f64); 6] {
        [
            ("change_scope", self.change_scope),
            ("production_impact", self.production_impact),
            ("security_sensitivity", self.security_sensitivity),
            ("data_integrity_impact", self.data_integrity_impact),
            ("rollback_complexity", self.rollback_complexity),
            ("inverse_team_availability", self.inverse_team_availability),
        ]
    }
}

/// One row of the action table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionThreshold {
    pub action: DecisionAction,
    pub min_confidence: f64,
    pub max_risk: f64,
}

/// Decision engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub confidence_weights: ConfidenceWeights,
    pub risk_weights: RiskWeights,
    /// Rows evaluated in order; the first match wins, no match means escalate.
    pub action_table: Vec<ActionThreshold>,
    /// Confidence floor before team adjustment.
    pub base_confidence_threshold: f64,
    /// Risk ceiling before team adjustment.
    pub base_risk_tolerance: f64,
    /// Team maturity in `[0.5, 0.9]`; lower is stricter.
    pub team_maturity: f64,
    /// Historical-similarity value used until outcomes have been recorded.
    pub prior_similarity: f64,
    pub history_capacity: usize,
    /// Values used for signals the context does not provide.
    pub default_signals: Signals,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confidence_weights: ConfidenceWeights::default(),
            risk_weights: RiskWeights::default(),
            action_table: vec![
                ActionThreshold {
                    action: DecisionAction::ExecuteAutonomously,
                    min_confidence: 0.9,
                    max_risk: 0.2,
                },
                ActionThreshold {
                    action: DecisionAction::ExecuteWithNotice,
                    min_confidence: 0.8,
                    max_risk: 0.3,
                },
                ActionThreshold {
                    action: DecisionAction::ProposeWithApproval,
                    min_confidence: 0.7,
                    max_risk: 0.4,
                },
            ],
            base_confidence_threshold: 0.6,
            base_risk_tolerance: 0.4,
            team_maturity: 0.7,
            prior_similarity: 0.5,
            history_capacity: 100,
            default_signals: Signals::default(),
        }
    }
}

impl DecisionConfig {
    /// Reject weights, thresholds or maturity outside their legal ranges.
    pub fn validate(&self) -> OverwatchResult<()> {
        let unit = |name: &str, v: f64| -> OverwatchResult<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(OverwatchError::Config(format!(
                    "decision.{name} must be within [0, 1], got {v}"
                )))
            }
        };

        for (name, weight) in self.confidence_weights.as_pairs() {
            unit(&format!("confidence_weights.{name}"), weight)?;
        }
        for (name, weight) in self.risk_weights.as_pairs() {
            unit(&format!("risk_weights.{name}"), weight)?;
        }
        for row in &self.action_table {
            unit("action_table.min_confidence", row.min_confidence)?;
            unit("action_table.max_risk", row.max_risk)?;
            if row.action == DecisionAction::Escalate {
                return Err(OverwatchError::Config(
                    "decision.action_table must not contain an escalate row".into(),
                ));
            }
        }
        unit("base_confidence_threshold", self.base_confidence_threshold)?;
        unit("base_risk_tolerance", self.base_risk_tolerance)?;
        unit("prior_similarity", self.prior_similarity)?;
        if !(0.5..=0.9).contains(&self.team_maturity) {
            return Err(OverwatchError::Config(format!(
                "decision.team_maturity must be within [0.5, 0.9], got {}",
                self.team_maturity
            )));
        }
        if self.history_capacity == 0 {
            return Err(OverwatchError::Config(
                "decision.history_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Confidence threshold and risk tolerance scaled by team maturity.
    ///
    /// At maturity 0.9 the base values apply unchanged; lower maturity raises
    /// the confidence threshold and lowers the risk tolerance proportionally.
    pub fn team_adjusted_thresholds(&self) -> (f64, f64) {
        let strictness = 0.9 / self.team_maturity.clamp(0.5, 0.9);
        (
            overwatch_core::clamp_unit(self.base_confidence_threshold * strictness),
            overwatch_core::clamp_unit(self.base_risk_tolerance / strictness),
        )
    }
}
