use crate::config::DecisionConfig;
use crate::signals::Signals;
use crate::types::{Decision, DecisionAction, Factor, FactorBreakdown};
use overwatch_core::{clamp_unit, Clock, OverwatchError, OverwatchResult, SystemClock};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Input to [`DecisionEngine::decide`].
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    /// Kind of the agent about to perform the work.
    pub agent_kind: &'a str,
    /// Category of action, used to look up historical outcomes.
    pub action_type: &'a str,
    /// The task's opaque context.
    pub context: &'a Value,
    /// Rolling performance score of the assigned agent.
    pub agent_performance: f64,
}

struct DecisionRecord {
    decision: Decision,
    outcome: Option<bool>,
}

/// Scores assignments and recommends how to proceed.
///
/// Scoring itself is pure; the only state is the set of known agent kinds
/// and the bounded history used for the historical-similarity factor.
pub struct DecisionEngine {
    config: DecisionConfig,
    kinds: RwLock<HashMap<String, bool>>,
    history: Mutex<VecDeque<DecisionRecord>>,
    clock: Arc<dyn Clock>,
}

impl DecisionEngine {
    /// Create an engine for the given agent kinds (all enabled).
    pub fn new(
        config: DecisionConfig,
        kinds: impl IntoIterator<Item = impl Into<String>>,
    ) -> OverwatchResult<Self> {
        config.validate()?;
        let kinds = kinds.into_iter().map(|k| (k.into(), true)).collect();
        Ok(Self {
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity)),
            config,
            kinds: RwLock::new(kinds),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use an injected clock for decision timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Register (or re-enable) an agent kind.
    pub fn register_kind(&self, kind: impl Into<String>) {
        self.kinds.write().insert(kind.into(), true);
    }

    /// Stop accepting decisions for a kind. Returns false if the kind is unknown.
    pub fn disable_kind(&self, kind: &str) -> bool {
        match self.kinds.write().get_mut(kind) {
            Some(enabled) => {
                *enabled = false;
                true
            }
            None => false,
        }
    }

    /// Re-enable a disabled kind. Returns false if the kind is unknown.
    pub fn enable_kind(&self, kind: &str) -> bool {
        match self.kinds.write().get_mut(kind) {
            Some(enabled) => {
                *enabled = true;
                true
            }
            None => false,
        }
    }

    /// Whether decisions can currently be made for `kind`.
    pub fn is_enabled(&self, kind: &str) -> bool {
        self.kinds.read().get(kind).copied().unwrap_or(false)
    }

    /// Score an assignment and choose an action.
    pub fn decide(&self, request: &DecisionRequest<'_>) -> OverwatchResult<Decision> {
        if !self.is_enabled(request.agent_kind) {
            return Err(OverwatchError::UnknownAgent(request.agent_kind.to_string()));
        }

        let signals = Signals::from_context(request.context, &self.config.default_signals);
        let similarity = self.historical_similarity(request.action_type);
        let factors = self.factors(&signals, similarity, request.agent_performance);

        let confidence = clamp_unit(factors.confidence.iter().map(Factor::contribution).sum());
        let risk = clamp_unit(factors.risk.iter().map(Factor::contribution).sum());
        let (action, escalation_required) = self.classify(confidence, risk);

        let decision = Decision {
            id: Uuid::new_v4(),
            agent_kind: request.agent_kind.to_string(),
            action_type: request.action_type.to_string(),
            action,
            confidence,
            risk,
            reasoning: self.reasoning(confidence, risk, action, escalation_required, &factors),
            escalation_required,
            rollback_plan: rollback_plan(action, signals.rollback_complexity),
            factors,
            created_at: self.clock.now(),
        };

        info!(
            decision_id = %decision.id,
            agent_kind = %decision.agent_kind,
            action = %decision.action,
            confidence = decision.confidence,
            risk = decision.risk,
            escalation_required = decision.escalation_required,
            "Decision made"
        );

        self.remember(decision.clone());
        Ok(decision)
    }

    /// Map scores to the action table row and the independent escalation flag.
    pub fn classify(&self, confidence: f64, risk: f64) -> (DecisionAction, bool) {
        let action = self
            .config
            .action_table
            .iter()
            .find(|row| confidence >= row.min_confidence && risk <= row.max_risk)
            .map_or(DecisionAction::Escalate, |row| row.action);

        let (threshold, tolerance) = self.config.team_adjusted_thresholds();
        let escalation_required = confidence < threshold || risk > tolerance;
        (action, escalation_required)
    }

    /// Record whether the work behind a decision succeeded.
    ///
    /// Returns false if the decision has already left the history window.
    pub fn record_outcome(&self, decision_id: Uuid, success: bool) -> bool {
        let mut history = self.history.lock();
        match history.iter_mut().find(|r| r.decision.id == decision_id) {
            Some(record) => {
                record.outcome = Some(success);
                debug!(decision_id = %decision_id, success, "Decision outcome recorded");
                true
            }
            None => false,
        }
    }

    /// Success rate of resolved decisions with the same action type.
    pub fn historical_similarity(&self, action_type: &str) -> f64 {
        let history = self.history.lock();
        let (resolved, succeeded) = history
            .iter()
            .filter(|r| r.decision.action_type == action_type)
            .filter_map(|r| r.outcome)
            .fold((0usize, 0usize), |(n, ok), success| {
                (n + 1, ok + usize::from(success))
            });
        if resolved == 0 {
            self.config.prior_similarity
        } else {
            succeeded as f64 / resolved as f64
        }
    }

    /// The most recent `limit` decisions, oldest first.
    pub fn recent_decisions(&self, limit: usize) -> Vec<Decision> {
        let history = self.history.lock();
        let skip = history.len().saturating_sub(limit);
        history
            .iter()
            .skip(skip)
            .map(|r| r.decision.clone())
            .collect()
    }

    fn remember(&self, decision: Decision) {
        let mut history = self.history.lock();
        while history.len() >= self.config.history_capacity {
            history.pop_front();
        }
        history.push_back(DecisionRecord {
            decision,
            outcome: None,
        });
    }

    fn factors(&self, s: &Signals, similarity: f64, performance: f64) -> FactorBreakdown {
        let cw = &self.config.confidence_weights;
        let rw = &self.config.risk_weights;
        let factor = |name: &str, value: f64, weight: f64| Factor {
            name: name.to_string(),
            value: clamp_unit(value),
            weight,
        };

        FactorBreakdown {
            confidence: vec![
                factor("historical_similarity", similarity, cw.historical_similarity),
                factor("inverse_complexity", 1.0 - s.complexity, cw.inverse_complexity),
                factor("test_coverage", s.test_coverage, cw.test_coverage),
                factor("guideline_compliance", s.guideline_compliance, cw.guideline_compliance),
                factor("data_quality", s.data_quality, cw.data_quality),
                factor("agent_performance", performance, cw.agent_performance),
            ],
            risk: vec![
                factor("change_scope", s.change_scope, rw.change_scope),
                factor("production_impact", s.production_impact, rw.production_impact),
                factor("security_sensitivity", s.security_sensitivity, rw.security_sensitivity),
                factor("data_integrity_impact", s.data_integrity_impact, rw.data_integrity_impact),
                factor("rollback_complexity", s.rollback_complexity, rw.rollback_complexity),
                factor(
                    "inverse_team_availability",
                    1.0 - s.team_availability,
                    rw.inverse_team_availability,
                ),
            ],
        }
    }

    fn reasoning(
        &self,
        confidence: f64,
        risk: f64,
        action: DecisionAction,
        escalation_required: bool,
        factors: &FactorBreakdown,
    ) -> String {
        let (threshold, tolerance) = self.config.team_adjusted_thresholds();
        let strongest_name = strongest(&factors.confidence).unwrap_or("none");
        let riskiest = strongest(&factors.risk).unwrap_or("none");
        let mut text = format!(
            "confidence {confidence:.2} (team threshold {threshold:.2}), risk {risk:.2} \
             (team tolerance {tolerance:.2}); strongest confidence factor: {strongest_name}; \
             largest risk factor: {riskiest}; table action: {action}"
        );
        if escalation_required {
            text.push_str("; escalation required by team-adjusted limits");
        }
        text
    }
}

fn strongest(factors: &[Factor]) -> Option<&str> {
    factors
        .iter()
        .max_by(|a, b| a.contribution().total_cmp(&b.contribution()))
        .map(|f| f.name.as_str())
}

fn rollback_plan(action: DecisionAction, rollback_complexity: f64) -> String {
    if action == DecisionAction::Escalate {
        return "No changes are applied before human review; nothing to roll back.".into();
    }
    if rollback_complexity < 0.3 {
        "Automated revert of the task's changes.".into()
    } else if rollback_complexity < 0.7 {
        "Revert the task's changes and re-run the quality gate before requeueing.".into()
    } else {
        "Manual rollback: restore the last known-good snapshot and notify the owning team.".into()
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("kinds", &self.kinds.read().len())
            .field("history", &self.history.lock().len())
            .finish()
    }
}
