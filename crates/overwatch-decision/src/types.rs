use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the engine recommends doing with an assignment.
///
/// Variants are ordered from most to least permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Run without telling anyone.
    ExecuteAutonomously,
    /// Run and send a notice.
    ExecuteWithNotice,
    /// Run, flagging the result as a proposal awaiting sign-off.
    ProposeWithApproval,
    /// Do not run; hand the task to a human.
    Escalate,
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionAction::ExecuteAutonomously => write!(f, "execute_autonomously"),
            DecisionAction::ExecuteWithNotice => write!(f, "execute_with_notice"),
            DecisionAction::ProposeWithApproval => write!(f, "propose_with_approval"),
            DecisionAction::Escalate => write!(f, "escalate"),
        }
    }
}

/// One weighted input to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    /// Factor name.
    pub name: String,
    /// Normalized value in `[0, 1]`.
    pub value: f64,
    /// Weight applied to the value.
    pub weight: f64,
}

impl Factor {
    /// Weighted contribution to the score.
    pub fn contribution(&self) -> f64 {
        self.value * self.weight
    }
}

/// Named contributions behind a decision's two scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    /// Confidence factors.
    pub confidence: Vec<Factor>,
    /// Risk factors.
    pub risk: Vec<Factor>,
}

/// A scored recommendation for one task assignment. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub agent_kind: String,
    pub action_type: String,
    pub action: DecisionAction,
    pub confidence: f64,
    pub risk: f64,
    pub reasoning: String,
    /// Set when either score breaches the team-adjusted limits.
    pub escalation_required: bool,
    pub rollback_plan: String,
    pub factors: FactorBreakdown,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    /// The branch the orchestrator should take: escalation wins whenever it
    /// is required, regardless of what the action table selected.
    pub fn final_action(&self) -> DecisionAction {
        if self.escalation_required {
            DecisionAction::Escalate
        } else {
            self.action
        }
    }

    /// Whether the orchestrator must hand this assignment to a human.
    pub fn requires_escalation(&self) -> bool {
        self.final_action() == DecisionAction::Escalate
    }
}
