use overwatch_core::{OverwatchError, OverwatchResult};
use serde::{Deserialize, Serialize};

/// Scheduling cadence, health monitoring and adaptation constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub tick_period_secs: u64,
    /// K: most assignments started by one tick.
    pub max_assignments_per_tick: usize,
    /// A Busy agent silent for longer than this is forced to Error.
    pub max_idle_secs: u64,
    pub adaptation: AdaptationConfig,
    /// Ticks averaged into the rolling health score.
    pub health_window: usize,
    /// Quality gate results kept for the status snapshot.
    pub recent_results_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_period_secs: 30,
            max_assignments_per_tick: 4,
            max_idle_secs: 1800,
            adaptation: AdaptationConfig::default(),
            health_window: 20,
            recent_results_capacity: 50,
        }
    }
}

/// Feedback loop from decision confidence to agent scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    /// Confidence above which an agent's performance improves.
    pub high_confidence: f64,
    /// Confidence below which an agent's performance degrades.
    pub low_confidence: f64,
    pub performance_step_up: f64,
    pub performance_step_down: f64,
    /// Performance above which autonomy is nudged up each tick.
    pub promote_performance: f64,
    /// Performance below which autonomy is nudged down each tick.
    pub demote_performance: f64,
    pub autonomy_step_up: f64,
    pub autonomy_step_down: f64,
    pub autonomy_floor: f64,
}

impl AdaptationConfig {
    /// Performance after one decision with the given confidence.
    pub fn apply_confidence(&self, performance: f64, confidence: f64) -> f64 {
        if confidence > self.high_confidence {
            (performance + self.performance_step_up).min(1.0)
        } else if confidence < self.low_confidence {
            (performance - self.performance_step_down).max(0.0)
        } else {
            performance
        }
    }

    /// Autonomy after one tick at the given performance. Never pushed below
    /// the floor, but an agent configured below it is left where it is.
    pub fn apply_performance(&self, autonomy: f64, performance: f64) -> f64 {
        if performance > self.promote_performance {
            (autonomy + self.autonomy_step_up).min(1.0)
        } else if performance < self.demote_performance {
            let floor = self.autonomy_floor.min(autonomy);
            (autonomy - self.autonomy_step_down).max(floor)
        } else {
            autonomy
        }
    }
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.9,
            low_confidence: 0.6,
            performance_step_up: 0.01,
            performance_step_down: 0.02,
            promote_performance: 0.9,
            demote_performance: 0.7,
            autonomy_step_up: 0.01,
            autonomy_step_down: 0.02,
            autonomy_floor: 0.5,
        }
    }
}

/// Static definition of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub kind: String,
    #[serde(default = "default_autonomy")]
    pub autonomy_level: f64,
    #[serde(default = "default_performance")]
    pub performance_score: f64,
}

fn default_autonomy() -> f64 {
    0.7
}

fn default_performance() -> f64 {
    0.8
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            autonomy_level: default_autonomy(),
            performance_score: default_performance(),
        }
    }

    pub fn with_scores(mut self, autonomy_level: f64, performance_score: f64) -> Self {
        self.autonomy_level = autonomy_level;
        self.performance_score = performance_score;
        self
    }
}

/// Maps a task kind to the agent kind that performs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskKindConfig {
    pub kind: String,
    pub agent_kind: String,
    #[serde(default = "default_gated")]
    pub requires_quality_gate: bool,
    /// Action type scored by the decision engine; defaults to `kind`.
    #[serde(default)]
    pub action_type: Option<String>,
}

fn default_gated() -> bool {
    true
}

impl TaskKindConfig {
    pub fn new(kind: impl Into<String>, agent_kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            agent_kind: agent_kind.into(),
            requires_quality_gate: true,
            action_type: None,
        }
    }

    pub fn ungated(mut self) -> Self {
        self.requires_quality_gate = false;
        self
    }

    pub fn action_type(&self) -> &str {
        self.action_type.as_deref().unwrap_or(&self.kind)
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> OverwatchResult<()> {
        if self.tick_period_secs == 0 {
            return Err(OverwatchError::Config(
                "orchestrator.tick_period_secs must be positive".into(),
            ));
        }
        if self.max_assignments_per_tick == 0 {
            return Err(OverwatchError::Config(
                "orchestrator.max_assignments_per_tick must be positive".into(),
            ));
        }
        if self.health_window == 0 {
            return Err(OverwatchError::Config(
                "orchestrator.health_window must be positive".into(),
            ));
        }
        if self.recent_results_capacity == 0 {
            return Err(OverwatchError::Config(
                "orchestrator.recent_results_capacity must be positive".into(),
            ));
        }
        let a = &self.adaptation;
        let unit = [
            ("high_confidence", a.high_confidence),
            ("low_confidence", a.low_confidence),
            ("performance_step_up", a.performance_step_up),
            ("performance_step_down", a.performance_step_down),
            ("promote_performance", a.promote_performance),
            ("demote_performance", a.demote_performance),
            ("autonomy_step_up", a.autonomy_step_up),
            ("autonomy_step_down", a.autonomy_step_down),
            ("autonomy_floor", a.autonomy_floor),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(OverwatchError::Config(format!(
                    "orchestrator.adaptation.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if a.low_confidence > a.high_confidence {
            return Err(OverwatchError::Config(
                "orchestrator.adaptation.low_confidence exceeds high_confidence".into(),
            ));
        }
        Ok(())
    }
}
