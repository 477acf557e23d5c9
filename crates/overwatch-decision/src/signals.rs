use overwatch_core::clamp_unit;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized scoring inputs for one assignment.
///
/// Read from the `signals` object of a task's context; every value is
/// clamped to `[0, 1]`. Missing or non-numeric entries keep the configured
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signals {
    pub complexity: f64,
    pub test_coverage: f64,
    pub guideline_compliance: f64,
    pub data_quality: f64,
    pub change_scope: f64,
    pub production_impact: f64,
    pub security_sensitivity: f64,
    pub data_integrity_impact: f64,
    pub rollback_complexity: f64,
    pub team_availability: f64,
}

impl Default for Signals {
    fn default() -> Self {
        Self {
            complexity: 0.5,
            test_coverage: 0.5,
            guideline_compliance: 0.5,
            data_quality: 0.5,
            change_scope: 0.5,
            production_impact: 0.5,
            security_sensitivity: 0.5,
            data_integrity_impact: 0.5,
            rollback_complexity: 0.5,
            team_availability: 0.5,
        }
    }
}

impl Signals {
    /// Overlay `context.signals.*` onto `defaults`.
    pub fn from_context(context: &Value, defaults: &Signals) -> Self {
        let mut signals = defaults.clone();
        let Some(map) = context.get("signals").and_then(Value::as_object) else {
            return signals;
        };

        let read = |key: &str, slot: &mut f64| {
            if let Some(v) = map.get(key).and_then(Value::as_f64) {
                *slot = clamp_unit(v);
            }
        };

        read("complexity", &mut signals.complexity);
        read("test_coverage", &mut signals.test_coverage);
        read("guideline_compliance", &mut signals.guideline_compliance);
        read("data_quality", &mut signals.data_quality);
        read("change_scope", &mut signals.change_scope);
        read("production_impact", &mut signals.production_impact);
        read("security_sensitivity", &mut signals.security_sensitivity);
        read("data_integrity_impact", &mut signals.data_integrity_impact);
        read("rollback_complexity", &mut signals.rollback_complexity);
        read("team_availability", &mut signals.team_availability);
        signals
    }
}
