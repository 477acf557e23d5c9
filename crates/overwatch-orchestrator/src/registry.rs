use crate::config::AgentConfig;
use crate::types::{Agent, AgentStatus};
use chrono::{DateTime, Utc};
use overwatch_core::{clamp_unit, OverwatchError, OverwatchResult};
use std::collections::BTreeMap;

/// Owned table of agents keyed by id.
///
/// Agents are created once from configuration and never removed, only
/// disabled.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Agent>,
}

impl AgentRegistry {
    pub fn from_configs(configs: &[AgentConfig], now: DateTime<Utc>) -> OverwatchResult<Self> {
        let mut registry = Self::default();
        for config in configs {
            registry.insert(config, now)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, config: &AgentConfig, now: DateTime<Utc>) -> OverwatchResult<()> {
        if config.id.trim().is_empty() || config.kind.trim().is_empty() {
            return Err(OverwatchError::Config(
                "agents need a non-empty id and kind".into(),
            ));
        }
        if self.agents.contains_key(&config.id) {
            return Err(OverwatchError::Config(format!(
                "duplicate agent id '{}'",
                config.id
            )));
        }
        self.agents.insert(
            config.id.clone(),
            Agent {
                id: config.id.clone(),
                kind: config.kind.clone(),
                status: AgentStatus::Idle,
                autonomy_level: clamp_unit(config.autonomy_level),
                performance_score: clamp_unit(config.performance_score),
                last_action_time: now,
                current_task: None,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.agents.values().any(|a| a.kind == kind)
    }

    /// Distinct agent kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.agents.values().map(|a| a.kind.clone()).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// The idle agent of `kind` to assign next: highest autonomy, then
    /// highest performance, then lowest id.
    pub fn select_idle(&self, kind: &str) -> Option<&Agent> {
        self.agents
            .values()
            .filter(|a| a.kind == kind && a.is_idle())
            .min_by(|a, b| {
                b.autonomy_level
                    .total_cmp(&a.autonomy_level)
                    .then_with(|| b.performance_score.total_cmp(&a.performance_score))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    pub fn count_by_status(&self, status: AgentStatus) -> usize {
        self.agents.values().filter(|a| a.status == status).count()
    }

    /// Busy agents whose last action is older than `max_idle`.
    pub fn stuck(&self, now: DateTime<Utc>, max_idle: chrono::Duration) -> Vec<String> {
        self.agents
            .values()
            .filter(|a| {
                a.status == AgentStatus::Busy && now.signed_duration_since(a.last_action_time) > max_idle
            })
            .map(|a| a.id.clone())
            .collect()
    }
}
