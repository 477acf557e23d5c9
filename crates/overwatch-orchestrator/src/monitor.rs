use crate::registry::AgentRegistry;
use crate::task_queue::TaskQueue;
use crate::types::{AgentStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Aggregate agent and task metrics computed at the start of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub at: DateTime<Utc>,
    pub agents_idle: usize,
    pub agents_busy: usize,
    pub agents_error: usize,
    pub agents_disabled: usize,
    pub average_performance: f64,
    pub average_autonomy: f64,
    pub tasks_pending: usize,
    pub tasks_in_progress: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_cancelled: usize,
    /// Weighted blend of agent availability, performance and task success, in `[0, 1]`.
    pub health_score: f64,
}

impl HealthMetrics {
    pub fn compute(agents: &AgentRegistry, queue: &TaskQueue, at: DateTime<Utc>) -> Self {
        let total = agents.len();
        let (average_performance, average_autonomy) = if total == 0 {
            (0.0, 0.0)
        } else {
            let n = total as f64;
            (
                agents.iter().map(|a| a.performance_score).sum::<f64>() / n,
                agents.iter().map(|a| a.autonomy_level).sum::<f64>() / n,
            )
        };

        let agents_error = agents.count_by_status(AgentStatus::Error);
        let tasks_completed = queue.count(TaskStatus::Completed);
        let tasks_failed = queue.count(TaskStatus::Failed);

        let availability = if total == 0 {
            0.0
        } else {
            1.0 - agents_error as f64 / total as f64
        };
        let finished = tasks_completed + tasks_failed;
        let success_rate = if finished == 0 {
            1.0
        } else {
            tasks_completed as f64 / finished as f64
        };
        let health_score =
            overwatch_core::clamp_unit(0.5 * availability + 0.3 * average_performance + 0.2 * success_rate);

        Self {
            at,
            agents_idle: agents.count_by_status(AgentStatus::Idle),
            agents_busy: agents.count_by_status(AgentStatus::Busy),
            agents_error,
            agents_disabled: agents.count_by_status(AgentStatus::Disabled),
            average_performance,
            average_autonomy,
            tasks_pending: queue.count(TaskStatus::Pending),
            tasks_in_progress: queue.count(TaskStatus::InProgress),
            tasks_completed,
            tasks_failed,
            tasks_cancelled: queue.count(TaskStatus::Cancelled),
            health_score,
        }
    }
}

/// Rolling window of per-tick health metrics.
#[derive(Debug)]
pub struct HealthMonitor {
    window: VecDeque<HealthMetrics>,
    capacity: usize,
}

impl HealthMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, metrics: HealthMetrics) {
        self.window.push_back(metrics);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&HealthMetrics> {
        self.window.back()
    }

    /// Mean health score over the window, `None` before the first tick.
    pub fn rolling_health(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().map(|m| m.health_score).sum::<f64>() / self.window.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
