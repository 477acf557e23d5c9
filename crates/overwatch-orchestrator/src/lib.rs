//! Tick-driven task orchestrator.
//!
//! Keeps a dependency-aware task queue and a table of agents, assigns
//! eligible tasks to idle agents each tick, consults the decision engine
//! before every execution, routes escalations to humans, runs the quality
//! gate on results and reports every transition through the notification
//! router.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Submission, ticks, finalization and operator controls.
//! - [`Runtime`]: Background tick, digest and feedback loops.
//! - [`TaskExecutor`]: Trait implemented by whatever actually runs a task.
//! - [`TaskQueue`]: Tasks with dependencies and cycle detection.
//! - [`HealthMonitor`]: Rolling health computed from agent and task counts.

/// Orchestrator configuration.
pub mod config;
/// The orchestrator itself.
pub mod engine;
/// Task execution seam.
pub mod executor;
/// Health metrics.
pub mod monitor;
/// Agent table.
pub mod registry;
/// Background loops.
pub mod runtime;
/// Dependency-aware task queue.
pub mod task_queue;
/// Agent and task types.
pub mod types;

pub use config::{AdaptationConfig, AgentConfig, OrchestratorConfig, TaskKindConfig};
pub use engine::{
    Assigned, ExecutionOutcome, Orchestrator, OrchestratorBuilder, QualityRecord, StatusSnapshot,
    TickReport,
};
pub use executor::{merge_json, Assignment, TaskExecutor};
pub use monitor::{HealthMetrics, HealthMonitor};
pub use registry::AgentRegistry;
pub use runtime::{Runtime, RuntimeHandle};
pub use task_queue::TaskQueue;
pub use types::{Agent, AgentStatus, Priority, Task, TaskStatus, TaskSubmission};
