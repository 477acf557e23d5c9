use crate::config::{AgentConfig, OrchestratorConfig, TaskKindConfig};
use crate::executor::{merge_json, Assignment, TaskExecutor};
use crate::monitor::{HealthMetrics, HealthMonitor};
use crate::registry::AgentRegistry;
use crate::task_queue::TaskQueue;
use crate::types::{Agent, AgentStatus, Task, TaskStatus, TaskSubmission};
use chrono::{DateTime, Utc};
use overwatch_core::{
    ActionKind, Clock, Message, MessageAction, MessageSeverity, OverwatchError, OverwatchResult,
    SourceKind, SystemClock,
};
use overwatch_decision::{Decision, DecisionAction, DecisionEngine, DecisionRequest};
use overwatch_notify::{HumanFeedback, HumanResponse, NotificationRouter};
use overwatch_quality::{QualityGatePipeline, QualityGateResult, Verdict};
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How an execution ended, as reported back to [`Orchestrator::finalize`].
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The executor returned an error.
    ExecutionFailed(String),
    /// Execution succeeded and the gate produced a verdict.
    Gated(QualityGateResult),
    /// Execution succeeded but the gate could not evaluate.
    GateFailed(String),
    /// Execution succeeded and the task kind is not gated.
    Ungated,
}

/// One assignment started by a tick.
#[derive(Debug, Clone, Serialize)]
pub struct Assigned {
    pub task_id: Uuid,
    pub agent_id: String,
    pub action: DecisionAction,
}

/// What a single tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub metrics: HealthMetrics,
    pub assigned: Vec<Assigned>,
    pub escalated: Vec<Uuid>,
    /// Assignments undone because no decision could be made.
    pub reverted: Vec<Uuid>,
    pub stuck_agents: Vec<String>,
}

/// A quality gate verdict on one task.
#[derive(Debug, Clone, Serialize)]
pub struct QualityRecord {
    pub task_id: Uuid,
    pub task_kind: String,
    pub result: QualityGateResult,
}

/// Read-only view of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub ticks: u64,
    pub agents: Vec<Agent>,
    pub queue_depth: usize,
    pub awaiting_human: usize,
    pub current: HealthMetrics,
    pub rolling_health: Option<f64>,
    /// Oldest first.
    pub recent_decisions: Vec<Decision>,
    /// Oldest first.
    pub recent_quality: Vec<QualityRecord>,
}

struct State {
    agents: AgentRegistry,
    queue: TaskQueue,
    monitor: HealthMonitor,
    ticks: u64,
    recent_quality: VecDeque<QualityRecord>,
    /// Tasks whose failed assignment was already reported.
    reverted: HashSet<Uuid>,
}

enum Started {
    Launched(Assignment),
    Escalated,
    Reverted,
}

struct Inner {
    config: OrchestratorConfig,
    task_kinds: HashMap<String, TaskKindConfig>,
    /// Single write path for queue and agent table.
    state: Mutex<State>,
    /// Serializes ticks.
    tick_gate: Mutex<()>,
    decision: Arc<DecisionEngine>,
    quality: Option<Arc<QualityGatePipeline>>,
    router: Arc<NotificationRouter>,
    executor: Arc<dyn TaskExecutor>,
    clock: Arc<dyn Clock>,
    in_flight: parking_lot::Mutex<JoinSet<()>>,
}

/// Builder validating the static configuration before anything runs.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    agents: Vec<AgentConfig>,
    task_kinds: Vec<TaskKindConfig>,
    decision: Option<Arc<DecisionEngine>>,
    quality: Option<Arc<QualityGatePipeline>>,
    router: Option<Arc<NotificationRouter>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    clock: Arc<dyn Clock>,
}

impl OrchestratorBuilder {
    pub fn agents(mut self, agents: impl IntoIterator<Item = AgentConfig>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn task_kinds(mut self, kinds: impl IntoIterator<Item = TaskKindConfig>) -> Self {
        self.task_kinds.extend(kinds);
        self
    }

    pub fn decision_engine(mut self, engine: Arc<DecisionEngine>) -> Self {
        self.decision = Some(engine);
        self
    }

    pub fn quality_gate(mut self, pipeline: Arc<QualityGatePipeline>) -> Self {
        self.quality = Some(pipeline);
        self
    }

    pub fn router(mut self, router: Arc<NotificationRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> OverwatchResult<Orchestrator> {
        self.config.validate()?;
        let decision = self
            .decision
            .ok_or_else(|| OverwatchError::Config("orchestrator needs a decision engine".into()))?;
        let router = self
            .router
            .ok_or_else(|| OverwatchError::Config("orchestrator needs a notification router".into()))?;
        let executor = self
            .executor
            .ok_or_else(|| OverwatchError::Config("orchestrator needs a task executor".into()))?;

        let agents = AgentRegistry::from_configs(&self.agents, self.clock.now())?;

        let mut task_kinds = HashMap::new();
        for kind in self.task_kinds {
            if !agents.has_kind(&kind.agent_kind) {
                return Err(OverwatchError::Config(format!(
                    "task kind '{}' needs agent kind '{}' but no such agent is configured",
                    kind.kind, kind.agent_kind
                )));
            }
            if kind.requires_quality_gate {
                match &self.quality {
                    Some(pipeline) => pipeline.validate()?,
                    None => {
                        return Err(OverwatchError::CheckerMisconfiguration(format!(
                            "task kind '{}' requires a quality gate but none is configured",
                            kind.kind
                        )))
                    }
                }
            }
            if task_kinds.insert(kind.kind.clone(), kind).is_some() {
                return Err(OverwatchError::Config("duplicate task kind".into()));
            }
        }

        for kind in agents.kinds() {
            if !decision.is_enabled(&kind) {
                decision.register_kind(kind);
            }
        }

        info!(
            agents = agents.len(),
            task_kinds = task_kinds.len(),
            "Orchestrator initialized"
        );

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    agents,
                    queue: TaskQueue::new(),
                    monitor: HealthMonitor::new(self.config.health_window),
                    ticks: 0,
                    recent_quality: VecDeque::new(),
                    reverted: HashSet::new(),
                }),
                config: self.config,
                task_kinds,
                tick_gate: Mutex::new(()),
                decision,
                quality: self.quality,
                router,
                executor,
                clock: self.clock,
                in_flight: parking_lot::Mutex::new(JoinSet::new()),
            }),
        })
    }
}

/// The task orchestrator.
///
/// Cheap to clone; clones share state. Every mutation of the queue or the
/// agent table goes through one async mutex, whether it comes from a tick,
/// an execution completion or a human response. Messages produced while
/// holding it are sent after it is released.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            agents: Vec::new(),
            task_kinds: Vec::new(),
            decision: None,
            quality: None,
            router: None,
            executor: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.inner.router
    }

    pub fn decision_engine(&self) -> &Arc<DecisionEngine> {
        &self.inner.decision
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Enqueue a task as `Pending`.
    ///
    /// Dependencies may name tasks not submitted yet; such a task stays
    /// ineligible until they exist and complete.
    pub async fn submit(&self, submission: TaskSubmission) -> OverwatchResult<Uuid> {
        if !self.inner.task_kinds.contains_key(&submission.kind) {
            return Err(OverwatchError::InvalidTask(format!(
                "unknown task kind '{}'",
                submission.kind
            )));
        }
        let context = match submission.context {
            serde_json::Value::Null => json!({}),
            ctx @ serde_json::Value::Object(_) => ctx,
            _ => {
                return Err(OverwatchError::InvalidTask(
                    "task context must be a JSON object".into(),
                ))
            }
        };
        let id = submission.id.unwrap_or_else(Uuid::new_v4);
        if submission.dependencies.contains(&id) {
            return Err(OverwatchError::InvalidTask(format!("task {id} depends on itself")));
        }
        let mut dependencies = submission.dependencies;
        dependencies.sort();
        dependencies.dedup();

        let now = self.now();
        let task = Task {
            id,
            kind: submission.kind,
            priority: submission.priority,
            dependencies,
            context,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            assigned_agent: None,
            decision_id: None,
            awaiting_response: None,
            human_approved: false,
            failure_reason: None,
        };

        let message = {
            let mut state = self.inner.state.lock().await;
            if !state.queue.add(task.clone()) {
                return Err(OverwatchError::InvalidTask(format!("task {id} already submitted")));
            }
            if state.queue.has_cycle() {
                state.queue.remove(id);
                return Err(OverwatchError::InvalidTask(format!(
                    "task {id} would create a dependency cycle"
                )));
            }
            let severity = if task.priority == crate::types::Priority::Critical {
                MessageSeverity::Critical
            } else {
                MessageSeverity::Info
            };
            task_message(
                severity,
                format!("Task submitted: {}", task.kind),
                format!(
                    "{} priority, {} dependencies",
                    task.priority,
                    task.dependencies.len()
                ),
                &task,
                now,
            )
        };

        info!(task_id = %id, kind = %task.kind, priority = %task.priority, "Task submitted");
        self.emit(vec![message]).await;
        Ok(id)
    }

    /// One scheduling step: health checks, metrics, then up to K assignments.
    pub async fn tick(&self) -> TickReport {
        let _gate = self.inner.tick_gate.lock().await;
        let now = self.now();
        let mut outbox = Vec::new();
        let mut launches = Vec::new();

        let report = {
            let mut state = self.inner.state.lock().await;
            state.ticks += 1;
            let tick = state.ticks;

            let stuck_agents = self.detect_stuck(&mut state, now, &mut outbox);
            self.adapt_autonomy(&mut state.agents);
            let metrics = HealthMetrics::compute(&state.agents, &state.queue, now);
            state.monitor.record(metrics.clone());

            let mut assigned = Vec::new();
            let mut escalated = Vec::new();
            let mut reverted = Vec::new();

            let candidates: Vec<(Uuid, String)> = state
                .queue
                .eligible()
                .iter()
                .map(|t| (t.id, t.kind.clone()))
                .collect();

            let mut selected = 0;
            for (task_id, kind) in candidates {
                if selected >= self.inner.config.max_assignments_per_tick {
                    break;
                }
                let Some(kind_config) = self.inner.task_kinds.get(&kind) else {
                    continue;
                };
                let Some(agent_id) = state
                    .agents
                    .select_idle(&kind_config.agent_kind)
                    .map(|a| a.id.clone())
                else {
                    continue;
                };
                selected += 1;

                match self.start(&mut state, task_id, &agent_id, now, &mut outbox) {
                    Started::Launched(assignment) => {
                        assigned.push(Assigned {
                            task_id,
                            agent_id,
                            action: assignment.decision.action,
                        });
                        launches.push(assignment);
                    }
                    Started::Escalated => escalated.push(task_id),
                    Started::Reverted => reverted.push(task_id),
                }
            }

            debug!(
                tick,
                assigned = assigned.len(),
                escalated = escalated.len(),
                health = metrics.health_score,
                "Tick complete"
            );

            TickReport {
                tick,
                metrics,
                assigned,
                escalated,
                reverted,
                stuck_agents,
            }
        };

        for assignment in launches {
            self.launch(assignment);
        }
        self.emit(outbox).await;
        report
    }

    /// Bind a task to an agent and decide how to proceed.
    fn start(
        &self,
        state: &mut State,
        task_id: Uuid,
        agent_id: &str,
        now: DateTime<Utc>,
        outbox: &mut Vec<Message>,
    ) -> Started {
        let State {
            agents,
            queue,
            reverted,
            ..
        } = state;
        let (Some(task), Some(agent)) = (queue.get_mut(task_id), agents.get_mut(agent_id)) else {
            return Started::Reverted;
        };
        let Some(kind_config) = self.inner.task_kinds.get(&task.kind) else {
            return Started::Reverted;
        };

        task.transition(TaskStatus::InProgress, now);
        task.assigned_agent = Some(agent.id.clone());
        agent.occupy(task.id, now);

        let request = DecisionRequest {
            agent_kind: &agent.kind,
            action_type: kind_config.action_type(),
            context: &task.context,
            agent_performance: agent.performance_score,
        };
        let decision = match self.inner.decision.decide(&request) {
            Ok(decision) => decision,
            Err(e) => {
                task.transition(TaskStatus::Pending, now);
                task.assigned_agent = None;
                agent.release(now);
                if reverted.insert(task.id) {
                    warn!(task_id = %task.id, agent = %agent.id, error = %e, "Decision failed, task reverted");
                    outbox.push(task_message(
                        MessageSeverity::Warning,
                        format!("Assignment reverted: {}", task.kind),
                        e.to_string(),
                        task,
                        now,
                    ));
                } else {
                    debug!(task_id = %task.id, error = %e, "Decision still failing");
                }
                return Started::Reverted;
            }
        };
        reverted.remove(&task.id);

        agent.performance_score = self
            .inner
            .config
            .adaptation
            .apply_confidence(agent.performance_score, decision.confidence);
        task.decision_id = Some(decision.id);

        if decision.requires_escalation() && !task.human_approved {
            task.transition(TaskStatus::Pending, now);
            task.assigned_agent = None;
            agent.release(now);

            let message = task_message(
                MessageSeverity::ActionRequired,
                format!("Approval needed: {}", task.kind),
                format!(
                    "{}\nRollback: {}",
                    decision.reasoning, decision.rollback_plan
                ),
                task,
                now,
            )
            .with_metadata("decision_id", json!(decision.id.to_string()))
            .with_metadata("confidence", json!(decision.confidence))
            .with_metadata("risk", json!(decision.risk))
            .with_actions(MessageAction::escalation_set());
            task.awaiting_response = Some(message.id);

            info!(
                task_id = %task.id,
                confidence = decision.confidence,
                risk = decision.risk,
                "Task escalated"
            );
            outbox.push(message);
            return Started::Escalated;
        }

        info!(
            task_id = %task.id,
            agent = %agent.id,
            action = %decision.action,
            approved = task.human_approved,
            "Task assigned"
        );
        let noticed = task.human_approved
            || matches!(
                decision.action,
                DecisionAction::ExecuteWithNotice | DecisionAction::ProposeWithApproval
            );
        if noticed {
            outbox.push(
                task_message(
                    MessageSeverity::Info,
                    format!("Executing: {}", task.kind),
                    if task.human_approved {
                        format!("agent {}, approved by operator", agent.id)
                    } else {
                        format!("agent {} ({})", agent.id, decision.action)
                    },
                    task,
                    now,
                )
                .with_metadata("decision_id", json!(decision.id.to_string())),
            );
        }

        Started::Launched(Assignment {
            task_id: task.id,
            task_kind: task.kind.clone(),
            agent_id: agent.id.clone(),
            context: task.context.clone(),
            decision,
        })
    }

    fn launch(&self, assignment: Assignment) {
        let this = self.clone();
        let mut in_flight = self.inner.in_flight.lock();
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn(async move {
            let task_id = assignment.task_id;
            let outcome = this.run(&assignment).await;
            if let Err(e) = this.finalize(task_id, outcome).await {
                warn!(task_id = %task_id, error = %e, "Completion could not be applied");
            }
        });
    }

    async fn run(&self, assignment: &Assignment) -> ExecutionOutcome {
        let output = match self.inner.executor.execute(assignment).await {
            Ok(output) => output,
            Err(e) => return ExecutionOutcome::ExecutionFailed(e.to_string()),
        };

        let gated = self
            .inner
            .task_kinds
            .get(&assignment.task_kind)
            .is_some_and(|k| k.requires_quality_gate);
        let pipeline = match (&self.inner.quality, gated) {
            (Some(pipeline), true) => pipeline,
            _ => return ExecutionOutcome::Ungated,
        };

        let mut payload = assignment.context.clone();
        merge_json(&mut payload, &output);
        match pipeline.evaluate(&payload).await {
            Ok(result) => ExecutionOutcome::Gated(result),
            Err(e) => ExecutionOutcome::GateFailed(e.to_string()),
        }
    }

    /// Apply the result of an execution.
    ///
    /// A completion for a task that is no longer `InProgress` (for example
    /// cancelled meanwhile) is discarded; it only frees the agent if the
    /// agent is still bound to that task.
    pub async fn finalize(
        &self,
        task_id: Uuid,
        outcome: ExecutionOutcome,
    ) -> OverwatchResult<TaskStatus> {
        let now = self.now();
        let (status, message) = {
            let mut state = self.inner.state.lock().await;
            let State {
                agents,
                queue,
                recent_quality,
                ..
            } = &mut *state;
            let task = queue
                .get_mut(task_id)
                .ok_or(OverwatchError::UnknownTask(task_id))?;
            let agent = task
                .assigned_agent
                .as_deref()
                .and_then(|id| agents.get_mut(id))
                .filter(|a| a.status == AgentStatus::Busy && a.current_task == Some(task_id));

            if task.status != TaskStatus::InProgress {
                info!(task_id = %task_id, status = %task.status, "Late completion discarded");
                if let Some(agent) = agent {
                    agent.release(now);
                }
                return Ok(task.status);
            }

            let (status, severity, title, body, success, fault) = match &outcome {
                ExecutionOutcome::ExecutionFailed(reason) => (
                    TaskStatus::Failed,
                    MessageSeverity::Critical,
                    "Execution failed",
                    reason.clone(),
                    false,
                    true,
                ),
                ExecutionOutcome::GateFailed(reason) => (
                    TaskStatus::Failed,
                    MessageSeverity::Critical,
                    "Quality gate misconfigured",
                    reason.clone(),
                    false,
                    false,
                ),
                ExecutionOutcome::Gated(result) => match result.verdict {
                    Verdict::Blocked => (
                        TaskStatus::Failed,
                        MessageSeverity::Critical,
                        "Quality gate blocked",
                        result.summary(),
                        false,
                        false,
                    ),
                    Verdict::RequiresRevision => (
                        TaskStatus::Completed,
                        MessageSeverity::Warning,
                        "Completed, revision required",
                        result.summary(),
                        true,
                        false,
                    ),
                    Verdict::Approved | Verdict::ApprovedWithSuggestions => (
                        TaskStatus::Completed,
                        MessageSeverity::Success,
                        "Task completed",
                        result.summary(),
                        true,
                        false,
                    ),
                },
                ExecutionOutcome::Ungated => (
                    TaskStatus::Completed,
                    MessageSeverity::Success,
                    "Task completed",
                    String::new(),
                    true,
                    false,
                ),
            };

            task.transition(status, now);
            if status == TaskStatus::Failed {
                task.failure_reason = Some(body.clone());
            }
            if let Some(agent) = agent {
                if fault {
                    agent.fault(now);
                } else {
                    agent.release(now);
                }
            }
            if let Some(decision_id) = task.decision_id {
                self.inner.decision.record_outcome(decision_id, success);
            }

            if fault {
                error!(task_id = %task_id, agent = ?task.assigned_agent, error = %body, "Task execution failed");
            } else {
                info!(task_id = %task_id, status = %status, "Task finalized");
            }

            let mut message = task_message(severity, format!("{title}: {}", task.kind), body, task, now);
            if let ExecutionOutcome::Gated(result) = &outcome {
                recent_quality.push_back(QualityRecord {
                    task_id,
                    task_kind: task.kind.clone(),
                    result: result.clone(),
                });
                while recent_quality.len() > self.inner.config.recent_results_capacity {
                    recent_quality.pop_front();
                }
                message = message
                    .with_metadata("verdict", json!(result.verdict))
                    .with_metadata("overall_score", json!(result.overall_score))
                    .with_metadata(
                        "estimated_remediation_minutes",
                        json!(result.estimated_remediation_minutes),
                    );
            }
            (status, message)
        };

        self.emit(vec![message]).await;
        Ok(status)
    }

    /// Validate a response with the router and apply it.
    pub async fn handle_human_response(
        &self,
        message_id: Uuid,
        response: HumanResponse,
    ) -> OverwatchResult<TaskStatus> {
        let feedback = self.inner.router.resolve_response(message_id, response)?;
        self.apply_feedback(feedback).await
    }

    /// Apply an already validated human response to its task.
    ///
    /// `approve` dispatches right away when an idle agent exists, otherwise
    /// on the next tick; `modify` merges the modifications into the context
    /// and requeues; `reject` cancels.
    pub async fn apply_feedback(&self, feedback: HumanFeedback) -> OverwatchResult<TaskStatus> {
        let task_id = feedback.task_id.ok_or_else(|| {
            OverwatchError::InvalidResponse("response is not linked to a task".into())
        })?;
        let now = self.now();
        let mut outbox = Vec::new();
        let mut launch = None;

        let status = {
            let mut state = self.inner.state.lock().await;
            let task = state
                .queue
                .get_mut(task_id)
                .ok_or(OverwatchError::UnknownTask(task_id))?;
            if task.status != TaskStatus::Pending || task.awaiting_response != Some(feedback.message_id) {
                return Err(OverwatchError::InvalidResponse(format!(
                    "task {task_id} is not awaiting a response to message {}",
                    feedback.message_id
                )));
            }
            let responder = feedback
                .response
                .responder
                .clone()
                .unwrap_or_else(|| "operator".to_string());

            match feedback.response.action {
                ActionKind::Approve => {
                    task.awaiting_response = None;
                    task.human_approved = true;
                    task.updated_at = now;
                    info!(task_id = %task_id, responder = %responder, "Task approved");

                    let agent_kind = self
                        .inner
                        .task_kinds
                        .get(&task.kind)
                        .map(|k| k.agent_kind.clone());
                    let ready = state
                        .queue
                        .get(task_id)
                        .is_some_and(|t| state.queue.dependencies_met(t));
                    let agent_id = agent_kind
                        .and_then(|kind| state.agents.select_idle(&kind).map(|a| a.id.clone()));
                    if let (true, Some(agent_id)) = (ready, agent_id) {
                        if let Started::Launched(assignment) =
                            self.start(&mut state, task_id, &agent_id, now, &mut outbox)
                        {
                            launch = Some(assignment);
                        }
                    }
                    // a dispatched task is announced by its execution notice
                    if launch.is_none() {
                        if let Some(task) = state.queue.get(task_id) {
                            outbox.push(task_message(
                                MessageSeverity::Info,
                                format!("Approved: {}", task.kind),
                                format!("approved by {responder}, waiting for an agent"),
                                task,
                                now,
                            ));
                        }
                    }
                }
                ActionKind::Modify => {
                    let modifications = feedback
                        .response
                        .modifications
                        .as_ref()
                        .filter(|m| m.is_object())
                        .ok_or_else(|| {
                            OverwatchError::InvalidResponse(
                                "modify requires a JSON object of modifications".into(),
                            )
                        })?;
                    merge_json(&mut task.context, modifications);
                    task.awaiting_response = None;
                    task.human_approved = false;
                    task.decision_id = None;
                    task.transition(TaskStatus::Pending, now);
                    outbox.push(task_message(
                        MessageSeverity::Info,
                        format!("Modified and requeued: {}", task.kind),
                        format!("modified by {responder}"),
                        task,
                        now,
                    ));
                    info!(task_id = %task_id, responder = %responder, "Task modified");
                }
                ActionKind::Reject => {
                    task.awaiting_response = None;
                    task.transition(TaskStatus::Cancelled, now);
                    outbox.push(task_message(
                        MessageSeverity::Info,
                        format!("Rejected: {}", task.kind),
                        format!("rejected by {responder}"),
                        task,
                        now,
                    ));
                    info!(task_id = %task_id, responder = %responder, "Task rejected");
                }
                ActionKind::Acknowledge => {
                    return Err(OverwatchError::InvalidResponse(
                        "escalations need approve, modify or reject".into(),
                    ));
                }
            }

            state
                .queue
                .get(task_id)
                .map(|t| t.status)
                .unwrap_or(TaskStatus::Pending)
        };

        if let Some(assignment) = launch {
            self.launch(assignment);
        }
        self.emit(outbox).await;
        Ok(status)
    }

    /// Return an agent to `Idle`. Refused while the agent is busy.
    pub async fn restart_agent(&self, agent_id: &str) -> OverwatchResult<()> {
        let now = self.now();
        let message = {
            let mut state = self.inner.state.lock().await;
            let agent = state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| OverwatchError::UnknownAgent(agent_id.to_string()))?;
            if agent.status == AgentStatus::Busy {
                return Err(OverwatchError::AgentBusy(agent_id.to_string()));
            }
            let previous = agent.status;
            agent.release(now);
            info!(agent = %agent_id, previous = %previous, "Agent restarted");
            agent_message(
                MessageSeverity::Info,
                format!("Agent restarted: {agent_id}"),
                format!("previous status {previous}"),
                agent_id,
                now,
            )
        };
        self.emit(vec![message]).await;
        Ok(())
    }

    /// Take an agent out of scheduling. A task it is running keeps running;
    /// its completion is still applied.
    pub async fn disable_agent(&self, agent_id: &str) -> OverwatchResult<()> {
        let now = self.now();
        let message = {
            let mut state = self.inner.state.lock().await;
            let agent = state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| OverwatchError::UnknownAgent(agent_id.to_string()))?;
            let running = agent.current_task;
            agent.status = AgentStatus::Disabled;
            agent.current_task = None;
            agent.last_action_time = now;
            warn!(agent = %agent_id, task_id = ?running, "Agent disabled");
            agent_message(
                MessageSeverity::Warning,
                format!("Agent disabled: {agent_id}"),
                running
                    .map(|t| format!("task {t} left running"))
                    .unwrap_or_default(),
                agent_id,
                now,
            )
        };
        self.emit(vec![message]).await;
        Ok(())
    }

    /// Remove a `Pending` or `InProgress` task from scheduling.
    pub async fn cancel_task(&self, task_id: Uuid) -> OverwatchResult<()> {
        let now = self.now();
        let message = {
            let mut state = self.inner.state.lock().await;
            state.reverted.remove(&task_id);
            let task = state
                .queue
                .get_mut(task_id)
                .ok_or(OverwatchError::UnknownTask(task_id))?;
            if task.status.is_terminal() {
                return Err(OverwatchError::InvalidTask(format!(
                    "task {task_id} is already {}",
                    task.status
                )));
            }
            let was = task.status;
            if let Some(message_id) = task.awaiting_response.take() {
                self.inner.router.withdraw(message_id);
            }
            task.transition(TaskStatus::Cancelled, now);
            warn!(task_id = %task_id, was = %was, "Task cancelled");
            task_message(
                MessageSeverity::Warning,
                format!("Task cancelled: {}", task.kind),
                format!("was {was}"),
                task,
                now,
            )
        };
        self.emit(vec![message]).await;
        Ok(())
    }

    /// Put an `InProgress` task whose agent no longer runs it back to `Pending`.
    ///
    /// This is the manual recovery path after a stuck agent was forced to
    /// `Error`; it is never done automatically.
    pub async fn requeue_task(&self, task_id: Uuid) -> OverwatchResult<()> {
        let now = self.now();
        let message = {
            let mut state = self.inner.state.lock().await;
            let State { agents, queue, .. } = &mut *state;
            let task = queue
                .get_mut(task_id)
                .ok_or(OverwatchError::UnknownTask(task_id))?;
            if task.status != TaskStatus::InProgress {
                return Err(OverwatchError::InvalidTask(format!(
                    "task {task_id} is {}, not in progress",
                    task.status
                )));
            }
            let still_running = task
                .assigned_agent
                .as_deref()
                .and_then(|id| agents.get(id))
                .is_some_and(|a| a.current_task == Some(task_id));
            if still_running {
                return Err(OverwatchError::AgentBusy(format!(
                    "task {task_id} is still bound to its agent"
                )));
            }
            task.assigned_agent = None;
            task.decision_id = None;
            task.transition(TaskStatus::Pending, now);
            info!(task_id = %task_id, "Task requeued");
            task_message(
                MessageSeverity::Info,
                format!("Task requeued: {}", task.kind),
                String::new(),
                task,
                now,
            )
        };
        self.emit(vec![message]).await;
        Ok(())
    }

    /// Current agent table, queue depth and health. Never mutates.
    pub async fn status(&self) -> StatusSnapshot {
        let now = self.now();
        let state = self.inner.state.lock().await;
        StatusSnapshot {
            ticks: state.ticks,
            agents: state.agents.iter().cloned().collect(),
            queue_depth: state.queue.count(TaskStatus::Pending),
            awaiting_human: state
                .queue
                .all_tasks()
                .iter()
                .filter(|t| t.is_awaiting_human())
                .count(),
            current: HealthMetrics::compute(&state.agents, &state.queue, now),
            rolling_health: state.monitor.rolling_health(),
            recent_decisions: self
                .inner
                .decision
                .recent_decisions(self.inner.config.recent_results_capacity),
            recent_quality: state.recent_quality.iter().cloned().collect(),
        }
    }

    pub async fn task(&self, task_id: Uuid) -> Option<Task> {
        self.inner.state.lock().await.queue.get(task_id).cloned()
    }

    /// All tasks, oldest first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.inner
            .state
            .lock()
            .await
            .queue
            .all_tasks()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn agent(&self, agent_id: &str) -> Option<Agent> {
        self.inner.state.lock().await.agents.get(agent_id).cloned()
    }

    /// Wait for every in-flight execution to finish and be finalized.
    pub async fn drain(&self) {
        loop {
            let mut in_flight = std::mem::take(&mut *self.inner.in_flight.lock());
            if in_flight.is_empty() {
                break;
            }
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Execution task aborted");
                }
            }
        }
    }

    fn detect_stuck(
        &self,
        state: &mut State,
        now: DateTime<Utc>,
        outbox: &mut Vec<Message>,
    ) -> Vec<String> {
        let window = i64::try_from(self.inner.config.max_idle_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);
        let stuck = state.agents.stuck(now, window);
        for agent_id in &stuck {
            let Some(agent) = state.agents.get_mut(agent_id) else {
                continue;
            };
            let task_id = agent.current_task;
            let silent_for = now.signed_duration_since(agent.last_action_time);
            agent.fault(now);

            let timeout = OverwatchError::Timeout(format!(
                "agent {agent_id} silent for {}s",
                silent_for.num_seconds()
            ));
            warn!(agent = %agent_id, task_id = ?task_id, error = %timeout, "Agent forced to error");

            let mut message = agent_message(
                MessageSeverity::Warning,
                format!("Agent unresponsive: {agent_id}"),
                format!("{timeout}; task left in progress pending manual intervention"),
                agent_id,
                now,
            );
            if let Some(task_id) = task_id {
                message = message.for_task(task_id);
            }
            outbox.push(message);
        }
        stuck
    }

    fn adapt_autonomy(&self, agents: &mut AgentRegistry) {
        let adaptation = &self.inner.config.adaptation;
        for agent in agents.iter_mut() {
            agent.autonomy_level =
                adaptation.apply_performance(agent.autonomy_level, agent.performance_score);
        }
    }

    async fn emit(&self, outbox: Vec<Message>) {
        for message in outbox {
            self.inner.router.notify(message).await;
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .field("task_kinds", &self.inner.task_kinds.len())
            .finish_non_exhaustive()
    }
}

fn task_message(
    severity: MessageSeverity,
    title: String,
    body: String,
    task: &Task,
    now: DateTime<Utc>,
) -> Message {
    Message::new(SourceKind::Orchestrator, severity, title, body)
        .for_task(task.id)
        .with_metadata("kind", json!(task.kind))
        .with_metadata("priority", json!(task.priority))
        .at(now)
}

fn agent_message(
    severity: MessageSeverity,
    title: String,
    body: String,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Message {
    Message::new(SourceKind::Orchestrator, severity, title, body)
        .with_metadata("agent_id", json!(agent_id))
        .at(now)
}
