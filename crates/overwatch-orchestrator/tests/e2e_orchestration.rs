//! End-to-end orchestration tests.
//!
//! Drives the orchestrator with a scripted executor, the real decision
//! engine, the built-in quality gate and a notification router delivering
//! into a recording channel.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use overwatch_core::{
    ManualClock, Message, MessageSeverity, OverwatchError, OverwatchResult,
};
use overwatch_decision::{DecisionAction, DecisionConfig, DecisionEngine};
use overwatch_notify::{
    DeliveryChannel, HumanResponse, NotificationConfig, NotificationRouter, RoutingTable,
};
use overwatch_orchestrator::*;
use overwatch_quality::{QualityConfig, QualityGatePipeline, Verdict};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Scripted executor: behaviour is chosen by `context.script`
// ---------------------------------------------------------------------------

struct ScriptedExecutor {
    release: Notify,
    runs: Mutex<Vec<(Uuid, String)>>,
}

impl ScriptedExecutor {
    fn runs(&self) -> Vec<(Uuid, String)> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, assignment: &Assignment) -> OverwatchResult<Value> {
        self.runs
            .lock()
            .push((assignment.task_id, assignment.agent_id.clone()));
        let script = assignment
            .context
            .get("script")
            .and_then(Value::as_str)
            .unwrap_or("clean");
        match script {
            "crash" => Err(OverwatchError::ExecutionFailure(
                "tool exited with status 137".into(),
            )),
            "leaky" => {
                let mut report = clean_report();
                report["quality"]["security"]["secrets"] = json!(1);
                Ok(report)
            }
            "hang" => {
                self.release.notified().await;
                Ok(clean_report())
            }
            _ => Ok(clean_report()),
        }
    }
}

fn clean_report() -> Value {
    json!({"quality": {
        "static": {"errors": 0, "warnings": 0},
        "architecture": {"layer_violations": 0, "max_complexity": 6},
        "performance": {"p95_latency_ms": 120.0, "regression_pct": 0.0},
        "security": {"secrets": 0, "vulnerabilities": {"critical": 0, "high": 0, "medium": 0}},
        "tests": {"coverage": 0.92, "failed": 0}
    }})
}

fn safe_signals() -> Value {
    json!({
        "complexity": 0.0, "test_coverage": 1.0, "guideline_compliance": 1.0,
        "data_quality": 1.0, "change_scope": 0.0, "production_impact": 0.0,
        "security_sensitivity": 0.0, "data_integrity_impact": 0.0,
        "rollback_complexity": 0.0, "team_availability": 1.0
    })
}

fn safe(script: &str) -> Value {
    json!({"script": script, "signals": safe_signals()})
}

/// Signals that leave only historical similarity and agent performance
/// contributing to confidence.
fn doubtful(script: &str) -> Value {
    json!({"script": script, "signals": {
        "complexity": 1.0, "test_coverage": 0.0, "guideline_compliance": 0.0,
        "data_quality": 0.0
    }})
}

// ---------------------------------------------------------------------------
// Recording channel
// ---------------------------------------------------------------------------

struct RecordingChannel {
    received: Mutex<Vec<Message>>,
}

impl RecordingChannel {
    fn with_severity(&self, severity: MessageSeverity) -> Vec<Message> {
        self.received
            .lock()
            .iter()
            .filter(|m| m.severity == severity)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn name(&self) -> &str {
        "ops"
    }

    async fn send(&self, message: &Message) -> OverwatchResult<()> {
        self.received.lock().push(message.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    orchestrator: Orchestrator,
    router: Arc<NotificationRouter>,
    ops: Arc<RecordingChannel>,
    executor: Arc<ScriptedExecutor>,
    clock: Arc<ManualClock>,
}

fn harness(agents: &[&str], config: OrchestratorConfig) -> Harness {
    harness_with(
        agents.iter().map(|id| AgentConfig::new(*id, "coder")).collect(),
        config,
    )
}

fn harness_with(agents: Vec<AgentConfig>, config: OrchestratorConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).single().unwrap(),
    ));

    let ops = Arc::new(RecordingChannel {
        received: Mutex::new(Vec::new()),
    });
    let mut router = NotificationRouter::new(NotificationConfig {
        routes: RoutingTable::single("ops"),
        ..NotificationConfig::default()
    })
    .with_clock(clock.clone());
    router.add_channel(ops.clone());
    let router = Arc::new(router);

    // prior similarity of 1.0 makes safe signals execute autonomously
    let decision = DecisionEngine::new(
        DecisionConfig {
            prior_similarity: 1.0,
            ..DecisionConfig::default()
        },
        ["coder"],
    )
    .unwrap()
    .with_clock(clock.clone());

    let quality = QualityGatePipeline::with_builtin_checkers(QualityConfig::default())
        .unwrap()
        .with_clock(clock.clone());

    let executor = Arc::new(ScriptedExecutor {
        release: Notify::new(),
        runs: Mutex::new(Vec::new()),
    });

    let orchestrator = Orchestrator::builder(config)
        .agents(agents)
        .task_kinds([
            TaskKindConfig::new("code_change", "coder"),
            TaskKindConfig::new("docs", "coder").ungated(),
        ])
        .decision_engine(Arc::new(decision))
        .quality_gate(Arc::new(quality))
        .router(router.clone())
        .executor(executor.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    Harness {
        orchestrator,
        router,
        ops,
        executor,
        clock,
    }
}

fn single_agent() -> Harness {
    harness(&["coder-1"], OrchestratorConfig {
        max_idle_secs: 600,
        ..OrchestratorConfig::default()
    })
}

impl Harness {
    async fn submit(&self, kind: &str, context: Value) -> Uuid {
        self.orchestrator
            .submit(TaskSubmission::new(kind).with_context(context))
            .await
            .unwrap()
    }

    async fn status_of(&self, task_id: Uuid) -> TaskStatus {
        self.orchestrator.task(task_id).await.unwrap().status
    }

    async fn agent_status(&self, agent_id: &str) -> AgentStatus {
        self.orchestrator.agent(agent_id).await.unwrap().status
    }

    async fn escalation_for(&self, task_id: Uuid) -> Uuid {
        self.orchestrator
            .task(task_id)
            .await
            .unwrap()
            .awaiting_response
            .expect("task should be awaiting a response")
    }

    /// Wait until the hanging executor has picked up its assignment.
    async fn wait_for_runs(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.executor.runs().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("executor never started");
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn safe_task_runs_through_gate_to_completion() {
    let h = single_agent();
    let id = h.submit("code_change", safe("clean")).await;

    let report = h.orchestrator.tick().await;
    assert_eq!(report.assigned.len(), 1);
    assert_eq!(report.assigned[0].agent_id, "coder-1");
    assert_eq!(report.assigned[0].action, DecisionAction::ExecuteAutonomously);
    assert!(report.escalated.is_empty());

    h.orchestrator.drain().await;

    let task = h.orchestrator.task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.assigned_agent.as_deref(), Some("coder-1"));
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Idle);

    let success = h.ops.with_severity(MessageSeverity::Success);
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].task_id(), Some(id));
    assert_eq!(success[0].metadata["verdict"], json!("approved"));
    // autonomous execution sends no execution notice
    assert!(h
        .ops
        .with_severity(MessageSeverity::Info)
        .iter()
        .all(|m| !m.title.starts_with("Executing")));

    // the successful outcome feeds back into historical similarity
    assert_eq!(
        h.orchestrator.decision_engine().historical_similarity("code_change"),
        1.0
    );

    let status = h.orchestrator.status().await;
    assert_eq!(status.recent_quality.len(), 1);
    assert_eq!(status.recent_quality[0].task_id, id);
    assert_eq!(status.recent_quality[0].task_kind, "code_change");
    assert_eq!(status.recent_quality[0].result.verdict, Verdict::Approved);
    assert_eq!(status.recent_decisions.len(), 1);
    assert_eq!(status.recent_decisions[0].action, DecisionAction::ExecuteAutonomously);
}

#[tokio::test]
async fn risky_task_waits_for_approval() {
    let h = single_agent();
    let id = h.submit("code_change", json!({"script": "clean"})).await;

    let report = h.orchestrator.tick().await;
    assert_eq!(report.escalated, vec![id]);
    assert!(report.assigned.is_empty());
    assert_eq!(h.status_of(id).await, TaskStatus::Pending);
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Idle);

    let escalations = h.ops.with_severity(MessageSeverity::ActionRequired);
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].actions.len(), 3);
    let message_id = h.escalation_for(id).await;
    assert_eq!(escalations[0].id, message_id);

    // an escalated task is not escalated again while it waits
    let report = h.orchestrator.tick().await;
    assert!(report.escalated.is_empty());
    assert!(report.assigned.is_empty());
    assert_eq!(h.orchestrator.status().await.awaiting_human, 1);

    let status = h
        .orchestrator
        .handle_human_response(message_id, HumanResponse::approve().by("dana"))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::InProgress);

    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
    assert_eq!(h.executor.runs().len(), 1);

    // the immediate dispatch is announced once
    let info = h.ops.with_severity(MessageSeverity::Info);
    assert_eq!(info.iter().filter(|m| m.title.starts_with("Executing")).count(), 1);
    assert!(info.iter().all(|m| !m.title.starts_with("Approved")));

    // a message is answered exactly once
    let again = h
        .orchestrator
        .handle_human_response(message_id, HumanResponse::approve())
        .await;
    assert!(matches!(again, Err(OverwatchError::UnknownMessage(_))));
}

#[tokio::test]
async fn modify_merges_context_and_requeues() {
    let h = single_agent();
    let id = h.submit("code_change", json!({"script": "clean"})).await;
    h.orchestrator.tick().await;
    let message_id = h.escalation_for(id).await;

    let status = h
        .orchestrator
        .handle_human_response(
            message_id,
            HumanResponse::modify(json!({"signals": safe_signals()})),
        )
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Pending);

    let task = h.orchestrator.task(id).await.unwrap();
    assert_eq!(task.context["script"], json!("clean"));
    assert_eq!(task.context["signals"]["test_coverage"], json!(1.0));
    assert!(task.awaiting_response.is_none());

    let report = h.orchestrator.tick().await;
    assert_eq!(report.assigned.len(), 1);
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
}

#[tokio::test]
async fn reject_cancels_without_running() {
    let h = single_agent();
    let id = h.submit("code_change", json!({})).await;
    h.orchestrator.tick().await;
    let message_id = h.escalation_for(id).await;

    let status = h
        .orchestrator
        .handle_human_response(message_id, HumanResponse::reject())
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Cancelled);

    let report = h.orchestrator.tick().await;
    assert!(report.assigned.is_empty());
    assert!(h.executor.runs().is_empty());
}

#[tokio::test]
async fn blocked_gate_fails_task_and_pages() {
    let h = single_agent();
    let id = h.submit("code_change", safe("leaky")).await;
    h.orchestrator.tick().await;
    h.orchestrator.drain().await;

    let task = h.orchestrator.task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.failure_reason.is_some());
    // a gate block is not an agent fault
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Idle);

    let critical = h.ops.with_severity(MessageSeverity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].metadata["verdict"], json!("blocked"));
    let recent = h.orchestrator.status().await.recent_quality;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].result.verdict, Verdict::Blocked);
    assert!(!recent[0].result.blockers.is_empty());
    assert_eq!(
        h.orchestrator.decision_engine().historical_similarity("code_change"),
        0.0
    );
}

#[tokio::test]
async fn ungated_kind_skips_quality_gate() {
    let h = single_agent();
    // the report would block a gated kind
    let id = h.submit("docs", safe("leaky")).await;
    h.orchestrator.tick().await;
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
    assert!(h.orchestrator.status().await.recent_quality.is_empty());
}

#[tokio::test]
async fn execution_error_faults_agent_until_restart() {
    let h = single_agent();
    let crashed = h.submit("code_change", safe("crash")).await;
    h.orchestrator.tick().await;
    h.orchestrator.drain().await;

    assert_eq!(h.status_of(crashed).await, TaskStatus::Failed);
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Error);
    assert_eq!(h.ops.with_severity(MessageSeverity::Critical).len(), 1);

    // a different kind, so the failure does not weigh on its history
    let next = h.submit("docs", safe("clean")).await;
    let report = h.orchestrator.tick().await;
    assert!(report.assigned.is_empty());
    assert_eq!(h.status_of(next).await, TaskStatus::Pending);

    h.orchestrator.restart_agent("coder-1").await.unwrap();
    let report = h.orchestrator.tick().await;
    assert_eq!(report.assigned.len(), 1);
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(next).await, TaskStatus::Completed);
}

#[tokio::test]
async fn silent_agent_is_forced_to_error() {
    let h = single_agent();
    let id = h.submit("code_change", safe("hang")).await;
    h.orchestrator.tick().await;
    h.wait_for_runs(1).await;
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Busy);

    // still bound to its agent, so it cannot be requeued
    let requeue = h.orchestrator.requeue_task(id).await;
    assert!(matches!(requeue, Err(OverwatchError::AgentBusy(_))));

    h.clock.advance(chrono::Duration::seconds(601));
    let report = h.orchestrator.tick().await;
    assert_eq!(report.stuck_agents, vec!["coder-1".to_string()]);
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Error);
    assert_eq!(h.status_of(id).await, TaskStatus::InProgress);
    let warnings = h.ops.with_severity(MessageSeverity::Warning);
    assert!(warnings.iter().any(|m| m.title.contains("unresponsive")));

    // the late result still completes the task; the agent stays faulted
    h.executor.release.notify_one();
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Error);
}

#[tokio::test]
async fn cancelled_task_discards_late_completion() {
    let h = single_agent();
    let id = h.submit("code_change", safe("hang")).await;
    h.orchestrator.tick().await;
    h.wait_for_runs(1).await;

    h.orchestrator.cancel_task(id).await.unwrap();
    assert_eq!(h.status_of(id).await, TaskStatus::Cancelled);
    assert!(h.orchestrator.cancel_task(id).await.is_err());

    // the agent is still running the cancelled work
    let restart = h.orchestrator.restart_agent("coder-1").await;
    assert!(matches!(restart, Err(OverwatchError::AgentBusy(_))));

    h.executor.release.notify_one();
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Cancelled);
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Idle);
}

#[tokio::test]
async fn dependencies_gate_eligibility() {
    let h = harness(&["coder-1", "coder-2"], OrchestratorConfig::default());
    let first = h.submit("docs", safe("clean")).await;
    let second = h
        .orchestrator
        .submit(
            TaskSubmission::new("docs")
                .with_context(safe("clean"))
                .depends_on(first),
        )
        .await
        .unwrap();

    let report = h.orchestrator.tick().await;
    let assigned: Vec<Uuid> = report.assigned.iter().map(|a| a.task_id).collect();
    assert_eq!(assigned, vec![first]);
    h.orchestrator.drain().await;

    let report = h.orchestrator.tick().await;
    let assigned: Vec<Uuid> = report.assigned.iter().map(|a| a.task_id).collect();
    assert_eq!(assigned, vec![second]);
    h.orchestrator.drain().await;

    let runs: Vec<Uuid> = h.executor.runs().into_iter().map(|(t, _)| t).collect();
    assert_eq!(runs, vec![first, second]);
}

#[tokio::test]
async fn tick_respects_assignment_cap_and_priority() {
    let h = harness(
        &["coder-1", "coder-2", "coder-3"],
        OrchestratorConfig {
            max_assignments_per_tick: 2,
            ..OrchestratorConfig::default()
        },
    );
    let low = h
        .orchestrator
        .submit(
            TaskSubmission::new("docs")
                .with_context(safe("clean"))
                .with_priority(Priority::Low),
        )
        .await
        .unwrap();
    let high = h
        .orchestrator
        .submit(
            TaskSubmission::new("docs")
                .with_context(safe("clean"))
                .with_priority(Priority::High),
        )
        .await
        .unwrap();
    let medium = h.submit("docs", safe("clean")).await;

    let report = h.orchestrator.tick().await;
    let assigned: Vec<Uuid> = report.assigned.iter().map(|a| a.task_id).collect();
    assert_eq!(assigned, vec![high, medium]);
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(low).await, TaskStatus::Pending);
}

#[tokio::test]
async fn submissions_are_validated() {
    let h = single_agent();

    let unknown = h.orchestrator.submit(TaskSubmission::new("deploy")).await;
    assert!(matches!(unknown, Err(OverwatchError::InvalidTask(_))));

    let scalar = h
        .orchestrator
        .submit(TaskSubmission::new("docs").with_context(json!([1, 2])))
        .await;
    assert!(matches!(scalar, Err(OverwatchError::InvalidTask(_))));

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    h.orchestrator
        .submit(TaskSubmission::new("docs").with_id(a).depends_on(b))
        .await
        .unwrap();
    let cycle = h
        .orchestrator
        .submit(TaskSubmission::new("docs").with_id(b).depends_on(a))
        .await;
    assert!(matches!(cycle, Err(OverwatchError::InvalidTask(_))));
    assert!(h.orchestrator.task(b).await.is_none());

    let duplicate = h.orchestrator.submit(TaskSubmission::new("docs").with_id(a)).await;
    assert!(matches!(duplicate, Err(OverwatchError::InvalidTask(_))));

    h.orchestrator
        .submit(TaskSubmission::new("docs").with_priority(Priority::Critical))
        .await
        .unwrap();
    assert_eq!(h.ops.with_severity(MessageSeverity::Critical).len(), 1);
}

#[tokio::test]
async fn status_reports_health() {
    let h = harness(&["coder-1", "coder-2"], OrchestratorConfig::default());
    h.submit("code_change", safe("crash")).await;
    h.orchestrator.tick().await;
    h.orchestrator.drain().await;
    h.orchestrator.tick().await;

    let status = h.orchestrator.status().await;
    assert_eq!(status.ticks, 2);
    assert_eq!(status.current.agents_error, 1);
    assert_eq!(status.current.tasks_failed, 1);
    // one of two agents in error, no successes
    assert!(status.current.health_score < 0.6);
    assert!(status.rolling_health.is_some());

    h.orchestrator.disable_agent("coder-2").await.unwrap();
    let status = h.orchestrator.status().await;
    assert_eq!(status.current.agents_disabled, 1);
    assert!(h.orchestrator.restart_agent("ghost").await.is_err());
}

#[tokio::test]
async fn approval_without_idle_agent_waits_for_next_tick() {
    let h = single_agent();
    let id = h.submit("code_change", json!({"script": "clean"})).await;
    h.orchestrator.tick().await;
    let message_id = h.escalation_for(id).await;

    h.orchestrator.disable_agent("coder-1").await.unwrap();
    let status = h
        .orchestrator
        .handle_human_response(message_id, HumanResponse::approve().by("dana"))
        .await
        .unwrap();
    assert_eq!(status, TaskStatus::Pending);
    let approved: Vec<Message> = h
        .ops
        .with_severity(MessageSeverity::Info)
        .into_iter()
        .filter(|m| m.title.starts_with("Approved"))
        .collect();
    assert_eq!(approved.len(), 1);
    assert!(approved[0].body.contains("dana"));

    h.orchestrator.restart_agent("coder-1").await.unwrap();
    let report = h.orchestrator.tick().await;
    assert_eq!(report.assigned.len(), 1);
    assert!(report.escalated.is_empty());
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
}

#[tokio::test]
async fn confident_work_raises_performance_then_autonomy() {
    let h = harness_with(
        vec![AgentConfig::new("coder-1", "coder").with_scores(0.995, 0.895)],
        OrchestratorConfig::default(),
    );
    let id = h.submit("code_change", safe("clean")).await;

    // autonomy is adapted before the tick's decisions, from the old score
    let report = h.orchestrator.tick().await;
    assert_eq!(report.assigned.len(), 1);
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
    let agent = h.orchestrator.agent("coder-1").await.unwrap();
    assert!((agent.performance_score - 0.905).abs() < 1e-9);
    assert!((agent.autonomy_level - 0.995).abs() < 1e-9);

    h.orchestrator.tick().await;
    assert_eq!(h.orchestrator.agent("coder-1").await.unwrap().autonomy_level, 1.0);
    h.orchestrator.tick().await;
    assert_eq!(h.orchestrator.agent("coder-1").await.unwrap().autonomy_level, 1.0);
}

#[tokio::test]
async fn doubtful_decisions_lower_performance_and_autonomy_to_floor() {
    let h = harness_with(
        vec![AgentConfig::new("coder-1", "coder").with_scores(0.55, 0.71)],
        OrchestratorConfig::default(),
    );
    let id = h.submit("code_change", doubtful("clean")).await;

    let report = h.orchestrator.tick().await;
    assert_eq!(report.escalated, vec![id]);
    let agent = h.orchestrator.agent("coder-1").await.unwrap();
    assert!((agent.performance_score - 0.69).abs() < 1e-9);
    assert!((agent.autonomy_level - 0.55).abs() < 1e-9);

    // a modified task is decided again and scores low again
    let message_id = h.escalation_for(id).await;
    h.orchestrator
        .handle_human_response(message_id, HumanResponse::modify(json!({"note": "retry"})))
        .await
        .unwrap();
    let report = h.orchestrator.tick().await;
    assert_eq!(report.escalated, vec![id]);
    let agent = h.orchestrator.agent("coder-1").await.unwrap();
    assert!((agent.performance_score - 0.67).abs() < 1e-9);
    assert!((agent.autonomy_level - 0.53).abs() < 1e-9);

    for _ in 0..3 {
        h.orchestrator.tick().await;
    }
    let agent = h.orchestrator.agent("coder-1").await.unwrap();
    assert!((agent.autonomy_level - 0.5).abs() < 1e-9);
    assert!((agent.performance_score - 0.67).abs() < 1e-9);
}

#[tokio::test]
async fn disabled_decision_kind_reverts_and_warns_once() {
    let h = single_agent();
    assert!(h.orchestrator.decision_engine().disable_kind("coder"));
    let id = h.submit("docs", safe("clean")).await;

    for _ in 0..3 {
        let report = h.orchestrator.tick().await;
        assert_eq!(report.reverted, vec![id]);
    }
    assert_eq!(h.status_of(id).await, TaskStatus::Pending);
    assert_eq!(h.agent_status("coder-1").await, AgentStatus::Idle);
    let reverted = h
        .ops
        .with_severity(MessageSeverity::Warning)
        .into_iter()
        .filter(|m| m.title.starts_with("Assignment reverted"))
        .count();
    assert_eq!(reverted, 1);

    assert!(h.orchestrator.decision_engine().enable_kind("coder"));
    let report = h.orchestrator.tick().await;
    assert_eq!(report.assigned.len(), 1);
    h.orchestrator.drain().await;
    assert_eq!(h.status_of(id).await, TaskStatus::Completed);
}

#[tokio::test]
async fn cancelling_escalated_task_withdraws_question() {
    let h = single_agent();
    let id = h.submit("code_change", json!({"script": "clean"})).await;
    h.orchestrator.tick().await;
    let message_id = h.escalation_for(id).await;
    assert_eq!(h.router.awaiting_responses(), vec![message_id]);

    h.orchestrator.cancel_task(id).await.unwrap();
    assert!(h.router.awaiting_responses().is_empty());
    let late = h
        .orchestrator
        .handle_human_response(message_id, HumanResponse::approve())
        .await;
    assert!(matches!(late, Err(OverwatchError::UnknownMessage(_))));
}

#[tokio::test]
async fn runtime_applies_responses_from_router() {
    let h = harness(
        &["coder-1"],
        OrchestratorConfig {
            tick_period_secs: 1,
            ..OrchestratorConfig::default()
        },
    );
    let id = h.submit("code_change", json!({"script": "clean"})).await;
    let runtime = Runtime::spawn(h.orchestrator.clone(), h.router.clone());

    let message_id = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(pending) = h.router.awaiting_responses().first() {
                return *pending;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task was never escalated");

    h.router
        .handle_response(message_id, HumanResponse::approve().by("dana"))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.status_of(id).await != TaskStatus::Completed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("approved task never completed");

    runtime.shutdown().await;
    assert_eq!(h.executor.runs().len(), 1);
}
