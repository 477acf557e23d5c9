use crate::engine::Orchestrator;
use overwatch_notify::NotificationRouter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Background loops driving an [`Orchestrator`].
///
/// Three tasks run until [`RuntimeHandle::shutdown`]: the tick loop, the
/// digest flush loop of the router, and a consumer applying human responses
/// received through the router's feedback channel.
pub struct Runtime;

impl Runtime {
    /// Spawn the loops. The first tick fires immediately.
    pub fn spawn(orchestrator: Orchestrator, router: Arc<NotificationRouter>) -> RuntimeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(3);

        handles.push(spawn_tick_loop(orchestrator.clone(), shutdown_rx.clone()));
        handles.push(
            router
                .clone()
                .spawn_digest_loop(router.digest_period(), shutdown_rx.clone()),
        );
        match router.take_feedback_receiver() {
            Some(feedback) => handles.push(spawn_feedback_loop(
                orchestrator.clone(),
                feedback,
                shutdown_rx,
            )),
            None => warn!("Feedback receiver already taken, human responses will not reach the orchestrator"),
        }

        info!(
            tick_period_secs = orchestrator.config().tick_period_secs,
            "Runtime started"
        );
        RuntimeHandle {
            orchestrator,
            shutdown: shutdown_tx,
            handles,
        }
    }
}

/// Handle used to stop the runtime.
pub struct RuntimeHandle {
    orchestrator: Orchestrator,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl RuntimeHandle {
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Stop the loops, flush pending digests and wait for in-flight
    /// executions to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Runtime task ended abnormally");
            }
        }
        self.orchestrator.drain().await;
        info!("Runtime stopped");
    }
}

fn spawn_tick_loop(orchestrator: Orchestrator, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let period = Duration::from_secs(orchestrator.config().tick_period_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = orchestrator.tick().await;
                    if !report.stuck_agents.is_empty() {
                        warn!(tick = report.tick, stuck = ?report.stuck_agents, "Unresponsive agents detected");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Tick loop stopped");
    })
}

fn spawn_feedback_loop(
    orchestrator: Orchestrator,
    mut feedback: tokio::sync::mpsc::UnboundedReceiver<overwatch_notify::HumanFeedback>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = feedback.recv() => {
                    let Some(received) = received else { break };
                    let message_id = received.message_id;
                    if let Err(e) = orchestrator.apply_feedback(received).await {
                        warn!(message_id = %message_id, error = %e, "Human response not applied");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Feedback loop stopped");
    })
}
