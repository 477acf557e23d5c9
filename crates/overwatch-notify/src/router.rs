use crate::batch::{should_batch, DigestBatcher};
use crate::channel::{DeliveryChannel, DeliveryRecord};
use crate::config::NotificationConfig;
use crate::response::{HumanFeedback, HumanResponse};
use crate::routing::{DeliveryPlan, RoutingPolicy};
use futures_util::future::join_all;
use overwatch_core::{
    ActionKind, Clock, Message, MessageSeverity, OverwatchError, OverwatchResult, SystemClock,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to one notified message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// Sent now on `succeeded`/`failed`, and later on `scheduled`.
    Delivered {
        succeeded: Vec<String>,
        failed: Vec<String>,
        scheduled: Vec<String>,
    },
    /// Folded into the digest bucket starting at `bucket_start` (unix seconds).
    Batched { bucket_start: i64 },
    /// No route exists for the message's severity.
    NoRoute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyOutcome {
    pub message_id: Uuid,
    pub disposition: Disposition,
}

type DeliveryLog = Arc<Mutex<VecDeque<DeliveryRecord>>>;

/// Routes operator messages to delivery channels.
///
/// Build it with [`NotificationRouter::new`] and [`add_channel`](Self::add_channel),
/// then share it behind an `Arc`. `notify` never fails as a whole: per-channel
/// failures are logged and recorded in the delivery log.
pub struct NotificationRouter {
    policy: RwLock<RoutingPolicy>,
    channels: BTreeMap<String, Arc<dyn DeliveryChannel>>,
    batcher: Mutex<DigestBatcher>,
    live_tx: broadcast::Sender<Message>,
    recent: Mutex<VecDeque<Message>>,
    deliveries: DeliveryLog,
    awaiting_response: Mutex<HashMap<Uuid, Message>>,
    feedback_tx: mpsc::UnboundedSender<HumanFeedback>,
    feedback_rx: Mutex<Option<mpsc::UnboundedReceiver<HumanFeedback>>>,
    clock: Arc<dyn Clock>,
}

impl NotificationRouter {
    pub fn new(config: NotificationConfig) -> Self {
        let (live_tx, _) = broadcast::channel(config.live_buffer.max(1));
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        let batcher = DigestBatcher::new(config.batching.window_secs);
        Self {
            policy: RwLock::new(RoutingPolicy::new(config)),
            channels: BTreeMap::new(),
            batcher: Mutex::new(batcher),
            live_tx,
            recent: Mutex::new(VecDeque::new()),
            deliveries: Arc::new(Mutex::new(VecDeque::new())),
            awaiting_response: Mutex::new(HashMap::new()),
            feedback_tx,
            feedback_rx: Mutex::new(Some(feedback_rx)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a delivery channel under its own name, replacing any
    /// channel with the same name.
    pub fn add_channel(&mut self, channel: Arc<dyn DeliveryChannel>) {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            warn!(channel = %name, "Replacing delivery channel");
        }
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Check the configuration and that every route names a registered channel.
    pub fn validate(&self) -> OverwatchResult<()> {
        let policy = self.policy.read();
        policy.config().validate()?;
        for route in policy.config().routes.all_routes() {
            if !self.channels.contains_key(&route.channel) {
                return Err(OverwatchError::Config(format!(
                    "route references unknown channel '{}'",
                    route.channel
                )));
            }
        }
        Ok(())
    }

    /// How often the digest loop should check for closed buckets.
    pub fn digest_period(&self) -> Duration {
        Duration::from_secs(self.policy.read().config().batching.flush_interval_secs.max(1))
    }

    pub fn set_availability(&self, recipient: impl Into<String>, availability: f64) {
        self.policy.write().set_availability(recipient, availability);
    }

    /// Live feed of every dispatched message, including digests.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.live_tx.subscribe()
    }

    /// Route one message.
    ///
    /// Messages carrying actions are remembered until answered through
    /// [`handle_response`](Self::handle_response).
    pub async fn notify(&self, message: Message) -> NotifyOutcome {
        let now = self.clock.now();
        self.remember(&message);
        if !message.actions.is_empty() {
            self.awaiting_response.lock().insert(message.id, message.clone());
        }

        let batch = {
            let policy = self.policy.read();
            should_batch(message.severity, &policy.config().batching, now)
        };
        if batch {
            let message_id = message.id;
            let bucket_start = self.batcher.lock().add(message, now);
            debug!(message_id = %message_id, bucket_start, "Notification batched");
            return NotifyOutcome {
                message_id,
                disposition: Disposition::Batched { bucket_start },
            };
        }

        self.dispatch(message).await
    }

    /// Deliver a message now, bypassing batching.
    async fn dispatch(&self, message: Message) -> NotifyOutcome {
        let message_id = message.id;
        let (plans, timeout) = {
            let policy = self.policy.read();
            let plans = if message.severity == MessageSeverity::Critical {
                policy.plan_fanout(&message, self.channels.keys().map(String::as_str))
            } else {
                policy.plan(&message)
            };
            (plans, Duration::from_secs(policy.config().delivery_timeout_secs.max(1)))
        };

        // no receivers is not an error
        let _ = self.live_tx.send(message.clone());

        if plans.is_empty() {
            warn!(message_id = %message_id, severity = %message.severity, "No route for notification");
            return NotifyOutcome {
                message_id,
                disposition: Disposition::NoRoute,
            };
        }

        info!(
            message_id = %message_id,
            severity = %message.severity,
            channels = plans.len(),
            "Routing notification"
        );

        let message = Arc::new(message);
        let (immediate, delayed): (Vec<DeliveryPlan>, Vec<DeliveryPlan>) =
            plans.into_iter().partition(|p| p.delay.is_zero());

        let mut scheduled = Vec::with_capacity(delayed.len());
        for plan in delayed {
            let attempt = self.attempt(&plan, &message, timeout);
            scheduled.push(plan.channel.clone());
            let delay = plan.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                attempt.run().await;
            });
        }

        let results = join_all(
            immediate
                .iter()
                .map(|plan| self.attempt(plan, &message, timeout).run()),
        )
        .await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (plan, ok) in immediate.into_iter().zip(results) {
            if ok {
                succeeded.push(plan.channel);
            } else {
                failed.push(plan.channel);
            }
        }

        NotifyOutcome {
            message_id,
            disposition: Disposition::Delivered {
                succeeded,
                failed,
                scheduled,
            },
        }
    }

    fn attempt(&self, plan: &DeliveryPlan, message: &Arc<Message>, timeout: Duration) -> Attempt {
        let capacity = self.policy.read().config().delivery_log_capacity;
        Attempt {
            channel_name: plan.channel.clone(),
            channel: self.channels.get(&plan.channel).cloned(),
            priority: plan.priority,
            message: Arc::clone(message),
            timeout,
            log: Arc::clone(&self.deliveries),
            capacity,
            clock: Arc::clone(&self.clock),
        }
    }

    /// Emit one digest per closed bucket, or per non-empty bucket when `force`.
    pub async fn flush_digests(&self, force: bool) -> Vec<NotifyOutcome> {
        let now = self.clock.now();
        let digests = self.batcher.lock().take_ready(now, force);
        let mut outcomes = Vec::with_capacity(digests.len());
        for digest in digests {
            info!(message_id = %digest.id, title = %digest.title, "Flushing digest");
            self.remember(&digest);
            outcomes.push(self.dispatch(digest).await);
        }
        outcomes
    }

    pub fn pending_batched(&self) -> usize {
        self.batcher.lock().pending()
    }

    /// Run [`flush_digests`](Self::flush_digests) every `period` until
    /// `shutdown` flips to `true`, then force a final flush.
    pub fn spawn_digest_loop(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.flush_digests(false).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            self.flush_digests(true).await;
            info!("Digest loop stopped");
        })
    }

    /// Validate a response against the message it answers and consume it.
    ///
    /// A message is answered exactly once; a second response fails with
    /// `UnknownMessage`.
    pub fn resolve_response(
        &self,
        message_id: Uuid,
        response: HumanResponse,
    ) -> OverwatchResult<HumanFeedback> {
        let mut awaiting = self.awaiting_response.lock();
        let message = awaiting
            .get(&message_id)
            .ok_or(OverwatchError::UnknownMessage(message_id))?;

        if !message.actions.iter().any(|a| a.kind == response.action) {
            return Err(OverwatchError::InvalidResponse(format!(
                "message {message_id} does not offer a {:?} action",
                response.action
            )));
        }
        if response.action == ActionKind::Modify
            && !response.modifications.as_ref().is_some_and(|m| m.is_object())
        {
            return Err(OverwatchError::InvalidResponse(
                "modify requires a JSON object of modifications".into(),
            ));
        }

        let task_id = message.task_id();
        awaiting.remove(&message_id);
        Ok(HumanFeedback {
            message_id,
            task_id,
            response,
            received_at: self.clock.now(),
        })
    }

    /// Resolve a response and forward it to the feedback consumer.
    pub fn handle_response(
        &self,
        message_id: Uuid,
        response: HumanResponse,
    ) -> OverwatchResult<HumanFeedback> {
        let feedback = self.resolve_response(message_id, response)?;
        info!(
            message_id = %message_id,
            action = ?feedback.response.action,
            responder = feedback.response.responder.as_deref().unwrap_or("unknown"),
            "Human response received"
        );
        if self.feedback_tx.send(feedback.clone()).is_err() {
            debug!(message_id = %message_id, "No feedback consumer attached");
        }
        Ok(feedback)
    }

    /// Take the receiving half of the feedback channel.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_feedback_receiver(&self) -> Option<mpsc::UnboundedReceiver<HumanFeedback>> {
        self.feedback_rx.lock().take()
    }

    /// Stop accepting responses to a message, for example because the task
    /// it asked about was cancelled. Returns whether it was still open.
    pub fn withdraw(&self, message_id: Uuid) -> bool {
        let withdrawn = self.awaiting_response.lock().remove(&message_id).is_some();
        if withdrawn {
            debug!(message_id = %message_id, "Pending response withdrawn");
        }
        withdrawn
    }

    pub fn awaiting_responses(&self) -> Vec<Uuid> {
        self.awaiting_response.lock().keys().copied().collect()
    }

    /// Most recent messages, newest first.
    pub fn recent_messages(&self, limit: usize) -> Vec<Message> {
        self.recent.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Delivery attempts, oldest first.
    pub fn delivery_log(&self) -> Vec<DeliveryRecord> {
        self.deliveries.lock().iter().cloned().collect()
    }

    fn remember(&self, message: &Message) {
        let capacity = self.policy.read().config().recent_messages_capacity;
        let mut recent = self.recent.lock();
        recent.push_back(message.clone());
        while recent.len() > capacity {
            recent.pop_front();
        }
    }
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("channels", &self.channel_names())
            .field("pending_batched", &self.pending_batched())
            .finish_non_exhaustive()
    }
}

/// One self-contained channel attempt, movable into a spawned task.
struct Attempt {
    channel_name: String,
    channel: Option<Arc<dyn DeliveryChannel>>,
    priority: u8,
    message: Arc<Message>,
    timeout: Duration,
    log: DeliveryLog,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl Attempt {
    async fn run(self) -> bool {
        let result = match &self.channel {
            Some(channel) => match tokio::time::timeout(self.timeout, channel.send(&self.message)).await {
                Ok(result) => result,
                Err(_) => Err(OverwatchError::Timeout(format!(
                    "delivery on '{}' exceeded {:?}",
                    self.channel_name, self.timeout
                ))),
            },
            None => Err(OverwatchError::delivery(&self.channel_name, "channel not registered")),
        };

        let error = match &result {
            Ok(()) => {
                debug!(message_id = %self.message.id, channel = %self.channel_name, "Delivered");
                None
            }
            Err(e) => {
                warn!(
                    message_id = %self.message.id,
                    channel = %self.channel_name,
                    error = %e,
                    "Delivery failed"
                );
                Some(e.to_string())
            }
        };

        let record = DeliveryRecord {
            message_id: self.message.id,
            channel: self.channel_name,
            success: error.is_none(),
            error,
            priority: self.priority,
            at: self.clock.now(),
        };
        let mut log = self.log.lock();
        log.push_back(record);
        while log.len() > self.capacity {
            log.pop_front();
        }

        result.is_ok()
    }
}
