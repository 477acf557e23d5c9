use chrono::{DateTime, TimeZone, Utc};
use overwatch_core::{Message, MessageSeverity, SourceKind};
use std::collections::BTreeMap;

/// Accumulates batchable messages into fixed-width time buckets.
///
/// A bucket is ready once its window has closed. Flushing a bucket yields a
/// single digest message summarizing everything that landed in it.
#[derive(Debug)]
pub struct DigestBatcher {
    window_secs: i64,
    buckets: BTreeMap<i64, Vec<Message>>,
}

impl DigestBatcher {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs: i64::try_from(window_secs.max(1)).unwrap_or(i64::MAX),
            buckets: BTreeMap::new(),
        }
    }

    /// Start of the bucket containing `at`, in unix seconds.
    pub fn bucket_start(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.window_secs) * self.window_secs
    }

    /// Queue a message, returning the start of its bucket.
    pub fn add(&mut self, message: Message, now: DateTime<Utc>) -> i64 {
        let start = self.bucket_start(now);
        self.buckets.entry(start).or_default().push(message);
        start
    }

    pub fn pending(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Remove closed buckets (or all of them when `force`) and build one
    /// digest per bucket, oldest first.
    pub fn take_ready(&mut self, now: DateTime<Utc>, force: bool) -> Vec<Message> {
        let current = self.bucket_start(now);
        let ready: Vec<i64> = self
            .buckets
            .keys()
            .copied()
            .filter(|start| force || *start < current)
            .collect();

        ready
            .into_iter()
            .filter_map(|start| {
                let messages = self.buckets.remove(&start)?;
                build_digest(start, self.window_secs, &messages, now)
            })
            .collect()
    }
}

fn build_digest(
    start: i64,
    window_secs: i64,
    messages: &[Message],
    now: DateTime<Utc>,
) -> Option<Message> {
    let severity = messages
        .iter()
        .map(|m| m.severity)
        .max_by_key(|s| s.urgency_rank())?;

    let body = messages
        .iter()
        .map(|m| format!("- [{}] {}", m.severity, m.title))
        .collect::<Vec<_>>()
        .join("\n");
    let ids: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| serde_json::Value::String(m.id.to_string()))
        .collect();
    let window_start = Utc
        .timestamp_opt(start, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    Some(
        Message::new(
            SourceKind::Router,
            severity,
            format!("Digest: {} notifications", messages.len()),
            body,
        )
        .with_metadata("digest_of", serde_json::Value::Array(ids))
        .with_metadata("window_start", serde_json::Value::String(window_start))
        .with_metadata("window_secs", serde_json::json!(window_secs))
        .at(now),
    )
}

/// Whether a message may be folded into a digest at `now`.
pub(crate) fn should_batch(
    severity: MessageSeverity,
    policy: &crate::config::BatchPolicy,
    now: DateTime<Utc>,
) -> bool {
    policy.enabled
        && severity.is_batchable()
        && !policy.quiet_hours.is_some_and(|q| q.contains(now))
}
