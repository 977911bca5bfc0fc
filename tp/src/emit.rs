//! Progress emission - sinks and the monitor bus
//!
//! Every progress observation is published exactly once, fire-and-forget:
//! no buffering, no batching, no retry. The [`ProgressSink`] trait is the
//! seam to the host's structured-logging channel; [`LogSink`] is the default
//! implementation and publishes through `tracing` under the dedicated
//! [`PROGRESS_TARGET`] at DEBUG, below standard INFO filtering, so progress
//! traffic is dropped by default and selectively enabled with an env-filter
//! directive like `progress=debug`.
//!
//! ```text
//!  Reporter / ScopeGuard / driver
//!            │ publish(entry)
//!            ▼
//!     ┌─────────────┐      ┌──────────────┐
//!     │   LogSink   │      │ ProgressBus  │
//!     │  (tracing)  │      │ (broadcast)  │
//!     └─────────────┘      └──────┬───────┘
//!                                 │ subscribe()
//!                          in-process monitors
//! ```
//!
//! [`Tee`] fans one publication out to both.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::record::ProgressRecord;

/// Dedicated tracing target for progress traffic
pub const PROGRESS_TARGET: &str = "progress";

/// Conventional field name carrying the record id for consumers that match
/// on message identity rather than parsing the payload
pub const CORRELATION_FIELD: &str = "correlation_id";

/// Default monitor channel capacity (entries)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// One published progress observation
///
/// Carries the full structured record alongside the flat key/value fields,
/// so naive consumers can read the lossy `progress` scalar while monitors
/// recover the rich record from the same entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Timestamp of the emission
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The full structured record
    pub record: ProgressRecord,
    /// Flat fields: the legacy `progress` scalar, the correlation id, and
    /// any caller-supplied extras (last write wins on collisions)
    pub fields: Map<String, Value>,
}

impl ProgressEntry {
    /// Build an entry for a record, merging caller-supplied extra fields
    ///
    /// The computed fields come first, so an explicit `progress` (or
    /// `correlation_id`) in `extra` overrides the computed value.
    pub fn new(record: ProgressRecord, extra: Map<String, Value>) -> Self {
        let mut fields = Map::new();
        fields.insert("progress".to_string(), record.completion.legacy_progress());
        fields.insert(CORRELATION_FIELD.to_string(), Value::String(record.id.to_string()));
        for (key, value) in extra {
            fields.insert(key, value);
        }
        Self {
            timestamp: Utc::now(),
            record,
            fields,
        }
    }

    /// The flat `progress` scalar as published
    pub fn progress_field(&self) -> &Value {
        self.fields.get("progress").unwrap_or(&Value::Null)
    }
}

/// Destination for published progress entries
///
/// Implementations publish one entry per call and must not buffer, batch,
/// or retry. Failures in the underlying channel propagate unchanged.
pub trait ProgressSink: Send + Sync {
    /// Publish one entry
    fn publish(&self, entry: &ProgressEntry) -> eyre::Result<()>;
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn publish(&self, entry: &ProgressEntry) -> eyre::Result<()> {
        (**self).publish(entry)
    }
}

/// Sink publishing through the structured-logging channel
///
/// Emits one tracing event per entry under [`PROGRESS_TARGET`] at DEBUG,
/// with the flat scalar fields and the serialized record attached as
/// `payload`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn publish(&self, entry: &ProgressEntry) -> eyre::Result<()> {
        let payload = serde_json::to_string(entry)?;
        debug!(
            target: PROGRESS_TARGET,
            id = %entry.record.id,
            parent_id = %entry.record.parent_id,
            name = %entry.record.name,
            progress = %entry.progress_field(),
            done = entry.record.done(),
            payload = %payload,
            "progress"
        );
        Ok(())
    }
}

/// In-process pub/sub channel for progress entries
///
/// Monitors subscribe to receive every entry published after subscription.
/// Publication is fire-and-forget: no subscribers is not an error, and a
/// full channel drops the oldest entries for lagging receivers.
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEntry>,
}

impl ProgressBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "ProgressBus::new: creating bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a bus with [`DEFAULT_CHANNEL_CAPACITY`]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Subscribe to entries published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEntry> {
        debug!("ProgressBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl ProgressSink for ProgressBus {
    fn publish(&self, entry: &ProgressEntry) -> eyre::Result<()> {
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(entry.clone());
        Ok(())
    }
}

/// Fan-out to two sinks, in order
///
/// The second sink is only reached if the first succeeds; a failure
/// propagates to the caller unchanged.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: ProgressSink, B: ProgressSink> Tee<A, B> {
    /// Combine two sinks
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for Tee<A, B> {
    fn publish(&self, entry: &ProgressEntry) -> eyre::Result<()> {
        self.first.publish(entry)?;
        self.second.publish(entry)
    }
}

/// Sink that collects entries in memory
///
/// For tests and diagnostics; not intended for long-running production use
/// since entries accumulate unboundedly until taken.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ProgressEntry>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries published so far
    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Drain all collected entries
    pub fn take(&self) -> Vec<ProgressEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    /// Number of entries collected
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for MemorySink {
    fn publish(&self, entry: &ProgressEntry) -> eyre::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TaskId;
    use tokio::sync::broadcast::error::TryRecvError;

    fn record() -> ProgressRecord {
        ProgressRecord::update(TaskId::derive("emit-test"), TaskId::ROOT, "emit", 0.5)
    }

    #[test]
    fn test_entry_computes_progress_and_correlation_fields() {
        let entry = ProgressEntry::new(record(), Map::new());
        assert_eq!(entry.progress_field(), &serde_json::json!(0.5));
        assert_eq!(
            entry.fields.get(CORRELATION_FIELD),
            Some(&serde_json::json!(TaskId::derive("emit-test").to_string()))
        );
    }

    #[test]
    fn test_explicit_extra_field_wins_collisions() {
        let mut extra = Map::new();
        extra.insert("progress".to_string(), serde_json::json!("done"));
        extra.insert("attempt".to_string(), serde_json::json!(3));

        let entry = ProgressEntry::new(record(), extra);
        assert_eq!(entry.progress_field(), &serde_json::json!("done"));
        assert_eq!(entry.fields.get("attempt"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_entry_serializes_with_ts_and_record() {
        let entry = ProgressEntry::new(record(), Map::new());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("ts").is_some());
        assert_eq!(json["record"]["fraction"], serde_json::json!(0.5));
    }

    #[test]
    fn test_log_sink_publishes() {
        LogSink.publish(&ProgressEntry::new(record(), Map::new())).unwrap();
    }

    #[test]
    fn test_bus_no_subscribers_is_ok() {
        let bus = ProgressBus::new(16);
        bus.publish(&ProgressEntry::new(record(), Map::new())).unwrap();
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscriber() {
        let bus = ProgressBus::new(16);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(&ProgressEntry::new(record(), Map::new())).unwrap();

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.record.name, "emit");
    }

    #[tokio::test]
    async fn test_bus_delivers_to_all_subscribers() {
        let bus = ProgressBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(&ProgressEntry::new(record(), Map::new())).unwrap();

        assert_eq!(rx1.recv().await.unwrap().record.name, "emit");
        assert_eq!(rx2.recv().await.unwrap().record.name, "emit");
        assert!(matches!(rx1.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_tee_reaches_both_sinks() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let tee = Tee::new(a.clone(), b.clone());

        tee.publish(&ProgressEntry::new(record(), Map::new())).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_memory_sink_take_drains() {
        let sink = MemorySink::new();
        sink.publish(&ProgressEntry::new(record(), Map::new())).unwrap();
        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }
}
