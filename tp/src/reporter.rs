//! Reporter - the instrumentation-facing surface
//!
//! The three entry points the instrumentation layer calls: begin a scope
//! ([`Reporter::scope`]), report an update ([`Reporter::update`] against the
//! ambient scope, [`Reporter::emit`] with an explicit record), and drive an
//! iteration (the `drive*`/`collect*` family in [`crate::drive`]). One
//! reporter is cheap to clone and shares its sink.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ReporterConfig;
use crate::emit::{LogSink, ProgressBus, ProgressEntry, ProgressSink, Tee};
use crate::error::ProgressError;
use crate::id::TaskId;
use crate::record::ProgressRecord;
use crate::scope::{self, ScopeGuard, ScopeOptions};

/// Progress reporter bound to a sink
#[derive(Clone)]
pub struct Reporter {
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) config: ReporterConfig,
}

impl Reporter {
    /// Reporter publishing through the structured-logging channel
    pub fn new() -> Self {
        Self::with_sink(Arc::new(LogSink))
    }

    /// Reporter publishing to the given sink with default configuration
    pub fn with_sink(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            config: ReporterConfig::default(),
        }
    }

    /// Reporter with explicit configuration
    ///
    /// Fails on malformed configuration (see [`ReporterConfig::validate`]).
    pub fn with_config(sink: Arc<dyn ProgressSink>, config: ReporterConfig) -> eyre::Result<Self> {
        config.validate()?;
        Ok(Self { sink, config })
    }

    /// Reporter that logs and also feeds an in-process monitor bus
    pub fn with_monitor() -> (Self, Arc<ProgressBus>) {
        let config = ReporterConfig::default();
        let bus = Arc::new(ProgressBus::new(config.channel_capacity));
        let sink: Arc<dyn ProgressSink> = Arc::new(Tee::new(LogSink, bus.clone()));
        (Self { sink, config }, bus)
    }

    /// The configured emission threshold for driven loops
    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Begin a scope under the ambient parent
    ///
    /// Emits one non-terminal indeterminate record; the returned guard
    /// emits the terminal record when dropped.
    pub fn scope(&self, name: impl Into<String>) -> eyre::Result<ScopeGuard> {
        ScopeGuard::enter(self.sink.clone(), name, None)
    }

    /// Begin a scope with explicit options
    pub fn scope_with(&self, name: impl Into<String>, options: ScopeOptions) -> eyre::Result<ScopeGuard> {
        ScopeGuard::enter(self.sink.clone(), name, options.parent)
    }

    /// Id of the innermost active scope on this thread, or [`TaskId::ROOT`]
    pub fn current_scope() -> TaskId {
        scope::current_scope()
    }

    /// Report a fraction against the ambient scope
    ///
    /// Usage error when no scope is active on this thread; scope-less code
    /// emits with an explicit record via [`Reporter::emit`] instead.
    pub fn update(&self, fraction: f64) -> eyre::Result<()> {
        self.update_with(fraction, Map::new())
    }

    /// Report a fraction against the ambient scope, with extra fields
    pub fn update_with(&self, fraction: f64, extra: Map<String, Value>) -> eyre::Result<()> {
        let frame = scope::ambient_frame().ok_or(ProgressError::NoActiveScope)?;
        debug!(id = %frame.id, fraction, "Reporter::update");
        let record = ProgressRecord::update(frame.id, frame.parent_id, frame.name, fraction);
        self.sink.publish(&ProgressEntry::new(record, extra))
    }

    /// Publish a record as-is
    pub fn report(&self, record: ProgressRecord) -> eyre::Result<()> {
        self.emit(record, Map::new())
    }

    /// Publish a record with caller-supplied extra fields merged in
    ///
    /// Explicit values win field collisions, including the computed
    /// `progress` scalar. One publication per call, fire-and-forget; sink
    /// failures propagate unchanged.
    pub fn emit(&self, record: ProgressRecord, extra: Map<String, Value>) -> eyre::Result<()> {
        self.sink.publish(&ProgressEntry::new(record, extra))
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::MemorySink;
    use crate::record::Completion;

    fn reporter() -> (Reporter, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Reporter::with_sink(sink.clone()), sink)
    }

    #[test]
    fn test_update_without_scope_is_usage_error() {
        let (reporter, sink) = reporter();
        let err = reporter.update(0.5).unwrap_err();
        assert!(err.to_string().contains("no active progress scope"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_update_inherits_ambient_scope_name() {
        let (reporter, sink) = reporter();
        let guard = reporter.scope("ingest").unwrap();
        reporter.update(0.3).unwrap();

        let entries = sink.entries();
        assert_eq!(entries[1].record.id, guard.id());
        assert_eq!(entries[1].record.name, "ingest");
        assert_eq!(entries[1].record.fraction(), Some(0.3));
    }

    #[test]
    fn test_emit_with_explicit_identity_needs_no_scope() {
        let (reporter, sink) = reporter();
        let id = TaskId::derive("external-7");
        reporter
            .report(ProgressRecord::update(id, TaskId::ROOT, "external", 0.9))
            .unwrap();

        let entries = sink.entries();
        assert_eq!(entries[0].record.id, id);
    }

    #[test]
    fn test_emit_merges_extra_fields() {
        let (reporter, sink) = reporter();
        let mut extra = Map::new();
        extra.insert("worker".to_string(), serde_json::json!("w-3"));

        reporter
            .emit(
                ProgressRecord::new(TaskId::new(), TaskId::ROOT, "x", Completion::InProgress(0.5)),
                extra,
            )
            .unwrap();

        let entries = sink.entries();
        assert_eq!(entries[0].fields.get("worker"), Some(&serde_json::json!("w-3")));
        assert_eq!(entries[0].progress_field(), &serde_json::json!(0.5));
    }

    #[test]
    fn test_with_config_rejects_bad_threshold() {
        let sink = Arc::new(MemorySink::new());
        let config = ReporterConfig {
            threshold: -1.0,
            ..Default::default()
        };
        assert!(Reporter::with_config(sink, config).is_err());
    }

    #[test]
    fn test_with_monitor_feeds_bus() {
        let (reporter, bus) = Reporter::with_monitor();
        let mut rx = bus.subscribe();

        let guard = reporter.scope("watched").unwrap();
        drop(guard);

        let begin = rx.try_recv().unwrap();
        let terminal = rx.try_recv().unwrap();
        assert!(!begin.record.done());
        assert!(terminal.record.done());
        assert_eq!(begin.record.id, terminal.record.id);
    }
}
