//! Ambient progress scopes
//!
//! A scope is a dynamically-extended unit of work with its own identity.
//! The innermost active scope on each thread is tracked in a thread-local
//! stack, so nested code reports progress without threading ids through
//! call signatures, and concurrently active sibling scopes on different
//! threads never see each other's bindings.
//!
//! Entering a scope emits one non-terminal indeterminate record; dropping
//! the guard emits exactly one terminal record and restores whatever scope
//! was active before - on every exit path, including `?`-propagation and
//! panic unwind. Guards are `!Send`: a scope is owned exclusively by the
//! dynamic extent that opened it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::emit::{ProgressEntry, ProgressSink};
use crate::id::TaskId;
use crate::record::ProgressRecord;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ScopeFrame>> = const { RefCell::new(Vec::new()) };
}

/// One active scope on this thread's stack
#[derive(Debug, Clone)]
pub(crate) struct ScopeFrame {
    pub(crate) id: TaskId,
    pub(crate) parent_id: TaskId,
    pub(crate) name: String,
}

/// Id of the innermost active scope on this thread, or [`TaskId::ROOT`]
pub fn current_scope() -> TaskId {
    SCOPE_STACK.with(|stack| stack.borrow().last().map(|frame| frame.id).unwrap_or(TaskId::ROOT))
}

/// Snapshot of the innermost active frame, if any
pub(crate) fn ambient_frame() -> Option<ScopeFrame> {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Options for scope creation
#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    /// Explicit parent id; defaults to the ambient scope's id, or
    /// [`TaskId::ROOT`] when no scope is active
    pub parent: Option<TaskId>,
}

/// Handle to an active scope
///
/// Must be exited exactly once; dropping the guard is the exit. Holding the
/// guard across threads is prevented at compile time.
pub struct ScopeGuard {
    id: TaskId,
    parent_id: TaskId,
    name: String,
    sink: Arc<dyn ProgressSink>,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Begin a scope: emit the non-terminal begin record, then activate it
    ///
    /// If the sink rejects the begin record the scope is never activated
    /// and the error propagates.
    pub(crate) fn enter(
        sink: Arc<dyn ProgressSink>,
        name: impl Into<String>,
        parent_override: Option<TaskId>,
    ) -> eyre::Result<Self> {
        let name = name.into();
        let id = TaskId::new();
        let parent_id = parent_override.unwrap_or_else(current_scope);
        debug!(%id, %parent_id, name, "ScopeGuard::enter");

        let begin = ProgressRecord::begin(id, parent_id, name.clone());
        sink.publish(&ProgressEntry::new(begin, Map::new()))?;

        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().push(ScopeFrame {
                id,
                parent_id,
                name: name.clone(),
            });
        });

        Ok(Self {
            id,
            parent_id,
            name,
            sink,
            _not_send: PhantomData,
        })
    }

    /// Id of this scope
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Id of the enclosing scope ([`TaskId::ROOT`] at top level)
    pub fn parent_id(&self) -> TaskId {
        self.parent_id
    }

    /// Display name of this scope
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report a fraction for this scope
    pub fn update(&self, fraction: f64) -> eyre::Result<()> {
        self.update_with(fraction, Map::new())
    }

    /// Report a fraction with extra fields merged into the entry
    pub fn update_with(&self, fraction: f64, extra: Map<String, Value>) -> eyre::Result<()> {
        let record = ProgressRecord::update(self.id, self.parent_id, self.name.clone(), fraction);
        self.sink.publish(&ProgressEntry::new(record, extra))
    }

    /// Exit the scope explicitly (equivalent to dropping the guard)
    pub fn exit(self) {}
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let terminal = ProgressRecord::terminal(self.id, self.parent_id, self.name.clone());
        if let Err(e) = self.sink.publish(&ProgressEntry::new(terminal, Map::new())) {
            // Drop cannot propagate; the failure is surfaced on the error channel
            error!(id = %self.id, error = %e, "ScopeGuard::drop: failed to publish terminal record");
        }

        SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|frame| frame.id == self.id) {
                stack.remove(pos);
            }
        });
        debug!(id = %self.id, "ScopeGuard::drop: scope exited");
    }
}
