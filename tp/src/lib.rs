//! TaskProgress - structured progress events for nested units of work
//!
//! TaskProgress lets long-running loops and scoped units of work report
//! structured progress without binding to any particular progress-bar
//! implementation. It defines the event shape, the identity and nesting
//! protocol, and the emission-rate policy; rendering, persistence, and rate
//! estimation belong to downstream consumers of the emitted records.
//!
//! # Core Concepts
//!
//! - **Stable Identity**: every scope owns a 128-bit [`TaskId`]; parent
//!   links form a forest rooted at the all-zero [`TaskId::ROOT`]
//! - **Tagged Completion**: one sum type ([`Completion`]) replaces the
//!   historical NaN / null / `"done"` overloading; `Done` is the sole
//!   terminal authority
//! - **Ambient Scopes**: the current scope is thread-local, so nested code
//!   reports progress without threading ids through call signatures
//! - **Bounded Emission**: driven loops throttle updates to a configured
//!   fraction gap, so a million-element loop publishes ~200 events
//! - **Guaranteed Termination**: every begun scope emits exactly one
//!   terminal record, on every exit path including errors and panics
//!
//! # Modules
//!
//! - [`id`] - task identity generation (fresh and derived ids)
//! - [`record`] - the immutable progress record and its wire shape
//! - [`scope`] - ambient scope stack and RAII scope guards
//! - [`emit`] - sinks, the logging channel, and the monitor bus
//! - [`drive`] - the fractional-progress driver for loops/comprehensions
//! - [`reporter`] - the instrumentation-facing surface tying it together
//!
//! # Example
//!
//! ```ignore
//! use std::ops::ControlFlow;
//! use taskprogress::Reporter;
//!
//! let reporter = Reporter::new();
//! let scope = reporter.scope("ingest")?;
//! reporter.drive("parse", 0..files.len(), |i| {
//!     parse(&files[i]);
//!     ControlFlow::Continue(())
//! })?;
//! drop(scope);
//! ```

pub mod cli;
pub mod config;
pub mod drive;
pub mod emit;
pub mod error;
pub mod id;
pub mod record;
pub mod reporter;
pub mod scope;

pub use config::ReporterConfig;
pub use drive::{DEFAULT_THRESHOLD, Grid, Throttle};
pub use emit::{
    CORRELATION_FIELD, DEFAULT_CHANNEL_CAPACITY, LogSink, MemorySink, PROGRESS_TARGET, ProgressBus, ProgressEntry,
    ProgressSink, Tee,
};
pub use error::ProgressError;
pub use id::TaskId;
pub use record::{Completion, ProgressRecord};
pub use reporter::Reporter;
pub use scope::{ScopeGuard, ScopeOptions, current_scope};
