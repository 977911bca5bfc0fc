//! Progress record data model
//!
//! A [`ProgressRecord`] is one immutable observation of a task: its identity,
//! its parent linkage, a display name, and a tagged [`Completion`] state.
//! Records are never mutated after construction; producers emit a new record
//! per observation.
//!
//! On the wire a record flattens to camelCase fields `id`, `parentId`,
//! `fraction` (null when indeterminate), `name`, and `done`. `done` is the
//! sole terminal authority: a consumer must treat `done = true` as final no
//! matter what `fraction` says.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::TaskId;

/// Completion state of a task at one observation
///
/// Replaces the historical overloading of NaN / null / `"done"` / `>= 1.0`
/// with one tagged representation. `InProgress` carries the raw fraction and
/// does not clamp: a fraction at or above 1.0 with no `Done` means "100% but
/// still running", never terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completion {
    /// Completion ratio unknown (unbounded or unmeasured work)
    Indeterminate,
    /// Fraction complete, nominally in `(0, 1]`
    InProgress(f64),
    /// Terminal: no further records should be emitted for this id
    Done,
}

impl Completion {
    /// Classify a raw fraction; NaN maps to indeterminate
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction.is_nan() {
            Completion::Indeterminate
        } else {
            Completion::InProgress(fraction)
        }
    }

    /// The numeric fraction, if one is known
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Completion::InProgress(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether this state is terminal
    pub fn is_done(&self) -> bool {
        matches!(self, Completion::Done)
    }

    /// Legacy scalar encoding for naive consumers
    ///
    /// `null` when indeterminate, the bare number when in progress, the
    /// literal string `"done"` when terminal. Lossy: it cannot distinguish
    /// "not yet started" from "actively indeterminate" - consumers that care
    /// read the full record instead.
    pub fn legacy_progress(&self) -> Value {
        match self {
            Completion::Indeterminate => Value::Null,
            Completion::InProgress(f) => serde_json::json!(f),
            Completion::Done => Value::String("done".to_string()),
        }
    }
}

/// One immutable progress observation
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    /// Id of the task this observation describes
    pub id: TaskId,
    /// Id of the enclosing scope, or [`TaskId::ROOT`] at top level
    pub parent_id: TaskId,
    /// Display label, inherited from the scope that emitted the record
    pub name: String,
    /// Tagged completion state
    pub completion: Completion,
}

impl ProgressRecord {
    /// Build a record from its parts
    pub fn new(id: TaskId, parent_id: TaskId, name: impl Into<String>, completion: Completion) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            completion,
        }
    }

    /// The non-terminal indeterminate record emitted when a scope begins
    pub fn begin(id: TaskId, parent_id: TaskId, name: impl Into<String>) -> Self {
        Self::new(id, parent_id, name, Completion::Indeterminate)
    }

    /// An in-progress record for a raw fraction (NaN means indeterminate)
    pub fn update(id: TaskId, parent_id: TaskId, name: impl Into<String>, fraction: f64) -> Self {
        Self::new(id, parent_id, name, Completion::from_fraction(fraction))
    }

    /// The terminal record emitted exactly once when a scope exits
    ///
    /// Caller contract: once a terminal record has been emitted for an id,
    /// no further records for that id should follow. The core does not
    /// enforce this across calls.
    pub fn terminal(id: TaskId, parent_id: TaskId, name: impl Into<String>) -> Self {
        Self::new(id, parent_id, name, Completion::Done)
    }

    /// Whether this record is terminal
    pub fn done(&self) -> bool {
        self.completion.is_done()
    }

    /// The numeric fraction, if one is known
    pub fn fraction(&self) -> Option<f64> {
        self.completion.fraction()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRef<'a> {
    id: TaskId,
    parent_id: TaskId,
    fraction: Option<f64>,
    name: &'a str,
    done: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wire {
    id: TaskId,
    parent_id: TaskId,
    #[serde(default)]
    fraction: Option<f64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
}

impl Serialize for ProgressRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        WireRef {
            id: self.id,
            parent_id: self.parent_id,
            fraction: self.completion.fraction(),
            name: &self.name,
            done: self.completion.is_done(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProgressRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = Wire::deserialize(deserializer)?;
        // done is authoritative regardless of the fraction value
        let completion = if wire.done {
            Completion::Done
        } else {
            match wire.fraction {
                None => Completion::Indeterminate,
                Some(f) => Completion::from_fraction(f),
            }
        };
        Ok(ProgressRecord {
            id: wire.id,
            parent_id: wire.parent_id,
            name: wire.name,
            completion,
        })
    }
}
