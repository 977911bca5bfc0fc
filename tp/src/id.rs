//! Task identity generation
//!
//! Every progress scope is identified by a 128-bit `TaskId`. Fresh ids come
//! from UUIDv7; derived ids hash an arbitrary caller-supplied key into the
//! same space via UUIDv5 under a fixed namespace, so externally tracked keys
//! map to stable identities without the caller holding onto a generated id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for derived ids. Fixed so [`TaskId::derive`] produces the same
/// id for the same key across processes and versions.
const DERIVE_NAMESPACE: Uuid = uuid::uuid!("8f9c2d4e-1a6b-4c3f-9e70-5d2b8a41c6f3");

/// Unique identifier for one logical task or scope
///
/// The all-zero id is reserved as [`TaskId::ROOT`], the parent sentinel for
/// top-level scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Parent sentinel for scopes with no logical parent
    pub const ROOT: TaskId = TaskId(Uuid::nil());

    /// Generate a fresh, statistically unique id
    pub fn new() -> Self {
        TaskId(Uuid::now_v7())
    }

    /// Derive a stable id from an arbitrary key
    ///
    /// Deterministic: the same key always yields the same id. Use this when
    /// an external system already tracks work by its own key (a log line's
    /// ad hoc id field, a loop index) and no generated id is being carried.
    pub fn derive(key: impl AsRef<[u8]>) -> Self {
        TaskId(Uuid::new_v5(&DERIVE_NAMESPACE, key.as_ref()))
    }

    /// Whether this is the root sentinel
    pub fn is_root(&self) -> bool {
        self.0.is_nil()
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        TaskId(uuid)
    }
}

impl From<TaskId> for Uuid {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_ids_are_unique() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert_ne!(a, b);
        assert!(!a.is_root());
    }

    #[test]
    fn test_root_is_all_zero() {
        assert!(TaskId::ROOT.is_root());
        assert_eq!(TaskId::ROOT.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = TaskId::derive("request-42");
        let b = TaskId::derive("request-42");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_distinct_keys() {
        assert_ne!(TaskId::derive("request-42"), TaskId::derive("request-43"));
    }

    #[test]
    fn test_derive_never_yields_root() {
        assert!(!TaskId::derive("").is_root());
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let id = TaskId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    proptest! {
        #[test]
        fn prop_derive_pure(key: Vec<u8>) {
            prop_assert_eq!(TaskId::derive(&key), TaskId::derive(&key));
        }

        #[test]
        fn prop_derive_distinct(a: Vec<u8>, b: Vec<u8>) {
            prop_assume!(a != b);
            prop_assert_ne!(TaskId::derive(&a), TaskId::derive(&b));
        }
    }
}
