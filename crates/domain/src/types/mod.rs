//! Domain types and models

pub mod cycle;
pub mod report;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use cycle::{CycleStats, CycleStep, InitializeOutcome, PendingWorkItem, WorkCycleCheckpoint};
pub use report::{Finding, FindingKind, ItemReport, Notification, ProcessOutcome};

/// Name of a logical worker (format worker, integrity worker, plugin, plan).
///
/// One scheduler, one checkpoint row and one slice of the work queue exist per
/// worker name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerName(String);

impl WorkerName {
    /// Wrap a worker name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for WorkerName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a work item (typically a digital object identifier).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an item identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_serialize_transparently() {
        let id = ItemId::from("obj-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""obj-42""#);

        let worker: WorkerName = serde_json::from_str(r#""integrity""#).unwrap();
        assert_eq!(worker.as_str(), "integrity");
        assert_eq!(worker.to_string(), "integrity");
    }

    #[test]
    fn item_ids_order_lexicographically() {
        let mut ids = vec![ItemId::from("b"), ItemId::from("a"), ItemId::from("c")];
        ids.sort();
        assert_eq!(ids, vec![ItemId::from("a"), ItemId::from("b"), ItemId::from("c")]);
    }
}
