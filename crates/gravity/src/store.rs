//! Checkpoint persistence for the coordinator.

use crate::coordinator::PendingChange;
use crate::orientation::GravityOrientation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which the coordinator stores its snapshot.
pub const GRAVITY_STATE_KEY: &str = "gravity.state";

/// Opaque key/value save-state store supplied by the host.
pub trait StateStore {
    fn persist(&mut self, key: &str, value: String) -> Result<()>;
    fn restore(&self, key: &str) -> Result<Option<String>>;
}

/// In-memory store, mostly useful for tests and the CLI.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn persist(&mut self, key: &str, value: String) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Store("empty key".into()));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn restore(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// Serialized coordinator state: the orientation plus any change requests still queued.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GravitySnapshot {
    pub orientation: GravityOrientation,
    #[serde(default)]
    pub pending: Vec<PendingChange>,
}

impl GravitySnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
