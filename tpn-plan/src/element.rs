//! Element identity: ids, names and the process-wide serial counter.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide serial counter.
pub fn next_serial() -> u64 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a named element.
///
/// Default ids are `<Kind>_<serial>` and default names are the id prefixed
/// with an underscore. The serial is unique per process even when the id is
/// overridden, and doubles as the key of a choice in guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    serial: u64,
    id: String,
    name: String,
}

impl Identity {
    /// Allocate a fresh identity for an element of `kind`.
    pub fn allocate(kind: &str) -> Self {
        let serial = next_serial();
        let id = format!("{}_{}", kind, serial);
        let name = format!("_{}", id);
        Self { serial, id, name }
    }

    /// Allocate an identity, overriding the defaults that are given.
    pub fn resolve(kind: &str, id: Option<String>, name: Option<String>) -> Self {
        let mut identity = Self::allocate(kind);
        if let Some(id) = id {
            identity = identity.with_id(id);
        }
        if let Some(name) = name {
            identity = identity.with_name(name);
        }
        identity
    }

    /// Override the id. A default name follows the new id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if self.name == format!("_{}", self.id) {
            self.name = format!("_{}", id);
        }
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
