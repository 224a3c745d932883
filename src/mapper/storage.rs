//! Private storage for instrumented fields.
//!
//! Values of instrumented fields live here under slot names drawn from the
//! ledger's own namespace, never from the record's property table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::error::{Error, Result};

/// Upper bound on name probes before giving up with [`Error::Exhausted`].
pub const MAX_PROBES: usize = 64;

/// Prepended to a slot candidate on every collision.
pub const SLOT_MARKER: char = '_';

#[derive(Debug, Clone, Default)]
pub struct PrivateStorage {
    slots: HashMap<String, Value>,
}

impl PrivateStorage {
    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.slots.get(slot)
    }

    pub fn set(&mut self, slot: &str, value: Value) {
        self.slots.insert(slot.to_string(), value);
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    pub fn remove(&mut self, slot: &str) -> Option<Value> {
        self.slots.remove(slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Bookkeeping record of one instrumented [`Record`](super::record::Record):
/// which public field is backed by which private slot, plus the slots themselves.
#[derive(Debug, Default)]
pub struct Ledger {
    fields: HashMap<String, String>,
    storage: PrivateStorage,
}

/// The ledger is shared by its hidden property and every shim it backs.
pub type SharedLedger = Rc<RefCell<Ledger>>;

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLedger {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Finds a slot name starting from `base`, prefixing [`SLOT_MARKER`] until the
    /// candidate is neither a slot nor an already mapped public field.
    pub fn allocate(&self, base: &str) -> Result<String> {
        let mut candidate = base.to_string();
        for _ in 0..MAX_PROBES {
            if !self.storage.contains(&candidate) && !self.fields.contains_key(&candidate) {
                return Ok(candidate);
            }
            candidate.insert(0, SLOT_MARKER);
        }
        Err(Error::Exhausted {
            base: base.to_string(),
            attempts: MAX_PROBES,
        })
    }

    /// Moves `value` into a fresh slot for `field` and records the mapping.
    pub fn adopt(&mut self, field: &str, value: Value) -> Result<String> {
        if let Some(slot) = self.fields.get(field).cloned() {
            self.storage.set(&slot, value);
            return Ok(slot);
        }
        let slot = self.allocate(field)?;
        self.storage.set(&slot, value);
        self.fields.insert(field.to_string(), slot.clone());
        Ok(slot)
    }

    pub fn slot_of(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Drops the mapping for `field` together with its slot.
    pub fn forget(&mut self, field: &str) -> Option<Value> {
        let slot = self.fields.remove(field)?;
        self.storage.remove(&slot)
    }

    pub fn is_mapped(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Public field names currently backed by a slot.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// `(public field, slot)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, s)| (f.as_str(), s.as_str()))
    }

    pub fn read(&self, slot: &str) -> Value {
        self.storage.get(slot).cloned().unwrap_or(Value::Null)
    }

    pub fn write(&mut self, slot: &str, value: Value) {
        self.storage.set(slot, value);
    }

    pub fn storage(&self) -> &PrivateStorage {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
