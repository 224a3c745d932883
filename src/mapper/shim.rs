use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

use super::error::Result;
use super::event::{EventSource, WILDCARD};
use super::storage::SharedLedger;

/// Accessor pair installed over an instrumented field.
///
/// Reads come from the private slot. Writes emit first and store afterwards, so
/// handlers see the outgoing value and a failing handler leaves the slot untouched.
#[derive(Clone)]
pub struct Shim {
    slot: String,
    ledger: SharedLedger,
    source: EventSource,
    emit_all: bool,
}

impl Shim {
    pub(crate) fn new(slot: String, ledger: SharedLedger, source: EventSource, emit_all: bool) -> Self {
        Self {
            slot,
            ledger,
            source,
            emit_all,
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn source(&self) -> &EventSource {
        &self.source
    }

    pub fn emit_all(&self) -> bool {
        self.emit_all
    }

    pub(crate) fn backed_by(&self, ledger: &SharedLedger) -> bool {
        Rc::ptr_eq(&self.ledger, ledger)
    }

    pub fn read(&self) -> Value {
        self.ledger.borrow().read(&self.slot)
    }

    pub fn write(&self, field: &str, value: Value) -> Result<()> {
        trace!("Write to '{}' (slot '{}')", field, self.slot);

        self.source.emit(field, &[value.clone(), self.read()])?;
        if self.emit_all {
            self.source.emit(
                WILDCARD,
                &[value.clone(), self.read(), Value::String(field.to_string())],
            )?;
        }

        self.ledger.borrow_mut().write(&self.slot, value);
        Ok(())
    }
}

impl fmt::Debug for Shim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shim")
            .field("slot", &self.slot)
            .field("source", &self.source.id())
            .field("emit_all", &self.emit_all)
            .finish()
    }
}
