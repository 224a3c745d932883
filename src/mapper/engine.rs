//! Interception engine.
//!
//! `instrument` swaps every eligible data field of a [`Record`] for a [`Shim`]
//! that reports writes on an [`EventSource`]; `release` puts plain fields back.
//!
//! Invariants:
//! - one ledger per record, found again on every later call;
//! - a field already in the ledger is never wrapped twice;
//! - pre-existing properties are never overwritten (the embedded emitter field
//!   and the ledger name both step aside when occupied).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{Error, Result};
use super::event::EventSource;
use super::record::{Flags, Property, Record};
use super::selection::Selection;
use super::shim::Shim;
use super::storage::{Ledger, SharedLedger, MAX_PROBES};

/// Well-known field holding the embedded event source.
pub const EMITTER_FIELD: &str = "ely";

/// First candidate name for the hidden ledger field.
pub const LEDGER_FIELD: &str = "__ely_map__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// The event source is attached to the record under [`EMITTER_FIELD`].
    #[default]
    Embedded,
    /// The event source is only returned to the caller.
    Detached,
}

impl From<bool> for Mode {
    fn from(embed: bool) -> Self {
        if embed {
            Mode::Embedded
        } else {
            Mode::Detached
        }
    }
}

pub fn default_selection() -> Selection {
    Selection::default()
}

pub fn instrument_embedded(record: &mut Record, selection: Option<&Selection>) -> Result<EventSource> {
    instrument(record, Mode::Embedded, selection)
}

pub fn instrument_detached(record: &mut Record, selection: Option<&Selection>) -> Result<EventSource> {
    instrument(record, Mode::Detached, selection)
}

/// Instruments `record` in place and returns the event source its shims emit on.
///
/// Calling it again is safe: mapped fields are left alone and, in embedded mode,
/// the same source comes back. The only failure is [`Error::Exhausted`].
pub fn instrument(record: &mut Record, mode: Mode, selection: Option<&Selection>) -> Result<EventSource> {
    let fallback;
    let selection = match selection {
        Some(selection) => selection,
        None => {
            fallback = default_selection();
            &fallback
        }
    };

    // Resolve the ledger before touching the record so a failure leaves it as it was.
    let (ledger_name, ledger) = resolve_ledger(record)?;

    let (source, embed) = resolve_source(record, mode);
    if embed && !record.contains(EMITTER_FIELD) {
        record.define(
            EMITTER_FIELD,
            Property::Emitter {
                source: source.clone(),
                flags: Flags::READ_ONLY,
            },
        );
    }

    // Attached up front so shims installed before a failure can still be released.
    record.define(ledger_name.as_str(), Property::Ledger(ledger.clone()));

    prune_stale(record, &ledger);

    let candidates: Vec<String> = {
        let mapped = ledger.borrow();
        let names = record
            .keys()
            .filter(|name| *name != ledger_name && !mapped.is_mapped(name))
            .map(str::to_string)
            .collect();
        names
    };

    for name in candidates {
        let value = match record.property(&name) {
            Some(Property::Data { value, flags }) if flags.writable && flags.configurable => value.clone(),
            _ => continue,
        };
        if !selection.admits(&name) {
            continue;
        }

        let slot = ledger.borrow_mut().adopt(&name, value)?;
        debug!("Instrumented '{}' into slot '{}'", name, slot);

        let shim = Shim::new(slot, ledger.clone(), source.clone(), selection.emit_all());
        record.define(name, Property::Shim(shim));
    }

    Ok(source)
}

/// Undoes `instrument`: shims become plain fields holding their last value and the
/// ledger and embedded emitter fields are removed. A no-op on records never instrumented.
pub fn release(record: &mut Record) {
    let Some((ledger_name, ledger)) = find_ledger(record) else {
        return;
    };

    let restored: Vec<(String, serde_json::Value)> = {
        let ledger = ledger.borrow();
        let entries = ledger
            .entries()
            .map(|(field, slot)| (field.to_string(), ledger.read(slot)))
            .collect();
        entries
    };

    for (field, value) in restored {
        let owned = matches!(record.property(&field), Some(Property::Shim(shim)) if shim.backed_by(&ledger));
        if owned {
            record.define(field, Property::data(value));
        }
    }

    record.remove(&ledger_name);
    if matches!(record.property(EMITTER_FIELD), Some(Property::Emitter { .. })) {
        record.remove(EMITTER_FIELD);
    }

    debug!("Released record (ledger '{}')", ledger_name);
}

/// Forgets mapped fields whose property is no longer a shim over `ledger`, so the
/// caller's replacement can be instrumented again.
fn prune_stale(record: &Record, ledger: &SharedLedger) {
    let stale: Vec<String> = {
        let mapped = ledger.borrow();
        let stale = mapped
            .fields()
            .filter(|field| {
                !matches!(record.property(field), Some(Property::Shim(shim)) if shim.backed_by(ledger))
            })
            .map(str::to_string)
            .collect();
        stale
    };

    let mut mapped = ledger.borrow_mut();
    for field in stale {
        debug!("Field '{}' was redefined, dropping its slot", field);
        mapped.forget(&field);
    }
}

/// Name of the hidden field holding the record's ledger, if it has one.
pub fn ledger_field(record: &Record) -> Option<String> {
    find_ledger(record).map(|(name, _)| name)
}

/// Public fields currently backed by a private slot.
pub fn mapped_fields(record: &Record) -> BTreeSet<String> {
    let Some((_, ledger)) = find_ledger(record) else {
        return BTreeSet::new();
    };
    let ledger = ledger.borrow();
    let fields = ledger.fields().map(str::to_string).collect();
    fields
}

/// Picks the event source and the effective mode.
fn resolve_source(record: &Record, mode: Mode) -> (EventSource, bool) {
    if mode == Mode::Detached {
        return (EventSource::new(), false);
    }
    match record.property(EMITTER_FIELD) {
        Some(Property::Emitter { source, .. }) => (source.clone(), true),
        Some(other) => {
            warn!(
                "Field '{}' already holds a {} property, falling back to a detached source",
                EMITTER_FIELD,
                other.kind()
            );
            (EventSource::new(), false)
        }
        None => (EventSource::new(), true),
    }
}

/// `__ely_map__`, `___ely_map___`, ... up to [`MAX_PROBES`] names.
fn ledger_candidates() -> impl Iterator<Item = String> {
    std::iter::successors(Some(LEDGER_FIELD.to_string()), |name| Some(format!("_{}_", name))).take(MAX_PROBES)
}

fn find_ledger(record: &Record) -> Option<(String, SharedLedger)> {
    ledger_candidates().find_map(|name| match record.property(&name) {
        Some(Property::Ledger(ledger)) => Some((name, ledger.clone())),
        _ => None,
    })
}

/// Existing ledger if there is one, otherwise a fresh one under the first free name.
fn resolve_ledger(record: &Record) -> Result<(String, SharedLedger)> {
    if let Some(found) = find_ledger(record) {
        return Ok(found);
    }
    ledger_candidates()
        .find(|name| !record.contains(name))
        .map(|name| (name, Ledger::shared()))
        .ok_or_else(|| Error::Exhausted {
            base: LEDGER_FIELD.to_string(),
            attempts: MAX_PROBES,
        })
}
