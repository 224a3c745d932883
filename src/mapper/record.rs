//! Host record model.
//!
//! A [`Record`] is a table of named properties with descriptor-like flags. Every
//! read and write dispatches on the property kind, which is what lets the mapper
//! swap a plain data field for an intercepting [`Shim`] without the record
//! changing identity.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::error::{Error, Result};
use super::event::EventSource;
use super::shim::Shim;
use super::storage::SharedLedger;

/// A behaviour stored in a field. Never instrumented.
pub type Callable = Rc<dyn Fn(&[Value]) -> Value>;
pub type Getter = Rc<dyn Fn(&Record) -> Value>;
pub type Setter = Rc<dyn Fn(&mut Record, Value) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub enumerable: bool,
    pub writable: bool,
    pub configurable: bool,
}

impl Flags {
    /// What a plain assignment produces.
    pub const PLAIN: Flags = Flags {
        enumerable: true,
        writable: true,
        configurable: true,
    };

    pub const READ_ONLY: Flags = Flags {
        enumerable: true,
        writable: false,
        configurable: true,
    };

    pub const HIDDEN: Flags = Flags {
        enumerable: false,
        writable: true,
        configurable: true,
    };
}

impl Default for Flags {
    fn default() -> Self {
        Flags::PLAIN
    }
}

pub enum Property {
    Data { value: Value, flags: Flags },
    Method { callable: Callable, flags: Flags },
    /// User accessor pair. A missing setter makes the property read-only.
    Computed {
        getter: Getter,
        setter: Option<Setter>,
        enumerable: bool,
    },
    Shim(Shim),
    Emitter { source: EventSource, flags: Flags },
    Ledger(SharedLedger),
}

impl Property {
    pub fn data(value: Value) -> Self {
        Property::Data {
            value,
            flags: Flags::PLAIN,
        }
    }

    pub fn read_only(value: Value) -> Self {
        Property::Data {
            value,
            flags: Flags::READ_ONLY,
        }
    }

    pub fn method<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Property::Method {
            callable: Rc::new(f),
            flags: Flags::PLAIN,
        }
    }

    pub fn computed<G, S>(getter: G, setter: Option<S>) -> Self
    where
        G: Fn(&Record) -> Value + 'static,
        S: Fn(&mut Record, Value) -> Result<()> + 'static,
    {
        Property::Computed {
            getter: Rc::new(getter),
            setter: setter.map(|s| Rc::new(s) as Setter),
            enumerable: true,
        }
    }

    /// Read-only accessor.
    pub fn getter<G>(getter: G) -> Self
    where
        G: Fn(&Record) -> Value + 'static,
    {
        Property::Computed {
            getter: Rc::new(getter),
            setter: None,
            enumerable: true,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Property::Data { flags, .. }
            | Property::Method { flags, .. }
            | Property::Emitter { flags, .. } => flags.enumerable,
            Property::Computed { enumerable, .. } => *enumerable,
            Property::Shim(_) => true,
            Property::Ledger(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Property::Data { .. } => "data",
            Property::Method { .. } => "method",
            Property::Computed { .. } => "computed",
            Property::Shim(_) => "shim",
            Property::Emitter { .. } => "emitter",
            Property::Ledger(_) => "ledger",
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Data { value, flags } => f
                .debug_struct("Data")
                .field("value", value)
                .field("flags", flags)
                .finish(),
            Property::Shim(shim) => fmt::Debug::fmt(shim, f),
            Property::Emitter { source, .. } => fmt::Debug::fmt(source, f),
            Property::Ledger(ledger) => fmt::Debug::fmt(&*ledger.borrow(), f),
            other => f.write_str(other.kind()),
        }
    }
}

#[derive(Default)]
pub struct Record {
    properties: IndexMap<String, Property>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record of plain fields from a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::NotAnObject);
        };
        let mut record = Self::new();
        for (name, value) in map {
            record.insert(name, value);
        }
        Ok(record)
    }

    /// Defines `name` as a plain writable field, replacing whatever was there.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), Property::data(value));
    }

    pub fn insert_method<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.properties.insert(name.into(), Property::method(f));
    }

    /// Replaces the property under `name`, keeping its position when it already exists.
    pub fn define(&mut self, name: impl Into<String>, property: Property) -> Option<Property> {
        self.properties.insert(name.into(), property)
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.shift_remove(name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Own enumerable names, in definition order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.is_enumerable())
            .map(|(name, _)| name.as_str())
    }

    /// Every own name, hidden ones included.
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Reads a data-like property. Methods, emitters and ledgers are not data.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.properties.get(name)? {
            Property::Data { value, .. } => Some(value.clone()),
            Property::Shim(shim) => Some(shim.read()),
            Property::Computed { getter, .. } => Some(getter(self)),
            _ => None,
        }
    }

    /// Assigns `value` to `name` the way a plain assignment would.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let Some(property) = self.properties.get_mut(name) else {
            self.insert(name, value);
            return Ok(());
        };

        match property {
            Property::Data { value: current, flags } if flags.writable => {
                *current = value;
                Ok(())
            }
            Property::Method { flags, .. } if flags.writable => {
                let flags = *flags;
                *property = Property::Data { value, flags };
                Ok(())
            }
            Property::Shim(shim) => {
                let shim = shim.clone();
                shim.write(name, value)
            }
            Property::Computed {
                setter: Some(setter),
                ..
            } => {
                let setter = setter.clone();
                setter(self, value)
            }
            _ => Err(Error::ReadOnly(name.to_string())),
        }
    }

    pub fn callable(&self, name: &str) -> Option<Callable> {
        match self.properties.get(name)? {
            Property::Method { callable, .. } => Some(callable.clone()),
            _ => None,
        }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        self.callable(name).map(|f| f(args))
    }

    pub fn emitter(&self, name: &str) -> Option<EventSource> {
        match self.properties.get(name)? {
            Property::Emitter { source, .. } => Some(source.clone()),
            _ => None,
        }
    }

    /// Snapshot of the enumerable data-like fields.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .keys()
            .filter_map(|name| self.get(name).map(|v| (name.to_string(), v)))
            .collect();
        Value::Object(map)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.properties.iter()).finish()
    }
}
