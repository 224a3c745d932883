use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use super::error::{Error, Result};

/// Reserved event name that fires for every instrumented field change.
pub const WILDCARD: &str = "*";

/// Handler invoked synchronously with the payload passed to `emit`.
pub type Handler = Rc<dyn Fn(&[Value]) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, Vec<Listener>>,
    next_id: u64,
}

impl Registry {
    fn add(&mut self, event: &str, handler: Handler, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(event.to_string())
            .or_insert_with(Vec::new)
            .push(Listener { id, handler, once });
        id
    }
}

/// Publish/subscribe endpoint handed out by the mapper.
///
/// Cloning yields another handle to the same endpoint. Two handles compare equal
/// only when they share the same underlying registry.
#[derive(Clone)]
pub struct EventSource {
    id: Uuid,
    registry: Rc<RefCell<Registry>>,
}

impl EventSource {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn same_source(&self, other: &EventSource) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry)
    }

    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + 'static,
    {
        self.registry.borrow_mut().add(event, Rc::new(handler), false)
    }

    /// Like `on`, but the handler is dropped right before its first invocation.
    pub fn once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + 'static,
    {
        self.registry.borrow_mut().add(event, Rc::new(handler), true)
    }

    /// Subscribes to changes of a single field with `(new, old)`.
    pub fn on_change<F>(&self, field: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value, &Value) -> anyhow::Result<()> + 'static,
    {
        self.on(field, move |payload| {
            let (new, old) = change_pair(payload);
            handler(new, old)
        })
    }

    /// Subscribes to the wildcard event with `(new, old, field)`.
    pub fn on_any<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Value, &Value, &str) -> anyhow::Result<()> + 'static,
    {
        self.on(WILDCARD, move |payload| {
            let (new, old) = change_pair(payload);
            let field = payload.get(2).and_then(Value::as_str).unwrap_or_default();
            handler(new, old, field)
        })
    }

    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(listeners) = registry.listeners.get_mut(event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        before != listeners.len()
    }

    /// Drops every handler registered for `event`.
    pub fn off(&self, event: &str) {
        self.registry.borrow_mut().listeners.remove(event);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Delivers `payload` to the handlers of `event` in registration order and
    /// returns how many ran. The first failing handler stops delivery.
    pub fn emit(&self, event: &str, payload: &[Value]) -> Result<usize> {
        // Snapshot so handlers may subscribe or unsubscribe while we dispatch.
        let snapshot: Vec<(ListenerId, Handler, bool)> = {
            let registry = self.registry.borrow();
            let Some(listeners) = registry.listeners.get(event) else {
                return Ok(0);
            };
            let snapshot = listeners
                .iter()
                .map(|l| (l.id, l.handler.clone(), l.once))
                .collect();
            snapshot
        };

        trace!("Emitting '{}' to {} handler(s) on {}", event, snapshot.len(), self.id);

        for (id, handler, once) in &snapshot {
            if *once {
                self.remove_listener(event, *id);
            }
            handler(payload).map_err(|e| Error::Handler(e.context(format!("handler for '{}' failed", event))))?;
        }
        Ok(snapshot.len())
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EventSource {
    fn eq(&self, other: &Self) -> bool {
        self.same_source(other)
    }
}

impl Eq for EventSource {}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut events: Vec<&str> = registry.listeners.keys().map(String::as_str).collect();
        events.sort_unstable();
        f.debug_struct("EventSource")
            .field("id", &self.id)
            .field("events", &events)
            .finish()
    }
}

fn change_pair(payload: &[Value]) -> (&Value, &Value) {
    const NULL: &Value = &Value::Null;
    (payload.first().unwrap_or(NULL), payload.get(1).unwrap_or(NULL))
}
