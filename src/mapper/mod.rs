pub mod engine;
pub mod error;
pub mod event;
pub mod record;
pub mod selection;
pub mod shim;
pub mod storage;

pub use engine::*;
pub use error::{Error, Result};
pub use event::{EventSource, Handler, ListenerId, WILDCARD};
pub use record::{Callable, Flags, Property, Record};
pub use selection::{Pattern, Selection};
pub use shim::Shim;
pub use storage::{Ledger, PrivateStorage, SharedLedger, MAX_PROBES, SLOT_MARKER};
