pub mod mapper;

// Re-export the entry points for convenient access
pub use mapper::{
    default_selection, instrument, instrument_detached, instrument_embedded, release, Error, EventSource, Mode,
    Pattern, Record, Result, Selection,
};
