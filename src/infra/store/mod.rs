//! Processed-event store implementations.

pub mod file;

pub use file::{DEFAULT_MAX_ENTRIES, JsonFileEventStore};
