//! Progress Bus: per-task fan-out of ordered [`research_core::model::ProgressEvent`]s
//! to any number of concurrent observers, with a bounded-buffer drop policy
//! for slow observers and terminal-event lifecycle closing.

pub mod bus;

pub use bus::{Observer, ProgressBus, DEFAULT_OBSERVER_BUFFER};
