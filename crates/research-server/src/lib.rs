//! Intake HTTP/WebSocket API (§6): the axum router, its shared state, and
//! the error-to-HTTP-status mapping. `main.rs` wires this library to a
//! listener; integration tests drive the router directly.

pub mod app;
pub mod error;
pub mod handlers;
pub mod playground;
pub mod state;
pub mod ws;

pub use app::build;
pub use state::AppState;
