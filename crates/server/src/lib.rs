//! sosmed server: process bootstrap and service wiring.

pub mod state;

pub use state::AppState;
