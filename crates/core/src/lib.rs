//! Core business logic for sosmed-rs.

pub mod services;

pub use services::*;
