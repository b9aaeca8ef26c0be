//! Domain layer: models, ports, and error types.
//!
//! Everything in here is either plain data or a trait boundary. No I/O,
//! no runtime state; the services layer owns behavior.

pub mod error;
pub mod models;
pub mod ports;
