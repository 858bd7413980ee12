//! Logging for the songplay ELT.
//!
//! Everything is emitted through `tracing`; this crate only installs the
//! subscriber.

pub mod tracing_setup;

pub use tracing_setup::*;
