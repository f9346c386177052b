//! Alert lifecycle engine for flare-rs.
//!
//! The engine owns every write to a missing-child report. Storage, the child
//! registry, the timer scheduler and notification delivery are injected
//! through the traits in [`services`].

pub mod services;

pub use services::*;
