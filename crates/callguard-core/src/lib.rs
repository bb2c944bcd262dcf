//! Shared infrastructure for the callguard family of guards.
//!
//! This crate carries the pieces every guard uses:
//! - an event system for observability ([`GuardEvent`], [`EventListeners`])
//! - [`GuardError`], a unified error type for call sites that chain several
//!   guards and don't want to write `From` conversions by hand

pub mod error;
pub mod events;

pub use error::GuardError;
pub use events::{EventListener, EventListeners, GuardEvent};
