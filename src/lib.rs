//! Results resolution and reveal engine for the election admin dashboard.
//!
//! Pages through concluded elections, tallies the selected one, resolves
//! candidate identifiers to display names through a coalescing cache, and drives
//! the countdown → resolution → results sequence.

pub mod cache;
pub mod config;
pub mod engine;
pub mod model;
pub mod pagination;
pub mod reports;
pub mod reveal;
pub mod source;

pub use config::EngineConfig;
pub use engine::{EngineError, ResultsEngine};
