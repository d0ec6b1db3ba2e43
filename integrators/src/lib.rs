//! Integrators

#[macro_use]
extern crate log;

mod photon_beams;

// Re-export
pub use photon_beams::*;
