//! Acceleration data structures for photon beams.

#[macro_use]
extern crate log;

mod beam_grid;

// Re-export
pub use beam_grid::*;
