//! Core

extern crate bitflags;
#[macro_use]
extern crate hexf;
#[macro_use]
extern crate log;

// Re-export.
pub mod beam;
pub mod geometry;
pub mod medium;
pub mod pbrt;
pub mod rng;
pub mod spectrum;
pub mod stats;
