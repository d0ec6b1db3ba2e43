//! Application related stuff

use accelerators::{BeamGridConfig, ReductionPolicy};
use beams_core::pbrt::Float;
use clap::Parser;

/// Driver options.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Progressive photon beam estimation in a homogeneous medium.", long_about = None)]
pub struct Options {
    /// Number of threads to use for query evaluation.
    #[arg(
        long = "nthreads",
        short = 't',
        value_name = "NUM",
        default_value_t = 1,
        help = "Use specified number of threads for query evaluation."
    )]
    n_threads: usize,

    /// Suppress all text output other than error messages.
    #[arg(long, help = "Suppress all text output other than error messages.")]
    pub quiet: bool,

    /// Number of progressive iterations.
    #[arg(long, short = 'i', value_name = "NUM", default_value_t = 4)]
    pub iterations: u32,

    /// Number of light paths traced per iteration.
    #[arg(long = "paths", short = 'b', value_name = "NUM", default_value_t = 10000)]
    pub light_paths: usize,

    /// Number of camera queries per iteration.
    #[arg(long, short = 'q', value_name = "NUM", default_value_t = 4096)]
    pub queries: usize,

    /// Beam radius in the first iteration.
    #[arg(long, short = 'r', value_name = "FLOAT", default_value_t = 0.01)]
    pub radius: Float,

    /// Radius reduction parameter in (0, 1].
    #[arg(long, value_name = "FLOAT", default_value_t = 0.75)]
    pub alpha: Float,

    /// Radius growth per unit beam length.
    #[arg(long, value_name = "FLOAT", default_value_t = 0.0)]
    pub spread: Float,

    /// Grid cells along the largest extent of the beams.
    #[arg(long = "resolution", value_name = "NUM", default_value_t = 256)]
    pub max_resolution: u32,

    /// Maximum beams tested per cell; 0 disables reduction.
    #[arg(long = "maxbeams", value_name = "NUM", default_value_t = 0)]
    pub max_beams_in_cell: u32,

    /// Policy used to select beams in overfull cells.
    #[arg(
        long,
        value_name = "POLICY",
        default_value_t = ReductionPolicy::Presample,
        help = "Reduction policy for overfull cells: presample, offset, resample-fixed, resample (or 0-3)."
    )]
    pub reduction: ReductionPolicy,

    /// Random seed.
    #[arg(long, short = 's', value_name = "NUM", default_value_t = 0)]
    pub seed: u64,
}

impl Options {
    /// Returns the number of threads to use.
    pub fn threads(&self) -> usize {
        let max_threads = num_cpus::get();
        match self.n_threads {
            0 => {
                warn!("Invalid nthreads");
                1
            }
            n if n > max_threads => {
                warn!("Num threads > max logical CPUs {}", max_threads);
                max_threads
            }
            n => n,
        }
    }

    /// Returns the validated grid parameters.
    pub fn grid_config(&self) -> Result<BeamGridConfig, String> {
        let config = BeamGridConfig {
            max_resolution: self.max_resolution,
            max_beams_in_cell: self.max_beams_in_cell,
            reduction: self.reduction,
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the iteration and sample counts.
    pub fn validate(&self) -> Result<(), String> {
        if self.iterations == 0 {
            return Err("At least one iteration is required".to_string());
        }
        if self.light_paths == 0 {
            return Err("At least one light path per iteration is required".to_string());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
