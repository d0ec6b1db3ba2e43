//! Beam Grid Common

use beams_core::beam::*;
use beams_core::geometry::*;
use beams_core::pbrt::*;
use beams_core::{stat_counter, stat_int_distribution, stat_memory_counter, stat_percent, stat_register_fns};
use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

stat_counter!("Photon Beams/Grid cells visited", CELLS_VISITED, beam_grid_stats_cells_visited);
stat_counter!("Photon Beams/Beams tested", BEAMS_TESTED, beam_grid_stats_beams_tested);
stat_percent!(
    "Photon Beams/Overfull cells visited",
    OVERFULL_CELLS,
    TOTAL_CELLS,
    beam_grid_stats_overfull_cells,
);
stat_int_distribution!(
    "Photon Beams/Cell memberships per beam",
    CELL_MEMBERSHIPS,
    beam_grid_stats_cell_memberships,
);
stat_memory_counter!("Memory/Photon beam grid", GRID_BYTES, beam_grid_stats_grid_bytes);

stat_register_fns!(
    beam_grid_stats_cells_visited,
    beam_grid_stats_beams_tested,
    beam_grid_stats_overfull_cells,
    beam_grid_stats_cell_memberships,
    beam_grid_stats_grid_bytes,
);

/// Largest supported grid resolution along any axis.
pub const MAX_GRID_RESOLUTION: u32 = 1024;

/// Number of cells along its dominant axis a single beam segment may span during build.
pub(crate) const MAX_CELLS_PER_SEGMENT: Float = 4.0;

/// Bounds of an extended primitive stored in the grid.
pub trait SegmentBounds {
    /// Returns the bounds of the whole primitive.
    fn world_bound(&self) -> Bounds3f;

    /// Returns the bounds of the part of the primitive between two fractions of its length.
    ///
    /// * `t_min` - Start of the part in [0, 1].
    /// * `t_max` - End of the part in [0, 1].
    fn segment_bound(&self, t_min: Float, t_max: Float) -> Bounds3f;
}

impl SegmentBounds for BeamBounds {
    fn world_bound(&self) -> Bounds3f {
        self.whole_aabb()
    }

    fn segment_bound(&self, t_min: Float, t_max: Float) -> Bounds3f {
        self.segment_aabb(t_min, t_max)
    }
}

/// Selects which beams of an overfull cell are tested by a query.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReductionPolicy {
    /// Shuffle the first `k` beams of each cell during build and always test those.
    #[default]
    Presample,

    /// Shuffle each cell during build and test `k` consecutive beams from a random start, wrapping around.
    Offset,

    /// Test `k` beams drawn uniformly with replacement.
    ResampleFixed,

    /// Test each beam independently with probability equal to the cell pdf.
    Resample,
}

impl ReductionPolicy {
    /// All policies in selector order.
    pub const ALL: [ReductionPolicy; 4] = [
        ReductionPolicy::Presample,
        ReductionPolicy::Offset,
        ReductionPolicy::ResampleFixed,
        ReductionPolicy::Resample,
    ];
}

impl TryFrom<u32> for ReductionPolicy {
    type Error = String;

    /// Converts a numeric selector in 0..=3.
    ///
    /// * `selector` - Policy selector.
    fn try_from(selector: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(selector as usize)
            .copied()
            .ok_or_else(|| format!("Invalid reduction policy selector {selector}; expected 0-3"))
    }
}

impl FromStr for ReductionPolicy {
    type Err = String;

    /// Parses a policy name or a numeric selector.
    ///
    /// * `s` - Policy name or selector.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "presample" => Ok(Self::Presample),
            "offset" => Ok(Self::Offset),
            "resample-fixed" => Ok(Self::ResampleFixed),
            "resample" => Ok(Self::Resample),
            other => match other.parse::<u32>() {
                Ok(selector) => Self::try_from(selector),
                Err(_) => Err(format!("Unknown reduction policy '{s}'")),
            },
        }
    }
}

impl fmt::Display for ReductionPolicy {
    /// Formats the value using the given formatter.
    ///
    /// * `f` - Formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Presample => "presample",
            Self::Offset => "offset",
            Self::ResampleFixed => "resample-fixed",
            Self::Resample => "resample",
        };
        write!(f, "{name}")
    }
}

/// Beam grid build parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BeamGridConfig {
    /// Number of cells along the largest extent of the beams' bounds.
    pub max_resolution: u32,

    /// Maximum number of beams tested per cell. 0 means unlimited.
    pub max_beams_in_cell: u32,

    /// Policy used to select beams in overfull cells.
    pub reduction: ReductionPolicy,

    /// Seed for the build-time random number generator and per-query streams.
    pub seed: u64,
}

impl Default for BeamGridConfig {
    fn default() -> Self {
        Self {
            max_resolution: 256,
            max_beams_in_cell: 0,
            reduction: ReductionPolicy::Presample,
            seed: 0,
        }
    }
}

impl BeamGridConfig {
    /// Checks the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_resolution == 0 || self.max_resolution > MAX_GRID_RESOLUTION {
            return Err(format!(
                "Grid resolution must be in 1..={MAX_GRID_RESOLUTION}, got {}",
                self.max_resolution
            ));
        }
        Ok(())
    }

    /// Returns true if overfull cells are reduced.
    #[inline]
    pub fn reduces(&self) -> bool {
        self.max_beams_in_cell > 0
    }
}

/// Per-query traversal statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BeamQueryStats {
    /// Number of grid cells visited.
    pub cells_visited: u64,

    /// Number of beams tested with the intersection kernel. For `ResampleFixed`, `Presample` and `Offset` every
    /// overfull cell counts the cap; for `Resample` it counts the beams that passed their trial.
    pub beams_tested: u64,

    /// Number of overfull cells visited.
    pub overfull_cells: u64,
}

impl AddAssign for BeamQueryStats {
    fn add_assign(&mut self, other: Self) {
        self.cells_visited += other.cells_visited;
        self.beams_tested += other.beams_tested;
        self.overfull_cells += other.overfull_cells;
    }
}

/// A grid cell crossed by a ray.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellVisit {
    /// Linear cell index.
    pub index: usize,

    /// Cell coordinates.
    pub coords: [usize; 3],

    /// Ray parameter where the ray enters the cell.
    pub t_enter: Float,

    /// Ray parameter where the ray leaves the cell.
    pub t_exit: Float,
}

/// A beam to be tested by a query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeamCandidate {
    /// Index of the beam.
    pub beam: u32,

    /// Start of the query ray range to test.
    pub t_min: Float,

    /// End of the query ray range to test.
    pub t_max: Float,

    /// Inverse of the probability that the beam was selected.
    pub inv_pdf: Float,

    /// True if the candidate comes from an unreduced cell. Such candidates are tested once over the whole query
    /// range and only hits located in unreduced cells count.
    pub unreduced: bool,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reduction_policy() {
        assert_eq!("presample".parse::<ReductionPolicy>(), Ok(ReductionPolicy::Presample));
        assert_eq!("Offset".parse::<ReductionPolicy>(), Ok(ReductionPolicy::Offset));
        assert_eq!("resample_fixed".parse::<ReductionPolicy>(), Ok(ReductionPolicy::ResampleFixed));
        assert_eq!("resample-fixed".parse::<ReductionPolicy>(), Ok(ReductionPolicy::ResampleFixed));
        assert_eq!("3".parse::<ReductionPolicy>(), Ok(ReductionPolicy::Resample));
        assert!("4".parse::<ReductionPolicy>().is_err());
        assert!("nearest".parse::<ReductionPolicy>().is_err());

        for (i, p) in ReductionPolicy::ALL.iter().enumerate() {
            assert_eq!(ReductionPolicy::try_from(i as u32), Ok(*p));
            assert_eq!(p.to_string().parse::<ReductionPolicy>(), Ok(*p));
        }
    }

    #[test]
    fn default_config() {
        let config = BeamGridConfig::default();
        assert_eq!(config.max_resolution, 256);
        assert_eq!(config.max_beams_in_cell, 0);
        assert_eq!(config.reduction, ReductionPolicy::Presample);
        assert!(!config.reduces());
        assert!(config.validate().is_ok());

        let bad = BeamGridConfig {
            max_resolution: 0,
            ..config
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn stats_accumulate() {
        let mut total = BeamQueryStats::default();
        total += BeamQueryStats {
            cells_visited: 3,
            beams_tested: 5,
            overfull_cells: 1,
        };
        total += BeamQueryStats {
            cells_visited: 1,
            beams_tested: 0,
            overfull_cells: 0,
        };
        assert_eq!(
            total,
            BeamQueryStats {
                cells_visited: 4,
                beams_tested: 5,
                overfull_cells: 1,
            }
        );
    }
}
