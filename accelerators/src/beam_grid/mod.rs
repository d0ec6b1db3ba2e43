//! Uniform grid over photon beams.

use beams_core::geometry::*;
use beams_core::pbrt::*;
use beams_core::rng::RNG;
use beams_core::{stat_dist, stat_inc};
use itertools::iproduct;

mod common;
mod query;
mod reduction;
mod traversal;

pub use common::*;
pub use query::*;
pub use traversal::*;

/// A uniform grid storing, for every cell, the beams whose swept volume overlaps it.
#[derive(Clone, Debug)]
pub struct BeamGrid {
    /// Grid bounds.
    pub bounds: Bounds3f,

    /// Number of cells along each axis.
    pub resolution: [usize; 3],

    /// Edge length of a cubic cell.
    pub cell_size: Float,

    /// Inverse of `cell_size`.
    inv_cell_size: Float,

    /// Build parameters.
    config: BeamGridConfig,

    /// Number of beams the grid was built from.
    n_beams: usize,

    /// Prefix sums of cell occupancy. Cell `c` owns `beam_indices[cell_offsets[c]..cell_offsets[c + 1]]`.
    cell_offsets: Vec<u32>,

    /// Beam indices of all cells.
    beam_indices: Vec<u32>,

    /// Probability that a beam of the cell is selected for testing.
    cell_pdfs: Vec<Float>,
}

impl BeamGrid {
    /// Build a grid over beams.
    ///
    /// * `beams`  - Bounds of the beams; beam `i` is referenced by index `i`.
    /// * `config` - Build parameters.
    pub fn new<B: SegmentBounds>(beams: &[B], config: BeamGridConfig) -> Result<Self, String> {
        register_stats();
        config.validate()?;

        if beams.is_empty() {
            return Err("Cannot build a beam grid without beams".to_string());
        }
        if beams.len() >= u32::MAX as usize {
            return Err(format!("Too many beams for a beam grid: {}", beams.len()));
        }

        let bounds = beams
            .iter()
            .fold(Bounds3f::EMPTY, |b, beam| b.union(&beam.world_bound()));
        if bounds.is_empty() || bounds.p_min.has_nans() || bounds.p_max.has_nans() {
            return Err(format!("Beams have invalid bounds {bounds:?}"));
        }
        let diag = bounds.diagonal();
        if !(diag.x.is_finite() && diag.y.is_finite() && diag.z.is_finite()) {
            return Err(format!("Beams have unbounded extent {bounds:?}"));
        }

        let (resolution, cell_size) = compute_grid_resolution(&bounds, config.max_resolution);
        let cell_extent = Vector3f::new(
            resolution[0] as Float * cell_size,
            resolution[1] as Float * cell_size,
            resolution[2] as Float * cell_size,
        );
        let grid_bounds = Bounds3f {
            p_min: bounds.p_min,
            p_max: (bounds.p_min + cell_extent).max(&bounds.p_max),
        };
        let n_cells = resolution[0] * resolution[1] * resolution[2];

        let mut grid = Self {
            bounds: grid_bounds,
            resolution,
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            config,
            n_beams: beams.len(),
            cell_offsets: vec![],
            beam_indices: vec![],
            cell_pdfs: vec![],
        };

        // Count the cells each beam overlaps, once per beam.
        let mut counts = vec![0_u32; n_cells];
        let mut last_seen = vec![u32::MAX; n_cells];
        for (i, beam) in beams.iter().enumerate() {
            let mut memberships = 0_i64;
            grid.for_each_overlapped_cell(beam, |cell| {
                if last_seen[cell] != i as u32 {
                    last_seen[cell] = i as u32;
                    counts[cell] += 1;
                    memberships += 1;
                }
            });
            stat_dist!(CELL_MEMBERSHIPS, memberships);
        }

        // Prefix sums give each cell's slot range.
        let mut cell_offsets = Vec::with_capacity(n_cells + 1);
        let mut total = 0_u64;
        cell_offsets.push(0_u32);
        for &count in counts.iter() {
            total += count as u64;
            let offset =
                u32::try_from(total).map_err(|_| format!("Too many beam cell memberships: {total} or more"))?;
            cell_offsets.push(offset);
        }

        // Fill each cell's range back to front.
        let mut beam_indices = vec![0_u32; total as usize];
        let mut cursor: Vec<u32> = cell_offsets[1..].to_vec();
        last_seen.fill(u32::MAX);
        for (i, beam) in beams.iter().enumerate() {
            grid.for_each_overlapped_cell(beam, |cell| {
                if last_seen[cell] != i as u32 {
                    last_seen[cell] = i as u32;
                    cursor[cell] -= 1;
                    beam_indices[cursor[cell] as usize] = i as u32;
                }
            });
        }
        debug_assert!(cursor.iter().zip(cell_offsets.iter()).all(|(c, o)| c == o));

        // Thin overfull cells.
        let mut rng = RNG::with_seed(0, config.seed);
        let cell_pdfs = reduction::reduce_cells(&cell_offsets, &mut beam_indices, &config, &mut rng);

        grid.cell_offsets = cell_offsets;
        grid.beam_indices = beam_indices;
        grid.cell_pdfs = cell_pdfs;

        let bytes = grid.memory_bytes();
        stat_inc!(GRID_BYTES, bytes as u64);
        info!(
            "Beam grid {}x{}x{} (cell size {}) for {} beams: {} cell memberships, {:.2} MB",
            resolution[0],
            resolution[1],
            resolution[2],
            cell_size,
            beams.len(),
            total,
            bytes as f32 / (1024.0 * 1024.0)
        );

        Ok(grid)
    }

    /// Calls `f` with the index of every cell overlapped by the beam's segments. A cell may be reported more than
    /// once when several segments overlap it.
    ///
    /// * `beam` - The beam bounds.
    /// * `f`    - Callback receiving cell indices.
    fn for_each_overlapped_cell<B: SegmentBounds, F: FnMut(usize)>(&self, beam: &B, mut f: F) {
        let extent = beam.world_bound().diagonal().max_component() * self.inv_cell_size;
        let n_segments = if extent.is_finite() {
            max(1, (extent / MAX_CELLS_PER_SEGMENT).ceil() as usize)
        } else {
            1
        };
        let inv_segments = 1.0 / n_segments as Float;

        for s in 0..n_segments {
            let t_max = if s + 1 == n_segments {
                1.0
            } else {
                (s + 1) as Float * inv_segments
            };
            let seg = beam.segment_bound(s as Float * inv_segments, t_max);
            let lo = self.cell_coords(&seg.p_min);
            let hi = self.cell_coords(&seg.p_max);
            for (z, y, x) in iproduct!(lo[2]..=hi[2], lo[1]..=hi[1], lo[0]..=hi[0]) {
                f(self.cell_index(&[x, y, z]));
            }
        }
    }

    /// Returns the coordinates of the cell containing a point, clamped to the grid.
    ///
    /// * `p` - The point.
    pub fn cell_coords(&self, p: &Point3f) -> [usize; 3] {
        let mut c = [0_usize; 3];
        for i in 0..3 {
            let v = ((p[i] - self.bounds.p_min[i]) * self.inv_cell_size).floor();
            // NaN and negative values map to 0.
            c[i] = if v > 0.0 {
                min(v as usize, self.resolution[i] - 1)
            } else {
                0
            };
        }
        c
    }

    /// Returns the linear index of a cell.
    ///
    /// * `c` - Cell coordinates.
    #[inline]
    pub fn cell_index(&self, c: &[usize; 3]) -> usize {
        debug_assert!(c[0] < self.resolution[0] && c[1] < self.resolution[1] && c[2] < self.resolution[2]);
        c[0] + self.resolution[0] * (c[1] + self.resolution[1] * c[2])
    }

    /// Returns the number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_pdfs.len()
    }

    /// Returns the number of beams the grid was built from.
    #[inline]
    pub fn beam_count(&self) -> usize {
        self.n_beams
    }

    /// Returns the build parameters.
    #[inline]
    pub fn config(&self) -> &BeamGridConfig {
        &self.config
    }

    /// Returns the beam indices stored in a cell.
    ///
    /// * `cell` - Linear cell index.
    pub fn cell_beams(&self, cell: usize) -> &[u32] {
        let start = self.cell_offsets[cell] as usize;
        let end = self.cell_offsets[cell + 1] as usize;
        &self.beam_indices[start..end]
    }

    /// Returns the selection probability of a cell.
    ///
    /// * `cell` - Linear cell index.
    #[inline]
    pub fn cell_pdf(&self, cell: usize) -> Float {
        self.cell_pdfs[cell]
    }

    /// Returns the selection probability of the cell containing a point. Points outside the grid use the nearest
    /// cell.
    ///
    /// * `p` - The point.
    pub fn pdf(&self, p: &Point3f) -> Float {
        self.cell_pdf(self.cell_index(&self.cell_coords(p)))
    }

    /// Returns the total number of beam cell memberships.
    #[inline]
    pub fn membership_count(&self) -> usize {
        self.beam_indices.len()
    }

    /// Returns the number of bytes used by the index.
    pub fn memory_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.cell_offsets.len() * std::mem::size_of::<u32>()
            + self.beam_indices.len() * std::mem::size_of::<u32>()
            + self.cell_pdfs.len() * std::mem::size_of::<Float>()
    }

    /// Checks the occupancy structure: prefix sums are non-decreasing and end at the number of memberships, no cell
    /// holds a beam twice, every index refers to a beam and every pdf is in (0, 1].
    pub fn validate(&self) -> Result<(), String> {
        let n_cells = self.resolution[0] * self.resolution[1] * self.resolution[2];
        if self.cell_offsets.len() != n_cells + 1 || self.cell_pdfs.len() != n_cells {
            return Err(format!(
                "Grid arrays do not match {n_cells} cells: {} offsets, {} pdfs",
                self.cell_offsets.len(),
                self.cell_pdfs.len()
            ));
        }
        if self.cell_offsets[0] != 0 {
            return Err(format!("First cell offset is {}", self.cell_offsets[0]));
        }
        if let Some(c) = self.cell_offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(format!("Cell offsets decrease at cell {c}"));
        }
        if self.cell_offsets[n_cells] as usize != self.beam_indices.len() {
            return Err(format!(
                "Last cell offset {} does not match {} memberships",
                self.cell_offsets[n_cells],
                self.beam_indices.len()
            ));
        }

        let mut last_seen = vec![usize::MAX; self.n_beams];
        for cell in 0..n_cells {
            for &b in self.cell_beams(cell) {
                let b = b as usize;
                if b >= self.n_beams {
                    return Err(format!("Cell {cell} references beam {b} of {}", self.n_beams));
                }
                if last_seen[b] == cell {
                    return Err(format!("Cell {cell} holds beam {b} more than once"));
                }
                last_seen[b] = cell;
            }

            let pdf = self.cell_pdfs[cell];
            if !(pdf > 0.0 && pdf <= 1.0) {
                return Err(format!("Cell {cell} has pdf {pdf}"));
            }
        }
        Ok(())
    }
}

/// Computes the number of cells per axis so the largest extent has `max_resolution` cubic cells. Returns the
/// resolution and cell size.
///
/// * `bounds`         - Bounds to subdivide.
/// * `max_resolution` - Number of cells along the largest extent.
fn compute_grid_resolution(bounds: &Bounds3f, max_resolution: u32) -> ([usize; 3], Float) {
    let diag = bounds.diagonal();
    let max_res = max(max_resolution, 1) as usize;
    let mut cell_size = diag.max_component() / max_res as Float;
    if !(cell_size > 0.0 && cell_size.is_finite()) {
        warn!("Degenerate beam bounds {bounds:?}; using unit cells");
        cell_size = 1.0;
    }

    let mut resolution = [1_usize; 3];
    for i in 0..3 {
        let r = (diag[i] / cell_size).ceil();
        resolution[i] = if r > 1.0 { min(r as usize, max_res) } else { 1 };
    }
    (resolution, cell_size)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
