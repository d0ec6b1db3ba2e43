//! Grid Traversal

use super::*;

/// Iterates over the cells pierced by a ray in order of increasing ray parameter using a 3-D digital differential
/// analyzer. Cells touched only at a single point are skipped so entry parameters strictly increase.
pub struct GridTraversal<'a> {
    /// The grid.
    grid: &'a BeamGrid,

    /// Current cell coordinates.
    coords: [isize; 3],

    /// Cell step per axis: -1, 0 or 1.
    step: [isize; 3],

    /// Ray parameter of the next cell boundary per axis.
    next_crossing: [Float; 3],

    /// Ray parameter increment between cell boundaries per axis.
    delta: [Float; 3],

    /// Ray parameter where the current cell is entered.
    t: Float,

    /// Ray parameter where the ray leaves the grid.
    t_end: Float,

    /// Set once the ray has left the grid.
    done: bool,
}

impl<'a> GridTraversal<'a> {
    /// Start traversing a grid.
    ///
    /// * `grid`  - The grid.
    /// * `ray`   - The ray.
    /// * `t_min` - Start of the ray parameter range.
    /// * `t_max` - End of the ray parameter range.
    pub fn new(grid: &'a BeamGrid, ray: &Ray, t_min: Float, t_max: Float) -> Self {
        let mut traversal = Self {
            grid,
            coords: [0; 3],
            step: [0; 3],
            next_crossing: [INFINITY; 3],
            delta: [INFINITY; 3],
            t: t_min,
            t_end: t_max,
            done: true,
        };

        let (t0, t1) = match grid.bounds.intersect_p(ray, t_min, t_max) {
            Some(range) if !ray.has_nans() => range,
            _ => return traversal,
        };

        let p = ray.at(t0);
        let c = grid.cell_coords(&p);
        for axis in 0..3 {
            let d = ray.d[axis];
            let ci = c[axis] as isize;
            traversal.coords[axis] = ci;
            if d > 0.0 {
                let boundary = traversal.boundary(axis, ci + 1);
                traversal.next_crossing[axis] = t0 + (boundary - p[axis]) / d;
                traversal.delta[axis] = grid.cell_size / d;
                traversal.step[axis] = 1;
            } else if d < 0.0 {
                let boundary = traversal.boundary(axis, ci);
                traversal.next_crossing[axis] = t0 + (boundary - p[axis]) / d;
                traversal.delta[axis] = -grid.cell_size / d;
                traversal.step[axis] = -1;
            }
        }

        traversal.t = t0;
        traversal.t_end = t1;
        traversal.done = false;
        traversal
    }

    /// Returns the position of the lower boundary of cell `i` along an axis. The upper boundary of the last cell is
    /// the grid's upper bound.
    ///
    /// * `axis` - The axis.
    /// * `i`    - Cell coordinate.
    fn boundary(&self, axis: usize, i: isize) -> Float {
        if i as usize >= self.grid.resolution[axis] {
            self.grid.bounds.p_max[axis]
        } else {
            self.grid.bounds.p_min[axis] + i as Float * self.grid.cell_size
        }
    }

    /// Moves to the next cell along every axis whose boundary is crossed at `t_cross`.
    ///
    /// * `t_cross` - Ray parameter of the crossing.
    fn advance(&mut self, t_cross: Float) {
        for axis in 0..3 {
            if self.next_crossing[axis] <= t_cross {
                self.coords[axis] += self.step[axis];
                if self.coords[axis] < 0 || self.coords[axis] as usize >= self.grid.resolution[axis] {
                    self.done = true;
                }
                self.next_crossing[axis] += self.delta[axis];
            }
        }
        self.t = max(self.t, t_cross);
    }
}

impl<'a> Iterator for GridTraversal<'a> {
    type Item = CellVisit;

    /// Returns the next cell pierced by the ray.
    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let t_cross = self.next_crossing[0]
                .min(self.next_crossing[1])
                .min(self.next_crossing[2]);
            let t_exit = min(t_cross, self.t_end);
            let coords = [
                self.coords[0] as usize,
                self.coords[1] as usize,
                self.coords[2] as usize,
            ];
            let t_enter = self.t;

            if t_cross >= self.t_end {
                self.done = true;
            } else {
                self.advance(t_cross);
            }

            if t_exit > t_enter {
                return Some(CellVisit {
                    index: self.grid.cell_index(&coords),
                    coords,
                    t_enter,
                    t_exit,
                });
            }
        }
        None
    }
}

impl BeamGrid {
    /// Returns an iterator over the cells pierced by a ray in order of increasing ray parameter.
    ///
    /// * `ray`   - The ray.
    /// * `t_min` - Start of the ray parameter range.
    /// * `t_max` - End of the ray parameter range.
    pub fn traverse(&self, ray: &Ray, t_min: Float, t_max: Float) -> GridTraversal<'_> {
        GridTraversal::new(self, ray, t_min, t_max)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
