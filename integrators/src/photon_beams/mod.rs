//! Photon Beams

use accelerators::*;
use beams_core::beam::*;
use beams_core::geometry::*;
use beams_core::medium::*;
use beams_core::pbrt::*;
use beams_core::spectrum::*;

mod kernel;
mod parallel;

// Re-export
pub use kernel::*;

/// A query ray segment through a medium.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeamQuery {
    /// Query origin and unit direction.
    pub ray: Ray,

    /// Start of the query range.
    pub t_min: Float,

    /// End of the query range.
    pub t_max: Float,

    /// Medium the query travels through. Only beams in the same medium contribute.
    pub medium: MediumId,

    /// Short or long query; selects how attenuation towards the query origin is weighted.
    pub flags: BeamFlags,
}

impl BeamQuery {
    /// Create a new long `BeamQuery`.
    ///
    /// * `ray`    - Query origin and direction; the direction is normalized.
    /// * `t_min`  - Start of the query range.
    /// * `t_max`  - End of the query range.
    /// * `medium` - Medium the query travels through.
    pub fn new(ray: Ray, t_min: Float, t_max: Float, medium: MediumId) -> Self {
        Self {
            ray: Ray::new(ray.o, ray.d.normalize()),
            t_min,
            t_max,
            medium,
            flags: BeamFlags::LONG_BEAM,
        }
    }

    /// Sets the short/long flags.
    ///
    /// * `flags` - Short or long query.
    pub fn with_flags(mut self, flags: BeamFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Beams and the index built over them for one iteration.
struct BuiltBeams {
    /// The beams.
    beams: Vec<Beam>,

    /// Derived bounds, parallel to `beams`.
    bounds: Vec<BeamBounds>,

    /// The grid.
    grid: BeamGrid,
}

/// Evaluates the radiance photon beams contribute to query rays.
pub struct PhotonBeamsEvaluator {
    /// Media referenced by `MediumId`.
    media: Vec<ArcMedium>,

    /// Beams and grid while built.
    built: Option<BuiltBeams>,
}

impl PhotonBeamsEvaluator {
    /// Create a new `PhotonBeamsEvaluator`.
    ///
    /// * `media` - Media referenced by beams and queries through `MediumId`.
    pub fn new(media: Vec<ArcMedium>) -> Self {
        Self { media, built: None }
    }

    /// Builds the grid over the beams of an iteration.
    ///
    /// * `beams`  - The beams. Their radius must have been estimated.
    /// * `config` - Grid build parameters.
    pub fn build(&mut self, beams: Vec<Beam>, config: BeamGridConfig) -> Result<(), String> {
        if self.built.is_some() {
            return Err("Photon beams are already built; destroy them first".to_string());
        }
        if beams.is_empty() {
            return Err("Cannot build photon beams from an empty beam array".to_string());
        }
        for (i, beam) in beams.iter().enumerate() {
            lookup_medium(&self.media, beam.medium).map_err(|e| format!("Beam {i}: {e}"))?;
        }

        let bounds = compute_beam_bounds(&beams)?;
        let grid = BeamGrid::new(&bounds, config)?;
        debug!("Built {} photon beams with {}", grid.beam_count(), config.reduction);

        self.built = Some(BuiltBeams { beams, bounds, grid });
        Ok(())
    }

    /// Releases the grid and returns the beams, or `None` if nothing was built.
    pub fn destroy(&mut self) -> Option<Vec<Beam>> {
        self.built.take().map(|b| b.beams)
    }

    /// Returns true while beams are built.
    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Returns the built beams.
    pub fn beams(&self) -> &[Beam] {
        match &self.built {
            Some(b) => b.beams.as_slice(),
            None => &[],
        }
    }

    /// Returns the grid while built.
    pub fn grid(&self) -> Option<&BeamGrid> {
        self.built.as_ref().map(|b| &b.grid)
    }

    /// Returns the media.
    pub fn media(&self) -> &[ArcMedium] {
        &self.media
    }

    /// Creates a query context sized for the built beams.
    ///
    /// * `stream` - Random stream index. Stream 0 is used by the grid build.
    pub fn query_context(&self, stream: u64) -> QueryContext {
        match &self.built {
            Some(b) => b.grid.query_context(stream),
            None => QueryContext::new(0, 0, stream),
        }
    }

    /// Returns the probability with which beams of the grid cell containing a point are tested. Returns 1 when
    /// nothing is built.
    ///
    /// * `p` - The point.
    pub fn beam_selection_pdf(&self, p: &Point3f) -> Float {
        self.built.as_ref().map_or(1.0, |b| b.grid.pdf(p))
    }

    /// Returns the radiance the beams contribute along a query. Returns black when nothing is built or the query's
    /// medium is unknown.
    ///
    /// * `query` - The query.
    /// * `ctx`   - Per-query scratch state.
    /// * `stats` - Receives the traversal statistics.
    pub fn evaluate(&self, query: &BeamQuery, ctx: &mut QueryContext, stats: Option<&mut BeamQueryStats>) -> Spectrum {
        let built = match &self.built {
            Some(built) => built,
            None => return Spectrum::ZERO,
        };
        let medium = match self.media.get(query.medium.index()) {
            Some(medium) => medium.as_ref(),
            None => return Spectrum::ZERO,
        };

        let grid = &built.grid;
        let mut radiance = Spectrum::ZERO;
        let query_stats = grid.intersect(&query.ray, query.t_min, query.t_max, ctx, |candidate| {
            let beam = &built.beams[candidate.beam as usize];
            if beam.medium != query.medium {
                return;
            }
            let radius = built.bounds[candidate.beam as usize].radius();

            if let Some(isect) = test_intersection(
                &query.ray,
                (candidate.t_min, candidate.t_max),
                &beam.ray,
                (0.0, beam.length),
                radius.max_sqr,
            ) {
                if grid.owns_hit(candidate, &query.ray, isect.t1) {
                    radiance += beam_contribution(beam, radius, query, medium, &isect) * candidate.inv_pdf;
                }
            }
        });

        if let Some(stats) = stats {
            *stats += query_stats;
        }
        radiance
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;
    use media::HomogeneousMedium;
    use std::sync::Arc;

    fn medium() -> ArcMedium {
        Arc::new(HomogeneousMedium::new(Spectrum::ZERO, Spectrum::new(0.5), 0.0))
    }

    fn x_beam(o: Point3f, length: Float, radius: Float, flags: BeamFlags) -> Beam {
        let mut b = Beam::new(
            Ray::new(o, Vector3f::new(1.0, 0.0, 0.0)),
            length,
            MediumId(0),
            Spectrum::ONE,
            flags,
        );
        b.set_radius(radius, radius).unwrap();
        b
    }

    #[test]
    fn build_preconditions() {
        let mut eval = PhotonBeamsEvaluator::new(vec![medium()]);
        assert!(eval.build(vec![], BeamGridConfig::default()).is_err());

        let no_radius = Beam::new(
            Ray::new(Point3f::default(), Vector3f::new(1.0, 0.0, 0.0)),
            1.0,
            MediumId(0),
            Spectrum::ONE,
            BeamFlags::LONG_BEAM,
        );
        assert!(eval.build(vec![no_radius], BeamGridConfig::default()).is_err());

        let mut unknown = x_beam(Point3f::default(), 1.0, 0.1, BeamFlags::LONG_BEAM);
        unknown.medium = MediumId(3);
        assert!(eval.build(vec![unknown], BeamGridConfig::default()).is_err());
        assert!(!eval.is_built());

        let beams = vec![x_beam(Point3f::default(), 1.0, 0.1, BeamFlags::LONG_BEAM)];
        assert!(eval.build(beams.clone(), BeamGridConfig::default()).is_ok());
        assert!(eval.is_built());
        assert_eq!(eval.grid().unwrap().beam_count(), 1);
        assert!(eval.build(beams.clone(), BeamGridConfig::default()).is_err());

        let returned = eval.destroy().unwrap();
        assert_eq!(returned.len(), 1);
        assert!(eval.destroy().is_none());
        assert!(eval.build(beams, BeamGridConfig::default()).is_ok());
    }

    #[test]
    fn perpendicular_query_matches_closed_form() {
        let mut eval = PhotonBeamsEvaluator::new(vec![medium()]);
        let beams = vec![x_beam(Point3f::new(0.0, 0.0, 0.0), 4.0, 0.1, BeamFlags::LONG_BEAM)];
        eval.build(beams, BeamGridConfig::default()).unwrap();

        let query = BeamQuery::new(
            Ray::new(Point3f::new(1.0, -1.0, 0.05), Vector3f::new(0.0, 1.0, 0.0)),
            0.0,
            10.0,
            MediumId(0),
        );
        let mut ctx = eval.query_context(1);
        let mut stats = BeamQueryStats::default();
        let l = eval.evaluate(&query, &mut ctx, Some(&mut stats));

        let kernel = 0.75 / 0.1 * (1.0 - 0.25);
        let expected = (-1.0 as Float).exp() * 0.5 * INV_FOUR_PI * kernel;
        for i in 0..3 {
            assert!(approx_eq!(f32, l[i], expected, epsilon = 1e-4), "{} != {expected}", l[i]);
        }
        assert_eq!(stats.beams_tested, 1);
        assert!(stats.cells_visited >= 1);
        assert_eq!(stats.overfull_cells, 0);
        assert_eq!(eval.beam_selection_pdf(&Point3f::new(1.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn short_beams_compensate_free_flight() {
        let mut eval = PhotonBeamsEvaluator::new(vec![medium()]);
        let beams = vec![x_beam(Point3f::new(0.0, 0.0, 0.0), 4.0, 0.1, BeamFlags::SHORT_BEAM)];
        eval.build(beams, BeamGridConfig::default()).unwrap();

        let query = BeamQuery::new(
            Ray::new(Point3f::new(1.0, -1.0, 0.0), Vector3f::new(0.0, 1.0, 0.0)),
            0.0,
            10.0,
            MediumId(0),
        )
        .with_flags(BeamFlags::SHORT_BEAM);
        let mut ctx = eval.query_context(1);
        let l = eval.evaluate(&query, &mut ctx, None);
        let expected = 0.5 * INV_FOUR_PI * 7.5;
        assert!(approx_eq!(f32, l[0], expected, epsilon = 1e-4));
    }

    #[test]
    fn queries_filter_by_medium_and_range() {
        let mut eval = PhotonBeamsEvaluator::new(vec![medium(), medium()]);
        let beams = vec![x_beam(Point3f::new(0.0, 0.0, 0.0), 4.0, 0.1, BeamFlags::LONG_BEAM)];
        eval.build(beams, BeamGridConfig::default()).unwrap();
        let mut ctx = eval.query_context(1);
        let ray = Ray::new(Point3f::new(1.0, -1.0, 0.0), Vector3f::new(0.0, 1.0, 0.0));

        let other_medium = BeamQuery::new(ray, 0.0, 10.0, MediumId(1));
        assert!(eval.evaluate(&other_medium, &mut ctx, None).is_black());

        let unknown_medium = BeamQuery::new(ray, 0.0, 10.0, MediumId(7));
        assert!(eval.evaluate(&unknown_medium, &mut ctx, None).is_black());

        let stops_short = BeamQuery::new(ray, 0.0, 0.5, MediumId(0));
        assert!(eval.evaluate(&stops_short, &mut ctx, None).is_black());

        let hit = BeamQuery::new(ray, 0.0, 10.0, MediumId(0));
        assert!(!eval.evaluate(&hit, &mut ctx, None).is_black());

        eval.destroy();
        assert!(eval.evaluate(&hit, &mut ctx, None).is_black());
        assert_eq!(eval.beam_selection_pdf(&Point3f::default()), 1.0);
    }

    /// Beams along x through one crowded cell and a query along z crossing them.
    fn crowded_beams() -> (Vec<Beam>, BeamQuery) {
        let mut rng = beams_core::rng::RNG::with_seed(9, 1234);
        let beams = (0..40)
            .map(|_| {
                let y = 0.2 * rng.uniform_float() - 0.1;
                let z = 0.2 * rng.uniform_float() - 0.1;
                x_beam(Point3f::new(0.0, y, z), 4.0, 0.2, BeamFlags::LONG_BEAM)
            })
            .collect();
        let query = BeamQuery::new(
            Ray::new(Point3f::new(0.5, -0.05, -2.0), Vector3f::new(0.0, 0.0, 1.0)),
            0.0,
            4.0,
            MediumId(0),
        );
        (beams, query)
    }

    #[test]
    fn reduction_is_unbiased() {
        let (beams, query) = crowded_beams();
        let base = BeamGridConfig {
            max_resolution: 4,
            ..BeamGridConfig::default()
        };

        let mut eval = PhotonBeamsEvaluator::new(vec![medium()]);
        eval.build(beams.clone(), base).unwrap();
        let mut ctx = eval.query_context(1);
        let reference = eval.evaluate(&query, &mut ctx, None)[0];
        eval.destroy();
        assert!(reference > 0.0);

        for policy in [ReductionPolicy::Offset, ReductionPolicy::ResampleFixed, ReductionPolicy::Resample] {
            let config = BeamGridConfig {
                max_beams_in_cell: 8,
                reduction: policy,
                ..base
            };
            eval.build(beams.clone(), config).unwrap();
            let grid = eval.grid().unwrap();
            assert!(grid.pdf(&query.ray.at(2.0)) < 1.0);

            let n = 20_000;
            let mut sum = 0.0;
            let mut stats = BeamQueryStats::default();
            for i in 0..n {
                ctx.reseed(config.seed, i + 1);
                sum += eval.evaluate(&query, &mut ctx, Some(&mut stats))[0] as f64;
            }
            let mean = sum / n as f64;
            assert!((mean / reference as f64 - 1.0).abs() < 0.03, "{policy}: {mean} vs {reference}");
            assert_eq!(stats.overfull_cells, stats.cells_visited);
            eval.destroy();
        }

        // Presample fixes its subset per build, so average over builds.
        let builds = 400;
        let mut sum = 0.0;
        for seed in 0..builds {
            let config = BeamGridConfig {
                max_beams_in_cell: 8,
                reduction: ReductionPolicy::Presample,
                seed,
                ..base
            };
            eval.build(beams.clone(), config).unwrap();
            sum += eval.evaluate(&query, &mut ctx, None)[0] as f64;
            eval.destroy();
        }
        let mean = sum / builds as f64;
        assert!((mean / reference as f64 - 1.0).abs() < 0.08, "presample: {mean} vs {reference}");
    }

    /// A crowded cluster in one cell plus long sparse beams through a 4x4x4 box with 0.5 cells, and oblique queries
    /// crossing both overfull and unreduced cells.
    fn mixed_beams() -> (Vec<Beam>, Vec<BeamQuery>) {
        let mut rng = beams_core::rng::RNG::with_seed(3, 77);
        let mut beams = vec![];
        for &y in [0.25, 2.0, 3.75].iter() {
            for &z in [0.25, 2.0, 3.75].iter() {
                beams.push(x_beam(Point3f::new(0.0, y, z), 4.0, 0.25, BeamFlags::LONG_BEAM));
            }
        }
        for _ in 0..40 {
            let y = 2.1 + 0.3 * rng.uniform_float();
            let z = 2.1 + 0.3 * rng.uniform_float();
            beams.push(x_beam(Point3f::new(1.6, y, z), 0.3, 0.05, BeamFlags::LONG_BEAM));
        }

        let queries = (0..40)
            .map(|_| {
                let c = Point3f::new(
                    1.55 + 0.4 * rng.uniform_float(),
                    1.9 + 0.5 * rng.uniform_float(),
                    2.2,
                );
                let d = Vector3f::new(0.2 * rng.uniform_float() - 0.1, 0.6 * rng.uniform_float() - 0.3, 1.0)
                    .normalize();
                BeamQuery::new(Ray::new(c - d * 3.0, d), 0.0, 6.0, MediumId(0))
            })
            .collect();
        (beams, queries)
    }

    fn total_radiance(eval: &PhotonBeamsEvaluator, queries: &[BeamQuery], ctx: &mut QueryContext) -> f64 {
        queries
            .iter()
            .map(|q| eval.evaluate(q, ctx, None)[0] as f64)
            .sum()
    }

    #[test]
    fn mixed_grid_reduction_is_unbiased() {
        let (beams, queries) = mixed_beams();
        let base = BeamGridConfig {
            max_resolution: 8,
            ..BeamGridConfig::default()
        };

        let mut eval = PhotonBeamsEvaluator::new(vec![medium()]);
        eval.build(beams.clone(), base).unwrap();
        assert_eq!(eval.grid().unwrap().resolution, [8, 8, 8]);
        let mut ctx = eval.query_context(1);
        let reference = total_radiance(&eval, &queries, &mut ctx);
        eval.destroy();
        assert!(reference > 0.0);

        let reduced = |reduction: ReductionPolicy, seed: u64| BeamGridConfig {
            max_beams_in_cell: 5,
            reduction,
            seed,
            ..base
        };

        // Queries cross overfull and unreduced cells, and some unreduced candidates hit inside an overfull cell.
        eval.build(beams.clone(), reduced(ReductionPolicy::Resample, 0)).unwrap();
        let grid = eval.grid().unwrap();
        let mut stats = BeamQueryStats::default();
        let mut handed_over = 0;
        for query in queries.iter() {
            stats += grid.intersect(&query.ray, query.t_min, query.t_max, &mut ctx, |candidate| {
                let beam = &eval.beams()[candidate.beam as usize];
                let radius = beam.radius().unwrap();
                if let Some(isect) = test_intersection(
                    &query.ray,
                    (candidate.t_min, candidate.t_max),
                    &beam.ray,
                    (0.0, beam.length),
                    radius.max_sqr,
                ) {
                    if candidate.unreduced && !grid.owns_hit(candidate, &query.ray, isect.t1) {
                        handed_over += 1;
                    }
                }
            });
        }
        assert!(stats.overfull_cells > 0);
        assert!(stats.overfull_cells < stats.cells_visited);
        assert!(handed_over > 0);
        eval.destroy();

        // Per-query policies average over query streams.
        for policy in [ReductionPolicy::Offset, ReductionPolicy::ResampleFixed, ReductionPolicy::Resample] {
            eval.build(beams.clone(), reduced(policy, 0)).unwrap();
            let rounds = 4_000;
            let mut sum = 0.0;
            for i in 0..rounds {
                ctx.reseed(0, i + 1);
                sum += total_radiance(&eval, &queries, &mut ctx);
            }
            let mean = sum / rounds as f64;
            assert!((mean / reference - 1.0).abs() < 0.03, "{policy}: {mean} vs {reference}");
            eval.destroy();
        }

        // Presample fixes its subset per build, so average over build seeds.
        let builds = 4_000;
        let mut sum = 0.0;
        for seed in 0..builds {
            eval.build(beams.clone(), reduced(ReductionPolicy::Presample, seed)).unwrap();
            sum += total_radiance(&eval, &queries, &mut ctx);
            eval.destroy();
        }
        let mean = sum / builds as f64;
        assert!((mean / reference - 1.0).abs() < 0.05, "presample: {mean} vs {reference}");
    }
}
