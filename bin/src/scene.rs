//! Synthetic Scene

use beams_core::beam::*;
use beams_core::geometry::*;
use beams_core::medium::*;
use beams_core::pbrt::*;
use beams_core::rng::RNG;
use beams_core::spectrum::*;
use integrators::BeamQuery;
use media::HomogeneousMedium;
use std::sync::Arc;

/// Maximum number of beams traced along one light path.
const MAX_PATH_BEAMS: usize = 8;

/// A point light inside a box filled with a homogeneous medium.
pub struct Scene {
    /// Extent of the medium.
    pub bounds: Bounds3f,

    /// The medium.
    pub medium: Arc<HomogeneousMedium>,

    /// Light position.
    pub light_pos: Point3f,

    /// Emitted power.
    pub light_power: Spectrum,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            bounds: bounds3(Point3f::new(0.0, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0)),
            medium: Arc::new(HomogeneousMedium::new(
                Spectrum::new(0.2),
                Spectrum::from_rgb([0.8, 1.0, 1.2]),
                0.3,
            )),
            light_pos: Point3f::new(0.5, 0.5, 0.5),
            light_power: Spectrum::new(10.0),
        }
    }
}

impl Scene {
    /// Returns the media referenced by beams and queries. The box medium has id 0.
    pub fn media(&self) -> Vec<ArcMedium> {
        let medium: ArcMedium = self.medium.clone();
        vec![medium]
    }

    /// Traces light paths and returns their free-flight sampled short beams.
    ///
    /// * `n_paths` - Number of light paths.
    /// * `rng`     - Random number generator.
    pub fn generate_beams(&self, n_paths: usize, rng: &mut RNG) -> Vec<Beam> {
        let flux = self.light_power / max(n_paths, 1) as Float;
        let flux_max = flux.max_component_value();
        let sigma_t_avg = self.medium.sigma_t().average();

        let mut beams = Vec::with_capacity(n_paths * 2);
        for _ in 0..n_paths {
            let mut ray = Ray::new(self.light_pos, uniform_sample_sphere(rng));
            let mut throughput = flux;

            for depth in 0..MAX_PATH_BEAMS {
                let exit = match self.bounds.intersect_p(&ray, 0.0, INFINITY) {
                    Some((_, t1)) => t1,
                    None => break,
                };
                let dist = self.medium.sample_distance(rng.uniform_float());
                let scattered = dist < exit;
                let length = if scattered { dist } else { exit };
                if length <= 0.0 {
                    break;
                }

                let sampling = if scattered {
                    RaySamplingFlags::ORIGIN_IN_MEDIUM | RaySamplingFlags::END_IN_MEDIUM
                } else {
                    RaySamplingFlags::ORIGIN_IN_MEDIUM
                };
                beams.push(
                    Beam::new(ray, length, MediumId(0), throughput, BeamFlags::SHORT_BEAM).with_ray_sampling(
                        INV_FOUR_PI,
                        INV_FOUR_PI,
                        sampling,
                    ),
                );
                if !scattered || depth + 1 == MAX_PATH_BEAMS {
                    break;
                }

                // Weight by the collision density the distance was sampled with.
                let pdf = sigma_t_avg * self.medium.survival_probability(length);
                throughput = throughput * self.medium.transmittance(length) * self.medium.sigma_s() / pdf;

                let wi = uniform_sample_sphere(rng);
                throughput *= self.medium.phase().p(&-ray.d, &wi) * FOUR_PI;

                // Russian roulette.
                let q = min(throughput.max_component_value() / flux_max, 1.0);
                if !(q > 0.0) || rng.uniform_float() >= q {
                    break;
                }
                throughput /= q;
                ray = Ray::new(ray.at(length), wi);
            }
        }
        beams
    }

    /// Returns orthographic camera queries looking down the z-axis through the medium.
    ///
    /// * `n` - Number of queries.
    pub fn camera_queries(&self, n: usize) -> Vec<BeamQuery> {
        let side = max((n as Float).sqrt().ceil() as usize, 1);
        let extent = self.bounds.diagonal();
        (0..n)
            .map(|i| {
                let u = ((i % side) as Float + 0.5) / side as Float;
                let v = ((i / side) as Float + 0.5) / side as Float;
                let o = Point3f::new(
                    self.bounds.p_min.x + u * extent.x,
                    self.bounds.p_min.y + v * extent.y,
                    self.bounds.p_min.z - 1.0,
                );
                let ray = Ray::new(o, Vector3f::new(0.0, 0.0, 1.0));
                let (t_min, t_max) = self.bounds.intersect_p(&ray, 0.0, INFINITY).unwrap_or((0.0, 0.0));
                BeamQuery::new(ray, t_min, t_max, MediumId(0))
            })
            .collect()
    }
}

/// Uniformly samples a direction on the unit sphere.
///
/// * `rng` - Random number generator.
fn uniform_sample_sphere(rng: &mut RNG) -> Vector3f {
    let z = 1.0 - 2.0 * rng.uniform_float();
    let r = max(0.0, 1.0 - z * z).sqrt();
    let phi = TWO_PI * rng.uniform_float();
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
