#[macro_use]
extern crate log;

mod app;
mod scene;

use accelerators::*;
use app::Options;
use beams_core::beam::*;
use beams_core::pbrt::*;
use beams_core::rng::RNG;
use beams_core::spectrum::*;
use beams_core::{print_stats, report_stats};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use integrators::*;
use scene::Scene;
use std::process;

fn main() {
    // Initialize `env_logger`.
    env_logger::init();

    let options = Options::parse();
    if let Err(e) = run(&options) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(options: &Options) -> Result<(), String> {
    options.validate()?;
    let n_threads = options.threads();
    let estimator = RadiusEstimator::new(options.radius, options.alpha, options.spread)?;
    let config = options.grid_config()?;

    let scene = Scene::default();
    let queries = scene.camera_queries(options.queries);
    let mut evaluator = PhotonBeamsEvaluator::new(scene.media());
    let mut rng = RNG::with_seed(1, options.seed);

    let mut image = vec![Spectrum::ZERO; queries.len()];
    let mut totals = BeamQueryStats::default();

    let progress = create_progress_bar(options.iterations as u64, options.quiet)?;
    progress.set_message("Evaluating photon beams");
    for iteration in 1..=options.iterations {
        let mut beams = scene.generate_beams(options.light_paths, &mut rng);
        let radius = estimator.estimate(&mut beams, iteration)?;
        let n_beams = beams.len();

        // Each iteration reduces cells with a different sequence.
        let config = BeamGridConfig {
            seed: options.seed.wrapping_add(iteration as u64),
            ..config
        };
        evaluator.build(beams, config)?;
        let (radiance, stats) = evaluator.evaluate_batch(&queries, n_threads);
        evaluator.destroy();

        for (pixel, l) in image.iter_mut().zip(radiance) {
            *pixel += l;
        }
        totals += stats;

        info!(
            "Iteration {iteration}: {n_beams} beams, radius {radius}, {} cells visited, {} beams tested",
            stats.cells_visited, stats.beams_tested
        );
        progress.inc(1);
    }
    progress.finish_with_message("Done");

    // Accumulate main thread statistics.
    report_stats!();

    if !options.quiet {
        let n = max(image.len(), 1) as Float * options.iterations as Float;
        let mean = image.iter().fold(Spectrum::ZERO, |acc, &l| acc + l) / n;
        println!("Mean radiance: {:?}", mean.to_rgb());
        println!(
            "Queries: {}, cells visited: {}, beams tested: {}, overfull cells: {}",
            queries.len() * options.iterations as usize,
            totals.cells_visited,
            totals.beams_tested,
            totals.overfull_cells
        );
        print_stats!();
    }
    Ok(())
}

/// Returns a progress bar over iterations; hidden when `quiet` is set.
///
/// * `len`   - Number of iterations.
/// * `quiet` - Suppress output.
fn create_progress_bar(len: u64, quiet: bool) -> Result<ProgressBar, String> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .map_err(|e| format!("Invalid progress bar template: {e}"))?
        .progress_chars("#>-");
    let progress = ProgressBar::new(len);
    progress.set_style(style);
    Ok(progress)
}
