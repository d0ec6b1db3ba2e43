//! Parallel Query Evaluation

use super::*;
use beams_core::report_stats;
use std::thread;

impl PhotonBeamsEvaluator {
    /// Evaluates queries on worker threads. Each query `i` uses random stream `i + 1` so results do not depend on
    /// the number of threads or scheduling. Returns the radiance per query and the accumulated statistics.
    ///
    /// * `queries`   - The queries.
    /// * `n_threads` - Number of worker threads.
    pub fn evaluate_batch(&self, queries: &[BeamQuery], n_threads: usize) -> (Vec<Spectrum>, BeamQueryStats) {
        let n_threads = max(n_threads, 1);
        let seed = self.grid().map_or(0, |grid| grid.config().seed);
        let mut results = vec![Spectrum::ZERO; queries.len()];
        let mut total = BeamQueryStats::default();
        let results_out = &mut results;
        let total_out = &mut total;

        thread::scope(|scope| {
            let (tx_collector, rx_collector) =
                crossbeam_channel::bounded::<(usize, Spectrum, BeamQueryStats)>(n_threads * 16);
            let (tx_worker, rx_worker) = crossbeam_channel::bounded::<usize>(n_threads * 16);

            // Spawn collector thread.
            scope.spawn(move || {
                for (i, l, stats) in rx_collector.iter() {
                    results_out[i] = l;
                    *total_out += stats;
                }
            });

            // Spawn worker threads.
            for _ in 0..n_threads {
                let rx_worker = rx_worker.clone();
                let tx_collector = tx_collector.clone();
                scope.spawn(move || {
                    let mut ctx = self.query_context(0);
                    for i in rx_worker.iter() {
                        ctx.reseed(seed, i as u64 + 1);
                        let mut stats = BeamQueryStats::default();
                        let l = self.evaluate(&queries[i], &mut ctx, Some(&mut stats));
                        if tx_collector.send((i, l, stats)).is_err() {
                            break;
                        }
                    }
                    report_stats!();
                });
            }
            drop(rx_worker); // Drop extra since we've cloned one for each worker.
            drop(tx_collector);

            // Send work.
            for i in 0..queries.len() {
                if tx_worker.send(i).is_err() {
                    error!("Photon beam workers stopped before query {i}");
                    break;
                }
            }
        });

        (results, total)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
