//! Cell Reduction

use super::*;

/// Computes the selection pdf of every cell and reorders overfull cells as the reduction policy requires.
///
/// * `cell_offsets` - Prefix sums of cell occupancy.
/// * `beam_indices` - Beam indices of all cells.
/// * `config`       - Build parameters.
/// * `rng`          - Random number generator.
pub(crate) fn reduce_cells(
    cell_offsets: &[u32],
    beam_indices: &mut [u32],
    config: &BeamGridConfig,
    rng: &mut RNG,
) -> Vec<Float> {
    let n_cells = cell_offsets.len() - 1;
    let mut pdfs = vec![1.0 as Float; n_cells];
    if !config.reduces() {
        return pdfs;
    }

    let k = config.max_beams_in_cell as usize;
    let mut overfull = 0_usize;
    for cell in 0..n_cells {
        let start = cell_offsets[cell] as usize;
        let end = cell_offsets[cell + 1] as usize;
        let n = end - start;
        if n <= k {
            continue;
        }

        overfull += 1;
        pdfs[cell] = selection_pdf(k, n);
        let beams = &mut beam_indices[start..end];
        match config.reduction {
            ReductionPolicy::Presample => rng.partial_shuffle(beams, k),
            ReductionPolicy::Offset => rng.shuffle(beams, n, 1),
            ReductionPolicy::ResampleFixed | ReductionPolicy::Resample => (),
        }
    }

    debug!(
        "{overfull} of {n_cells} cells hold more than {k} beams; reduction {}",
        config.reduction
    );
    pdfs
}

/// Returns the probability that a beam of a cell holding `n` beams is tested when at most `k` are tested.
///
/// * `k` - Number of beams tested.
/// * `n` - Number of beams in the cell.
#[inline]
pub(crate) fn selection_pdf(k: usize, n: usize) -> Float {
    if n <= k {
        1.0
    } else {
        k as Float / n as Float
    }
}

/// Selects the beams of an overfull cell to test and calls `f` for each selected position in the cell. Returns the
/// number of beams counted as tested.
///
/// * `policy` - Reduction policy.
/// * `beams`  - The cell's beam indices.
/// * `k`      - Number of beams to test.
/// * `pdf`    - The cell's selection pdf.
/// * `rng`    - Random number generator.
/// * `f`      - Callback receiving selected beam indices.
pub(crate) fn select_beams<F: FnMut(u32)>(
    policy: ReductionPolicy,
    beams: &[u32],
    k: usize,
    pdf: Float,
    rng: &mut RNG,
    mut f: F,
) -> u64 {
    let n = beams.len();
    debug_assert!(n > k && k > 0);

    match policy {
        ReductionPolicy::Presample => {
            beams[..k].iter().for_each(|&b| f(b));
            k as u64
        }
        ReductionPolicy::Offset => {
            let start = rng.bounded_uniform_u32(0, n as u32) as usize;
            (0..k).for_each(|i| f(beams[(start + i) % n]));
            k as u64
        }
        ReductionPolicy::ResampleFixed => {
            (0..k).for_each(|_| f(beams[rng.bounded_uniform_u32(0, n as u32) as usize]));
            k as u64
        }
        ReductionPolicy::Resample => {
            let mut tested = 0;
            for &b in beams.iter() {
                if rng.uniform_float() < pdf {
                    tested += 1;
                    f(b);
                }
            }
            tested
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 40;
    const K: usize = 8;

    fn cell() -> (Vec<u32>, Vec<u32>) {
        (vec![0, N as u32], (0..N as u32).collect())
    }

    fn config(reduction: ReductionPolicy) -> BeamGridConfig {
        BeamGridConfig {
            max_beams_in_cell: K as u32,
            reduction,
            ..BeamGridConfig::default()
        }
    }

    #[test]
    fn reduction_keeps_cell_contents() {
        for policy in ReductionPolicy::ALL {
            let (offsets, mut beams) = cell();
            let mut rng = RNG::with_seed(0, 7);
            let pdfs = reduce_cells(&offsets, &mut beams, &config(policy), &mut rng);
            assert_eq!(pdfs, vec![K as Float / N as Float]);

            let mut sorted = beams.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..N as u32).collect::<Vec<_>>());

            match policy {
                ReductionPolicy::ResampleFixed | ReductionPolicy::Resample => {
                    assert_eq!(beams, (0..N as u32).collect::<Vec<_>>())
                }
                _ => (),
            }
        }
    }

    #[test]
    fn unlimited_cells_are_untouched() {
        let (offsets, mut beams) = cell();
        let mut rng = RNG::with_seed(0, 7);
        let pdfs = reduce_cells(
            &offsets,
            &mut beams,
            &BeamGridConfig::default(),
            &mut rng,
        );
        assert_eq!(pdfs, vec![1.0]);
        assert_eq!(beams, (0..N as u32).collect::<Vec<_>>());
    }

    #[test]
    fn expected_tested_count_is_the_cap() {
        let pdf = selection_pdf(K, N);
        let queries = 20_000;
        for policy in ReductionPolicy::ALL {
            let mut rng = RNG::with_seed(3, 11);
            let (offsets, mut beams) = cell();
            reduce_cells(&offsets, &mut beams, &config(policy), &mut rng);

            let mut reported = 0_u64;
            let mut selected = 0_u64;
            let mut hits = vec![0_u64; N];
            for _ in 0..queries {
                reported += select_beams(policy, &beams, K, pdf, &mut rng, |b| {
                    selected += 1;
                    hits[b as usize] += 1;
                });
            }

            let mean = selected as f64 / queries as f64;
            assert!((mean - K as f64).abs() < 0.1, "{policy}: mean {mean}");

            // Reported counts equal the cap except for Resample, which reports the passed trials.
            match policy {
                ReductionPolicy::Resample => assert_eq!(reported, selected),
                _ => assert_eq!(reported, (K * queries) as u64),
            }

            // Every beam is selected with probability pdf, except Presample which
            // fixes its subset at build time.
            if policy != ReductionPolicy::Presample {
                for &h in hits.iter() {
                    let p = h as f64 / queries as f64;
                    assert!((p - pdf as f64).abs() < 0.03, "{policy}: beam rate {p}");
                }
            } else {
                assert_eq!(hits.iter().filter(|&&h| h > 0).count(), K);
            }
        }
    }

    #[test]
    fn presample_subset_varies_with_seed() {
        // Averaged over builds, Presample selects every beam with probability pdf.
        let builds = 4_000;
        let mut hits = vec![0_u64; N];
        for seed in 0..builds {
            let (offsets, mut beams) = cell();
            let mut rng = RNG::with_seed(0, seed);
            reduce_cells(&offsets, &mut beams, &config(ReductionPolicy::Presample), &mut rng);
            beams[..K].iter().for_each(|&b| hits[b as usize] += 1);
        }
        let pdf = selection_pdf(K, N) as f64;
        for &h in hits.iter() {
            assert!((h as f64 / builds as f64 - pdf).abs() < 0.05);
        }
    }

    #[test]
    fn offset_window_wraps() {
        let beams: Vec<u32> = (0..5).collect();
        let mut rng = RNG::with_seed(1, 1);
        for _ in 0..50 {
            let mut got = vec![];
            select_beams(ReductionPolicy::Offset, &beams, 3, 0.6, &mut rng, |b| got.push(b));
            assert_eq!(got.len(), 3);
            assert_eq!(got[1], (got[0] + 1) % 5);
            assert_eq!(got[2], (got[0] + 2) % 5);
        }
    }

    #[test]
    fn offset_shuffles_the_whole_cell() {
        // Windows of consecutive slots must not be runs of the build order.
        for seed in 0..20 {
            let (offsets, mut beams) = cell();
            let mut rng = RNG::with_seed(0, seed);
            reduce_cells(&offsets, &mut beams, &config(ReductionPolicy::Offset), &mut rng);
            assert_ne!(beams, (0..N as u32).collect::<Vec<_>>());

            let runs = beams.windows(2).filter(|w| w[1] == w[0] + 1).count();
            assert!(runs < K, "seed {seed}: {runs} runs in {beams:?}");
        }
    }
}
