//! Statistics Accumulator

use crate::pbrt;
use num_traits::{Num, Zero};
use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::Mutex;
use std::sync::OnceLock;

/// Return the global statistics accumulator.
pub fn stats_accumulator() -> &'static Mutex<StatsAccumulator> {
    static DATA: OnceLock<Mutex<StatsAccumulator>> = OnceLock::new();
    DATA.get_or_init(|| Mutex::new(StatsAccumulator::new()))
}

/// Distribution statistic.
#[derive(Default, Clone, Debug)]
pub struct StatsDistribution<T>
where
    T: Num + Default + Copy + Clone,
{
    /// Sum of all values.
    sum: T,

    /// Count of all values.
    count: u64,

    /// Minimum value.
    min: Option<T>,

    /// Maximum value.
    max: Option<T>,
}

impl<T> StatsDistribution<T>
where
    T: Num + Zero + PartialOrd + AddAssign + Default + Copy + Clone,
{
    /// Accumulate stats.
    ///
    /// * `distrib` - The other distribution.
    pub fn accumulate(&mut self, distrib: Self) {
        self.sum += distrib.sum;
        self.count += distrib.count;
        self.min = match (self.min, distrib.min) {
            (Some(a), Some(b)) => Some(pbrt::min(a, b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, distrib.max) {
            (Some(a), Some(b)) => Some(pbrt::max(a, b)),
            (a, b) => a.or(b),
        };
    }

    /// Report a sample value.
    ///
    /// * `val`  - Sample value.
    pub fn report(&mut self, val: T) {
        self.sum += val;
        self.count += 1;
        self.min = Some(self.min.map_or(val, |v| pbrt::min(v, val)));
        self.max = Some(self.max.map_or(val, |v| pbrt::max(v, val)));
    }

    /// Returns the number of samples reported.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the sum of the samples reported.
    pub fn sum(&self) -> T {
        self.sum
    }

    /// Clear stats.
    pub fn clear(&mut self) {
        self.sum = T::zero();
        self.count = 0;
        self.min = None;
        self.max = None;
    }
}

/// Aggregate different types of statistics.
#[derive(Default)]
pub struct StatsAccumulator {
    /// Counters.
    counters: BTreeMap<String, i64>,

    /// Memory counters.
    memory_counters: BTreeMap<String, u64>,

    /// Integer distribution.
    int_distribution: BTreeMap<String, StatsDistribution<i64>>,

    /// Percentages.
    percentages: BTreeMap<String, (i64, i64)>,
}

impl StatsAccumulator {
    /// Create a new instance of `StatsAccumulator`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates a counter value.
    ///
    /// * `name` - Statistic name.
    /// * `val`  - Counter value.
    pub fn report_counter(&mut self, name: &str, val: i64) {
        *self.counters.entry(name.to_string()).or_insert(0) += val;
    }

    /// Accumulates a memory counter value.
    ///
    /// * `name` - Statistic name.
    /// * `val`  - Memory counter value.
    pub fn report_memory_counter(&mut self, name: &str, val: u64) {
        *self.memory_counters.entry(name.to_string()).or_insert(0) += val;
    }

    /// Accumulates integer point distribution samples.
    ///
    /// * `name`    - Statistic name.
    /// * `distrib` - Distribution.
    pub fn report_int_distribution(&mut self, name: &str, distrib: StatsDistribution<i64>) {
        self.int_distribution
            .entry(name.to_string())
            .or_default()
            .accumulate(distrib);
    }

    /// Accumulates a percentage value.
    ///
    /// * `name`  - Statistic name.
    /// * `num`   - Numerator (actual count).
    /// * `denom` - Denominator (total count).
    pub fn report_percentage(&mut self, name: &str, num: i64, denom: i64) {
        let v = self.percentages.entry(name.to_string()).or_insert((0, 0));
        v.0 += num;
        v.1 += denom;
    }

    /// Returns the accumulated value of a counter.
    ///
    /// * `name` - Statistic name.
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    /// Returns the accumulated numerator and denominator of a percentage.
    ///
    /// * `name` - Statistic name.
    pub fn percentage(&self, name: &str) -> Option<(i64, i64)> {
        self.percentages.get(name).copied()
    }

    /// Formats the report grouped by category.
    pub fn report(&self) -> String {
        let mut to_print: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (k, v) in self.counters.iter() {
            if *v == 0 {
                continue;
            }
            let (category, title) = get_category_and_title(k);
            to_print
                .entry(category)
                .or_default()
                .push(format!("{title:<42}               {v:12}"));
        }

        for (k, v) in self.memory_counters.iter() {
            if *v == 0 {
                continue;
            }
            let (category, title) = get_category_and_title(k);
            let kb = *v as f64 / 1024.0;
            let s = if kb < 1024.0 {
                format!("{title:<42}                  {kb:9.2} kB")
            } else {
                let mib = kb / 1024.0;
                if mib < 1024.0 {
                    format!("{title:<42}                  {mib:9.2} MiB")
                } else {
                    let gib = mib / 1024.0;
                    format!("{title:<42}                  {gib:9.2} GiB")
                }
            };
            to_print.entry(category).or_default().push(s);
        }

        for (k, v) in self.int_distribution.iter() {
            if v.count == 0 {
                continue;
            }
            let mn = v.min.unwrap_or(i64::MAX);
            let mx = v.max.unwrap_or(i64::MIN);
            let (category, title) = get_category_and_title(k);
            let avg = v.sum as f64 / v.count as f64;
            to_print
                .entry(category)
                .or_default()
                .push(format!("{title:<42}                      {avg:.3} avg [range {mn} - {mx}]"));
        }

        for (k, &(num, denom)) in self.percentages.iter() {
            if denom == 0 {
                continue;
            }
            let (category, title) = get_category_and_title(k);
            to_print.entry(category).or_default().push(format!(
                "{title:<42}{num:12} / {denom:12} ({:.2}%)",
                (100.0 * num as f64) / denom as f64,
            ));
        }

        let mut out = String::from("Statistics:\n");
        for (category, items) in to_print {
            out.push_str(&format!("  {category}\n"));
            for item in items {
                out.push_str(&format!("    {item}\n"));
            }
        }
        out
    }

    /// Prints the report.
    pub fn print(&self) {
        print!("{}", self.report());
    }

    /// Clear the accumulated statistics.
    pub fn clear(&mut self) {
        self.counters.clear();
        self.memory_counters.clear();
        self.int_distribution.clear();
        self.percentages.clear();
    }
}

/// Splits a statistic name at the first `/` as the separator and returns category and title. If there is no `/`, then
/// category is the empty string.
///
/// * `s` - The statistic name to split.
fn get_category_and_title(s: &str) -> (String, String) {
    if let Some(slash) = s.find('/') {
        let category = &s[0..slash];
        let title = &s[slash + 1..];
        (category.to_string(), title.to_string())
    } else {
        ("".to_string(), s.to_string())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
