//! Macros

/// Create a thread local variable to track an `i64` counter across threads.
///
/// * `$title`     - Descriptive title of the statistic that uses `/` as a separator for categories.
///                  For example: "Photon Beams/Beams tested",
/// * `$var`       - An identifier for the thread local variable.
/// * `stats_func` - An identifier for the callback function used by `StatsRegistrar::call_stat_funcs()` to report to
///                 `StatsAccumulator`.
#[macro_export]
macro_rules! stat_counter {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        thread_local! { pub(crate) static $var: std::cell::RefCell<i64> = std::cell::RefCell::new(0); }

        pub(crate) fn $stats_func(accum: &mut $crate::stats::StatsAccumulator) {
            let val = $var.with(|v| std::mem::take(&mut *v.borrow_mut()));
            accum.report_counter($title, val);
        }
    };
}

/// Create a thread local variable to track memory usage as a counter across threads.
///
/// * `$title`     - Descriptive title of the statistic that uses `/` as a separator for categories.
///                  For example: "Memory/Photon beam grid",
/// * `$var`       - An identifier for the thread local variable.
/// * `stats_func` - An identifier for the callback function used by `StatsRegistrar::call_stat_funcs()` to report to
///                 `StatsAccumulator`.
#[macro_export]
macro_rules! stat_memory_counter {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        thread_local! { pub(crate) static $var: std::cell::RefCell<u64> = std::cell::RefCell::new(0); }

        pub(crate) fn $stats_func(accum: &mut $crate::stats::StatsAccumulator) {
            let val = $var.with(|v| std::mem::take(&mut *v.borrow_mut()));
            accum.report_memory_counter($title, val);
        }
    };
}

/// Create a thread local variable to track an integer distribution across threads.
///
/// * `$title`     - Descriptive title of the statistic that uses `/` as a separator for categories.
/// * `$var`       - An identifier for the thread local variable.
/// * `stats_func` - An identifier for the callback function used by `StatsRegistrar::call_stat_funcs()` to report to
///                 `StatsAccumulator`.
#[macro_export]
macro_rules! stat_int_distribution {
    ($title: expr, $var: ident, $stats_func: ident $(,)?) => {
        thread_local! {
            pub(crate) static $var: std::cell::RefCell<$crate::stats::StatsDistribution<i64>> =
                std::cell::RefCell::new($crate::stats::StatsDistribution::default());
        }

        pub(crate) fn $stats_func(accum: &mut $crate::stats::StatsAccumulator) {
            let val = $var.with(|v| std::mem::take(&mut *v.borrow_mut()));
            accum.report_int_distribution($title, val);
        }
    };
}

/// Create thread local variables to track an `i64` values for numerator/denominator as percentage across threads.
///
/// * `$title`     - Descriptive title of the statistic that uses `/` as a separator for categories.
/// * `$var_num`   - An identifier for the thread local variable for numerator (actual count).
/// * `$var_denom` - An identifier for the thread local variable for denominator (total count).
/// * `stats_func` - An identifier for the callback function used by `StatsRegistrar::call_stat_funcs()` to report to
///                 `StatsAccumulator`.
#[macro_export]
macro_rules! stat_percent {
    ($title: expr, $var_num: ident, $var_denom: ident, $stats_func: ident $(,)?) => {
        thread_local! {
            pub(crate) static $var_num: std::cell::RefCell<i64> = std::cell::RefCell::new(0);
            pub(crate) static $var_denom: std::cell::RefCell<i64> = std::cell::RefCell::new(0);
        }

        pub(crate) fn $stats_func(accum: &mut $crate::stats::StatsAccumulator) {
            let num = $var_num.with(|v| std::mem::take(&mut *v.borrow_mut()));
            let denom = $var_denom.with(|v| std::mem::take(&mut *v.borrow_mut()));
            accum.report_percentage($title, num, denom);
        }
    };
}

/// Convenience macro to increment a thread local variable for counter/percent statistics.
#[macro_export]
macro_rules! stat_inc {
    ($var: ident, $e: expr) => {
        $var.with(|v| *v.borrow_mut() += $e);
    };
}

/// Convenience macro to report a thread local variable for int distribution statistics.
#[macro_export]
macro_rules! stat_dist {
    ($var: ident, $e: expr) => {
        $var.with(|v| v.borrow_mut().report($e));
    };
}

/// Convenience macro to register the callback functions for statistics.
///
/// * `$($func: ident),+` - One or more callback functions created by the `stat_*` macros.
#[macro_export]
macro_rules! stat_register_fns {
    ($($stat_func: ident),+ $(,)?) => {
        /// Return the whether stats are registered.
        pub(crate) fn is_stats_registered() -> &'static std::sync::Mutex<bool> {
            static DATA: std::sync::OnceLock<std::sync::Mutex<bool>> = std::sync::OnceLock::new();
            DATA.get_or_init(|| std::sync::Mutex::new(false))
        }

        /// Call this function from the constructor of a module's top-level struct to register the statistics, e.g.
        /// `BeamGrid::new()`. Subsequent calls do nothing.
        pub(crate) fn register_stats() {
            let mut is_registered = is_stats_registered()
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if !*is_registered {
                let mut sr = $crate::stats::stats_registrar()
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                $(
                    sr.register_stat_func($stat_func);
                )+
                *is_registered = true;
            }
        }
    };
}

/// Convenience function to accumulate thread local statistics in the global `StatsAccumulator`. This will call the
/// registered callbacks created with `stat_*` macros. This should be called at the end of each spawned thread and at
/// the end of a run from the main thread.
#[macro_export]
macro_rules! report_stats {
    () => {{
        let mut accum = $crate::stats::stats_accumulator()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        $crate::stats::stats_registrar()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .call_stat_funcs(&mut accum);
    }};
}

/// Convenience function to print accumulated statistic in the global `StatsAccumulator`.
#[macro_export]
macro_rules! print_stats {
    () => {{
        $crate::stats::stats_accumulator()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .print();
    }};
}
