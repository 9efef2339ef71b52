//! Property-based tests for the model invariants that must hold across the
//! whole parameter and history space, not just at fitted values.

use proptest::prelude::*;

use clv_core::bgbb;
use clv_core::{
    dert, expected_cohort_transactions, expected_spend, p_alive, BgbbParams, CbsRow, SpendParams,
};

/// Shape parameters in the range real cohort fits land in.
fn bgbb_params() -> impl Strategy<Value = BgbbParams> {
    (0.05..20.0f64, 0.05..20.0f64, 0.05..20.0f64, 0.05..20.0f64)
        .prop_map(|(a, b, g, d)| BgbbParams::new(a, b, g, d).unwrap())
}

/// A valid history triple: x <= t_x <= n, horizons up to 40 periods.
fn triple() -> impl Strategy<Value = (u32, u32, u32)> {
    (0u32..=40).prop_flat_map(|n| {
        (0..=n).prop_flat_map(move |t_x| (0..=t_x).prop_map(move |x| (x, t_x, n)))
    })
}

fn spend_params() -> impl Strategy<Value = SpendParams> {
    (0.1..15.0f64, 1.05..15.0f64, 0.5..100.0f64)
        .prop_map(|(p, q, g)| SpendParams::new(p, q, g).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Probability of alive is a probability.
    #[test]
    fn p_alive_is_bounded(params in bgbb_params(), (x, t_x, n) in triple()) {
        let alive = p_alive(&params, x, t_x, n).unwrap();
        prop_assert!((0.0..=1.0).contains(&alive), "p_alive({x},{t_x},{n}) = {alive}");
    }

    /// A customer active in the final period is certainly alive.
    #[test]
    fn current_customers_are_alive(params in bgbb_params(), n in 0u32..=40) {
        let alive = p_alive(&params, n, n, n).unwrap();
        prop_assert!((alive - 1.0).abs() < 1e-12);
    }

    /// Residual transactions are non-negative and discounting never raises
    /// them.
    #[test]
    fn dert_non_negative_and_monotone(params in bgbb_params(), (x, t_x, n) in triple()) {
        let mut last = f64::INFINITY;
        for rate in [0.0, 0.001, 0.01, 0.1] {
            let d = dert(&params, x, t_x, n, rate).unwrap();
            prop_assert!(d >= 0.0, "dert({x},{t_x},{n},{rate}) = {d}");
            prop_assert!(d <= last * (1.0 + 1e-9) + 1e-12,
                "dert({x},{t_x},{n}) rose from {last} to {d} at rate {rate}");
            last = d;
        }
    }

    /// Longer silence never raises the survival belief of a one-shot
    /// customer.
    #[test]
    fn silence_is_monotone_evidence(params in bgbb_params(), n in 1u32..=40) {
        let shorter = p_alive(&params, 0, 0, n - 1).unwrap();
        let longer = p_alive(&params, 0, 0, n).unwrap();
        prop_assert!(longer <= shorter + 1e-12, "{longer} > {shorter} at n = {n}");
    }

    /// The cohort transaction curve accumulates.
    #[test]
    fn cohort_curve_non_decreasing(params in bgbb_params(), n in 1u32..=60) {
        let shorter = expected_cohort_transactions(&params, n - 1).unwrap();
        let longer = expected_cohort_transactions(&params, n).unwrap();
        prop_assert!(longer >= shorter - 1e-12);
    }

    /// Collapsing identical rows into weighted patterns is exact.
    #[test]
    fn pattern_collapse_is_exact(params in bgbb_params(), (x, t_x, n) in triple(), copies in 1usize..6) {
        let rows: Vec<CbsRow> = (0..copies)
            .map(|i| CbsRow::new(format!("c{i}"), x, t_x, n).unwrap())
            .collect();
        let collapsed = bgbb::log_likelihood(&params, &rows);
        let row_by_row: f64 = rows
            .iter()
            .map(|r| bgbb::log_likelihood(&params, std::slice::from_ref(r)))
            .sum();
        prop_assert!((collapsed - row_by_row).abs() < 1e-9 * (1.0 + row_by_row.abs()));
    }

    /// Conditional spend interpolates between the population mean and the
    /// observed mean, so it is bounded by them.
    #[test]
    fn expected_spend_is_a_blend(params in spend_params(), mean in 0.5..500.0f64, count in 1u32..60) {
        let population = params.population_mean_value().unwrap();
        let e = expected_spend(&params, mean, count).unwrap();
        let lo = population.min(mean) - 1e-9;
        let hi = population.max(mean) + 1e-9;
        prop_assert!(e >= lo && e <= hi, "blend {e} outside [{lo}, {hi}]");
    }

    /// No history means the population mean, exactly.
    #[test]
    fn no_history_scores_population_mean(params in spend_params(), mean in 0.5..500.0f64) {
        let population = params.population_mean_value().unwrap();
        let e = expected_spend(&params, mean, 0).unwrap();
        prop_assert!((e - population).abs() < 1e-12);
    }
}
