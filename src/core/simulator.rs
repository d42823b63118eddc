use log::debug;
use rayon::prelude::*;

use super::projector::{age_at_month, project, total_months};
use super::random::{RandomSource, RngSource, derive_seed};
use super::types::{MonthlyPercentiles, RetirementInputs, SimulationResult};

const RETURN_HALF_WIDTH: f64 = 5.0;
const INFLATION_HALF_WIDTH: f64 = 1.0;
const LIFESPAN_HALF_WIDTH: f64 = 5.0;
const MIN_RETIREMENT_YEARS: f64 = 10.0;

const PERCENTILE_QUANTILES: [f64; 5] = [0.05, 0.10, 0.50, 0.90, 0.95];

#[derive(Debug)]
struct TrialOutcome {
    balances: Vec<f64>,
    success: bool,
}

pub fn simulate(inputs: &RetirementInputs, trial_count: u32) -> SimulationResult {
    simulate_seeded(inputs, trial_count, rand::random::<u64>())
}

pub fn simulate_seeded(inputs: &RetirementInputs, trial_count: u32, seed: u64) -> SimulationResult {
    let horizon = total_months(inputs);
    debug!("simulating {trial_count} trials over {horizon} months (seed {seed})");

    let trials = (0..trial_count as u64)
        .into_par_iter()
        .map(|trial_id| {
            let mut source = RngSource::seeded(derive_seed(seed, trial_id));
            run_trial(inputs, horizon, &mut source)
        })
        .collect::<Vec<_>>();

    aggregate(inputs, horizon, trial_count, &trials)
}

/// Sequential Monte Carlo run drawing from `source` in trial order: return, inflation,
/// lifespan for each trial.
pub fn simulate_with<S: RandomSource>(
    inputs: &RetirementInputs,
    trial_count: u32,
    source: &mut S,
) -> SimulationResult {
    let horizon = total_months(inputs);
    let trials = (0..trial_count)
        .map(|_| run_trial(inputs, horizon, source))
        .collect::<Vec<_>>();

    aggregate(inputs, horizon, trial_count, &trials)
}

pub(crate) fn perturb<S: RandomSource + ?Sized>(
    inputs: &RetirementInputs,
    source: &mut S,
) -> RetirementInputs {
    let annual_return = (inputs.annual_return + source.centered(RETURN_HALF_WIDTH)).max(0.0);
    let annual_inflation =
        (inputs.annual_inflation + source.centered(INFLATION_HALF_WIDTH)).max(0.0);
    let lifespan = (inputs.lifespan + source.centered(LIFESPAN_HALF_WIDTH))
        .max(inputs.retirement_age + MIN_RETIREMENT_YEARS);

    RetirementInputs {
        annual_return,
        annual_inflation,
        lifespan,
        ..*inputs
    }
}

fn run_trial<S: RandomSource + ?Sized>(
    inputs: &RetirementInputs,
    horizon: usize,
    source: &mut S,
) -> TrialOutcome {
    let perturbed = perturb(inputs, source);
    let balances = project(&perturbed)
        .monthly_projections
        .into_iter()
        .take(horizon)
        .map(|m| m.balance)
        .collect::<Vec<_>>();
    let success = balances.last().is_some_and(|&balance| balance > 0.0);

    TrialOutcome { balances, success }
}

fn aggregate(
    inputs: &RetirementInputs,
    horizon: usize,
    trial_count: u32,
    trials: &[TrialOutcome],
) -> SimulationResult {
    let successes = trials.iter().filter(|t| t.success).count();
    let success_rate = if trial_count == 0 {
        0.0
    } else {
        100.0 * successes as f64 / trial_count as f64
    };

    let monthly_percentiles = (0..horizon)
        .into_par_iter()
        .map(|month| {
            // Trials with a shortened lifespan have no sample here.
            let mut samples = trials
                .iter()
                .filter_map(|t| t.balances.get(month).copied())
                .collect::<Vec<_>>();
            month_percentiles(inputs, month, &mut samples)
        })
        .collect::<Vec<_>>();

    SimulationResult {
        success_rate,
        monthly_percentiles,
    }
}

fn month_percentiles(
    inputs: &RetirementInputs,
    month: usize,
    samples: &mut [f64],
) -> MonthlyPercentiles {
    samples.sort_by(|a, b| a.total_cmp(b));
    let sorted: &[f64] = samples;
    let [p5, p10, p50, p90, p95] = PERCENTILE_QUANTILES.map(|q| lower_rank_percentile(sorted, q));

    MonthlyPercentiles {
        month,
        age: age_at_month(inputs, month),
        p5,
        p10,
        p50,
        p90,
        p95,
    }
}

/// Element at `floor(len * q)` of an ascending slice, 0 when out of range.
fn lower_rank_percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (sorted.len() as f64 * q).floor() as usize;
    sorted.get(rank).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::SequenceSource;
    use proptest::prelude::{any, prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_inputs() -> RetirementInputs {
        RetirementInputs {
            current_age: 42.0,
            retirement_age: 65.0,
            lifespan: 90.0,
            current_savings: 1_200_000.0,
            annual_contributions: 12_000.0,
            annual_return: 7.0,
            annual_inflation: 2.5,
            retirement_spending: 90_000.0,
            flexible_spending: false,
        }
    }

    #[test]
    fn lower_rank_percentile_uses_floor_index_without_interpolation() {
        let sorted = (0..10).map(|v| v as f64).collect::<Vec<_>>();
        assert_approx(lower_rank_percentile(&sorted, 0.05), 0.0);
        assert_approx(lower_rank_percentile(&sorted, 0.10), 1.0);
        assert_approx(lower_rank_percentile(&sorted, 0.50), 5.0);
        assert_approx(lower_rank_percentile(&sorted, 0.90), 9.0);
        assert_approx(lower_rank_percentile(&sorted, 0.95), 9.0);
        assert_approx(lower_rank_percentile(&[], 0.5), 0.0);
        assert_approx(lower_rank_percentile(&sorted, 1.0), 0.0);
    }

    #[test]
    fn perturb_respects_floors() {
        let mut inputs = sample_inputs();
        inputs.annual_return = 2.0;
        inputs.annual_inflation = 0.5;
        inputs.lifespan = 70.0;

        let mut low = SequenceSource::new(vec![0.0]);
        let perturbed = perturb(&inputs, &mut low);
        assert_approx(perturbed.annual_return, 0.0);
        assert_approx(perturbed.annual_inflation, 0.0);
        assert_approx(perturbed.lifespan, 75.0);
        assert_approx(perturbed.current_savings, inputs.current_savings);
        assert_eq!(perturbed.flexible_spending, inputs.flexible_spending);
    }

    #[test]
    fn perturb_consumes_return_inflation_lifespan_in_order() {
        let inputs = sample_inputs();
        let mut source = SequenceSource::new(vec![0.75, 0.25, 1.0]);
        let perturbed = perturb(&inputs, &mut source);
        assert_approx(perturbed.annual_return, 9.5);
        assert_approx(perturbed.annual_inflation, 2.0);
        assert_approx(perturbed.lifespan, 95.0);
    }

    #[test]
    fn zero_noise_trials_reproduce_the_deterministic_projection() {
        let inputs = sample_inputs();
        let mut source = SequenceSource::new(vec![0.5]);
        let result = simulate_with(&inputs, 20, &mut source);
        let projection = project(&inputs);

        assert_eq!(
            result.monthly_percentiles.len(),
            projection.monthly_projections.len()
        );
        for (band, month) in result
            .monthly_percentiles
            .iter()
            .zip(&projection.monthly_projections)
        {
            assert_eq!(band.month, month.month);
            assert_approx(band.age, month.age);
            for value in band.bands() {
                assert_approx(value, month.balance);
            }
        }

        let final_balance = projection
            .monthly_projections
            .last()
            .map(|m| m.balance)
            .unwrap_or(0.0);
        let expected_rate = if final_balance > 0.0 { 100.0 } else { 0.0 };
        assert_approx(result.success_rate, expected_rate);
    }

    #[test]
    fn shortened_trials_leave_later_months_with_fewer_samples() {
        let inputs = sample_inputs();
        // Trial one has no noise; trial two gains return and dies five years early.
        let mut source = SequenceSource::new(vec![0.5, 0.5, 0.5, 0.9, 0.5, 0.0]);
        let result = simulate_with(&inputs, 2, &mut source);
        let baseline = project(&inputs).monthly_projections;

        let mut boosted_inputs = inputs;
        boosted_inputs.annual_return += (0.9 - 0.5) * 2.0 * RETURN_HALF_WIDTH;
        boosted_inputs.lifespan = 85.0;
        let boosted = project(&boosted_inputs).monthly_projections;
        assert_eq!(boosted.len(), 516);

        let early = &result.monthly_percentiles[12];
        assert_approx(early.p5, baseline[12].balance);
        assert_approx(early.p10, baseline[12].balance);
        assert_approx(early.p50, boosted[12].balance);
        assert_approx(early.p95, boosted[12].balance);
        assert!(early.p50 > early.p5);

        for band in &result.monthly_percentiles[516..] {
            for value in band.bands() {
                assert_approx(value, baseline[band.month].balance);
            }
        }
    }

    #[test]
    fn success_uses_last_recorded_month_of_each_trial() {
        let mut inputs = sample_inputs();
        inputs.current_savings = 0.0;
        inputs.annual_contributions = 0.0;
        inputs.retirement_spending = 12.0;
        // Nothing saved: every trial ends at zero and fails.
        let mut source = SequenceSource::new(vec![0.5]);
        let result = simulate_with(&inputs, 4, &mut source);
        assert_approx(result.success_rate, 0.0);

        inputs.current_savings = 10_000_000.0;
        let mut source = SequenceSource::new(vec![0.5]);
        let result = simulate_with(&inputs, 4, &mut source);
        assert_approx(result.success_rate, 100.0);
    }

    #[test]
    fn zero_trials_produce_zero_rate_and_zero_bands() {
        let inputs = sample_inputs();
        let result = simulate_seeded(&inputs, 0, 1);
        assert_approx(result.success_rate, 0.0);
        assert_eq!(result.monthly_percentiles.len(), 576);
        assert!(
            result
                .monthly_percentiles
                .iter()
                .all(|b| b.bands().iter().all(|v| *v == 0.0))
        );
    }

    #[test]
    fn zero_horizon_yields_no_bands() {
        let mut inputs = sample_inputs();
        inputs.lifespan = inputs.current_age;
        let result = simulate_seeded(&inputs, 10, 3);
        assert!(result.monthly_percentiles.is_empty());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let inputs = sample_inputs();
        let a = simulate_seeded(&inputs, 64, 99);
        let b = simulate_seeded(&inputs, 64, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn single_trial_success_rate_is_all_or_nothing() {
        let inputs = sample_inputs();
        for _ in 0..8 {
            let result = simulate(&inputs, 1);
            assert!(result.success_rate == 0.0 || result.success_rate == 100.0);
        }
    }

    #[test]
    fn unseeded_simulation_covers_the_original_horizon() {
        let inputs = sample_inputs();
        let result = simulate(&inputs, 50);
        assert_eq!(result.monthly_percentiles.len(), total_months(&inputs));
        assert!((0.0..=100.0).contains(&result.success_rate));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(16))]

        #[test]
        fn prop_percentiles_are_ordered_and_rate_is_bounded(
            seed in any::<u64>(),
            trials in 1u32..40,
            current_age in 25u32..55,
            retirement_gap in 1u32..20,
            retirement_span in 1u32..30,
            savings in 0u32..2_000_000,
            return_bp in -500i32..1_500,
            spending in 10_000u32..200_000,
            flexible in proptest::bool::ANY,
        ) {
            let inputs = RetirementInputs {
                current_age: current_age as f64,
                retirement_age: (current_age + retirement_gap) as f64,
                lifespan: (current_age + retirement_gap + retirement_span) as f64,
                current_savings: savings as f64,
                annual_contributions: 10_000.0,
                annual_return: return_bp as f64 / 100.0,
                annual_inflation: 2.0,
                retirement_spending: spending as f64,
                flexible_spending: flexible,
            };

            let result = simulate_seeded(&inputs, trials, seed);
            prop_assert!((0.0..=100.0).contains(&result.success_rate));
            prop_assert!(result.monthly_percentiles.len() == total_months(&inputs));
            for band in &result.monthly_percentiles {
                prop_assert!(band.p5 <= band.p10);
                prop_assert!(band.p10 <= band.p50);
                prop_assert!(band.p50 <= band.p90);
                prop_assert!(band.p90 <= band.p95);
                prop_assert!(band.p5 >= 0.0);
            }
        }
    }
}
