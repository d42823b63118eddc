use log::debug;
use serde::Serialize;
use thiserror::Error;

use super::{RetirementInputs, simulate_seeded};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    RequiredContribution,
    MaxSpending,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    /// Success rate to reach, in percent.
    pub target_success_rate: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub trials_per_iteration: u32,
    pub final_trials: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub success_rate: f64,
    pub success_ci_half_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub target_success_rate: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub solved_value: Option<f64>,
    pub achieved_success_rate: Option<f64>,
    pub achieved_success_ci_half_width: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("target success rate must be between 0 and 100")]
    TargetOutOfRange,
    #[error("search bounds must be finite")]
    NonFiniteBounds,
    #[error("search max must be greater than search min")]
    InvertedBounds,
    #[error("tolerance must be > 0")]
    Tolerance,
    #[error("{0} must be > 0")]
    ZeroCount(&'static str),
}

// Every candidate reuses `config.seed`, so success moves monotonically with the searched value.
pub fn solve_goal(
    inputs: &RetirementInputs,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult, SolveError> {
    validate_config(config)?;

    let target = config.target_success_rate;
    let meets = |rate: f64| rate + 1e-12 >= target;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_eval =
        evaluate_candidate(inputs, config, config.search_min, config.trials_per_iteration);
    let high_eval =
        evaluate_candidate(inputs, config, config.search_max, config.trials_per_iteration);

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    // Contributions raise the success rate; spending lowers it.
    let increasing = config.goal_type == GoalType::RequiredContribution;
    let (edge_ok, other_ok) = if increasing {
        (meets(low_eval.success_rate), meets(high_eval.success_rate))
    } else {
        (meets(high_eval.success_rate), meets(low_eval.success_rate))
    };

    if edge_ok {
        solved_value = Some(if increasing {
            config.search_min
        } else {
            config.search_max
        });
        converged = true;
        feasible = true;
        message = match config.goal_type {
            GoalType::RequiredContribution => {
                "Already meets target at lower contribution bound.".to_string()
            }
            GoalType::MaxSpending => {
                "Upper spending bound is still feasible; increase search max for a higher target."
                    .to_string()
            }
        };
    } else if !other_ok {
        feasible = false;
        message = match config.goal_type {
            GoalType::RequiredContribution => {
                "No feasible contribution found within the search bounds.".to_string()
            }
            GoalType::MaxSpending => {
                "No feasible spending found within the search bounds.".to_string()
            }
        };
    } else {
        // `good` always meets the target, `bad` never does.
        let (mut good, mut bad) = if increasing {
            (config.search_max, config.search_min)
        } else {
            (config.search_min, config.search_max)
        };
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (good + bad) * 0.5;
            let eval = evaluate_candidate(inputs, config, mid, config.trials_per_iteration);
            iterations.push(GoalSolveIteration {
                iteration: it,
                lower_bound: good.min(bad),
                upper_bound: good.max(bad),
                candidate_value: mid,
                success_rate: eval.success_rate,
                success_ci_half_width: eval.success_ci_half_width,
            });

            if meets(eval.success_rate) {
                good = mid;
            } else {
                bad = mid;
            }

            if (good - bad).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some(good);
        feasible = true;
        message = if converged {
            match config.goal_type {
                GoalType::RequiredContribution => "Solved required contribution.".to_string(),
                GoalType::MaxSpending => "Solved maximum sustainable spending.".to_string(),
            }
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let mut achieved_success_rate = None;
    let mut achieved_success_ci_half_width = None;
    if let Some(value) = solved_value {
        let final_eval = evaluate_candidate(inputs, config, value, config.final_trials);
        achieved_success_rate = Some(final_eval.success_rate);
        achieved_success_ci_half_width = Some(final_eval.success_ci_half_width);
    }
    debug!(
        "goal {:?} solved to {:?} after {} iterations",
        config.goal_type,
        solved_value,
        iterations.len()
    );

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        target_success_rate: config.target_success_rate,
        search_min: config.search_min,
        search_max: config.search_max,
        solved_value,
        achieved_success_rate,
        achieved_success_ci_half_width,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    success_rate: f64,
    success_ci_half_width: f64,
}

fn evaluate_candidate(
    base_inputs: &RetirementInputs,
    config: GoalSolveConfig,
    candidate_value: f64,
    trials: u32,
) -> CandidateEval {
    let mut inputs = *base_inputs;
    match config.goal_type {
        GoalType::RequiredContribution => inputs.annual_contributions = candidate_value.max(0.0),
        GoalType::MaxSpending => inputs.retirement_spending = candidate_value.max(0.0),
    }

    let trials = trials.max(1);
    let result = simulate_seeded(&inputs, trials, config.seed);
    CandidateEval {
        success_rate: result.success_rate,
        success_ci_half_width: binomial_ci_half_width(result.success_rate, trials),
    }
}

/// 95% normal-approximation half width, in percentage points.
fn binomial_ci_half_width(rate_percent: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = (rate_percent / 100.0).clamp(0.0, 1.0);
    100.0 * 1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(config: GoalSolveConfig) -> Result<(), SolveError> {
    if !(0.0..=100.0).contains(&config.target_success_rate) {
        return Err(SolveError::TargetOutOfRange);
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SolveError::NonFiniteBounds);
    }
    if config.search_max <= config.search_min {
        return Err(SolveError::InvertedBounds);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolveError::Tolerance);
    }
    if config.max_iterations == 0 {
        return Err(SolveError::ZeroCount("max iterations"));
    }
    if config.trials_per_iteration == 0 {
        return Err(SolveError::ZeroCount("trials per iteration"));
    }
    if config.final_trials == 0 {
        return Err(SolveError::ZeroCount("final trials"));
    }
    Ok(())
}
