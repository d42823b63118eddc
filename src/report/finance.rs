use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub monthly: f64,
    pub annual: f64,
}

pub fn future_value(
    current_savings: f64,
    monthly_contribution: f64,
    annual_return_percent: f64,
    years: f64,
) -> f64 {
    let months = whole_months(years);
    let monthly_rate = annual_return_percent / 100.0 / 12.0;

    if months == 0 {
        return current_savings;
    }
    if monthly_rate == 0.0 {
        return current_savings + monthly_contribution * months as f64;
    }

    let growth = (1.0 + monthly_rate).powi(months as i32);
    current_savings * growth + monthly_contribution * ((growth - 1.0) / monthly_rate)
}

/// Level payment that exhausts `nest_egg` over `years` (at least one month).
pub fn annuity_withdrawal(nest_egg: f64, annual_return_percent: f64, years: f64) -> Withdrawal {
    let months = whole_months(years).max(1);
    let monthly_rate = annual_return_percent / 100.0 / 12.0;

    if nest_egg <= 0.0 {
        return Withdrawal {
            monthly: 0.0,
            annual: 0.0,
        };
    }

    let monthly = if monthly_rate == 0.0 {
        nest_egg / months as f64
    } else {
        let denominator = 1.0 - (1.0 + monthly_rate).powi(-(months as i32));
        if denominator == 0.0 {
            0.0
        } else {
            nest_egg * monthly_rate / denominator
        }
    };

    Withdrawal {
        monthly,
        annual: monthly * 12.0,
    }
}

pub fn adjust_to_today(nominal: f64, annual_inflation_percent: f64, years: f64) -> f64 {
    let factor = (1.0 + annual_inflation_percent / 100.0).powf(years.max(0.0));
    if factor == 0.0 {
        return nominal;
    }
    nominal / factor
}

pub fn clamp_number(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

fn whole_months(years: f64) -> usize {
    let months = (years * 12.0).floor();
    if months.is_finite() && months > 0.0 {
        months as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RetirementInputs, project};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn future_value_without_time_is_current_savings() {
        assert_approx(future_value(5_000.0, 100.0, 8.0, 0.0), 5_000.0);
        assert_approx(future_value(5_000.0, 100.0, 8.0, -3.0), 5_000.0);
    }

    #[test]
    fn future_value_at_zero_rate_is_linear() {
        assert_approx(future_value(1_000.0, 50.0, 0.0, 2.0), 1_000.0 + 50.0 * 24.0);
    }

    #[test]
    fn future_value_matches_the_monthly_recurrence() {
        let inputs = RetirementInputs {
            current_age: 40.0,
            retirement_age: 50.0,
            lifespan: 80.0,
            current_savings: 25_000.0,
            annual_contributions: 6_000.0,
            annual_return: 6.0,
            annual_inflation: 0.0,
            retirement_spending: 0.0,
            flexible_spending: false,
        };
        let projection = project(&inputs);
        let last_accumulation = projection.monthly_projections[119].balance;

        let closed_form = future_value(25_000.0, 500.0, 6.0, 10.0);
        assert!((closed_form - last_accumulation).abs() < 1e-4);
    }

    #[test]
    fn annuity_withdrawal_handles_zero_rate_and_empty_egg() {
        let flat = annuity_withdrawal(120_000.0, 0.0, 10.0);
        assert_approx(flat.monthly, 1_000.0);
        assert_approx(flat.annual, 12_000.0);

        let empty = annuity_withdrawal(0.0, 5.0, 10.0);
        assert_approx(empty.monthly, 0.0);
    }

    #[test]
    fn annuity_withdrawal_exhausts_the_balance() {
        let payout = annuity_withdrawal(500_000.0, 6.0, 25.0);
        let mut balance = 500_000.0;
        for _ in 0..300 {
            balance = balance * 1.005 - payout.monthly;
        }
        assert!(balance.abs() < 1e-3);
    }

    #[test]
    fn annuity_withdrawal_uses_at_least_one_month() {
        let payout = annuity_withdrawal(1_000.0, 0.0, 0.0);
        assert_approx(payout.monthly, 1_000.0);
    }

    #[test]
    fn adjust_to_today_deflates_by_compound_inflation() {
        assert_approx(adjust_to_today(121.0, 10.0, 2.0), 100.0);
        assert_approx(adjust_to_today(121.0, 10.0, -2.0), 121.0);
        assert_approx(adjust_to_today(50.0, -100.0, 3.0), 50.0);
    }

    #[test]
    fn clamp_number_bounds_both_sides() {
        assert_approx(clamp_number(120.0, 0.0, 100.0), 100.0);
        assert_approx(clamp_number(-3.0, 0.0, 100.0), 0.0);
        assert_approx(clamp_number(42.0, 0.0, 100.0), 42.0);
    }
}
