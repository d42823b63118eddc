use super::types::{MonthlyProjection, RetirementInputs, RetirementProjection};

const FLEXIBLE_SPENDING_FACTOR: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
struct MonthlyRates {
    growth: f64,
    contribution: f64,
    inflation: f64,
}

impl MonthlyRates {
    fn from_inputs(inputs: &RetirementInputs) -> Self {
        Self {
            growth: inputs.annual_return / 100.0 / 12.0,
            contribution: inputs.annual_contributions / 12.0,
            inflation: inputs.annual_inflation / 100.0 / 12.0,
        }
    }
}

pub fn total_months(inputs: &RetirementInputs) -> usize {
    let months = ((inputs.lifespan - inputs.current_age) * 12.0).floor();
    if months.is_finite() && months > 0.0 {
        months as usize
    } else {
        0
    }
}

pub fn age_at_month(inputs: &RetirementInputs, month: usize) -> f64 {
    inputs.current_age + month as f64 / 12.0
}

/// Balances are clamped at zero after every month and the clamped value is what the next
/// month starts from, so a depleted path stays at zero.
pub fn project(inputs: &RetirementInputs) -> RetirementProjection {
    let months = total_months(inputs);
    let rates = MonthlyRates::from_inputs(inputs);

    let mut balance = inputs.current_savings;
    let mut nest_egg = None;
    let mut monthly_projections = Vec::with_capacity(months);

    for month in 0..months {
        let age = age_at_month(inputs, month);
        let is_retirement = age >= inputs.retirement_age;

        balance = if is_retirement {
            balance * (1.0 + rates.growth) - retirement_withdrawal(inputs, rates, month)
        } else {
            balance * (1.0 + rates.growth) + rates.contribution
        };
        balance = balance.max(0.0);

        if is_retirement && nest_egg.is_none() {
            nest_egg = Some(balance);
        }

        monthly_projections.push(MonthlyProjection {
            month,
            age,
            balance,
            is_retirement,
        });
    }

    RetirementProjection {
        nest_egg: nest_egg.unwrap_or(0.0),
        monthly_withdrawal: inputs.retirement_spending / 12.0,
        monthly_projections,
    }
}

/// Nominal withdrawal for a retirement month. The spending target is inflated from month
/// zero, not from the retirement date.
fn retirement_withdrawal(inputs: &RetirementInputs, rates: MonthlyRates, month: usize) -> f64 {
    let spend = inputs.retirement_spending * (1.0 + rates.inflation).powi(month as i32);
    let withdrawal = spend / 12.0;
    if inputs.flexible_spending && rates.growth < 0.0 {
        withdrawal * FLEXIBLE_SPENDING_FACTOR
    } else {
        withdrawal
    }
}
