mod finance;

pub use finance::{Withdrawal, adjust_to_today, annuity_withdrawal, clamp_number, future_value};

use serde::Serialize;

use crate::core::{MonthlyPercentiles, RetirementInputs, RetirementProjection, SimulationResult};

/// Multiple of annual spending treated as a safe nest egg (the 4% rule).
pub const SAFE_WITHDRAWAL_MULTIPLE: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub age: u32,
    pub month: usize,
    pub p5: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub highlighted: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessRating {
    Strong,
    Fair,
    Weak,
}

impl SuccessRating {
    pub fn from_rate(success_rate: f64) -> Self {
        if success_rate >= 80.0 {
            SuccessRating::Strong
        } else if success_rate >= 60.0 {
            SuccessRating::Fair
        } else {
            SuccessRating::Weak
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    pub nest_egg: f64,
    pub monthly_withdrawal: f64,
    pub retirement_years: f64,
    pub accumulated_at_retirement: f64,
    pub sustainable_withdrawal: Withdrawal,
    pub sustainable_monthly_withdrawal_today: f64,
    pub success_rate: Option<f64>,
    pub success_fill: Option<f64>,
    pub rating: Option<SuccessRating>,
}

pub fn safe_withdrawal_target(retirement_spending: f64) -> f64 {
    SAFE_WITHDRAWAL_MULTIPLE * retirement_spending
}

pub fn first_month_reaching(result: &SimulationResult, target: f64) -> Option<&MonthlyPercentiles> {
    result
        .monthly_percentiles
        .iter()
        .find(|band| band.bands().iter().any(|&value| value >= target))
}

/// The row for the year after the 4%-rule target is first reached is highlighted.
pub fn yearly_table(result: &SimulationResult, retirement_spending: f64) -> Vec<YearRow> {
    let target = safe_withdrawal_target(retirement_spending);
    let highlighted_age =
        first_month_reaching(result, target).map(|band| whole_age(band.age).saturating_add(1));

    let mut rows: Vec<YearRow> = Vec::new();
    for band in &result.monthly_percentiles {
        let age = whole_age(band.age);
        if rows.last().is_some_and(|row| row.age == age) {
            continue;
        }
        rows.push(YearRow {
            age,
            month: band.month,
            p5: band.p5,
            p10: band.p10,
            p50: band.p50,
            p90: band.p90,
            p95: band.p95,
            highlighted: highlighted_age == Some(age),
        });
    }
    rows
}

pub fn summarize(
    inputs: &RetirementInputs,
    projection: &RetirementProjection,
    simulation: Option<&SimulationResult>,
) -> RetirementSummary {
    let years_to_retirement = (inputs.retirement_age - inputs.current_age).max(0.0);
    let retirement_years = (inputs.lifespan - inputs.retirement_age).max(0.0);

    let accumulated_at_retirement = future_value(
        inputs.current_savings,
        inputs.annual_contributions / 12.0,
        inputs.annual_return,
        years_to_retirement,
    );
    let sustainable_withdrawal =
        annuity_withdrawal(projection.nest_egg, inputs.annual_return, retirement_years);
    let sustainable_monthly_withdrawal_today = adjust_to_today(
        sustainable_withdrawal.monthly,
        inputs.annual_inflation,
        years_to_retirement,
    );

    let success_rate = simulation.map(|s| s.success_rate);
    RetirementSummary {
        nest_egg: projection.nest_egg,
        monthly_withdrawal: projection.monthly_withdrawal,
        retirement_years,
        accumulated_at_retirement,
        sustainable_withdrawal,
        sustainable_monthly_withdrawal_today,
        success_rate,
        success_fill: success_rate.map(|rate| clamp_number(rate, 0.0, 100.0)),
        rating: success_rate.map(SuccessRating::from_rate),
    }
}

fn whole_age(age: f64) -> u32 {
    if age.is_finite() && age > 0.0 {
        age.floor() as u32
    } else {
        0
    }
}
