use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementInputs {
    pub current_age: f64,
    pub retirement_age: f64,
    pub lifespan: f64,
    pub current_savings: f64,
    pub annual_contributions: f64,
    pub annual_return: f64,
    pub annual_inflation: f64,
    /// Annual spending target in today's money.
    pub retirement_spending: f64,
    pub flexible_spending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjection {
    pub month: usize,
    pub age: f64,
    pub balance: f64,
    pub is_retirement: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjection {
    pub nest_egg: f64,
    pub monthly_withdrawal: f64,
    pub monthly_projections: Vec<MonthlyProjection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPercentiles {
    pub month: usize,
    pub age: f64,
    pub p5: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
}

impl MonthlyPercentiles {
    pub fn bands(&self) -> [f64; 5] {
        [self.p5, self.p10, self.p50, self.p90, self.p95]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub success_rate: f64,
    pub monthly_percentiles: Vec<MonthlyPercentiles>,
}
