use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    GoalSolveConfig, GoalSolveResult, GoalType, RetirementInputs, RetirementProjection,
    SimulationResult, project, simulate, simulate_seeded, solve_goal,
};
use crate::report::{RetirementSummary, YearRow, safe_withdrawal_target, summarize, yearly_table};

mod error;

pub use error::{CliError, InputError};

const MAX_TRIALS: u32 = 100_000;
const MAX_SOLVE_ITERATIONS: u32 = 200;

const CURRENT_AGE_RANGE: (f64, f64) = (18.0, 100.0);
const RETIREMENT_AGE_RANGE: (f64, f64) = (40.0, 100.0);
const LIFESPAN_RANGE: (f64, f64) = (60.0, 120.0);

const DEFAULT_CURRENT_AGE: f64 = 42.0;
const DEFAULT_RETIREMENT_AGE: f64 = 65.0;
const DEFAULT_LIFESPAN: f64 = 90.0;
const DEFAULT_CURRENT_SAVINGS: f64 = 1_200_000.0;
const DEFAULT_ANNUAL_CONTRIBUTIONS: f64 = 12_000.0;
const DEFAULT_ANNUAL_RETURN: f64 = 15.0;
const DEFAULT_ANNUAL_INFLATION: f64 = 2.5;
const DEFAULT_RETIREMENT_SPENDING: f64 = 180_000.0;
const DEFAULT_TRIALS: u32 = 1_000;

const DEFAULT_SOLVE_SEED: u64 = 42;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGoalType {
    #[serde(
        alias = "requiredContribution",
        alias = "required_contribution",
        alias = "contribution"
    )]
    RequiredContribution,
    #[serde(alias = "maxSpending", alias = "max_spending", alias = "spending")]
    MaxSpending,
}

impl From<ApiGoalType> for GoalType {
    fn from(value: ApiGoalType) -> Self {
        match value {
            ApiGoalType::RequiredContribution => GoalType::RequiredContribution,
            ApiGoalType::MaxSpending => GoalType::MaxSpending,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<f64>,
    retirement_age: Option<f64>,
    lifespan: Option<f64>,
    current_savings: Option<f64>,
    annual_contributions: Option<f64>,
    annual_return: Option<f64>,
    annual_inflation: Option<f64>,
    retirement_spending: Option<f64>,
    flexible_spending: Option<bool>,
    trials: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolvePayload {
    goal: ApiGoalType,
    #[serde(default)]
    target_success_rate: Option<f64>,
    #[serde(default)]
    search_min: Option<f64>,
    #[serde(default)]
    search_max: Option<f64>,
    #[serde(default)]
    tolerance: Option<f64>,
    #[serde(default)]
    max_iterations: Option<u32>,
    #[serde(default)]
    trials_per_iteration: Option<u32>,
    #[serde(default)]
    final_trials: Option<u32>,
    #[serde(flatten)]
    scenario: SimulatePayload,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nestegg",
    about = "Monthly retirement projection with Monte Carlo percentile bands"
)]
pub struct Cli {
    #[arg(long, default_value_t = DEFAULT_CURRENT_AGE)]
    current_age: f64,
    #[arg(long, default_value_t = DEFAULT_RETIREMENT_AGE, help = "Retirement age target")]
    retirement_age: f64,
    #[arg(long, default_value_t = DEFAULT_LIFESPAN, help = "Lifespan assumption in years")]
    lifespan: f64,
    #[arg(long, default_value_t = DEFAULT_CURRENT_SAVINGS)]
    current_savings: f64,
    #[arg(long, default_value_t = DEFAULT_ANNUAL_CONTRIBUTIONS)]
    annual_contributions: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUAL_RETURN,
        help = "Expected annual return in percent, e.g. 7"
    )]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_ANNUAL_INFLATION,
        help = "Expected annual inflation in percent"
    )]
    annual_inflation: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_RETIREMENT_SPENDING,
        help = "Desired annual retirement spending in today's money"
    )]
    retirement_spending: f64,
    #[arg(long, help = "Cut withdrawals by 25% in months with negative returns")]
    flexible_spending: bool,
    #[arg(long, default_value_t = DEFAULT_TRIALS)]
    trials: u32,
    #[arg(long, help = "Seed for a reproducible run; unseeded runs vary between calls")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Scenario {
    inputs: RetirementInputs,
    trials: u32,
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    inputs: RetirementInputs,
    projection: RetirementProjection,
    summary: RetirementSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    inputs: RetirementInputs,
    trials: u32,
    seed: Option<u64>,
    safe_withdrawal_target: f64,
    summary: RetirementSummary,
    projection: RetirementProjection,
    simulation: SimulationResult,
    yearly_table: Vec<YearRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn check_age(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), InputError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(InputError::AgeOutOfRange { field, min, max })
    }
}

fn check_trials(field: &'static str, trials: u32) -> Result<u32, InputError> {
    if trials == 0 || trials > MAX_TRIALS {
        return Err(InputError::TrialCount {
            field,
            max: MAX_TRIALS,
        });
    }
    Ok(trials)
}

fn build_scenario(cli: Cli) -> Result<Scenario, InputError> {
    let inputs = RetirementInputs {
        current_age: sanitize(cli.current_age),
        retirement_age: sanitize(cli.retirement_age),
        lifespan: sanitize(cli.lifespan),
        current_savings: sanitize(cli.current_savings),
        annual_contributions: sanitize(cli.annual_contributions),
        annual_return: sanitize(cli.annual_return),
        annual_inflation: sanitize(cli.annual_inflation),
        retirement_spending: sanitize(cli.retirement_spending),
        flexible_spending: cli.flexible_spending,
    };

    check_age("Current age", inputs.current_age, CURRENT_AGE_RANGE)?;
    check_age("Retirement age", inputs.retirement_age, RETIREMENT_AGE_RANGE)?;
    check_age("Lifespan", inputs.lifespan, LIFESPAN_RANGE)?;

    if inputs.retirement_age <= inputs.current_age {
        return Err(InputError::RetirementNotAfterCurrentAge);
    }

    if inputs.lifespan <= inputs.retirement_age {
        return Err(InputError::LifespanNotAfterRetirement);
    }

    if inputs.current_savings < 0.0 {
        return Err(InputError::NegativeSavings);
    }

    let trials = check_trials("--trials", cli.trials)?;

    Ok(Scenario {
        inputs,
        trials,
        seed: cli.seed,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: DEFAULT_CURRENT_AGE,
        retirement_age: DEFAULT_RETIREMENT_AGE,
        lifespan: DEFAULT_LIFESPAN,
        current_savings: DEFAULT_CURRENT_SAVINGS,
        annual_contributions: DEFAULT_ANNUAL_CONTRIBUTIONS,
        annual_return: DEFAULT_ANNUAL_RETURN,
        annual_inflation: DEFAULT_ANNUAL_INFLATION,
        retirement_spending: DEFAULT_RETIREMENT_SPENDING,
        flexible_spending: false,
        trials: DEFAULT_TRIALS,
        seed: None,
    }
}

fn scenario_from_payload(payload: SimulatePayload) -> Result<Scenario, InputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.lifespan {
        cli.lifespan = v;
    }
    if let Some(v) = payload.current_savings {
        cli.current_savings = v;
    }
    if let Some(v) = payload.annual_contributions {
        cli.annual_contributions = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.annual_inflation {
        cli.annual_inflation = v;
    }
    if let Some(v) = payload.retirement_spending {
        cli.retirement_spending = v;
    }
    if let Some(v) = payload.flexible_spending {
        cli.flexible_spending = v;
    }
    if let Some(v) = payload.trials {
        cli.trials = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = Some(v);
    }

    build_scenario(cli)
}

fn solve_request_from_payload(
    payload: SolvePayload,
) -> Result<(RetirementInputs, GoalSolveConfig), InputError> {
    let scenario = scenario_from_payload(payload.scenario)?;
    let trials_per_iteration = check_trials(
        "trialsPerIteration",
        payload.trials_per_iteration.unwrap_or(scenario.trials),
    )?;
    let final_trials =
        check_trials("finalTrials", payload.final_trials.unwrap_or(scenario.trials))?;
    let max_iterations = payload.max_iterations.unwrap_or(40);
    if max_iterations == 0 || max_iterations > MAX_SOLVE_ITERATIONS {
        return Err(InputError::IterationCount {
            max: MAX_SOLVE_ITERATIONS,
        });
    }

    let config = GoalSolveConfig {
        goal_type: payload.goal.into(),
        target_success_rate: payload.target_success_rate.unwrap_or(90.0),
        search_min: payload.search_min.unwrap_or(0.0),
        search_max: payload.search_max.unwrap_or(1_000_000.0),
        tolerance: payload.tolerance.unwrap_or(100.0),
        max_iterations,
        trials_per_iteration,
        final_trials,
        seed: scenario.seed.unwrap_or(DEFAULT_SOLVE_SEED),
    };
    Ok((scenario.inputs, config))
}

fn build_project_response(scenario: &Scenario) -> ProjectResponse {
    let projection = project(&scenario.inputs);
    let summary = summarize(&scenario.inputs, &projection, None);
    ProjectResponse {
        inputs: scenario.inputs,
        projection,
        summary,
    }
}

fn build_simulate_response(scenario: &Scenario) -> SimulateResponse {
    let inputs = &scenario.inputs;
    let projection = project(inputs);
    let simulation = match scenario.seed {
        Some(seed) => simulate_seeded(inputs, scenario.trials, seed),
        None => simulate(inputs, scenario.trials),
    };
    let summary = summarize(inputs, &projection, Some(&simulation));
    let yearly_table = yearly_table(&simulation, inputs.retirement_spending);

    SimulateResponse {
        inputs: *inputs,
        trials: scenario.trials,
        seed: scenario.seed,
        safe_withdrawal_target: safe_withdrawal_target(inputs.retirement_spending),
        summary,
        projection,
        simulation,
        yearly_table,
    }
}

pub fn run_cli<I, T>(args: I) -> Result<(), CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let scenario = build_scenario(cli)?;
    info!(
        "running {} trials from age {} to {}",
        scenario.trials, scenario.inputs.current_age, scenario.inputs.lifespan
    );

    let response = build_simulate_response(&scenario);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/solve", post(solve_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("retirement API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: SimulatePayload) -> Response {
    match scenario_from_payload(payload) {
        Ok(scenario) => json_response(StatusCode::OK, build_project_response(&scenario)),
        Err(err) => rejected(err),
    }
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let scenario = match scenario_from_payload(payload) {
        Ok(scenario) => scenario,
        Err(err) => return rejected(err),
    };
    debug!(
        "simulate request: {} trials, seed {:?}",
        scenario.trials, scenario.seed
    );
    json_response(StatusCode::OK, build_simulate_response(&scenario))
}

async fn solve_handler(Json(payload): Json<SolvePayload>) -> Response {
    let (inputs, config) = match solve_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return rejected(err),
    };
    match solve_goal(&inputs, config) {
        Ok(result) => json_response::<GoalSolveResult>(StatusCode::OK, result),
        Err(err) => rejected(err.into()),
    }
}

fn rejected(err: InputError) -> Response {
    warn!("rejected request: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn scenario_from_json(json: &str) -> Result<Scenario, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    scenario_from_payload(payload).map_err(|e| e.to_string())
}
