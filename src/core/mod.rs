mod projector;
mod random;
mod simulator;
mod solver;
mod types;

pub use projector::{age_at_month, project, total_months};
pub use random::{RandomSource, RngSource, SequenceSource, derive_seed};
pub use simulator::{simulate, simulate_seeded, simulate_with};
pub use solver::{
    GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, SolveError, solve_goal,
};
pub use types::{
    MonthlyPercentiles, MonthlyProjection, RetirementInputs, RetirementProjection,
    SimulationResult,
};
