mod engine;
mod retirement;
mod simulator;
mod solver;
mod stepper;
mod summary;
mod types;
mod validate;

pub use engine::{run, run_with_months, yield_for_year};
pub use retirement::{
    DEFAULT_CONTRIBUTION_LIMIT, RawRetirementInputs, RetirementInputs, RetirementProjection,
    RetirementSummary, RetirementYear, SAFE_WITHDRAWAL_RATE, run_retirement, validate_retirement,
};
pub use simulator::{
    Band, MAX_PATHS, Scenario, ScenarioParams, SimulatedYear, SimulationConfig, SimulationReport,
    simulate,
};
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, solve_goal};
pub use stepper::{periodic_rate, step};
pub use summary::{ComputationError, annualized_return, summarize};
pub use types::{
    CompoundingFrequency, Field, MonthRecord, Projection, ProjectionInputs, RawInputs, Summary,
    YearRecord,
};
pub use validate::{MAX_HORIZON_YEARS, MIN_HORIZON_YEARS, ValidationError, clamp_horizon, validate};
