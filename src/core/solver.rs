use serde::Serialize;

use super::engine::{run, yield_for_year};
use super::types::{Field, ProjectionInputs};
use super::validate::{ValidationError, finite, non_negative};

/// Income within this much of the target counts as reaching it.
const INCOME_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalSolveConfig {
    /// Gross dividend income wanted in the final projected year.
    pub target_annual_income: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for GoalSolveConfig {
    fn default() -> Self {
        Self {
            target_annual_income: 0.0,
            search_min: 0.0,
            search_max: 100_000.0,
            tolerance: 0.01,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_contribution: f64,
    pub annual_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub target_annual_income: f64,
    /// Balance that yields the target at the final year's yield.
    pub required_portfolio: Option<f64>,
    pub solved_contribution: Option<f64>,
    pub achieved_annual_income: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the smallest monthly contribution whose final-year gross dividends
/// reach the target.
pub fn solve_goal(
    inputs: &ProjectionInputs,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult, ValidationError> {
    validate_config(config)?;

    let final_yield = yield_for_year(inputs, inputs.horizon_years);
    let required_portfolio = if final_yield > 0.0 {
        Some(config.target_annual_income / final_yield)
    } else {
        None
    };

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let search = search_contribution(&config, &mut iterations, |contribution| {
        evaluate_candidate(inputs, contribution)
    });

    let (solved_contribution, converged, feasible, message) = match search {
        Search::AlreadyMet => (
            Some(config.search_min),
            true,
            true,
            "Already meets target at lower contribution bound.",
        ),
        Search::OutOfReach => (
            None,
            false,
            false,
            "No feasible contribution found within the search bounds.",
        ),
        Search::Bracketed {
            contribution,
            converged: true,
        } => (Some(contribution), true, true, "Solved required contribution."),
        Search::Bracketed {
            contribution,
            converged: false,
        } => (
            Some(contribution),
            false,
            true,
            "Reached max iterations before tolerance was met; returning best estimate.",
        ),
    };

    Ok(GoalSolveResult {
        target_annual_income: config.target_annual_income,
        required_portfolio,
        achieved_annual_income: solved_contribution.map(|c| evaluate_candidate(inputs, c)),
        solved_contribution,
        iterations,
        converged,
        feasible,
        message: message.to_string(),
    })
}

/// Outcome of searching the contribution window for the target income.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Search {
    /// The smallest contribution in the window already reaches the target.
    AlreadyMet,
    /// Even the largest contribution falls short.
    OutOfReach,
    /// Smallest contribution known to reach the target.
    Bracketed { contribution: f64, converged: bool },
}

/// Halves the contribution window until it is narrower than the tolerance.
/// Final-year income rises with the contribution, so the upper end of the
/// window always meets the target.
fn search_contribution(
    config: &GoalSolveConfig,
    trace: &mut Vec<GoalSolveIteration>,
    income_at: impl Fn(f64) -> f64,
) -> Search {
    let reaches = |income: f64| income + INCOME_SLACK >= config.target_annual_income;
    if reaches(income_at(config.search_min)) {
        return Search::AlreadyMet;
    }
    if !reaches(income_at(config.search_max)) {
        return Search::OutOfReach;
    }

    let (mut short, mut enough) = (config.search_min, config.search_max);
    for iteration in 1..=config.max_iterations {
        let candidate = short + (enough - short) / 2.0;
        let annual_income = income_at(candidate);
        trace.push(GoalSolveIteration {
            iteration,
            lower_bound: short,
            upper_bound: enough,
            candidate_contribution: candidate,
            annual_income,
        });
        if reaches(annual_income) {
            enough = candidate;
        } else {
            short = candidate;
        }
        if enough - short <= config.tolerance {
            return Search::Bracketed {
                contribution: enough,
                converged: true,
            };
        }
    }
    Search::Bracketed {
        contribution: enough,
        converged: false,
    }
}

fn evaluate_candidate(base_inputs: &ProjectionInputs, contribution: f64) -> f64 {
    let inputs = ProjectionInputs {
        periodic_contribution: contribution.max(0.0),
        ..base_inputs.clone()
    };
    run(&inputs).summary.final_annual_dividend_income
}

fn validate_config(config: GoalSolveConfig) -> Result<(), ValidationError> {
    non_negative(config.target_annual_income, Field::TargetAnnualIncome)?;
    non_negative(config.search_min, Field::SearchMin)?;
    let search_max = finite(config.search_max, Field::SearchMax)?;
    if search_max <= config.search_min {
        return Err(ValidationError::OutOfRange {
            field: Field::SearchMax,
            min: config.search_min,
            max: f64::MAX,
        });
    }
    let tolerance = finite(config.tolerance, Field::Tolerance)?;
    if tolerance <= 0.0 {
        return Err(ValidationError::NegativeValue(Field::Tolerance));
    }
    if config.max_iterations == 0 {
        return Err(ValidationError::OutOfRange {
            field: Field::MaxIterations,
            min: 1.0,
            max: u32::MAX as f64,
        });
    }
    Ok(())
}
