use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core::{
    Field, GoalSolveConfig, GoalSolveResult, MonthRecord, Projection, ProjectionInputs, RawInputs,
    RawRetirementInputs, RetirementProjection, Scenario, SimulationConfig, SimulationReport,
    ValidationError, run, run_retirement, run_with_months, simulate, solve_goal, validate,
    validate_retirement,
};

mod cli;
mod format;

pub use cli::{Cli, CliError, Command, execute, run_command};
pub use format::{format_currency, format_number, format_percent};

/// Query and body shape of `/api/project`. Kept flat so it also decodes
/// from a query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    initial_principal: Option<f64>,
    periodic_contribution: Option<f64>,
    annual_dividend_yield: Option<f64>,
    dividend_growth_rate: Option<f64>,
    horizon_years: Option<i64>,
    compounding_periods_per_year: Option<u32>,
    reinvest_dividends: Option<bool>,
    marginal_tax_rate: Option<f64>,
    share_price: Option<f64>,
    include_months: bool,
}

impl ProjectPayload {
    fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            initial_principal: self.initial_principal,
            periodic_contribution: self.periodic_contribution,
            annual_dividend_yield: self.annual_dividend_yield,
            dividend_growth_rate: self.dividend_growth_rate,
            horizon_years: self.horizon_years,
            compounding_periods_per_year: self.compounding_periods_per_year,
            reinvest_dividends: self.reinvest_dividends,
            marginal_tax_rate: self.marginal_tax_rate,
            share_price: self.share_price,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SimulationOptions {
    pub paths: Option<u32>,
    pub seed: Option<u64>,
    pub scenario: Option<Scenario>,
    pub market_volatility: Option<f64>,
    pub growth_volatility: Option<f64>,
    pub inflation_rate: Option<f64>,
}

impl SimulationOptions {
    pub(crate) fn into_config(self) -> SimulationConfig {
        let defaults = SimulationConfig::default();
        SimulationConfig {
            paths: self.paths.unwrap_or(defaults.paths),
            seed: self.seed.unwrap_or(defaults.seed),
            scenario: self.scenario.unwrap_or(defaults.scenario),
            market_volatility: self.market_volatility.unwrap_or(defaults.market_volatility),
            growth_volatility: self.growth_volatility.unwrap_or(defaults.growth_volatility),
            inflation_rate: self.inflation_rate.unwrap_or(defaults.inflation_rate),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(flatten)]
    inputs: RawInputs,
    simulation: SimulationOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct GoalPayload {
    #[serde(flatten)]
    pub inputs: RawInputs,
    pub target_annual_income: Option<f64>,
    pub search_min: Option<f64>,
    pub search_max: Option<f64>,
    pub tolerance: Option<f64>,
    pub max_iterations: Option<u32>,
}

impl GoalPayload {
    /// The contribution is what gets solved for, so it may be left out.
    pub(crate) fn into_parts(
        mut self,
    ) -> Result<(ProjectionInputs, GoalSolveConfig), ValidationError> {
        self.inputs.periodic_contribution.get_or_insert(0.0);
        let inputs = validate(&self.inputs)?;
        let defaults = GoalSolveConfig::default();
        let config = GoalSolveConfig {
            target_annual_income: self
                .target_annual_income
                .ok_or(ValidationError::MissingField(Field::TargetAnnualIncome))?,
            search_min: self.search_min.unwrap_or(defaults.search_min),
            search_max: self.search_max.unwrap_or(defaults.search_max),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
        };
        Ok((inputs, config))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectResponse<'a> {
    #[serde(flatten)]
    pub projection: &'a Projection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_breakdown: Option<&'a [MonthRecord]>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<Field>,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "DRIP HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/simulate", post(simulate_handler))
        .route("/api/retirement", post(retirement_handler))
        .route("/api/goal", post(goal_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn project_get_handler(payload: Result<Query<ProjectPayload>, QueryRejection>) -> Response {
    match payload {
        Ok(Query(payload)) => project_response(&payload),
        Err(err) => malformed(err.body_text()),
    }
}

async fn project_post_handler(payload: Result<Json<ProjectPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => project_response(&payload),
        Err(err) => malformed(err.body_text()),
    }
}

async fn simulate_handler(payload: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(err) => return malformed(err.body_text()),
    };
    // Path sampling is CPU-bound and runs on the blocking pool.
    match tokio::task::spawn_blocking(move || handle_simulate(payload)).await {
        Ok(result) => respond(result),
        Err(err) => {
            error!(error = %err, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed", None)
        }
    }
}

async fn retirement_handler(
    payload: Result<Json<RawRetirementInputs>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => respond(handle_retirement(&payload)),
        Err(err) => malformed(err.body_text()),
    }
}

async fn goal_handler(payload: Result<Json<GoalPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => respond(handle_goal(payload)),
        Err(err) => malformed(err.body_text()),
    }
}

fn project_response(payload: &ProjectPayload) -> Response {
    match handle_project(payload) {
        Ok((projection, months)) => json_response(
            StatusCode::OK,
            ProjectResponse {
                projection: &projection,
                monthly_breakdown: months.as_deref(),
            },
        ),
        Err(err) => rejection(&err),
    }
}

fn handle_project(
    payload: &ProjectPayload,
) -> Result<(Projection, Option<Vec<MonthRecord>>), ValidationError> {
    let inputs = validate(&payload.raw_inputs())?;
    if payload.include_months {
        let (projection, months) = run_with_months(&inputs);
        Ok((projection, Some(months)))
    } else {
        Ok((run(&inputs), None))
    }
}

fn handle_simulate(payload: SimulatePayload) -> Result<SimulationReport, ValidationError> {
    let inputs = validate(&payload.inputs)?;
    simulate(&inputs, &payload.simulation.into_config())
}

fn handle_retirement(
    payload: &RawRetirementInputs,
) -> Result<RetirementProjection, ValidationError> {
    let inputs = validate_retirement(payload)?;
    Ok(run_retirement(&inputs))
}

fn handle_goal(payload: GoalPayload) -> Result<GoalSolveResult, ValidationError> {
    let (inputs, config) = payload.into_parts()?;
    solve_goal(&inputs, config)
}

fn respond<T: Serialize>(result: Result<T, ValidationError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => rejection(&err),
    }
}

fn rejection(err: &ValidationError) -> Response {
    warn!(field = %err.field(), error = %err, "rejected request");
    error_response(StatusCode::BAD_REQUEST, &err.to_string(), Some(err.field()))
}

/// Bodies and query strings that do not decode into the payload type.
fn malformed(reason: String) -> Response {
    warn!(error = %reason, "malformed request");
    error_response(StatusCode::BAD_REQUEST, &reason, None)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str, field: Option<Field>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            field,
        },
    )
}
