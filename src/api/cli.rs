use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use super::format::{format_currency, format_number, format_percent};
use super::{GoalPayload, ProjectResponse, SimulationOptions};
use crate::core::{
    Field, GoalSolveResult, MonthRecord, Projection, RawInputs, RawRetirementInputs,
    RetirementProjection, Scenario, SimulationReport, ValidationError, run, run_retirement,
    run_with_months, simulate, solve_goal, validate, validate_retirement,
};

#[derive(Debug, Parser)]
#[command(
    name = "drip",
    about = "Dividend reinvestment (DRIP) projection calculator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Year-by-year projection of a dividend portfolio.
    Project(ProjectArgs),
    /// Monte Carlo percentile bands around the projection.
    Simulate(SimulateArgs),
    /// 401(k) projection driven by salary and employer match.
    Retirement(RetirementArgs),
    /// Monthly contribution needed to reach a target dividend income.
    Goal(GoalArgs),
    /// Start the HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Rates are given in percent on the command line.
#[derive(Debug, Clone, Args)]
pub struct ProjectionArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub principal: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Contribution added every month"
    )]
    pub contribution: f64,
    #[arg(
        long = "yield",
        allow_negative_numbers = true,
        help = "Annual dividend yield in percent"
    )]
    pub yield_percent: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Annual dividend growth in percent"
    )]
    pub growth: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub years: i64,
    #[arg(long, default_value_t = 12, help = "Periods per year: 1, 2, 4, 12 or 365")]
    pub compounding: u32,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub tax_rate: f64,
    #[arg(long, help = "Pay dividends out instead of reinvesting them")]
    pub no_reinvest: bool,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Constant share price used to report a share count"
    )]
    pub share_price: Option<f64>,
}

impl ProjectionArgs {
    fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            initial_principal: Some(self.principal),
            periodic_contribution: Some(self.contribution),
            annual_dividend_yield: Some(self.yield_percent / 100.0),
            dividend_growth_rate: Some(self.growth / 100.0),
            horizon_years: Some(self.years),
            compounding_periods_per_year: Some(self.compounding),
            reinvest_dividends: Some(!self.no_reinvest),
            marginal_tax_rate: Some(self.tax_rate / 100.0),
            share_price: self.share_price,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(long, help = "Also print the month-by-month breakdown")]
    pub months: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliScenario {
    Bull,
    Balanced,
    Bear,
    Stagflation,
    Custom,
}

impl From<CliScenario> for Scenario {
    fn from(value: CliScenario) -> Self {
        match value {
            CliScenario::Bull => Scenario::Bull,
            CliScenario::Balanced => Scenario::Balanced,
            CliScenario::Bear => Scenario::Bear,
            CliScenario::Stagflation => Scenario::Stagflation,
            CliScenario::Custom => Scenario::Custom,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(long, default_value_t = 1_000)]
    pub paths: u32,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[arg(long, value_enum, default_value_t = CliScenario::Custom)]
    pub scenario: CliScenario,
    #[arg(long, default_value_t = 18.0, allow_negative_numbers = true)]
    pub market_volatility: f64,
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub growth_volatility: f64,
    #[arg(long, default_value_t = 3.0, allow_negative_numbers = true)]
    pub inflation: f64,
    #[arg(long)]
    pub json: bool,
}

impl SimulateArgs {
    fn options(&self) -> SimulationOptions {
        SimulationOptions {
            paths: Some(self.paths),
            seed: Some(self.seed),
            scenario: Some(self.scenario.into()),
            market_volatility: Some(self.market_volatility / 100.0),
            growth_volatility: Some(self.growth_volatility / 100.0),
            inflation_rate: Some(self.inflation / 100.0),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RetirementArgs {
    #[arg(long)]
    pub current_age: u32,
    #[arg(long)]
    pub retirement_age: u32,
    #[arg(long, allow_negative_numbers = true)]
    pub salary: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub balance: f64,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Share of salary deferred, in percent"
    )]
    pub contribution_rate: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub employer_match: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Share of salary the employer matches up to, in percent"
    )]
    pub employer_match_limit: f64,
    #[arg(long = "return", allow_negative_numbers = true)]
    pub annual_return: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub salary_growth: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub tax_rate: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub contribution_limit: Option<f64>,
    #[arg(long, default_value_t = 12)]
    pub compounding: u32,
    #[arg(long)]
    pub json: bool,
}

impl RetirementArgs {
    fn raw_inputs(&self) -> RawRetirementInputs {
        RawRetirementInputs {
            current_age: Some(self.current_age),
            retirement_age: Some(self.retirement_age),
            current_salary: Some(self.salary),
            current_balance: Some(self.balance),
            contribution_rate: Some(self.contribution_rate / 100.0),
            employer_match: Some(self.employer_match / 100.0),
            employer_match_limit: Some(self.employer_match_limit / 100.0),
            annual_return: Some(self.annual_return / 100.0),
            salary_growth_rate: Some(self.salary_growth / 100.0),
            marginal_tax_rate: Some(self.tax_rate / 100.0),
            contribution_limit: self.contribution_limit,
            compounding_periods_per_year: Some(self.compounding),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GoalArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Gross dividend income wanted in the final year"
    )]
    pub target_income: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub search_min: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub search_max: Option<f64>,
    #[arg(long)]
    pub tolerance: Option<f64>,
    #[arg(long)]
    pub max_iterations: Option<u32>,
    #[arg(long)]
    pub json: bool,
}

impl GoalArgs {
    fn payload(&self) -> GoalPayload {
        GoalPayload {
            inputs: self.projection.raw_inputs(),
            target_annual_income: Some(self.target_income),
            search_min: self.search_min,
            search_max: self.search_max,
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}", describe(.0))]
    Invalid(#[from] ValidationError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`serve` is not a batch command")]
    NotBatch,
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Invalid(_) => 2,
            _ => 1,
        }
    }
}

/// Fields the command line takes in percent rather than as a ratio.
fn is_percent(field: Field) -> bool {
    matches!(
        field,
        Field::AnnualDividendYield
            | Field::DividendGrowthRate
            | Field::MarginalTaxRate
            | Field::ContributionRate
            | Field::EmployerMatch
            | Field::EmployerMatchLimit
            | Field::AnnualReturn
            | Field::SalaryGrowthRate
            | Field::MarketVolatility
            | Field::GrowthVolatility
            | Field::InflationRate
    )
}

/// Restates a validation error in terms of command-line flags.
fn describe(err: &ValidationError) -> String {
    match err {
        ValidationError::NegativeValue(field) => format!("{} must not be negative", field.flag()),
        ValidationError::OutOfRange { field, min, max } => {
            let scale = if is_percent(*field) { 100.0 } else { 1.0 };
            format!(
                "{} must be between {} and {}",
                field.flag(),
                min * scale,
                max * scale
            )
        }
        ValidationError::InvalidCompoundingFrequency(periods) => format!(
            "{} {periods} is not one of 1, 2, 4, 12 or 365",
            Field::CompoundingPeriodsPerYear.flag()
        ),
        ValidationError::MissingField(field) => format!("{} is required", field.flag()),
        ValidationError::NotFinite(field) => format!("{} must be a finite number", field.flag()),
    }
}

/// Runs a batch subcommand, writing its report to `out`.
pub fn execute(command: &Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Project(args) => {
            let inputs = validate(&args.projection.raw_inputs())?;
            let (projection, months) = if args.months {
                let (projection, months) = run_with_months(&inputs);
                (projection, Some(months))
            } else {
                (run(&inputs), None)
            };
            if args.json {
                let response = ProjectResponse {
                    projection: &projection,
                    monthly_breakdown: months.as_deref(),
                };
                write_json(out, &response)
            } else {
                write_projection(out, &projection)?;
                if let Some(months) = &months {
                    write_months(out, months)?;
                }
                Ok(())
            }
        }
        Command::Simulate(args) => {
            let inputs = validate(&args.projection.raw_inputs())?;
            let report = simulate(&inputs, &args.options().into_config())?;
            if args.json {
                write_json(out, &report)
            } else {
                write_simulation(out, &report)
            }
        }
        Command::Retirement(args) => {
            let inputs = validate_retirement(&args.raw_inputs())?;
            let projection = run_retirement(&inputs);
            if args.json {
                write_json(out, &projection)
            } else {
                write_retirement(out, &projection)
            }
        }
        Command::Goal(args) => {
            let (inputs, config) = args.payload().into_parts()?;
            let result = solve_goal(&inputs, config)?;
            if args.json {
                write_json(out, &result)
            } else {
                write_goal(out, &result)
            }
        }
        Command::Serve { .. } => Err(CliError::NotBatch),
    }
}

/// Runs a batch subcommand against stdout and maps the outcome to an exit code.
pub fn run_command(command: &Command) -> ExitCode {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(command, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn write_json<T: serde::Serialize>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn write_projection(out: &mut impl Write, projection: &Projection) -> Result<(), CliError> {
    writeln!(
        out,
        "{:>4}  {:>16}  {:>14}  {:>14}  {:>14}  {:>16}  {:>8}",
        "Year", "Start", "Contributed", "Gross div", "Net div", "End", "Yield"
    )?;
    for record in &projection.yearly_breakdown {
        writeln!(
            out,
            "{:>4}  {:>16}  {:>14}  {:>14}  {:>14}  {:>16}  {:>8}",
            record.year,
            format_currency(record.starting_balance),
            format_currency(record.contributions_this_year),
            format_currency(record.dividends_gross),
            format_currency(record.dividends_net),
            format_currency(record.ending_balance),
            format_percent(record.effective_yield_this_year),
        )?;
    }

    let summary = &projection.summary;
    writeln!(out)?;
    writeln!(out, "Final balance:          {}", format_currency(summary.final_balance))?;
    writeln!(out, "Total contributions:    {}", format_currency(summary.total_contributions))?;
    writeln!(out, "Dividends (gross):      {}", format_currency(summary.total_dividends_gross))?;
    writeln!(out, "Dividends (net):        {}", format_currency(summary.total_dividends_net))?;
    writeln!(out, "Tax withheld:           {}", format_currency(summary.total_tax_withheld))?;
    if summary.dividends_paid_out > 0.0 {
        writeln!(out, "Paid out as cash:       {}", format_currency(summary.dividends_paid_out))?;
    }
    writeln!(out, "Total return:           {}", format_currency(summary.total_return))?;
    writeln!(
        out,
        "Effective annual return: {}",
        summary
            .effective_annual_return
            .map_or_else(|| "n/a".to_string(), format_percent)
    )?;
    writeln!(
        out,
        "Final dividend income:  {} per year ({} per month)",
        format_currency(summary.final_annual_dividend_income),
        format_currency(summary.final_annual_dividend_income / 12.0)
    )?;
    if let Some(yield_on_cost) = summary.final_yield_on_cost {
        writeln!(out, "Yield on cost:          {}", format_percent(yield_on_cost))?;
    }
    if let Some(shares) = summary.final_shares {
        writeln!(out, "Shares held:            {}", format_number(shares, 4))?;
    }
    Ok(())
}

fn write_months(out: &mut impl Write, months: &[MonthRecord]) -> Result<(), CliError> {
    writeln!(out)?;
    writeln!(
        out,
        "{:>4}  {:>5}  {:>16}  {:>12}  {:>12}  {:>12}  {:>16}",
        "Year", "Month", "Start", "Contributed", "Gross div", "Net div", "End"
    )?;
    for month in months {
        writeln!(
            out,
            "{:>4}  {:>5}  {:>16}  {:>12}  {:>12}  {:>12}  {:>16}",
            month.year,
            month.month,
            format_currency(month.starting_balance),
            format_currency(month.contribution),
            format_currency(month.dividends_gross),
            format_currency(month.dividends_net),
            format_currency(month.ending_balance),
        )?;
    }
    Ok(())
}

fn write_simulation(out: &mut impl Write, report: &SimulationReport) -> Result<(), CliError> {
    writeln!(
        out,
        "{} paths, seed {}, market volatility {}, dividend growth {}, inflation {}",
        report.paths,
        report.seed,
        format_percent(report.market_volatility),
        format_percent(report.dividend_growth_rate),
        format_percent(report.inflation_rate),
    )?;
    writeln!(
        out,
        "{:>4}  {:>16}  {:>16}  {:>16}  {:>16}",
        "Year", "P10", "P50", "P90", "P50 (real)"
    )?;
    for year in &report.years {
        writeln!(
            out,
            "{:>4}  {:>16}  {:>16}  {:>16}  {:>16}",
            year.year,
            format_currency(year.ending_balance.p10),
            format_currency(year.ending_balance.p50),
            format_currency(year.ending_balance.p90),
            format_currency(year.real_ending_balance.p50),
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Mean final balance: {}", format_currency(report.mean_final_balance))?;
    Ok(())
}

fn write_retirement(
    out: &mut impl Write,
    projection: &RetirementProjection,
) -> Result<(), CliError> {
    writeln!(
        out,
        "{:>3}  {:>14}  {:>12}  {:>12}  {:>16}",
        "Age", "Salary", "Employee", "Employer", "End"
    )?;
    for year in &projection.yearly_breakdown {
        writeln!(
            out,
            "{:>3}  {:>14}  {:>12}  {:>12}  {:>16}",
            year.age,
            format_currency(year.salary),
            format_currency(year.employee_contribution),
            format_currency(year.employer_contribution),
            format_currency(year.record.ending_balance),
        )?;
    }

    let summary = &projection.summary;
    writeln!(out)?;
    writeln!(out, "Final balance:          {}", format_currency(summary.projection.final_balance))?;
    writeln!(out, "Employee contributions: {}", format_currency(summary.employee_contributions))?;
    writeln!(out, "Employer contributions: {}", format_currency(summary.employer_contributions))?;
    writeln!(out, "Investment gains:       {}", format_currency(summary.investment_gains))?;
    writeln!(out, "Retirement income (4%): {}", format_currency(summary.retirement_income))?;
    writeln!(out, "Tax savings:            {}", format_currency(summary.tax_savings))?;
    Ok(())
}

fn write_goal(out: &mut impl Write, result: &GoalSolveResult) -> Result<(), CliError> {
    writeln!(out, "{}", result.message)?;
    writeln!(
        out,
        "Target income:          {}",
        format_currency(result.target_annual_income)
    )?;
    if let Some(portfolio) = result.required_portfolio {
        writeln!(out, "Required portfolio:     {}", format_currency(portfolio))?;
    }
    if let (Some(contribution), Some(income)) =
        (result.solved_contribution, result.achieved_annual_income)
    {
        writeln!(out, "Monthly contribution:   {}", format_currency(contribution))?;
        writeln!(out, "Achieved income:        {}", format_currency(income))?;
    }
    writeln!(
        out,
        "Iterations:             {}",
        format_number(result.iterations.len() as f64, 0)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).expect("arguments should parse").command
    }

    fn output(command: &Command) -> String {
        let mut buffer = Vec::new();
        execute(command, &mut buffer).expect("command should succeed");
        String::from_utf8(buffer).expect("utf-8 output")
    }

    #[test]
    fn project_flags_convert_percent_to_ratio() {
        let command = parse(&[
            "drip",
            "project",
            "--principal",
            "10000",
            "--contribution",
            "500",
            "--yield",
            "4",
            "--growth",
            "7",
            "--years",
            "20",
            "--tax-rate",
            "15",
            "--no-reinvest",
        ]);
        let Command::Project(args) = command else {
            panic!("expected project subcommand");
        };
        let inputs = validate(&args.projection.raw_inputs()).expect("valid inputs");
        assert_eq!(inputs.annual_dividend_yield, 0.04);
        assert_eq!(inputs.dividend_growth_rate, 0.07);
        assert_eq!(inputs.marginal_tax_rate, 0.15);
        assert_eq!(inputs.horizon_years, 20);
        assert_eq!(inputs.compounding.periods_per_year(), 12);
        assert!(!inputs.reinvest_dividends);
    }

    #[test]
    fn project_prints_table_and_summary() {
        let command = parse(&[
            "drip", "project", "--principal", "10000", "--yield", "4", "--years", "10",
        ]);
        let text = output(&command);
        assert!(text.contains("Year"));
        assert!(text.contains("$14,908.33"));
        assert!(text.contains("Final balance:"));
    }

    #[test]
    fn project_reports_shares_when_price_given() {
        let command = parse(&[
            "drip",
            "project",
            "--principal",
            "10000",
            "--yield",
            "4",
            "--years",
            "1",
            "--no-reinvest",
            "--share-price",
            "25",
        ]);
        let text = output(&command);
        assert!(text.contains("Shares held:            400.0000"), "{text}");
        assert!(text.contains("Yield on cost:          4.00%"), "{text}");

        let command = parse(&[
            "drip",
            "project",
            "--principal",
            "1000",
            "--yield",
            "4",
            "--years",
            "1",
            "--share-price",
            "0",
        ]);
        let err = execute(&command, &mut Vec::<u8>::new()).expect_err("price must be positive");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().starts_with("--share-price must be between"));
    }

    #[test]
    fn project_json_includes_months_on_request() {
        let command = parse(&[
            "drip",
            "project",
            "--principal",
            "1000",
            "--yield",
            "12",
            "--years",
            "1",
            "--months",
            "--json",
        ]);
        let value: serde_json::Value =
            serde_json::from_str(&output(&command)).expect("valid json");
        assert_eq!(value["yearlyBreakdown"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["monthlyBreakdown"].as_array().map(Vec::len), Some(12));
        assert!(value["summary"]["finalBalance"].is_number());
    }

    #[test]
    fn invalid_horizon_exits_with_code_two_and_names_flag() {
        let command = parse(&[
            "drip", "project", "--principal", "1000", "--yield", "4", "--years", "0",
        ]);
        let err = execute(&command, &mut Vec::<u8>::new()).expect_err("horizon 0 is rejected");
        assert!(matches!(err, CliError::Invalid(_)));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "--years must be between 1 and 60");
    }

    #[test]
    fn percent_flag_errors_are_reported_in_percent() {
        let command = parse(&[
            "drip",
            "project",
            "--principal",
            "1000",
            "--yield",
            "4",
            "--years",
            "5",
            "--tax-rate",
            "150",
        ]);
        let err = execute(&command, &mut Vec::<u8>::new()).expect_err("tax above 100%");
        assert_eq!(err.to_string(), "--tax-rate must be between 0 and 100");
    }

    #[test]
    fn negative_principal_is_a_validation_error() {
        let command = parse(&[
            "drip",
            "project",
            "--principal",
            "-5",
            "--yield",
            "4",
            "--years",
            "5",
        ]);
        let err = execute(&command, &mut Vec::<u8>::new()).expect_err("negative principal");
        assert_eq!(err.to_string(), "--principal must not be negative");
    }

    #[test]
    fn simulate_parses_scenario_presets() {
        let command = parse(&[
            "drip",
            "simulate",
            "--principal",
            "10000",
            "--yield",
            "4",
            "--years",
            "5",
            "--scenario",
            "bear",
            "--paths",
            "50",
        ]);
        let Command::Simulate(args) = &command else {
            panic!("expected simulate subcommand");
        };
        assert_eq!(args.scenario, CliScenario::Bear);
        let text = output(&command);
        assert!(text.starts_with("50 paths, seed 42"));
        assert!(text.contains("P50"));
    }

    #[test]
    fn retirement_reports_contribution_totals() {
        let command = parse(&[
            "drip",
            "retirement",
            "--current-age",
            "30",
            "--retirement-age",
            "33",
            "--salary",
            "75000",
            "--contribution-rate",
            "10",
            "--employer-match",
            "50",
            "--employer-match-limit",
            "6",
            "--return",
            "0",
        ]);
        let text = output(&command);
        assert!(text.contains("Employee contributions: $22,500.00"));
        assert!(text.contains("Employer contributions: $6,750.00"));
    }

    #[test]
    fn goal_reports_required_contribution() {
        let command = parse(&[
            "drip",
            "goal",
            "--principal",
            "0",
            "--yield",
            "4",
            "--years",
            "1",
            "--compounding",
            "1",
            "--no-reinvest",
            "--target-income",
            "260",
        ]);
        let text = output(&command);
        assert!(text.contains("Solved required contribution."));
        assert!(text.contains("Required portfolio:     $6,500.00"));
    }

    #[test]
    fn serve_defaults_to_port_8080() {
        match parse(&["drip", "serve"]) {
            Command::Serve { port } => assert_eq!(port, 8080),
            other => panic!("unexpected command {other:?}"),
        }
        let err = execute(&parse(&["drip", "serve", "--port", "9000"]), &mut Vec::<u8>::new())
            .expect_err("serve is not a batch command");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_required_flag_is_a_parse_error() {
        assert!(Cli::try_parse_from(["drip", "project", "--yield", "4"]).is_err());
    }
}
