use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{LoopSettings, YearPlan, project};
use super::summary::summarize;
use super::types::{CompoundingFrequency, Field, ProjectionInputs, Summary, YearRecord};
use super::validate::{ValidationError, compounding, finite, horizon, non_negative, require, within};

/// 2024 IRS elective deferral limit.
pub const DEFAULT_CONTRIBUTION_LIMIT: f64 = 23_000.0;
/// Share of the final balance treated as sustainable annual income.
pub const SAFE_WITHDRAWAL_RATE: f64 = 0.04;
pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRetirementInputs {
    pub current_age: Option<u32>,
    pub retirement_age: Option<u32>,
    pub current_salary: Option<f64>,
    pub current_balance: Option<f64>,
    pub contribution_rate: Option<f64>,
    pub employer_match: Option<f64>,
    pub employer_match_limit: Option<f64>,
    pub annual_return: Option<f64>,
    pub salary_growth_rate: Option<f64>,
    pub marginal_tax_rate: Option<f64>,
    pub contribution_limit: Option<f64>,
    pub compounding_periods_per_year: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementInputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_salary: f64,
    pub current_balance: f64,
    pub contribution_rate: f64,
    pub employer_match: f64,
    pub employer_match_limit: f64,
    pub annual_return: f64,
    pub salary_growth_rate: f64,
    pub marginal_tax_rate: f64,
    pub contribution_limit: f64,
    pub compounding: CompoundingFrequency,
}

impl RetirementInputs {
    pub fn horizon_years(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementYear {
    pub age: u32,
    pub salary: f64,
    pub employee_contribution: f64,
    pub employer_contribution: f64,
    #[serde(flatten)]
    pub record: YearRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    #[serde(flatten)]
    pub projection: Summary,
    pub employee_contributions: f64,
    pub employer_contributions: f64,
    pub investment_gains: f64,
    pub retirement_income: f64,
    pub tax_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjection {
    pub yearly_breakdown: Vec<RetirementYear>,
    pub summary: RetirementSummary,
}

pub fn validate_retirement(
    raw: &RawRetirementInputs,
) -> Result<RetirementInputs, ValidationError> {
    let current_age = age(raw.current_age, Field::CurrentAge)?;
    let retirement_age = age(raw.retirement_age, Field::RetirementAge)?;
    let retirement_window = ValidationError::OutOfRange {
        field: Field::RetirementAge,
        min: f64::from(current_age + 1),
        max: f64::from((current_age + 60).min(MAX_AGE)),
    };
    if retirement_age <= current_age {
        return Err(retirement_window);
    }
    horizon(i64::from(retirement_age - current_age)).map_err(|_| retirement_window)?;

    let current_salary = non_negative(
        require(raw.current_salary, Field::CurrentSalary)?,
        Field::CurrentSalary,
    )?;
    within(current_salary, Field::CurrentSalary, 1.0, 100_000_000.0)?;

    let ratio = |value: Option<f64>, field: Field, default: f64| -> Result<f64, ValidationError> {
        let value = non_negative(value.unwrap_or(default), field)?;
        within(value, field, 0.0, 1.0)
    };

    require(raw.contribution_rate, Field::ContributionRate)?;

    let annual_return = finite(
        require(raw.annual_return, Field::AnnualReturn)?,
        Field::AnnualReturn,
    )?;
    within(annual_return, Field::AnnualReturn, -0.5, 0.5)?;

    let salary_growth_rate = finite(
        raw.salary_growth_rate.unwrap_or(0.0),
        Field::SalaryGrowthRate,
    )?;
    within(salary_growth_rate, Field::SalaryGrowthRate, -0.5, 0.5)?;

    Ok(RetirementInputs {
        current_age,
        retirement_age,
        current_salary,
        current_balance: non_negative(raw.current_balance.unwrap_or(0.0), Field::CurrentBalance)?,
        contribution_rate: ratio(raw.contribution_rate, Field::ContributionRate, 0.0)?,
        employer_match: ratio(raw.employer_match, Field::EmployerMatch, 0.0)?,
        employer_match_limit: ratio(raw.employer_match_limit, Field::EmployerMatchLimit, 0.0)?,
        annual_return,
        salary_growth_rate,
        marginal_tax_rate: ratio(raw.marginal_tax_rate, Field::MarginalTaxRate, 0.0)?,
        contribution_limit: non_negative(
            raw.contribution_limit.unwrap_or(DEFAULT_CONTRIBUTION_LIMIT),
            Field::ContributionLimit,
        )?,
        compounding: compounding(raw.compounding_periods_per_year.unwrap_or(12))?,
    })
}

#[derive(Debug, Clone, Copy)]
struct Paycheck {
    salary: f64,
    employee: f64,
    employer: f64,
}

fn age(value: Option<u32>, field: Field) -> Result<u32, ValidationError> {
    let value = require(value, field)?;
    within(f64::from(value), field, 0.0, f64::from(MAX_AGE))?;
    Ok(value)
}

fn paychecks(inputs: &RetirementInputs) -> Vec<Paycheck> {
    let mut salary = inputs.current_salary;
    let mut out = Vec::with_capacity(inputs.horizon_years() as usize);
    for _ in 0..inputs.horizon_years() {
        let employee = (salary * inputs.contribution_rate).min(inputs.contribution_limit);
        let matchable = employee.min(salary * inputs.employer_match_limit);
        out.push(Paycheck {
            salary,
            employee,
            employer: matchable * inputs.employer_match,
        });
        salary *= 1.0 + inputs.salary_growth_rate;
    }
    out
}

/// Projects a 401(k) through the same monthly loop as the dividend engine,
/// with salary-driven contributions and the market return as the yield.
pub fn run_retirement(inputs: &RetirementInputs) -> RetirementProjection {
    debug!(?inputs, "starting 401(k) projection");
    let paychecks = paychecks(inputs);
    let plans: Vec<YearPlan> = paychecks
        .iter()
        .map(|paycheck| YearPlan {
            yield_rate: inputs.annual_return,
            monthly_contribution: (paycheck.employee + paycheck.employer) / 12.0,
        })
        .collect();

    // Pre-tax account: growth is neither taxed nor paid out.
    let equivalent = ProjectionInputs {
        initial_principal: inputs.current_balance,
        periodic_contribution: 0.0,
        annual_dividend_yield: inputs.annual_return,
        dividend_growth_rate: 0.0,
        horizon_years: inputs.horizon_years(),
        compounding: inputs.compounding,
        reinvest_dividends: true,
        marginal_tax_rate: 0.0,
        share_price: None,
    };
    let records = project(&LoopSettings::from_inputs(&equivalent), &plans, None);
    let summary = summarize(&records, &equivalent);

    let employee_contributions = paychecks.iter().map(|p| p.employee).sum::<f64>();
    let employer_contributions = paychecks.iter().map(|p| p.employer).sum::<f64>();
    let investment_gains = summary.final_balance
        - inputs.current_balance
        - employee_contributions
        - employer_contributions;

    let yearly_breakdown = paychecks
        .iter()
        .zip(records)
        .map(|(paycheck, record)| RetirementYear {
            age: inputs.current_age.saturating_add(record.year),
            salary: paycheck.salary,
            employee_contribution: paycheck.employee,
            employer_contribution: paycheck.employer,
            record,
        })
        .collect();

    RetirementProjection {
        yearly_breakdown,
        summary: RetirementSummary {
            retirement_income: summary.final_balance * SAFE_WITHDRAWAL_RATE,
            tax_savings: employee_contributions * inputs.marginal_tax_rate,
            projection: summary,
            employee_contributions,
            employer_contributions,
            investment_gains,
        },
    }
}
