use thiserror::Error;

use super::types::{CompoundingFrequency, Field, ProjectionInputs, RawInputs};

pub const MIN_HORIZON_YEARS: u32 = 1;
pub const MAX_HORIZON_YEARS: u32 = 60;
const MIN_SHARE_PRICE: f64 = 0.01;
const MAX_SHARE_PRICE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be negative")]
    NegativeValue(Field),

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: Field, min: f64, max: f64 },

    #[error("compounding frequency {0} is not one of 1, 2, 4, 12 or 365")]
    InvalidCompoundingFrequency(u32),

    #[error("{0} is required")]
    MissingField(Field),

    #[error("{0} must be a finite number")]
    NotFinite(Field),
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::NegativeValue(field)
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MissingField(field)
            | ValidationError::NotFinite(field) => *field,
            ValidationError::InvalidCompoundingFrequency(_) => Field::CompoundingPeriodsPerYear,
        }
    }
}

/// Pulls `horizon` into the supported window for callers that prefer clamping
/// over rejection.
pub fn clamp_horizon(horizon: i64) -> u32 {
    horizon.clamp(MIN_HORIZON_YEARS as i64, MAX_HORIZON_YEARS as i64) as u32
}

pub fn validate(raw: &RawInputs) -> Result<ProjectionInputs, ValidationError> {
    let initial_principal = non_negative(
        require(raw.initial_principal, Field::InitialPrincipal)?,
        Field::InitialPrincipal,
    )?;
    let periodic_contribution = non_negative(
        require(raw.periodic_contribution, Field::PeriodicContribution)?,
        Field::PeriodicContribution,
    )?;
    let annual_dividend_yield = non_negative(
        require(raw.annual_dividend_yield, Field::AnnualDividendYield)?,
        Field::AnnualDividendYield,
    )?;
    within(annual_dividend_yield, Field::AnnualDividendYield, 0.0, 1.0)?;

    let dividend_growth_rate = finite(
        raw.dividend_growth_rate.unwrap_or(0.0),
        Field::DividendGrowthRate,
    )?;
    within(dividend_growth_rate, Field::DividendGrowthRate, -1.0, 1.0)?;

    let horizon_years = horizon(require(raw.horizon_years, Field::HorizonYears)?)?;

    let periods = require(
        raw.compounding_periods_per_year,
        Field::CompoundingPeriodsPerYear,
    )?;
    let compounding = compounding(periods)?;

    let marginal_tax_rate = finite(raw.marginal_tax_rate.unwrap_or(0.0), Field::MarginalTaxRate)?;
    within(marginal_tax_rate, Field::MarginalTaxRate, 0.0, 1.0)?;

    let share_price = raw
        .share_price
        .map(|price| {
            let price = non_negative(price, Field::SharePrice)?;
            within(price, Field::SharePrice, MIN_SHARE_PRICE, MAX_SHARE_PRICE)
        })
        .transpose()?;

    Ok(ProjectionInputs {
        initial_principal,
        periodic_contribution,
        annual_dividend_yield,
        dividend_growth_rate,
        horizon_years,
        compounding,
        reinvest_dividends: raw.reinvest_dividends.unwrap_or(true),
        marginal_tax_rate,
        share_price,
    })
}

pub(crate) fn require<T>(value: Option<T>, field: Field) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

pub(crate) fn finite(value: f64, field: Field) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite(field))
    }
}

pub(crate) fn non_negative(value: f64, field: Field) -> Result<f64, ValidationError> {
    let value = finite(value, field)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue(field));
    }
    Ok(value)
}

pub(crate) fn within(value: f64, field: Field, min: f64, max: f64) -> Result<f64, ValidationError> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(value)
}

pub(crate) fn horizon(years: i64) -> Result<u32, ValidationError> {
    if years < 0 {
        return Err(ValidationError::NegativeValue(Field::HorizonYears));
    }
    if years < MIN_HORIZON_YEARS as i64 || years > MAX_HORIZON_YEARS as i64 {
        return Err(ValidationError::OutOfRange {
            field: Field::HorizonYears,
            min: MIN_HORIZON_YEARS as f64,
            max: MAX_HORIZON_YEARS as f64,
        });
    }
    Ok(years as u32)
}

pub(crate) fn compounding(periods: u32) -> Result<CompoundingFrequency, ValidationError> {
    CompoundingFrequency::from_periods(periods)
        .ok_or(ValidationError::InvalidCompoundingFrequency(periods))
}
