use std::fmt;

use serde::{Deserialize, Serialize};

/// Compounding frequencies the engine supports.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CompoundingFrequency {
    Annual,
    SemiAnnual,
    Quarterly,
    Monthly,
    Daily,
}

impl CompoundingFrequency {
    pub const ALLOWED: [u32; 5] = [1, 2, 4, 12, 365];

    pub fn periods_per_year(self) -> u32 {
        match self {
            CompoundingFrequency::Annual => 1,
            CompoundingFrequency::SemiAnnual => 2,
            CompoundingFrequency::Quarterly => 4,
            CompoundingFrequency::Monthly => 12,
            CompoundingFrequency::Daily => 365,
        }
    }

    pub fn from_periods(periods: u32) -> Option<Self> {
        match periods {
            1 => Some(CompoundingFrequency::Annual),
            2 => Some(CompoundingFrequency::SemiAnnual),
            4 => Some(CompoundingFrequency::Quarterly),
            12 => Some(CompoundingFrequency::Monthly),
            365 => Some(CompoundingFrequency::Daily),
            _ => None,
        }
    }
}

impl TryFrom<u32> for CompoundingFrequency {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_periods(value)
            .ok_or_else(|| format!("unsupported compounding frequency {value}"))
    }
}

impl From<CompoundingFrequency> for u32 {
    fn from(value: CompoundingFrequency) -> Self {
        value.periods_per_year()
    }
}

/// Names every user-supplied field that validation can complain about.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    InitialPrincipal,
    PeriodicContribution,
    AnnualDividendYield,
    DividendGrowthRate,
    HorizonYears,
    CompoundingPeriodsPerYear,
    MarginalTaxRate,
    SharePrice,
    CurrentAge,
    RetirementAge,
    CurrentSalary,
    CurrentBalance,
    ContributionRate,
    EmployerMatch,
    EmployerMatchLimit,
    AnnualReturn,
    SalaryGrowthRate,
    ContributionLimit,
    Paths,
    MarketVolatility,
    GrowthVolatility,
    InflationRate,
    TargetAnnualIncome,
    SearchMin,
    SearchMax,
    Tolerance,
    MaxIterations,
}

impl Field {
    /// Key used on the JSON surface.
    pub fn key(self) -> &'static str {
        match self {
            Field::InitialPrincipal => "initialPrincipal",
            Field::PeriodicContribution => "periodicContribution",
            Field::AnnualDividendYield => "annualDividendYield",
            Field::DividendGrowthRate => "dividendGrowthRate",
            Field::HorizonYears => "horizonYears",
            Field::CompoundingPeriodsPerYear => "compoundingPeriodsPerYear",
            Field::MarginalTaxRate => "marginalTaxRate",
            Field::SharePrice => "sharePrice",
            Field::CurrentAge => "currentAge",
            Field::RetirementAge => "retirementAge",
            Field::CurrentSalary => "currentSalary",
            Field::CurrentBalance => "currentBalance",
            Field::ContributionRate => "contributionRate",
            Field::EmployerMatch => "employerMatch",
            Field::EmployerMatchLimit => "employerMatchLimit",
            Field::AnnualReturn => "annualReturn",
            Field::SalaryGrowthRate => "salaryGrowthRate",
            Field::ContributionLimit => "contributionLimit",
            Field::Paths => "paths",
            Field::MarketVolatility => "marketVolatility",
            Field::GrowthVolatility => "growthVolatility",
            Field::InflationRate => "inflationRate",
            Field::TargetAnnualIncome => "targetAnnualIncome",
            Field::SearchMin => "searchMin",
            Field::SearchMax => "searchMax",
            Field::Tolerance => "tolerance",
            Field::MaxIterations => "maxIterations",
        }
    }

    /// Flag used on the command line.
    pub fn flag(self) -> &'static str {
        match self {
            Field::InitialPrincipal => "--principal",
            Field::PeriodicContribution => "--contribution",
            Field::AnnualDividendYield => "--yield",
            Field::DividendGrowthRate => "--growth",
            Field::HorizonYears => "--years",
            Field::CompoundingPeriodsPerYear => "--compounding",
            Field::MarginalTaxRate => "--tax-rate",
            Field::SharePrice => "--share-price",
            Field::CurrentAge => "--current-age",
            Field::RetirementAge => "--retirement-age",
            Field::CurrentSalary => "--salary",
            Field::CurrentBalance => "--balance",
            Field::ContributionRate => "--contribution-rate",
            Field::EmployerMatch => "--employer-match",
            Field::EmployerMatchLimit => "--employer-match-limit",
            Field::AnnualReturn => "--return",
            Field::SalaryGrowthRate => "--salary-growth",
            Field::ContributionLimit => "--contribution-limit",
            Field::Paths => "--paths",
            Field::MarketVolatility => "--market-volatility",
            Field::GrowthVolatility => "--growth-volatility",
            Field::InflationRate => "--inflation",
            Field::TargetAnnualIncome => "--target-income",
            Field::SearchMin => "--search-min",
            Field::SearchMax => "--search-max",
            Field::Tolerance => "--tolerance",
            Field::MaxIterations => "--max-iterations",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unvalidated calculator request as it arrives from a form, the CLI or JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawInputs {
    pub initial_principal: Option<f64>,
    pub periodic_contribution: Option<f64>,
    pub annual_dividend_yield: Option<f64>,
    pub dividend_growth_rate: Option<f64>,
    pub horizon_years: Option<i64>,
    pub compounding_periods_per_year: Option<u32>,
    pub reinvest_dividends: Option<bool>,
    pub marginal_tax_rate: Option<f64>,
    pub share_price: Option<f64>,
}

/// Validated, immutable parameters for one projection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionInputs {
    pub initial_principal: f64,
    /// Added once per month.
    pub periodic_contribution: f64,
    pub annual_dividend_yield: f64,
    pub dividend_growth_rate: f64,
    pub horizon_years: u32,
    pub compounding: CompoundingFrequency,
    pub reinvest_dividends: bool,
    pub marginal_tax_rate: f64,
    /// Constant price used to express the balance as a share count.
    pub share_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub starting_balance: f64,
    pub ending_balance: f64,
    pub contributions_this_year: f64,
    pub dividends_gross: f64,
    pub dividends_net: f64,
    pub investment_gain_this_year: f64,
    pub cumulative_contributions: f64,
    pub cumulative_dividends: f64,
    pub effective_yield_this_year: f64,
    /// Gross dividends over cumulative money in.
    pub yield_on_cost: Option<f64>,
    /// `None` without a share price.
    pub shares: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub year: u32,
    pub month: u32,
    pub starting_balance: f64,
    pub contribution: f64,
    pub dividends_gross: f64,
    pub dividends_net: f64,
    pub ending_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub initial_principal: f64,
    pub final_balance: f64,
    pub total_contributions: f64,
    pub total_dividends_gross: f64,
    pub total_dividends_net: f64,
    pub total_tax_withheld: f64,
    /// Net dividends paid out as cash because reinvestment was off.
    pub dividends_paid_out: f64,
    pub total_return: f64,
    pub total_return_ratio: Option<f64>,
    pub effective_annual_return: Option<f64>,
    pub final_annual_dividend_income: f64,
    pub final_yield: f64,
    pub final_yield_on_cost: Option<f64>,
    pub final_shares: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub yearly_breakdown: Vec<YearRecord>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compounding_frequency_accepts_only_allowed_periods() {
        for periods in CompoundingFrequency::ALLOWED {
            let frequency = CompoundingFrequency::from_periods(periods).expect("allowed");
            assert_eq!(frequency.periods_per_year(), periods);
            assert_eq!(u32::from(frequency), periods);
        }
        assert_eq!(CompoundingFrequency::from_periods(52), None);
        assert!(CompoundingFrequency::try_from(0).is_err());
    }

    #[test]
    fn compounding_frequency_reads_json_numbers() {
        let frequency: CompoundingFrequency = serde_json::from_str("4").expect("quarterly");
        assert_eq!(frequency, CompoundingFrequency::Quarterly);
        assert!(serde_json::from_str::<CompoundingFrequency>("3").is_err());
        assert_eq!(
            serde_json::to_string(&CompoundingFrequency::Daily).expect("serializes"),
            "365"
        );
    }

    #[test]
    fn field_key_matches_serialized_name() {
        for field in [
            Field::InitialPrincipal,
            Field::CompoundingPeriodsPerYear,
            Field::MarginalTaxRate,
            Field::TargetAnnualIncome,
        ] {
            let json = serde_json::to_string(&field).expect("serializes");
            assert_eq!(json, format!("\"{}\"", field.key()));
        }
        assert_eq!(Field::AnnualDividendYield.flag(), "--yield");
        assert_eq!(Field::HorizonYears.to_string(), "horizonYears");
        assert_eq!(Field::SharePrice.flag(), "--share-price");
    }

    #[test]
    fn raw_inputs_leave_missing_fields_empty() {
        let raw: RawInputs =
            serde_json::from_str(r#"{"initialPrincipal": 500, "horizonYears": -2}"#)
                .expect("json should parse");
        assert_eq!(raw.initial_principal, Some(500.0));
        assert_eq!(raw.horizon_years, Some(-2));
        assert_eq!(raw.periodic_contribution, None);
        assert_eq!(raw.reinvest_dividends, None);
    }
}
