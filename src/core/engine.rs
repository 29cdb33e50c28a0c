use tracing::debug;

use super::stepper;
use super::summary::summarize;
use super::types::{MonthRecord, Projection, ProjectionInputs, YearRecord};

const MONTHS_PER_YEAR: u64 = 12;
// A compounding period spans 12 ticks and a month spans `periods_per_year`
// ticks, so every allowed frequency lands on whole ticks.
const TICKS_PER_PERIOD: u64 = 12;

/// What one simulated year feeds into the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct YearPlan {
    pub yield_rate: f64,
    pub monthly_contribution: f64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopSettings {
    pub initial_principal: f64,
    pub periods_per_year: u32,
    pub tax_rate: f64,
    pub reinvest: bool,
    pub share_price: Option<f64>,
}

impl LoopSettings {
    pub(crate) fn from_inputs(inputs: &ProjectionInputs) -> Self {
        Self {
            initial_principal: inputs.initial_principal,
            periods_per_year: inputs.compounding.periods_per_year(),
            tax_rate: inputs.marginal_tax_rate,
            reinvest: inputs.reinvest_dividends,
            share_price: inputs.share_price,
        }
    }
}

pub fn run(inputs: &ProjectionInputs) -> Projection {
    debug!(?inputs, "starting projection");
    let records = project(
        &LoopSettings::from_inputs(inputs),
        &year_plans(inputs),
        None,
    );
    finish(inputs, records)
}

pub fn run_with_months(inputs: &ProjectionInputs) -> (Projection, Vec<MonthRecord>) {
    debug!(?inputs, "starting projection with monthly breakdown");
    let mut months = Vec::with_capacity(inputs.horizon_years as usize * 12);
    let records = project(
        &LoopSettings::from_inputs(inputs),
        &year_plans(inputs),
        Some(&mut months),
    );
    (finish(inputs, records), months)
}

fn finish(inputs: &ProjectionInputs, records: Vec<YearRecord>) -> Projection {
    let summary = summarize(&records, inputs);
    debug!(
        final_balance = summary.final_balance,
        total_dividends_net = summary.total_dividends_net,
        "projection complete"
    );
    Projection {
        yearly_breakdown: records,
        summary,
    }
}

/// Yield applied during `year` (1-based): the starting yield grown by the
/// dividend growth rate once per elapsed year.
pub fn yield_for_year(inputs: &ProjectionInputs, year: u32) -> f64 {
    let elapsed = year.saturating_sub(1) as i32;
    inputs.annual_dividend_yield * (1.0 + inputs.dividend_growth_rate).powi(elapsed)
}

pub(crate) fn year_plans(inputs: &ProjectionInputs) -> Vec<YearPlan> {
    (1..=inputs.horizon_years)
        .map(|year| YearPlan {
            yield_rate: yield_for_year(inputs, year),
            monthly_contribution: inputs.periodic_contribution,
        })
        .collect()
}

pub(crate) fn project(
    settings: &LoopSettings,
    plans: &[YearPlan],
    mut months: Option<&mut Vec<MonthRecord>>,
) -> Vec<YearRecord> {
    let ticks_per_month = settings.periods_per_year.max(1) as u64;
    let keep_share = 1.0 - settings.tax_rate;

    let mut records = Vec::with_capacity(plans.len());
    let mut balance = settings.initial_principal;
    let mut cumulative_contributions = settings.initial_principal;
    let mut cumulative_dividends = 0.0;

    for (index, plan) in plans.iter().enumerate() {
        let year = index as u32 + 1;
        let rate = stepper::periodic_rate(plan.yield_rate, settings.periods_per_year);
        let starting_balance = balance;
        let mut contributions = 0.0;
        let mut year_gross = 0.0;
        let mut year_net = 0.0;

        // Interest accrued since the last period boundary, and whether a
        // contribution landed inside the current period.
        let mut accrued = 0.0;
        let mut interrupted = false;

        for month in 0..MONTHS_PER_YEAR {
            let month_start = balance;
            // Money in follows the same additions as the balance so that a
            // zero yield leaves the two bit-for-bit equal.
            balance += plan.monthly_contribution;
            cumulative_contributions += plan.monthly_contribution;
            contributions += plan.monthly_contribution;

            let mut tick = month * ticks_per_month;
            if tick % TICKS_PER_PERIOD != 0 {
                interrupted = true;
            }
            let month_end = tick + ticks_per_month;
            let mut month_gross = 0.0;
            let mut month_net = 0.0;

            while tick < month_end {
                let boundary = (tick / TICKS_PER_PERIOD + 1) * TICKS_PER_PERIOD;
                let slice_end = boundary.min(month_end);
                let fraction = (slice_end - tick) as f64 / TICKS_PER_PERIOD as f64;
                accrued += stepper::accrue(balance, rate, fraction);
                tick = slice_end;

                if tick == boundary {
                    let gross = accrued;
                    let net = gross * keep_share;
                    if settings.reinvest {
                        balance = if interrupted {
                            balance + net
                        } else {
                            stepper::step(balance, rate * keep_share)
                        };
                    }
                    month_gross += gross;
                    month_net += net;
                    accrued = 0.0;
                    interrupted = false;
                }
            }

            year_gross += month_gross;
            year_net += month_net;

            if let Some(months) = months.as_deref_mut() {
                months.push(MonthRecord {
                    year,
                    month: month as u32 + 1,
                    starting_balance: month_start,
                    contribution: plan.monthly_contribution,
                    dividends_gross: month_gross,
                    dividends_net: month_net,
                    ending_balance: balance,
                });
            }
        }

        cumulative_dividends += year_net;

        records.push(YearRecord {
            year,
            starting_balance,
            ending_balance: balance,
            contributions_this_year: contributions,
            dividends_gross: year_gross,
            dividends_net: year_net,
            investment_gain_this_year: balance - starting_balance - contributions,
            cumulative_contributions,
            cumulative_dividends,
            effective_yield_this_year: if balance > 0.0 {
                year_gross / balance
            } else {
                0.0
            },
            yield_on_cost: if cumulative_contributions > 0.0 {
                Some(year_gross / cumulative_contributions)
            } else {
                None
            },
            shares: settings.share_price.map(|price| balance / price),
        });
    }

    records
}
