use thiserror::Error;

use super::types::{ProjectionInputs, Summary, YearRecord};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ComputationError {
    #[error("cannot annualize a return on zero contributions")]
    DivisionByZero,
}

/// Compound annual growth rate turning `start` into `end` over `years`.
pub fn annualized_return(start: f64, end: f64, years: u32) -> Result<f64, ComputationError> {
    if start == 0.0 || years == 0 {
        return Err(ComputationError::DivisionByZero);
    }
    Ok((end / start).powf(1.0 / years as f64) - 1.0)
}

pub fn summarize(records: &[YearRecord], inputs: &ProjectionInputs) -> Summary {
    let final_balance = records
        .last()
        .map_or(inputs.initial_principal, |record| record.ending_balance);
    let total_contributions = records
        .last()
        .map_or(inputs.initial_principal, |record| record.cumulative_contributions);
    let total_dividends_gross = records.iter().map(|r| r.dividends_gross).sum::<f64>();
    let total_dividends_net = records.iter().map(|r| r.dividends_net).sum::<f64>();
    let dividends_paid_out = if inputs.reinvest_dividends {
        0.0
    } else {
        total_dividends_net
    };

    let total_return = final_balance + dividends_paid_out - total_contributions;
    let total_return_ratio = if total_contributions > 0.0 {
        Some(total_return / total_contributions)
    } else {
        None
    };

    Summary {
        initial_principal: inputs.initial_principal,
        final_balance,
        total_contributions,
        total_dividends_gross,
        total_dividends_net,
        total_tax_withheld: total_dividends_gross - total_dividends_net,
        dividends_paid_out,
        total_return,
        total_return_ratio,
        effective_annual_return: annualized_return(
            total_contributions,
            final_balance,
            records.len() as u32,
        )
        .ok(),
        final_annual_dividend_income: records.last().map_or(0.0, |r| r.dividends_gross),
        final_yield: records.last().map_or(0.0, |r| r.effective_yield_this_year),
        final_yield_on_cost: records.last().and_then(|r| r.yield_on_cost),
        final_shares: records.last().map_or_else(
            || inputs.share_price.map(|price| inputs.initial_principal / price),
            |r| r.shares,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::run;
    use crate::core::types::CompoundingFrequency;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn inputs() -> ProjectionInputs {
        ProjectionInputs {
            initial_principal: 1_000.0,
            periodic_contribution: 100.0,
            annual_dividend_yield: 0.05,
            dividend_growth_rate: 0.0,
            horizon_years: 2,
            compounding: CompoundingFrequency::Annual,
            reinvest_dividends: true,
            marginal_tax_rate: 0.2,
            share_price: None,
        }
    }

    fn record(year: u32, ending: f64, money_in: f64, gross: f64, net: f64) -> YearRecord {
        YearRecord {
            year,
            starting_balance: 0.0,
            ending_balance: ending,
            contributions_this_year: 1_200.0,
            dividends_gross: gross,
            dividends_net: net,
            investment_gain_this_year: 0.0,
            cumulative_contributions: money_in,
            cumulative_dividends: 0.0,
            effective_yield_this_year: gross / ending,
            yield_on_cost: Some(gross / money_in),
            shares: None,
        }
    }

    #[test]
    fn annualized_return_matches_cagr() {
        let rate = annualized_return(10_000.0, 20_000.0, 10).expect("defined");
        assert!((rate - 0.071_773_462_5).abs() < 1e-9);
        assert!(annualized_return(10_000.0, 5_000.0, 5).expect("defined") < 0.0);
    }

    #[test]
    fn annualized_return_rejects_zero_base() {
        assert_eq!(
            annualized_return(0.0, 10_000.0, 5),
            Err(ComputationError::DivisionByZero)
        );
        assert_eq!(
            annualized_return(10_000.0, 20_000.0, 0),
            Err(ComputationError::DivisionByZero)
        );
    }

    #[test]
    fn summarize_totals_hand_built_records() {
        let records = vec![
            record(1, 2_300.0, 2_200.0, 125.0, 100.0),
            record(2, 3_650.0, 3_400.0, 187.5, 150.0),
        ];
        let summary = summarize(&records, &inputs());

        assert_approx(summary.final_balance, 3_650.0);
        assert_approx(summary.total_contributions, 3_400.0);
        assert_approx(summary.total_dividends_gross, 312.5);
        assert_approx(summary.total_dividends_net, 250.0);
        assert_approx(summary.total_tax_withheld, 62.5);
        assert_approx(summary.dividends_paid_out, 0.0);
        assert_approx(summary.total_return, 250.0);
        assert_approx(summary.final_annual_dividend_income, 187.5);
        assert_approx(summary.final_yield_on_cost.expect("money in"), 187.5 / 3_400.0);
        assert_eq!(summary.final_shares, None);
        let expected = (3_650.0_f64 / 3_400.0).sqrt() - 1.0;
        assert_approx(summary.effective_annual_return.expect("defined"), expected);
    }

    #[test]
    fn summarize_counts_paid_out_dividends_in_total_return() {
        let mut inputs = inputs();
        inputs.reinvest_dividends = false;
        let records = vec![record(1, 2_200.0, 2_200.0, 125.0, 100.0)];
        let summary = summarize(&records, &inputs);

        assert_approx(summary.dividends_paid_out, 100.0);
        assert_approx(summary.total_return, 100.0);
        assert_approx(summary.total_return_ratio.expect("defined"), 100.0 / 2_200.0);
    }

    #[test]
    fn summarize_marks_zero_money_in_as_undefined() {
        let inputs = ProjectionInputs {
            initial_principal: 0.0,
            periodic_contribution: 0.0,
            ..inputs()
        };
        let summary = run(&inputs).summary;
        assert_eq!(summary.final_balance, 0.0);
        assert_eq!(summary.effective_annual_return, None);
        assert_eq!(summary.total_return_ratio, None);
    }

    #[test]
    fn summarize_empty_series_falls_back_to_principal() {
        let summary = summarize(&[], &inputs());
        assert_approx(summary.final_balance, 1_000.0);
        assert_approx(summary.total_contributions, 1_000.0);
        assert_eq!(summary.effective_annual_return, None);
    }

    #[test]
    fn summary_reports_shares_at_constant_price() {
        let inputs = ProjectionInputs {
            share_price: Some(50.0),
            ..inputs()
        };
        let summary = run(&inputs).summary;
        let shares = summary.final_shares.expect("price given");
        assert_approx(shares, summary.final_balance / 50.0);
        assert!(shares > 1_000.0 / 50.0);

        let empty = summarize(&[], &inputs);
        assert_approx(empty.final_shares.expect("price given"), 20.0);
        assert_eq!(empty.final_yield_on_cost, None);
    }

    #[test]
    fn summary_of_zero_yield_run_has_zero_effective_return() {
        let inputs = ProjectionInputs {
            annual_dividend_yield: 0.0,
            ..inputs()
        };
        let summary = run(&inputs).summary;
        assert_eq!(summary.final_balance, summary.total_contributions);
        assert_approx(summary.effective_annual_return.expect("defined"), 0.0);
    }
}
