/// Balance after one full compounding period.
pub fn step(balance: f64, periodic_rate: f64) -> f64 {
    balance * (1.0 + periodic_rate)
}

pub fn periodic_rate(annual_rate: f64, periods_per_year: u32) -> f64 {
    annual_rate / periods_per_year as f64
}

/// Interest earned over `fraction` of one compounding period, with no
/// compounding inside the slice.
pub fn accrue(balance: f64, periodic_rate: f64, fraction: f64) -> f64 {
    balance * periodic_rate * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_applies_periodic_rate() {
        assert_eq!(step(1_000.0, 0.01), 1_010.0);
        assert_eq!(step(1_000.0, 0.0), 1_000.0);
        assert_eq!(step(0.0, 0.5), 0.0);
    }

    #[test]
    fn periodic_rate_divides_annual_rate() {
        assert!((periodic_rate(0.12, 12) - 0.01).abs() < 1e-15);
        assert_eq!(periodic_rate(0.04, 1), 0.04);
    }

    #[test]
    fn full_period_accrual_matches_step() {
        let balance = 12_345.67;
        let rate = periodic_rate(0.05, 4);
        let stepped = step(balance, rate);
        let accrued = balance + accrue(balance, rate, 1.0);
        assert!((stepped - accrued).abs() < 1e-9);
    }

    #[test]
    fn partial_period_accrual_is_proportional() {
        let full = accrue(9_000.0, 0.03, 1.0);
        let third = accrue(9_000.0, 0.03, 1.0 / 3.0);
        assert!((third * 3.0 - full).abs() < 1e-9);
    }
}
