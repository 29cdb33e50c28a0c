/// `$1,234.50`, rounded half away from zero to cents.
pub fn format_currency(value: f64) -> String {
    let body = format_number(value.abs(), 2);
    if is_negative_after_rounding(value, 2) {
        format!("-${body}")
    } else {
        format!("${body}")
    }
}

/// Renders a ratio as a percentage: `0.04` becomes `4.00%`.
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", format_number(ratio * 100.0, 2))
}

pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value.abs() * scale).round() / scale;
    let fixed = format!("{rounded:.decimals$}");
    let (whole, fraction) = match fixed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if is_negative_after_rounding(value, decimals) {
        grouped.push('-');
    }
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

fn is_negative_after_rounding(value: f64, decimals: usize) -> bool {
    let scale = 10f64.powi(decimals as i32);
    value < 0.0 && (value.abs() * scale).round() > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands_and_pads_cents() {
        assert_eq!(format_currency(1_234.5), "$1,234.50");
        assert_eq!(format_currency(14_908.326_8), "$14,908.33");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
    }

    #[test]
    fn currency_rounds_half_away_from_zero() {
        assert_eq!(format_currency(0.125), "$0.13");
        assert_eq!(format_currency(-0.125), "-$0.13");
        assert_eq!(format_currency(-1_234.5), "-$1,234.50");
        assert_eq!(format_currency(-0.001), "$0.00");
    }

    #[test]
    fn percent_takes_a_ratio() {
        assert_eq!(format_percent(0.04), "4.00%");
        assert_eq!(format_percent(0.071_773), "7.18%");
        assert_eq!(format_percent(-0.02), "-2.00%");
        assert_eq!(format_percent(12.5), "1,250.00%");
    }

    #[test]
    fn number_respects_requested_decimals() {
        assert_eq!(format_number(1_234_567.891, 0), "1,234,568");
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(12.0, 3), "12.000");
        assert_eq!(format_number(123.0, 2), "123.00");
        assert_eq!(format_number(f64::INFINITY, 2), "inf");
    }
}
