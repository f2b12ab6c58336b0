//! Numeric helpers shared by the basket and the paper market

/// Percent change going from `from` to `to`.
///
/// Positive when `to` is above `from`. Returns 0.0 when `from` is zero so
/// callers never see an infinite percentage.
pub fn percent_difference(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return 0.0;
    }
    (to - from) / from * 100.0
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Render a percentage the way report tables show it, e.g. `"1.5 %"`
pub fn format_percent(value: f64) -> String {
    format!("{} %", round_to(value, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_difference() {
        assert!((percent_difference(100.0, 101.5) - 1.5).abs() < 1e-9);
        assert!((percent_difference(100.0, 90.0) + 10.0).abs() < 1e-9);
        assert_eq!(percent_difference(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.235, 0), 1.0);
        assert_eq!(round_to(-2.5551, 3), -2.555);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(1.5), "1.5 %");
        assert_eq!(format_percent(2.0), "2 %");
        assert_eq!(format_percent(-9.0909), "-9.09 %");
    }
}
