//! Rounding helpers
//!
//! Scores are rounded to a fixed number of decimals before they are compared
//! or serialized, so that two detectors reporting the same value produce the
//! same JSON.

/// Round `value` to `decimals` places (half away from zero)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_two_decimals() {
        assert_eq!(round_to(0.456, 2), 0.46);
        assert_eq!(round_to(0.454, 2), 0.45);
        assert_eq!(round_to(-0.456, 2), -0.46);
    }

    #[test]
    fn test_round_to_three_decimals() {
        assert_eq!(round_to(0.6 - 0.2, 3), 0.4);
        assert_eq!(round_to(0.12345, 3), 0.123);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        let m = mean(&[0.2, 0.4]).unwrap();
        assert!((m - 0.3).abs() < 1e-12);
    }
}
