//! Rating normalization
//!
//! Accepts ratings on 0-5, 0-10, and 0-100 scales and folds them onto the
//! canonical 0.0-5.0 one-decimal scale. Out-of-range input is rejected.

/// Normalize a rating value. `(5, 10]` divides by 2, `(10, 100]` by 20;
/// the result is clamped to `[0, 5]` and rounded to one decimal.
pub fn normalize_rating_value(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 || value > 100.0 {
        return None;
    }
    let scaled = if value > 10.0 {
        value / 20.0
    } else if value > 5.0 {
        value / 2.0
    } else {
        value
    };
    Some(round1(scaled.clamp(0.0, 5.0)))
}

/// Normalize a rating from a number or numeric string.
pub fn normalize_rating(input: &str) -> Option<f64> {
    let cleaned = input.trim();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    normalize_rating_value(value)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
