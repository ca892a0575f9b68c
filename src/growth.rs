//! Divide-by-zero-safe growth and ratio arithmetic.

/// Percentage growth of `current` over `previous`.
///
/// A zero previous value yields 100% when anything grew and 0% otherwise, so
/// a report never divides by zero or hides a from-nothing jump.
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Absolute difference, for plain counts where a percentage reads poorly.
pub fn delta(current: f64, previous: f64) -> f64 {
    current - previous
}

/// `numerator / denominator` as a percentage, 0 when the denominator is not
/// positive (conversion rates, profit margins).
pub fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
