//! Score normalization onto the shared 0..=100 scale.
//!
//! Every sub-score the engine combines is first mapped through one of
//! these functions so the composite weights compare like with like.

/// Linear min-max scaling of `value` from `[min, max]` onto `[0, 100]`.
///
/// A degenerate range (`max == min`) carries no ordering information, so
/// every value maps to the neutral midpoint 50.0 rather than dividing by
/// zero or collapsing to an extreme.
pub fn normalize_min_max(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 50.0;
    }
    100.0 * (value - min) / (max - min)
}

/// Min-max scaling in log space: `ln(1 + x)` is applied to value, min and
/// max before the linear step. Compresses heavy-tailed counts (favorites,
/// search hits) so one runaway store does not flatten everyone else.
pub fn normalize_log(value: f64, min: f64, max: f64) -> f64 {
    normalize_min_max((1.0 + value).ln(), (1.0 + min).ln(), (1.0 + max).ln())
}

/// Alias for [`normalize_min_max`]; used where the input is a signed
/// preference weight rather than a count.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    normalize_min_max(value, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_endpoints_to_scale_bounds() {
        assert_eq!(normalize_min_max(0.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize_min_max(10.0, 0.0, 10.0), 100.0);
        assert_eq!(normalize_min_max(5.0, 0.0, 10.0), 50.0);
    }

    #[test]
    fn degenerate_range_is_neutral() {
        assert_eq!(normalize_min_max(7.0, 7.0, 7.0), 50.0);
        assert_eq!(normalize_log(3.0, 3.0, 3.0), 50.0);
        assert_eq!(normalize(-100.0, 5.0, 5.0), 50.0);
    }

    #[test]
    fn preference_weights_map_onto_scale() {
        assert_eq!(normalize(-100.0, -100.0, 100.0), 0.0);
        assert_eq!(normalize(0.0, -100.0, 100.0), 50.0);
        assert_eq!(normalize(100.0, -100.0, 100.0), 100.0);
    }

    #[test]
    fn log_normalization_is_monotonic() {
        let a = normalize_log(1.0, 0.0, 1000.0);
        let b = normalize_log(10.0, 0.0, 1000.0);
        let c = normalize_log(100.0, 0.0, 1000.0);
        assert!(a < b && b < c);
        assert_eq!(normalize_log(0.0, 0.0, 1000.0), 0.0);
        assert!((normalize_log(1000.0, 0.0, 1000.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn log_compresses_the_tail() {
        // In log space the gap between 0 and 10 outweighs the gap
        // between 500 and 1000.
        let low_gap = normalize_log(10.0, 0.0, 1000.0) - normalize_log(0.0, 0.0, 1000.0);
        let high_gap = normalize_log(1000.0, 0.0, 1000.0) - normalize_log(500.0, 0.0, 1000.0);
        assert!(low_gap > high_gap);
    }
}
