//! Reduction of raw per-iteration samples to the reported statistic.
//!
//! Only the arithmetic mean is reported. There is no outlier rejection: a
//! noisy iteration moves the mean.

use crate::error::BenchError;
use std::time::Duration;

/// Decimal places kept for reported averages (seconds).
pub const REPORT_PRECISION: i32 = 7;

/// Arithmetic mean of the samples, in seconds.
pub fn aggregate(samples: &[Duration]) -> Result<f64, BenchError> {
    if samples.is_empty() {
        return Err(BenchError::EmptySampleSet);
    }
    let total: f64 = samples.iter().map(Duration::as_secs_f64).sum();
    Ok(total / samples.len() as f64)
}

/// Round a value in seconds to the report precision.
pub fn round_secs(value: f64) -> f64 {
    let scale = 10f64.powi(REPORT_PRECISION);
    (value * scale).round() / scale
}

/// Mean of the samples, rounded for the report.
pub fn reported_mean(samples: &[Duration]) -> Result<f64, BenchError> {
    aggregate(samples).map(round_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(values: &[f64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs_f64).collect()
    }

    #[test]
    fn test_empty_sample_set() {
        assert!(matches!(aggregate(&[]), Err(BenchError::EmptySampleSet)));
    }

    #[test]
    fn test_single_sample() {
        assert!((aggregate(&secs(&[1.5])).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_mean_of_two() {
        assert!((aggregate(&secs(&[2.0, 4.0])).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_outlier_rejection() {
        let mean = aggregate(&secs(&[0.001, 0.001, 0.001, 10.0])).unwrap();
        assert!(mean > 2.5);
    }

    #[test]
    fn test_rounding() {
        assert!((round_secs(0.123_456_789) - 0.123_456_8).abs() < 1e-12);
        assert!(round_secs(0.0).abs() < f64::EPSILON);
        let mean = reported_mean(&[Duration::from_nanos(1_234_567_891)]).unwrap();
        assert!((mean - 1.234_567_9).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn mean_lies_between_min_and_max(nanos in prop::collection::vec(0u64..10_000_000_000, 1..64)) {
            let samples: Vec<Duration> = nanos.iter().copied().map(Duration::from_nanos).collect();
            let mean = aggregate(&samples).unwrap();
            let min = samples.iter().min().unwrap().as_secs_f64();
            let max = samples.iter().max().unwrap().as_secs_f64();
            prop_assert!(mean >= min - 1e-9 && mean <= max + 1e-9);
        }
    }
}
