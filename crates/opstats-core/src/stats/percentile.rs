//! Latency percentile transformation
//!
//! The store keeps latencies in nanoseconds; callers see whole
//! milliseconds. A window without samples has no percentile value and is
//! presented as `0`; callers must treat `0` as "no data".

use crate::models::{DurationPercentiles, DurationSeriesPoint, DurationSeriesStats, DurationStats};

const NS_PER_MS: f64 = 1_000_000.0;

/// Convert one raw nanosecond percentile to whole milliseconds
pub fn transform_percentile(raw: Option<f64>) -> u64 {
    match raw {
        Some(ns) => (ns / NS_PER_MS).round() as u64,
        None => 0,
    }
}

/// Convert a raw percentile set to caller-facing milliseconds
pub fn transform(raw: &DurationPercentiles) -> DurationStats {
    DurationStats {
        p75: transform_percentile(raw.p75),
        p90: transform_percentile(raw.p90),
        p95: transform_percentile(raw.p95),
        p99: transform_percentile(raw.p99),
    }
}

/// Convert a duration time series to caller-facing milliseconds
pub fn transform_series(points: &[DurationSeriesPoint]) -> Vec<DurationSeriesStats> {
    points
        .iter()
        .map(|point| DurationSeriesStats {
            date: point.date,
            duration: transform(&point.duration),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_value_maps_to_zero() {
        assert_eq!(transform_percentile(None), 0);
    }

    #[test]
    fn nanoseconds_become_rounded_milliseconds() {
        assert_eq!(transform_percentile(Some(5_000_000.0)), 5);
        assert_eq!(transform_percentile(Some(1_499_999.0)), 1);
        assert_eq!(transform_percentile(Some(1_500_000.0)), 2);
        assert_eq!(transform_percentile(Some(0.0)), 0);
    }

    #[test]
    fn transforms_a_full_set() {
        let raw = DurationPercentiles {
            p75: Some(1_000_000.0),
            p90: Some(2_000_000.0),
            p95: None,
            p99: Some(10_400_000.0),
        };
        assert_eq!(
            transform(&raw),
            DurationStats {
                p75: 1,
                p90: 2,
                p95: 0,
                p99: 10,
            }
        );
    }
}
