//! Summary statistics for field values, SIMD-accelerated via Trueno.

use trueno::Vector;

/// Summary statistics for one field over one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStats {
    pub count: usize,
    pub mean: f32,
    pub stddev: f32,
    pub min: f32,
    pub max: f32,
    pub median: f32,
    pub p95: f32,
    pub p99: f32,
}

impl FieldStats {
    fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            stddev: 0.0,
            min: 0.0,
            max: 0.0,
            median: 0.0,
            p95: 0.0,
            p99: 0.0,
        }
    }
}

/// Compute [`FieldStats`] for `values`. Values are narrowed to `f32` for the
/// SIMD kernels; an empty slice yields all-zero statistics.
pub fn field_stats(values: &[f64]) -> FieldStats {
    if values.is_empty() {
        return FieldStats::empty();
    }
    let narrowed: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    let vector = Vector::from_slice(&narrowed);
    let mean = vector.mean().unwrap_or(0.0);
    let stddev = vector.stddev().unwrap_or(0.0);
    let min = vector.min().unwrap_or(0.0);
    let max = vector.max().unwrap_or(0.0);

    let mut sorted = narrowed;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    FieldStats {
        count: values.len(),
        mean,
        stddev,
        min,
        max,
        median: percentile(&sorted, 50.0),
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
    }
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f32], percentile: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (percentile / 100.0) * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f32;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}
