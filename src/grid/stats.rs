//! Summary statistics over grid values.

use crate::sampling::Direction;

/// Number of leading values inspected by [`GridStatistics::fast_estimate`].
pub const FAST_ESTIMATE_SAMPLE: usize = 10_000;

/// Min/max/mean/population standard deviation of a set of values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridStatistics {
    /// Smallest value
    pub min: f32,
    /// Largest value
    pub max: f32,
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Number of values the statistics were computed over
    pub count: usize,
}

impl GridStatistics {
    /// Two-pass statistics over every value. An empty slice yields all zeros.
    pub fn compute(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let (min, max, sum) = values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v as f64),
        );
        let n = values.len() as f64;
        let mean = sum / n;

        let variance = values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            count: values.len(),
        }
    }

    /// Quick look at the first [`FAST_ESTIMATE_SAMPLE`] values only.
    ///
    /// Meant for diagnostics; never use it in place of [`GridStatistics::compute`]
    /// for validation or threshold selection.
    pub fn fast_estimate(values: &[f32]) -> Self {
        Self::compute(&values[..values.len().min(FAST_ESTIMATE_SAMPLE)])
    }

    /// Whether these statistics cover fewer values than `total`.
    pub fn is_estimate(&self, total: usize) -> bool {
        self.count < total
    }

    /// A default threshold one standard deviation past the mean, in the
    /// favourable (lower) or exclusion (higher) direction, clamped to the data range.
    pub fn suggest_threshold(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Favorable => ((self.mean - self.std_dev) as f32).max(self.min),
            Direction::Exclusion => ((self.mean + self.std_dev) as f32).min(self.max),
        }
    }
}
