//! Population standard deviation helpers.
//!
//! Shared by Bollinger Bands, trade statistics and the walk-forward score.
//! All variants divide by N, not N-1.

/// Mean and population standard deviation of `values`.
///
/// Returns `(0.0, 0.0)` for an empty slice.
pub fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

pub fn population_stddev(values: &[f64]) -> f64 {
    mean_and_stddev(values).1
}

/// Running population standard deviation of observations around a moving reference.
///
/// Keeps sums of x and x^2 so the deviation from any reference `r` is
/// sqrt(E[(x - r)^2]) = sqrt(E[x^2] - 2 r E[x] + r^2).
#[derive(Debug, Clone, Default)]
pub struct RunningDeviation {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl RunningDeviation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    pub fn deviation_from(&self, reference: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean_sq = self.sum_sq / n;
        let mean = self.sum / n;
        let variance = mean_sq - 2.0 * reference * mean + reference * reference;
        // Rounding can push a zero variance slightly negative.
        variance.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stddev_known_values() {
        let (mean, sd) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(mean, 5.0);
        assert_relative_eq!(sd, 2.0);
    }

    #[test]
    fn stddev_constant_values() {
        assert_eq!(population_stddev(&[100.0, 100.0, 100.0]), 0.0);
    }

    #[test]
    fn stddev_empty() {
        assert_eq!(mean_and_stddev(&[]), (0.0, 0.0));
    }

    #[test]
    fn running_deviation_matches_batch_around_mean() {
        let xs = [10.0, 12.0, 9.0, 15.0, 11.0];
        let mut running = RunningDeviation::new();
        for x in xs {
            running.push(x);
        }
        let (mean, sd) = mean_and_stddev(&xs);
        assert_relative_eq!(running.deviation_from(mean), sd, epsilon = 1e-9);
    }

    #[test]
    fn running_deviation_around_other_reference() {
        let mut running = RunningDeviation::new();
        running.push(1.0);
        running.push(3.0);
        // E[(x - 0)^2] = (1 + 9) / 2 = 5
        assert_relative_eq!(running.deviation_from(0.0), 5.0_f64.sqrt(), epsilon = 1e-12);
        running.reset();
        assert_eq!(running.deviation_from(2.0), 0.0);
    }
}
