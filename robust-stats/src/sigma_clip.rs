//! Iterative sigma clipping.
//!
//! Each iteration computes the median and population standard deviation of
//! the surviving values and rejects everything farther than `sigma × std`
//! from the median. Iteration stops when an iteration rejects nothing or the
//! iteration limit is reached. The statistics of the surviving values are
//! reported as [`SigmaClippedStats`].

use log::debug;

use crate::descriptive::{mean_of_valid, median_of_valid, population_std};
use crate::{valid_values, StatsError};

/// Sigma clipping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClip {
    /// Rejection threshold in units of standard deviation
    pub sigma: f64,
    /// Iteration limit, `None` to iterate until nothing is rejected
    pub max_iters: Option<usize>,
}

impl Default for SigmaClip {
    fn default() -> Self {
        Self {
            sigma: 3.0,
            max_iters: Some(5),
        }
    }
}

/// Statistics of the values surviving sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClippedStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    /// Number of values kept after clipping
    pub n_kept: usize,
    /// Number of values rejected (NaN values are not counted)
    pub n_rejected: usize,
    /// Iterations performed
    pub iterations: usize,
}

impl SigmaClip {
    /// Create clipping parameters, validating the threshold.
    pub fn new(sigma: f64, max_iters: Option<usize>) -> Result<Self, StatsError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(StatsError::InvalidParameter(format!(
                "sigma must be finite and positive, got {sigma}"
            )));
        }
        Ok(Self { sigma, max_iters })
    }

    /// Return the values surviving the clipping, in their original order.
    ///
    /// # Errors
    /// * `StatsError::InsufficientData` - empty / all-NaN input, or every value rejected
    pub fn clip(&self, values: &[f64]) -> Result<Vec<f64>, StatsError> {
        Ok(self.run(values)?.0)
    }

    /// Mean, median and standard deviation of the clipped sample.
    pub fn stats(&self, values: &[f64]) -> Result<SigmaClippedStats, StatsError> {
        let (kept, n_input, iterations) = self.run(values)?;
        let mut scratch = kept.clone();
        Ok(SigmaClippedStats {
            mean: mean_of_valid(&kept),
            median: median_of_valid(&mut scratch),
            std: population_std(&kept),
            n_kept: kept.len(),
            n_rejected: n_input - kept.len(),
            iterations,
        })
    }

    fn run(&self, values: &[f64]) -> Result<(Vec<f64>, usize, usize), StatsError> {
        let mut kept = valid_values(values, "sigma-clipped statistics")?;
        let n_input = kept.len();
        let mut iterations = 0;
        let mut scratch = Vec::with_capacity(kept.len());

        loop {
            if self.max_iters.is_some_and(|limit| iterations >= limit) {
                break;
            }
            iterations += 1;

            scratch.clear();
            scratch.extend_from_slice(&kept);
            let center = median_of_valid(&mut scratch);
            let std = population_std(&kept);
            let lower = center - self.sigma * std;
            let upper = center + self.sigma * std;

            let before = kept.len();
            kept.retain(|&v| v >= lower && v <= upper);

            if kept.is_empty() {
                return Err(StatsError::InsufficientData(format!(
                    "sigma clipping at {}σ rejected all {n_input} values",
                    self.sigma
                )));
            }
            if kept.len() == before {
                break;
            }
        }

        debug!(
            "sigma clip: kept {}/{} values after {} iteration(s)",
            kept.len(),
            n_input,
            iterations
        );
        Ok((kept, n_input, iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn test_uniform_sample_unchanged() {
        let values = vec![5.0; 100];
        let stats = SigmaClip::default().stats(&values).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.median, 5.0);
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.n_rejected, 0);
        assert_eq!(stats.iterations, 1);
    }

    #[test]
    fn test_single_outlier_rejected() {
        let mut values = vec![5.0; 400];
        values[17] = 1000.0;
        let stats = SigmaClip::default().stats(&values).unwrap();
        assert_eq!(stats.n_rejected, 1);
        assert_relative_eq!(stats.median, 5.0);
        assert_relative_eq!(stats.mean, 5.0);
    }

    #[test]
    fn test_clip_preserves_order() {
        let values = [1.0, 2.0, 1.5, 500.0, 1.2, 1.8, 1.1, 1.9, 1.4, 1.6];
        let kept = SigmaClip::default().clip(&values).unwrap();
        assert_eq!(kept, vec![1.0, 2.0, 1.5, 1.2, 1.8, 1.1, 1.9, 1.4, 1.6]);
    }

    #[test]
    fn test_gaussian_with_contamination() {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(100.0, 2.0).unwrap();
        let mut values: Vec<f64> = (0..2000).map(|_| normal.sample(&mut rng)).collect();
        for v in values.iter_mut().take(40) {
            *v += 500.0;
        }

        let stats = SigmaClip::default().stats(&values).unwrap();
        assert!(stats.n_rejected >= 40);
        assert!((stats.median - 100.0).abs() < 0.3, "median {}", stats.median);
        assert!((stats.std - 2.0).abs() < 0.3, "std {}", stats.std);
    }

    #[test]
    fn test_iteration_limit_respected() {
        let values: Vec<f64> = (0..50).map(|i| (i as f64).powi(3)).collect();
        let clip = SigmaClip::new(1.0, Some(1)).unwrap();
        let stats = clip.stats(&values).unwrap();
        assert_eq!(stats.iterations, 1);
    }

    #[test]
    fn test_zero_iterations_returns_input() {
        let values = [1.0, 2.0, 1000.0];
        let clip = SigmaClip::new(3.0, Some(0)).unwrap();
        assert_eq!(clip.clip(&values).unwrap(), values.to_vec());
    }

    #[test]
    fn test_invalid_sigma() {
        assert!(matches!(
            SigmaClip::new(0.0, Some(5)),
            Err(StatsError::InvalidParameter(_))
        ));
        assert!(SigmaClip::new(f64::NAN, None).is_err());
    }

    #[test]
    fn test_every_value_rejected() {
        // Median 5 and std 5: a 0.1σ window around the median holds nothing
        let clip = SigmaClip::new(0.1, Some(5)).unwrap();
        assert!(matches!(
            clip.stats(&[0.0, 10.0]),
            Err(StatsError::InsufficientData(_))
        ));
        assert!(clip.clip(&[0.0, 10.0]).is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            SigmaClip::default().stats(&[]),
            Err(StatsError::InsufficientData(_))
        ));
    }
}
