//! Significance test for Pearson correlations.
//!
//! For a window of `n` samples the statistic `t = r * sqrt((n - 2) / (1 - r²))`
//! follows a Student-t distribution with `n - 2` degrees of freedom. The
//! critical t-value for a two-tailed test is found once per tester by
//! bisection over the t CDF and mapped back to a critical correlation
//! `r_c = t_c / sqrt(df + t_c²)`, so each test afterwards is one comparison.

use crate::errors::{validate_open_interval, CorrelogramError, CorrelogramResult};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Required agreement between the two-tailed mass and `1 - alpha`.
const MASS_TOLERANCE: f64 = 1e-10;
/// Bisection steps after bracketing.
const MAX_BISECTIONS: usize = 200;
/// Upper bound for the bracketing search.
const MAX_T: f64 = 1e15;

/// Precomputed significance threshold for one `(sample_size, level)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceTester {
    sample_size: usize,
    significance_level: f64,
    critical_t: f64,
    critical_r: f64,
}

impl SignificanceTester {
    /// Build a tester for correlations over `sample_size` samples.
    ///
    /// With fewer than three samples there are no degrees of freedom left and
    /// no correlation is ever reported as significant.
    pub fn new(sample_size: usize, significance_level: f64) -> CorrelogramResult<Self> {
        validate_open_interval(significance_level, 0.0, 1.0, "significance_level")?;

        if sample_size < 3 {
            return Ok(Self {
                sample_size,
                significance_level,
                critical_t: f64::INFINITY,
                critical_r: f64::INFINITY,
            });
        }

        let df = (sample_size - 2) as f64;
        let critical_t = critical_t_value(df, significance_level)?;
        let critical_r = critical_t / (df + critical_t * critical_t).sqrt();
        Ok(Self {
            sample_size,
            significance_level,
            critical_t,
            critical_r,
        })
    }

    /// Sample size the tester was built for.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Significance level the tester was built for.
    pub fn significance_level(&self) -> f64 {
        self.significance_level
    }

    /// Two-tailed critical t-value.
    pub fn critical_t(&self) -> f64 {
        self.critical_t
    }

    /// Smallest correlation that counts as significantly positive.
    pub fn critical_correlation_value(&self) -> f64 {
        self.critical_r
    }

    /// `r >= r_c`. NaN is never significant.
    #[inline]
    pub fn significance_test(&self, r: f64) -> bool {
        r >= self.critical_r
    }

    /// `r <= -r_c`.
    #[inline]
    pub fn is_significant_negative(&self, r: f64) -> bool {
        r <= -self.critical_r
    }

    /// `|r| >= r_c`.
    #[inline]
    pub fn is_significant(&self, r: f64) -> bool {
        r.abs() >= self.critical_r
    }
}

/// Two-tailed critical t-value: the `t` with `P(-t < T < t) = 1 - alpha`.
///
/// Brackets the root by doubling from `t = 1`, then bisects until the mass
/// matches within 1e-10.
pub fn critical_t_value(degrees_of_freedom: f64, alpha: f64) -> CorrelogramResult<f64> {
    validate_open_interval(alpha, 0.0, 1.0, "alpha")?;
    let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|e| {
        CorrelogramError::InvalidParameter {
            parameter: "degrees_of_freedom".to_string(),
            value: degrees_of_freedom,
            constraint: format!("must be > 0 ({})", e),
        }
    })?;

    let target = 1.0 - alpha;
    let mass = |t: f64| dist.cdf(t) - dist.cdf(-t);

    let mut lo = 0.0;
    let mut hi = 1.0;
    while mass(hi) < target {
        lo = hi;
        hi *= 2.0;
        if hi > MAX_T {
            return Err(CorrelogramError::NumericalError {
                reason: format!(
                    "critical t-value for alpha={} and df={} exceeds {}",
                    alpha, degrees_of_freedom, MAX_T
                ),
            });
        }
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        let m = mass(mid);
        if (m - target).abs() < MASS_TOLERANCE {
            return Ok(mid);
        }
        if m < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_known_critical_values() {
        // Two-tailed t table: df=8, alpha=0.05 -> 2.306; df=20, alpha=0.01 -> 2.845.
        assert_approx_eq!(critical_t_value(8.0, 0.05).unwrap(), 2.306, 1e-3);
        assert_approx_eq!(critical_t_value(20.0, 0.01).unwrap(), 2.845, 1e-3);

        // Pearson table: n=10, alpha=0.05 -> 0.632.
        let tester = SignificanceTester::new(10, 0.05).unwrap();
        assert_approx_eq!(tester.critical_correlation_value(), 0.632, 1e-3);
    }

    #[test]
    fn test_critical_correlation_decreases_with_level() {
        for &n in &[4usize, 10, 50, 200] {
            let mut previous = f64::INFINITY;
            for level in [0.001, 0.01, 0.05, 0.1, 0.2, 0.5, 0.9] {
                let r = SignificanceTester::new(n, level)
                    .unwrap()
                    .critical_correlation_value();
                assert!(r < previous, "n={} level={} r={} previous={}", n, level, r, previous);
                assert!(r > 0.0 && r < 1.0);
                previous = r;
            }
        }
    }

    #[test]
    fn test_agrees_with_direct_t_test() {
        let n = 25;
        let alpha = 0.05;
        let df = (n - 2) as f64;
        let tester = SignificanceTester::new(n, alpha).unwrap();
        let dist = StudentsT::new(0.0, 1.0, df).unwrap();
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..100_000 {
            let r: f64 = rng.gen_range(-0.999..0.999);
            if (r.abs() - tester.critical_correlation_value()).abs() < 1e-6 {
                continue;
            }
            let t = r * (df / (1.0 - r * r)).sqrt();
            let p = 2.0 * (1.0 - dist.cdf(t.abs()));
            let direct = p < alpha;
            assert_eq!(tester.is_significant(r), direct, "r={} p={}", r, p);
            assert_eq!(tester.significance_test(r), direct && r > 0.0, "r={}", r);
            assert_eq!(tester.is_significant_negative(r), direct && r < 0.0, "r={}", r);
        }
    }

    #[test]
    fn test_nan_and_tiny_samples() {
        let tester = SignificanceTester::new(10, 0.05).unwrap();
        assert!(!tester.significance_test(f64::NAN));
        assert!(!tester.is_significant_negative(f64::NAN));
        assert!(!tester.is_significant(f64::NAN));

        let degenerate = SignificanceTester::new(2, 0.05).unwrap();
        assert!(!degenerate.significance_test(1.0));
        assert!(!degenerate.is_significant_negative(-1.0));
    }

    #[test]
    fn test_rejects_invalid_level() {
        assert!(SignificanceTester::new(10, 0.0).is_err());
        assert!(SignificanceTester::new(10, 1.0).is_err());
        assert!(SignificanceTester::new(10, f64::NAN).is_err());
    }
}
