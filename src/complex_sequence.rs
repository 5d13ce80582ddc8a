//! Fixed-length paired (real, imaginary) arrays.
//!
//! A [`ComplexSequence`] doubles as an `(x, y)` point cloud for a time series
//! and as true complex data for the transform kernel. The destructive
//! operations take `self` and hand back the transformed sequence, so a caller
//! that still needs the input has to clone it explicitly.

use crate::metadata::NaAction;
use num_complex::Complex64;

/// Elementwise tolerance used by `PartialEq`.
pub const EQUALITY_EPSILON: f64 = 1e-6;

/// Paired real/imaginary arrays of equal length with cached extrema.
#[derive(Debug, Clone)]
pub struct ComplexSequence {
    re: Vec<f64>,
    im: Vec<f64>,
    re_range: (f64, f64),
    im_range: (f64, f64),
}

impl ComplexSequence {
    /// Build from real and imaginary parts.
    ///
    /// # Panics
    /// If the two arrays differ in length.
    pub fn new(re: Vec<f64>, im: Vec<f64>) -> Self {
        assert_eq!(
            re.len(),
            im.len(),
            "real and imaginary parts must have equal length"
        );
        let re_range = min_max(&re);
        let im_range = min_max(&im);
        Self {
            re,
            im,
            re_range,
            im_range,
        }
    }

    /// All-zero sequence of length `n`.
    pub fn zeros(n: usize) -> Self {
        Self::new(vec![0.0; n], vec![0.0; n])
    }

    /// Real-valued sequence with a zero imaginary part.
    pub fn from_real(values: &[f64]) -> Self {
        Self::new(values.to_vec(), vec![0.0; values.len()])
    }

    /// Point cloud: `re` holds x coordinates, `im` holds y coordinates.
    pub fn from_points(x: &[f64], y: &[f64]) -> Self {
        Self::new(x.to_vec(), y.to_vec())
    }

    /// Build from `num_complex` values.
    pub fn from_complex(values: &[Complex64]) -> Self {
        let re = values.iter().map(|c| c.re).collect();
        let im = values.iter().map(|c| c.im).collect();
        Self::new(re, im)
    }

    /// Convert to `num_complex` values.
    pub fn to_complex_vec(&self) -> Vec<Complex64> {
        self.re
            .iter()
            .zip(&self.im)
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.re.len()
    }

    /// True for a zero-length sequence.
    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Real parts.
    pub fn re(&self) -> &[f64] {
        &self.re
    }

    /// Imaginary parts.
    pub fn im(&self) -> &[f64] {
        &self.im
    }

    /// Copy of the real parts.
    pub fn real_part(&self) -> Vec<f64> {
        self.re.clone()
    }

    /// Split into `(re, im)`.
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.re, self.im)
    }

    /// Smallest real part, NaN entries ignored (NaN if none remain).
    pub fn min_re(&self) -> f64 {
        self.re_range.0
    }

    /// Largest real part, NaN entries ignored.
    pub fn max_re(&self) -> f64 {
        self.re_range.1
    }

    /// Smallest imaginary part, NaN entries ignored.
    pub fn min_im(&self) -> f64 {
        self.im_range.0
    }

    /// Largest imaginary part, NaN entries ignored.
    pub fn max_im(&self) -> f64 {
        self.im_range.1
    }

    /// Complex conjugate.
    pub fn conjugate(mut self) -> Self {
        for v in &mut self.im {
            *v = -*v;
        }
        Self::new(self.re, self.im)
    }

    /// Elementwise complex product with `other`.
    ///
    /// # Panics
    /// If the sequences differ in length.
    pub fn point_wise_product(mut self, other: &ComplexSequence) -> Self {
        assert_eq!(
            self.len(),
            other.len(),
            "point-wise product requires equal lengths"
        );
        for i in 0..self.re.len() {
            let (a, b) = (self.re[i], self.im[i]);
            let (c, d) = (other.re[i], other.im[i]);
            self.re[i] = a * c - b * d;
            self.im[i] = a * d + b * c;
        }
        Self::new(self.re, self.im)
    }

    /// Multiply every element by a real factor.
    pub fn scale(mut self, factor: f64) -> Self {
        self.re.iter_mut().for_each(|v| *v *= factor);
        self.im.iter_mut().for_each(|v| *v *= factor);
        Self::new(self.re, self.im)
    }

    /// Round both parts to `digits` decimal places.
    pub fn round_precision(mut self, digits: i32) -> Self {
        let factor = 10f64.powi(digits);
        let round = |v: &mut f64| *v = (*v * factor).round() / factor;
        self.re.iter_mut().for_each(round);
        self.im.iter_mut().for_each(round);
        Self::new(self.re, self.im)
    }

    /// Replace NaN entries with zero when `action` asks for it.
    pub fn apply_na_action(mut self, action: NaAction) -> Self {
        if action == NaAction::ReplaceWithZero {
            for v in self.re.iter_mut().chain(self.im.iter_mut()) {
                if v.is_nan() {
                    *v = 0.0;
                }
            }
            return Self::new(self.re, self.im);
        }
        self
    }

    /// Apply `f` to every real part.
    pub fn map_re(mut self, f: impl Fn(f64) -> f64) -> Self {
        self.re.iter_mut().for_each(|v| *v = f(*v));
        Self::new(self.re, self.im)
    }
}

impl PartialEq for ComplexSequence {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let close = |a: f64, b: f64| (a.is_nan() && b.is_nan()) || (a - b).abs() <= EQUALITY_EPSILON;
        self.re.iter().zip(&other.re).all(|(&a, &b)| close(a, b))
            && self.im.iter().zip(&other.im).all(|(&a, &b)| close(a, b))
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::NAN, f64::NAN), |(lo, hi), &v| {
            (if lo.is_nan() { v } else { lo.min(v) }, if hi.is_nan() { v } else { hi.max(v) })
        })
}
