//! Radix-2 discrete Fourier transform and correlation kernels.
//!
//! The transform is an iterative Cooley-Tukey FFT over a bit-reverse-copied,
//! zero-padded buffer. Cross-correlation multiplies the conjugated spectrum of
//! the first input with the spectrum of the second and transforms back, which
//! yields the circular correlation `r[k] = sum_i a[i] * b[(i + k) mod n]`.
//! Windows whose length is not a power of two go through the O(w²)
//! brute-force kernel instead, which computes the same circular quantity.
//!
//! Twiddle tables are cached per `(size, direction)` in a bounded LRU so that
//! repeated transforms of the same length do not recompute `sin`/`cos`.

use crate::complex_sequence::ComplexSequence;
use crate::metadata::NaAction;
use lru::LruCache;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex};

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Time to frequency, kernel `exp(-2πi jk/n)`.
    Forward,
    /// Frequency to time, kernel `exp(+2πi jk/n)`, output divided by `n`.
    Inverse,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct TwiddleKey {
    size: usize,
    direction: Direction,
}

/// Maximum number of cached twiddle tables.
const MAX_CACHE_ENTRIES: usize = 64;

static TWIDDLE_CACHE: LazyLock<Mutex<LruCache<TwiddleKey, Arc<Vec<Complex64>>>>> =
    LazyLock::new(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(MAX_CACHE_ENTRIES).unwrap_or(NonZeroUsize::MIN),
        ))
    });

/// Twiddle factors `w^k` for `k < size / 2`.
fn twiddles(size: usize, direction: Direction) -> Arc<Vec<Complex64>> {
    let key = TwiddleKey { size, direction };

    let mut cache = match TWIDDLE_CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(table) = cache.get(&key) {
        return Arc::clone(table);
    }

    let sign = match direction {
        Direction::Forward => -1.0,
        Direction::Inverse => 1.0,
    };
    let table: Arc<Vec<Complex64>> = Arc::new(
        (0..size / 2)
            .map(|k| Complex64::from_polar(1.0, sign * 2.0 * PI * k as f64 / size as f64))
            .collect(),
    );
    cache.put(key, Arc::clone(&table));
    table
}

/// Drop all cached twiddle tables.
pub fn clear_twiddle_cache() {
    match TWIDDLE_CACHE.lock() {
        Ok(mut cache) => cache.clear(),
        Err(poisoned) => poisoned.into_inner().clear(),
    }
}

/// Number of cached `(forward, inverse)` twiddle tables.
pub fn twiddle_cache_stats() -> (usize, usize) {
    let cache = match TWIDDLE_CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    cache.iter().fold((0, 0), |(fwd, inv), (key, _)| match key.direction {
        Direction::Forward => (fwd + 1, inv),
        Direction::Inverse => (fwd, inv + 1),
    })
}

/// Copy `input` into a zero-padded buffer of length `size` in bit-reversed order.
fn bit_reverse_copy(input: &ComplexSequence, size: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); size];
    if size == 1 {
        if let (Some(&re), Some(&im)) = (input.re().first(), input.im().first()) {
            out[0] = Complex64::new(re, im);
        }
        return out;
    }
    let shift = usize::BITS - size.trailing_zeros();
    for (i, (&re, &im)) in input.re().iter().zip(input.im()).enumerate() {
        out[i.reverse_bits() >> shift] = Complex64::new(re, im);
    }
    out
}

/// Forward or inverse DFT.
///
/// Sequences whose length is not a power of two are zero-padded to the next
/// power of two, so the output can be longer than the input; a warning is
/// logged when that happens. The inverse transform divides by the padded
/// length.
pub fn transform(direction: Direction, seq: ComplexSequence) -> ComplexSequence {
    let n = seq.len();
    if n == 0 {
        return seq;
    }
    let size = n.next_power_of_two();
    if size != n {
        log::warn!(
            "DFT input of length {} zero-padded to {}; output length differs from input",
            n,
            size
        );
    }

    let mut data = bit_reverse_copy(&seq, size);
    let table = twiddles(size, direction);

    let mut len = 2;
    while len <= size {
        let half = len / 2;
        let stride = size / len;
        for start in (0..size).step_by(len) {
            for k in 0..half {
                let w = table[k * stride];
                let u = data[start + k];
                let v = data[start + k + half] * w;
                data[start + k] = u + v;
                data[start + k + half] = u - v;
            }
        }
        len <<= 1;
    }

    if direction == Direction::Inverse {
        let scale = 1.0 / size as f64;
        for c in &mut data {
            *c *= scale;
        }
    }

    ComplexSequence::from_complex(&data)
}

/// Forward transform of a real-valued signal.
pub fn forward_real(values: &[f64]) -> ComplexSequence {
    transform(Direction::Forward, ComplexSequence::from_real(values))
}

/// Circular cross-correlation of two equal-length real sequences via FFT.
///
/// Returns `r[k] = sum_i a[i] * b[(i + k) mod n]` for `k < a.len()`. When
/// the length is not a power of two the inputs are zero-padded, so wrapping
/// happens modulo the padded length instead; callers that need exact circular
/// semantics for such lengths should use [`brute_force_cross_correlation`].
///
/// # Panics
/// If `a` and `b` differ in length.
pub fn cross_correlation(a: &[f64], b: &[f64], na_action: NaAction) -> Vec<f64> {
    assert_eq!(
        a.len(),
        b.len(),
        "cross-correlation requires equal-length inputs"
    );
    if a.is_empty() {
        return Vec::new();
    }
    let a = na_action.apply(a);
    let b = na_action.apply(b);

    let spectrum_a = forward_real(&a);
    let spectrum_b = forward_real(&b);
    let product = spectrum_a.conjugate().point_wise_product(&spectrum_b);
    let mut result = transform(Direction::Inverse, product).real_part();
    result.truncate(a.len());
    result
}

/// O(n²) circular cross-correlation, `r[k] = sum_i a[i] * b[(i + k) mod n]`.
///
/// # Panics
/// If `a` and `b` differ in length.
pub fn brute_force_cross_correlation(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(
        a.len(),
        b.len(),
        "cross-correlation requires equal-length inputs"
    );
    let n = a.len();
    (0..n)
        .map(|k| (0..n).map(|i| a[i] * b[(i + k) % n]).sum())
        .collect()
}

/// Cross-correlate consecutive windows of `a` and `b`.
///
/// Both series are split into windows of `window_size` samples (the last one
/// may be shorter). Power-of-two windows use the FFT path, the rest the
/// brute-force kernel. Results are concatenated in window order, so the
/// output has the same length as the inputs.
///
/// # Panics
/// If `a` and `b` differ in length or `window_size` is zero.
pub fn cross_correlation_windowed(
    a: &[f64],
    b: &[f64],
    window_size: usize,
    na_action: NaAction,
) -> Vec<f64> {
    assert_eq!(
        a.len(),
        b.len(),
        "cross-correlation requires equal-length inputs"
    );
    assert!(window_size > 0, "window size must be positive");

    let a = na_action.apply(a);
    let b = na_action.apply(b);

    let mut result = Vec::with_capacity(a.len());
    for (wa, wb) in a.chunks(window_size).zip(b.chunks(window_size)) {
        if wa.len().is_power_of_two() {
            result.extend(cross_correlation(wa, wb, NaAction::LeaveUnchanged));
        } else {
            result.extend(brute_force_cross_correlation(wa, wb));
        }
    }
    result
}
