pub mod l2sq;
pub mod zero;

pub use l2sq::ProxL2Sq;
pub use zero::ProxZero;

use crate::linear::GlmErrors;
use faer_traits::RealField;
use num::Float;

/// A separable proximal operator acting on a coefficient vector, coordinate
/// by coordinate, over an optional `[start, end)` range. Coordinates outside
/// the range are left untouched. Operators hold no mutable state, so a single
/// instance can be shared across calls and threads.
pub trait ProxSeparable<T: RealField + Float>: Send + Sync {
    /// The configured coordinate range, or None for the full vector.
    fn range(&self) -> Option<(usize, usize)>;

    /// The range actually applied to a vector of length `len`. The configured
    /// range is clamped so an operator built for a longer vector is still
    /// safe to call.
    fn effective_range(&self, len: usize) -> (usize, usize) {
        match self.range() {
            Some((start, end)) => (start.min(len), end.min(len)),
            None => (0, len),
        }
    }

    /// Scalar proximal map of the regularization term scaled by `step`.
    fn call_single(&self, x: T, step: T) -> T;

    /// Applies the scalar map as if called `n_times` in immediate succession
    /// without intervening changes to `x`. Used by lazy/delayed update
    /// schemes in asynchronous solvers. Variants with a closed form for the
    /// repeated map should override this.
    fn call_single_with_repeat(&self, x: T, step: T, n_times: usize) -> T {
        let mut out = x;
        for _ in 0..n_times {
            out = self.call_single(out, step);
        }
        out
    }

    /// Applies the operator in place over the configured range.
    fn call(&self, coeffs: &mut [T], step: T) {
        let (start, end) = self.effective_range(coeffs.len());
        for x in coeffs[start..end].iter_mut() {
            *x = self.call_single(*x, step);
        }
    }

    /// Penalty value over `[start, end)`, for objective reporting.
    fn value(&self, coeffs: &[T], start: usize, end: usize) -> T;
}

/// Strength must be non-negative for every member of the family except
/// [`ProxZero`], which ignores it.
pub(crate) fn check_strength<T: RealField + Float>(strength: T) -> Result<T, GlmErrors> {
    if strength < T::zero() {
        Err(GlmErrors::PreconditionViolation)
    } else {
        Ok(strength)
    }
}
