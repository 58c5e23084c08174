use super::ProxSeparable;
use faer_traits::RealField;
use num::Float;
use serde::{Deserialize, Serialize};

/// The "no regularization" operator: the identity map with a penalty of zero.
/// It is the structural baseline the rest of the family is compared against,
/// and the fixed point every step size shares. The strength parameter is
/// accepted for uniformity with the rest of the family and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxZero<T: RealField + Float> {
    strength: T,
    range: Option<(usize, usize)>,
}

impl<T: RealField + Float> ProxZero<T> {
    pub fn new(strength: T) -> Self {
        ProxZero {
            strength,
            range: None,
        }
    }

    pub fn with_range(strength: T, start: usize, end: usize) -> Self {
        ProxZero {
            strength,
            range: Some((start, end)),
        }
    }
}

impl<T: RealField + Float> ProxSeparable<T> for ProxZero<T> {
    fn range(&self) -> Option<(usize, usize)> {
        self.range
    }

    fn call_single(&self, x: T, _step: T) -> T {
        x
    }

    fn call_single_with_repeat(&self, x: T, _step: T, _n_times: usize) -> T {
        // Repetition of the identity is the identity.
        x
    }

    fn value(&self, _coeffs: &[T], _start: usize, _end: usize) -> T {
        T::zero()
    }
}
