use super::{check_strength, ProxSeparable};
use crate::linear::GlmErrors;
use faer_traits::RealField;
use num::Float;
use serde::{Deserialize, Serialize};

/// Proximal operator of the squared L2 (Ridge) penalty
/// `strength * 0.5 * ||x||^2`. The scalar map is a multiplicative
/// shrinkage, so the repeated form has a closed form as a power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxL2Sq<T: RealField + Float> {
    strength: T,
    range: Option<(usize, usize)>,
}

impl<T: RealField + Float> ProxL2Sq<T> {
    pub fn new(strength: T) -> Result<Self, GlmErrors> {
        Ok(ProxL2Sq {
            strength: check_strength(strength)?,
            range: None,
        })
    }

    pub fn with_range(strength: T, start: usize, end: usize) -> Result<Self, GlmErrors> {
        Ok(ProxL2Sq {
            strength: check_strength(strength)?,
            range: Some((start, end)),
        })
    }

    pub fn strength(&self) -> T {
        self.strength
    }
}

impl<T: RealField + Float> ProxSeparable<T> for ProxL2Sq<T> {
    fn range(&self) -> Option<(usize, usize)> {
        self.range
    }

    fn call_single(&self, x: T, step: T) -> T {
        x / (T::one() + step * self.strength)
    }

    fn call_single_with_repeat(&self, x: T, step: T, n_times: usize) -> T {
        // n successive shrinkages collapse into one power.
        x / (T::one() + step * self.strength).powi(n_times as i32)
    }

    fn value(&self, coeffs: &[T], start: usize, end: usize) -> T {
        let half = T::from(0.5).unwrap();
        let sum_sq = coeffs[start..end]
            .iter()
            .fold(T::zero(), |acc, x| acc + *x * *x);
        self.strength * half * sum_sq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_negative_strength_is_rejected() {
        assert!(matches!(
            ProxL2Sq::new(-0.1f64),
            Err(GlmErrors::PreconditionViolation)
        ));
        assert!(ProxL2Sq::new(0.0f64).is_ok());
    }

    #[test]
    fn test_l2sq_shrinks_toward_zero() {
        let prox = ProxL2Sq::new(2.0f64).unwrap();
        let mut coeffs = vec![4.0, -2.0, 0.0];
        prox.call(&mut coeffs, 0.5);
        // 1 + 0.5 * 2 = 2
        assert_relative_eq!(coeffs[0], 2.0);
        assert_relative_eq!(coeffs[1], -1.0);
        assert_relative_eq!(coeffs[2], 0.0);
    }

    #[test]
    fn test_repeat_matches_iterated_calls() {
        let prox = ProxL2Sq::new(0.3f64).unwrap();
        let step = 0.7;
        let mut iterated = 1.9;
        for n in 0..12usize {
            assert_relative_eq!(
                prox.call_single_with_repeat(1.9, step, n),
                iterated,
                max_relative = 1e-12
            );
            iterated = prox.call_single(iterated, step);
        }
    }

    #[test]
    fn test_value_over_subrange() {
        let prox = ProxL2Sq::new(3.0f64).unwrap();
        let coeffs = vec![1.0, 2.0, 3.0];
        assert_relative_eq!(prox.value(&coeffs, 1, 3), 3.0 * 0.5 * 13.0);
        assert_relative_eq!(prox.value(&coeffs, 0, 0), 0.0);
    }

    #[test]
    fn test_ranged_call_leaves_outside_unchanged() {
        let prox = ProxL2Sq::with_range(1.0f32, 0, 1).unwrap();
        let mut coeffs = vec![2.0f32, 2.0];
        prox.call(&mut coeffs, 1.0);
        assert_eq!(coeffs[0], 1.0);
        assert_eq!(coeffs[1], 2.0);
    }
}
