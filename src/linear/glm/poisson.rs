use super::LinkType;
use crate::linear::{Dataset, GlmErrors};
use faer::{Mat, MatRef};
use faer_traits::RealField;
use itertools::Itertools;
use num::Float;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Poisson regression model over a fixed dataset. Holds the per-sample loss
/// and gradient-factor formulas for both link types, plus the lazy caches the
/// SDCA engine relies on: per-row squared feature norms and, under the
/// identity link, the map from compact sampling indices to the rows with a
/// strictly positive label.
///
/// The caches use a write-once discipline (`OnceLock`), so a shared `&self`
/// can race on first use without rebuilding or tearing.
pub struct PoissonReg<T: RealField + Float> {
    data: Dataset<T>,
    link_type: LinkType,
    fit_intercept: bool,
    /// Advisory degree of parallelism for bulk operations, 0 means "let
    /// rayon decide". Not part of the persisted state.
    n_threads: usize,
    features_norm_sq: OnceLock<Vec<T>>,
    non_zero_labels: OnceLock<Arc<Vec<usize>>>,
}

/// Round-trippable snapshot of a [`PoissonReg`], for the surrounding
/// persistence layer. Deserialization always supplies a fully formed value:
/// "not yet computed" is the `None` variant, never a stale buffer behind a
/// readiness flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoissonRegState {
    pub link_type: LinkType,
    pub fit_intercept: bool,
    pub non_zero_labels: Option<Vec<usize>>,
}

impl<T: RealField + Float> PoissonReg<T> {
    pub fn new(
        features: Mat<T>,
        labels: Vec<T>,
        link_type: LinkType,
        fit_intercept: bool,
        n_threads: usize,
    ) -> Result<Self, GlmErrors> {
        Ok(PoissonReg {
            data: Dataset::new(features, labels)?,
            link_type,
            fit_intercept,
            n_threads,
            features_norm_sq: OnceLock::new(),
            non_zero_labels: OnceLock::new(),
        })
    }

    /// Rebuilds a model from a persisted snapshot. The cached index map, if
    /// present in the snapshot, is installed as-is.
    pub fn with_state(
        features: Mat<T>,
        labels: Vec<T>,
        state: PoissonRegState,
        n_threads: usize,
    ) -> Result<Self, GlmErrors> {
        let model = Self::new(
            features,
            labels,
            state.link_type,
            state.fit_intercept,
            n_threads,
        )?;
        if let Some(map) = state.non_zero_labels {
            let _ = model.non_zero_labels.set(Arc::new(map));
        }
        Ok(model)
    }

    pub fn state(&self) -> PoissonRegState {
        PoissonRegState {
            link_type: self.link_type,
            fit_intercept: self.fit_intercept,
            non_zero_labels: self.non_zero_labels.get().map(|m| m.as_ref().clone()),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.data.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.data.n_features()
    }

    /// Number of coefficients, the intercept included when fit.
    pub fn n_coeffs(&self) -> usize {
        self.data.n_features() + self.fit_intercept as usize
    }

    pub fn use_intercept(&self) -> bool {
        self.fit_intercept
    }

    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    pub fn features(&self) -> MatRef<T> {
        self.data.features()
    }

    pub fn label(&self, i: usize) -> T {
        self.data.label(i)
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Changing the link changes which samples are eligible for SDCA, so the
    /// cached index map is dropped.
    pub fn set_link_type(&mut self, link_type: LinkType) {
        if self.link_type != link_type {
            self.link_type = link_type;
            self.non_zero_labels = OnceLock::new();
        }
    }

    /// Inner product of feature row `i` with `coeffs`, the intercept
    /// coordinate (last) added in when fit. `coeffs` must have `n_coeffs`
    /// entries.
    pub fn inner_prod(&self, i: usize, coeffs: &[T]) -> T {
        debug_assert_eq!(coeffs.len(), self.n_coeffs());
        let X = self.data.features();
        let mut acc = T::zero();
        for j in 0..self.data.n_features() {
            acc = acc + *X.get(i, j) * coeffs[j];
        }
        if self.fit_intercept {
            acc = acc + coeffs[self.data.n_features()];
        }
        acc
    }

    /// Per-sample Poisson negative log-likelihood, up to the additive
    /// `ln(y!)` term which does not depend on the coefficients.
    pub fn loss_i(&self, i: usize, coeffs: &[T]) -> Result<T, GlmErrors> {
        let z = self.inner_prod(i, coeffs);
        let label = self.data.label(i);
        match self.link_type {
            LinkType::Exponential => Ok(z.exp() - label * z),
            LinkType::Identity => {
                // The rate is the predictor itself and must stay in the
                // domain of the log for positive labels.
                if z < T::zero() || (z == T::zero() && label > T::zero()) {
                    Err(GlmErrors::DomainError)
                } else if label > T::zero() {
                    Ok(z - label * z.ln())
                } else {
                    Ok(z)
                }
            }
        }
    }

    /// Scalar `g` such that the gradient of `loss_i` is `g * x_i` (with an
    /// implicit trailing `1` in `x_i` when an intercept is fit).
    pub fn grad_i_factor(&self, i: usize, coeffs: &[T]) -> Result<T, GlmErrors> {
        let z = self.inner_prod(i, coeffs);
        let label = self.data.label(i);
        match self.link_type {
            LinkType::Exponential => Ok(z.exp() - label),
            LinkType::Identity => {
                if z <= T::zero() {
                    Err(GlmErrors::DomainError)
                } else {
                    Ok(T::one() - label / z)
                }
            }
        }
    }

    /// Squared feature-row norms, computed once on first use.
    pub fn features_norm_sq(&self) -> &[T] {
        self.features_norm_sq.get_or_init(|| {
            (0..self.data.n_samples())
                .map(|i| self.data.row_norm_sq(i))
                .collect_vec()
        })
    }

    /// Mapping from the compact sampling index used by SDCA to the true row
    /// index. Under the exponential link every sample is eligible and `None`
    /// is returned (the canonical map `i -> i` is assumed). Under the
    /// identity link the dual of a zero-labeled sample is degenerate, so only
    /// rows with a strictly positive label are retained, in ascending order.
    /// Built once per (model, link type); repeated calls return the same
    /// cached map.
    pub fn get_sdca_index_map(&self) -> Option<Arc<Vec<usize>>> {
        match self.link_type {
            LinkType::Exponential => None,
            LinkType::Identity => {
                let map = self.non_zero_labels.get_or_init(|| {
                    Arc::new(
                        self.data
                            .labels()
                            .iter()
                            .positions(|y| *y > T::zero())
                            .collect_vec(),
                    )
                });
                Some(Arc::clone(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_sample_model(link_type: LinkType) -> PoissonReg<f64> {
        // features [[1, 2], [3, 1]], labels [0, 2]
        let X = Mat::from_fn(2, 2, |i, j| [[1.0, 2.0], [3.0, 1.0]][i][j]);
        PoissonReg::new(X, vec![0.0, 2.0], link_type, false, 1).unwrap()
    }

    #[test]
    fn test_dimension_mismatch_at_construction() {
        let X = Mat::<f64>::zeros(3, 2);
        let out = PoissonReg::new(X, vec![1.0, 2.0], LinkType::Exponential, true, 1);
        assert!(matches!(out, Err(GlmErrors::InvalidDimension)));
    }

    #[test]
    fn test_index_map_identity_link() {
        let model = two_sample_model(LinkType::Identity);
        let map = model.get_sdca_index_map().unwrap();
        assert_eq!(*map, vec![1]);
    }

    #[test]
    fn test_index_map_exponential_link() {
        let model = two_sample_model(LinkType::Exponential);
        assert!(model.get_sdca_index_map().is_none());
    }

    #[test]
    fn test_index_map_is_cached() {
        let model = two_sample_model(LinkType::Identity);
        let first = model.get_sdca_index_map().unwrap();
        let second = model.get_sdca_index_map().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_set_link_type_invalidates_map() {
        let mut model = two_sample_model(LinkType::Identity);
        assert_eq!(*model.get_sdca_index_map().unwrap(), vec![1]);
        model.set_link_type(LinkType::Exponential);
        assert!(model.get_sdca_index_map().is_none());
        model.set_link_type(LinkType::Identity);
        assert_eq!(*model.get_sdca_index_map().unwrap(), vec![1]);
    }

    #[test]
    fn test_inner_prod_with_intercept() {
        let X = Mat::from_fn(1, 2, |_, j| (j + 1) as f64);
        let model = PoissonReg::new(X, vec![1.0], LinkType::Identity, true, 1).unwrap();
        assert_eq!(model.n_coeffs(), 3);
        // 1 * 0.5 + 2 * 0.25 + 0.1
        assert_relative_eq!(model.inner_prod(0, &[0.5, 0.25, 0.1]), 1.1);
    }

    #[test]
    fn test_grad_i_factor_identity_guards_domain() {
        let model = two_sample_model(LinkType::Identity);
        // row 1 = [3, 1], coeffs [1, 1] -> z = 4, label = 2
        let g = model.grad_i_factor(1, &[1.0, 1.0]).unwrap();
        assert_relative_eq!(g, 1.0 - 2.0 / 4.0);
        // z approaching zero from above stays finite
        let g = model.grad_i_factor(1, &[1e-12, 0.0]).unwrap();
        assert!(g.is_finite());
        // non-positive predictor is a domain error, not NaN/Inf
        assert!(matches!(
            model.grad_i_factor(1, &[0.0, 0.0]),
            Err(GlmErrors::DomainError)
        ));
        assert!(matches!(
            model.grad_i_factor(1, &[-1.0, 0.0]),
            Err(GlmErrors::DomainError)
        ));
    }

    #[test]
    fn test_grad_i_factor_exponential() {
        let model = two_sample_model(LinkType::Exponential);
        // row 0 = [1, 2], coeffs [-1, 0] -> z = -1, label = 0
        let g = model.grad_i_factor(0, &[-1.0, 0.0]).unwrap();
        assert_relative_eq!(g, (-1.0f64).exp());
    }

    #[test]
    fn test_loss_i_both_links() {
        let model = two_sample_model(LinkType::Exponential);
        // row 1, coeffs [0, 0] -> z = 0, loss = exp(0) - 2 * 0 = 1
        assert_relative_eq!(model.loss_i(1, &[0.0, 0.0]).unwrap(), 1.0);

        let model = two_sample_model(LinkType::Identity);
        // row 1 -> z = 4, loss = 4 - 2 ln 4
        assert_relative_eq!(
            model.loss_i(1, &[1.0, 1.0]).unwrap(),
            4.0 - 2.0 * 4.0f64.ln()
        );
        // zero label, zero predictor: loss is just z = 0
        assert_relative_eq!(model.loss_i(0, &[0.0, 0.0]).unwrap(), 0.0);
        // positive label needs a strictly positive predictor
        assert!(model.loss_i(1, &[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let model = two_sample_model(LinkType::Identity);
        let _ = model.get_sdca_index_map();
        let state = model.state();
        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: PoissonRegState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.non_zero_labels, Some(vec![1]));

        let X = Mat::from_fn(2, 2, |i, j| [[1.0, 2.0], [3.0, 1.0]][i][j]);
        let restored = PoissonReg::with_state(X, vec![0.0, 2.0], decoded, 1).unwrap();
        assert_eq!(restored.link_type(), LinkType::Identity);
        assert_eq!(*restored.get_sdca_index_map().unwrap(), vec![1]);
    }

    #[test]
    fn test_f32_instantiation() {
        let X = Mat::<f32>::from_fn(2, 2, |i, j| (i + j) as f32);
        let model = PoissonReg::new(X, vec![1.0f32, 2.0], LinkType::Exponential, false, 1).unwrap();
        let g = model.grad_i_factor(1, &[0.5, 0.5]).unwrap();
        assert_relative_eq!(g, (1.5f32).exp() - 2.0, max_relative = 1e-6);
    }
}
