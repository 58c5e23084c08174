#![allow(non_snake_case)]
pub mod glm;
pub mod sdca;

use faer::{Mat, MatRef};
use faer_traits::RealField;
use num::Float;

/// Errors surfaced by model construction and by the numerically sensitive
/// per-sample computations. Construction-time violations fail fast; the hot
/// per-sample SDCA update never returns these (degenerate samples are a
/// logged no-op instead).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlmErrors {
    /// Label / feature-row count mismatch, or a wrongly sized vector handed
    /// to a bulk operation.
    InvalidDimension,
    /// A Poisson linear predictor went non-positive under the identity link
    /// where a log or reciprocal of it is required.
    DomainError,
    /// A parameter violated its contract, e.g. negative regularization
    /// strength.
    PreconditionViolation,
    Other(String),
}

impl std::fmt::Display for GlmErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDimension => write!(f, "Dimension mismatch."),
            Self::DomainError => write!(
                f,
                "Linear predictor left the domain of the loss (non-positive under identity link)."
            ),
            Self::PreconditionViolation => write!(f, "Parameter precondition violated."),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for GlmErrors {}

/// Read-only features matrix plus one label per row, shared by a model and
/// the SDCA engine for the duration of one fit.
pub struct Dataset<T: RealField + Float> {
    features: Mat<T>,
    labels: Vec<T>,
}

impl<T: RealField + Float> Dataset<T> {
    pub fn new(features: Mat<T>, labels: Vec<T>) -> Result<Self, GlmErrors> {
        if labels.len() != features.nrows() {
            return Err(GlmErrors::InvalidDimension);
        }
        Ok(Dataset { features, labels })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> MatRef<T> {
        self.features.as_ref()
    }

    pub fn label(&self, i: usize) -> T {
        self.labels[i]
    }

    pub fn labels(&self) -> &[T] {
        &self.labels
    }

    /// Squared L2 norm of feature row `i`.
    pub fn row_norm_sq(&self, i: usize) -> T {
        let mut acc = T::zero();
        for j in 0..self.features.ncols() {
            let v = *self.features.get(i, j);
            acc = acc + v * v;
        }
        acc
    }
}
