//! SDCA dual-update engine for Poisson regression.
//!
//! One dual variable lives per training sample. Each visit to a sample
//! maximizes the 1-D restriction of the dual objective
//!
//! `D(a) = -phi*(-a) - ||x_i||^2 / (2 l n) * a^2 - a * <x_i, w_{-i}>`
//!
//! where `phi*` is the convex conjugate of the per-sample loss and `w_{-i}`
//! is the primal vector with sample `i`'s own contribution removed. The
//! identity link admits a closed-form (quadratic) solve; the exponential
//! link's stationarity condition is transcendental and is solved by a
//! safeguarded Newton iteration.

use super::glm::{LinkType, PoissonReg};
use super::GlmErrors;
use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};
use faer_traits::RealField;
use num::Float;
use std::sync::Arc;

/// The per-sample dual maximization interface an SDCA sampling loop drives.
/// Implemented by every model with a usable convex conjugate; Poisson
/// regression is the instance shipped here.
pub trait SdcaProblem<T: RealField + Float> {
    /// Mapping from the compact sampling index to the true sample index, or
    /// None when every sample is eligible and the canonical map applies.
    fn sdca_index_map(&self) -> Option<Arc<Vec<usize>>>;

    /// Returns the new value of sample `i`'s dual variable, given its
    /// current value, the shared primal vector, the previously applied delta
    /// for this same index (used as a warm start) and the L2 penalty
    /// `l_l2sq`. Degenerate samples (zero feature norm, or a zero label
    /// under the identity link) leave the dual unchanged; this method never
    /// fails inside the hot loop.
    fn sdca_dual_min_i(
        &self,
        i: usize,
        dual_i: T,
        primal_vector: &[T],
        previous_delta_dual_i: T,
        l_l2sq: T,
    ) -> T;

    /// Overwrites `out_primal` with the primal vector the dual vector
    /// induces: `w = (1 / (n * l_l2sq)) * sum_i dual_i * x_i`, the intercept
    /// coordinate (when fit) coming from an implicit constant feature of 1.
    fn sdca_primal_dual_relation(
        &self,
        l_l2sq: T,
        dual_vector: &[T],
        out_primal: &mut [T],
    ) -> Result<(), GlmErrors>;
}

impl<T: RealField + Float> PoissonReg<T> {
    /// `||x_i||^2 / (l_l2sq * n)`, the curvature of the quadratic term seen
    /// by sample `i`'s dual problem. The intercept behaves as one extra
    /// constant feature.
    fn normalized_norm(&self, i: usize, l_l2sq: T) -> T {
        let scale = (l_l2sq * T::from(self.n_samples()).unwrap()).recip();
        let mut s = self.features_norm_sq()[i] * scale;
        if self.use_intercept() {
            s = s + scale;
        }
        s
    }

    /// Identity link. The loss `psi(z) = z - y ln z` has conjugate
    /// `psi*(-a) = -y + y ln y - y ln(1 + a)` on `a > -1`, so the
    /// stationarity condition `y / (1 + a) = q + s a` is a quadratic
    /// `s a^2 + (s + q) a + (q - y) = 0` with `q = <x_i, w_{-i}>`. The
    /// larger root is the maximizer and always lies in `(-1, inf)`.
    fn sdca_dual_min_i_identity(&self, i: usize, dual_i: T, primal_vector: &[T], l_l2sq: T) -> T {
        let label = self.label(i);
        if label <= T::zero() {
            // Degenerate: these samples are normally excluded upstream via
            // the index map.
            log::debug!("sdca: skipping sample {} with zero label (identity link)", i);
            return dual_i;
        }
        let two = T::from(2.0).unwrap();
        let four = T::from(4.0).unwrap();
        let s = self.normalized_norm(i, l_l2sq);
        let q = self.inner_prod(i, primal_vector) - dual_i * s;
        let disc = (s - q) * (s - q) + four * s * label;
        (disc.sqrt() - (s + q)) / (two * s)
    }

    /// Exponential link. The loss `psi(z) = exp(z) - y z` has conjugate
    /// `psi*(-a) = (y - a)(ln(y - a) - 1)` on `a <= y`, so the new dual
    /// solves `ln(y - a) = p + (a - dual_i) s`, with `p` the inner product
    /// against the current primal. Solved by Newton steps on the strictly
    /// decreasing, concave residual, clamped to stay below `y`.
    fn sdca_dual_min_i_exponential(
        &self,
        i: usize,
        dual_i: T,
        primal_vector: &[T],
        previous_delta_dual_i: T,
        l_l2sq: T,
    ) -> T {
        let label = self.label(i);
        let half = T::from(0.5).unwrap();
        let s = self.normalized_norm(i, l_l2sq);
        let p = self.inner_prod(i, primal_vector);

        let mut a = dual_i + previous_delta_dual_i;
        if a >= label {
            let margin = T::from(0.1).unwrap() * (T::one() + label.abs());
            a = label - margin;
        }
        let tol = T::epsilon().sqrt();
        for _ in 0..100 {
            let gap = label - a;
            let f = gap.ln() - p - (a - dual_i) * s;
            let df = -gap.recip() - s;
            let mut a_new = a - f / df;
            if a_new >= label {
                // Newton overshot past the domain boundary, bisect instead.
                a_new = (a + label) * half;
            }
            let done = (a_new - a).abs() <= tol * (T::one() + a.abs());
            a = a_new;
            if done {
                break;
            }
        }
        a
    }
}

impl<T: RealField + Float> SdcaProblem<T> for PoissonReg<T> {
    fn sdca_index_map(&self) -> Option<Arc<Vec<usize>>> {
        self.get_sdca_index_map()
    }

    fn sdca_dual_min_i(
        &self,
        i: usize,
        dual_i: T,
        primal_vector: &[T],
        previous_delta_dual_i: T,
        l_l2sq: T,
    ) -> T {
        if self.features_norm_sq()[i] == T::zero() {
            // No information to update from, leave the dual where it is.
            log::debug!("sdca: skipping sample {} with zero feature norm", i);
            return dual_i;
        }
        match self.link_type() {
            LinkType::Identity => self.sdca_dual_min_i_identity(i, dual_i, primal_vector, l_l2sq),
            LinkType::Exponential => self.sdca_dual_min_i_exponential(
                i,
                dual_i,
                primal_vector,
                previous_delta_dual_i,
                l_l2sq,
            ),
        }
    }

    fn sdca_primal_dual_relation(
        &self,
        l_l2sq: T,
        dual_vector: &[T],
        out_primal: &mut [T],
    ) -> Result<(), GlmErrors> {
        if l_l2sq <= T::zero() {
            return Err(GlmErrors::PreconditionViolation);
        }
        let n_samples = self.n_samples();
        let n_features = self.n_features();
        if dual_vector.len() != n_samples || out_primal.len() != self.n_coeffs() {
            return Err(GlmErrors::InvalidDimension);
        }
        let scale = (l_l2sq * T::from(n_samples).unwrap()).recip();
        // w = scale * X^T dual, as one transposed mat-vec.
        let dual_mat = MatRef::from_column_major_slice(dual_vector, n_samples, 1);
        let out_mat = MatMut::from_column_major_slice_mut(&mut out_primal[..n_features], n_features, 1);
        matmul(
            out_mat,
            Accum::Replace,
            self.features().transpose(),
            dual_mat,
            scale,
            Par::rayon(self.n_threads()),
        );
        if self.use_intercept() {
            let sum = dual_vector.iter().fold(T::zero(), |acc, d| acc + *d);
            out_primal[n_features] = scale * sum;
        }
        Ok(())
    }
}
