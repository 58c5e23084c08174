//! Optimization core for regularized generalized linear models.
//!
//! Two pieces are provided:
//! - a family of separable proximal operators ([`prox`]) applied to a
//!   coefficient vector over an optional coordinate range,
//! - a Poisson regression model with an SDCA dual-update engine
//!   ([`linear`]), generic over `f32`/`f64`.
//!
//! The sampling loop that drives SDCA lives outside this crate: it picks a
//! sample, calls the dual update, refreshes the primal vector and
//! periodically applies a prox operator to it.

pub mod linear;
pub mod prox;
