pub mod poisson;

pub use poisson::{PoissonReg, PoissonRegState};

use serde::{Deserialize, Serialize};

/// Link function mapping the linear predictor to the Poisson rate. The set
/// is small and fixed, so loss/gradient/dual formulas switch on it
/// exhaustively rather than going through a trait object per link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    /// rate = inner product; requires a non-negative predictor.
    Identity,
    /// rate = exp(inner product); well defined for any predictor.
    Exponential,
}

impl From<&str> for LinkType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "identity" => Self::Identity,
            "exponential" | "exp" | "log" => Self::Exponential,
            _ => Self::Exponential,
        }
    }
}
