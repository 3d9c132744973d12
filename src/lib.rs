//! Finite element core for crustal deformation
//!
//! The crate assembles residual vectors and Jacobian matrices from pointwise
//! kernels over labeled cell subsets, evaluates power-law viscoelastic and
//! Drucker-Prager elastoplastic materials at quadrature points, and
//! coordinates the time-stepping contract with an external solver.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

/// Defines a function of time
pub type FnTime = fn(f64) -> f64;

pub mod base;
pub mod fem;
pub mod material;
pub mod prelude;
