//! Implements the finite element method: quadrature, kernels, assembly, and time stepping

mod assembly;
mod auxiliary;
mod integrator;
mod kernels;
mod quadrature;
mod time_stepper;
pub use crate::fem::assembly::*;
pub use crate::fem::auxiliary::*;
pub use crate::fem::integrator::*;
pub use crate::fem::kernels::*;
pub use crate::fem::quadrature::*;
pub use crate::fem::time_stepper::*;
