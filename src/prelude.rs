//! Makes available common structures needed to run a simulation
//!
//! You may write `use crustsim::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{Config, Dof, Ebc, Error, Essential, Field, Formulation, MeshService, Scales};
pub use crate::base::{FitMohrCoulomb, ParamMaterial, ParamStressStrain, ParameterSource, UniformSource};
pub use crate::fem::{ExplicitEuler, IntegratorDomain, KernelRegistry, NewtonSolver, Observer};
pub use crate::fem::{StepOutcome, StepSolver, TimeStepper};
