//! Implements material models

mod drucker_prager;
mod effective_stress;
mod linear_elastic;
mod local_state;
mod power_law;
mod stress_strain;
mod tensor_ops;
pub use crate::material::drucker_prager::*;
pub use crate::material::effective_stress::*;
pub use crate::material::linear_elastic::*;
pub use crate::material::local_state::*;
pub use crate::material::power_law::*;
pub use crate::material::stress_strain::*;
pub use crate::material::tensor_ops::*;

#[cfg(test)]
pub(crate) mod testing;
