use russell_tensor::{Mandel, Tensor2};
use serde::{Deserialize, Serialize};

/// Defines the state variables a material may carry in the auxiliary field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateVar {
    /// Stress at the end of the last accepted step
    Stress,

    /// Total strain at the end of the last accepted step
    TotalStrain,

    /// Accumulated viscous strain
    ViscousStrain,

    /// Accumulated plastic strain
    PlasticStrain,

    /// Converged effective stress (scalar)
    EffectiveStress,

    /// Maxwell relaxation time (scalar)
    MaxwellTime,
}

impl StateVar {
    /// Returns the name of the subfield in the auxiliary field
    pub fn name(&self) -> &'static str {
        match self {
            StateVar::Stress => "stress",
            StateVar::TotalStrain => "total_strain",
            StateVar::ViscousStrain => "viscous_strain",
            StateVar::PlasticStrain => "plastic_strain",
            StateVar::EffectiveStress => "effective_stress",
            StateVar::MaxwellTime => "maxwell_time",
        }
    }

    /// Returns the number of components (Mandel dimension for tensors)
    pub fn n_components(&self, mandel: Mandel) -> usize {
        match self {
            StateVar::EffectiveStress | StateVar::MaxwellTime => 1,
            _ => Tensor2::new(mandel).vector().dim(),
        }
    }
}

/// Holds the history of a material at a quadrature point
///
/// The history describes the converged state at the end of the last
/// accepted step. It is only modified by the commit function of a material.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalState {
    /// Holds the stress tensor σ
    pub stress: Tensor2,

    /// Holds the total strain tensor ε
    pub total_strain: Tensor2,

    /// Holds the viscous (or plastic) strain tensor
    pub inelastic_strain: Tensor2,

    /// Holds the effective stress τ
    pub effective_stress: f64,

    /// Holds the Maxwell time
    pub maxwell_time: f64,
}

impl LocalState {
    /// Allocates a new instance with zero values
    pub fn new(mandel: Mandel) -> Self {
        LocalState {
            stress: Tensor2::new(mandel),
            total_strain: Tensor2::new(mandel),
            inelastic_strain: Tensor2::new(mandel),
            effective_stress: 0.0,
            maxwell_time: 0.0,
        }
    }

    /// Copies the values of a state variable from a slice
    pub fn read(&mut self, var: StateVar, values: &[f64]) {
        match var {
            StateVar::Stress => copy_into(&mut self.stress, values),
            StateVar::TotalStrain => copy_into(&mut self.total_strain, values),
            StateVar::ViscousStrain | StateVar::PlasticStrain => copy_into(&mut self.inelastic_strain, values),
            StateVar::EffectiveStress => self.effective_stress = values[0],
            StateVar::MaxwellTime => self.maxwell_time = values[0],
        }
    }

    /// Copies the values of a state variable into a slice
    pub fn write(&self, var: StateVar, values: &mut [f64]) {
        match var {
            StateVar::Stress => values.copy_from_slice(self.stress.vector().as_data()),
            StateVar::TotalStrain => values.copy_from_slice(self.total_strain.vector().as_data()),
            StateVar::ViscousStrain | StateVar::PlasticStrain => {
                values.copy_from_slice(self.inelastic_strain.vector().as_data())
            }
            StateVar::EffectiveStress => values[0] = self.effective_stress,
            StateVar::MaxwellTime => values[0] = self.maxwell_time,
        }
    }
}

/// Copies Mandel components from a slice into a tensor
fn copy_into(tt: &mut Tensor2, values: &[f64]) {
    tt.vector_mut().as_mut_data().copy_from_slice(values);
}

/// Holds the strain input of a material at a quadrature point
pub struct StrainInput<'a> {
    /// Total strain at the trial (or converged) state
    pub strain: &'a Tensor2,

    /// Initial stress
    pub initial_stress: &'a Tensor2,

    /// Initial strain
    pub initial_strain: &'a Tensor2,

    /// Time step size
    pub dt: f64,
}

/// Holds the scalar results of a material evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Effective stress τ at the end of the step (zero for elastic models)
    pub effective_stress: f64,

    /// Maxwell time at the end of the step (sentinel for models without relaxation)
    pub maxwell_time: f64,

    /// Increment of the plastic multiplier (zero if elastic)
    pub plastic_multiplier: f64,

    /// Indicates that the tangent depends on the trial state
    pub need_new_jacobian: bool,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
