use super::{DruckerPrager, Evaluation, LinearElastic, LocalState, PowerLaw, StateVar, StrainInput};
use crate::base::{Config, Error, ParamStressStrain, Scales};
use russell_tensor::{Tensor2, Tensor4};

/// Specifies the essential functions for stress-strain models
///
/// A model is a capability object: it declares the values it needs from a
/// parameter source, the layout of its properties and history, and it
/// evaluates and commits the state at a quadrature point.
pub trait StressStrainTrait: Send + Sync {
    /// Returns the names of the values requested from the parameter source
    fn db_names(&self) -> &'static [&'static str];

    /// Returns the names of the (non-dimensional) properties
    fn property_names(&self) -> &'static [&'static str];

    /// Returns the state variables stored in the auxiliary field
    fn state_vars(&self) -> &'static [StateVar];

    /// Validates the parameter source values and converts them into non-dimensional properties
    fn db_to_properties(&self, db: &[f64], scales: &Scales) -> Result<Vec<f64>, Error>;

    /// Indicates that the stiffness matrix is symmetric
    fn symmetric_stiffness(&self) -> bool;

    /// Indicates that the tangent depends on the history (thus committing requires a new Jacobian)
    fn history_dependent(&self) -> bool;

    /// Switches between elastic and inelastic behavior
    fn set_elastic_behavior(&mut self, flag: bool);

    /// Initializes the history given the initial stress and strain
    fn initialize_state(&self, _state: &mut LocalState, _props: &[f64], _input: &StrainInput) -> Result<(), Error> {
        Ok(())
    }

    /// Evaluates the stress and, optionally, the consistent tangent
    ///
    /// The history is not modified. If `compute_from_history` is false, the
    /// stress is read from the history (replay of a committed state) and the
    /// tangent, if requested, is the elastic stiffness.
    fn evaluate(
        &self,
        stress: &mut Tensor2,
        dd: Option<&mut Tensor4>,
        props: &[f64],
        state: &LocalState,
        input: &StrainInput,
        compute_from_history: bool,
    ) -> Result<Evaluation, Error>;

    /// Commits the converged state into the history
    fn commit(&self, state: &mut LocalState, props: &[f64], input: &StrainInput) -> Result<(), Error>;

    /// Returns the stable time step for implicit time stepping
    fn stable_time_step_implicit(&self, props: &[f64], state: &LocalState) -> f64;
}

/// Holds the actual stress-strain model implementation
pub struct StressStrain {
    /// Holds the actual model implementation
    pub actual: Box<dyn StressStrainTrait>,
}

impl StressStrain {
    /// Allocates a new instance
    pub fn new(config: &Config, param: &ParamStressStrain) -> Result<Self, Error> {
        let actual: Box<dyn StressStrainTrait> = match *param {
            // Linear elastic model
            ParamStressStrain::LinearElastic => Box::new(LinearElastic::new(config.stable_dt_sentinel)),

            // Power-law viscoelastic model
            ParamStressStrain::PowerLaw => Box::new(PowerLaw::new(config)),

            // Drucker-Prager plasticity model
            ParamStressStrain::DruckerPrager {
                fit,
                allow_tensile_yield,
            } => Box::new(DruckerPrager::new(config, fit, allow_tensile_yield)),
        };
        Ok(StressStrain { actual })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::StressStrain;
    use crate::base::{Config, FitMohrCoulomb, ParamStressStrain};
    use crate::material::StateVar;

    #[test]
    fn allocate_stress_strain_model_works() {
        let config = Config::new(2);
        let model = StressStrain::new(&config, &ParamStressStrain::LinearElastic).unwrap();
        assert_eq!(model.actual.db_names(), &["density", "vs", "vp"]);
        assert_eq!(model.actual.state_vars().len(), 0);
        assert!(!model.actual.history_dependent());

        let model = StressStrain::new(&config, &ParamStressStrain::PowerLaw).unwrap();
        assert_eq!(model.actual.db_names().len(), 5);
        assert!(model.actual.state_vars().contains(&StateVar::ViscousStrain));
        assert!(model.actual.symmetric_stiffness());

        let param = ParamStressStrain::DruckerPrager {
            fit: FitMohrCoulomb::Circumscribed,
            allow_tensile_yield: false,
        };
        let model = StressStrain::new(&config, &param).unwrap();
        assert!(model.actual.state_vars().contains(&StateVar::PlasticStrain));
        assert!(model.actual.history_dependent());
    }
}
