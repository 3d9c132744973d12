use serde::{Deserialize, Serialize};

/// Defines how the Drucker-Prager cone is fitted to the Mohr-Coulomb surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMohrCoulomb {
    /// Cone inscribed in the Mohr-Coulomb pyramid
    Inscribed,

    /// Cone between the inscribed and circumscribed ones
    Middle,

    /// Cone circumscribing the Mohr-Coulomb pyramid (touches the compression meridian)
    Circumscribed,
}

/// Holds parameters for stress-strain relations
///
/// The physical constants are read from a parameter source at each
/// quadrature point; this enum only selects the model and its options.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamStressStrain {
    /// Linear isotropic elasticity
    ///
    /// Parameter source values: `density`, `vs`, `vp`
    LinearElastic,

    /// Power-law Maxwell viscoelasticity
    ///
    /// Parameter source values: `density`, `vs`, `vp`, `viscosity_coefficient`, `power_law_exponent`
    PowerLaw,

    /// Non-associated perfectly plastic Drucker-Prager model
    ///
    /// Parameter source values: `density`, `vs`, `vp`, `friction_angle`, `cohesion`, `dilatation_angle`
    /// (angles in degrees)
    DruckerPrager {
        /// Fitting of the cone to the Mohr-Coulomb surface
        fit: FitMohrCoulomb,

        /// Allows a return to the apex of the cone when the trial stress is beyond it
        allow_tensile_yield: bool,
    },
}

/// Holds parameters for a material region
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamMaterial {
    /// Name used in messages
    pub name: String,

    /// Value of the material-id label (cell attribute) owned by this material
    pub label_value: usize,

    /// Constitutive model
    pub stress_strain: ParamStressStrain,

    /// Reads an initial stress from the parameter source (`stress_xx`, `stress_yy`, ...)
    pub initial_stress: bool,

    /// Reads an initial strain from the parameter source (`strain_xx`, `strain_yy`, ...)
    pub initial_strain: bool,
}

impl ParamMaterial {
    /// Allocates a new instance without initial stress or strain
    pub fn new(name: &str, label_value: usize, stress_strain: ParamStressStrain) -> Self {
        ParamMaterial {
            name: name.to_string(),
            label_value,
            stress_strain,
            initial_stress: false,
            initial_strain: false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
