use super::UniformSource;

/// Holds parameter sources used in tests and documentation
///
/// The values are dimensionless-friendly numbers; e.g., `density = 1`,
/// `vs = 1` and `vp = 2` give `μ = 1`, `λ = 2`, `K = 8/3`.
pub struct SampleParams {}

impl SampleParams {
    /// Returns a source for the linear elastic model (μ = 1, λ = 2)
    pub fn source_elastic() -> UniformSource {
        let mut source = UniformSource::new();
        source.set("density", 1.0).set("vs", 1.0).set("vp", 2.0);
        source
    }

    /// Returns a source for the power-law viscoelastic model
    pub fn source_power_law() -> UniformSource {
        let mut source = SampleParams::source_elastic();
        source
            .set("viscosity_coefficient", 0.5)
            .set("power_law_exponent", 3.5);
        source
    }

    /// Returns a source for the Drucker-Prager model
    pub fn source_drucker_prager() -> UniformSource {
        let mut source = SampleParams::source_elastic();
        source
            .set("friction_angle", 30.0)
            .set("cohesion", 0.01)
            .set("dilatation_angle", 10.0);
        source
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
