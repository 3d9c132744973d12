use super::{mean, Evaluation, LocalState, StateVar, StrainInput, StressStrainTrait};
use crate::base::{Error, Scales};
use russell_lab::Vector;
use russell_tensor::{Tensor2, Tensor4, IDENTITY2, P_SYMDEV};

/// Defines an alias to IDENTITY2
const I: &[f64; 9] = &IDENTITY2;

/// Defines an alias to P_SYMDEV
const PSD: &[[f64; 9]; 9] = &P_SYMDEV;

/// Index of the density in the properties vector (shared by all models)
pub const PROP_DENSITY: usize = 0;

/// Index of the shear modulus μ in the properties vector (shared by all models)
pub const PROP_SHEAR_MODULUS: usize = 1;

/// Index of Lamé's λ in the properties vector (shared by all models)
pub const PROP_LAMBDA: usize = 2;

/// Converts density and wave speeds into non-dimensional elastic properties
///
/// Returns `[density, μ, λ]` with `μ = ρ vs²` and `λ = ρ vp² - 2μ`.
pub(crate) fn elastic_properties(db: &[f64], scales: &Scales) -> Result<[f64; 3], Error> {
    let (density, vs, vp) = (db[0], db[1], db[2]);
    if density <= 0.0 {
        return Err(Error::Config(format!("density = {:?} is incorrect; it must be > 0.0", density)));
    }
    if vs <= 0.0 {
        return Err(Error::Config(format!("vs = {:?} is incorrect; it must be > 0.0", vs)));
    }
    if vp <= 0.0 {
        return Err(Error::Config(format!("vp = {:?} is incorrect; it must be > 0.0", vp)));
    }
    let mu = density * vs * vs;
    let lambda = density * vp * vp - 2.0 * mu;
    if lambda <= 0.0 {
        return Err(Error::Config(format!(
            "λ = ρ vp² - 2 ρ vs² = {:?} is incorrect; it must be > 0.0 (density = {:?}, vs = {:?}, vp = {:?})",
            lambda, density, vs, vp
        )));
    }
    Ok([density / scales.density, mu / scales.pressure, lambda / scales.pressure])
}

/// Computes `σ = λ tr(ε - ε₀) I + 2μ (ε - ε₀) + σ₀`
pub(crate) fn elastic_stress(stress: &mut Tensor2, props: &[f64], input: &StrainInput, inelastic: Option<&Tensor2>) {
    let (mu, lambda) = (props[PROP_SHEAR_MODULUS], props[PROP_LAMBDA]);
    let eps = input.strain.vector();
    let eps0 = input.initial_strain.vector();
    let sig0 = input.initial_stress.vector();
    let n = eps.dim();
    let mut e = Vector::new(n);
    for i in 0..n {
        e[i] = eps[i] - eps0[i];
        if let Some(inel) = inelastic {
            e[i] -= inel.vector()[i];
        }
    }
    let tr = 3.0 * mean(&e);
    let sig = stress.vector_mut();
    for i in 0..n {
        sig[i] = lambda * tr * I[i] + 2.0 * mu * e[i] + sig0[i];
    }
}

/// Computes the elastic modulus `D = K I⊗I + 2μ Psymdev` (upper triangle mirrored)
pub(crate) fn elastic_stiffness(dd: &mut Tensor4, props: &[f64]) {
    let (mu, lambda) = (props[PROP_SHEAR_MODULUS], props[PROP_LAMBDA]);
    let kk = lambda + 2.0 * mu / 3.0;
    let mat = dd.matrix_mut();
    let (n, _) = mat.dims();
    for i in 0..n {
        for j in i..n {
            let value = kk * I[i] * I[j] + 2.0 * mu * PSD[i][j];
            mat.set(i, j, value);
            mat.set(j, i, value);
        }
    }
}

/// Implements a linear elastic model
pub struct LinearElastic {
    /// Stable time step returned for implicit time stepping
    stable_dt: f64,
}

impl LinearElastic {
    /// Allocates a new instance
    pub fn new(stable_dt_sentinel: f64) -> Self {
        LinearElastic {
            stable_dt: stable_dt_sentinel,
        }
    }
}

impl StressStrainTrait for LinearElastic {
    fn db_names(&self) -> &'static [&'static str] {
        &["density", "vs", "vp"]
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["density", "shear_modulus", "lambda"]
    }

    fn state_vars(&self) -> &'static [StateVar] {
        &[]
    }

    fn db_to_properties(&self, db: &[f64], scales: &Scales) -> Result<Vec<f64>, Error> {
        Ok(elastic_properties(db, scales)?.to_vec())
    }

    /// Indicates that the stiffness matrix is symmetric and constant
    fn symmetric_stiffness(&self) -> bool {
        true
    }

    fn history_dependent(&self) -> bool {
        false
    }

    fn set_elastic_behavior(&mut self, _flag: bool) {}

    fn evaluate(
        &self,
        stress: &mut Tensor2,
        dd: Option<&mut Tensor4>,
        props: &[f64],
        _state: &LocalState,
        input: &StrainInput,
        _compute_from_history: bool,
    ) -> Result<Evaluation, Error> {
        elastic_stress(stress, props, input, None);
        if let Some(dd) = dd {
            elastic_stiffness(dd, props);
        }
        Ok(Evaluation {
            effective_stress: 0.0,
            maxwell_time: self.stable_dt,
            plastic_multiplier: 0.0,
            need_new_jacobian: false,
        })
    }

    fn commit(&self, _state: &mut LocalState, _props: &[f64], _input: &StrainInput) -> Result<(), Error> {
        Ok(())
    }

    fn stable_time_step_implicit(&self, _props: &[f64], _state: &LocalState) -> f64 {
        self.stable_dt
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{elastic_properties, LinearElastic};
    use crate::base::{Error, Scales};
    use crate::material::testing::{check_minor_symmetry, check_tangent, elastic_input};
    use crate::material::{LocalState, StressStrainTrait};
    use russell_lab::approx_eq;
    use russell_tensor::{LinElasticity, Mandel, Tensor2, Tensor4};

    #[test]
    fn elastic_properties_works() -> Result<(), Error> {
        let scales = Scales::new();
        let props = elastic_properties(&[1.0, 1.0, 2.0], &scales)?;
        assert_eq!(props, [1.0, 1.0, 2.0]);

        let scales = Scales::from(1.0, 2.0, 1.0, 4.0).unwrap();
        let props = elastic_properties(&[2500.0, 3000.0, 5291.502622129181], &scales)?;
        approx_eq(props[0], 625.0, 1e-12);
        approx_eq(props[1], 2500.0 * 9e6 / 2.0, 1e-3);
        approx_eq(props[2], (2500.0 * 28e6 - 2.0 * 2500.0 * 9e6) / 2.0, 1e-3);
        Ok(())
    }

    #[test]
    fn elastic_properties_captures_errors() {
        let scales = Scales::new();
        assert_eq!(
            elastic_properties(&[0.0, 1.0, 2.0], &scales).err(),
            Some(Error::Config("density = 0.0 is incorrect; it must be > 0.0".to_string()))
        );
        assert_eq!(
            elastic_properties(&[1.0, -1.0, 2.0], &scales).err(),
            Some(Error::Config("vs = -1.0 is incorrect; it must be > 0.0".to_string()))
        );
        assert_eq!(
            elastic_properties(&[1.0, 1.0, 0.0], &scales).err(),
            Some(Error::Config("vp = 0.0 is incorrect; it must be > 0.0".to_string()))
        );
        assert_eq!(
            elastic_properties(&[1.0, 1.0, 1.0], &scales).err(),
            Some(Error::Config(
                "λ = ρ vp² - 2 ρ vs² = -1.0 is incorrect; it must be > 0.0 (density = 1.0, vs = 1.0, vp = 1.0)"
                    .to_string()
            ))
        );
    }

    #[test]
    fn evaluate_matches_lin_elasticity() -> Result<(), Error> {
        let model = LinearElastic::new(1e30);
        let props = [1.0, 1.0, 2.0]; // μ = 1, λ = 2
        let state = LocalState::new(Mandel::Symmetric2D);
        let (strain, sig0, eps0) = elastic_input(Mandel::Symmetric2D, &[0.001, -0.002, 0.0, 0.0005]);
        let input = crate::material::StrainInput {
            strain: &strain,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt: 0.1,
        };
        let mut stress = Tensor2::new(Mandel::Symmetric2D);
        let mut dd = Tensor4::new(Mandel::Symmetric2D);
        let res = model.evaluate(&mut stress, Some(&mut dd), &props, &state, &input, true)?;
        assert!(!res.need_new_jacobian);

        // young and poisson from λ and μ
        let (lambda, mu) = (2.0, 1.0);
        let young = mu * (3.0 * lambda + 2.0 * mu) / (lambda + mu);
        let poisson = lambda / (2.0 * (lambda + mu));
        let ela = LinElasticity::new(young, poisson, true, false);
        let reference = ela.get_modulus().matrix();
        for i in 0..4 {
            for j in 0..4 {
                approx_eq(dd.matrix().get(i, j), reference.get(i, j), 1e-14);
            }
        }

        // σ = D : ε
        let sig = stress.vector();
        let eps = strain.vector();
        for i in 0..4 {
            let mut expected = 0.0;
            for j in 0..4 {
                expected += reference.get(i, j) * eps[j];
            }
            approx_eq(sig[i], expected, 1e-15);
        }
        Ok(())
    }

    #[test]
    fn tangent_and_symmetry_work() -> Result<(), Error> {
        let model = LinearElastic::new(1e30);
        let props = [1.0, 1.0, 2.0];
        for mandel in [Mandel::Symmetric2D, Mandel::Symmetric] {
            let state = LocalState::new(mandel);
            let components = [0.001, -0.002, 0.0003, 0.0005, 0.0001, -0.0002];
            let err = check_tangent(&model, &props, &state, mandel, &components, 0.1)?;
            assert!(err < 1e-6);
            check_minor_symmetry(&model, &props, &state, mandel, &components)?;
        }
        Ok(())
    }
}
