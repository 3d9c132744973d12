use super::{deviator, elastic_properties, elastic_stiffness, elastic_stress, mean};
use super::{Evaluation, LocalState, StateVar, StrainInput, StressStrainTrait};
use super::{PROP_LAMBDA, PROP_SHEAR_MODULUS};
use crate::base::{Config, Error, FitMohrCoulomb, Scales};
use russell_lab::Vector;
use russell_tensor::{Tensor2, Tensor4, IDENTITY2, P_SYMDEV};
use std::f64::consts::SQRT_2;

/// Defines an alias to IDENTITY2
const I: &[f64; 9] = &IDENTITY2;

/// Defines an alias to P_SYMDEV
const PSD: &[[f64; 9]; 9] = &P_SYMDEV;

/// Index of the yield-surface slope αy in the properties vector
pub const PROP_ALPHA_YIELD: usize = 3;

/// Index of the yield-surface intercept β in the properties vector
pub const PROP_BETA: usize = 4;

/// Index of the flow-potential slope αf in the properties vector
pub const PROP_ALPHA_FLOW: usize = 5;

/// Holds the results of the return mapping at a quadrature point
struct ReturnMapping {
    /// Trial (elastic) deviatoric strain plus `ae s₀`
    ee: Vector,

    /// Norm of `ee`
    d: f64,

    /// Deviatoric stress at t + Δt
    dev_stress: Vector,

    /// Mean stress at t + Δt
    mean_stress: f64,

    /// Plastic multiplier λ (zero if elastic)
    lambda: f64,

    /// Increment of the deviatoric plastic strain
    delta_dev_plastic: Vector,

    /// Increment of the mean plastic strain
    delta_mean_plastic: f64,

    /// Indicates that the return reached the apex of the cone
    apex: bool,
}

/// Implements an elastoplastic Drucker-Prager model with a non-associated flow rule
///
/// ```text
/// F = 3 αy σm + √J2 - β
/// G = 3 αf σm + √J2
/// ```
///
/// The parameters αy, β and αf are computed from the Mohr-Coulomb
/// friction angle, cohesion and dilatation angle according to a fit
/// (inscribed, middle or circumscribed). There is no hardening, thus the
/// return mapping is closed-form.
pub struct DruckerPrager {
    /// Mohr-Coulomb fit
    fit: FitMohrCoulomb,

    /// Returns to the apex of the cone when the stress is beyond it (otherwise an error)
    allow_tensile_yield: bool,

    /// Stable time step returned for implicit time stepping
    stable_dt: f64,

    /// Uses the elastic relation instead of the elastoplastic one
    elastic_behavior: bool,
}

impl DruckerPrager {
    /// Allocates a new instance
    pub fn new(config: &Config, fit: FitMohrCoulomb, allow_tensile_yield: bool) -> Self {
        DruckerPrager {
            fit,
            allow_tensile_yield,
            stable_dt: config.stable_dt_sentinel,
            elastic_behavior: false,
        }
    }

    /// Returns (αy, β, αf) given friction angle, cohesion and dilatation angle (in radians)
    pub fn fit_parameters(&self, friction: f64, cohesion: f64, dilatation: f64) -> (f64, f64, f64) {
        let (sin_f, cos_f, sin_d) = (f64::sin(friction), f64::cos(friction), f64::sin(dilatation));
        let sq3 = f64::sqrt(3.0);
        match self.fit {
            FitMohrCoulomb::Inscribed => {
                let den_f = sq3 * (3.0 + sin_f);
                let den_d = sq3 * (3.0 + sin_d);
                (2.0 * sin_f / den_f, 6.0 * cohesion * cos_f / den_f, 2.0 * sin_d / den_d)
            }
            FitMohrCoulomb::Middle => (sin_f / 3.0, cohesion * cos_f, sin_d / 3.0),
            FitMohrCoulomb::Circumscribed => {
                let den_f = sq3 * (3.0 - sin_f);
                let den_d = sq3 * (3.0 - sin_d);
                (2.0 * sin_f / den_f, 6.0 * cohesion * cos_f / den_f, 2.0 * sin_d / den_d)
            }
        }
    }

    /// Computes the stress update without modifying the history
    fn return_mapping(&self, props: &[f64], state: &LocalState, input: &StrainInput) -> Result<ReturnMapping, Error> {
        let mu = props[PROP_SHEAR_MODULUS];
        let lambda_lame = props[PROP_LAMBDA];
        let alpha_yield = props[PROP_ALPHA_YIELD];
        let beta = props[PROP_BETA];
        let alpha_flow = props[PROP_ALPHA_FLOW];
        let ae = 1.0 / (2.0 * mu);
        let am = 1.0 / (3.0 * lambda_lame + 2.0 * mu);

        // strain minus plastic strain minus initial strain
        let eps = input.strain.vector();
        let eps0 = input.initial_strain.vector();
        let eps_p = state.inelastic_strain.vector();
        let dim = eps.dim();
        let mut eps_eff = Vector::new(dim);
        for i in 0..dim {
            eps_eff[i] = eps[i] - eps_p[i] - eps0[i];
        }
        let m = mean(&eps_eff);
        let mut e = Vector::new(dim);
        deviator(&mut e, &eps_eff);

        // initial stress
        let sig0 = input.initial_stress.vector();
        let mean_stress_0 = mean(sig0);
        let mut s0 = Vector::new(dim);
        deviator(&mut s0, sig0);

        let mut ee = Vector::new(dim);
        let mut d2 = 0.0;
        for i in 0..dim {
            ee[i] = e[i] + ae * s0[i];
            d2 += ee[i] * ee[i];
        }
        let d = f64::sqrt(d2);

        // trial state
        let trial_mean = m / am + mean_stress_0;
        let yield_function = 3.0 * alpha_yield * trial_mean + d / (SQRT_2 * ae) - beta;
        if yield_function < 0.0 || self.elastic_behavior {
            let mut dev_stress = Vector::new(dim);
            for i in 0..dim {
                dev_stress[i] = ee[i] / ae;
            }
            return Ok(ReturnMapping {
                ee,
                d,
                dev_stress,
                mean_stress: trial_mean,
                lambda: 0.0,
                delta_dev_plastic: Vector::new(dim),
                delta_mean_plastic: 0.0,
                apex: false,
            });
        }

        // plastic multiplier
        let lambda = 2.0 * ae * am * yield_function / (6.0 * alpha_yield * alpha_flow * ae + am);
        if d <= 0.0 || lambda > SQRT_2 * d {
            if !self.allow_tensile_yield || alpha_yield <= 0.0 {
                return Err(Error::Numerical(format!(
                    "stress is beyond the apex of the yield surface (F = {:?}, mean stress = {:?})",
                    yield_function, trial_mean
                )));
            }
            let apex_mean = beta / (3.0 * alpha_yield);
            return Ok(ReturnMapping {
                delta_dev_plastic: ee.clone(),
                ee,
                d,
                dev_stress: Vector::new(dim),
                mean_stress: apex_mean,
                lambda,
                delta_mean_plastic: m - am * (apex_mean - mean_stress_0),
                apex: true,
            });
        }

        let mut dev_stress = Vector::new(dim);
        let mut delta_dev_plastic = Vector::new(dim);
        for i in 0..dim {
            delta_dev_plastic[i] = lambda * ee[i] / (SQRT_2 * d);
            dev_stress[i] = (ee[i] - delta_dev_plastic[i]) / ae;
        }
        Ok(ReturnMapping {
            ee,
            d,
            dev_stress,
            mean_stress: (m - lambda * alpha_flow) / am + mean_stress_0,
            lambda,
            delta_dev_plastic,
            delta_mean_plastic: lambda * alpha_flow,
            apex: false,
        })
    }

    /// Computes the elastoplastic consistent tangent
    ///
    /// ```text
    /// D = I ⊗ (I/(3am) - (αf/am) k G) + (1/ae) [P - (k n⊗G + (λ/d)(P - n⊗n))/√2]
    /// G = αy I/am + n/(√2 ae),   k = 2 ae am / (6 αy αf ae + am)
    /// ```
    fn stiffness(&self, dd: &mut Tensor4, props: &[f64], rm: &ReturnMapping) {
        let mu = props[PROP_SHEAR_MODULUS];
        let lambda_lame = props[PROP_LAMBDA];
        let alpha_yield = props[PROP_ALPHA_YIELD];
        let alpha_flow = props[PROP_ALPHA_FLOW];
        let ae = 1.0 / (2.0 * mu);
        let am = 1.0 / (3.0 * lambda_lame + 2.0 * mu);
        let k = 2.0 * ae * am / (6.0 * alpha_yield * alpha_flow * ae + am);
        let mat = dd.matrix_mut();
        let (dim, _) = mat.dims();
        let mut nn = Vector::new(dim);
        let mut gg = Vector::new(dim);
        for i in 0..dim {
            nn[i] = rm.ee[i] / rm.d;
            gg[i] = alpha_yield * I[i] / am + nn[i] / (SQRT_2 * ae);
        }
        let ratio = rm.lambda / rm.d;
        let value = |i: usize, j: usize| {
            let vol = I[i] * (I[j] / (3.0 * am) - (alpha_flow / am) * k * gg[j]);
            let dev = PSD[i][j] - (k * nn[i] * gg[j] + ratio * (PSD[i][j] - nn[i] * nn[j])) / SQRT_2;
            vol + dev / ae
        };
        if alpha_flow == alpha_yield {
            for i in 0..dim {
                for j in i..dim {
                    let v = value(i, j);
                    mat.set(i, j, v);
                    mat.set(j, i, v);
                }
            }
        } else {
            for i in 0..dim {
                for j in 0..dim {
                    mat.set(i, j, value(i, j));
                }
            }
        }
    }
}

impl StressStrainTrait for DruckerPrager {
    fn db_names(&self) -> &'static [&'static str] {
        &["density", "vs", "vp", "friction_angle", "cohesion", "dilatation_angle"]
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["density", "shear_modulus", "lambda", "alpha_yield", "beta", "alpha_flow"]
    }

    fn state_vars(&self) -> &'static [StateVar] {
        &[StateVar::Stress, StateVar::TotalStrain, StateVar::PlasticStrain]
    }

    /// Converts the parameters; the angles are given in degrees
    fn db_to_properties(&self, db: &[f64], scales: &Scales) -> Result<Vec<f64>, Error> {
        let elastic = elastic_properties(db, scales)?;
        let (friction, cohesion, dilatation) = (db[3], db[4], db[5]);
        if friction < 0.0 {
            return Err(Error::Config(format!(
                "friction_angle = {:?} is incorrect; it must be ≥ 0.0",
                friction
            )));
        }
        if cohesion <= 0.0 {
            return Err(Error::Config(format!(
                "cohesion = {:?} is incorrect; it must be > 0.0",
                cohesion
            )));
        }
        if dilatation < 0.0 {
            return Err(Error::Config(format!(
                "dilatation_angle = {:?} is incorrect; it must be ≥ 0.0",
                dilatation
            )));
        }
        if friction < dilatation {
            return Err(Error::Config(format!(
                "friction_angle = {:?} must be ≥ dilatation_angle = {:?}",
                friction, dilatation
            )));
        }
        let (alpha_yield, beta, alpha_flow) = self.fit_parameters(
            friction.to_radians(),
            cohesion / scales.pressure,
            dilatation.to_radians(),
        );
        let mut props = elastic.to_vec();
        props.extend_from_slice(&[alpha_yield, beta, alpha_flow]);
        Ok(props)
    }

    /// Returns false because the flow rule is non-associated in general
    fn symmetric_stiffness(&self) -> bool {
        false
    }

    fn history_dependent(&self) -> bool {
        true
    }

    fn set_elastic_behavior(&mut self, flag: bool) {
        self.elastic_behavior = flag;
    }

    fn initialize_state(&self, state: &mut LocalState, _props: &[f64], input: &StrainInput) -> Result<(), Error> {
        state.stress.vector_mut().set_vector(input.initial_stress.vector().as_data());
        state.total_strain.vector_mut().set_vector(input.initial_strain.vector().as_data());
        state.inelastic_strain.vector_mut().fill(0.0);
        Ok(())
    }

    fn evaluate(
        &self,
        stress: &mut Tensor2,
        dd: Option<&mut Tensor4>,
        props: &[f64],
        state: &LocalState,
        input: &StrainInput,
        compute_from_history: bool,
    ) -> Result<Evaluation, Error> {
        if self.elastic_behavior {
            elastic_stress(stress, props, input, None);
            if let Some(dd) = dd {
                elastic_stiffness(dd, props);
            }
            return Ok(Evaluation {
                effective_stress: 0.0,
                maxwell_time: self.stable_dt,
                plastic_multiplier: 0.0,
                need_new_jacobian: false,
            });
        }
        if !compute_from_history {
            stress.vector_mut().set_vector(state.stress.vector().as_data());
            if let Some(dd) = dd {
                elastic_stiffness(dd, props);
            }
            return Ok(Evaluation {
                effective_stress: 0.0,
                maxwell_time: self.stable_dt,
                plastic_multiplier: 0.0,
                need_new_jacobian: false,
            });
        }
        let rm = self.return_mapping(props, state, input)?;
        let sig = stress.vector_mut();
        for i in 0..sig.dim() {
            sig[i] = rm.dev_stress[i] + rm.mean_stress * I[i];
        }
        if let Some(dd) = dd {
            if rm.apex {
                dd.matrix_mut().fill(0.0);
            } else if rm.lambda > 0.0 {
                self.stiffness(dd, props, &rm);
            } else {
                elastic_stiffness(dd, props);
            }
        }
        let mut norm_s = 0.0;
        for i in 0..rm.dev_stress.dim() {
            norm_s += rm.dev_stress[i] * rm.dev_stress[i];
        }
        Ok(Evaluation {
            effective_stress: f64::sqrt(0.5 * norm_s),
            maxwell_time: self.stable_dt,
            plastic_multiplier: rm.lambda,
            need_new_jacobian: true,
        })
    }

    fn commit(&self, state: &mut LocalState, props: &[f64], input: &StrainInput) -> Result<(), Error> {
        if self.elastic_behavior {
            let mut stress = Tensor2::new(state.stress.mandel());
            elastic_stress(&mut stress, props, input, None);
            state.stress = stress;
            state.total_strain.vector_mut().set_vector(input.strain.vector().as_data());
            state.inelastic_strain.vector_mut().fill(0.0);
            return Ok(());
        }
        let rm = self.return_mapping(props, state, input)?;
        let eps_p = state.inelastic_strain.vector_mut();
        for i in 0..eps_p.dim() {
            eps_p[i] += rm.delta_dev_plastic[i] + rm.delta_mean_plastic * I[i];
        }
        let sig = state.stress.vector_mut();
        for i in 0..sig.dim() {
            sig[i] = rm.dev_stress[i] + rm.mean_stress * I[i];
        }
        state.total_strain.vector_mut().set_vector(input.strain.vector().as_data());
        Ok(())
    }

    fn stable_time_step_implicit(&self, _props: &[f64], _state: &LocalState) -> f64 {
        self.stable_dt
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
