use super::{ddot, deviator, elastic_properties, elastic_stiffness, elastic_stress, mean};
use super::{EffectiveStressSolver, Evaluation, LocalState, StateVar, StrainInput, StressStrainTrait};
use super::{PROP_LAMBDA, PROP_SHEAR_MODULUS};
use crate::base::{Config, Error, Scales};
use russell_lab::Vector;
use russell_tensor::{Tensor2, Tensor4, IDENTITY2, P_SYMDEV};

/// Defines an alias to IDENTITY2
const I: &[f64; 9] = &IDENTITY2;

/// Defines an alias to P_SYMDEV
const PSD: &[[f64; 9]; 9] = &P_SYMDEV;

/// Index of the viscosity coefficient A in the properties vector
pub const PROP_VISCOSITY_COEFFICIENT: usize = 3;

/// Index of the power-law exponent n in the properties vector
pub const PROP_POWER_LAW_EXPONENT: usize = 4;

/// Holds the results of the rate-dependent update at a quadrature point
struct ViscousUpdate {
    /// Deviatoric stress at t + Δt
    dev_stress: Vector,

    /// Mean stress at t + Δt
    mean_stress: f64,

    /// Deviatoric stress at t
    dev_stress_t: Vector,

    /// Quantity `Q = e' + ae s₀ - Δt (1-α) γ sₜ` such that `s = Q / (ae + α Δt γ)`
    qq: Vector,

    /// Effective stress τ at t + Δt
    tau: f64,

    /// Flow-rule coefficient γ at τ(t + αΔt)
    gamma: f64,

    /// Derivative of γ with respect to τ
    dgamma: f64,

    /// Derivative of the objective function at the root
    dff: f64,
}

/// Implements a power-law Maxwell viscoelastic model
///
/// The viscous strain rate follows
///
/// ```text
/// dεᵛ/dt = γ s,   γ(τ) = ½ (τ/A)ⁿ⁻¹ / A,   τ = √(½ s:s)
/// ```
///
/// and is integrated with the generalized midpoint rule with parameter α,
/// i.e., the flow is evaluated at `τ(t + αΔt) = (1-α) τₜ + α τ`. The
/// effective stress τ at the end of the step is the root of
///
/// ```text
/// F(τ) = a² τ² - b + c γ - d² γ² = 0,   a = ae + α Δt γ
/// ```
///
/// with `ae = 1/(2μ)`, `b = ½ E:E`, `c = Δt (1-α) E:sₜ`, `d = Δt (1-α) τₜ`
/// and `E = e' + ae s₀`, where `e'` is the deviatoric strain minus the
/// viscous strain of the last step and `s₀` the initial deviatoric stress.
pub struct PowerLaw {
    /// Time-weighting parameter α
    alpha: f64,

    /// Maxwell time returned when the effective stress is zero
    maxwell_time_sentinel: f64,

    /// Scalar root finder
    solver: EffectiveStressSolver,

    /// Uses the elastic relation instead of the viscoelastic one
    elastic_behavior: bool,
}

impl PowerLaw {
    /// Allocates a new instance
    pub fn new(config: &Config) -> Self {
        PowerLaw {
            alpha: config.alpha,
            maxwell_time_sentinel: config.maxwell_time_sentinel,
            solver: EffectiveStressSolver::new(config),
            elastic_behavior: false,
        }
    }

    /// Returns the Maxwell time `(A/τ)ⁿ⁻¹ A/μ` or the sentinel if τ = 0
    pub fn maxwell_time(&self, props: &[f64], tau: f64) -> f64 {
        if tau <= 0.0 {
            return self.maxwell_time_sentinel;
        }
        let mu = props[PROP_SHEAR_MODULUS];
        let aa = props[PROP_VISCOSITY_COEFFICIENT];
        let n = props[PROP_POWER_LAW_EXPONENT];
        f64::powf(aa / tau, n - 1.0) * aa / mu
    }

    /// Returns the effective stress `√(½ s:s)` of a stress tensor
    fn effective_stress_of(stress: &Tensor2) -> f64 {
        let sig = stress.vector();
        let mut s = Vector::new(sig.dim());
        deviator(&mut s, sig);
        f64::sqrt(0.5 * ddot(&s, &s))
    }

    /// Performs the rate-dependent update (without modifying the history)
    fn update(&self, props: &[f64], state: &LocalState, input: &StrainInput) -> Result<ViscousUpdate, Error> {
        let mu = props[PROP_SHEAR_MODULUS];
        let lambda = props[PROP_LAMBDA];
        let visc = props[PROP_VISCOSITY_COEFFICIENT];
        let n = props[PROP_POWER_LAW_EXPONENT];
        let ae = 1.0 / (2.0 * mu);
        let bulk = lambda + 2.0 * mu / 3.0;
        let alpha = self.alpha;
        let dt = input.dt;
        let time_fac = dt * (1.0 - alpha);

        // strain minus initial strain
        let eps = input.strain.vector();
        let eps0 = input.initial_strain.vector();
        let dim = eps.dim();
        let mut eps_eff = Vector::new(dim);
        for i in 0..dim {
            eps_eff[i] = eps[i] - eps0[i];
        }
        let mean_strain = mean(&eps_eff);

        // deviatoric strain minus the viscous strain of the last step
        let mut e = Vector::new(dim);
        deviator(&mut e, &eps_eff);
        let visc_t = state.inelastic_strain.vector();
        for i in 0..dim {
            e[i] -= visc_t[i];
        }

        // initial and previous stresses
        let sig0 = input.initial_stress.vector();
        let mean_stress_0 = mean(sig0);
        let mut s0 = Vector::new(dim);
        deviator(&mut s0, sig0);
        let mut st = Vector::new(dim);
        deviator(&mut st, state.stress.vector());
        let tau_t = f64::sqrt(0.5 * ddot(&st, &st));

        // coefficients of the objective function
        let mut ee = Vector::new(dim);
        for i in 0..dim {
            ee[i] = e[i] + ae * s0[i];
        }
        let b = 0.5 * ddot(&ee, &ee);
        let c = time_fac * ddot(&ee, &st);
        let d = time_fac * tau_t;

        // flow-rule coefficient and its derivative with respect to τ
        let gamma_fn = |tau: f64| {
            let tau_tau = (1.0 - alpha) * tau_t + alpha * tau;
            let gamma = 0.5 * f64::powf(tau_tau / visc, n - 1.0) / visc;
            let dgamma = if tau_tau > 0.0 {
                alpha * 0.5 * (n - 1.0) * f64::powf(tau_tau / visc, n - 2.0) / (visc * visc)
            } else {
                0.0
            };
            (gamma, dgamma)
        };
        let objective = |tau: f64| {
            let (gamma, dgamma) = gamma_fn(tau);
            let a = ae + alpha * dt * gamma;
            let ff = a * a * tau * tau - b + c * gamma - d * d * gamma * gamma;
            let dff = 2.0 * a * a * tau + dgamma * (2.0 * a * alpha * dt * tau * tau + c - 2.0 * d * d * gamma);
            (ff, dff)
        };

        // solve for the effective stress
        let scale = if b > 0.0 { f64::sqrt(b) / ae } else { mu };
        let root = self.solver.solve(state.effective_stress, scale, objective)?;
        let tau = root.value;
        let (gamma, dgamma) = gamma_fn(tau);

        // deviatoric stress
        let factor1 = 1.0 / (ae + alpha * dt * gamma);
        let factor2 = time_fac * gamma;
        let mut qq = Vector::new(dim);
        let mut dev_stress = Vector::new(dim);
        for i in 0..dim {
            qq[i] = ee[i] - factor2 * st[i];
            dev_stress[i] = factor1 * qq[i];
        }
        Ok(ViscousUpdate {
            dev_stress,
            mean_stress: 3.0 * bulk * mean_strain + mean_stress_0,
            dev_stress_t: st,
            qq,
            tau,
            gamma,
            dgamma,
            dff: root.derivative,
        })
    }

    /// Computes the symmetrized consistent tangent
    ///
    /// ```text
    /// D = K I⊗I + f₁ Psymdev - (f₁ γ'/F') (α Δt s + Δt (1-α) sₜ) ⊗ Q
    /// ```
    ///
    /// The last term is symmetrized; only the upper triangle is computed.
    fn stiffness(&self, dd: &mut Tensor4, props: &[f64], upd: &ViscousUpdate, dt: f64) {
        let mu = props[PROP_SHEAR_MODULUS];
        let lambda = props[PROP_LAMBDA];
        let ae = 1.0 / (2.0 * mu);
        let bulk = lambda + 2.0 * mu / 3.0;
        let alpha = self.alpha;
        let time_fac = dt * (1.0 - alpha);
        let factor1 = 1.0 / (ae + alpha * dt * upd.gamma);
        let coef = if upd.dff != 0.0 {
            factor1 * upd.dgamma / upd.dff
        } else {
            0.0
        };
        let mat = dd.matrix_mut();
        let (n, _) = mat.dims();
        let mut w = Vector::new(n);
        for i in 0..n {
            w[i] = alpha * dt * upd.dev_stress[i] + time_fac * upd.dev_stress_t[i];
        }
        for i in 0..n {
            for j in i..n {
                let sym = 0.5 * (w[i] * upd.qq[j] + w[j] * upd.qq[i]);
                let value = bulk * I[i] * I[j] + factor1 * PSD[i][j] - coef * sym;
                mat.set(i, j, value);
                mat.set(j, i, value);
            }
        }
    }
}

impl StressStrainTrait for PowerLaw {
    fn db_names(&self) -> &'static [&'static str] {
        &["density", "vs", "vp", "viscosity_coefficient", "power_law_exponent"]
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["density", "shear_modulus", "lambda", "viscosity_coefficient", "power_law_exponent"]
    }

    fn state_vars(&self) -> &'static [StateVar] {
        &[
            StateVar::Stress,
            StateVar::TotalStrain,
            StateVar::ViscousStrain,
            StateVar::EffectiveStress,
            StateVar::MaxwellTime,
        ]
    }

    fn db_to_properties(&self, db: &[f64], scales: &Scales) -> Result<Vec<f64>, Error> {
        let elastic = elastic_properties(db, scales)?;
        let (visc, n) = (db[3], db[4]);
        if visc <= 0.0 {
            return Err(Error::Config(format!(
                "viscosity_coefficient = {:?} is incorrect; it must be > 0.0",
                visc
            )));
        }
        if n < 1.0 {
            return Err(Error::Config(format!(
                "power_law_exponent = {:?} is incorrect; it must be ≥ 1.0",
                n
            )));
        }
        let mut props = elastic.to_vec();
        props.push(visc / scales.viscosity_coefficient(n));
        props.push(n);
        Ok(props)
    }

    fn symmetric_stiffness(&self) -> bool {
        true
    }

    fn history_dependent(&self) -> bool {
        true
    }

    fn set_elastic_behavior(&mut self, flag: bool) {
        self.elastic_behavior = flag;
    }

    fn initialize_state(&self, state: &mut LocalState, props: &[f64], input: &StrainInput) -> Result<(), Error> {
        state.stress.vector_mut().set_vector(input.initial_stress.vector().as_data());
        state.total_strain.vector_mut().set_vector(input.initial_strain.vector().as_data());
        state.inelastic_strain.vector_mut().fill(0.0);
        state.effective_stress = PowerLaw::effective_stress_of(&state.stress);
        state.maxwell_time = self.maxwell_time(props, state.effective_stress);
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
            let tau = PowerLaw::effective_stress_of(stress);
            return Ok(Evaluation {
                effective_stress: tau,
                maxwell_time: self.maxwell_time(props, tau),
                plastic_multiplier: 0.0,
                need_new_jacobian: false,
            });
        }
        if !compute_from_history {
            // replay: committed stress with the instantaneous (elastic) tangent
            stress.vector_mut().set_vector(state.stress.vector().as_data());
            if let Some(dd) = dd {
                elastic_stiffness(dd, props);
            }
            return Ok(Evaluation {
                effective_stress: state.effective_stress,
                maxwell_time: state.maxwell_time,
                plastic_multiplier: 0.0,
                need_new_jacobian: false,
            });
        }
        let upd = self.update(props, state, input)?;
        let sig = stress.vector_mut();
        for i in 0..sig.dim() {
            sig[i] = upd.dev_stress[i] + upd.mean_stress * I[i];
        }
        if let Some(dd) = dd {
            if input.dt > 0.0 {
                self.stiffness(dd, props, &upd, input.dt);
            } else {
                elastic_stiffness(dd, props);
            }
        }
        Ok(Evaluation {
            effective_stress: upd.tau,
            maxwell_time: self.maxwell_time(props, upd.tau),
            plastic_multiplier: 0.0,
            need_new_jacobian: true,
        })
    }

    fn commit(&self, state: &mut LocalState, props: &[f64], input: &StrainInput) -> Result<(), Error> {
        if self.elastic_behavior {
            let mut stress = Tensor2::new(state.stress.mandel());
            elastic_stress(&mut stress, props, input, None);
            state.effective_stress = PowerLaw::effective_stress_of(&stress);
            state.maxwell_time = self.maxwell_time(props, state.effective_stress);
            state.stress = stress;
            state.total_strain.vector_mut().set_vector(input.strain.vector().as_data());
            state.inelastic_strain.vector_mut().fill(0.0);
            return Ok(());
        }
        let upd = self.update(props, state, input)?;
        let alpha = self.alpha;
        let dt = input.dt;
        let n = upd.dev_stress.dim();
        {
            // εᵛ ← εᵛ + Δt γ s(t + αΔt)
            let visc = state.inelastic_strain.vector_mut();
            for i in 0..n {
                let s_tau = (1.0 - alpha) * upd.dev_stress_t[i] + alpha * upd.dev_stress[i];
                visc[i] += dt * upd.gamma * s_tau;
            }
        }
        {
            let sig = state.stress.vector_mut();
            for i in 0..n {
                sig[i] = upd.dev_stress[i] + upd.mean_stress * I[i];
            }
        }
        state.total_strain.vector_mut().set_vector(input.strain.vector().as_data());
        state.effective_stress = upd.tau;
        state.maxwell_time = self.maxwell_time(props, upd.tau);
        Ok(())
    }

    /// Returns 1/10 of the Maxwell time
    fn stable_time_step_implicit(&self, _props: &[f64], state: &LocalState) -> f64 {
        0.1 * state.maxwell_time
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::PowerLaw;
    use crate::base::{Config, Error, Scales};
    use crate::material::testing::{check_minor_symmetry, check_tangent, elastic_input};
    use crate::material::{ddot, deviator, LinearElastic, LocalState, StrainInput, StressStrainTrait};
    use russell_lab::{approx_eq, Vector};
    use russell_tensor::{Mandel, Tensor2, Tensor4};

    // μ = 1, λ = 2, A = 0.5, n = 3.5
    const PROPS: [f64; 5] = [1.0, 1.0, 2.0, 0.5, 3.5];

    const STRAIN: [f64; 6] = [0.01, -0.02, 0.003, 0.015, 0.004, -0.002];

    #[test]
    fn db_to_properties_works() -> Result<(), Error> {
        let model = PowerLaw::new(&Config::new(3));
        let scales = Scales::from(1.0, 2.0, 4.0, 1.0).unwrap();
        let props = model.db_to_properties(&[1.0, 1.0, 2.0, 8.0, 2.0], &scales)?;
        assert_eq!(props.len(), 5);
        approx_eq(props[1], 0.5, 1e-15);
        approx_eq(props[2], 1.0, 1e-15);
        // 8 / (2 · 4^(1/2)) = 2
        approx_eq(props[3], 2.0, 1e-15);
        assert_eq!(props[4], 2.0);

        let scales = Scales::new();
        assert_eq!(
            model.db_to_properties(&[1.0, 1.0, 2.0, 0.0, 2.0], &scales).err(),
            Some(Error::Config(
                "viscosity_coefficient = 0.0 is incorrect; it must be > 0.0".to_string()
            ))
        );
        assert_eq!(
            model.db_to_properties(&[1.0, 1.0, 2.0, 1.0, 0.5], &scales).err(),
            Some(Error::Config(
                "power_law_exponent = 0.5 is incorrect; it must be ≥ 1.0".to_string()
            ))
        );
        assert_eq!(
            model.db_to_properties(&[-1.0, 1.0, 2.0, 1.0, 3.0], &scales).err(),
            Some(Error::Config("density = -1.0 is incorrect; it must be > 0.0".to_string()))
        );
        Ok(())
    }

    #[test]
    fn maxwell_time_works() {
        let model = PowerLaw::new(&Config::new(3));
        assert_eq!(model.maxwell_time(&PROPS, 0.0), 1e30);
        // (0.5/0.25)^2.5 · 0.5/1
        approx_eq(model.maxwell_time(&PROPS, 0.25), f64::powf(2.0, 2.5) * 0.5, 1e-14);
    }

    #[test]
    fn elastic_consistency_works() -> Result<(), Error> {
        for mandel in [Mandel::Symmetric2D, Mandel::Symmetric] {
            let config = Config::new(if mandel == Mandel::Symmetric2D { 2 } else { 3 });
            let elastic = LinearElastic::new(1e30);
            let mut viscous = PowerLaw::new(&config);
            let state = LocalState::new(mandel);
            let (strain, sig0, eps0) = elastic_input(mandel, &STRAIN);
            let mut sig_ela = Tensor2::new(mandel);
            let mut sig_vis = Tensor2::new(mandel);

            // zero history at t = 0 (Δt = 0)
            let input = StrainInput {
                strain: &strain,
                initial_stress: &sig0,
                initial_strain: &eps0,
                dt: 0.0,
            };
            elastic.evaluate(&mut sig_ela, None, &PROPS[0..3], &state, &input, true)?;
            viscous.evaluate(&mut sig_vis, None, &PROPS, &state, &input, true)?;
            for i in 0..sig_ela.vector().dim() {
                approx_eq(sig_vis.vector()[i], sig_ela.vector()[i], 1e-10);
            }

            // elastic behavior (first step)
            viscous.set_elastic_behavior(true);
            let input = StrainInput { dt: 0.5, ..input };
            viscous.evaluate(&mut sig_vis, None, &PROPS, &state, &input, true)?;
            for i in 0..sig_ela.vector().dim() {
                approx_eq(sig_vis.vector()[i], sig_ela.vector()[i], 1e-10);
            }
        }
        Ok(())
    }

    #[test]
    fn viscous_step_relaxes_and_satisfies_flow_rule() -> Result<(), Error> {
        let mandel = Mandel::Symmetric;
        let config = Config::new(3);
        let model = PowerLaw::new(&config);
        let (strain, sig0, eps0) = elastic_input(mandel, &STRAIN);
        let input = StrainInput {
            strain: &strain,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt: 0.5,
        };
        let state = LocalState::new(mandel);
        let mut sig_vis = Tensor2::new(mandel);
        let res = model.evaluate(&mut sig_vis, None, &PROPS, &state, &input, true)?;

        // effective stress of the computed stress equals the root
        let mut s = Vector::new(6);
        deviator(&mut s, sig_vis.vector());
        approx_eq(f64::sqrt(0.5 * ddot(&s, &s)), res.effective_stress, 1e-12);

        // relaxed stress is smaller than the elastic one
        let elastic = LinearElastic::new(1e30);
        let mut sig_ela = Tensor2::new(mandel);
        elastic.evaluate(&mut sig_ela, None, &PROPS[0..3], &state, &input, true)?;
        let mut s_ela = Vector::new(6);
        deviator(&mut s_ela, sig_ela.vector());
        assert!(res.effective_stress < f64::sqrt(0.5 * ddot(&s_ela, &s_ela)));

        // the mean stress is not affected
        approx_eq(
            (sig_vis.vector()[0] + sig_vis.vector()[1] + sig_vis.vector()[2]) / 3.0,
            (sig_ela.vector()[0] + sig_ela.vector()[1] + sig_ela.vector()[2]) / 3.0,
            1e-14,
        );

        // discrete flow rule: e' - ae s = Δt γ(ατ) α s  (zero history)
        let tau_a = 0.5 * res.effective_stress;
        let gamma = 0.5 * f64::powf(tau_a / 0.5, 2.5) / 0.5;
        let mut e = Vector::new(6);
        deviator(&mut e, strain.vector());
        for i in 0..6 {
            approx_eq(e[i] - 0.5 * s[i], 0.5 * gamma * 0.5 * s[i], 1e-12);
        }
        Ok(())
    }

    #[test]
    fn tangent_works() -> Result<(), Error> {
        for mandel in [Mandel::Symmetric2D, Mandel::Symmetric] {
            let config = Config::new(if mandel == Mandel::Symmetric2D { 2 } else { 3 });
            let model = PowerLaw::new(&config);
            let state = LocalState::new(mandel);
            let err = check_tangent(&model, &PROPS, &state, mandel, &STRAIN, 0.5)?;
            assert!(err < 1e-3, "relative error = {}", err);
            check_minor_symmetry(&model, &PROPS, &state, mandel, &STRAIN)?;
        }
        Ok(())
    }

    #[test]
    fn history_is_immutable_during_trials_and_commit_works() -> Result<(), Error> {
        let mandel = Mandel::Symmetric;
        let model = PowerLaw::new(&Config::new(3));
        let mut state = LocalState::new(mandel);
        let (strain, sig0, eps0) = elastic_input(mandel, &STRAIN);
        let input = StrainInput {
            strain: &strain,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt: 0.5,
        };
        model.commit(&mut state, &PROPS, &input)?;
        let before = state.clone();

        // trials
        let mut stress = Tensor2::new(mandel);
        let mut dd = Tensor4::new(mandel);
        let mut results = Vec::new();
        for k in 0..10 {
            let mut trial = strain.clone();
            trial.vector_mut()[0] += 0.001 * (k as f64);
            let input_k = StrainInput {
                strain: &trial,
                ..input
            };
            let res = model.evaluate(&mut stress, Some(&mut dd), &PROPS, &state, &input_k, true)?;
            results.push(res.effective_stress);
        }
        assert_eq!(state.stress.vector().as_data(), before.stress.vector().as_data());
        assert_eq!(
            state.inelastic_strain.vector().as_data(),
            before.inelastic_strain.vector().as_data()
        );
        assert_eq!(state.effective_stress, before.effective_stress);

        // determinism
        let mut trial = strain.clone();
        trial.vector_mut()[0] += 0.009;
        let input_9 = StrainInput {
            strain: &trial,
            ..input
        };
        let res = model.evaluate(&mut stress, None, &PROPS, &state, &input_9, true)?;
        assert_eq!(res.effective_stress, results[9]);

        // commit: viscous strain is consistent with the elastic relation
        let mut sig = Tensor2::new(mandel);
        model.evaluate(&mut sig, None, &PROPS, &state, &input_9, true)?;
        model.commit(&mut state, &PROPS, &input_9)?;
        assert_eq!(state.stress.vector().as_data(), sig.vector().as_data());
        let mut e = Vector::new(6);
        deviator(&mut e, trial.vector());
        let mut s = Vector::new(6);
        deviator(&mut s, sig.vector());
        for i in 0..6 {
            approx_eq(state.inelastic_strain.vector()[i], e[i] - 0.5 * s[i], 1e-12);
        }
        assert_eq!(state.total_strain.vector().as_data(), trial.vector().as_data());
        approx_eq(state.maxwell_time, model.maxwell_time(&PROPS, state.effective_stress), 1e-15);

        // replay returns the committed stress
        let mut replay = Tensor2::new(mandel);
        let res = model.evaluate(&mut replay, None, &PROPS, &state, &input_9, false)?;
        assert_eq!(replay.vector().as_data(), state.stress.vector().as_data());
        assert_eq!(res.effective_stress, state.effective_stress);
        assert!(!res.need_new_jacobian);

        // replay tangent does not depend on the trial strain
        let mut far = trial.clone();
        far.vector_mut()[1] -= 0.05;
        let input_far = StrainInput { strain: &far, ..input };
        let mut dd_replay = Tensor4::new(mandel);
        model.evaluate(&mut replay, Some(&mut dd_replay), &PROPS, &state, &input_far, false)?;
        let mut dd_elastic = Tensor4::new(mandel);
        let elastic = LinearElastic::new(1e30);
        elastic.evaluate(&mut sig, Some(&mut dd_elastic), &PROPS, &state, &input_far, true)?;
        assert_eq!(dd_replay.matrix().as_data(), dd_elastic.matrix().as_data());
        Ok(())
    }

    #[test]
    fn initialize_state_works() -> Result<(), Error> {
        let mandel = Mandel::Symmetric2D;
        let model = PowerLaw::new(&Config::new(2));
        let mut state = LocalState::new(mandel);
        let strain = Tensor2::new(mandel);
        let mut sig0 = Tensor2::new(mandel);
        sig0.vector_mut()[0] = -1.0;
        sig0.vector_mut()[1] = -0.5;
        sig0.vector_mut()[2] = -0.5;
        let eps0 = Tensor2::new(mandel);
        let input = StrainInput {
            strain: &strain,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt: 0.0,
        };
        model.initialize_state(&mut state, &PROPS, &input)?;
        assert_eq!(state.stress.vector().as_data(), &[-1.0, -0.5, -0.5, 0.0]);
        // s = (-1/3, 1/6, 1/6) → ½ s:s = ½ (1/9 + 2/36) = 1/12
        approx_eq(state.effective_stress, f64::sqrt(1.0 / 12.0), 1e-15);
        approx_eq(model.stable_time_step_implicit(&PROPS, &state), 0.1 * state.maxwell_time, 1e-15);
        Ok(())
    }
}
