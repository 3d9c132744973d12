use super::{compute_lumped_jacobian_inverse, IntegratorDomain, JacobianStatus, KernelRegistry};
use crate::base::{Config, Error, Essential, Field, Formulation, MeshService, ParamMaterial, ParameterSource, Scales};
use log::{info, warn};
use russell_lab::{solve_lin_sys, vec_norm, Matrix, Norm, Vector};

/// Specifies an observer of the solution (e.g., output writers)
pub trait Observer {
    /// Receives the solution after initialization (`info_only = true`) and after each accepted step
    fn update(&mut self, t: f64, step: usize, solution: &Field, info_only: bool) -> Result<(), Error>;
}

/// Holds the result of an attempted time step
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// The step converged and the history was committed
    Accepted,

    /// The step failed; the solution and the history are unchanged
    Rejected(String),
}

/// Specifies the nonlinear (or explicit) solver driving a time step
///
/// The solver receives the solution at `t` and must leave in `solution` the
/// solution at `t + dt`. It may call the residual and Jacobian callbacks of
/// the integrators as many times as needed but must never commit the history.
pub trait StepSolver {
    /// Solves a step; returns false if the step did not converge
    fn solve(
        &mut self,
        integrators: &mut [IntegratorDomain],
        essential: &Essential,
        t: f64,
        dt: f64,
        solution: &mut Field,
    ) -> Result<bool, Error>;
}

/// Returns the global indices and values of the prescribed displacements at time t
fn prescribed(essential: &Essential, solution: &Field, t: f64) -> Result<Vec<(usize, f64)>, Error> {
    if essential.all.is_empty() {
        return Ok(Vec::new());
    }
    let disp = solution.subfield_index("displacement")?;
    let n_components = solution.subfields[disp].n_components;
    let mut values = Vec::with_capacity(essential.all.len());
    for key in essential.sorted_keys() {
        let (point, dof) = key;
        if point >= solution.n_points || dof.component() >= n_components {
            return Err(Error::Config(format!(
                "essential boundary condition {:?} at point {} is not in the solution",
                dof, point
            )));
        }
        if let Some(ebc) = essential.all.get(&key) {
            values.push((solution.dof(point, disp, dof.component()), ebc.value(t)));
        }
    }
    Ok(values)
}

/// Implements a reference Newton-Raphson solver with a dense Jacobian
///
/// Solves `F(t + dt, s, (s - sₙ)/dt) - G(t + dt, s) = 0` (backward Euler for
/// the rate) with prescribed displacements enforced by replacing the rows of
/// the Jacobian with identity rows.
pub struct NewtonSolver {
    /// Absolute tolerance on the max norm of the residual
    pub tolerance: f64,

    /// Maximum number of iterations
    pub max_iterations: usize,

    /// Number of iterations of the last call
    pub n_iterations: usize,

    /// Number of Jacobian assemblies performed so far
    pub n_jacobians: usize,
}

impl NewtonSolver {
    /// Allocates a new instance
    pub fn new(config: &Config) -> Self {
        NewtonSolver {
            tolerance: config.newton_tolerance,
            max_iterations: config.newton_max_iterations,
            n_iterations: 0,
            n_jacobians: 0,
        }
    }
}

impl StepSolver for NewtonSolver {
    fn solve(
        &mut self,
        integrators: &mut [IntegratorDomain],
        essential: &Essential,
        t: f64,
        dt: f64,
        solution: &mut Field,
    ) -> Result<bool, Error> {
        if dt <= 0.0 {
            return Err(Error::Config(format!("dt = {:?} is incorrect; it must be > 0.0", dt)));
        }
        let t_new = t + dt;
        let neq = solution.dim();
        let previous = solution.clone();
        let fixed = prescribed(essential, solution, t_new)?;
        for (eq, value) in &fixed {
            solution.values[*eq] = *value;
        }

        let mut rate = solution.clone();
        let mut rr = Vector::new(neq);
        let mut rr_rhs = Vector::new(neq);
        let mut mdu = Vector::new(neq);
        self.n_iterations = 0;
        for iteration in 0..=self.max_iterations {
            // rate by backward Euler
            for i in 0..neq {
                rate.values[i] = (solution.values[i] - previous.values[i]) / dt;
            }

            // residual
            rr.fill(0.0);
            rr_rhs.fill(0.0);
            for integrator in integrators.iter_mut() {
                integrator.compute_lhs_residual(&mut rr, t_new, dt, solution, &rate)?;
                integrator.compute_rhs_residual(&mut rr_rhs, t_new, dt, solution)?;
            }
            for i in 0..neq {
                rr[i] -= rr_rhs[i];
            }
            for (eq, _) in &fixed {
                rr[*eq] = 0.0;
            }

            // check convergence
            let norm_rr = vec_norm(&rr, Norm::Max);
            if !norm_rr.is_finite() {
                return Err(Error::Numerical(format!("residual norm is not finite at iteration {}", iteration)));
            }
            if norm_rr < self.tolerance {
                return Ok(true);
            }
            if iteration == self.max_iterations {
                break;
            }

            // Jacobian
            let mut kk = Matrix::new(neq, neq);
            let mut kk_rhs = Matrix::new(neq, neq);
            for integrator in integrators.iter_mut() {
                integrator.compute_lhs_jacobian(&mut kk, None, t_new, dt, 1.0 / dt, solution, &rate)?;
                integrator.compute_rhs_jacobian(&mut kk_rhs, None, t_new, dt, solution)?;
            }
            self.n_jacobians += 1;
            for i in 0..neq {
                for j in 0..neq {
                    kk.set(i, j, kk.get(i, j) - kk_rhs.get(i, j));
                }
            }
            for (eq, _) in &fixed {
                for j in 0..neq {
                    kk.set(*eq, j, 0.0);
                }
                kk.set(*eq, *eq, 1.0);
            }

            // solve K · mdu = -R
            for i in 0..neq {
                mdu[i] = -rr[i];
            }
            solve_lin_sys(&mut mdu, &mut kk).map_err(|e| Error::Numerical(e.to_string()))?;
            for i in 0..neq {
                solution.values[i] += mdu[i];
            }
            self.n_iterations += 1;
        }
        Ok(false)
    }
}

/// Implements the explicit forward Euler update with the lumped LHS Jacobian
///
/// The rate is `ṡ = M⁻¹ G(t, s)`, where `M` is the lumped LHS Jacobian
/// (shift = 1). The inverse is reassembled only when an integrator reports a
/// stale LHS Jacobian.
pub struct ExplicitEuler {
    inverse: Option<Vector>,

    /// Number of lumped Jacobian assemblies performed so far
    pub n_lumped: usize,
}

impl ExplicitEuler {
    /// Allocates a new instance
    pub fn new() -> Self {
        ExplicitEuler {
            inverse: None,
            n_lumped: 0,
        }
    }
}

impl StepSolver for ExplicitEuler {
    fn solve(
        &mut self,
        integrators: &mut [IntegratorDomain],
        essential: &Essential,
        t: f64,
        dt: f64,
        solution: &mut Field,
    ) -> Result<bool, Error> {
        let neq = solution.dim();
        let stale = integrators.iter().any(|i| i.status.need_new_lhs);
        let current = match self.inverse.take() {
            Some(inverse) if !stale && inverse.dim() == neq => inverse,
            _ => {
                let mut inverse = Vector::new(neq);
                compute_lumped_jacobian_inverse(integrators, &mut inverse, t, dt, 1.0, solution)?;
                self.n_lumped += 1;
                inverse
            }
        };

        let mut gg = Vector::new(neq);
        for integrator in integrators.iter_mut() {
            integrator.compute_rhs_residual(&mut gg, t, dt, solution)?;
        }
        let previous = solution.values.clone();
        for i in 0..neq {
            solution.values[i] += dt * current[i] * gg[i];
        }
        self.inverse = Some(current);

        // prescribed displacements and the consistent velocity
        let fixed = prescribed(essential, solution, t + dt)?;
        let offsets = match solution.subfield_index("velocity") {
            Ok(v) => {
                let u = solution.subfield_index("displacement")?;
                Some((solution.subfields[u].offset, solution.subfields[v].offset))
            }
            Err(_) => None,
        };
        for (eq, value) in fixed {
            solution.values[eq] = value;
            if let Some((off_u, off_v)) = offsets {
                solution.values[eq - off_u + off_v] = (value - previous[eq]) / dt;
            }
        }
        Ok(solution.values.as_data().iter().all(|v| v.is_finite()))
    }
}

/// Coordinates the time stepping of a set of material regions
///
/// Each step runs `prestep`, the solver, and, if the solver converged, the
/// commit of the history and the notification of observers. A rejected step
/// leaves the solution and the history as they were.
pub struct TimeStepper {
    /// Configuration
    pub config: Config,

    /// Solution field over the mesh vertices
    pub solution: Field,

    /// Integrators, one per material region
    pub integrators: Vec<IntegratorDomain>,

    /// Essential boundary conditions
    pub essential: Essential,

    /// Current time
    pub t: f64,

    /// Number of accepted steps
    pub step: usize,

    /// Observers of the solution
    observers: Vec<Box<dyn Observer>>,

    /// Indicates that initialize has been called
    initialized: bool,
}

impl TimeStepper {
    /// Allocates a new instance
    ///
    /// The solution holds the displacement, plus the velocity for explicit dynamics.
    pub fn new(
        config: &Config,
        mesh: &dyn MeshService,
        materials: &[(ParamMaterial, &dyn ParameterSource)],
        scales: &Scales,
        essential: Essential,
    ) -> Result<Self, Error> {
        if materials.is_empty() {
            return Err(Error::Config("at least one material must be given".to_string()));
        }
        let mut solution = Field::new("solution", mesh.n_points());
        solution.add_subfield("displacement", config.ndim)?;
        if config.formulation == Formulation::Explicit {
            solution.add_subfield("velocity", config.ndim)?;
        }
        let mut integrators = Vec::with_capacity(materials.len());
        for (param, source) in materials {
            if integrators.iter().any(|i: &IntegratorDomain| i.label_value == param.label_value) {
                return Err(Error::Config(format!(
                    "material '{}' uses the label value {} of another material",
                    param.name, param.label_value
                )));
            }
            let mut integrator = IntegratorDomain::new(config, param, mesh, *source, scales)?;
            integrator.set_kernels(KernelRegistry::elasticity(config), &solution)?;
            integrators.push(integrator);
        }
        prescribed(&essential, &solution, 0.0)?;
        Ok(TimeStepper {
            config: config.clone(),
            solution,
            integrators,
            essential,
            t: 0.0,
            step: 0,
            observers: Vec::new(),
            initialized: false,
        })
    }

    /// Adds an observer
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    /// Sets the initial time and notifies the observers (info only)
    pub fn initialize(&mut self, t0: f64) -> Result<(), Error> {
        self.t = t0;
        self.step = 0;
        for (eq, value) in prescribed(&self.essential, &self.solution, t0)? {
            self.solution.values[eq] = value;
        }
        for integrator in self.integrators.iter_mut() {
            integrator.compute_derived_field(t0, 0.0, &self.solution)?;
        }
        self.notify(true)?;
        self.initialized = true;
        info!(
            "initialized {} material(s) with {} equations at t = {:?}",
            self.integrators.len(),
            self.solution.dim(),
            t0
        );
        Ok(())
    }

    /// Returns the combined Jacobian flags of all integrators
    pub fn jacobian_status(&self) -> JacobianStatus {
        let mut status = JacobianStatus {
            need_new_rhs: false,
            need_new_lhs: false,
        };
        for integrator in &self.integrators {
            status.merge(&integrator.status);
        }
        status
    }

    /// Returns the stable time step of the formulation (minimum over all regions)
    pub fn stable_time_step(&self) -> f64 {
        let mut dt = self.config.stable_dt_sentinel;
        for integrator in &self.integrators {
            let value = match self.config.formulation {
                Formulation::Quasistatic => integrator.stable_time_step_implicit(),
                Formulation::Explicit => integrator.stable_time_step_explicit(),
            };
            dt = f64::min(dt, value);
        }
        dt
    }

    /// Attempts one time step of size dt
    ///
    /// Recoverable (numerical) errors and non-convergence reject the step;
    /// other errors are returned.
    pub fn advance(&mut self, dt: f64, solver: &mut dyn StepSolver) -> Result<StepOutcome, Error> {
        if !self.initialized {
            return Err(Error::Config("initialize must be called before advance".to_string()));
        }
        let elastic_step = self.config.elastic_prestep && self.step == 0;
        for integrator in self.integrators.iter_mut() {
            integrator.set_elastic_behavior(elastic_step);
            integrator.prestep(self.t, dt);
        }

        let previous = self.solution.clone();
        match solver.solve(&mut self.integrators, &self.essential, self.t, dt, &mut self.solution) {
            Ok(true) => (),
            Ok(false) => {
                let error = Error::Numerical("solver did not converge".to_string());
                return self.reject(dt, &previous, error);
            }
            Err(e) => return self.reject(dt, &previous, e),
        }

        // all regions commit or none does
        let t_new = self.t + dt;
        let mut staged = Vec::with_capacity(self.integrators.len());
        for integrator in self.integrators.iter_mut() {
            match integrator.stage_state_vars(t_new, dt, &self.solution) {
                Ok(values) => staged.push(values),
                Err(e) => return self.reject(dt, &previous, e),
            }
        }
        for (integrator, values) in self.integrators.iter_mut().zip(staged) {
            if let Some(values) = values {
                integrator.commit_state_vars(values)?;
            }
            integrator.compute_derived_field(t_new, dt, &self.solution)?;
        }
        self.t = t_new;
        self.step += 1;
        if elastic_step {
            for integrator in self.integrators.iter_mut() {
                integrator.set_elastic_behavior(false);
            }
        }
        self.notify(false)?;
        Ok(StepOutcome::Accepted)
    }

    /// Runs until t_final, halving the time step after rejected steps
    pub fn run(&mut self, t_final: f64, dt: f64, solver: &mut dyn StepSolver) -> Result<(), Error> {
        if dt <= 0.0 {
            return Err(Error::Config(format!("dt = {:?} is incorrect; it must be > 0.0", dt)));
        }
        let mut dt = dt;
        let mut n_cuts = 0;
        while self.t < t_final - 1e-12 * dt {
            let h = f64::min(dt, t_final - self.t);
            match self.advance(h, solver)? {
                StepOutcome::Accepted => n_cuts = 0,
                StepOutcome::Rejected(reason) => {
                    if n_cuts == self.config.max_step_cuts {
                        return Err(Error::Numerical(format!(
                            "step rejected after {} time step cuts at t = {:?}: {}",
                            n_cuts, self.t, reason
                        )));
                    }
                    n_cuts += 1;
                    dt = h / 2.0;
                }
            }
        }
        Ok(())
    }

    /// Restores the solution of a failed step; recoverable errors reject the step
    fn reject(&mut self, dt: f64, previous: &Field, error: Error) -> Result<StepOutcome, Error> {
        self.solution.copy_values(previous)?;
        if !error.is_recoverable() {
            return Err(error);
        }
        let reason = error.to_string();
        warn!("step {} rejected (t = {:?}, dt = {:?}): {}", self.step + 1, self.t, dt, reason);
        Ok(StepOutcome::Rejected(reason))
    }

    /// Notifies all observers
    fn notify(&mut self, info_only: bool) -> Result<(), Error> {
        for observer in self.observers.iter_mut() {
            observer.update(self.t, self.step, &self.solution, info_only)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
