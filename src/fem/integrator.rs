use super::{assemble_matrix, assemble_row_sums, assemble_vector, min_edge_length};
use super::{Auxiliary, CellGeometry, GeometryCache, JacobianKernels, JacobianSink, KernelRegistry};
use super::{PointData, ReferenceRule, ResidualKernels};
use crate::base::{Closure, Config, Error, Field, MeshService, ParamMaterial, ParameterSource, Scales};
use crate::base::MATERIAL_ID_LABEL;
use crate::material::{cartesian_t2, cartesian_t4, mandel_factor, strain_from_gradient};
use crate::material::{LocalState, StrainInput, StressStrain, PROP_DENSITY, PROP_LAMBDA, PROP_SHEAR_MODULUS};
use log::{debug, info};
use russell_lab::{Matrix, Vector};
use russell_tensor::{Tensor2, Tensor4};

/// Defines the lifecycle phase of an integrator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegratorPhase {
    /// Auxiliary field ready; no kernels bound
    Uninitialized,

    /// Kernels bound and resolved
    Configured,

    /// Inside a residual or Jacobian callback
    Assembling,

    /// A callback has completed
    Idle,
}

/// Holds the flags telling whether the Jacobian matrices must be reassembled
///
/// Both flags are true at construction. They are set whenever the material
/// history, the time step size, the bound kernels, or the elastic behavior
/// change, and only cleared by a successful Jacobian computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JacobianStatus {
    /// The RHS Jacobian is stale
    pub need_new_rhs: bool,

    /// The LHS Jacobian is stale
    pub need_new_lhs: bool,
}

impl JacobianStatus {
    /// Allocates a new instance with both flags set
    pub fn new() -> Self {
        JacobianStatus {
            need_new_rhs: true,
            need_new_lhs: true,
        }
    }

    /// Marks both Jacobian matrices as stale
    pub fn invalidate(&mut self) {
        self.need_new_rhs = true;
        self.need_new_lhs = true;
    }

    /// Combines the flags of another status (logical or)
    pub fn merge(&mut self, other: &JacobianStatus) {
        self.need_new_rhs |= other.need_new_rhs;
        self.need_new_lhs |= other.need_new_lhs;
    }
}

/// Selects the side of `F(t, s, ṡ) = G(t, s)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Rhs,
    Lhs,
}

/// Holds the solution values interpolated at a quadrature point
struct PointValues {
    s: Vec<f64>,
    s_t: Vec<f64>,
    s_x: Vec<f64>,
}

/// Holds the material response at a quadrature point in Cartesian form
struct PointResponse {
    stress: Vec<f64>,
    tangent: Vec<f64>,

    /// The tangent depends on the trial state
    need_new_jacobian: bool,
}

/// Implements the assembly of residuals and Jacobians over the cells of a material region
///
/// The integrator owns the auxiliary field of its region (material
/// properties and history at quadrature points). The history is only
/// modified by [IntegratorDomain::update_state_vars].
pub struct IntegratorDomain {
    /// Name of the material region
    pub name: String,

    /// Value of the material-id label
    pub label_value: usize,

    /// Configuration (copy)
    config: Config,

    /// Stress-strain model
    pub model: StressStrain,

    /// Bound kernels
    kernels: KernelRegistry,

    /// Indices of the cells owned by this region
    pub cells: Vec<usize>,

    /// Closures of the owned cells
    closures: Vec<Closure>,

    /// Reference rules, one per kind of cell
    rules: Vec<ReferenceRule>,

    /// Index of the reference rule of each owned cell
    cell_rule: Vec<usize>,

    /// Index of the first quadrature point of each owned cell in the auxiliary field
    cell_offset: Vec<usize>,

    /// Geometry cache (if enabled)
    cache: Option<GeometryCache>,

    /// Material properties, body force, initial values and history at quadrature points
    pub auxiliary: Auxiliary,

    /// Cell-wise Cauchy stress and strain (Cartesian components) from the last accepted step
    pub derived: Field,

    /// Lifecycle phase
    pub phase: IntegratorPhase,

    /// Jacobian flags
    pub status: JacobianStatus,

    /// Time step size of the last prestep
    last_dt: Option<f64>,

    /// Elastic behavior flag
    elastic_behavior: bool,
}

impl IntegratorDomain {
    /// Allocates a new instance and populates the auxiliary field
    ///
    /// The parameter source is queried once per quadrature point; all
    /// configuration errors are reported here.
    pub fn new(
        config: &Config,
        param: &ParamMaterial,
        mesh: &dyn MeshService,
        source: &dyn ParameterSource,
        scales: &Scales,
    ) -> Result<Self, Error> {
        if let Some(msg) = config.validate() {
            return Err(Error::Config(msg));
        }
        config.check_supported()?;
        if mesh.ndim() != config.ndim {
            return Err(Error::Config(format!(
                "mesh is {}D but the configuration is {}D",
                mesh.ndim(),
                config.ndim
            )));
        }
        let context = format!("material '{}'", param.name);

        // cells
        let cells = mesh
            .cells_in_label(MATERIAL_ID_LABEL, param.label_value)
            .map_err(|e| e.context(&context))?;
        if cells.is_empty() {
            return Err(Error::Config(format!(
                "material '{}' (label value {}) does not own any cell",
                param.name, param.label_value
            )));
        }

        // closures and rules
        let mut closures = Vec::with_capacity(cells.len());
        let mut rules: Vec<ReferenceRule> = Vec::new();
        let mut cell_rule = Vec::with_capacity(cells.len());
        let mut cell_offset = Vec::with_capacity(cells.len());
        let mut n_points = 0;
        for cell_id in &cells {
            let closure = mesh.closure(*cell_id).map_err(|e| e.context(&context))?;
            let index = match rules.iter().position(|r| r.kind == closure.kind) {
                Some(index) => index,
                None => {
                    rules.push(ReferenceRule::new(closure.kind)?);
                    rules.len() - 1
                }
            };
            cell_rule.push(index);
            cell_offset.push(n_points);
            n_points += rules[index].npoint();
            closures.push(closure);
        }

        // material and auxiliary field
        let model = StressStrain::new(config, &param.stress_strain)?;
        let mut auxiliary = Auxiliary::new(n_points, config, model.actual.as_ref(), param)?;
        for (c, closure) in closures.iter().enumerate() {
            let rule = &rules[cell_rule[c]];
            let geo = CellGeometry::compute(rule, &closure.coords, cells[c])?;
            for q in 0..rule.npoint() {
                auxiliary
                    .populate(cell_offset[c] + q, &geo.x[q], config, scales, model.actual.as_ref(), source)
                    .map_err(|e| e.context(&format!("{} (cell {})", context, cells[c])))?;
            }
        }

        // derived field
        let n_tensor = Tensor2::new(config.mandel()).vector().dim();
        let mut derived = Field::new("derived", cells.len());
        derived.add_subfield("cauchy_stress", n_tensor)?;
        derived.add_subfield("cauchy_strain", n_tensor)?;

        info!(
            "material '{}': {} cells, {} quadrature points",
            param.name,
            cells.len(),
            n_points
        );
        Ok(IntegratorDomain {
            name: param.name.clone(),
            label_value: param.label_value,
            config: config.clone(),
            model,
            kernels: KernelRegistry::new(),
            cells,
            closures,
            rules,
            cell_rule,
            cell_offset,
            cache: if config.cache_geometry {
                Some(GeometryCache::new())
            } else {
                None
            },
            auxiliary,
            derived,
            phase: IntegratorPhase::Uninitialized,
            status: JacobianStatus::new(),
            last_dt: None,
            elastic_behavior: false,
        })
    }

    /// Binds the kernels, resolving the subfield names against the solution field
    pub fn set_kernels(&mut self, mut kernels: KernelRegistry, solution: &Field) -> Result<(), Error> {
        if self.phase == IntegratorPhase::Assembling {
            return Err(Error::Config(format!(
                "cannot bind kernels of material '{}' while assembling",
                self.name
            )));
        }
        kernels.resolve(solution).map_err(|e| e.context(&format!("material '{}'", self.name)))?;
        if !solution.has_subfield("displacement") && kernels.needs_stress() {
            return Err(Error::Config(format!(
                "material '{}' requires a displacement subfield in the solution",
                self.name
            )));
        }
        self.kernels = kernels;
        self.phase = IntegratorPhase::Configured;
        self.status.invalidate();
        Ok(())
    }

    /// Switches the material between elastic and inelastic behavior
    pub fn set_elastic_behavior(&mut self, flag: bool) {
        if flag != self.elastic_behavior {
            self.model.actual.set_elastic_behavior(flag);
            self.elastic_behavior = flag;
            self.status.invalidate();
        }
    }

    /// Returns the number of owned cells
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Prepares a time step; a change in the time step size invalidates the Jacobian matrices
    pub fn prestep(&mut self, t: f64, dt: f64) {
        debug!("material '{}': prestep (t = {:?}, dt = {:?})", self.name, t, dt);
        if self.last_dt != Some(dt) {
            self.status.invalidate();
            self.last_dt = Some(dt);
        }
    }

    /// Completes an accepted time step: commits the history and computes the derived field
    pub fn poststep(&mut self, t: f64, dt: f64, solution: &Field) -> Result<(), Error> {
        debug!("material '{}': poststep (t = {:?}, dt = {:?})", self.name, t, dt);
        self.update_state_vars(t, dt, solution)?;
        self.compute_derived_field(t, dt, solution)
    }

    /// Computes the RHS residual G(t, s) and adds it to `residual`
    pub fn compute_rhs_residual(&mut self, residual: &mut Vector, t: f64, dt: f64, solution: &Field) -> Result<(), Error> {
        debug!("material '{}': compute_rhs_residual (t = {:?})", self.name, t);
        self.run_residual(Side::Rhs, residual, t, dt, solution, None)
    }

    /// Computes the LHS residual F(t, s, ṡ) and adds it to `residual`
    pub fn compute_lhs_residual(
        &mut self,
        residual: &mut Vector,
        t: f64,
        dt: f64,
        solution: &Field,
        solution_rate: &Field,
    ) -> Result<(), Error> {
        debug!("material '{}': compute_lhs_residual (t = {:?})", self.name, t);
        self.run_residual(Side::Lhs, residual, t, dt, solution, Some(solution_rate))
    }

    /// Computes the RHS Jacobian ∂G/∂s and adds it to `jacobian` (and to `precond` if given)
    pub fn compute_rhs_jacobian(
        &mut self,
        jacobian: &mut dyn JacobianSink,
        precond: Option<&mut dyn JacobianSink>,
        t: f64,
        dt: f64,
        solution: &Field,
    ) -> Result<(), Error> {
        debug!("material '{}': compute_rhs_jacobian (t = {:?})", self.name, t);
        self.run_jacobian(Side::Rhs, jacobian, precond, t, dt, 0.0, solution, None)?;
        self.status.need_new_rhs = false;
        Ok(())
    }

    /// Computes the LHS Jacobian ∂F/∂s + shift ∂F/∂ṡ and adds it to `jacobian` (and to `precond` if given)
    pub fn compute_lhs_jacobian(
        &mut self,
        jacobian: &mut dyn JacobianSink,
        precond: Option<&mut dyn JacobianSink>,
        t: f64,
        dt: f64,
        shift: f64,
        solution: &Field,
        solution_rate: &Field,
    ) -> Result<(), Error> {
        debug!(
            "material '{}': compute_lhs_jacobian (t = {:?}, shift = {:?})",
            self.name, t, shift
        );
        self.run_jacobian(Side::Lhs, jacobian, precond, t, dt, shift, solution, Some(solution_rate))?;
        self.status.need_new_lhs = false;
        Ok(())
    }

    /// Adds the row sums of the LHS Jacobian (lumped approximation) to `lumped`
    ///
    /// The row sums of one region are a partial result, thus the LHS flag is
    /// left unchanged; it is cleared by [compute_lumped_jacobian_inverse].
    pub fn compute_lhs_jacobian_lumped(
        &mut self,
        lumped: &mut Vector,
        t: f64,
        dt: f64,
        shift: f64,
        solution: &Field,
    ) -> Result<(), Error> {
        debug!("material '{}': compute_lhs_jacobian_lumped (t = {:?})", self.name, t);
        self.check_configured()?;
        if self.kernels.lhs_jacobian.is_empty() {
            return Ok(());
        }
        self.phase = IntegratorPhase::Assembling;
        let kernels = self.kernels.lhs_jacobian.clone();
        let res = (|| -> Result<(), Error> {
            for c in 0..self.cells.len() {
                let (kk, dofs) = self.cell_jacobian(c, &kernels, t, dt, shift, solution, solution)?;
                assemble_row_sums(lumped, &kk, &dofs);
            }
            Ok(())
        })();
        self.phase = IntegratorPhase::Idle;
        res
    }

    /// Computes the inverse of the lumped LHS Jacobian of this region alone
    ///
    /// Entries of `inverse` not touched by this region are zero before the
    /// inversion, thus this function requires the region to cover the whole
    /// solution. With several regions, use [compute_lumped_jacobian_inverse].
    pub fn compute_lhs_jacobian_lumped_inv(
        &mut self,
        inverse: &mut Vector,
        t: f64,
        dt: f64,
        shift: f64,
        solution: &Field,
    ) -> Result<(), Error> {
        compute_lumped_jacobian_inverse(std::slice::from_mut(self), inverse, t, dt, shift, solution)
    }

    /// Commits the material history at all quadrature points (accepted step only)
    pub fn update_state_vars(&mut self, t: f64, dt: f64, solution: &Field) -> Result<(), Error> {
        if let Some(staged) = self.stage_state_vars(t, dt, solution)? {
            self.commit_state_vars(staged)?;
        }
        Ok(())
    }

    /// Computes the committed history at all quadrature points without storing it
    ///
    /// Returns the new values of the auxiliary field, or None if the model
    /// has no state variables. Nothing is modified if an error occurs.
    pub fn stage_state_vars(&mut self, t: f64, dt: f64, solution: &Field) -> Result<Option<Vector>, Error> {
        debug!("material '{}': stage_state_vars (t = {:?}, dt = {:?})", self.name, t, dt);
        if self.auxiliary.state_vars.is_empty() {
            return Ok(None);
        }
        let ndim = self.config.ndim;
        let mandel = self.auxiliary.mandel;
        let disp = solution.subfield_index("displacement")?;
        let mut staged = self.auxiliary.clone();
        let mut strain = Tensor2::new(mandel);
        let mut state = LocalState::new(mandel);
        for c in 0..self.cells.len() {
            let geo = self.geometry(c)?;
            let dofs = solution.point_dofs(&self.closures[c].points);
            let mut s_local = vec![0.0; dofs.len()];
            solution.restrict(&dofs, &mut s_local);
            for q in 0..geo.det.len() {
                let point = self.cell_offset[c] + q;
                let grad = displacement_gradient(solution, disp, &s_local, &geo.gradients[q], ndim);
                strain_from_gradient(&mut strain, &grad, ndim);
                let (sig0, eps0) = self.auxiliary.initial(point);
                let input = StrainInput {
                    strain: &strain,
                    initial_stress: &sig0,
                    initial_strain: &eps0,
                    dt,
                };
                self.auxiliary.load_state(point, &mut state);
                self.model
                    .actual
                    .commit(&mut state, self.auxiliary.properties(point), &input)
                    .map_err(|e| e.context(&format!("material '{}' (cell {})", self.name, self.cells[c])))?;
                staged.store_state(point, &state);
            }
        }
        Ok(Some(staged.field.values))
    }

    /// Stores the history computed by [IntegratorDomain::stage_state_vars]
    pub fn commit_state_vars(&mut self, staged: Vector) -> Result<(), Error> {
        if staged.dim() != self.auxiliary.field.values.dim() {
            return Err(Error::External(format!(
                "material '{}': staged history has {} values but the auxiliary field has {}",
                self.name,
                staged.dim(),
                self.auxiliary.field.values.dim()
            )));
        }
        self.auxiliary.field.values = staged;
        if self.model.actual.history_dependent() {
            self.status.invalidate();
        }
        Ok(())
    }

    /// Computes the cell-averaged Cauchy stress and strain from the committed history
    ///
    /// The stress is read from the history (replay); it is not recomputed.
    pub fn compute_derived_field(&mut self, _t: f64, dt: f64, solution: &Field) -> Result<(), Error> {
        let ndim = self.config.ndim;
        let mandel = self.auxiliary.mandel;
        let disp = solution.subfield_index("displacement")?;
        let mut strain = Tensor2::new(mandel);
        let mut stress = Tensor2::new(mandel);
        let mut state = LocalState::new(mandel);
        let n_tensor = stress.vector().dim();
        for c in 0..self.cells.len() {
            let geo = self.geometry(c)?;
            let dofs = solution.point_dofs(&self.closures[c].points);
            let mut s_local = vec![0.0; dofs.len()];
            solution.restrict(&dofs, &mut s_local);
            let npoint = geo.det.len();
            let mut sum_stress = vec![0.0; n_tensor];
            let mut sum_strain = vec![0.0; n_tensor];
            for q in 0..npoint {
                let point = self.cell_offset[c] + q;
                let grad = displacement_gradient(solution, disp, &s_local, &geo.gradients[q], ndim);
                strain_from_gradient(&mut strain, &grad, ndim);
                let (sig0, eps0) = self.auxiliary.initial(point);
                let input = StrainInput {
                    strain: &strain,
                    initial_stress: &sig0,
                    initial_strain: &eps0,
                    dt,
                };
                self.auxiliary.load_state(point, &mut state);
                let replay = !self.auxiliary.state_vars.is_empty();
                self.model.actual.evaluate(
                    &mut stress,
                    None,
                    self.auxiliary.properties(point),
                    &state,
                    &input,
                    !replay,
                )?;
                for m in 0..n_tensor {
                    sum_stress[m] += stress.vector()[m] / mandel_factor(m);
                    sum_strain[m] += strain.vector()[m] / mandel_factor(m);
                }
            }
            let avg_stress: Vec<f64> = sum_stress.iter().map(|v| v / npoint as f64).collect();
            let avg_strain: Vec<f64> = sum_strain.iter().map(|v| v / npoint as f64).collect();
            self.derived.set(c, 0, &avg_stress)?;
            self.derived.set(c, 1, &avg_strain)?;
        }
        Ok(())
    }

    /// Returns the stable time step for implicit time stepping (minimum over quadrature points)
    pub fn stable_time_step_implicit(&self) -> f64 {
        let mandel = self.auxiliary.mandel;
        let mut state = LocalState::new(mandel);
        let mut dt = self.config.stable_dt_sentinel;
        for point in 0..self.auxiliary.field.n_points {
            self.auxiliary.load_state(point, &mut state);
            let value = self
                .model
                .actual
                .stable_time_step_implicit(self.auxiliary.properties(point), &state);
            dt = f64::min(dt, value);
        }
        dt
    }

    /// Returns the stable time step for explicit time stepping (minimum edge length over P-wave speed)
    pub fn stable_time_step_explicit(&self) -> f64 {
        let mut dt = self.config.stable_dt_sentinel;
        for c in 0..self.cells.len() {
            let rule = &self.rules[self.cell_rule[c]];
            let h = min_edge_length(rule, &self.closures[c].coords);
            for q in 0..rule.npoint() {
                let props = self.auxiliary.properties(self.cell_offset[c] + q);
                let (rho, mu, lambda) = (props[PROP_DENSITY], props[PROP_SHEAR_MODULUS], props[PROP_LAMBDA]);
                let vp = f64::sqrt((lambda + 2.0 * mu) / rho);
                dt = f64::min(dt, h / vp);
            }
        }
        dt
    }

    /// Returns the number of geometry computations performed by the cache (None if disabled)
    pub fn n_geometry_computations(&self) -> Option<usize> {
        self.cache.as_ref().map(|c| c.n_computed)
    }

    /// Replaces the coordinates of the owned cells (e.g., after a mesh update)
    pub fn update_coordinates(&mut self, mesh: &dyn MeshService) -> Result<(), Error> {
        for (c, cell_id) in self.cells.iter().enumerate() {
            self.closures[c] = mesh.closure(*cell_id)?;
        }
        Ok(())
    }

    // --- internal ------------------------------------------------------------------------------

    /// Checks that kernels are bound
    fn check_configured(&self) -> Result<(), Error> {
        match self.phase {
            IntegratorPhase::Configured | IntegratorPhase::Idle => Ok(()),
            IntegratorPhase::Uninitialized => Err(Error::Config(format!(
                "material '{}' does not have kernels bound",
                self.name
            ))),
            IntegratorPhase::Assembling => Err(Error::Config(format!(
                "material '{}' is already assembling",
                self.name
            ))),
        }
    }

    /// Returns the geometry of an owned cell (cached or recomputed)
    fn geometry(&mut self, c: usize) -> Result<CellGeometry, Error> {
        let rule = &self.rules[self.cell_rule[c]];
        let coords = &self.closures[c].coords;
        match self.cache.as_mut() {
            Some(cache) => cache.get(rule, coords, self.cells[c]).map(|g| g.clone()),
            None => CellGeometry::compute(rule, coords, self.cells[c]),
        }
    }

    /// Runs a residual callback keeping track of the phase
    fn run_residual(
        &mut self,
        side: Side,
        residual: &mut Vector,
        t: f64,
        dt: f64,
        solution: &Field,
        solution_rate: Option<&Field>,
    ) -> Result<(), Error> {
        self.check_configured()?;
        let kernels = match side {
            Side::Rhs => self.kernels.rhs_residual.clone(),
            Side::Lhs => self.kernels.lhs_residual.clone(),
        };
        if kernels.is_empty() {
            return Ok(());
        }
        if residual.dim() != solution.dim() {
            return Err(Error::Config(format!(
                "residual has {} entries but the solution has {}",
                residual.dim(),
                solution.dim()
            )));
        }
        self.phase = IntegratorPhase::Assembling;
        let rate = solution_rate.unwrap_or(solution);
        let res = (|| -> Result<bool, Error> {
            let mut stale = false;
            for c in 0..self.cells.len() {
                let (rr, dofs, stale_cell) = self.cell_residual(c, &kernels, t, dt, solution, rate)?;
                assemble_vector(residual, &rr, &dofs);
                stale |= stale_cell;
            }
            Ok(stale)
        })();
        self.phase = IntegratorPhase::Idle;

        // a new trial state makes a state-dependent tangent of this side stale
        if res? {
            match side {
                Side::Rhs => self.status.need_new_rhs = true,
                Side::Lhs => self.status.need_new_lhs = true,
            }
        }
        Ok(())
    }

    /// Runs a Jacobian callback keeping track of the phase
    fn run_jacobian(
        &mut self,
        side: Side,
        jacobian: &mut dyn JacobianSink,
        mut precond: Option<&mut dyn JacobianSink>,
        t: f64,
        dt: f64,
        shift: f64,
        solution: &Field,
        solution_rate: Option<&Field>,
    ) -> Result<(), Error> {
        self.check_configured()?;
        let kernels = match side {
            Side::Rhs => self.kernels.rhs_jacobian.clone(),
            Side::Lhs => self.kernels.lhs_jacobian.clone(),
        };
        if kernels.is_empty() {
            return Ok(());
        }
        self.phase = IntegratorPhase::Assembling;
        let rate = solution_rate.unwrap_or(solution);
        let res = (|| -> Result<(), Error> {
            for c in 0..self.cells.len() {
                let (kk, dofs) = self.cell_jacobian(c, &kernels, t, dt, shift, solution, rate)?;
                assemble_matrix(jacobian, &kk, &dofs)?;
                if let Some(pp) = precond.as_mut() {
                    assemble_matrix(&mut **pp, &kk, &dofs)?;
                }
            }
            Ok(())
        })();
        self.phase = IntegratorPhase::Idle;
        res
    }

    /// Interpolates the solution and its rate at a quadrature point
    fn interpolate(
        &self,
        rule: &ReferenceRule,
        geo: &CellGeometry,
        q: usize,
        fiber_dim: usize,
        s_local: &[f64],
        s_t_local: &[f64],
    ) -> PointValues {
        let ndim = self.config.ndim;
        let mut values = PointValues {
            s: vec![0.0; fiber_dim],
            s_t: vec![0.0; fiber_dim],
            s_x: vec![0.0; fiber_dim * ndim],
        };
        for m in 0..rule.nnode {
            let nm = rule.basis[q][m];
            for k in 0..fiber_dim {
                let v = s_local[m * fiber_dim + k];
                values.s[k] += nm * v;
                values.s_t[k] += nm * s_t_local[m * fiber_dim + k];
                for j in 0..ndim {
                    values.s_x[k * ndim + j] += geo.gradients[q].get(m, j) * v;
                }
            }
        }
        values
    }

    /// Evaluates the material (trial state) at a quadrature point
    fn respond(
        &self,
        point: usize,
        solution: &Field,
        values: &PointValues,
        dt: f64,
        with_tangent: bool,
    ) -> Result<PointResponse, Error> {
        let ndim = self.config.ndim;
        let mandel = self.auxiliary.mandel;
        let disp = solution.subfield_index("displacement")?;
        let off = solution.subfields[disp].offset;
        let grad = &values.s_x[off * ndim..(off + ndim) * ndim];
        let mut strain = Tensor2::new(mandel);
        strain_from_gradient(&mut strain, grad, ndim);
        let (sig0, eps0) = self.auxiliary.initial(point);
        let input = StrainInput {
            strain: &strain,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt,
        };
        let mut state = LocalState::new(mandel);
        self.auxiliary.load_state(point, &mut state);
        let mut stress = Tensor2::new(mandel);
        let mut response = PointResponse {
            stress: vec![0.0; ndim * ndim],
            tangent: Vec::new(),
            need_new_jacobian: false,
        };
        let props = self.auxiliary.properties(point);
        let evaluation = if with_tangent {
            let mut dd = Tensor4::new(mandel);
            let evaluation = self
                .model
                .actual
                .evaluate(&mut stress, Some(&mut dd), props, &state, &input, true)?;
            response.tangent = vec![0.0; ndim * ndim * ndim * ndim];
            cartesian_t4(&mut response.tangent, dd.matrix(), ndim);
            evaluation
        } else {
            self.model
                .actual
                .evaluate(&mut stress, None, props, &state, &input, true)?
        };
        response.need_new_jacobian = evaluation.need_new_jacobian;
        cartesian_t2(&mut response.stress, &stress, ndim);
        Ok(response)
    }

    /// Computes the elemental residual of an owned cell
    ///
    /// Returns the residual, the local-to-global map, and whether any
    /// material tangent depends on the trial state.
    fn cell_residual(
        &mut self,
        c: usize,
        kernels: &[ResidualKernels],
        t: f64,
        dt: f64,
        solution: &Field,
        solution_rate: &Field,
    ) -> Result<(Vec<f64>, Vec<usize>, bool), Error> {
        let geo = self.geometry(c)?;
        let rule = &self.rules[self.cell_rule[c]];
        let ndim = self.config.ndim;
        let fiber_dim = solution.fiber_dim;
        let dofs = solution.point_dofs(&self.closures[c].points);
        let mut s_local = vec![0.0; dofs.len()];
        let mut s_t_local = vec![0.0; dofs.len()];
        solution.restrict(&dofs, &mut s_local);
        solution_rate.restrict(&dofs, &mut s_t_local);
        let s_off: Vec<usize> = solution.subfields.iter().map(|s| s.offset).collect();
        let need_stress = kernels.iter().any(|k| k.f1.is_some());
        let mut rr = vec![0.0; dofs.len()];
        let mut stale = false;
        let mut f0 = vec![0.0; fiber_dim];
        let mut f1 = vec![0.0; fiber_dim * ndim];
        for q in 0..rule.npoint() {
            let point = self.cell_offset[c] + q;
            let values = self.interpolate(rule, &geo, q, fiber_dim, &s_local, &s_t_local);
            let response = if need_stress {
                self.respond(point, solution, &values, dt, false)
                    .map_err(|e| e.context(&format!("material '{}' (cell {})", self.name, self.cells[c])))?
            } else {
                PointResponse {
                    stress: vec![0.0; ndim * ndim],
                    tangent: Vec::new(),
                    need_new_jacobian: false,
                }
            };
            stale |= response.need_new_jacobian;
            let data = PointData {
                ndim,
                t,
                dt,
                shift: 0.0,
                x: &geo.x[q],
                s: &values.s,
                s_t: &values.s_t,
                s_x: &values.s_x,
                s_off: &s_off,
                density: self.auxiliary.properties(point)[PROP_DENSITY],
                body_force: self.auxiliary.body_force(point),
                stress: &response.stress,
                tangent: &response.tangent,
            };
            let coef = rule.weights[q] * geo.det[q];
            let grad = &geo.gradients[q];
            for kernel in kernels {
                let sub = &solution.subfields[kernel.index];
                let nc = sub.n_components;
                if let Some(f) = kernel.f0 {
                    f0.fill(0.0);
                    f(&data, &mut f0[..nc]);
                    for m in 0..rule.nnode {
                        let nm = rule.basis[q][m];
                        for i in 0..nc {
                            rr[m * fiber_dim + sub.offset + i] += coef * nm * f0[i];
                        }
                    }
                }
                if let Some(f) = kernel.f1 {
                    f1.fill(0.0);
                    f(&data, &mut f1[..nc * ndim]);
                    for m in 0..rule.nnode {
                        for i in 0..nc {
                            let mut sum = 0.0;
                            for j in 0..ndim {
                                sum += grad.get(m, j) * f1[i * ndim + j];
                            }
                            rr[m * fiber_dim + sub.offset + i] += coef * sum;
                        }
                    }
                }
            }
        }
        Ok((rr, dofs, stale))
    }

    /// Computes the elemental Jacobian of an owned cell
    fn cell_jacobian(
        &mut self,
        c: usize,
        kernels: &[JacobianKernels],
        t: f64,
        dt: f64,
        shift: f64,
        solution: &Field,
        solution_rate: &Field,
    ) -> Result<(Matrix, Vec<usize>), Error> {
        let geo = self.geometry(c)?;
        let rule = &self.rules[self.cell_rule[c]];
        let ndim = self.config.ndim;
        let fiber_dim = solution.fiber_dim;
        let dofs = solution.point_dofs(&self.closures[c].points);
        let mut s_local = vec![0.0; dofs.len()];
        let mut s_t_local = vec![0.0; dofs.len()];
        solution.restrict(&dofs, &mut s_local);
        solution_rate.restrict(&dofs, &mut s_t_local);
        let s_off: Vec<usize> = solution.subfields.iter().map(|s| s.offset).collect();
        let need_tangent = kernels.iter().any(|k| k.j1.is_some() || k.j2.is_some() || k.j3.is_some());
        let mut kk = Matrix::new(dofs.len(), dofs.len());
        let n_max = fiber_dim * fiber_dim * ndim * ndim;
        let mut out = vec![0.0; n_max];
        for q in 0..rule.npoint() {
            let point = self.cell_offset[c] + q;
            let values = self.interpolate(rule, &geo, q, fiber_dim, &s_local, &s_t_local);
            let response = if need_tangent {
                self.respond(point, solution, &values, dt, true)
                    .map_err(|e| e.context(&format!("material '{}' (cell {})", self.name, self.cells[c])))?
            } else {
                PointResponse {
                    stress: vec![0.0; ndim * ndim],
                    tangent: vec![0.0; ndim * ndim * ndim * ndim],
                    need_new_jacobian: false,
                }
            };
            let data = PointData {
                ndim,
                t,
                dt,
                shift,
                x: &geo.x[q],
                s: &values.s,
                s_t: &values.s_t,
                s_x: &values.s_x,
                s_off: &s_off,
                density: self.auxiliary.properties(point)[PROP_DENSITY],
                body_force: self.auxiliary.body_force(point),
                stress: &response.stress,
                tangent: &response.tangent,
            };
            let coef = rule.weights[q] * geo.det[q];
            let nn = &rule.basis[q];
            let grad = &geo.gradients[q];
            for kernel in kernels {
                let (sf, sg) = (&solution.subfields[kernel.test_index], &solution.subfields[kernel.trial_index]);
                let (nf, ng) = (sf.n_components, sg.n_components);
                let row = |m: usize, i: usize| m * fiber_dim + sf.offset + i;
                let col = |n: usize, k: usize| n * fiber_dim + sg.offset + k;
                if let Some(f) = kernel.j0 {
                    out.fill(0.0);
                    f(&data, &mut out[..nf * ng]);
                    for m in 0..rule.nnode {
                        for n in 0..rule.nnode {
                            for i in 0..nf {
                                for k in 0..ng {
                                    let v = coef * nn[m] * out[i * ng + k] * nn[n];
                                    JacobianSink::add(&mut kk, row(m, i), col(n, k), v)?;
                                }
                            }
                        }
                    }
                }
                if let Some(f) = kernel.j1 {
                    out.fill(0.0);
                    f(&data, &mut out[..nf * ng * ndim]);
                    for m in 0..rule.nnode {
                        for n in 0..rule.nnode {
                            for i in 0..nf {
                                for k in 0..ng {
                                    let mut sum = 0.0;
                                    for l in 0..ndim {
                                        sum += out[(i * ng + k) * ndim + l] * grad.get(n, l);
                                    }
                                    JacobianSink::add(&mut kk, row(m, i), col(n, k), coef * nn[m] * sum)?;
                                }
                            }
                        }
                    }
                }
                if let Some(f) = kernel.j2 {
                    out.fill(0.0);
                    f(&data, &mut out[..nf * ng * ndim]);
                    for m in 0..rule.nnode {
                        for n in 0..rule.nnode {
                            for i in 0..nf {
                                for k in 0..ng {
                                    let mut sum = 0.0;
                                    for j in 0..ndim {
                                        sum += grad.get(m, j) * out[(i * ng + k) * ndim + j];
                                    }
                                    JacobianSink::add(&mut kk, row(m, i), col(n, k), coef * sum * nn[n])?;
                                }
                            }
                        }
                    }
                }
                if let Some(f) = kernel.j3 {
                    out.fill(0.0);
                    f(&data, &mut out[..nf * ng * ndim * ndim]);
                    for m in 0..rule.nnode {
                        for n in 0..rule.nnode {
                            for i in 0..nf {
                                for k in 0..ng {
                                    let mut sum = 0.0;
                                    for j in 0..ndim {
                                        for l in 0..ndim {
                                            sum += grad.get(m, j)
                                                * out[((i * ng + k) * ndim + j) * ndim + l]
                                                * grad.get(n, l);
                                        }
                                    }
                                    JacobianSink::add(&mut kk, row(m, i), col(n, k), coef * sum)?;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok((kk, dofs))
    }
}

/// Returns the displacement gradient `∂uᵢ/∂xⱼ` at `[i * ndim + j]`
fn displacement_gradient(solution: &Field, disp: usize, s_local: &[f64], gradients: &Matrix, ndim: usize) -> Vec<f64> {
    let fiber_dim = solution.fiber_dim;
    let off = solution.subfields[disp].offset;
    let nnode = gradients.dims().0;
    let mut grad = vec![0.0; ndim * ndim];
    for m in 0..nnode {
        for i in 0..ndim {
            let u = s_local[m * fiber_dim + off + i];
            for j in 0..ndim {
                grad[i * ndim + j] += u * gradients.get(m, j);
            }
        }
    }
    grad
}

/// Computes the inverse of the lumped LHS Jacobian assembled over all regions
///
/// The row sums of all regions are summed before the inversion, so points
/// shared by regions get the full lumped value. The LHS flags are cleared
/// only if the inversion succeeds.
pub fn compute_lumped_jacobian_inverse(
    integrators: &mut [IntegratorDomain],
    inverse: &mut Vector,
    t: f64,
    dt: f64,
    shift: f64,
    solution: &Field,
) -> Result<(), Error> {
    inverse.fill(0.0);
    for integrator in integrators.iter_mut() {
        integrator.compute_lhs_jacobian_lumped(inverse, t, dt, shift, solution)?;
    }
    invert_lumped(inverse)?;
    for integrator in integrators.iter_mut() {
        integrator.status.need_new_lhs = false;
    }
    Ok(())
}

/// Inverts the lumped Jacobian entry by entry
///
/// A zero entry means a degenerate mass term and is reported as a numerical failure.
pub fn invert_lumped(lumped: &mut Vector) -> Result<(), Error> {
    for i in 0..lumped.dim() {
        if lumped[i] == 0.0 {
            return Err(Error::Numerical(format!(
                "lumped Jacobian entry {} is zero (degenerate mass)",
                i
            )));
        }
        lumped[i] = 1.0 / lumped[i];
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{compute_lumped_jacobian_inverse, invert_lumped, IntegratorDomain, IntegratorPhase, JacobianStatus};
    use crate::base::{Config, Error, Field, Formulation, ParamMaterial, ParamStressStrain};
    use crate::base::{SampleMeshes, SampleParams, Scales};
    use crate::fem::KernelRegistry;
    use russell_lab::{approx_eq, Matrix, Vector};

    fn quasistatic_solution(n_points: usize) -> Field {
        let mut solution = Field::new("solution", n_points);
        solution.add_subfield("displacement", 2).unwrap();
        solution
    }

    #[test]
    fn new_captures_errors() {
        let config = Config::new(2);
        let mesh = SampleMeshes::two_tri3();
        let source = SampleParams::source_elastic();
        let param = ParamMaterial::new("missing", 7, ParamStressStrain::LinearElastic);
        assert_eq!(
            IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new()).err(),
            Some(Error::Config(
                "material 'missing' (label value 7) does not own any cell".to_string()
            ))
        );

        let mesh = SampleMeshes::inverted_tri3();
        let param = ParamMaterial::new("crust", 1, ParamStressStrain::LinearElastic);
        let err = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new()).err().unwrap();
        assert!(err.is_recoverable());

        let mesh = SampleMeshes::one_tet4();
        assert_eq!(
            IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new()).err(),
            Some(Error::Config("mesh is 3D but the configuration is 2D".to_string()))
        );

        let mut config = Config::new(2);
        config.set_formulation(Formulation::Explicit).unwrap();
        config.set_incremental(false).unwrap();
        let mesh = SampleMeshes::two_tri3();
        assert_eq!(
            IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new()).err(),
            Some(Error::Unsupported(
                "non-incremental solution with explicit time integration".to_string()
            ))
        );
    }

    #[test]
    fn phases_and_flags_work() -> Result<(), Error> {
        let config = Config::new(2);
        let mesh = SampleMeshes::two_tri3();
        let source = SampleParams::source_elastic();
        let param = ParamMaterial::new("crust", 1, ParamStressStrain::LinearElastic);
        let mut integrator = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new())?;
        assert_eq!(integrator.phase, IntegratorPhase::Uninitialized);
        assert_eq!(integrator.status, JacobianStatus::new());
        assert_eq!(integrator.n_cells(), 2);

        let solution = quasistatic_solution(4);
        let mut jacobian = Matrix::new(8, 8);
        assert_eq!(
            integrator
                .compute_lhs_jacobian(&mut jacobian, None, 0.0, 1.0, 0.0, &solution, &solution)
                .err(),
            Some(Error::Config("material 'crust' does not have kernels bound".to_string()))
        );

        integrator.set_kernels(KernelRegistry::elasticity(&config), &solution)?;
        assert_eq!(integrator.phase, IntegratorPhase::Configured);

        // no RHS kernels: silent no-op
        let mut residual = Vector::new(8);
        integrator.compute_rhs_residual(&mut residual, 0.0, 1.0, &solution)?;
        assert_eq!(residual.as_data(), &[0.0; 8]);

        integrator.compute_lhs_jacobian(&mut jacobian, None, 0.0, 1.0, 0.0, &solution, &solution)?;
        assert_eq!(integrator.phase, IntegratorPhase::Idle);
        assert!(!integrator.status.need_new_lhs);
        assert!(integrator.status.need_new_rhs);
        integrator.compute_rhs_jacobian(&mut jacobian, None, 0.0, 1.0, &solution)?;
        assert!(!integrator.status.need_new_rhs);

        // elastic history is not history-dependent
        integrator.update_state_vars(1.0, 1.0, &solution)?;
        assert!(!integrator.status.need_new_lhs);

        // changing dt invalidates
        integrator.prestep(0.0, 1.0);
        assert!(integrator.status.need_new_lhs);
        integrator.compute_lhs_jacobian(&mut jacobian, None, 0.0, 1.0, 0.0, &solution, &solution)?;
        integrator.prestep(1.0, 1.0);
        assert!(!integrator.status.need_new_lhs);
        integrator.prestep(2.0, 0.5);
        assert!(integrator.status.need_new_lhs);

        let mut status = JacobianStatus {
            need_new_rhs: false,
            need_new_lhs: false,
        };
        status.merge(&integrator.status);
        assert!(status.need_new_lhs);
        Ok(())
    }

    #[test]
    fn trial_states_invalidate_state_dependent_tangents() -> Result<(), Error> {
        let config = Config::new(2);
        let mesh = SampleMeshes::one_qua4();
        let u = [0.0, 0.0, 0.001, 0.0, 0.001, -0.0005, 0.0, -0.0005];

        // power law: the tangent depends on the trial state
        let source = SampleParams::source_power_law();
        let param = ParamMaterial::new("mantle", 1, ParamStressStrain::PowerLaw);
        let mut integrator = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new())?;
        let mut solution = quasistatic_solution(4);
        integrator.set_kernels(KernelRegistry::elasticity(&config), &solution)?;
        integrator.prestep(0.0, 0.1);
        let mut kk = Matrix::new(8, 8);
        integrator.compute_lhs_jacobian(&mut kk, None, 0.1, 0.1, 10.0, &solution, &solution)?;
        assert!(!integrator.status.need_new_lhs);
        solution.values.as_mut_data().copy_from_slice(&u);
        let mut rr = Vector::new(8);
        integrator.compute_lhs_residual(&mut rr, 0.1, 0.1, &solution, &solution)?;
        assert!(integrator.status.need_new_lhs);

        // linear elastic: the tangent is constant
        let source = SampleParams::source_elastic();
        let param = ParamMaterial::new("crust", 1, ParamStressStrain::LinearElastic);
        let mut integrator = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new())?;
        let mut solution = quasistatic_solution(4);
        integrator.set_kernels(KernelRegistry::elasticity(&config), &solution)?;
        integrator.compute_lhs_jacobian(&mut kk, None, 0.1, 0.1, 10.0, &solution, &solution)?;
        solution.values.as_mut_data().copy_from_slice(&u);
        integrator.compute_lhs_residual(&mut rr, 0.1, 0.1, &solution, &solution)?;
        assert!(!integrator.status.need_new_lhs);
        Ok(())
    }

    #[test]
    fn lumped_inverse_clears_the_flag_only_on_success() -> Result<(), Error> {
        let mut config = Config::new(2);
        config.set_formulation(Formulation::Explicit).unwrap();
        let mesh = SampleMeshes::two_tri3_two_materials();
        let source = SampleParams::source_elastic();
        let mut solution = Field::new("solution", 4);
        solution.add_subfield("displacement", 2)?;
        solution.add_subfield("velocity", 2)?;
        let lower = ParamMaterial::new("lower", 1, ParamStressStrain::LinearElastic);
        let upper = ParamMaterial::new("upper", 2, ParamStressStrain::LinearElastic);
        let mut integrators = vec![
            IntegratorDomain::new(&config, &lower, &mesh, &source, &Scales::new())?,
            IntegratorDomain::new(&config, &upper, &mesh, &source, &Scales::new())?,
        ];
        for integrator in integrators.iter_mut() {
            integrator.set_kernels(KernelRegistry::elasticity(&config), &solution)?;
        }

        // one region alone does not cover point 2
        let mut inverse = Vector::new(16);
        let err = integrators[0]
            .compute_lhs_jacobian_lumped_inv(&mut inverse, 0.0, 0.1, 1.0, &solution)
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(integrators[0].status.need_new_lhs);

        // both regions
        compute_lumped_jacobian_inverse(&mut integrators, &mut inverse, 0.0, 0.1, 1.0, &solution)?;
        assert!(!integrators[0].status.need_new_lhs);
        assert!(!integrators[1].status.need_new_lhs);
        assert!(inverse.as_data().iter().all(|v| *v > 0.0));
        Ok(())
    }

    #[test]
    fn elastic_jacobian_is_symmetric_and_matches_residual() -> Result<(), Error> {
        let config = Config::new(2);
        let mesh = SampleMeshes::one_qua4();
        let source = SampleParams::source_elastic();
        let param = ParamMaterial::new("crust", 1, ParamStressStrain::LinearElastic);
        let mut integrator = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new())?;
        let mut solution = quasistatic_solution(4);
        integrator.set_kernels(KernelRegistry::elasticity(&config), &solution)?;
        let mut kk = Matrix::new(8, 8);
        integrator.compute_lhs_jacobian(&mut kk, None, 0.0, 1.0, 0.0, &solution, &solution)?;
        for i in 0..8 {
            for j in 0..8 {
                approx_eq(kk.get(i, j), kk.get(j, i), 1e-14);
            }
        }

        // linear material: R(u) = K u
        let u = [0.0, 0.0, 0.01, -0.002, 0.012, 0.003, -0.001, 0.004];
        solution.values.as_mut_data().copy_from_slice(&u);
        let mut rr = Vector::new(8);
        integrator.compute_lhs_residual(&mut rr, 0.0, 1.0, &solution, &solution)?;
        for i in 0..8 {
            let mut ku = 0.0;
            for j in 0..8 {
                ku += kk.get(i, j) * u[j];
            }
            approx_eq(rr[i], ku, 1e-13);
        }

        // rigid body motion has zero residual
        let rigid = [0.1, 0.2, 0.1, 0.2, 0.1, 0.2, 0.1, 0.2];
        solution.values.as_mut_data().copy_from_slice(&rigid);
        let mut rr = Vector::new(8);
        integrator.compute_lhs_residual(&mut rr, 0.0, 1.0, &solution, &solution)?;
        for i in 0..8 {
            approx_eq(rr[i], 0.0, 1e-15);
        }
        Ok(())
    }

    #[test]
    fn geometry_cache_is_used() -> Result<(), Error> {
        let mut config = Config::new(2);
        config.set_cache_geometry(true).unwrap();
        let mesh = SampleMeshes::two_tri3();
        let source = SampleParams::source_elastic();
        let param = ParamMaterial::new("crust", 1, ParamStressStrain::LinearElastic);
        let mut integrator = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new())?;
        let solution = quasistatic_solution(4);
        integrator.set_kernels(KernelRegistry::elasticity(&config), &solution)?;
        let mut rr = Vector::new(8);
        integrator.compute_lhs_residual(&mut rr, 0.0, 1.0, &solution, &solution)?;
        integrator.compute_lhs_residual(&mut rr, 0.0, 1.0, &solution, &solution)?;
        assert_eq!(integrator.n_geometry_computations(), Some(2));

        // moving the mesh recomputes the geometry
        let mut moved = SampleMeshes::two_tri3();
        moved.points[2].coords[0] = 3.0;
        integrator.update_coordinates(&moved)?;
        integrator.compute_lhs_residual(&mut rr, 0.0, 1.0, &solution, &solution)?;
        assert_eq!(integrator.n_geometry_computations(), Some(3));
        Ok(())
    }

    #[test]
    fn stable_time_steps_work() -> Result<(), Error> {
        let config = Config::new(2);
        let mesh = SampleMeshes::one_qua4();
        let source = SampleParams::source_elastic();
        let param = ParamMaterial::new("crust", 1, ParamStressStrain::LinearElastic);
        let integrator = IntegratorDomain::new(&config, &param, &mesh, &source, &Scales::new())?;
        assert_eq!(integrator.stable_time_step_implicit(), 1e30);
        // h = 1, vp = 2
        approx_eq(integrator.stable_time_step_explicit(), 0.5, 1e-15);
        Ok(())
    }

    #[test]
    fn invert_lumped_works() {
        let mut lumped = Vector::from(&[2.0, 4.0]);
        invert_lumped(&mut lumped).unwrap();
        assert_eq!(lumped.as_data(), &[0.5, 0.25]);
        let mut lumped = Vector::from(&[2.0, 0.0]);
        assert_eq!(
            invert_lumped(&mut lumped).err(),
            Some(Error::Numerical("lumped Jacobian entry 1 is zero (degenerate mass)".to_string()))
        );
    }
}
