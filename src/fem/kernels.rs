use crate::base::{Config, Error, Field, Formulation};

/// Holds the values available to a pointwise kernel at a quadrature point
///
/// Tensors are given in Cartesian (full) form. The solution gradient is
/// stored such that `s_x[k * ndim + j] = ∂s_k/∂x_j`, where `k` runs over
/// all components of all solution subfields (fiber layout).
pub struct PointData<'a> {
    /// Space dimension
    pub ndim: usize,

    /// Current time
    pub t: f64,

    /// Time step size
    pub dt: f64,

    /// Shift coefficient ∂(solution rate)/∂(solution) of the time integrator
    pub shift: f64,

    /// Physical coordinates of the quadrature point
    pub x: &'a [f64],

    /// Solution values (fiber_dim)
    pub s: &'a [f64],

    /// Solution rate values (fiber_dim)
    pub s_t: &'a [f64],

    /// Solution gradient (fiber_dim × ndim)
    pub s_x: &'a [f64],

    /// Offset of each solution subfield in the fiber
    pub s_off: &'a [usize],

    /// Mass density
    pub density: f64,

    /// Body force vector (ndim)
    pub body_force: &'a [f64],

    /// Cauchy stress σ_ij at `[i * ndim + j]`
    pub stress: &'a [f64],

    /// Consistent tangent C_ijkl at `[((i * ndim + k) * ndim + j) * ndim + l]`
    pub tangent: &'a [f64],
}

/// Defines a pointwise kernel
///
/// The output slice has the size of the kernel role (see [ResidualKernels] and [JacobianKernels]).
pub type PointKernel = fn(&PointData, &mut [f64]);

/// Holds the residual kernels of one test subfield
///
/// * `f0` -- output (nc), multiplies the basis functions
/// * `f1` -- output (nc × ndim), multiplies the basis gradients
#[derive(Clone)]
pub struct ResidualKernels {
    /// Name of the test subfield
    pub subfield: String,

    /// Index of the test subfield (resolved at configuration)
    pub index: usize,

    /// Kernel multiplying the basis functions
    pub f0: Option<PointKernel>,

    /// Kernel multiplying the basis gradients
    pub f1: Option<PointKernel>,
}

/// Holds the Jacobian kernels of one (test, trial) pair of subfields
///
/// With `nf` and `ng` the number of components of the test and trial subfields:
///
/// * `j0` -- output (nf × ng), basis × basis
/// * `j1` -- output (nf × ng × ndim), basis × trial gradient
/// * `j2` -- output (nf × ng × ndim), test gradient × basis
/// * `j3` -- output (nf × ng × ndim × ndim), test gradient × trial gradient at `[((i * ng + k) * ndim + j) * ndim + l]`
#[derive(Clone)]
pub struct JacobianKernels {
    /// Name of the test subfield
    pub test: String,

    /// Name of the trial subfield
    pub trial: String,

    /// Index of the test subfield (resolved at configuration)
    pub test_index: usize,

    /// Index of the trial subfield (resolved at configuration)
    pub trial_index: usize,

    /// Basis × basis block
    pub j0: Option<PointKernel>,

    /// Basis × trial gradient block
    pub j1: Option<PointKernel>,

    /// Test gradient × basis block
    pub j2: Option<PointKernel>,

    /// Test gradient × trial gradient block
    pub j3: Option<PointKernel>,
}

impl ResidualKernels {
    /// Allocates a new binding (the index is resolved later)
    pub fn new(subfield: &str, f0: Option<PointKernel>, f1: Option<PointKernel>) -> Self {
        ResidualKernels {
            subfield: subfield.to_string(),
            index: usize::MAX,
            f0,
            f1,
        }
    }
}

impl JacobianKernels {
    /// Allocates a new binding (the indices are resolved later)
    pub fn new(
        test: &str,
        trial: &str,
        j0: Option<PointKernel>,
        j1: Option<PointKernel>,
        j2: Option<PointKernel>,
        j3: Option<PointKernel>,
    ) -> Self {
        JacobianKernels {
            test: test.to_string(),
            trial: trial.to_string(),
            test_index: usize::MAX,
            trial_index: usize::MAX,
            j0,
            j1,
            j2,
            j3,
        }
    }
}

/// Holds the kernels of a physics instance
///
/// RHS kernels build `G(t, s)` of `F(t, s, ṡ) = G(t, s)`; LHS kernels build `F`.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    pub rhs_residual: Vec<ResidualKernels>,
    pub lhs_residual: Vec<ResidualKernels>,
    pub rhs_jacobian: Vec<JacobianKernels>,
    pub lhs_jacobian: Vec<JacobianKernels>,
}

impl KernelRegistry {
    /// Allocates an empty registry
    pub fn new() -> Self {
        KernelRegistry::default()
    }

    /// Returns the elasticity kernels for the given formulation
    pub fn elasticity(config: &Config) -> Self {
        let mut reg = KernelRegistry::new();
        match config.formulation {
            Formulation::Quasistatic => {
                reg.lhs_residual
                    .push(ResidualKernels::new("displacement", Some(f0_body_force), Some(f1_stress)));
                reg.lhs_jacobian.push(JacobianKernels::new(
                    "displacement",
                    "displacement",
                    None,
                    None,
                    None,
                    Some(j3_tangent),
                ));
            }
            Formulation::Explicit => {
                reg.rhs_residual
                    .push(ResidualKernels::new("displacement", Some(g0_velocity), None));
                reg.rhs_residual
                    .push(ResidualKernels::new("velocity", Some(g0_body_force), Some(g1_stress)));
                reg.lhs_residual
                    .push(ResidualKernels::new("displacement", Some(f0_displacement_rate), None));
                reg.lhs_residual
                    .push(ResidualKernels::new("velocity", Some(f0_inertia), None));
                reg.lhs_jacobian.push(JacobianKernels::new(
                    "displacement",
                    "displacement",
                    Some(j0_shift),
                    None,
                    None,
                    None,
                ));
                reg.lhs_jacobian.push(JacobianKernels::new(
                    "velocity",
                    "velocity",
                    Some(j0_shift_density),
                    None,
                    None,
                    None,
                ));
            }
        }
        reg
    }

    /// Resolves the subfield names into indices
    ///
    /// Must be called once at configuration; the hot loops only use the indices.
    pub fn resolve(&mut self, solution: &Field) -> Result<(), Error> {
        for r in self.rhs_residual.iter_mut().chain(self.lhs_residual.iter_mut()) {
            r.index = solution
                .subfield_index(&r.subfield)
                .map_err(|e| e.context("cannot bind residual kernel"))?;
        }
        for j in self.rhs_jacobian.iter_mut().chain(self.lhs_jacobian.iter_mut()) {
            j.test_index = solution
                .subfield_index(&j.test)
                .map_err(|e| e.context("cannot bind Jacobian kernel"))?;
            j.trial_index = solution
                .subfield_index(&j.trial)
                .map_err(|e| e.context("cannot bind Jacobian kernel"))?;
        }
        Ok(())
    }

    /// Indicates whether the registry needs the stress at quadrature points
    pub fn needs_stress(&self) -> bool {
        !self.rhs_residual.is_empty() || !self.lhs_residual.is_empty()
    }
}

/// Residual f0 (quasistatic): `-b`
pub fn f0_body_force(p: &PointData, out: &mut [f64]) {
    for i in 0..p.ndim {
        out[i] = -p.body_force[i];
    }
}

/// Residual f1 (quasistatic): `σ`
pub fn f1_stress(p: &PointData, out: &mut [f64]) {
    let n = p.ndim * p.ndim;
    out[..n].copy_from_slice(&p.stress[..n]);
}

/// Jacobian j3 (quasistatic): `C`
pub fn j3_tangent(p: &PointData, out: &mut [f64]) {
    let n = p.ndim * p.ndim * p.ndim * p.ndim;
    out[..n].copy_from_slice(&p.tangent[..n]);
}

/// RHS g0 for displacement (explicit): `v`
pub fn g0_velocity(p: &PointData, out: &mut [f64]) {
    let off = p.s_off[1];
    out[..p.ndim].copy_from_slice(&p.s[off..off + p.ndim]);
}

/// RHS g0 for velocity (explicit): `b`
pub fn g0_body_force(p: &PointData, out: &mut [f64]) {
    out[..p.ndim].copy_from_slice(&p.body_force[..p.ndim]);
}

/// RHS g1 for velocity (explicit): `-σ`
pub fn g1_stress(p: &PointData, out: &mut [f64]) {
    for k in 0..p.ndim * p.ndim {
        out[k] = -p.stress[k];
    }
}

/// LHS f0 for displacement (explicit): `u̇`
pub fn f0_displacement_rate(p: &PointData, out: &mut [f64]) {
    let off = p.s_off[0];
    out[..p.ndim].copy_from_slice(&p.s_t[off..off + p.ndim]);
}

/// LHS f0 for velocity (explicit): `ρ v̇`
pub fn f0_inertia(p: &PointData, out: &mut [f64]) {
    let off = p.s_off[1];
    for i in 0..p.ndim {
        out[i] = p.density * p.s_t[off + i];
    }
}

/// LHS j0 for displacement (explicit): `shift δ_ik`
pub fn j0_shift(p: &PointData, out: &mut [f64]) {
    for i in 0..p.ndim {
        out[i * p.ndim + i] = p.shift;
    }
}

/// LHS j0 for velocity (explicit): `shift ρ δ_ik`
pub fn j0_shift_density(p: &PointData, out: &mut [f64]) {
    for i in 0..p.ndim {
        out[i * p.ndim + i] = p.shift * p.density;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
