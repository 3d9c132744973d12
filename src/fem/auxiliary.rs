use crate::base::{Config, Error, Field, ParamMaterial, ParameterSource, Scales};
use crate::material::{mandel_from_components, LocalState, StateVar, StrainInput, StressStrainTrait, PROP_DENSITY};
use russell_tensor::{Mandel, Tensor2};

/// Names of the Cartesian components of symmetric tensors (Mandel order)
const COMPONENTS: [&str; 6] = ["xx", "yy", "zz", "xy", "yz", "xz"];

/// Holds the auxiliary field of a material region and the indices of its subfields
///
/// The points of the field are the quadrature points of the cells owned
/// by the region. The layout is: one subfield per material property, the
/// body force, the optional initial stress and strain, and the state
/// variables requested by the material.
#[derive(Clone)]
pub struct Auxiliary {
    /// Values at quadrature points
    pub field: Field,

    /// Number of material properties (the first subfields)
    pub n_properties: usize,

    /// Index of the body force subfield
    pub body_force: usize,

    /// Index of the initial stress subfield
    pub initial_stress: Option<usize>,

    /// Index of the initial strain subfield
    pub initial_strain: Option<usize>,

    /// Indices of the state variable subfields
    pub state_vars: Vec<(StateVar, usize)>,

    /// Mandel representation of tensors
    pub mandel: Mandel,
}

impl Auxiliary {
    /// Allocates a new instance (all values zero)
    pub fn new(
        n_points: usize,
        config: &Config,
        model: &dyn StressStrainTrait,
        param: &ParamMaterial,
    ) -> Result<Self, Error> {
        let mandel = config.mandel();
        let n_tensor = Tensor2::new(mandel).vector().dim();
        let mut field = Field::new("auxiliary", n_points);
        for name in model.property_names() {
            field.add_subfield(name, 1)?;
        }
        let body_force = field.add_subfield("body_force", config.ndim)?;
        let initial_stress = if param.initial_stress {
            Some(field.add_subfield("initial_stress", n_tensor)?)
        } else {
            None
        };
        let initial_strain = if param.initial_strain {
            Some(field.add_subfield("initial_strain", n_tensor)?)
        } else {
            None
        };
        let mut state_vars = Vec::new();
        for var in model.state_vars() {
            let index = field.add_subfield(var.name(), var.n_components(mandel))?;
            state_vars.push((*var, index));
        }
        Ok(Auxiliary {
            field,
            n_properties: model.property_names().len(),
            body_force,
            initial_stress,
            initial_strain,
            state_vars,
            mandel,
        })
    }

    /// Queries the parameter source at a quadrature point and initializes the values
    ///
    /// # Input
    ///
    /// * `point` -- index of the quadrature point in the auxiliary field
    /// * `x` -- non-dimensional coordinates of the quadrature point
    pub fn populate(
        &mut self,
        point: usize,
        x: &[f64],
        config: &Config,
        scales: &Scales,
        model: &dyn StressStrainTrait,
        source: &dyn ParameterSource,
    ) -> Result<(), Error> {
        let x_dim: Vec<f64> = x.iter().map(|v| v * scales.length).collect();

        // properties
        let db = source.query(&x_dim, model.db_names())?;
        let props = model.db_to_properties(&db, scales)?;
        for (i, value) in props.iter().enumerate() {
            self.field.set(point, i, &[*value])?;
        }

        // body force (gravity along the last axis)
        let mut body_force = vec![0.0; config.ndim];
        body_force[config.ndim - 1] = -props[PROP_DENSITY] * config.gravity;
        self.field.set(point, self.body_force, &body_force)?;

        // initial stress and strain
        let n_tensor = Tensor2::new(self.mandel).vector().dim();
        if let Some(index) = self.initial_stress {
            let names: Vec<String> = COMPONENTS[..n_tensor].iter().map(|c| format!("stress_{}", c)).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let values = source.query(&x_dim, &refs)?;
            let mut tt = Tensor2::new(self.mandel);
            let scaled: Vec<f64> = values.iter().map(|v| v / scales.pressure).collect();
            mandel_from_components(tt.vector_mut(), &scaled);
            self.field.set(point, index, tt.vector().as_data())?;
        }
        if let Some(index) = self.initial_strain {
            let names: Vec<String> = COMPONENTS[..n_tensor].iter().map(|c| format!("strain_{}", c)).collect();
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let values = source.query(&x_dim, &refs)?;
            let mut tt = Tensor2::new(self.mandel);
            mandel_from_components(tt.vector_mut(), &values);
            self.field.set(point, index, tt.vector().as_data())?;
        }

        // state variables
        let (sig0, eps0) = self.initial(point);
        let strain = eps0.clone();
        let input = StrainInput {
            strain: &strain,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt: 0.0,
        };
        let mut state = LocalState::new(self.mandel);
        model.initialize_state(&mut state, self.properties(point), &input)?;
        self.store_state(point, &state);
        Ok(())
    }

    /// Returns the material properties at a quadrature point
    pub fn properties(&self, point: usize) -> &[f64] {
        let start = self.field.dof(point, 0, 0);
        &self.field.values.as_data()[start..start + self.n_properties]
    }

    /// Returns the body force at a quadrature point
    pub fn body_force(&self, point: usize) -> &[f64] {
        self.field.get(point, self.body_force)
    }

    /// Returns the initial stress and initial strain (zero if not present)
    pub fn initial(&self, point: usize) -> (Tensor2, Tensor2) {
        let mut sig0 = Tensor2::new(self.mandel);
        let mut eps0 = Tensor2::new(self.mandel);
        if let Some(index) = self.initial_stress {
            sig0.vector_mut().as_mut_data().copy_from_slice(self.field.get(point, index));
        }
        if let Some(index) = self.initial_strain {
            eps0.vector_mut().as_mut_data().copy_from_slice(self.field.get(point, index));
        }
        (sig0, eps0)
    }

    /// Copies the state variables at a quadrature point into a local state
    pub fn load_state(&self, point: usize, state: &mut LocalState) {
        for (var, index) in &self.state_vars {
            state.read(*var, self.field.get(point, *index));
        }
    }

    /// Copies a local state into the state variables at a quadrature point
    pub fn store_state(&mut self, point: usize, state: &LocalState) {
        for (var, index) in &self.state_vars {
            state.write(*var, self.field.get_mut(point, *index));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
