use super::Error;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Holds the layout of a subfield within the fiber of a point
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Name of the subfield (e.g., "displacement")
    pub name: String,

    /// Number of components (fiber dimension of this subfield)
    pub n_components: usize,

    /// Offset of the first component within the fiber
    pub offset: usize,
}

/// Holds a named, ordered collection of subfields over a point set
///
/// The values are stored point-major: the fiber of point `p` starts at
/// `p * fiber_dim` and each subfield occupies `[offset, offset + n_components)`
/// within the fiber.
///
/// **Note:** adding a subfield reallocates the buffer (all values become zero);
/// thus the layout must be complete before any value is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field
    pub name: String,

    /// Number of points (vertices, cells, or quadrature points)
    pub n_points: usize,

    /// Subfields in order
    pub subfields: Vec<Subfield>,

    /// Number of values per point
    pub fiber_dim: usize,

    /// All values
    pub values: Vector,
}

impl Field {
    /// Allocates a new field without subfields
    pub fn new(name: &str, n_points: usize) -> Self {
        Field {
            name: name.to_string(),
            n_points,
            subfields: Vec::new(),
            fiber_dim: 0,
            values: Vector::new(0),
        }
    }

    /// Appends a subfield and returns its index
    pub fn add_subfield(&mut self, name: &str, n_components: usize) -> Result<usize, Error> {
        if n_components < 1 {
            return Err(Error::Config(format!(
                "subfield '{}' of field '{}' must have at least one component",
                name, self.name
            )));
        }
        if self.subfields.iter().any(|s| s.name == name) {
            return Err(Error::Config(format!(
                "field '{}' already has a subfield named '{}'",
                self.name, name
            )));
        }
        self.subfields.push(Subfield {
            name: name.to_string(),
            n_components,
            offset: self.fiber_dim,
        });
        self.fiber_dim += n_components;
        self.values = Vector::new(self.n_points * self.fiber_dim);
        Ok(self.subfields.len() - 1)
    }

    /// Returns the index of a subfield, given its name
    pub fn subfield_index(&self, name: &str) -> Result<usize, Error> {
        self.subfields.iter().position(|s| s.name == name).ok_or_else(|| {
            Error::Config(format!("field '{}' does not have a subfield named '{}'", self.name, name))
        })
    }

    /// Indicates whether a subfield exists or not
    pub fn has_subfield(&self, name: &str) -> bool {
        self.subfields.iter().any(|s| s.name == name)
    }

    /// Returns the total number of values
    pub fn dim(&self) -> usize {
        self.values.dim()
    }

    /// Returns the global index of a component of a subfield at a point
    #[inline]
    pub fn dof(&self, point: usize, subfield: usize, component: usize) -> usize {
        point * self.fiber_dim + self.subfields[subfield].offset + component
    }

    /// Returns the global indices of all values of the given points (point-major)
    pub fn point_dofs(&self, points: &[usize]) -> Vec<usize> {
        let mut dofs = Vec::with_capacity(points.len() * self.fiber_dim);
        for p in points {
            for k in 0..self.fiber_dim {
                dofs.push(p * self.fiber_dim + k);
            }
        }
        dofs
    }

    /// Returns the values of a subfield at a point
    pub fn get(&self, point: usize, subfield: usize) -> &[f64] {
        let start = self.dof(point, subfield, 0);
        &self.values.as_data()[start..start + self.subfields[subfield].n_components]
    }

    /// Returns the mutable values of a subfield at a point
    pub fn get_mut(&mut self, point: usize, subfield: usize) -> &mut [f64] {
        let start = self.dof(point, subfield, 0);
        let n = self.subfields[subfield].n_components;
        &mut self.values.as_mut_data()[start..start + n]
    }

    /// Sets the values of a subfield at a point
    pub fn set(&mut self, point: usize, subfield: usize, values: &[f64]) -> Result<(), Error> {
        let n = self.subfields[subfield].n_components;
        if values.len() != n {
            return Err(Error::Config(format!(
                "subfield '{}' of field '{}' has {} components but {} values were given",
                self.subfields[subfield].name,
                self.name,
                n,
                values.len()
            )));
        }
        self.get_mut(point, subfield).copy_from_slice(values);
        Ok(())
    }

    /// Copies the values of another field with the same layout
    pub fn copy_values(&mut self, other: &Field) -> Result<(), Error> {
        if other.values.dim() != self.values.dim() {
            return Err(Error::Config(format!(
                "cannot copy field '{}' into field '{}' because their sizes differ",
                other.name, self.name
            )));
        }
        self.values.as_mut_data().copy_from_slice(other.values.as_data());
        Ok(())
    }

    /// Gathers the values at the given global indices
    pub fn restrict(&self, dofs: &[usize], local: &mut [f64]) {
        for (l, g) in dofs.iter().enumerate() {
            local[l] = self.values[*g];
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
