use super::Error;
use gemlab::mesh::{GeoKind, Mesh};
use russell_lab::Matrix;

/// Defines the name of the label holding the material (region) identifier of cells
pub const MATERIAL_ID_LABEL: &str = "material-id";

/// Holds the closure of a cell: its kind, vertex indices and vertex coordinates
pub struct Closure {
    /// Kind of cell
    pub kind: GeoKind,

    /// Global indices of the vertices (local-to-global map)
    pub points: Vec<usize>,

    /// Coordinates of the vertices (nnode, ndim)
    pub coords: Matrix,
}

/// Specifies the read-only queries the core performs on a mesh
pub trait MeshService {
    /// Returns the space dimension
    fn ndim(&self) -> usize;

    /// Returns the number of vertices
    fn n_points(&self) -> usize;

    /// Returns the cells whose label `label_name` has the value `label_value`
    fn cells_in_label(&self, label_name: &str, label_value: usize) -> Result<Vec<usize>, Error>;

    /// Returns the vertices and coordinates of a cell
    fn closure(&self, cell_id: usize) -> Result<Closure, Error>;
}

impl MeshService for Mesh {
    fn ndim(&self) -> usize {
        self.ndim
    }

    fn n_points(&self) -> usize {
        self.points.len()
    }

    fn cells_in_label(&self, label_name: &str, label_value: usize) -> Result<Vec<usize>, Error> {
        if label_name != MATERIAL_ID_LABEL {
            return Err(Error::Config(format!("mesh does not have a label named '{}'", label_name)));
        }
        Ok(self
            .cells
            .iter()
            .filter(|cell| cell.marker as usize == label_value)
            .map(|cell| cell.id)
            .collect())
    }

    fn closure(&self, cell_id: usize) -> Result<Closure, Error> {
        let cell = self
            .cells
            .get(cell_id)
            .ok_or_else(|| Error::External(format!("mesh does not have cell {}", cell_id)))?;
        let mut coords = Matrix::new(cell.points.len(), self.ndim);
        for (m, p) in cell.points.iter().enumerate() {
            let point = self
                .points
                .get(*p)
                .ok_or_else(|| Error::External(format!("cell {} refers to a missing point {}", cell_id, p)))?;
            if point.coords.len() != self.ndim {
                return Err(Error::External(format!(
                    "point {} has {} coordinates but the mesh is {}D",
                    p,
                    point.coords.len(),
                    self.ndim
                )));
            }
            for j in 0..self.ndim {
                coords.set(m, j, point.coords[j]);
            }
        }
        Ok(Closure {
            kind: cell.kind,
            points: cell.points.clone(),
            coords,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{MeshService, MATERIAL_ID_LABEL};
    use crate::base::{Error, SampleMeshes};
    use gemlab::mesh::GeoKind;

    #[test]
    fn cells_in_label_works() -> Result<(), Error> {
        let mesh = SampleMeshes::two_tri3_two_materials();
        assert_eq!(mesh.cells_in_label(MATERIAL_ID_LABEL, 1)?, &[0]);
        assert_eq!(mesh.cells_in_label(MATERIAL_ID_LABEL, 2)?, &[1]);
        assert_eq!(mesh.cells_in_label(MATERIAL_ID_LABEL, 3)?.len(), 0);
        assert_eq!(
            mesh.cells_in_label("boundary", 1).err(),
            Some(Error::Config("mesh does not have a label named 'boundary'".to_string()))
        );
        Ok(())
    }

    #[test]
    fn closure_works() -> Result<(), Error> {
        let mesh = SampleMeshes::two_tri3();
        assert_eq!(mesh.ndim(), 2);
        assert_eq!(mesh.n_points(), 4);
        let closure = mesh.closure(1)?;
        assert_eq!(closure.kind, GeoKind::Tri3);
        assert_eq!(closure.points, &[1, 2, 3]);
        assert_eq!(closure.coords.dims(), (3, 2));
        assert_eq!(closure.coords.get(1, 0), 2.0);
        assert_eq!(closure.coords.get(1, 1), 1.0);
        assert_eq!(
            mesh.closure(5).err(),
            Some(Error::External("mesh does not have cell 5".to_string()))
        );
        Ok(())
    }
}
