use crate::base::Error;
use gemlab::integ::Gauss;
use gemlab::mesh::GeoKind;
use gemlab::shapes::Scratchpad;
use russell_lab::{Matrix, Vector};
use std::collections::HashMap;

/// Holds a quadrature rule and the basis functions evaluated at its points
///
/// The rule is computed once per kind of cell and shared (read-only) by all
/// cells of that kind. Triangles and tetrahedra use the degree-2 rules
/// (3 and 4 points), thus the consistent mass matrix of linear cells is exact.
#[derive(Clone, Debug)]
pub struct ReferenceRule {
    /// Kind of cell
    pub kind: GeoKind,

    /// Dimension of the reference cell
    pub reference_dim: usize,

    /// Number of nodes (basis functions)
    pub nnode: usize,

    /// Reference coordinates of the quadrature points (npoint)
    pub points: Vec<Vec<f64>>,

    /// Quadrature weights (npoint)
    pub weights: Vec<f64>,

    /// Basis functions at the quadrature points (npoint, nnode)
    pub basis: Vec<Vec<f64>>,

    /// Local node pairs of the edges of the cell
    pub edges: Vec<(usize, usize)>,
}

impl ReferenceRule {
    /// Allocates a new instance
    pub fn new(kind: GeoKind) -> Result<Self, Error> {
        let n_gauss = match kind {
            GeoKind::Lin2 | GeoKind::Qua4 | GeoKind::Hex8 => None,
            GeoKind::Tri3 => Some(3),
            GeoKind::Tet4 => Some(4),
            _ => {
                return Err(Error::Unsupported(format!(
                    "cell kind {:?} is not available (use Lin2, Tri3, Qua4, Tet4, or Hex8)",
                    kind
                )))
            }
        };
        let gauss = Gauss::new_or_sized(kind, n_gauss)?;
        let reference_dim = kind.ndim();
        let nnode = kind.nnode();

        // basis functions at the integration points (reference space only)
        let mut pad = Scratchpad::new(usize::max(reference_dim, 2), kind)?;
        let npoint = gauss.npoint();
        let mut points = Vec::with_capacity(npoint);
        let mut weights = Vec::with_capacity(npoint);
        let mut basis = Vec::with_capacity(npoint);
        for p in 0..npoint {
            let ksi = gauss.coords(p);
            pad.calc_interp(ksi);
            points.push(ksi.to_vec());
            weights.push(gauss.weight(p));
            basis.push(pad.interp.as_data().to_vec());
        }

        // edges
        let edges = if kind.nedge() == 0 {
            vec![(0, nnode - 1)]
        } else {
            (0..kind.nedge())
                .map(|e| (kind.edge_node_id(e, 0), kind.edge_node_id(e, 1)))
                .collect()
        };
        Ok(ReferenceRule {
            kind,
            reference_dim,
            nnode,
            points,
            weights,
            basis,
            edges,
        })
    }

    /// Returns the number of quadrature points
    pub fn npoint(&self) -> usize {
        self.weights.len()
    }
}

/// Holds the geometry of a cell at its quadrature points
///
/// This is a transient snapshot computed for one visit of the cell, unless
/// the geometry cache is enabled.
#[derive(Clone, Debug)]
pub struct CellGeometry {
    /// Index of the cell
    pub cell_id: usize,

    /// Physical coordinates of the quadrature points (npoint, ndim)
    pub x: Vec<Vec<f64>>,

    /// Jacobian matrices dx/dξ (npoint) each (ndim, ndim)
    pub jacobian: Vec<Matrix>,

    /// Determinants of the Jacobian matrices (npoint)
    pub det: Vec<f64>,

    /// Gradients of the basis functions in physical space (npoint) each (nnode, ndim)
    pub gradients: Vec<Matrix>,
}

impl CellGeometry {
    /// Computes the geometry of a cell given the coordinates of its vertices
    ///
    /// # Input
    ///
    /// * `rule` -- the reference rule of the cell kind
    /// * `coords` -- (nnode, ndim) vertex coordinates
    /// * `cell_id` -- index of the cell (for error messages)
    pub fn compute(rule: &ReferenceRule, coords: &Matrix, cell_id: usize) -> Result<Self, Error> {
        let (nnode, ndim) = coords.dims();
        if rule.reference_dim != ndim {
            return Err(Error::Unsupported(format!(
                "cell {} ({:?}) has dimension {} but the space dimension is {}; embedded cells are not available",
                cell_id, rule.kind, rule.reference_dim, ndim
            )));
        }
        if nnode != rule.nnode {
            return Err(Error::External(format!(
                "cell {} ({:?}) must have {} vertices but {} were given",
                cell_id, rule.kind, rule.nnode, nnode
            )));
        }
        let mut pad = Scratchpad::new(ndim, rule.kind)?;
        for m in 0..nnode {
            for j in 0..ndim {
                pad.set_xx(m, j, coords.get(m, j));
            }
        }
        let npoint = rule.npoint();
        let mut x = Vec::with_capacity(npoint);
        let mut jacobian = Vec::with_capacity(npoint);
        let mut det = Vec::with_capacity(npoint);
        let mut gradients = Vec::with_capacity(npoint);
        let mut xp = Vector::new(ndim);
        for p in 0..npoint {
            let ksi = &rule.points[p];
            let det_p = pad.calc_gradient(ksi).map_err(|e| {
                Error::Numerical(format!("cell {} is degenerate at quadrature point {}: {}", cell_id, p, e))
            })?;
            if det_p <= 0.0 {
                return Err(Error::Numerical(format!(
                    "cell {} has a non-positive Jacobian determinant ({:?}) at quadrature point {}",
                    cell_id, det_p, p
                )));
            }
            pad.calc_coords(&mut xp, ksi)?;
            x.push(xp.as_data().to_vec());
            jacobian.push(pad.jacobian.clone());
            det.push(det_p);
            gradients.push(pad.gradient.clone());
        }
        Ok(CellGeometry {
            cell_id,
            x,
            jacobian,
            det,
            gradients,
        })
    }
}

/// Returns the minimum length of the edges of a cell
pub fn min_edge_length(rule: &ReferenceRule, coords: &Matrix) -> f64 {
    let ndim = coords.dims().1;
    let mut min_len = f64::MAX;
    for (a, b) in &rule.edges {
        let mut sum = 0.0;
        for i in 0..ndim {
            let d = coords.get(*b, i) - coords.get(*a, i);
            sum += d * d;
        }
        min_len = f64::min(min_len, f64::sqrt(sum));
    }
    min_len
}

/// Holds a cached geometry with the coordinates it was computed from
struct CachedGeometry {
    coords: Vec<f64>,
    geometry: CellGeometry,
}

/// Caches the geometry of cells
///
/// An entry is recomputed whenever the vertex coordinates of its cell
/// differ from the coordinates used to compute it.
pub struct GeometryCache {
    entries: HashMap<usize, CachedGeometry>,

    /// Number of geometry computations performed so far
    pub n_computed: usize,
}

impl GeometryCache {
    /// Allocates a new (empty) instance
    pub fn new() -> Self {
        GeometryCache {
            entries: HashMap::new(),
            n_computed: 0,
        }
    }

    /// Returns the cached geometry of a cell or computes it
    pub fn get(&mut self, rule: &ReferenceRule, coords: &Matrix, cell_id: usize) -> Result<&CellGeometry, Error> {
        let stale = match self.entries.get(&cell_id) {
            Some(entry) => entry.coords.as_slice() != coords.as_data(),
            None => true,
        };
        if stale {
            let geometry = CellGeometry::compute(rule, coords, cell_id)?;
            self.n_computed += 1;
            self.entries.insert(
                cell_id,
                CachedGeometry {
                    coords: coords.as_data().to_vec(),
                    geometry,
                },
            );
        }
        self.entries
            .get(&cell_id)
            .map(|entry| &entry.geometry)
            .ok_or_else(|| Error::External(format!("geometry of cell {} is not available", cell_id)))
    }

    /// Removes all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{min_edge_length, CellGeometry, GeometryCache, ReferenceRule};
    use crate::base::{Error, MeshService, SampleMeshes};
    use gemlab::mesh::GeoKind;
    use russell_lab::approx_eq;

    #[test]
    fn reference_rules_are_consistent() -> Result<(), Error> {
        let volumes = [
            (GeoKind::Lin2, 2.0),
            (GeoKind::Tri3, 0.5),
            (GeoKind::Qua4, 4.0),
            (GeoKind::Tet4, 1.0 / 6.0),
            (GeoKind::Hex8, 8.0),
        ];
        for (kind, volume) in volumes {
            let rule = ReferenceRule::new(kind)?;
            let sum: f64 = rule.weights.iter().sum();
            approx_eq(sum, volume, 1e-14);
            for p in 0..rule.npoint() {
                // partition of unity
                let sum_n: f64 = rule.basis[p].iter().sum();
                approx_eq(sum_n, 1.0, 1e-15);
            }
        }
        assert_eq!(ReferenceRule::new(GeoKind::Tri3)?.npoint(), 3);
        assert_eq!(ReferenceRule::new(GeoKind::Tet4)?.npoint(), 4);
        assert_eq!(ReferenceRule::new(GeoKind::Tet4)?.edges.len(), 6);
        assert_eq!(ReferenceRule::new(GeoKind::Hex8)?.edges.len(), 12);
        assert_eq!(
            ReferenceRule::new(GeoKind::Tri6).err(),
            Some(Error::Unsupported(
                "cell kind Tri6 is not available (use Lin2, Tri3, Qua4, Tet4, or Hex8)".to_string()
            ))
        );
        Ok(())
    }

    #[test]
    fn tri3_rule_integrates_quadratics_exactly() -> Result<(), Error> {
        // ∫ N0 N0 dA = A/6 and ∫ N0 N1 dA = A/12 over the reference triangle (A = 1/2)
        let rule = ReferenceRule::new(GeoKind::Tri3)?;
        let (mut m00, mut m01) = (0.0, 0.0);
        for p in 0..rule.npoint() {
            m00 += rule.weights[p] * rule.basis[p][0] * rule.basis[p][0];
            m01 += rule.weights[p] * rule.basis[p][0] * rule.basis[p][1];
        }
        approx_eq(m00, 1.0 / 12.0, 1e-15);
        approx_eq(m01, 1.0 / 24.0, 1e-15);
        Ok(())
    }

    #[test]
    fn compute_works() -> Result<(), Error> {
        let mesh = SampleMeshes::one_qua4();
        let closure = mesh.closure(0)?;
        let rule = ReferenceRule::new(closure.kind)?;
        let geo = CellGeometry::compute(&rule, &closure.coords, 0)?;
        // 2×1 rectangle: det = 2·1/4
        let mut area = 0.0;
        for p in 0..rule.npoint() {
            approx_eq(geo.det[p], 0.5, 1e-15);
            area += rule.weights[p] * geo.det[p];
            // gradients of a linear function x + 3y are exact
            let mut gx = 0.0;
            let mut gy = 0.0;
            for m in 0..rule.nnode {
                let f = closure.coords.get(m, 0) + 3.0 * closure.coords.get(m, 1);
                gx += geo.gradients[p].get(m, 0) * f;
                gy += geo.gradients[p].get(m, 1) * f;
            }
            approx_eq(gx, 1.0, 1e-14);
            approx_eq(gy, 3.0, 1e-14);
        }
        approx_eq(area, 2.0, 1e-15);
        approx_eq(min_edge_length(&rule, &closure.coords), 1.0, 1e-15);

        let mesh = SampleMeshes::one_tet4();
        let closure = mesh.closure(0)?;
        let rule = ReferenceRule::new(closure.kind)?;
        let geo = CellGeometry::compute(&rule, &closure.coords, 0)?;
        let volume: f64 = (0..rule.npoint()).map(|p| rule.weights[p] * geo.det[p]).sum();
        approx_eq(volume, 1.0 / 6.0, 1e-15);

        let mesh = SampleMeshes::one_hex8();
        let closure = mesh.closure(0)?;
        let rule = ReferenceRule::new(closure.kind)?;
        let geo = CellGeometry::compute(&rule, &closure.coords, 0)?;
        let volume: f64 = (0..rule.npoint()).map(|p| rule.weights[p] * geo.det[p]).sum();
        approx_eq(volume, 1.0, 1e-15);
        Ok(())
    }

    #[test]
    fn compute_captures_errors() -> Result<(), Error> {
        let mesh = SampleMeshes::inverted_tri3();
        let closure = mesh.closure(0)?;
        let rule = ReferenceRule::new(closure.kind)?;
        let err = CellGeometry::compute(&rule, &closure.coords, 0).unwrap_err();
        assert!(err.is_recoverable());

        let mesh = SampleMeshes::lin2_in_2d();
        let closure = mesh.closure(0)?;
        let rule = ReferenceRule::new(closure.kind)?;
        assert_eq!(
            CellGeometry::compute(&rule, &closure.coords, 0).err(),
            Some(Error::Unsupported(
                "cell 0 (Lin2) has dimension 1 but the space dimension is 2; embedded cells are not available"
                    .to_string()
            ))
        );
        Ok(())
    }

    #[test]
    fn geometry_cache_works() -> Result<(), Error> {
        let mesh = SampleMeshes::one_tri3();
        let closure = mesh.closure(0)?;
        let rule = ReferenceRule::new(closure.kind)?;
        let mut cache = GeometryCache::new();
        let det = cache.get(&rule, &closure.coords, 0)?.det[0];
        approx_eq(det, 1.0, 1e-15);
        cache.get(&rule, &closure.coords, 0)?;
        assert_eq!(cache.n_computed, 1);

        // moving a vertex invalidates the entry
        let mut coords = closure.coords.clone();
        coords.set(1, 0, 2.0);
        let det = cache.get(&rule, &coords, 0)?.det[0];
        approx_eq(det, 2.0, 1e-15);
        assert_eq!(cache.n_computed, 2);
        cache.clear();
        cache.get(&rule, &coords, 0)?;
        assert_eq!(cache.n_computed, 3);
        Ok(())
    }
}
