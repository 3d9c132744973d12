use gemlab::mesh::{Cell, GeoKind, Mesh, Point};

/// Holds small meshes used in tests and documentation
pub struct SampleMeshes {}

impl SampleMeshes {
    /// Returns a mesh with one triangle (area = 0.5)
    ///
    /// ```text
    /// y
    /// 2
    /// | `.
    /// |   `.
    /// 0-----1 x
    /// ```
    #[rustfmt::skip]
    pub fn one_tri3() -> Mesh {
        Mesh {
            ndim: 2,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![0.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Tri3, points: vec![0, 1, 2] },
            ],
        }
    }

    /// Returns a mesh with two triangles sharing an edge (two vertices)
    ///
    /// ```text
    /// 3-----------2
    /// | `.    [1] |
    /// |   `.      |
    /// | [0] `.    |
    /// 0-----------1
    /// (0,0)       (2,0)
    /// ```
    #[rustfmt::skip]
    pub fn two_tri3() -> Mesh {
        Mesh {
            ndim: 2,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![2.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![2.0, 1.0] },
                Point { id: 3, marker: 0, coords: vec![0.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Tri3, points: vec![0, 1, 3] },
                Cell { id: 1, marker: 1, kind: GeoKind::Tri3, points: vec![1, 2, 3] },
            ],
        }
    }

    /// Returns the mesh of [SampleMeshes::two_tri3] with each cell in its own material
    pub fn two_tri3_two_materials() -> Mesh {
        let mut mesh = SampleMeshes::two_tri3();
        mesh.cells[1].marker = 2;
        mesh
    }

    /// Returns a mesh with two triangles sharing a single vertex (area = 0.5 each)
    ///
    /// ```text
    /// 2     4
    /// | `.  | `.
    /// | [0]`| [1]`.
    /// 0-----1-----3
    /// ```
    #[rustfmt::skip]
    pub fn two_tri3_one_vertex() -> Mesh {
        Mesh {
            ndim: 2,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![0.0, 1.0] },
                Point { id: 3, marker: 0, coords: vec![2.0, 0.0] },
                Point { id: 4, marker: 0, coords: vec![1.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Tri3, points: vec![0, 1, 2] },
                Cell { id: 1, marker: 1, kind: GeoKind::Tri3, points: vec![1, 3, 4] },
            ],
        }
    }

    /// Returns a mesh with one clockwise (inverted) triangle
    #[rustfmt::skip]
    pub fn inverted_tri3() -> Mesh {
        Mesh {
            ndim: 2,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![0.0, 1.0] },
                Point { id: 2, marker: 0, coords: vec![1.0, 0.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Tri3, points: vec![0, 1, 2] },
            ],
        }
    }

    /// Returns a 2D mesh with a segment (lower-dimension cell)
    #[rustfmt::skip]
    pub fn lin2_in_2d() -> Mesh {
        Mesh {
            ndim: 2,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Lin2, points: vec![0, 1] },
            ],
        }
    }

    /// Returns a mesh with one quadrilateral (2 × 1)
    #[rustfmt::skip]
    pub fn one_qua4() -> Mesh {
        Mesh {
            ndim: 2,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![2.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![2.0, 1.0] },
                Point { id: 3, marker: 0, coords: vec![0.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Qua4, points: vec![0, 1, 2, 3] },
            ],
        }
    }

    /// Returns a mesh with one tetrahedron (volume = 1/6)
    #[rustfmt::skip]
    pub fn one_tet4() -> Mesh {
        Mesh {
            ndim: 3,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![0.0, 1.0, 0.0] },
                Point { id: 3, marker: 0, coords: vec![0.0, 0.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Tet4, points: vec![0, 1, 2, 3] },
            ],
        }
    }

    /// Returns a mesh with one unit hexahedron
    #[rustfmt::skip]
    pub fn one_hex8() -> Mesh {
        Mesh {
            ndim: 3,
            marked_edges: Vec::new(),
            marked_faces: Vec::new(),
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![1.0, 1.0, 0.0] },
                Point { id: 3, marker: 0, coords: vec![0.0, 1.0, 0.0] },
                Point { id: 4, marker: 0, coords: vec![0.0, 0.0, 1.0] },
                Point { id: 5, marker: 0, coords: vec![1.0, 0.0, 1.0] },
                Point { id: 6, marker: 0, coords: vec![1.0, 1.0, 1.0] },
                Point { id: 7, marker: 0, coords: vec![0.0, 1.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, marker: 1, kind: GeoKind::Hex8, points: vec![0, 1, 2, 3, 4, 5, 6, 7] },
            ],
        }
    }

    /// Returns a column of unit quadrilaterals stacked along y
    ///
    /// The bottom points are 0 and 1; the points of row `r` are `2r` (left) and `2r + 1` (right).
    pub fn column_qua4(n_cells: usize) -> Mesh {
        let mut points = Vec::new();
        for r in 0..(n_cells + 1) {
            let y = r as f64;
            points.push(Point {
                id: 2 * r,
                marker: 0,
                coords: vec![0.0, y],
            });
            points.push(Point {
                id: 2 * r + 1,
                marker: 0,
                coords: vec![1.0, y],
            });
        }
        let cells = (0..n_cells)
            .map(|c| Cell {
                id: c,
                marker: 1,
                kind: GeoKind::Qua4,
                points: vec![2 * c, 2 * c + 1, 2 * c + 3, 2 * c + 2],
            })
            .collect();
        Mesh { ndim: 2, points, cells, marked_edges: Vec::new(), marked_faces: Vec::new() }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
