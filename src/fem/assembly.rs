use crate::base::Error;
use russell_lab::{Matrix, Vector};
use russell_sparse::CooMatrix;

/// Specifies a global matrix receiving (additively) elemental contributions
pub trait JacobianSink {
    /// Returns the number of rows
    fn nrow(&self) -> usize;

    /// Adds a value to the entry (i, j)
    fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), Error>;
}

impl JacobianSink for Matrix {
    fn nrow(&self) -> usize {
        self.dims().0
    }

    fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), Error> {
        let current = self.get(i, j);
        self.set(i, j, current + value);
        Ok(())
    }
}

impl JacobianSink for CooMatrix {
    fn nrow(&self) -> usize {
        self.get_info().0
    }

    /// Puts a new triplet; duplicates are summed when the matrix is converted
    fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), Error> {
        self.put(i, j, value).map_err(Error::from)
    }
}

/// Assembles an elemental vector into a global vector
///
/// # Input
///
/// * `r_local` -- elemental vector with length = `local_to_global.len()`
/// * `local_to_global` -- global indices of the local entries
#[inline]
pub fn assemble_vector(rr_global: &mut Vector, r_local: &[f64], local_to_global: &[usize]) {
    for (l, g) in local_to_global.iter().enumerate() {
        rr_global[*g] += r_local[l];
    }
}

/// Assembles an elemental matrix into a global matrix
///
/// # Input
///
/// * `kk_local` -- square elemental matrix with dims = (`local_to_global.len()`, `local_to_global.len()`)
/// * `local_to_global` -- global indices of the local rows and columns
pub fn assemble_matrix<S>(kk_global: &mut S, kk_local: &Matrix, local_to_global: &[usize]) -> Result<(), Error>
where
    S: JacobianSink + ?Sized,
{
    let n = local_to_global.len();
    for l in 0..n {
        let g = local_to_global[l];
        for ll in 0..n {
            let value = kk_local.get(l, ll);
            if value != 0.0 {
                kk_global.add(g, local_to_global[ll], value)?;
            }
        }
    }
    Ok(())
}

/// Adds the row sums of an elemental matrix into a global vector (lumping)
pub fn assemble_row_sums(lumped: &mut Vector, kk_local: &Matrix, local_to_global: &[usize]) {
    let n = local_to_global.len();
    for l in 0..n {
        let mut sum = 0.0;
        for ll in 0..n {
            sum += kk_local.get(l, ll);
        }
        lumped[local_to_global[l]] += sum;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
