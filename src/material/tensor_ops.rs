use russell_lab::{Matrix, Vector};
use russell_tensor::{Tensor2, IDENTITY2};
use std::f64::consts::SQRT_2;

/// Defines an alias to IDENTITY2
const I: &[f64; 9] = &IDENTITY2;

/// Maps Mandel indices to (i, j) indices of the symmetric tensor
///
/// The 2D representation uses the first four entries.
pub const MANDEL_MAP: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (0, 2)];

/// Returns the Mandel index of the (i, j) component of a symmetric tensor
pub fn mandel_index(i: usize, j: usize) -> usize {
    match (i.min(j), i.max(j)) {
        (0, 0) => 0,
        (1, 1) => 1,
        (2, 2) => 2,
        (0, 1) => 3,
        (1, 2) => 4,
        _ => 5,
    }
}

/// Returns the Mandel scaling factor of a component (1 or √2)
#[inline]
pub fn mandel_factor(m: usize) -> f64 {
    if m < 3 {
        1.0
    } else {
        SQRT_2
    }
}

/// Returns the mean value (trace / 3) of a symmetric tensor given by its Mandel components
#[inline]
pub fn mean(v: &Vector) -> f64 {
    (v[0] + v[1] + v[2]) / 3.0
}

/// Computes the deviatoric part `dev = v - mean(v) I`
pub fn deviator(dev: &mut Vector, v: &Vector) {
    let m = mean(v);
    for i in 0..v.dim() {
        dev[i] = v[i] - m * I[i];
    }
}

/// Returns the double contraction `a : b` (equal to the dot product of Mandel vectors)
pub fn ddot(a: &Vector, b: &Vector) -> f64 {
    let mut sum = 0.0;
    for i in 0..a.dim() {
        sum += a[i] * b[i];
    }
    sum
}

/// Computes the small strain tensor from the displacement gradient
///
/// The gradient is given row-major with `grad[i * ndim + j] = ∂uᵢ/∂xⱼ`.
/// In 2D (plane-strain) the out-of-plane component is zero.
pub fn strain_from_gradient(eps: &mut Tensor2, grad: &[f64], ndim: usize) {
    let v = eps.vector_mut();
    v.fill(0.0);
    let n = v.dim();
    for m in 0..n {
        let (i, j) = MANDEL_MAP[m];
        if i < ndim && j < ndim {
            v[m] = mandel_factor(m) * 0.5 * (grad[i * ndim + j] + grad[j * ndim + i]);
        }
    }
}

/// Converts a symmetric tensor in Mandel form to the Cartesian components `out[i * ndim + j]`
pub fn cartesian_t2(out: &mut [f64], tt: &Tensor2, ndim: usize) {
    let v = tt.vector();
    for i in 0..ndim {
        for j in 0..ndim {
            let m = mandel_index(i, j);
            out[i * ndim + j] = v[m] / mandel_factor(m);
        }
    }
}

/// Converts a minor-symmetric fourth-order tensor in Mandel form (matrix) to Cartesian components
///
/// The output is `out[((i * ndim + k) * ndim + j) * ndim + l] = Cᵢⱼₖₗ`, i.e., the layout of the
/// `j3` Jacobian kernel with `(i, k)` as (trial, basis) components and `(j, l)` as derivative directions.
pub fn cartesian_t4(out: &mut [f64], dd: &Matrix, ndim: usize) {
    for i in 0..ndim {
        for j in 0..ndim {
            let a = mandel_index(i, j);
            for k in 0..ndim {
                for l in 0..ndim {
                    let b = mandel_index(k, l);
                    let c = dd.get(a, b) / (mandel_factor(a) * mandel_factor(b));
                    out[((i * ndim + k) * ndim + j) * ndim + l] = c;
                }
            }
        }
    }
}

/// Converts Cartesian components (xx, yy, zz, xy, yz, xz) of a symmetric tensor to Mandel components
///
/// Only the first `v.dim()` values of `components` are used.
pub fn mandel_from_components(v: &mut Vector, components: &[f64]) {
    for m in 0..v.dim() {
        v[m] = mandel_factor(m) * components[m];
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
