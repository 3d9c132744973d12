use super::{cartesian_t4, mandel_from_components, LocalState, StrainInput, StressStrainTrait};
use crate::base::Error;
use russell_tensor::{Mandel, Tensor2, Tensor4};

/// Returns (strain, zero initial stress, zero initial strain) from Cartesian components (xx, yy, zz, xy, yz, xz)
pub(crate) fn elastic_input(mandel: Mandel, components: &[f64]) -> (Tensor2, Tensor2, Tensor2) {
    let mut strain = Tensor2::new(mandel);
    mandel_from_components(strain.vector_mut(), components);
    (strain, Tensor2::new(mandel), Tensor2::new(mandel))
}

/// Compares the analytical tangent with central finite differences of the stress
///
/// Returns the maximum absolute difference divided by the maximum absolute entry of the tangent.
pub(crate) fn check_tangent(
    model: &dyn StressStrainTrait,
    props: &[f64],
    state: &LocalState,
    mandel: Mandel,
    components: &[f64],
    dt: f64,
) -> Result<f64, Error> {
    let (strain, sig0, eps0) = elastic_input(mandel, components);
    let input = StrainInput {
        strain: &strain,
        initial_stress: &sig0,
        initial_strain: &eps0,
        dt,
    };
    let mut stress = Tensor2::new(mandel);
    let mut dd = Tensor4::new(mandel);
    model.evaluate(&mut stress, Some(&mut dd), props, state, &input, true)?;
    let (n, _) = dd.matrix().dims();

    let h = 1e-7;
    let mut max_entry: f64 = 0.0;
    let mut max_diff: f64 = 0.0;
    let mut sig_plus = Tensor2::new(mandel);
    let mut sig_minus = Tensor2::new(mandel);
    for j in 0..n {
        let mut eps_plus = strain.clone();
        let mut eps_minus = strain.clone();
        eps_plus.vector_mut()[j] += h;
        eps_minus.vector_mut()[j] -= h;
        let input_plus = StrainInput {
            strain: &eps_plus,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt,
        };
        let input_minus = StrainInput {
            strain: &eps_minus,
            initial_stress: &sig0,
            initial_strain: &eps0,
            dt,
        };
        model.evaluate(&mut sig_plus, None, props, state, &input_plus, true)?;
        model.evaluate(&mut sig_minus, None, props, state, &input_minus, true)?;
        for i in 0..n {
            let fd = (sig_plus.vector()[i] - sig_minus.vector()[i]) / (2.0 * h);
            let an = dd.matrix().get(i, j);
            max_entry = f64::max(max_entry, f64::abs(an));
            max_diff = f64::max(max_diff, f64::abs(fd - an));
        }
    }
    Ok(max_diff / f64::max(max_entry, f64::MIN_POSITIVE))
}

/// Checks (bitwise) the minor symmetries of the tangent in Cartesian form and, if applicable, the major symmetry
pub(crate) fn check_minor_symmetry(
    model: &dyn StressStrainTrait,
    props: &[f64],
    state: &LocalState,
    mandel: Mandel,
    components: &[f64],
) -> Result<(), Error> {
    let (strain, sig0, eps0) = elastic_input(mandel, components);
    let input = StrainInput {
        strain: &strain,
        initial_stress: &sig0,
        initial_strain: &eps0,
        dt: 0.1,
    };
    let mut stress = Tensor2::new(mandel);
    let mut dd = Tensor4::new(mandel);
    model.evaluate(&mut stress, Some(&mut dd), props, state, &input, true)?;
    let ndim = if mandel == Mandel::Symmetric2D { 2 } else { 3 };
    let mut c = vec![0.0; ndim * ndim * ndim * ndim];
    cartesian_t4(&mut c, dd.matrix(), ndim);
    let at = |i: usize, j: usize, k: usize, l: usize| c[((i * ndim + k) * ndim + j) * ndim + l];
    for i in 0..ndim {
        for j in 0..ndim {
            for k in 0..ndim {
                for l in 0..ndim {
                    assert_eq!(at(i, j, k, l), at(j, i, k, l));
                    assert_eq!(at(i, j, k, l), at(i, j, l, k));
                }
            }
        }
    }
    if model.symmetric_stiffness() {
        let (n, _) = dd.matrix().dims();
        for i in 0..n {
            for j in 0..n {
                assert_eq!(dd.matrix().get(i, j), dd.matrix().get(j, i));
            }
        }
    }
    Ok(())
}
