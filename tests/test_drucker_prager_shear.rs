use crustsim::base::{SampleMeshes, SampleParams};
use crustsim::material::{PROP_ALPHA_YIELD, PROP_BETA};
use crustsim::prelude::*;
use russell_lab::approx_eq;

/// Returns the Drucker-Prager yield function from Cartesian components (xx, yy, zz, xy)
fn yield_function(sigma: &[f64], alpha_yield: f64, beta: f64) -> f64 {
    let p = (sigma[0] + sigma[1] + sigma[2]) / 3.0;
    let (sx, sy, sz) = (sigma[0] - p, sigma[1] - p, sigma[2] - p);
    let j2 = 0.5 * (sx * sx + sy * sy + sz * sz) + sigma[3] * sigma[3];
    3.0 * alpha_yield * p + f64::sqrt(j2) - beta
}

#[test]
fn test_drucker_prager_simple_shear() -> Result<(), Error> {
    //  {Ux = 0.004 t, Uy = 0}
    //  3---------2
    //  |         |     homogeneous simple shear: γ = 0.004 t
    //  |         |
    //  0---------1
    //  {Ux = 0, Uy = 0}
    let config = Config::new(2);
    let mesh = SampleMeshes::column_qua4(1);
    let source = SampleParams::source_drucker_prager();
    let model = ParamStressStrain::DruckerPrager {
        fit: FitMohrCoulomb::Inscribed,
        allow_tensile_yield: false,
    };
    let param = ParamMaterial::new("crust", 1, model);
    let materials: [(ParamMaterial, &dyn ParameterSource); 1] = [(param, &source)];
    let mut essential = Essential::new();
    essential
        .at(&[0, 1, 2, 3], Ebc::Uy(|_| 0.0))
        .at(&[0, 1], Ebc::Ux(|_| 0.0))
        .at(&[2, 3], Ebc::Ux(|t| 0.004 * t));
    let mut stepper = TimeStepper::new(&config, &mesh, &materials, &Scales::new(), essential)?;
    stepper.initialize(0.0)?;
    let props = stepper.integrators[0].auxiliary.properties(0).to_vec();
    let (alpha_yield, beta) = (props[PROP_ALPHA_YIELD], props[PROP_BETA]);
    let mut solver = NewtonSolver::new(&config);

    let mut n_plastic = 0;
    for step in 1..7 {
        assert_eq!(stepper.advance(1.0, &mut solver)?, StepOutcome::Accepted);
        let gamma = 0.004 * (step as f64);
        let sigma = stepper.integrators[0].derived.get(0, 0).to_vec();
        if gamma < beta {
            // elastic: σxy = μ γ with μ = 1 and no mean stress
            approx_eq(sigma[3], gamma, 1e-15);
            approx_eq(sigma[0] + sigma[1] + sigma[2], 0.0, 1e-15);
            assert!(yield_function(&sigma, alpha_yield, beta) < 0.0);
        } else {
            // plastic: on the yield surface, with compaction from the constrained dilatancy
            n_plastic += 1;
            approx_eq(yield_function(&sigma, alpha_yield, beta), 0.0, 1e-12);
            assert!(sigma[3] < gamma);
            assert!(sigma[0] + sigma[1] + sigma[2] < 0.0);
        }
        assert!(stepper.jacobian_status().need_new_lhs);
    }
    assert_eq!(n_plastic, 4);
    Ok(())
}
