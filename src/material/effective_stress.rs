use crate::base::{Config, Error};

/// Holds the results of the effective stress solver
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveStressSolution {
    /// Root (effective stress ≥ 0)
    pub value: f64,

    /// Derivative of the objective function at the root
    pub derivative: f64,

    /// Number of iterations of the safeguarded Newton phase
    pub iterations: usize,
}

/// Implements a scalar root finder for the effective stress
///
/// The root is first bracketed by expanding an interval around the initial
/// guess (never going below zero); then a Newton-Raphson iteration is run,
/// falling back to bisection whenever the Newton update leaves the bracket
/// or does not decrease fast enough. The lower end of the bracket stops at
/// zero; after that only the upper end expands.
///
/// The solver holds no mutable state, thus repeated calls with the same
/// arguments return the same result.
#[derive(Clone, Copy, Debug)]
pub struct EffectiveStressSolver {
    /// Relative tolerance on the step size
    tolerance: f64,

    /// Maximum number of Newton/bisection iterations
    max_iterations: usize,

    /// Expansion factor of the bracket
    bracket_factor: f64,

    /// Maximum number of bracket expansions
    bracket_max_iterations: usize,
}

impl EffectiveStressSolver {
    /// Allocates a new instance
    pub fn new(config: &Config) -> Self {
        EffectiveStressSolver {
            tolerance: config.root_tolerance,
            max_iterations: config.root_max_iterations,
            bracket_factor: config.bracket_factor,
            bracket_max_iterations: config.bracket_max_iterations,
        }
    }

    /// Finds the root of `f(x) = 0` with `x ≥ 0`
    ///
    /// # Input
    ///
    /// * `guess` -- initial guess (e.g., the effective stress of the previous step)
    /// * `scale` -- value used to build the initial bracket if the guess is not positive
    /// * `func` -- returns `(f(x), df/dx)`
    pub fn solve<F>(&self, guess: f64, scale: f64, func: F) -> Result<EffectiveStressSolution, Error>
    where
        F: Fn(f64) -> (f64, f64),
    {
        // bracket
        let center = if guess > 0.0 { guess } else { scale };
        let mut x1 = 0.5 * center;
        let mut x2 = 1.5 * center;
        let (mut f1, _) = func(x1);
        let (mut f2, _) = func(x2);
        let mut bracketed = f1 * f2 <= 0.0;
        let mut n_expansions = 0;
        while !bracketed && n_expansions < self.bracket_max_iterations {
            if f64::abs(f1) < f64::abs(f2) && x1 > 0.0 {
                x1 += self.bracket_factor * (x1 - x2);
                x1 = f64::max(x1, 0.0);
                f1 = func(x1).0;
            } else {
                x2 += self.bracket_factor * (x2 - x1);
                f2 = func(x2).0;
            }
            n_expansions += 1;
            bracketed = f1 * f2 <= 0.0;
        }
        if !bracketed {
            return Err(Error::Numerical(format!(
                "cannot bracket the effective stress after {} expansions (guess = {:?})",
                self.bracket_max_iterations, guess
            )));
        }
        if f1 == 0.0 {
            let (_, df) = func(x1);
            return Ok(EffectiveStressSolution {
                value: x1,
                derivative: df,
                iterations: 0,
            });
        }
        if f2 == 0.0 {
            let (_, df) = func(x2);
            return Ok(EffectiveStressSolution {
                value: x2,
                derivative: df,
                iterations: 0,
            });
        }

        // orient the bracket such that f(xl) < 0
        let (mut xl, mut xh) = if f1 < 0.0 { (x1, x2) } else { (x2, x1) };

        // safeguarded Newton
        let mut x = if guess > f64::min(x1, x2) && guess < f64::max(x1, x2) {
            guess
        } else {
            0.5 * (x1 + x2)
        };
        let mut dx_old = f64::abs(x2 - x1);
        let mut dx = dx_old;
        let (mut f, mut df) = func(x);
        for iteration in 0..self.max_iterations {
            let newton_out_of_range = ((x - xh) * df - f) * ((x - xl) * df - f) > 0.0;
            let newton_too_slow = f64::abs(2.0 * f) > f64::abs(dx_old * df);
            if newton_out_of_range || newton_too_slow {
                dx_old = dx;
                dx = 0.5 * (xh - xl);
                x = xl + dx;
            } else {
                dx_old = dx;
                dx = f / df;
                x -= dx;
            }
            let (fx, dfx) = func(x);
            f = fx;
            df = dfx;
            if f64::abs(dx) <= self.tolerance * f64::max(f64::abs(x), self.tolerance) || f == 0.0 {
                return Ok(EffectiveStressSolution {
                    value: x,
                    derivative: df,
                    iterations: iteration + 1,
                });
            }
            if f < 0.0 {
                xl = x;
            } else {
                xh = x;
            }
        }
        Err(Error::Numerical(format!(
            "effective stress solver did not converge after {} iterations (x = {:?}, f = {:?})",
            self.max_iterations, x, f
        )))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
