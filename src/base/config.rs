use super::Error;
use crate::StrError;
use russell_tensor::Mandel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines the time-stepping formulation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formulation {
    /// Quasi-static (implicit, inertia neglected); the solution holds the displacement only
    Quasistatic,

    /// Explicit dynamics with lumped mass; the solution holds displacement and velocity
    Explicit,
}

/// Holds configuration data for the simulation core
///
/// # Default values
///
/// * `alpha = 0.5` (time-weighting parameter for rate-dependent flow)
/// * `root_tolerance = 1e-12`, `root_max_iterations = 100`
/// * `bracket_factor = 1.6`, `bracket_max_iterations = 50`
/// * `maxwell_time_sentinel = stable_dt_sentinel = 1e30`
/// * `newton_tolerance = 1e-10`, `newton_max_iterations = 20`, `max_step_cuts = 4`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Space dimension (2 means plane-strain)
    pub ndim: usize,

    /// Time-stepping formulation
    pub formulation: Formulation,

    /// Solve for the increment of the solution (instead of the total solution)
    pub incremental: bool,

    /// Time-weighting parameter α for the rate-dependent flow rule (0 explicit, 1 fully implicit)
    pub alpha: f64,

    /// Relative tolerance of the effective-stress root finder
    pub root_tolerance: f64,

    /// Maximum number of root finder iterations (exceeding it is an error)
    pub root_max_iterations: usize,

    /// Expansion factor used when bracketing the effective stress
    pub bracket_factor: f64,

    /// Maximum number of bracket expansions
    pub bracket_max_iterations: usize,

    /// Maxwell time reported when the effective stress is zero
    pub maxwell_time_sentinel: f64,

    /// Stable time step reported by materials with no limit
    pub stable_dt_sentinel: f64,

    /// Keeps the cell geometry in memory between visits
    pub cache_geometry: bool,

    /// Gravity acceleration acting along the negative direction of the last axis
    pub gravity: f64,

    /// Absolute tolerance on the residual norm for the reference Newton driver
    pub newton_tolerance: f64,

    /// Maximum number of Newton iterations per step
    pub newton_max_iterations: usize,

    /// Maximum number of time step cuts after rejected steps
    pub max_step_cuts: usize,

    /// Uses elastic behavior for the first step of inelastic materials
    pub elastic_prestep: bool,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new(ndim: usize) -> Self {
        Config {
            ndim,
            formulation: Formulation::Quasistatic,
            incremental: true,
            alpha: 0.5,
            root_tolerance: 1e-12,
            root_max_iterations: 100,
            bracket_factor: 1.6,
            bracket_max_iterations: 50,
            maxwell_time_sentinel: 1e30,
            stable_dt_sentinel: 1e30,
            cache_geometry: false,
            gravity: 0.0,
            newton_tolerance: 1e-10,
            newton_max_iterations: 20,
            max_step_cuts: 4,
            elastic_prestep: false,
        }
    }

    /// Sets the time-stepping formulation
    pub fn set_formulation(&mut self, formulation: Formulation) -> Result<&mut Self, StrError> {
        self.formulation = formulation;
        Ok(self)
    }

    /// Sets the incremental solution option
    pub fn set_incremental(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.incremental = flag;
        Ok(self)
    }

    /// Sets the time-weighting parameter α
    pub fn set_alpha(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value < 0.0 || value > 1.0 {
            return Err("alpha must be in [0.0, 1.0]");
        }
        self.alpha = value;
        Ok(self)
    }

    /// Sets the root finder tolerance and maximum number of iterations
    pub fn set_root_finder(&mut self, tolerance: f64, max_iterations: usize) -> Result<&mut Self, StrError> {
        if tolerance <= 0.0 {
            return Err("root_tolerance must be > 0.0");
        }
        if max_iterations < 1 {
            return Err("root_max_iterations must be ≥ 1");
        }
        self.root_tolerance = tolerance;
        self.root_max_iterations = max_iterations;
        Ok(self)
    }

    /// Sets the bracketing parameters of the root finder
    pub fn set_bracketing(&mut self, factor: f64, max_iterations: usize) -> Result<&mut Self, StrError> {
        if factor <= 0.0 {
            return Err("bracket_factor must be > 0.0");
        }
        if max_iterations < 1 {
            return Err("bracket_max_iterations must be ≥ 1");
        }
        self.bracket_factor = factor;
        self.bracket_max_iterations = max_iterations;
        Ok(self)
    }

    /// Sets the Maxwell time reported for zero effective stress
    pub fn set_maxwell_time_sentinel(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 {
            return Err("maxwell_time_sentinel must be > 0.0");
        }
        self.maxwell_time_sentinel = value;
        Ok(self)
    }

    /// Enables or disables the geometry cache
    pub fn set_cache_geometry(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.cache_geometry = flag;
        Ok(self)
    }

    /// Sets the gravity acceleration
    pub fn set_gravity(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value < 0.0 {
            return Err("gravity must be ≥ 0.0");
        }
        self.gravity = value;
        Ok(self)
    }

    /// Sets the parameters of the reference Newton driver
    pub fn set_newton(&mut self, tolerance: f64, max_iterations: usize) -> Result<&mut Self, StrError> {
        if tolerance <= 0.0 {
            return Err("newton_tolerance must be > 0.0");
        }
        if max_iterations < 1 {
            return Err("newton_max_iterations must be ≥ 1");
        }
        self.newton_tolerance = tolerance;
        self.newton_max_iterations = max_iterations;
        Ok(self)
    }

    /// Sets the maximum number of time step cuts
    pub fn set_max_step_cuts(&mut self, value: usize) -> Result<&mut Self, StrError> {
        self.max_step_cuts = value;
        Ok(self)
    }

    /// Sets the elastic prestep option
    pub fn set_elastic_prestep(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.elastic_prestep = flag;
        Ok(self)
    }

    /// Returns the symmetric Mandel representation associated with the space dimension
    pub fn mandel(&self) -> Mandel {
        if self.ndim == 2 {
            Mandel::Symmetric2D
        } else {
            Mandel::Symmetric
        }
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.alpha < 0.0 || self.alpha > 1.0 {
            return Some(format!("alpha = {:?} is incorrect; it must be in [0.0, 1.0]", self.alpha));
        }
        if self.root_tolerance <= 0.0 {
            return Some(format!(
                "root_tolerance = {:?} is incorrect; it must be > 0.0",
                self.root_tolerance
            ));
        }
        if self.bracket_factor <= 0.0 {
            return Some(format!(
                "bracket_factor = {:?} is incorrect; it must be > 0.0",
                self.bracket_factor
            ));
        }
        if self.maxwell_time_sentinel <= 0.0 {
            return Some(format!(
                "maxwell_time_sentinel = {:?} is incorrect; it must be > 0.0",
                self.maxwell_time_sentinel
            ));
        }
        if self.gravity < 0.0 {
            return Some(format!("gravity = {:?} is incorrect; it must be ≥ 0.0", self.gravity));
        }
        None
    }

    /// Checks combinations that have no implementation
    pub fn check_supported(&self) -> Result<(), Error> {
        if self.ndim != 2 && self.ndim != 3 {
            return Err(Error::Unsupported(format!(
                "space dimension {} (only 2 and 3 are available)",
                self.ndim
            )));
        }
        if self.formulation == Formulation::Explicit && !self.incremental {
            return Err(Error::Unsupported(
                "non-incremental solution with explicit time integration".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n")?;
        write!(f, "==================\n")?;
        write!(f, "ndim = {:?}\n", self.ndim)?;
        write!(f, "formulation = {:?}\n", self.formulation)?;
        write!(f, "incremental = {:?}\n", self.incremental)?;
        write!(f, "alpha = {:?}\n", self.alpha)?;
        write!(f, "gravity = {:?}\n", self.gravity)?;
        write!(f, "cache_geometry = {:?}\n", self.cache_geometry)?;
        write!(f, "elastic_prestep = {:?}\n", self.elastic_prestep)?;
        write!(f, "\nEffective stress root finder\n")?;
        write!(f, "============================\n")?;
        write!(f, "root_tolerance = {:?}\n", self.root_tolerance)?;
        write!(f, "root_max_iterations = {:?}\n", self.root_max_iterations)?;
        write!(f, "bracket_factor = {:?}\n", self.bracket_factor)?;
        write!(f, "bracket_max_iterations = {:?}\n", self.bracket_max_iterations)?;
        write!(f, "maxwell_time_sentinel = {:?}\n", self.maxwell_time_sentinel)?;
        write!(f, "\nTime stepping\n")?;
        write!(f, "=============\n")?;
        write!(f, "newton_tolerance = {:?}\n", self.newton_tolerance)?;
        write!(f, "newton_max_iterations = {:?}\n", self.newton_max_iterations)?;
        write!(f, "max_step_cuts = {:?}\n", self.max_step_cuts)?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
