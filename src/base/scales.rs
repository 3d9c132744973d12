use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds the scales used to non-dimensionalize values from a parameter source
///
/// The scales are plain numbers; all quantities are divided by the
/// scale of their dimension. Unit bookkeeping is left to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scales {
    /// Length scale
    pub length: f64,

    /// Pressure (stress) scale
    pub pressure: f64,

    /// Time scale
    pub time: f64,

    /// Density scale
    pub density: f64,
}

impl Scales {
    /// Allocates a new instance with unit scales
    pub fn new() -> Self {
        Scales {
            length: 1.0,
            pressure: 1.0,
            time: 1.0,
            density: 1.0,
        }
    }

    /// Allocates a new instance with the given scales
    pub fn from(length: f64, pressure: f64, time: f64, density: f64) -> Result<Self, StrError> {
        if length <= 0.0 || pressure <= 0.0 || time <= 0.0 || density <= 0.0 {
            return Err("all scales must be > 0.0");
        }
        Ok(Scales {
            length,
            pressure,
            time,
            density,
        })
    }

    /// Returns the velocity scale (length / time)
    pub fn velocity(&self) -> f64 {
        self.length / self.time
    }

    /// Returns the acceleration scale (length / time²)
    pub fn acceleration(&self) -> f64 {
        self.length / (self.time * self.time)
    }

    /// Returns the scale of the power-law viscosity coefficient
    ///
    /// The flow law reads `ė = ½ (τ/A)ⁿ⁻¹ s / A`, thus `A` has dimension `pressure · time^(1/n)`.
    pub fn viscosity_coefficient(&self, exponent: f64) -> f64 {
        self.pressure * f64::powf(self.time, 1.0 / exponent)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
