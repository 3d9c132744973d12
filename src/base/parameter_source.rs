use super::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Specifies a source of raw property values at a point (e.g., a spatial database)
///
/// The source is queried once per quadrature point at setup; never during assembly.
pub trait ParameterSource {
    /// Returns the values of the requested names at the point `x`, in the same order
    fn query(&self, x: &[f64], names: &[&str]) -> Result<Vec<f64>, Error>;
}

/// Implements a source with uniform (constant in space) values
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UniformSource {
    /// Maps names to values
    pub values: HashMap<String, f64>,
}

impl UniformSource {
    /// Allocates an empty instance
    pub fn new() -> Self {
        UniformSource { values: HashMap::new() }
    }

    /// Sets a value
    pub fn set(&mut self, name: &str, value: f64) -> &mut Self {
        self.values.insert(name.to_string(), value);
        self
    }

    /// Reads the values from a JSON string (e.g., `{"values":{"density":2500.0}}`)
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::External(format!("cannot parse uniform source: {}", e)))
    }
}

impl ParameterSource for UniformSource {
    fn query(&self, _x: &[f64], names: &[&str]) -> Result<Vec<f64>, Error> {
        names
            .iter()
            .map(|name| {
                self.values
                    .get(*name)
                    .copied()
                    .ok_or_else(|| Error::External(format!("uniform source does not have a value named '{}'", name)))
            })
            .collect()
    }
}

impl<F> ParameterSource for F
where
    F: Fn(&[f64], &[&str]) -> Result<Vec<f64>, Error>,
{
    fn query(&self, x: &[f64], names: &[&str]) -> Result<Vec<f64>, Error> {
        self(x, names)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{ParameterSource, UniformSource};
    use crate::base::Error;

    #[test]
    fn uniform_source_works() -> Result<(), Error> {
        let mut source = UniformSource::new();
        source.set("density", 2500.0).set("vs", 3000.0);
        assert_eq!(source.query(&[0.0, 0.0], &["vs", "density"])?, &[3000.0, 2500.0]);
        assert_eq!(
            source.query(&[0.0, 0.0], &["vp"]).err(),
            Some(Error::External(
                "uniform source does not have a value named 'vp'".to_string()
            ))
        );
        let source = UniformSource::from_json(r#"{"values":{"density":2500.0}}"#)?;
        assert_eq!(source.query(&[1.0, 2.0], &["density"])?, &[2500.0]);
        assert!(UniformSource::from_json("{").is_err());
        Ok(())
    }

    #[test]
    fn closure_source_works() -> Result<(), Error> {
        let source = |x: &[f64], names: &[&str]| -> Result<Vec<f64>, Error> {
            Ok(names.iter().map(|_| 1.0 + x[1]).collect())
        };
        assert_eq!(source.query(&[0.0, 2.0], &["density", "vs"])?, &[3.0, 3.0]);
        Ok(())
    }
}
