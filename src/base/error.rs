use crate::StrError;
use thiserror::Error;

/// Holds the errors reported by the simulation core
///
/// The variants are kept apart so that a driving solver can tell a
/// recoverable numerical failure (shrink the time step and retry) from
/// a setup mistake that must abort the run.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    /// Bad input detected at setup or initialization time
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure detected while assembling or committing a trial state
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// Requested combination that has no implementation
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// Error forwarded from a collaborator (linear algebra, mesh, parameter source)
    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Returns true if a solver may react by retrying the step (e.g., with a smaller time step)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Numerical(..))
    }

    /// Prepends some context to the error message, keeping the category
    pub fn context(self, context: &str) -> Self {
        match self {
            Error::Config(m) => Error::Config(format!("{}: {}", context, m)),
            Error::Numerical(m) => Error::Numerical(format!("{}: {}", context, m)),
            Error::Unsupported(m) => Error::Unsupported(format!("{}: {}", context, m)),
            Error::External(m) => Error::External(format!("{}: {}", context, m)),
        }
    }
}

impl From<StrError> for Error {
    fn from(message: StrError) -> Self {
        Error::External(message.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::StrError;

    fn failing_library_call() -> Result<(), StrError> {
        Err("matrix is singular")
    }

    fn forwarding() -> Result<(), Error> {
        failing_library_call()?;
        Ok(())
    }

    #[test]
    fn display_works() {
        assert_eq!(
            format!("{}", Error::Config("density must be > 0".to_string())),
            "configuration error: density must be > 0"
        );
        assert_eq!(
            format!("{}", Error::Numerical("zero lumped entry".to_string())),
            "numerical failure: zero lumped entry"
        );
        assert_eq!(
            format!("{}", Error::Unsupported("cell dim 1 in 2D".to_string())),
            "unsupported configuration: cell dim 1 in 2D"
        );
    }

    #[test]
    fn from_str_error_works() {
        assert_eq!(forwarding().err(), Some(Error::External("matrix is singular".to_string())));
    }

    #[test]
    fn context_and_recoverable_work() {
        let err = Error::Numerical("root finder did not converge".to_string()).context("material 'mantle'");
        assert_eq!(
            err,
            Error::Numerical("material 'mantle': root finder did not converge".to_string())
        );
        assert!(err.is_recoverable());
        assert!(!Error::Config("x".to_string()).is_recoverable());
        assert!(!Error::Unsupported("x".to_string()).is_recoverable());
        assert!(!Error::External("x".to_string()).is_recoverable());
    }
}
