use crate::FnTime;
use std::collections::HashMap;
use std::fmt;

/// Defines the displacement degrees of freedom
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dof {
    Ux,
    Uy,
    Uz,
}

impl Dof {
    /// Returns the component index within the displacement subfield
    pub fn component(&self) -> usize {
        match self {
            Dof::Ux => 0,
            Dof::Uy => 1,
            Dof::Uz => 2,
        }
    }
}

/// Defines an essential (prescribed displacement) boundary condition
#[derive(Clone, Copy)]
pub enum Ebc {
    Ux(FnTime),
    Uy(FnTime),
    Uz(FnTime),
}

impl Ebc {
    /// Returns the degree of freedom
    pub fn dof(&self) -> Dof {
        match self {
            Ebc::Ux(..) => Dof::Ux,
            Ebc::Uy(..) => Dof::Uy,
            Ebc::Uz(..) => Dof::Uz,
        }
    }

    /// Returns the prescribed value at time t
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Ebc::Ux(f) | Ebc::Uy(f) | Ebc::Uz(f) => f(t),
        }
    }
}

/// Holds essential boundary conditions
pub struct Essential {
    pub all: HashMap<(usize, Dof), Ebc>,
}

impl Essential {
    /// Allocates a new instance
    pub fn new() -> Self {
        Essential { all: HashMap::new() }
    }

    /// Sets essential boundary condition at points
    pub fn at(&mut self, points: &[usize], ebc: Ebc) -> &mut Self {
        for point_id in points {
            self.all.insert((*point_id, ebc.dof()), ebc);
        }
        self
    }

    /// Returns the (point, dof) pairs sorted
    pub fn sorted_keys(&self) -> Vec<(usize, Dof)> {
        let mut keys: Vec<_> = self.all.keys().copied().collect();
        keys.sort();
        keys
    }
}

impl fmt::Display for Essential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Essential boundary conditions\n")?;
        write!(f, "=============================\n")?;
        for key in self.sorted_keys() {
            if let Some(ebc) = self.all.get(&key) {
                write!(f, "{:?} : {:?} @ t=0 is {:?}\n", key.0, key.1, ebc.value(0.0))?;
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Dof, Ebc, Essential};

    #[test]
    fn essential_works() {
        let mut essential = Essential::new();
        essential
            .at(&[0, 1], Ebc::Uy(|_| 0.0))
            .at(&[0], Ebc::Ux(|_| 0.0))
            .at(&[3], Ebc::Uy(|t| -0.01 * t));
        assert_eq!(
            essential.sorted_keys(),
            &[(0, Dof::Ux), (0, Dof::Uy), (1, Dof::Uy), (3, Dof::Uy)]
        );
        assert_eq!(essential.all.get(&(3, Dof::Uy)).unwrap().value(2.0), -0.02);
        assert_eq!(Dof::Uz.component(), 2);
        assert_eq!(
            format!("{}", essential),
            "Essential boundary conditions\n\
             =============================\n\
             0 : Ux @ t=0 is 0.0\n\
             0 : Uy @ t=0 is 0.0\n\
             1 : Uy @ t=0 is 0.0\n\
             3 : Uy @ t=0 is -0.0\n"
        );
    }
}
