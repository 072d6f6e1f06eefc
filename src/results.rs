//! Result types for constraint and material passes

use serde::{Deserialize, Serialize};

use crate::error::Diagnostic;

/// Reaction forces at a node
///
/// Components beyond the node's DOF count are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    /// Reaction force in X direction
    pub fx: f64,
    /// Reaction force in Y direction
    pub fy: f64,
    /// Reaction force in Z direction
    pub fz: f64,
    /// Reaction moment about X axis
    pub mx: f64,
    /// Reaction moment about Y axis
    pub my: f64,
    /// Reaction moment about Z axis
    pub mz: f64,
}

impl Reactions {
    /// Create from array [FX, FY, FZ, MX, MY, MZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            fx: arr[0],
            fy: arr[1],
            fz: arr[2],
            mx: arr[3],
            my: arr[4],
            mz: arr[5],
        }
    }

    /// Create from a per-DOF reaction of any length up to six
    pub fn from_slice(values: &[f64]) -> Self {
        let mut arr = [0.0; 6];
        for (a, v) in arr.iter_mut().zip(values) {
            *a = *v;
        }
        Self::from_array(arr)
    }

    /// Get force magnitude
    pub fn force_magnitude(&self) -> f64 {
        (self.fx.powi(2) + self.fy.powi(2) + self.fz.powi(2)).sqrt()
    }

    /// Get moment magnitude
    pub fn moment_magnitude(&self) -> f64 {
        (self.mx.powi(2) + self.my.powi(2) + self.mz.powi(2)).sqrt()
    }
}

/// Outcome of one material stress update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressUpdate {
    /// Trial state violated the yield condition and was mapped back
    pub yielded: bool,
    /// Consistency parameter (zero for elastic steps)
    pub gamma: f64,
    /// Local Newton iterations spent
    pub iterations: usize,
    /// Set when the local iteration hit its cap
    pub diagnostic: Option<Diagnostic>,
}

impl StressUpdate {
    pub fn elastic() -> Self {
        Self::default()
    }

    pub fn converged(&self) -> bool {
        self.diagnostic.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactions_from_short_slice() {
        let r = Reactions::from_slice(&[3.0, 4.0]);
        assert_eq!(r.fx, 3.0);
        assert_eq!(r.fz, 0.0);
        assert!((r.force_magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_elastic_update_is_converged() {
        let u = StressUpdate::elastic();
        assert!(!u.yielded);
        assert!(u.converged());
    }
}
