//! Node - a tagged point in 3D space carrying DOFs and a reaction accumulator

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::Vec3;

/// A node in the finite element domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique tag
    pub tag: i32,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Number of degrees of freedom
    pub ndf: usize,

    /// Reaction accumulated for the current step, one entry per DOF
    #[serde(skip)]
    pub(crate) reaction: Vec<f64>,
}

impl Node {
    /// Create a new node with three translational DOFs
    pub fn new(tag: i32, x: f64, y: f64, z: f64) -> Self {
        Self {
            tag,
            x,
            y,
            z,
            ndf: 3,
            reaction: vec![0.0; 3],
        }
    }

    /// Set the number of DOFs (resets the reaction)
    pub fn with_dofs(mut self, ndf: usize) -> Self {
        self.ndf = ndf;
        self.reaction = vec![0.0; ndf];
        self
    }

    /// Get the coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Reference position
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Calculate distance to another node
    pub fn distance_to(&self, other: &Node) -> f64 {
        (other.position() - self.position()).norm()
    }

    /// Current reaction, one entry per DOF
    pub fn reaction(&self) -> &[f64] {
        &self.reaction
    }

    /// Add `factor * force` to the reaction
    pub fn add_reaction_force(&mut self, force: &[f64], factor: f64) -> FEAResult<()> {
        if force.len() != self.ndf {
            return Err(FEAError::DimensionMismatch {
                expected: format!("{} reaction components at node {}", self.ndf, self.tag),
                found: force.len().to_string(),
            });
        }
        self.ensure_reaction_len();
        for (r, f) in self.reaction.iter_mut().zip(force) {
            *r += factor * f;
        }
        Ok(())
    }

    /// Add to a single reaction component
    pub(crate) fn add_reaction_component(&mut self, dof: usize, value: f64) {
        self.ensure_reaction_len();
        if let Some(r) = self.reaction.get_mut(dof) {
            *r += value;
        }
    }

    /// Overwrite the reaction (as element resisting forces would)
    pub fn set_reaction(&mut self, reaction: &[f64]) -> FEAResult<()> {
        self.zero_reaction();
        self.add_reaction_force(reaction, 1.0)
    }

    pub fn zero_reaction(&mut self) {
        self.reaction = vec![0.0; self.ndf];
    }

    // deserialized nodes come back with an empty accumulator
    fn ensure_reaction_len(&mut self) {
        if self.reaction.len() != self.ndf {
            self.reaction.resize(self.ndf, 0.0);
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(0, 0.0, 0.0, 0.0)
    }
}
