//! Retaining elements - the interpolation side of an embedded constraint

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::{self, Vec3};

/// Element shapes that can supply interpolation factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// 2-node line
    Line2,
    /// 3-node triangle
    Tri3,
    /// 4-node bilinear quadrilateral
    Quad4,
    /// 4-node tetrahedron
    Tet4,
}

impl ElementKind {
    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Line2 => 2,
            Self::Tri3 => 3,
            Self::Quad4 | Self::Tet4 => 4,
        }
    }
}

/// An element in the domain, referencing its external nodes by tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    /// Unique tag
    pub tag: i32,
    /// Shape family
    pub kind: ElementKind,
    /// External node tags in connectivity order
    pub nodes: Vec<i32>,

    /// Nodal reference positions, filled in when the element joins a domain
    #[serde(skip)]
    pub(crate) coords: Vec<Vec3>,
}

impl Element {
    /// Create a new element, checking the node count against the kind
    pub fn new(tag: i32, kind: ElementKind, nodes: &[i32]) -> FEAResult<Self> {
        let element = Self {
            tag,
            kind,
            nodes: nodes.to_vec(),
            coords: Vec::new(),
        };
        element.check_node_count()?;
        Ok(element)
    }

    /// Node list length must match the kind
    pub fn check_node_count(&self) -> FEAResult<()> {
        if self.nodes.len() != self.kind.num_nodes() {
            return Err(FEAError::DimensionMismatch {
                expected: format!("{} nodes for {:?} element {}", self.kind.num_nodes(), self.kind, self.tag),
                found: self.nodes.len().to_string(),
            });
        }
        Ok(())
    }

    pub fn line2(tag: i32, i_node: i32, j_node: i32) -> Self {
        Self {
            tag,
            kind: ElementKind::Line2,
            nodes: vec![i_node, j_node],
            coords: Vec::new(),
        }
    }

    pub fn tri3(tag: i32, nodes: [i32; 3]) -> Self {
        Self {
            tag,
            kind: ElementKind::Tri3,
            nodes: nodes.to_vec(),
            coords: Vec::new(),
        }
    }

    /// Nodes ordered counter-clockwise
    pub fn quad4(tag: i32, nodes: [i32; 4]) -> Self {
        Self {
            tag,
            kind: ElementKind::Quad4,
            nodes: nodes.to_vec(),
            coords: Vec::new(),
        }
    }

    pub fn tet4(tag: i32, nodes: [i32; 4]) -> Self {
        Self {
            tag,
            kind: ElementKind::Tet4,
            nodes: nodes.to_vec(),
            coords: Vec::new(),
        }
    }

    /// External node tags
    pub fn external_nodes(&self) -> &[i32] {
        &self.nodes
    }

    /// Whether nodal positions have been resolved
    pub fn is_resolved(&self) -> bool {
        self.nodes.len() == self.kind.num_nodes() && self.coords.len() == self.nodes.len()
    }

    pub(crate) fn set_node_coords(&mut self, coords: Vec<Vec3>) {
        self.coords = coords;
    }

    /// Shape function value of each external node at `position`
    ///
    /// Returns one factor per external node. An unresolved element or ill-defined
    /// geometry gives `NaN` factors rather than an error.
    pub fn interpolation_factors(&self, position: &Vec3) -> Vec<f64> {
        if !self.is_resolved() {
            return vec![f64::NAN; self.nodes.len()];
        }
        match self.kind {
            ElementKind::Line2 => math::line2_factors(&self.coords, position),
            ElementKind::Tri3 => math::barycentric_tri3(&self.coords, position),
            ElementKind::Quad4 => math::quad4_factors(&self.coords, position),
            ElementKind::Tet4 => math::barycentric_tet4(&self.coords, position),
        }
    }
}
