//! Multi-retained-node multi-point constraint
//!
//! One constrained node has some of its DOFs expressed as a linear combination
//! of the same DOFs at one or more retained nodes:
//!
//! ```text
//! u_c[i] = sum_j C[i, j * n + i'] * u_r[j][i']
//! ```
//!
//! where `n` is the number of constrained DOFs. The matrix has one row per
//! constrained DOF and one column block of width `n` per retained node.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainLookup, NodeHandle};
use crate::elements::Element;
use crate::error::{Diagnostic, FEAError, FEAResult};
use crate::math::{self, Mat, Vec3};
use crate::persistence::{as_index, as_tag, DataBuffer, Persist};

/// How the constraint matrix is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Matrix supplied by the caller
    Explicit,
    /// Matrix filled from a retaining element's shape functions at attach time
    Interpolated { retaining_element: i32 },
}

/// Attachment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintStatus {
    /// Not yet attached to a domain
    Pending,
    /// Attached, all references resolved
    Active,
    /// A node or element tag could not be resolved; contributes nothing
    Inactive,
    /// Interpolation factors are NaN; contributes nothing
    Degenerate,
}

/// Multi-point constraint with one or many retained nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiRetainedConstraint {
    tag: i32,
    kind: ConstraintKind,
    constrained_node: i32,
    retained_nodes: Vec<i32>,
    constrained_dofs: Vec<usize>,
    matrix: Mat,
    status: ConstraintStatus,

    #[serde(skip)]
    pub(crate) constrained_handle: Option<NodeHandle>,
    #[serde(skip)]
    pub(crate) retained_handles: Vec<NodeHandle>,
}

/// Block-diagonal placement of interpolation factors
///
/// `matrix(i, j * n + i) = factors[j]` for every constrained DOF `i` and retained
/// node `j`; every other entry is zero.
pub fn interpolation_matrix(factors: &[f64], num_dofs: usize) -> Mat {
    let mut c = Mat::zeros(num_dofs, factors.len() * num_dofs);
    for (j, &factor) in factors.iter().enumerate() {
        for i in 0..num_dofs {
            c[(i, j * num_dofs + i)] = factor;
        }
    }
    c
}

fn check_shape(matrix: &Mat, num_retained: usize, num_dofs: usize) -> FEAResult<()> {
    let expected = (num_dofs, num_retained * num_dofs);
    if matrix.shape() != expected {
        return Err(FEAError::DimensionMismatch {
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", matrix.nrows(), matrix.ncols()),
        });
    }
    Ok(())
}

impl MultiRetainedConstraint {
    /// Build from an explicit matrix
    ///
    /// Fails with `DimensionMismatch` unless the matrix is
    /// `constrained_dofs.len()` by `retained_nodes.len() * constrained_dofs.len()`.
    pub fn from_matrix(
        tag: i32,
        constrained_node: i32,
        retained_nodes: &[i32],
        constrained_dofs: &[usize],
        matrix: Mat,
    ) -> FEAResult<Self> {
        if retained_nodes.is_empty() {
            return Err(FEAError::InvalidInput(format!(
                "constraint {tag} needs at least one retained node"
            )));
        }
        check_shape(&matrix, retained_nodes.len(), constrained_dofs.len())?;
        Ok(Self {
            tag,
            kind: ConstraintKind::Explicit,
            constrained_node,
            retained_nodes: retained_nodes.to_vec(),
            constrained_dofs: constrained_dofs.to_vec(),
            matrix,
            status: ConstraintStatus::Pending,
            constrained_handle: None,
            retained_handles: Vec::new(),
        })
    }

    /// Constraint whose retained nodes and matrix come from `retaining_element`
    ///
    /// Nothing is resolved until the constraint is attached to a domain.
    pub fn interpolated(
        tag: i32,
        retaining_element: i32,
        constrained_node: i32,
        constrained_dofs: &[usize],
    ) -> Self {
        Self {
            tag,
            kind: ConstraintKind::Interpolated { retaining_element },
            constrained_node,
            retained_nodes: Vec::new(),
            constrained_dofs: constrained_dofs.to_vec(),
            matrix: Mat::zeros(constrained_dofs.len(), 0),
            status: ConstraintStatus::Pending,
            constrained_handle: None,
            retained_handles: Vec::new(),
        }
    }

    /// Fill the matrix from the element's shape functions at `position`
    ///
    /// Returns false when the factors are not finite. The NaN factors are kept
    /// in the matrix as the invalid marker.
    pub fn build_from_interpolation(&mut self, element: &Element, position: &Vec3) -> bool {
        let factors = element.interpolation_factors(position);
        self.retained_nodes = element.external_nodes().to_vec();
        self.matrix = interpolation_matrix(&factors, self.constrained_dofs.len());
        math::factors_are_valid(&factors)
    }

    /// Resolve node and element references against `domain`
    ///
    /// Unresolved tags and degenerate geometry leave the constraint inactive and
    /// are reported as a diagnostic. DOF indices beyond a node's DOF count are a
    /// hard `DimensionMismatch`.
    pub fn set_domain<D: DomainLookup + ?Sized>(
        &mut self,
        domain: &D,
    ) -> FEAResult<Option<Diagnostic>> {
        self.constrained_handle = None;
        self.retained_handles.clear();

        let Some(constrained) = domain.get_node(self.constrained_node) else {
            return Ok(Some(self.deactivate(self.constrained_node)));
        };

        let mut degenerate = false;
        if let ConstraintKind::Interpolated { retaining_element } = self.kind {
            let Some(element) = domain.get_element(retaining_element) else {
                return Ok(Some(self.deactivate(retaining_element)));
            };
            let position = domain.node(constrained).position();
            degenerate = !self.build_from_interpolation(element, &position);
        }

        let mut retained = Vec::with_capacity(self.retained_nodes.len());
        for &tag in &self.retained_nodes {
            match domain.get_node(tag) {
                Some(handle) => retained.push(handle),
                None => return Ok(Some(self.deactivate(tag))),
            }
        }

        for handle in std::iter::once(constrained).chain(retained.iter().copied()) {
            let node = domain.node(handle);
            if let Some(&dof) = self.constrained_dofs.iter().find(|&&d| d >= node.ndf) {
                return Err(FEAError::DimensionMismatch {
                    expected: format!("DOF index below {} at node {}", node.ndf, node.tag),
                    found: format!("DOF {} in constraint {}", dof, self.tag),
                });
            }
        }

        self.constrained_handle = Some(constrained);
        self.retained_handles = retained;

        if degenerate {
            self.status = ConstraintStatus::Degenerate;
            let diag = Diagnostic::degenerate(self.tag);
            diag.log();
            return Ok(Some(diag));
        }

        self.status = ConstraintStatus::Active;
        log::debug!(
            "constraint {} attached: node {} retained by {:?}",
            self.tag,
            self.constrained_node,
            self.retained_nodes
        );
        Ok(None)
    }

    fn deactivate(&mut self, missing_tag: i32) -> Diagnostic {
        self.status = ConstraintStatus::Inactive;
        self.constrained_handle = None;
        self.retained_handles.clear();
        let diag = Diagnostic::unresolved(self.tag, missing_tag);
        diag.log();
        diag
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn status(&self) -> ConstraintStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ConstraintStatus::Active
    }

    pub fn constrained_node(&self) -> i32 {
        self.constrained_node
    }

    pub fn retained_nodes(&self) -> &[i32] {
        &self.retained_nodes
    }

    pub fn constrained_dofs(&self) -> &[usize] {
        &self.constrained_dofs
    }

    /// DOFs of each retained node, in column-block order
    pub fn retained_dofs(&self) -> &[usize] {
        &self.constrained_dofs
    }

    pub fn constraint_matrix(&self) -> &Mat {
        &self.matrix
    }

    /// (retained node tag, DOF) addressed by a matrix column
    pub fn column_dof(&self, column: usize) -> Option<(i32, usize)> {
        let n = self.constrained_dofs.len();
        if n == 0 {
            return None;
        }
        let node = *self.retained_nodes.get(column / n)?;
        Some((node, self.constrained_dofs[column % n]))
    }

    /// Constraint values never change with time
    pub fn is_time_varying(&self) -> bool {
        false
    }

    /// Values are imposed directly at the node, so there is nothing to apply
    pub fn apply_constraint(&mut self, _time: f64) {}

    // ========================
    // DOF bookkeeping
    // ========================

    /// Retained nodes plus the constrained node
    pub fn num_dof_groups(&self) -> usize {
        self.retained_nodes.len() + 1
    }

    pub fn num_constrained_dofs(&self) -> usize {
        self.constrained_dofs.len()
    }

    pub fn num_retained_dofs(&self) -> usize {
        self.retained_nodes.len() * self.num_constrained_dofs()
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dof_groups() * self.num_constrained_dofs()
    }

    /// Size of the system for a Lagrange multiplier handler: one multiplier per
    /// constrained DOF on top of the coupled DOFs
    pub fn num_lagrange_dofs(&self) -> usize {
        self.num_dofs() + self.num_constrained_dofs()
    }

    pub fn affects_node(&self, tag: i32) -> bool {
        tag == self.constrained_node || self.retained_nodes.contains(&tag)
    }

    pub fn affects_node_and_dof(&self, tag: i32, dof: usize) -> bool {
        if !self.constrained_dofs.contains(&dof) {
            return false;
        }
        // every retained block repeats the constrained DOF layout
        tag == self.constrained_node || self.retained_nodes.contains(&tag)
    }
}

impl fmt::Display for MultiRetainedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MultiRetainedConstraint {} ({:?})", self.tag, self.status)?;
        writeln!(f, "  constrained node: {}", self.constrained_node)?;
        writeln!(f, "  constrained DOFs: {:?}", self.constrained_dofs)?;
        writeln!(f, "  retained nodes: {:?}", self.retained_nodes)?;
        write!(f, "  matrix:{}", self.matrix)
    }
}

const KIND_EXPLICIT: i64 = 0;
const KIND_INTERPOLATED: i64 = 1;

impl Persist for MultiRetainedConstraint {
    fn send_data(&self, buffer: &mut DataBuffer) {
        let (kind, element) = match self.kind {
            ConstraintKind::Explicit => (KIND_EXPLICIT, -1),
            ConstraintKind::Interpolated { retaining_element } => {
                (KIND_INTERPOLATED, retaining_element as i64)
            }
        };
        buffer.put_ints("header", &[self.tag as i64, kind, element, self.constrained_node as i64]);
        buffer.put_ints(
            "retained_nodes",
            &self.retained_nodes.iter().map(|&t| t as i64).collect::<Vec<_>>(),
        );
        buffer.put_ints(
            "constrained_dofs",
            &self.constrained_dofs.iter().map(|&d| d as i64).collect::<Vec<_>>(),
        );
        buffer.put_ints("matrix_shape", &[self.matrix.nrows() as i64, self.matrix.ncols() as i64]);
        // nalgebra storage is column-major
        buffer.put_reals("matrix", self.matrix.as_slice());
    }

    fn recv_data(buffer: &DataBuffer) -> FEAResult<Self> {
        let header = buffer.ints_exact("header", 4)?;
        let kind = match header[1] {
            KIND_EXPLICIT => ConstraintKind::Explicit,
            KIND_INTERPOLATED => ConstraintKind::Interpolated {
                retaining_element: as_tag(header[2], "header")?,
            },
            other => {
                return Err(FEAError::Persistence(format!("unknown constraint kind {other}")))
            }
        };
        let retained_nodes = buffer
            .ints("retained_nodes")?
            .iter()
            .map(|&t| as_tag(t, "retained_nodes"))
            .collect::<FEAResult<Vec<i32>>>()?;
        let constrained_dofs = buffer
            .ints("constrained_dofs")?
            .iter()
            .map(|&d| as_index(d, "constrained_dofs"))
            .collect::<FEAResult<Vec<usize>>>()?;
        let shape = buffer.ints_exact("matrix_shape", 2)?;
        let rows = as_index(shape[0], "matrix_shape")?;
        let cols = as_index(shape[1], "matrix_shape")?;
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| FEAError::Persistence(format!("matrix shape {rows}x{cols} overflows")))?;
        let data = buffer.reals_exact("matrix", len)?;
        let matrix = Mat::from_column_slice(rows, cols, data);
        check_shape(&matrix, retained_nodes.len(), constrained_dofs.len())?;

        Ok(Self {
            tag: as_tag(header[0], "header")?,
            kind,
            constrained_node: as_tag(header[3], "header")?,
            retained_nodes,
            constrained_dofs,
            matrix,
            status: ConstraintStatus::Pending,
            constrained_handle: None,
            retained_handles: Vec::new(),
        })
    }
}
