//! Reaction redistribution from constrained to retained nodes

use crate::domain::NodeHandle;
use crate::elements::Node;
use crate::error::{FEAError, FEAResult};
use crate::math::Vec as FEVec;

use super::MultiRetainedConstraint;

/// Additive reaction updates produced by one constraint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionTransfer {
    /// Constraint that produced the transfer
    pub constraint: i32,
    /// (node, DOF, value) to add to the node's reaction
    pub entries: Vec<(NodeHandle, usize, f64)>,
}

impl ReactionTransfer {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Net change summed over all nodes for one DOF index
    pub fn net(&self, dof: usize) -> f64 {
        self.entries
            .iter()
            .filter(|(_, d, _)| *d == dof)
            .map(|(_, _, v)| v)
            .sum()
    }

    /// Add every entry into `nodes`
    pub fn apply(&self, nodes: &mut [Node]) {
        for &(handle, dof, value) in &self.entries {
            if let Some(node) = nodes.get_mut(handle.index()) {
                node.add_reaction_component(dof, value);
            }
        }
    }
}

impl MultiRetainedConstraint {
    /// Move the constrained node's reaction onto the retained nodes
    ///
    /// With `R_m` the constrained node's reaction on the constrained DOFs, the
    /// constrained node receives `-R_m` and the retained nodes receive `C^T R_m`
    /// split into one block per retained node. The net reaction per DOF is
    /// unchanged whenever each row of `C` sums to one.
    ///
    /// `nodes` is read only; the result is applied by the caller so that many
    /// constraints can be evaluated against the same reaction snapshot.
    pub fn reaction_transfer(
        &self,
        nodes: &[Node],
        include_inertia: bool,
    ) -> FEAResult<ReactionTransfer> {
        if include_inertia {
            return Err(FEAError::UnsupportedOperation(format!(
                "constraint {}: inertial reaction redistribution is not implemented",
                self.tag()
            )));
        }

        let mut transfer = ReactionTransfer {
            constraint: self.tag(),
            entries: Vec::new(),
        };
        if !self.is_active() {
            return Ok(transfer);
        }
        let Some(constrained) = self.constrained_handle else {
            return Ok(transfer);
        };
        let node = nodes
            .get(constrained.index())
            .ok_or(FEAError::NodeNotFound(self.constrained_node()))?;

        let dofs = self.constrained_dofs();
        let n = dofs.len();
        let reaction = node.reaction();
        let rm = FEVec::from_iterator(n, dofs.iter().map(|&d| reaction.get(d).copied().unwrap_or(0.0)));

        for (i, &dof) in dofs.iter().enumerate() {
            transfer.entries.push((constrained, dof, -rm[i]));
        }

        let rn = self.constraint_matrix().transpose() * &rm;
        for (j, &handle) in self.retained_handles.iter().enumerate() {
            for (i, &dof) in dofs.iter().enumerate() {
                transfer.entries.push((handle, dof, rn[j * n + i]));
            }
        }

        Ok(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::math::Mat;
    use approx::assert_relative_eq;

    fn attached(domain: &mut Domain, c: Mat, dofs: &[usize]) {
        let mrmp = MultiRetainedConstraint::from_matrix(1, 1, &[2, 3], dofs, c).unwrap();
        domain.add_constraint(mrmp).unwrap();
    }

    fn three_nodes() -> Domain {
        let mut domain = Domain::new();
        domain.add_node(Node::new(1, 0.5, 0.0, 0.0).with_dofs(2)).unwrap();
        domain.add_node(Node::new(2, 0.0, 0.0, 0.0).with_dofs(2)).unwrap();
        domain.add_node(Node::new(3, 1.0, 0.0, 0.0).with_dofs(2)).unwrap();
        domain
    }

    #[test]
    fn test_half_split() {
        let mut domain = three_nodes();
        attached(&mut domain, Mat::from_row_slice(1, 2, &[0.5, 0.5]), &[1]);
        domain.node_mut(1).unwrap().set_reaction(&[0.0, 10.0]).unwrap();

        let c = domain.constraint(1).unwrap();
        let t = c.reaction_transfer(domain.nodes(), false).unwrap();
        assert_eq!(t.entries.len(), 3);
        assert_relative_eq!(t.entries[0].2, -10.0);
        assert_relative_eq!(t.entries[1].2, 5.0);
        assert_relative_eq!(t.entries[2].2, 5.0);
        assert_relative_eq!(t.net(1), 0.0);
    }

    #[test]
    fn test_inertia_is_unsupported() {
        let mut domain = three_nodes();
        attached(&mut domain, Mat::from_row_slice(1, 2, &[0.5, 0.5]), &[0]);
        let c = domain.constraint(1).unwrap();
        let err = c.reaction_transfer(domain.nodes(), true).unwrap_err();
        assert!(matches!(err, FEAError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_pending_constraint_transfers_nothing() {
        let c = MultiRetainedConstraint::from_matrix(1, 1, &[2], &[0], Mat::identity(1, 1)).unwrap();
        let t = c.reaction_transfer(&[], false).unwrap();
        assert!(t.is_empty());
    }
}
