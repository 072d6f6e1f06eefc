//! Domain - arena of nodes, elements and constraints addressed by stable handles

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisOptions;
use crate::constraints::{MultiRetainedConstraint, ReactionTransfer};
use crate::elements::{Element, Node};
use crate::error::{Diagnostic, FEAError, FEAResult};
use crate::results::Reactions;

/// Stable index of a node inside a [`Domain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lookup service consumed by constraints when they attach
pub trait DomainLookup {
    /// Handle of the node with `tag`, if any
    fn get_node(&self, tag: i32) -> Option<NodeHandle>;
    /// Node behind a handle obtained from this domain
    fn node(&self, handle: NodeHandle) -> &Node;
    /// Element with `tag`, if any
    fn get_element(&self, tag: i32) -> Option<&Element>;
    /// Current pseudo-time increment
    fn dt(&self) -> f64;
}

/// Counter service handing out tags for auto-numbered entities
#[derive(Debug)]
pub struct TagGenerator {
    next: AtomicI32,
}

impl TagGenerator {
    pub fn new(start: i32) -> Self {
        Self {
            next: AtomicI32::new(start),
        }
    }

    /// Take the next tag
    pub fn next_tag(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Tag the next call will return
    pub fn peek(&self) -> i32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Pseudo-time bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTracker {
    pub time: f64,
    pub dt: f64,
}

impl TimeTracker {
    pub fn advance(&mut self, dt: f64) {
        self.dt = dt;
        self.time += dt;
    }
}

/// Container for the entities constraints and materials work against
#[derive(Debug, Clone, Default)]
pub struct Domain {
    nodes: Vec<Node>,
    node_index: HashMap<i32, usize>,
    elements: Vec<Element>,
    element_index: HashMap<i32, usize>,
    constraints: Vec<MultiRetainedConstraint>,
    constraint_index: HashMap<i32, usize>,
    time: TimeTracker,
    diagnostics: Vec<Diagnostic>,
}

impl DomainLookup for Domain {
    fn get_node(&self, tag: i32) -> Option<NodeHandle> {
        self.node_index.get(&tag).map(|&i| NodeHandle(i))
    }

    fn node(&self, handle: NodeHandle) -> &Node {
        &self.nodes[handle.0]
    }

    fn get_element(&self, tag: i32) -> Option<&Element> {
        self.element_index.get(&tag).map(|&i| &self.elements[i])
    }

    fn dt(&self) -> f64 {
        self.time.dt
    }
}

impl Domain {
    /// Create a new empty domain
    pub fn new() -> Self {
        Self::default()
    }

    // ========================
    // Domain Building Methods
    // ========================

    /// Add a node to the domain
    pub fn add_node(&mut self, node: Node) -> FEAResult<NodeHandle> {
        if self.node_index.contains_key(&node.tag) {
            return Err(FEAError::DuplicateTag(node.tag));
        }
        let index = self.nodes.len();
        self.node_index.insert(node.tag, index);
        self.nodes.push(node);
        Ok(NodeHandle(index))
    }

    /// Add an element, resolving its nodal positions
    pub fn add_element(&mut self, mut element: Element) -> FEAResult<()> {
        if self.element_index.contains_key(&element.tag) {
            return Err(FEAError::DuplicateTag(element.tag));
        }
        element.check_node_count()?;
        let coords = element
            .nodes
            .iter()
            .map(|&tag| {
                self.get_node(tag)
                    .map(|h| self.nodes[h.0].position())
                    .ok_or(FEAError::NodeNotFound(tag))
            })
            .collect::<FEAResult<Vec<_>>>()?;
        element.set_node_coords(coords);

        self.element_index.insert(element.tag, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    /// Attach a constraint
    ///
    /// Unresolved references and degenerate geometry are recorded as diagnostics
    /// and the constraint is kept in a degraded state. A DOF layout that does not
    /// fit the nodes is an error and the constraint is not added.
    pub fn add_constraint(
        &mut self,
        mut constraint: MultiRetainedConstraint,
    ) -> FEAResult<()> {
        if self.constraint_index.contains_key(&constraint.tag()) {
            return Err(FEAError::DuplicateTag(constraint.tag()));
        }
        if let Some(diag) = constraint.set_domain(&*self)? {
            self.diagnostics.push(diag);
        }
        self.constraint_index.insert(constraint.tag(), self.constraints.len());
        self.constraints.push(constraint);
        Ok(())
    }

    // ========================
    // Access Methods
    // ========================

    pub fn node(&self, tag: i32) -> FEAResult<&Node> {
        self.node_index
            .get(&tag)
            .map(|&i| &self.nodes[i])
            .ok_or(FEAError::NodeNotFound(tag))
    }

    pub fn node_mut(&mut self, tag: i32) -> FEAResult<&mut Node> {
        match self.node_index.get(&tag) {
            Some(&i) => Ok(&mut self.nodes[i]),
            None => Err(FEAError::NodeNotFound(tag)),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn element(&self, tag: i32) -> FEAResult<&Element> {
        self.get_element(tag).ok_or(FEAError::ElementNotFound(tag))
    }

    pub fn constraint(&self, tag: i32) -> FEAResult<&MultiRetainedConstraint> {
        self.constraint_index
            .get(&tag)
            .map(|&i| &self.constraints[i])
            .ok_or(FEAError::ConstraintNotFound(tag))
    }

    pub fn constraints(&self) -> &[MultiRetainedConstraint] {
        &self.constraints
    }

    /// Tags of constraints that touch node `tag`
    pub fn constraints_affecting(&self, tag: i32) -> Vec<i32> {
        self.constraints
            .iter()
            .filter(|c| c.affects_node(tag))
            .map(|c| c.tag())
            .collect()
    }

    /// Get node reactions
    pub fn node_reactions(&self, tag: i32) -> FEAResult<Reactions> {
        Ok(Reactions::from_slice(self.node(tag)?.reaction()))
    }

    pub fn time_tracker(&self) -> &TimeTracker {
        &self.time
    }

    pub fn time_tracker_mut(&mut self) -> &mut TimeTracker {
        &mut self.time
    }

    /// Diagnostics raised so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn zero_reactions(&mut self) {
        for node in &mut self.nodes {
            node.zero_reaction();
        }
    }

    // ========================
    // Constraint Passes
    // ========================

    /// Redistribute constrained-node reactions onto retained nodes
    ///
    /// Runs after the global solve and after element reactions have been
    /// accumulated. Every constraint reads the same reaction snapshot; the
    /// resulting transfers are added in constraint order.
    pub fn distribute_reactions(&mut self, options: &AnalysisOptions) -> FEAResult<()> {
        if options.include_inertia {
            return Err(FEAError::UnsupportedOperation(
                "inertial reaction redistribution is not implemented".to_string(),
            ));
        }

        let nodes = &self.nodes;
        let transfers: Vec<ReactionTransfer> = if options.use_parallel(self.constraints.len()) {
            self.constraints
                .par_iter()
                .map(|c| c.reaction_transfer(nodes, false))
                .collect::<FEAResult<_>>()?
        } else {
            self.constraints
                .iter()
                .map(|c| c.reaction_transfer(nodes, false))
                .collect::<FEAResult<_>>()?
        };

        for transfer in &transfers {
            transfer.apply(&mut self.nodes);
        }
        log::debug!("redistributed reactions for {} constraints", transfers.len());
        Ok(())
    }
}
