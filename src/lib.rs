//! FEA Core - constraint redistribution and J2 plasticity for finite element analysis
//!
//! This library provides two building blocks that sit around a global solver:
//! - Multi-retained-node constraints, tying a constrained node's DOFs to a
//!   linear combination of retained nodes' DOFs, either from an explicit matrix
//!   or from the shape functions of a retaining element
//! - Post-solve redistribution of constrained-node reactions onto the retained
//!   nodes
//! - J2 (von Mises) plasticity with saturation and linear isotropic hardening,
//!   optional rate dependence, and a consistent tangent
//! - Reduced-dimension material kinds (plane strain, plane stress,
//!   axisymmetric, plate fiber)
//!
//! ## Example
//! ```rust
//! use fea_core::prelude::*;
//!
//! let mut domain = Domain::new();
//! domain.add_node(Node::new(1, 0.5, 0.0, 0.0).with_dofs(2)).unwrap();
//! domain.add_node(Node::new(2, 0.0, 0.0, 0.0).with_dofs(2)).unwrap();
//! domain.add_node(Node::new(3, 1.0, 0.0, 0.0).with_dofs(2)).unwrap();
//! domain.add_element(Element::line2(10, 2, 3)).unwrap();
//!
//! // Node 1 follows the line element in Y
//! domain
//!     .add_constraint(MultiRetainedConstraint::interpolated(1, 10, 1, &[1]))
//!     .unwrap();
//!
//! domain.node_mut(1).unwrap().set_reaction(&[0.0, 10.0]).unwrap();
//! domain.distribute_reactions(&AnalysisOptions::serial()).unwrap();
//!
//! assert!((domain.node_reactions(2).unwrap().fy - 5.0).abs() < 1e-12);
//! assert!((domain.node_reactions(3).unwrap().fy - 5.0).abs() < 1e-12);
//!
//! // A material point loaded past yield
//! let mut point = J2Material::new(1, MaterialKind::PlaneStrain, J2Parameters::steel()).unwrap();
//! let update = point.set_trial_strain(&[0.01, 0.0, 0.0], 0.0).unwrap();
//! assert!(update.yielded);
//! point.commit_state().unwrap();
//! ```

pub mod analysis;
pub mod constraints;
pub mod domain;
pub mod elements;
pub mod error;
pub mod materials;
pub mod math;
pub mod persistence;
pub mod results;

pub mod prelude {
    pub use crate::analysis::{AnalysisOptions, ReturnMappingOptions};
    pub use crate::constraints::{
        ConstraintKind, ConstraintStatus, MultiRetainedConstraint, ReactionTransfer,
    };
    pub use crate::domain::{Domain, DomainLookup, NodeHandle, TagGenerator, TimeTracker};
    pub use crate::elements::{Element, ElementKind, Node};
    pub use crate::error::{Diagnostic, DiagnosticKind, FEAError, FEAResult};
    pub use crate::materials::{
        IntegrationState, J2Material, J2Parameters, J2Plasticity, MaterialKind,
    };
    pub use crate::persistence::{Channel, DataBuffer, MemoryChannel, Persist};
    pub use crate::results::{Reactions, StressUpdate};
}
