//! Multi-point constraints and reaction redistribution

mod mrmp;
mod reactions;

pub use mrmp::{interpolation_matrix, ConstraintKind, ConstraintStatus, MultiRetainedConstraint};
pub use reactions::ReactionTransfer;
