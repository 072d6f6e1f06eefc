//! Error types for the constraint and material core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for FEA core operations
#[derive(Error, Debug)]
pub enum FEAError {
    #[error("Node {0} not found in domain")]
    NodeNotFound(i32),

    #[error("Element {0} not found in domain")]
    ElementNotFound(i32),

    #[error("Constraint {0} not found in domain")]
    ConstraintNotFound(i32),

    #[error("Duplicate tag {0} already exists")]
    DuplicateTag(i32),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for FEA core operations
pub type FEAResult<T> = Result<T, FEAError>;

/// What went wrong with a single entity during an otherwise successful pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A node or element tag could not be resolved while attaching
    UnresolvedReference { missing_tag: i32 },
    /// Shape functions are ill-defined at the requested position
    DegenerateGeometry,
    /// A local Newton iteration hit its cap
    ConvergenceWarning { iterations: usize, residual: f64 },
}

/// Non-fatal per-entity report
///
/// Diagnostics degrade one entity's contribution; they never abort a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Tag of the constraint or material point that raised it
    pub tag: i32,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn unresolved(tag: i32, missing_tag: i32) -> Self {
        Self {
            tag,
            kind: DiagnosticKind::UnresolvedReference { missing_tag },
        }
    }

    pub fn degenerate(tag: i32) -> Self {
        Self {
            tag,
            kind: DiagnosticKind::DegenerateGeometry,
        }
    }

    pub fn convergence(tag: i32, iterations: usize, residual: f64) -> Self {
        Self {
            tag,
            kind: DiagnosticKind::ConvergenceWarning { iterations, residual },
        }
    }

    /// Emit this diagnostic on the `log` facade
    pub fn log(&self) {
        match &self.kind {
            DiagnosticKind::UnresolvedReference { missing_tag } => {
                log::error!("entity {}: tag {} could not be resolved", self.tag, missing_tag)
            }
            DiagnosticKind::DegenerateGeometry => {
                log::error!("entity {}: interpolation factors are ill-defined", self.tag)
            }
            DiagnosticKind::ConvergenceWarning { iterations, residual } => log::warn!(
                "entity {}: local iteration not converged after {} iterations (residual {:e})",
                self.tag,
                iterations,
                residual
            ),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DiagnosticKind::UnresolvedReference { missing_tag } => {
                write!(f, "[{}] unresolved reference to tag {}", self.tag, missing_tag)
            }
            DiagnosticKind::DegenerateGeometry => write!(f, "[{}] degenerate geometry", self.tag),
            DiagnosticKind::ConvergenceWarning { iterations, residual } => write!(
                f,
                "[{}] no convergence after {} iterations, residual {:e}",
                self.tag, iterations, residual
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FEAError::DimensionMismatch {
            expected: "2x4".to_string(),
            found: "2x3".to_string(),
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 2x4, found 2x3");
        assert_eq!(FEAError::NodeNotFound(7).to_string(), "Node 7 not found in domain");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::convergence(3, 25, 1.5e-3);
        assert!(d.to_string().contains("25 iterations"));
        assert_eq!(Diagnostic::unresolved(1, 9).to_string(), "[1] unresolved reference to tag 9");
    }
}
