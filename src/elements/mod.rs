//! Domain collaborators: nodes and retaining elements

mod element;
mod node;

pub use element::{Element, ElementKind};
pub use node::Node;
